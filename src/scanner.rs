use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::{stream, StreamExt};
use indicatif::ProgressBar;
use log::{debug, info, warn};

use crate::classifier::{Classification, Classifier};
use crate::errors::ScanError;
use crate::models::{Finding, Payload, ProbeStatus, Report, Target};
use crate::payloads::{builtin_catalog, neutralize_destructive};
use crate::prober::probe;
use crate::signatures::SignatureTable;
use crate::transport::Transport;

/// Scan knobs. `workers` is the hard concurrency ceiling; it doubles as
/// the courtesy/rate policy toward the target.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Per-request deadline.
    pub timeout: Duration,
    /// Maximum concurrent probes.
    pub workers: usize,
    /// Expected round-trip time; responses far beyond it with no content
    /// signal are flagged inconclusive instead of detected.
    pub latency_baseline: Duration,
    /// "Far beyond" multiplier for the latency baseline.
    pub slow_multiplier: u32,
    /// Send the destructive catalog entry verbatim instead of the
    /// neutralized stacked-query probe.
    pub allow_destructive: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            timeout: Duration::from_secs(10),
            workers: 5,
            latency_baseline: Duration::from_millis(500),
            slow_multiplier: 8,
            allow_destructive: false,
        }
    }
}

/// One (parameter, payload) probe to run. Consumed exactly once.
struct Task {
    parameter: String,
    payload: Payload,
    catalog_index: usize,
}

/// The concurrency core: enumerates parameters x catalog, drives the
/// probes through a bounded pool, and folds the outcomes into a report.
pub struct Scanner<T: Transport> {
    transport: Arc<T>,
    catalog: Vec<Payload>,
    signatures: SignatureTable,
    config: ScanConfig,
}

impl<T: Transport> Scanner<T> {
    pub fn new(transport: Arc<T>, config: ScanConfig) -> Self {
        let catalog = if config.allow_destructive {
            builtin_catalog()
        } else {
            neutralize_destructive(builtin_catalog())
        };
        Self::with_catalog(transport, config, catalog)
    }

    /// Substitutes a caller-supplied catalog; dispatch and classification
    /// only ever see it as an ordered payload sequence.
    pub fn with_catalog(transport: Arc<T>, config: ScanConfig, catalog: Vec<Payload>) -> Self {
        Scanner {
            transport,
            catalog,
            signatures: SignatureTable::builtin(),
            config,
        }
    }

    pub fn catalog(&self) -> &[Payload] {
        &self.catalog
    }

    /// Runs the full scan. Fatal configuration errors surface here before
    /// any probe is sent; per-task transport failures are folded into
    /// their findings instead.
    pub async fn scan(
        &self,
        target: &Target,
        pb: Option<Arc<ProgressBar>>,
    ) -> Result<Report, ScanError> {
        if target.param_count() == 0 {
            return Err(ScanError::NoParameters);
        }

        let started = Instant::now();
        info!("scanning {}", target.original_url());

        let baseline_noisy = self.baseline_has_error_indicators(target).await;
        let classifier = Classifier::new(
            SignatureTable::builtin(),
            self.config.latency_baseline,
            self.config.slow_multiplier,
            baseline_noisy,
        );

        let tasks = self.enumerate_tasks(target);
        let tasks_issued = tasks.len();
        debug!(
            "testing {} combinations across {} parameters",
            tasks_issued,
            target.param_count()
        );

        let mut findings: Vec<(String, usize, Finding)> = stream::iter(tasks)
            .map(|task| {
                let classifier = &classifier;
                let pb = pb.clone();
                async move {
                    let finding = self.run_task(target, &task, classifier).await;
                    if let Some(ref p) = pb {
                        p.inc(1);
                    }
                    (task.parameter, task.catalog_index, finding)
                }
            })
            .buffer_unordered(self.config.workers.max(1))
            .collect()
            .await;

        // Completion order is arbitrary; impose the report order here.
        findings.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
        let findings: Vec<Finding> = findings.into_iter().map(|(_, _, f)| f).collect();

        let probe_failures = findings
            .iter()
            .filter(|f| f.status == ProbeStatus::Failed)
            .count();

        let mut vulnerable: Vec<&str> = findings
            .iter()
            .filter(|f| f.detected)
            .map(|f| f.parameter.as_str())
            .collect();
        vulnerable.dedup();

        Ok(Report {
            target_url: target.original_url().to_string(),
            tasks_issued,
            tasks_completed: tasks_issued - probe_failures,
            probe_failures,
            vulnerable_params: vulnerable.len(),
            findings,
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }

    fn enumerate_tasks(&self, target: &Target) -> Vec<Task> {
        let mut tasks = Vec::with_capacity(target.param_count() * self.catalog.len());
        for name in target.param_names() {
            for (idx, payload) in self.catalog.iter().enumerate() {
                tasks.push(Task {
                    parameter: name.to_string(),
                    payload: payload.clone(),
                    catalog_index: idx,
                });
            }
        }
        tasks
    }

    async fn run_task(&self, target: &Target, task: &Task, classifier: &Classifier) -> Finding {
        let mut finding = Finding {
            parameter: task.parameter.clone(),
            payload: task.payload.content.clone(),
            intent: task.payload.intent,
            detected: false,
            engine: None,
            evidence: None,
            status: ProbeStatus::Completed,
            error: None,
            elapsed_ms: 0,
        };

        let obs = match probe(
            self.transport.as_ref(),
            target,
            &task.parameter,
            &task.payload.content,
            self.config.timeout,
        )
        .await
        {
            Ok(obs) => obs,
            Err(e) => {
                warn!(
                    "probe failed for '{}' with payload '{}': {}",
                    task.parameter, task.payload.content, e
                );
                finding.status = ProbeStatus::Failed;
                finding.error = Some(format!("probe failed: {}", e));
                return finding;
            }
        };

        finding.elapsed_ms = obs.elapsed.as_millis() as u64;

        match classifier.classify(&obs) {
            Classification::Detected { engine, evidence } => {
                finding.detected = true;
                finding.engine = Some(engine);
                finding.evidence = Some(evidence);
            }
            Classification::Inconclusive { reason } => {
                debug!(
                    "inconclusive result for '{}' / '{}': {}",
                    task.parameter, task.payload.content, reason
                );
                finding.status = ProbeStatus::Inconclusive;
            }
            Classification::Clean => {}
        }

        finding
    }

    /// One unmodified request up front: if the page leaks SQL-error text
    /// on its own, signature matches during the scan prove nothing.
    async fn baseline_has_error_indicators(&self, target: &Target) -> bool {
        match self
            .transport
            .fetch(target.original_url().as_str(), self.config.timeout)
            .await
        {
            Ok(resp) => {
                let noisy = self.signatures.match_body(&resp.body).is_some();
                if noisy {
                    warn!("baseline response already contains SQL error indicators");
                }
                noisy
            }
            Err(e) => {
                warn!("baseline request failed, assuming a quiet baseline: {}", e);
                false
            }
        }
    }
}
