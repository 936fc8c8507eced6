use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use sqli_probe::errors::ScanError;
use sqli_probe::models::{DbEngine, ProbeStatus, Target};
use sqli_probe::scanner::{ScanConfig, Scanner};
use sqli_probe::transport::{RawResponse, Transport, TransportError};

type Responder = Box<dyn Fn(&Url) -> Result<RawResponse, TransportError> + Send + Sync>;
type LatencyFn = Box<dyn Fn(&Url) -> Duration + Send + Sync>;

/// Scriptable transport: responds per URL, optionally with artificial
/// latency, and tracks the concurrency high-water mark.
struct MockTransport {
    respond: Responder,
    latency: Option<LatencyFn>,
    requests: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockTransport {
    fn new(respond: Responder) -> Self {
        MockTransport {
            respond,
            latency: None,
            requests: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    fn with_latency(mut self, latency: LatencyFn) -> Self {
        self.latency = Some(latency);
        self
    }

    fn request_log(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn fetch(&self, url: &str, _timeout: Duration) -> Result<RawResponse, TransportError> {
        self.requests.lock().unwrap().push(url.to_string());

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let parsed = Url::parse(url).expect("mock received invalid url");
        if let Some(latency) = &self.latency {
            tokio::time::sleep(latency(&parsed)).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        (self.respond)(&parsed)
    }
}

fn ok(body: &str) -> Result<RawResponse, TransportError> {
    Ok(RawResponse {
        status: 200,
        body: body.to_string(),
    })
}

fn value_of(url: &Url, param: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == param)
        .map(|(_, v)| v.into_owned())
}

fn quick_config(workers: usize) -> ScanConfig {
    ScanConfig {
        timeout: Duration::from_secs(1),
        workers,
        latency_baseline: Duration::from_secs(60),
        ..ScanConfig::default()
    }
}

#[tokio::test]
async fn issues_exactly_params_times_payloads_tasks() {
    let target = Target::parse("http://x/y?id=1&name=foo").unwrap();
    let transport = Arc::new(MockTransport::new(Box::new(|_: &Url| ok("<html>fine</html>"))));

    let scanner = Scanner::new(transport.clone(), quick_config(5));
    let report = scanner.scan(&target, None).await.unwrap();

    assert_eq!(report.tasks_issued, 8);
    assert_eq!(report.findings.len(), 8);

    // One finding per (parameter, payload), no duplicates or omissions.
    let pairs: HashSet<(String, String)> = report
        .findings
        .iter()
        .map(|f| (f.parameter.clone(), f.payload.clone()))
        .collect();
    assert_eq!(pairs.len(), 8);

    // One baseline request plus one request per task, each probe URL unique.
    let log = transport.request_log();
    assert_eq!(log.len(), 9);
    let unique: HashSet<&String> = log.iter().collect();
    assert_eq!(unique.len(), 9);
}

#[tokio::test]
async fn probe_urls_preserve_untouched_parameters() {
    let target = Target::parse("http://x/y?id=1&name=foo").unwrap();
    let transport = Arc::new(MockTransport::new(Box::new(|url: &Url| {
        // Whichever parameter carries the payload, the other must be intact.
        let id = value_of(url, "id").unwrap();
        let name = value_of(url, "name").unwrap();
        assert!(id == "1" || name == "foo");
        ok("fine")
    })));

    let scanner = Scanner::new(transport, quick_config(4));
    scanner.scan(&target, None).await.unwrap();
}

#[tokio::test]
async fn finding_order_is_deterministic_despite_random_completion() {
    // Parameters declared out of sorted order on purpose.
    let raw = "http://x/y?zeta=9&alpha=1";

    let mut orderings = Vec::new();
    for _ in 0..2 {
        let transport = Arc::new(
            MockTransport::new(Box::new(|_: &Url| ok("nothing here"))).with_latency(Box::new(|url: &Url| {
                // Pseudo-random latency derived from the probe URL so task
                // completion order scrambles between parameters.
                let h: u64 = url.as_str().bytes().map(u64::from).sum();
                Duration::from_millis(h % 40)
            })),
        );
        let target = Target::parse(raw).unwrap();
        let scanner = Scanner::new(transport, quick_config(8));
        let report = scanner.scan(&target, None).await.unwrap();

        let order: Vec<(String, String)> = report
            .findings
            .iter()
            .map(|f| (f.parameter.clone(), f.payload.clone()))
            .collect();
        orderings.push(order);
    }

    assert_eq!(orderings[0], orderings[1]);

    // Sorted by parameter name first, then catalog declaration order.
    let params: Vec<&str> = orderings[0].iter().map(|(p, _)| p.as_str()).collect();
    assert_eq!(
        params,
        vec!["alpha", "alpha", "alpha", "alpha", "zeta", "zeta", "zeta", "zeta"]
    );
    let alpha_payloads: Vec<&str> = orderings[0][..4].iter().map(|(_, p)| p.as_str()).collect();
    assert_eq!(
        alpha_payloads,
        vec!["'", "' OR 1=1--", "' UNION SELECT 1--", "'; SELECT 1--"]
    );
}

#[tokio::test]
async fn mysql_error_fragment_detects_mysql() {
    let target = Target::parse("http://x/y?id=1").unwrap();
    let transport = Arc::new(MockTransport::new(Box::new(|url: &Url| {
        match value_of(url, "id").as_deref() {
            Some("' OR 1=1--") => ok("You have an error in your SQL syntax near 'OR 1=1'"),
            Some(v) => ok(&format!("<html>you searched for {}</html>", v)),
            None => ok(""),
        }
    })));

    let scanner = Scanner::new(transport, quick_config(4));
    let report = scanner.scan(&target, None).await.unwrap();

    assert_eq!(report.tasks_issued, 4);

    let boolean = report
        .findings
        .iter()
        .find(|f| f.payload == "' OR 1=1--")
        .unwrap();
    assert!(boolean.detected);
    assert_eq!(boolean.engine, Some(DbEngine::MySql));
    assert!(boolean.evidence.is_some());

    let quote = report.findings.iter().find(|f| f.payload == "'").unwrap();
    assert!(!quote.detected);
    assert_eq!(quote.engine, None);

    assert_eq!(report.vulnerable_params, 1);
}

#[tokio::test]
async fn transport_failures_do_not_abort_the_scan() {
    let target = Target::parse("http://x/y?a=1&b=2").unwrap();
    let transport = Arc::new(MockTransport::new(Box::new(|url: &Url| {
        // Two of the eight probes fail at the transport level.
        match value_of(url, "b").as_deref() {
            Some("'") | Some("' OR 1=1--") => {
                Err(TransportError::Io("connection reset".to_string()))
            }
            _ => {
                if value_of(url, "a").as_deref() == Some("' UNION SELECT 1--") {
                    ok("SQLITE_ERROR: near \"SELECT\": syntax error")
                } else {
                    ok("fine")
                }
            }
        }
    })));

    let scanner = Scanner::new(transport, quick_config(4));
    let report = scanner.scan(&target, None).await.unwrap();

    assert_eq!(report.tasks_issued, 8);
    assert_eq!(report.probe_failures, 2);
    assert_eq!(report.tasks_completed, 6);
    assert_eq!(report.findings.len(), 8);

    let failed: Vec<_> = report
        .findings
        .iter()
        .filter(|f| f.status == ProbeStatus::Failed)
        .collect();
    assert_eq!(failed.len(), 2);
    for f in &failed {
        assert!(!f.detected);
        assert!(f.error.as_deref().unwrap().starts_with("probe failed"));
    }

    // Successful tasks still produce findings, including the detection.
    let union_a = report
        .findings
        .iter()
        .find(|f| f.parameter == "a" && f.payload == "' UNION SELECT 1--")
        .unwrap();
    assert!(union_a.detected);
    assert_eq!(union_a.engine, Some(DbEngine::Sqlite));
}

#[tokio::test]
async fn worker_pool_bound_is_respected() {
    let target = Target::parse("http://x/y?a=1&b=2&c=3").unwrap();
    let transport = Arc::new(
        MockTransport::new(Box::new(|_: &Url| ok("fine")))
            .with_latency(Box::new(|_: &Url| Duration::from_millis(25))),
    );

    let scanner = Scanner::new(transport.clone(), quick_config(3));
    let report = scanner.scan(&target, None).await.unwrap();

    assert_eq!(report.tasks_issued, 12);
    assert!(transport.max_in_flight.load(Ordering::SeqCst) <= 3);
}

#[tokio::test]
async fn noisy_baseline_suppresses_detection() {
    // The unmodified page already leaks SQL error text; matches during
    // the scan are not evidence.
    let target = Target::parse("http://x/y?id=1").unwrap();
    let transport = Arc::new(MockTransport::new(Box::new(|_: &Url| {
        ok("Warning: mysql_fetch_array() expects parameter 1")
    })));

    let scanner = Scanner::new(transport, quick_config(4));
    let report = scanner.scan(&target, None).await.unwrap();

    assert_eq!(report.vulnerability_count(), 0);
    assert!(report
        .findings
        .iter()
        .all(|f| f.status == ProbeStatus::Inconclusive));
}

#[tokio::test]
async fn empty_query_is_a_configuration_error() {
    let target = Target::parse("http://x/y?").unwrap();
    assert_eq!(target.param_count(), 0);

    let transport = Arc::new(MockTransport::new(Box::new(|_: &Url| ok("fine"))));
    let scanner = Scanner::new(transport.clone(), quick_config(4));
    let err = scanner.scan(&target, None).await.unwrap_err();
    assert!(matches!(err, ScanError::NoParameters));

    // Fatal before any probing: nothing was sent.
    assert!(transport.request_log().is_empty());
}

#[tokio::test]
async fn destructive_payload_is_neutralized_by_default() {
    let target = Target::parse("http://x/y?id=1").unwrap();
    let transport = Arc::new(MockTransport::new(Box::new(|url: &Url| {
        assert!(!value_of(url, "id").unwrap().to_lowercase().contains("drop table"));
        ok("fine")
    })));

    let scanner = Scanner::new(transport, quick_config(4));
    scanner.scan(&target, None).await.unwrap();
}

#[tokio::test]
async fn destructive_payload_sent_verbatim_when_opted_in() {
    let target = Target::parse("http://x/y?id=1").unwrap();
    let transport = Arc::new(MockTransport::new(Box::new(|_: &Url| ok("fine"))));

    let config = ScanConfig {
        allow_destructive: true,
        ..quick_config(4)
    };
    let scanner = Scanner::new(transport.clone(), config);
    scanner.scan(&target, None).await.unwrap();

    let sent_drop = transport.request_log().iter().any(|u| {
        let url = Url::parse(u).unwrap();
        value_of(&url, "id").as_deref() == Some("'; DROP TABLE users--")
    });
    assert!(sent_drop);
}
