use std::time::Duration;

use crate::models::{DbEngine, Observation};
use crate::signatures::SignatureTable;

/// Evidence snippets are clipped to this length for reporting.
const MAX_EVIDENCE_CHARS: usize = 120;

/// Verdict on one observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Detected { engine: DbEngine, evidence: String },
    /// A signal that cannot be trusted: time anomaly without content
    /// change, or error indicators already present in the baseline.
    Inconclusive { reason: String },
    Clean,
}

/// Pure, deterministic response classifier. Holds the signature table
/// and the per-scan context captured before probing started.
pub struct Classifier {
    table: SignatureTable,
    latency_baseline: Duration,
    slow_multiplier: u32,
    baseline_has_error_indicators: bool,
}

impl Classifier {
    pub fn new(
        table: SignatureTable,
        latency_baseline: Duration,
        slow_multiplier: u32,
        baseline_has_error_indicators: bool,
    ) -> Self {
        Classifier {
            table,
            latency_baseline,
            slow_multiplier,
            baseline_has_error_indicators,
        }
    }

    /// Applies the detection policy in order, first match wins:
    /// 1. elapsed far beyond the latency baseline with no content signal
    ///    is inconclusive, never a detection;
    /// 2. a signature match that the unmodified baseline also exhibits
    ///    is inconclusive (the page leaks error text on its own);
    /// 3. any signature match detects, engine per table order, with
    ///    `Generic` assigned only when no specific engine matched;
    /// 4. otherwise clean.
    pub fn classify(&self, obs: &Observation) -> Classification {
        let matched = self.table.match_body(&obs.body);

        let slow_threshold = self.latency_baseline * self.slow_multiplier;
        if matched.is_none() && !slow_threshold.is_zero() && obs.elapsed > slow_threshold {
            return Classification::Inconclusive {
                reason: format!(
                    "response took {:?}, over {}x the {:?} baseline, with no content signal",
                    obs.elapsed, self.slow_multiplier, self.latency_baseline
                ),
            };
        }

        match matched {
            Some((engine, fragment)) => {
                if self.baseline_has_error_indicators {
                    Classification::Inconclusive {
                        reason: format!(
                            "'{}' matched, but the unmodified response already contains error text",
                            fragment
                        ),
                    }
                } else {
                    Classification::Detected {
                        engine,
                        evidence: clip_evidence(&obs.body, fragment),
                    }
                }
            }
            None => Classification::Clean,
        }
    }
}

/// Extracts a short snippet of the body starting at the matched fragment.
fn clip_evidence(body: &str, fragment: &str) -> String {
    let lower = body.to_lowercase();
    let start = lower.find(fragment).unwrap_or(0);
    // The offset comes from the lowercased copy; lowercasing can shift
    // byte positions, so fall back to that copy if it is not a valid
    // boundary in the original.
    let tail = body.get(start..).unwrap_or(&lower[start..]);
    tail.chars().take(MAX_EVIDENCE_CHARS).collect()
}
