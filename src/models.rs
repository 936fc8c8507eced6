use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use url::Url;

use crate::errors::ScanError;

/// Backend database engines we can fingerprint from error text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbEngine {
    MySql,
    PostgreSql,
    Sqlite,
    Mssql,
    Oracle,
    /// SQL error indicators present, but no engine-specific fragment.
    Generic,
}

impl fmt::Display for DbEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DbEngine::MySql => "mysql",
            DbEngine::PostgreSql => "postgresql",
            DbEngine::Sqlite => "sqlite",
            DbEngine::Mssql => "mssql",
            DbEngine::Oracle => "oracle",
            DbEngine::Generic => "generic",
        };
        f.write_str(s)
    }
}

/// What a payload is trying to provoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Quote,
    Boolean,
    Union,
    Destructive,
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Intent::Quote => "quote",
            Intent::Boolean => "boolean",
            Intent::Union => "union",
            Intent::Destructive => "destructive",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payload {
    pub content: String,
    pub intent: Intent,
}

impl Payload {
    pub fn new(content: &str, intent: Intent) -> Self {
        Payload {
            content: content.to_string(),
            intent,
        }
    }
}

/// A parsed scan target: base URL plus its query pairs in declaration order.
#[derive(Debug, Clone)]
pub struct Target {
    base: Url,
    params: Vec<(String, String)>,
}

impl Target {
    /// Parses a raw URL, preserving query-pair order. Fails if the string is
    /// not a valid absolute URL or carries no query component at all.
    pub fn parse(raw: &str) -> Result<Self, ScanError> {
        let url = Url::parse(raw).map_err(|e| ScanError::MalformedUrl(e.to_string()))?;

        if url.query().is_none() {
            return Err(ScanError::MalformedUrl(format!(
                "no query component in '{}'",
                raw
            )));
        }

        let params: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        let mut base = url;
        base.set_query(None);
        base.set_fragment(None);

        Ok(Target { base, params })
    }

    /// Full URL of the unmodified target, query pairs at original values.
    pub fn original_url(&self) -> Url {
        self.url_with(None, "")
    }

    /// Builds the probe URL: `parameter`'s value replaced by `payload`,
    /// every other pair left at its original value.
    pub fn probe_url(&self, parameter: &str, payload: &str) -> Url {
        self.url_with(Some(parameter), payload)
    }

    fn url_with(&self, substitute: Option<&str>, payload: &str) -> Url {
        let mut url = self.base.clone();
        {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in &self.params {
                if substitute == Some(k.as_str()) {
                    pairs.append_pair(k, payload);
                } else {
                    pairs.append_pair(k, v);
                }
            }
        }
        url
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Parameter names in declaration order.
    pub fn param_names(&self) -> Vec<&str> {
        self.params.iter().map(|(k, _)| k.as_str()).collect()
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }
}

/// Raw result of one probe request, truncated and timed by the prober.
#[derive(Debug, Clone)]
pub struct Observation {
    pub status: u16,
    pub body: String,
    pub elapsed: Duration,
}

/// How a single probe task ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    /// Request completed and produced a usable observation.
    Completed,
    /// Transport failure; no observation.
    Failed,
    /// Time anomaly or baseline noise; not usable as evidence.
    Inconclusive,
}

/// Outcome record for one (parameter, payload) probe.
#[derive(Debug, Clone, Serialize)]
pub struct Finding {
    pub parameter: String,
    pub payload: String,
    pub intent: Intent,
    pub detected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine: Option<DbEngine>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
    pub status: ProbeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

/// Final scan report: all findings in (parameter, catalog) order plus counts.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub target_url: String,
    pub tasks_issued: usize,
    /// Tasks that produced a usable observation.
    pub tasks_completed: usize,
    pub probe_failures: usize,
    pub findings: Vec<Finding>,
    pub vulnerable_params: usize,
    pub elapsed_ms: u64,
}

impl Report {
    /// Findings flagged as vulnerable, in report order.
    pub fn vulnerabilities(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.detected)
    }

    pub fn vulnerability_count(&self) -> usize {
        self.vulnerabilities().count()
    }
}
