//! Workspace umbrella crate for SQL query normalization.
//!
//! This crate stitches the PostgreSQL parser adapter and the normalization
//! layer together so callers can go from query text to a cacheable
//! [`Source`] with a single call.
//!
//! ```rust
//! use querynorm::{normalize_query, NormalizeConfig};
//!
//! let source = normalize_query("SELECT * FROM t WHERE id = 5", &NormalizeConfig::default())?;
//! assert_eq!(source.text(), "SELECT * FROM t WHERE id = $1");
//! # Ok::<(), querynorm::PipelineError>(())
//! ```

mod config;

pub use crate::config::{ConfigLoadError, LoggingYamlConfig, NormalizeYamlConfig, QueryNormConfig};
pub use canonical::{
    CACHE_KEY_LEN, CacheKey, DEFAULT_MAX_QUERY_BYTES, ExtractedConstant, FormatError,
    InternalError, LiteralTokenKind, NormalizeConfig, NormalizeError, NormalizedBody, Source,
    SourceBody, TAG_NORMALIZED, TAG_PLAIN, extract_constants, normalize, oid, resolve_param_id,
};
pub use parser::{
    LocationRecord, NormalizationResult, ParseError, ParsedQuery, PostgresParser, QueryParser,
};

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::sync::{Arc, OnceLock, RwLock};
use std::time::{Duration, Instant};

/// Errors that can occur while moving a query through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    Normalize(NormalizeError),
    Format(FormatError),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Normalize(err) => write!(f, "normalization failure: {err}"),
            PipelineError::Format(err) => write!(f, "deserialization failure: {err}"),
        }
    }
}

impl Error for PipelineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PipelineError::Normalize(err) => Some(err),
            PipelineError::Format(err) => Some(err),
        }
    }
}

impl From<NormalizeError> for PipelineError {
    fn from(value: NormalizeError) -> Self {
        PipelineError::Normalize(value)
    }
}

impl From<FormatError> for PipelineError {
    fn from(value: FormatError) -> Self {
        PipelineError::Format(value)
    }
}

/// Metrics observer for pipeline stages.
pub trait PipelineMetrics: Send + Sync {
    fn record_normalize(&self, latency: Duration, result: Result<(), NormalizeError>);
    fn record_deserialize(&self, latency: Duration, result: Result<(), FormatError>);
}

/// Install or clear the global pipeline metrics recorder.
pub fn set_pipeline_metrics(recorder: Option<Arc<dyn PipelineMetrics>>) {
    let mut guard = metrics_lock()
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    *guard = recorder;
}

fn metrics_lock() -> &'static RwLock<Option<Arc<dyn PipelineMetrics>>> {
    static METRICS: OnceLock<RwLock<Option<Arc<dyn PipelineMetrics>>>> = OnceLock::new();
    METRICS.get_or_init(|| RwLock::new(None))
}

fn metrics_recorder() -> Option<Arc<dyn PipelineMetrics>> {
    let guard = metrics_lock()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.clone()
}

struct MetricsSpan {
    recorder: Arc<dyn PipelineMetrics>,
    start: Instant,
}

impl MetricsSpan {
    fn start() -> Option<Self> {
        metrics_recorder().map(|recorder| Self {
            recorder,
            start: Instant::now(),
        })
    }

    fn record_normalize(self, result: Result<(), NormalizeError>) {
        self.recorder.record_normalize(self.start.elapsed(), result);
    }

    fn record_deserialize(self, result: Result<(), FormatError>) {
        self.recorder
            .record_deserialize(self.start.elapsed(), result);
    }
}

/// Normalize `text` with the bundled PostgreSQL parser.
pub fn normalize_query(text: &str, cfg: &NormalizeConfig) -> Result<Source, PipelineError> {
    normalize_query_with(&PostgresParser, text, cfg)
}

/// Normalize `text` with an explicit parser.
pub fn normalize_query_with<P: QueryParser>(
    parser: &P,
    text: &str,
    cfg: &NormalizeConfig,
) -> Result<Source, PipelineError> {
    let mut metrics = MetricsSpan::start();
    match normalize(parser, text, cfg) {
        Ok(source) => {
            if let Some(span) = metrics.take() {
                span.record_normalize(Ok(()));
            }
            Ok(source)
        }
        Err(err) => {
            if let Some(span) = metrics.take() {
                span.record_normalize(Err(err.clone()));
            }
            Err(PipelineError::Normalize(err))
        }
    }
}

/// Decode a source produced by [`Source::serialize`].
pub fn deserialize_source(data: &[u8]) -> Result<Source, PipelineError> {
    let mut metrics = MetricsSpan::start();
    match Source::deserialize(data) {
        Ok(source) => {
            if let Some(span) = metrics.take() {
                span.record_deserialize(Ok(()));
            }
            Ok(source)
        }
        Err(err) => {
            if let Some(span) = metrics.take() {
                span.record_deserialize(Err(err.clone()));
            }
            Err(PipelineError::Format(err))
        }
    }
}

/// JSON-friendly summary of a [`Source`], as printed by the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceReport {
    pub text: String,
    pub original_text: String,
    pub tag: u8,
    pub highest_extern_param_id: Option<i32>,
    pub constants: Vec<ConstantReport>,
    pub type_oids: Vec<u32>,
    /// Lowercase hex.
    pub cache_key: String,
    pub serialized_len: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstantReport {
    pub param_id: i32,
    pub token_kind: LiteralTokenKind,
    /// Raw value as UTF-8, lossy for non-text bytes.
    pub raw_value: String,
}

impl From<&Source> for SourceReport {
    fn from(source: &Source) -> Self {
        Self {
            text: source.text().to_string(),
            original_text: source.original_text().to_string(),
            tag: source.tag(),
            highest_extern_param_id: source.highest_extern_param_id(),
            constants: source
                .extracted_constants()
                .iter()
                .map(|c| ConstantReport {
                    param_id: c.param_id,
                    token_kind: c.token_kind,
                    raw_value: String::from_utf8_lossy(&c.raw_value).into_owned(),
                })
                .collect(),
            type_oids: source.extra_type_oids(),
            cache_key: source.cache_key().to_hex(),
            serialized_len: source.serialize().len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex, RwLock};
    use std::time::Duration;

    #[test]
    fn normalize_query_replaces_literals() {
        let source = normalize_query(
            "SELECT * FROM t WHERE id = 5 AND name = 'bob'",
            &NormalizeConfig::default(),
        )
        .expect("normalization should succeed");
        assert_eq!(source.text(), "SELECT * FROM t WHERE id = $1 AND name = $2");
        assert_eq!(source.extracted_constants().len(), 2);
    }

    #[test]
    fn normalize_query_wraps_syntax_errors() {
        let result = normalize_query("SELEC 1", &NormalizeConfig::default());
        assert!(matches!(
            result,
            Err(PipelineError::Normalize(NormalizeError::Syntax(_)))
        ));
    }

    #[test]
    fn deserialize_source_wraps_format_errors() {
        let result = deserialize_source(&[9]);
        assert_eq!(
            result,
            Err(PipelineError::Format(FormatError::InvalidTag(9)))
        );
    }

    #[test]
    fn error_source_chain() {
        let err = PipelineError::from(FormatError::Empty);
        assert!(err.source().is_some());
        assert!(err.to_string().starts_with("deserialization failure"));
    }

    #[test]
    fn report_summarizes_source() {
        let source =
            normalize_query("SELECT 1.5, 'x'", &NormalizeConfig::default()).expect("normalize");
        let report = SourceReport::from(&source);

        assert_eq!(report.text, "SELECT $1, $2");
        assert_eq!(report.tag, TAG_NORMALIZED);
        assert_eq!(report.type_oids, vec![oid::NUMERIC, oid::UNKNOWN]);
        assert_eq!(report.constants[1].raw_value, "'x'");
        assert_eq!(report.cache_key.len(), 2 * CACHE_KEY_LEN);
        assert_eq!(report.serialized_len, source.serialize().len());

        let json = serde_json::to_value(&report).expect("serialize report");
        assert_eq!(json["constants"][0]["token_kind"], "FCONST");
    }

    #[derive(Default)]
    struct CountingMetrics {
        events: Arc<RwLock<Vec<&'static str>>>,
    }

    impl CountingMetrics {
        fn snapshot(&self) -> Vec<&'static str> {
            self.events.read().unwrap().clone()
        }
    }

    impl PipelineMetrics for CountingMetrics {
        fn record_normalize(&self, _latency: Duration, result: Result<(), NormalizeError>) {
            let label = if result.is_ok() {
                "normalize_ok"
            } else {
                "normalize_err"
            };
            self.events.write().unwrap().push(label);
        }

        fn record_deserialize(&self, _latency: Duration, result: Result<(), FormatError>) {
            let label = if result.is_ok() {
                "deserialize_ok"
            } else {
                "deserialize_err"
            };
            self.events.write().unwrap().push(label);
        }
    }

    // The recorder is process-global; keep tests that install one serialized.
    static METRICS_TEST_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn metrics_recorder_tracks_pipeline_outcome() {
        let _lock = METRICS_TEST_LOCK.lock().unwrap();
        let metrics = Arc::new(CountingMetrics::default());
        set_pipeline_metrics(Some(metrics.clone()));

        let source =
            normalize_query("SELECT 1", &NormalizeConfig::default()).expect("normalize");
        let _ = normalize_query("SELEC 1", &NormalizeConfig::default());
        let _ = deserialize_source(&source.serialize());
        let _ = deserialize_source(&[]);

        set_pipeline_metrics(None);

        let events = metrics.snapshot();
        assert!(events.contains(&"normalize_ok"));
        assert!(events.contains(&"normalize_err"));
        assert!(events.contains(&"deserialize_ok"));
        assert!(events.contains(&"deserialize_err"));
    }
}
