use std::time::Instant;

use parser::QueryParser;
use tracing::{error, info, warn, Level};

use crate::config::NormalizeConfig;
use crate::error::NormalizeError;
use crate::extract::extract_constants;
use crate::source::Source;

/// Main entry point. Normalizes `text` with `parser` and returns the
/// resulting source.
///
/// Syntax errors propagate unchanged; nothing is retried.
pub fn normalize<P: QueryParser>(
    parser: &P,
    text: &str,
    cfg: &NormalizeConfig,
) -> Result<Source, NormalizeError> {
    let start = Instant::now();
    if let Err(err) = cfg.validate() {
        warn!(error = %err, "normalize_failure");
        return Err(err);
    }

    let span = tracing::span!(Level::INFO, "canonical.normalize", query_len = text.len());
    let _guard = span.enter();

    match normalize_inner(parser, text, cfg) {
        Ok(source) => {
            let elapsed_micros = start.elapsed().as_micros();
            info!(
                tag = source.tag(),
                normalized_len = source.text().len(),
                constants = source.extracted_constants().len(),
                elapsed_micros,
                "normalize_success"
            );
            Ok(source)
        }
        Err(err) => {
            let elapsed_micros = start.elapsed().as_micros();
            if let NormalizeError::Internal(_) = err {
                error!(error = %err, elapsed_micros, "normalize_failure");
            } else {
                warn!(error = %err, elapsed_micros, "normalize_failure");
            }
            Err(err)
        }
    }
}

fn normalize_inner<P: QueryParser>(
    parser: &P,
    text: &str,
    cfg: &NormalizeConfig,
) -> Result<Source, NormalizeError> {
    if let Some(limit) = cfg.max_query_bytes {
        if text.len() > limit {
            return Err(NormalizeError::QueryTooLarge {
                len: text.len(),
                limit,
            });
        }
    }

    if !cfg.normalize_literals {
        parser.parse(text)?;
        return Source::from_string(text).map_err(NormalizeError::from);
    }

    let result = parser.normalize(text)?;
    let constants = extract_constants(result.highest_extern_param_id, &result.locations, |kind| {
        parser.token_name(kind)
    })?;
    let source = Source::normalized(
        result.normalized_text,
        text,
        result.highest_extern_param_id,
        constants,
    )?;

    if cfg.verify_normalized {
        if let Err(normalized_err) = parser.parse(source.text()) {
            // The original text decides: its own error wins, and if it parses
            // the normalizer is at fault and the query is kept as written.
            parser.parse(text)?;
            warn!(
                error = %normalized_err,
                "normalized text rejected by parser; keeping original text"
            );
            return Source::from_string(text).map_err(NormalizeError::from);
        }
    }

    Ok(source)
}
