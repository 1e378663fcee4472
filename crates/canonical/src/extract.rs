//! Constant extraction from normalizer location records.

use parser::LocationRecord;
use tracing::error;

use crate::error::InternalError;
use crate::literal::LiteralTokenKind;
use crate::source::ExtractedConstant;

/// Resolve a location's parameter id against the highest explicit id.
///
/// Negative ids are relative: `-k` names the k-th synthesized parameter,
/// which lands at `highest_extern_param_id + k`.
///
/// ```rust
/// use canonical::resolve_param_id;
///
/// assert_eq!(resolve_param_id(3, -2), 5);
/// assert_eq!(resolve_param_id(3, 2), 2);
/// ```
pub fn resolve_param_id(highest_extern_param_id: i32, param_id: i32) -> i32 {
    if param_id < 0 {
        highest_extern_param_id.saturating_add(param_id.saturating_abs())
    } else {
        param_id
    }
}

/// Turn location records into `(param_id, kind, raw_value)` constants.
///
/// Records with `length == -1` or without a raw value are skipped. The output
/// keeps record order; sorting happens once, in [`Source::normalized`](crate::Source::normalized).
///
/// `token_name` is the parser's own token table. A code it cannot name, or a
/// name missing from the literal table, is an [`InternalError`].
pub fn extract_constants<F>(
    highest_extern_param_id: i32,
    locations: &[LocationRecord],
    token_name: F,
) -> Result<Vec<ExtractedConstant>, InternalError>
where
    F: Fn(i32) -> Option<&'static str>,
{
    let mut constants = Vec::with_capacity(locations.len());

    for record in locations {
        if record.is_elided() {
            continue;
        }
        let Some(raw_value) = record.raw_value.as_ref() else {
            continue;
        };

        let Some(name) = token_name(record.token_kind) else {
            error!(token_kind = record.token_kind, "unknown_token_kind");
            return Err(InternalError::UnknownTokenKind(record.token_kind));
        };
        let Some(token_kind) = LiteralTokenKind::from_name(name) else {
            error!(token = name, "unmapped_literal_token");
            return Err(InternalError::UnmappedLiteral(name.to_string()));
        };

        constants.push(ExtractedConstant {
            param_id: resolve_param_id(highest_extern_param_id, record.param_id),
            token_kind,
            raw_value: raw_value.clone(),
        });
    }

    Ok(constants)
}
