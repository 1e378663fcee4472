//! [`QueryParser`] backed by `sqlparser` with the PostgreSQL dialect.

use std::collections::HashSet;
use std::ops::ControlFlow;

use sqlparser::ast::{
    Distinct, Expr, GroupByExpr, OrderByKind, Query, SetExpr, Statement, Value, Visit, Visitor,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::{Parser, ParserError};
use sqlparser::tokenizer::{Location, Span, Token, TokenWithSpan, Tokenizer, TokenizerError};
use tracing::trace;

use crate::error::ParseError;
use crate::location::{LocationRecord, NormalizationResult, ELIDED_LENGTH};
use crate::position::LineIndex;
use crate::token::LexToken;
use crate::QueryParser;

const LOCATION_MARKER: &str = " at Line: ";
const COLUMN_MARKER: &str = ", Column: ";

/// Highest `$N` accepted. The wire protocol counts bind parameters in a u16.
pub const MAX_PARAM_ID: i32 = 65_535;

/// PostgreSQL-dialect parser and literal normalizer.
///
/// Normalization parses the text and collects constant expressions from the
/// tree. Each one is replaced by the next free `$N` placeholder and the rest
/// of the text is kept byte-for-byte. Constants that are not values stay
/// verbatim: positional `ORDER BY` / `GROUP BY` / `DISTINCT ON` references,
/// and the string part of typed literals such as `DATE '2020-01-01'` or
/// `INTERVAL '1 day'`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresParser;

impl PostgresParser {
    pub fn new() -> Self {
        Self
    }
}

/// Statements produced by [`PostgresParser::parse`].
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedQuery {
    statements: Vec<Statement>,
}

impl ParsedQuery {
    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn into_statements(self) -> Vec<Statement> {
        self.statements
    }
}

impl QueryParser for PostgresParser {
    type Tree = ParsedQuery;

    fn parse(&self, text: &str) -> Result<ParsedQuery, ParseError> {
        let (_, statements) = tokenize_and_parse(text)?;
        Ok(ParsedQuery { statements })
    }

    fn normalize(&self, text: &str) -> Result<NormalizationResult, ParseError> {
        // Normalization only runs on text the grammar accepts.
        let (tokens, statements) = tokenize_and_parse(text)?;
        let index = LineIndex::new(text);
        let highest = highest_placeholder(&tokens);

        let mut locations = Vec::new();
        for TokenWithSpan { token, span } in &tokens {
            if let Token::Placeholder(placeholder) = token {
                if let Some(param_id) = explicit_param_id(placeholder) {
                    let start = byte_offset(&index, span.start)?;
                    locations.push(LocationRecord {
                        location: to_i32(start)?,
                        length: ELIDED_LENGTH,
                        param_id,
                        token_kind: LexToken::Param.code(),
                        raw_value: None,
                    });
                }
            }
        }

        let mut literals = Vec::new();
        for (span, value) in constant_values(&statements) {
            let start = byte_offset(&index, span.start)?;
            let end = byte_offset(&index, span.end)?;
            if end < start {
                return Err(ParseError::unpositioned(format!(
                    "parser reported inverted span {start}..{end}"
                )));
            }
            if let Some(kind) = classify(&value, &text[start..end]) {
                literals.push((start, end, kind, span.start));
            }
        }
        literals.sort_by_key(|(start, ..)| *start);
        literals.dedup_by_key(|(start, ..)| *start);

        let mut normalized_text = String::with_capacity(text.len());
        let mut copied_up_to = 0usize;
        let mut extracted = 0i32;

        for (start, end, kind, position) in literals {
            if start < copied_up_to {
                return Err(ParseError::unpositioned(format!(
                    "parser reported overlapping span {start}..{end}"
                )));
            }

            extracted += 1;
            let absolute = highest.checked_add(extracted).ok_or_else(|| {
                positioned(
                    text,
                    "too many constants to number as parameters".to_string(),
                    position.line,
                    position.column,
                )
            })?;

            normalized_text.push_str(&text[copied_up_to..start]);
            normalized_text.push('$');
            normalized_text.push_str(&absolute.to_string());
            copied_up_to = end;

            locations.push(LocationRecord {
                location: to_i32(start)?,
                length: to_i32(end - start)?,
                param_id: -extracted,
                token_kind: kind.code(),
                raw_value: Some(text.as_bytes()[start..end].to_vec()),
            });
        }
        normalized_text.push_str(&text[copied_up_to..]);
        locations.sort_by_key(|l| l.location);

        trace!(
            highest_extern_param_id = highest,
            literals = extracted,
            "postgres.normalize"
        );

        Ok(NormalizationResult {
            normalized_text,
            highest_extern_param_id: highest,
            locations,
        })
    }

    fn token_name(&self, kind: i32) -> Option<&'static str> {
        crate::token::token_name(kind)
    }
}

fn tokenize_and_parse(text: &str) -> Result<(Vec<TokenWithSpan>, Vec<Statement>), ParseError> {
    let dialect = PostgreSqlDialect {};
    let tokens = Tokenizer::new(&dialect, text)
        .tokenize_with_location()
        .map_err(|err| tokenizer_error(text, &err))?;
    check_param_ids(text, &tokens)?;
    let statements = Parser::new(&dialect)
        .with_tokens_with_locations(tokens.clone())
        .parse_statements()
        .map_err(|err| parser_error(text, err))?;
    Ok((tokens, statements))
}

/// Collects constant expressions and the ones that must not become
/// parameters.
#[derive(Default)]
struct ConstantCollector {
    values: Vec<(Span, Value)>,
    /// Start positions of values that stay verbatim.
    pinned: HashSet<(u64, u64)>,
}

impl ConstantCollector {
    fn pin(&mut self, expr: &Expr) {
        if let Expr::Value(value) = expr {
            self.pinned
                .insert((value.span.start.line, value.span.start.column));
        }
    }

    fn pin_all<'e>(&mut self, exprs: impl IntoIterator<Item = &'e Expr>) {
        for expr in exprs {
            self.pin(expr);
        }
    }

    // Nested queries get their own `pre_visit_query` call.
    fn pin_set_expr(&mut self, body: &SetExpr) {
        match body {
            SetExpr::Select(select) => {
                if let GroupByExpr::Expressions(exprs, _) = &select.group_by {
                    self.pin_all(exprs);
                }
                if let Some(Distinct::On(exprs)) = &select.distinct {
                    self.pin_all(exprs);
                }
            }
            SetExpr::SetOperation { left, right, .. } => {
                self.pin_set_expr(left);
                self.pin_set_expr(right);
            }
            _ => {}
        }
    }
}

impl Visitor for ConstantCollector {
    type Break = ();

    fn pre_visit_query(&mut self, query: &Query) -> ControlFlow<()> {
        if let Some(order_by) = &query.order_by {
            if let OrderByKind::Expressions(exprs) = &order_by.kind {
                self.pin_all(exprs.iter().map(|e| &e.expr));
            }
        }
        self.pin_set_expr(&query.body);
        ControlFlow::Continue(())
    }

    fn pre_visit_expr(&mut self, expr: &Expr) -> ControlFlow<()> {
        match expr {
            Expr::Value(value) => self.values.push((value.span, value.value.clone())),
            Expr::Interval(interval) => self.pin(&interval.value),
            _ => {}
        }
        ControlFlow::Continue(())
    }
}

/// Constant values that may become parameters, with their spans.
fn constant_values(statements: &[Statement]) -> Vec<(Span, Value)> {
    let mut collector = ConstantCollector::default();
    for statement in statements {
        let _ = statement.visit(&mut collector);
    }
    let ConstantCollector { values, pinned } = collector;
    values
        .into_iter()
        .filter(|(span, _)| span.start.line > 0)
        .filter(|(span, _)| !pinned.contains(&(span.start.line, span.start.column)))
        .collect()
}

/// Lexical kind of a constant, `None` for values that are not literals
/// (`NULL`, placeholders).
fn classify(value: &Value, raw: &str) -> Option<LexToken> {
    match value {
        Value::Number(..) => Some(if is_int4(raw) {
            LexToken::IConst
        } else {
            LexToken::FConst
        }),
        Value::SingleQuotedString(_)
        | Value::NationalStringLiteral(_)
        | Value::EscapedStringLiteral(_)
        | Value::UnicodeStringLiteral(_)
        | Value::DollarQuotedString(_) => Some(LexToken::SConst),
        Value::SingleQuotedByteStringLiteral(_) => Some(LexToken::BConst),
        Value::HexStringLiteral(_) => Some(LexToken::XConst),
        Value::Boolean(true) => Some(LexToken::TrueP),
        Value::Boolean(false) => Some(LexToken::FalseP),
        _ => None,
    }
}

// The PostgreSQL lexer promotes integers that overflow int4 to FCONST.
// Digit separators (`1_000`) are part of integer literals since PostgreSQL 16.
fn is_int4(raw: &str) -> bool {
    let digits: String = raw.chars().filter(|c| *c != '_').collect();
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) && digits.parse::<i32>().is_ok()
}

fn explicit_param_id(placeholder: &str) -> Option<i32> {
    placeholder
        .strip_prefix('$')?
        .parse::<i32>()
        .ok()
        .filter(|id| *id > 0)
}

fn check_param_ids(text: &str, tokens: &[TokenWithSpan]) -> Result<(), ParseError> {
    for TokenWithSpan { token, span } in tokens {
        let Token::Placeholder(placeholder) = token else {
            continue;
        };
        let Some(digits) = placeholder.strip_prefix('$') else {
            continue;
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            continue;
        }
        let in_range = digits
            .parse::<i32>()
            .is_ok_and(|id| id <= MAX_PARAM_ID);
        if !in_range {
            return Err(positioned(
                text,
                format!("parameter {placeholder} exceeds the maximum of ${MAX_PARAM_ID}"),
                span.start.line,
                span.start.column,
            ));
        }
    }
    Ok(())
}

fn highest_placeholder(tokens: &[TokenWithSpan]) -> i32 {
    tokens
        .iter()
        .filter_map(|t| match &t.token {
            Token::Placeholder(placeholder) => explicit_param_id(placeholder),
            _ => None,
        })
        .max()
        .unwrap_or(0)
}

fn byte_offset(index: &LineIndex<'_>, location: Location) -> Result<usize, ParseError> {
    index
        .byte_offset(location.line, location.column)
        .ok_or_else(|| {
            ParseError::unpositioned(format!(
                "parser location {}:{} is outside the query text",
                location.line, location.column
            ))
        })
}

fn to_i32(value: usize) -> Result<i32, ParseError> {
    i32::try_from(value).map_err(|_| ParseError::unpositioned("query text too long"))
}

fn tokenizer_error(text: &str, err: &TokenizerError) -> ParseError {
    positioned(text, err.message.clone(), err.location.line, err.location.column)
}

fn parser_error(text: &str, err: ParserError) -> ParseError {
    let raw = match err {
        ParserError::TokenizerError(msg) | ParserError::ParserError(msg) => msg,
        other => other.to_string(),
    };
    match split_location(&raw) {
        Some((message, line, column)) => positioned(text, message.to_string(), line, column),
        None => ParseError::unpositioned(raw),
    }
}

fn positioned(text: &str, message: String, line: u64, column: u64) -> ParseError {
    if line == 0 {
        return ParseError::unpositioned(message);
    }
    let cursor = LineIndex::new(text)
        .cursor_position(line, column)
        .and_then(|c| u32::try_from(c).ok())
        .unwrap_or(0);
    ParseError::new(message, u32::try_from(line).unwrap_or(u32::MAX), cursor)
}

/// Split `"<message> at Line: L, Column: C"` into its parts.
fn split_location(raw: &str) -> Option<(&str, u64, u64)> {
    let idx = raw.rfind(LOCATION_MARKER)?;
    let (line, column) = raw[idx + LOCATION_MARKER.len()..].split_once(COLUMN_MARKER)?;
    let line = line.trim().parse().ok()?;
    let column = column.trim().parse().ok()?;
    Some((raw[..idx].trim_end(), line, column))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn literal_locations(result: &NormalizationResult) -> Vec<&LocationRecord> {
        result.locations.iter().filter(|l| !l.is_elided()).collect()
    }

    #[test]
    fn replaces_literals_in_source_order() {
        let text = "SELECT * FROM t WHERE id = 5 AND name = 'bob'";
        let result = PostgresParser.normalize(text).expect("normalize");

        assert_eq!(
            result.normalized_text,
            "SELECT * FROM t WHERE id = $1 AND name = $2"
        );
        assert_eq!(result.highest_extern_param_id, 0);
        assert_eq!(
            result.locations,
            vec![
                LocationRecord {
                    location: 27,
                    length: 1,
                    param_id: -1,
                    token_kind: LexToken::IConst.code(),
                    raw_value: Some(b"5".to_vec()),
                },
                LocationRecord {
                    location: 40,
                    length: 5,
                    param_id: -2,
                    token_kind: LexToken::SConst.code(),
                    raw_value: Some(b"'bob'".to_vec()),
                },
            ]
        );
    }

    #[test]
    fn explicit_parameters_raise_the_base() {
        let result = PostgresParser
            .normalize("SELECT a FROM t WHERE a = $2 AND b = 7")
            .expect("normalize");

        assert_eq!(
            result.normalized_text,
            "SELECT a FROM t WHERE a = $2 AND b = $3"
        );
        assert_eq!(result.highest_extern_param_id, 2);

        let params: Vec<_> = result.locations.iter().filter(|l| l.is_elided()).collect();
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].param_id, 2);
        assert_eq!(params[0].token_kind, LexToken::Param.code());
        assert_eq!(params[0].raw_value, None);

        let literals = literal_locations(&result);
        assert_eq!(literals.len(), 1);
        assert_eq!(literals[0].param_id, -1);
    }

    #[test]
    fn offsets_are_bytes_across_lines() {
        let text = "SELECT 'é'\n  , 42";
        let result = PostgresParser.normalize(text).expect("normalize");

        assert_eq!(result.normalized_text, "SELECT $1\n  , $2");
        let literals = literal_locations(&result);
        assert_eq!((literals[0].location, literals[0].length), (7, 4));
        assert_eq!((literals[1].location, literals[1].length), (16, 2));
        assert_eq!(literals[1].raw_value.as_deref(), Some(&b"42"[..]));
    }

    #[test]
    fn comments_and_spacing_survive() {
        let result = PostgresParser
            .normalize("SELECT  1 -- one\n")
            .expect("normalize");
        assert_eq!(result.normalized_text, "SELECT  $1 -- one\n");
    }

    #[test]
    fn numeric_and_boolean_kinds() {
        let result = PostgresParser
            .normalize("SELECT 3000000000, 1.5, TRUE, false")
            .expect("normalize");
        let kinds: Vec<i32> = literal_locations(&result)
            .iter()
            .map(|l| l.token_kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                LexToken::FConst.code(),
                LexToken::FConst.code(),
                LexToken::TrueP.code(),
                LexToken::FalseP.code(),
            ]
        );
        assert_eq!(result.normalized_text, "SELECT $1, $2, $3, $4");
    }

    #[test]
    fn hex_bit_string_is_xconst() {
        let result = PostgresParser
            .normalize("SELECT X'1F'")
            .expect("normalize");
        let literals = literal_locations(&result);
        assert_eq!(literals.len(), 1);
        assert_eq!(literals[0].token_kind, LexToken::XConst.code());
        assert_eq!(literals[0].raw_value.as_deref(), Some(&b"X'1F'"[..]));
    }

    #[test]
    fn classify_constant_values() {
        assert_eq!(
            classify(&Value::Number("42".into(), false), "42"),
            Some(LexToken::IConst)
        );
        assert_eq!(
            classify(&Value::Number("1e3".into(), false), "1e3"),
            Some(LexToken::FConst)
        );
        assert_eq!(
            classify(&Value::SingleQuotedByteStringLiteral("101".into()), "B'101'"),
            Some(LexToken::BConst)
        );
        assert_eq!(
            classify(&Value::EscapedStringLiteral("a\\n".into()), "E'a\\n'"),
            Some(LexToken::SConst)
        );
        assert_eq!(classify(&Value::Null, "NULL"), None);
        assert_eq!(classify(&Value::Placeholder("$1".into()), "$1"), None);
    }

    #[test]
    fn quoted_true_is_an_identifier() {
        let text = r#"SELECT "true" FROM t"#;
        let result = PostgresParser.normalize(text).expect("normalize");
        assert_eq!(result.normalized_text, text);
        assert!(result.locations.is_empty());
    }

    #[test]
    fn null_is_not_a_constant() {
        let text = "SELECT * FROM t WHERE a IS NULL OR b = NULL";
        let result = PostgresParser.normalize(text).expect("normalize");
        assert_eq!(result.normalized_text, text);
    }

    #[test]
    fn sort_and_group_positions_stay_verbatim() {
        for text in [
            "SELECT a, b FROM t ORDER BY 2",
            "SELECT a, count(*) FROM t GROUP BY 1 ORDER BY 1 DESC",
            "SELECT DISTINCT ON (1) a, b FROM t",
            "SELECT a FROM t UNION SELECT b FROM u ORDER BY 1",
        ] {
            let result = PostgresParser.normalize(text).expect("normalize");
            assert_eq!(result.normalized_text, text);
            assert!(literal_locations(&result).is_empty(), "{text}");
        }
    }

    #[test]
    fn sort_expressions_still_lose_their_constants() {
        let result = PostgresParser
            .normalize("SELECT a FROM t WHERE b > 3 ORDER BY a + 1, 2")
            .expect("normalize");
        assert_eq!(
            result.normalized_text,
            "SELECT a FROM t WHERE b > $1 ORDER BY a + $2, 2"
        );
    }

    #[test]
    fn positions_inside_subqueries_stay_verbatim() {
        let result = PostgresParser
            .normalize("SELECT * FROM (SELECT a, b FROM t ORDER BY 2 LIMIT 5) s WHERE a = 'x'")
            .expect("normalize");
        assert_eq!(
            result.normalized_text,
            "SELECT * FROM (SELECT a, b FROM t ORDER BY 2 LIMIT $1) s WHERE a = $2"
        );
    }

    #[test]
    fn typed_literals_stay_verbatim() {
        for text in [
            "SELECT * FROM t WHERE d = DATE '2020-01-01'",
            "SELECT now() - TIMESTAMP '2020-01-01 00:00'",
            "SELECT interval '1 day'",
        ] {
            let result = PostgresParser.normalize(text).expect("normalize");
            assert_eq!(result.normalized_text, text);
        }
    }

    #[test]
    fn constants_outside_expressions_stay_verbatim() {
        let result = PostgresParser
            .normalize("SELECT CAST(x AS varchar(10)) FROM t WHERE y IS TRUE AND z = 2")
            .expect("normalize");
        assert_eq!(
            result.normalized_text,
            "SELECT CAST(x AS varchar(10)) FROM t WHERE y IS TRUE AND z = $1"
        );
    }

    #[test]
    fn cast_literals_are_replaced() {
        let result = PostgresParser
            .normalize("SELECT '2020-01-01'::date, CAST('7' AS int)")
            .expect("normalize");
        assert_eq!(
            result.normalized_text,
            "SELECT $1::date, CAST($2 AS int)"
        );
    }

    #[test]
    fn underscore_integers_are_iconst() {
        assert!(is_int4("1_000"));
        assert!(!is_int4("3_000_000_000"));

        let result = PostgresParser.normalize("SELECT 1_000").expect("normalize");
        assert_eq!(result.normalized_text, "SELECT $1");
        assert_eq!(
            literal_locations(&result)[0].token_kind,
            LexToken::IConst.code()
        );
    }

    #[test]
    fn function_body_string_is_a_constant() {
        let result = PostgresParser
            .normalize("CREATE FUNCTION one() RETURNS integer AS 'SELECT 1' LANGUAGE sql")
            .expect("normalize");
        assert_eq!(
            result.normalized_text,
            "CREATE FUNCTION one() RETURNS integer AS $1 LANGUAGE sql"
        );
        assert!(PostgresParser.parse(&result.normalized_text).is_err());
    }

    #[test]
    fn parameter_above_limit_is_positioned() {
        let err = PostgresParser
            .parse("SELECT a FROM t WHERE a = $2147483647")
            .expect_err("parameter out of range");
        assert_eq!(err.line, 1);
        assert_eq!(err.cursor_position, 27);
        assert!(err.message.contains("$2147483647"));

        let err = PostgresParser
            .normalize("SELECT $65536, 1")
            .expect_err("parameter out of range");
        assert_eq!((err.line, err.cursor_position), (1, 8));
    }

    #[test]
    fn parameter_at_limit_is_accepted() {
        let result = PostgresParser
            .normalize("SELECT $65535, 1")
            .expect("normalize");
        assert_eq!(result.highest_extern_param_id, MAX_PARAM_ID);
        assert_eq!(result.normalized_text, "SELECT $65535, $65536");
    }

    #[test]
    fn unterminated_string_reports_position() {
        let err = PostgresParser
            .normalize("SELECT 'abc")
            .expect_err("unterminated literal");
        assert_eq!(err.line, 1);
        assert!(err.cursor_position > 0);
        assert!(!err.message.is_empty());
    }

    #[test]
    fn normalize_rejects_what_parse_rejects() {
        let err = PostgresParser
            .normalize("SELEC 1")
            .expect_err("not a statement");
        assert_eq!(err.line, 1);
    }

    #[test]
    fn parse_accepts_valid_sql() {
        let tree = PostgresParser
            .parse("SELECT a FROM t WHERE a = $1")
            .expect("parse");
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn parse_rejects_invalid_sql() {
        let err = PostgresParser
            .parse("SELECT * FROM t WHERE id =")
            .expect_err("incomplete predicate");
        assert!(!err.message.is_empty());
    }

    #[test]
    fn split_location_suffix() {
        assert_eq!(
            split_location("Expected: expression, found: ) at Line: 2, Column: 14"),
            Some(("Expected: expression, found: )", 2, 14))
        );
        assert_eq!(split_location("recursion limit exceeded"), None);
    }

    #[test]
    fn placeholders_other_than_dollar_numbers_are_ignored() {
        assert_eq!(explicit_param_id("$3"), Some(3));
        assert_eq!(explicit_param_id("$0"), None);
        assert_eq!(explicit_param_id("?"), None);
        assert_eq!(explicit_param_id("$name"), None);
    }
}
