//! Literal token kinds and their wire-protocol types.
//!
//! The table is closed: a literal kind the parser reports must appear here or
//! extraction fails. Adding a kind means updating the parser's token table in
//! lockstep.
//!
//! | token | kind | type |
//! |-------|------|------|
//! | `FCONST` | [`Float`](LiteralTokenKind::Float) | `numeric` (1700) |
//! | `ICONST` | [`Integer`](LiteralTokenKind::Integer) | `int4` (23) |
//! | `TRUE_P` / `FALSE_P` | [`True`](LiteralTokenKind::True) / [`False`](LiteralTokenKind::False) | `bool` (16) |
//! | `SCONST` | [`String`](LiteralTokenKind::String) | `unknown` (705) |
//! | `BCONST` / `XCONST` | [`BitString`](LiteralTokenKind::BitString) / [`HexString`](LiteralTokenKind::HexString) | `varbit` (1562) |

use std::fmt;

use serde::{Deserialize, Serialize};

/// PostgreSQL type OIDs used for extracted constants.
pub mod oid {
    pub const BOOL: u32 = 16;
    pub const INT4: u32 = 23;
    /// Untyped string literal; the server infers the type from context.
    pub const UNKNOWN: u32 = 705;
    pub const VARBIT: u32 = 1562;
    pub const NUMERIC: u32 = 1700;
}

/// Lexical category of an extracted literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LiteralTokenKind {
    #[serde(rename = "FCONST")]
    Float,
    #[serde(rename = "ICONST")]
    Integer,
    #[serde(rename = "TRUE_P")]
    True,
    #[serde(rename = "FALSE_P")]
    False,
    #[serde(rename = "SCONST")]
    String,
    #[serde(rename = "BCONST")]
    BitString,
    #[serde(rename = "XCONST")]
    HexString,
}

impl LiteralTokenKind {
    pub const ALL: [LiteralTokenKind; 7] = [
        LiteralTokenKind::Float,
        LiteralTokenKind::Integer,
        LiteralTokenKind::True,
        LiteralTokenKind::False,
        LiteralTokenKind::String,
        LiteralTokenKind::BitString,
        LiteralTokenKind::HexString,
    ];

    /// Grammar token name, as written to the binary encoding.
    pub const fn name(self) -> &'static str {
        match self {
            LiteralTokenKind::Float => "FCONST",
            LiteralTokenKind::Integer => "ICONST",
            LiteralTokenKind::True => "TRUE_P",
            LiteralTokenKind::False => "FALSE_P",
            LiteralTokenKind::String => "SCONST",
            LiteralTokenKind::BitString => "BCONST",
            LiteralTokenKind::HexString => "XCONST",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Wire-protocol type the literal's text form is sent as.
    pub const fn type_oid(self) -> u32 {
        match self {
            LiteralTokenKind::Float => oid::NUMERIC,
            LiteralTokenKind::Integer => oid::INT4,
            LiteralTokenKind::True | LiteralTokenKind::False => oid::BOOL,
            LiteralTokenKind::String => oid::UNKNOWN,
            LiteralTokenKind::BitString | LiteralTokenKind::HexString => oid::VARBIT,
        }
    }
}

impl fmt::Display for LiteralTokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
