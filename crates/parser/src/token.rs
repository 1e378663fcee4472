//! Lexical token table for locations reported by the normalizer.
//!
//! Codes are stable for a given crate version; names follow the PostgreSQL
//! grammar's terminal symbols so that consumers can map them to literal kinds
//! without depending on this crate's enum.

/// Lexical kinds the normalizer can attach to a location record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum LexToken {
    /// Integer literal that fits in a signed 32-bit integer.
    IConst = 1,
    /// Any other numeric literal (decimal, exponent, or out-of-range integer).
    FConst = 2,
    /// Character string literal (`'..'`, `E'..'`, `N'..'`, dollar-quoted).
    SConst = 3,
    /// Binary bit-string literal (`B'0101'`).
    BConst = 4,
    /// Hexadecimal bit-string literal (`X'1F'`).
    XConst = 5,
    TrueP = 6,
    FalseP = 7,
    /// Explicit positional parameter (`$1`). Never carries a raw value.
    Param = 8,
}

const ALL: [LexToken; 8] = [
    LexToken::IConst,
    LexToken::FConst,
    LexToken::SConst,
    LexToken::BConst,
    LexToken::XConst,
    LexToken::TrueP,
    LexToken::FalseP,
    LexToken::Param,
];

impl LexToken {
    pub const fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        ALL.into_iter().find(|token| token.code() == code)
    }

    pub const fn name(self) -> &'static str {
        match self {
            LexToken::IConst => "ICONST",
            LexToken::FConst => "FCONST",
            LexToken::SConst => "SCONST",
            LexToken::BConst => "BCONST",
            LexToken::XConst => "XCONST",
            LexToken::TrueP => "TRUE_P",
            LexToken::FalseP => "FALSE_P",
            LexToken::Param => "PARAM",
        }
    }
}

/// Look up the grammar name for a token code.
pub fn token_name(code: i32) -> Option<&'static str> {
    LexToken::from_code(code).map(LexToken::name)
}
