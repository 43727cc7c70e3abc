//! Error types for grammar compilation and parse reporting.
//!
//! Compilation problems are real errors: the caller gets no aggregation and
//! the grammar has to be fixed. Parse problems are *reports*: they go through
//! a callback that decides whether the parse continues, because a stray
//! character in otherwise healthy input is often worth skipping.

use serde::Serialize;
use std::fmt;

/// Errors that reject a grammar during compilation.
///
/// These are rejections, not panics: a pathological grammar is an expected
/// input, and the compiler answers it by producing no aggregation.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildError {
    /// A description's optional-phrase count would blow the power-set
    /// expansion past the configured ceiling.
    TooManyOptionals {
        definition: String,
        count: usize,
        limit: usize,
    },
    /// A description with zero phrases can never match anything.
    EmptyDescription { definition: String },
    /// A phrase references a symbol no definition provides.
    DanglingReference { definition: String, symbol: String },
    /// An angle-bracketed class name the engine does not know.
    UnknownClass { definition: String, class: String },
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::TooManyOptionals {
                definition,
                count,
                limit,
            } => write!(
                f,
                "definition '{}' has {} optional phrases in one description; \
                 the expansion ceiling is {}",
                definition, count, limit
            ),
            BuildError::EmptyDescription { definition } => {
                write!(f, "definition '{}' has a description with no phrases", definition)
            }
            BuildError::DanglingReference { definition, symbol } => write!(
                f,
                "definition '{}' references '{}', which no definition provides",
                definition, symbol
            ),
            BuildError::UnknownClass { definition, class } => write!(
                f,
                "definition '{}' uses unknown character class <{}>",
                definition, class
            ),
        }
    }
}

impl std::error::Error for BuildError {}

/// Classification of a parse failure at one input position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    /// No terminal symbol recognizes the code point at all.
    Character,
    /// Characters are recognized but never compose into any lexical
    /// (above-atom) symbol.
    Lexical,
    /// Lexical symbols form but never compose into any syntax-level symbol.
    Syntax,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Character => write!(f, "character"),
            ErrorKind::Lexical => write!(f, "lexical"),
            ErrorKind::Syntax => write!(f, "syntax"),
        }
    }
}

/// One classified parse failure, delivered to the report callback.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParseReport {
    pub kind: ErrorKind,
    /// Scan position (in code points) of the offending character.
    pub position: usize,
    /// The code point that triggered the report, when one is attributable.
    pub code_point: Option<char>,
    /// Names of the symbols the live matches were expecting at this position.
    pub expectations: Vec<String>,
}

impl fmt::Display for ParseReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error at position {}", self.kind, self.position)?;
        if let Some(c) = self.code_point {
            write!(f, " on {:?}", c)?;
        }
        if !self.expectations.is_empty() {
            write!(f, " (expected {})", self.expectations.join(", "))?;
        }
        Ok(())
    }
}

/// Callback invoked for every classified failure. Returning `false` aborts
/// the current parse immediately.
pub type ReportHandler = Box<dyn FnMut(&ParseReport) -> bool>;
