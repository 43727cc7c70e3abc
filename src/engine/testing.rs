//! Shared grammar fixtures for tests.
//!
//! Matching behavior is sensitive to small grammar details: whether a trend
//! is left- or deep-recursive changes which transition rules fire. Tests
//! should therefore build on these curated fixtures rather than ad-hoc
//! grammars, so that a fixture tweak updates every test exercising the same
//! shape.
//!
//! - [`numbers`]: the canonical left-recursion (fold) shape.
//! - [`expressions`]: the canonical self-embedding (deep recursion) shape.
//! - [`sums`]: a fold nested inside a non-recursive bracket pair; exercises
//!   pivot stalling.

use super::config::EngineConfig;
use super::error::BuildError;
use super::parser::Parser;
use super::source::Definition;

/// `Digit -> '0' | '1'`, `Number -> Digit | Number Digit`.
pub fn numbers() -> Vec<Definition> {
    vec![
        Definition::new("Digit").alt(["'0'"]).alt(["'1'"]),
        Definition::new("Number").alt(["Digit"]).alt(["Number", "Digit"]),
    ]
}

/// `Digit -> '0' | '1'`, `Expr -> Digit | '(' Expr ')'`.
pub fn expressions() -> Vec<Definition> {
    vec![
        Definition::new("Digit").alt(["'0'"]).alt(["'1'"]),
        Definition::new("Expr")
            .alt(["Digit"])
            .alt(["'('", "Expr", "')'"]),
    ]
}

/// `Digit -> '1' | '2'`, `Sum -> Digit | Sum '+' Digit`,
/// `Paren -> '(' Sum ')'`.
pub fn sums() -> Vec<Definition> {
    vec![
        Definition::new("Digit").alt(["'1'"]).alt(["'2'"]),
        Definition::new("Sum").alt(["Digit"]).alt(["Sum", "'+'", "Digit"]),
        Definition::new("Paren").alt(["'('", "Sum", "')'"]),
    ]
}

/// Compile a fixture and open a session with default configuration.
pub fn session(name: &str, definitions: Vec<Definition>) -> Result<Parser, BuildError> {
    Parser::from_source(name, definitions, EngineConfig::default())
}
