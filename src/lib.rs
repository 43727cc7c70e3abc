//! # trellis
//!
//! An incremental, character-driven grammar-matching engine. A grammar is
//! handed in as a tree of definitions, compiled into a cluster/trend/cell
//! model, and then driven one Unicode code point at a time; left-recursive,
//! right-recursive and self-embedding alternatives are all matched without
//! backtracking over previous input.
//!
//! The engine lives in the [`engine`] module; [`engine::Parser`] is the main
//! entry point.

pub mod engine;

pub use engine::{
    Aggregation, BuildError, Builder, Definition, Description, EngineConfig, ErrorKind,
    GrammarSource, Loader, ParseReport, Parser, Pattern, Phrase, Results, Step, TextSpan,
};
