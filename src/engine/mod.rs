//! The matching engine.
//!
//! Pipeline, bottom to top:
//!
//! 1. [`source`]: the external grammar-source tree (definitions, alternative
//!    descriptions, phrases).
//! 2. [`grammar`]: the compiled model (clusters, trends and cells in an
//!    index arena) plus the compiler and the pure graph queries.
//! 3. [`extraction`]: what matches produce: spans, patterns, results.
//! 4. [`matrix`]: the live matching state, one row of stacked lines per
//!    trend.
//! 5. [`parser`]: the character-driven driver tying it all together.
//!
//! [`config`] carries the tunables, [`error`] the compile rejections and the
//! parse-report taxonomy, [`testing`] shared grammar fixtures.

pub mod config;
pub mod error;
pub mod extraction;
pub mod grammar;
pub mod matrix;
pub mod parser;
pub mod serial;
pub mod source;
pub mod testing;

pub use config::{EngineConfig, Loader};
pub use error::{BuildError, ErrorKind, ParseReport, ReportHandler};
pub use extraction::{Pattern, Results, TextSpan};
pub use grammar::builder::Builder;
pub use grammar::Aggregation;
pub use parser::{Parser, Step};
pub use source::{Definition, Description, GrammarSource, Phrase};
