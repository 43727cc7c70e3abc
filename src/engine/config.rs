//! Engine configuration.
//!
//! The tunables ship in `defaults/trellis.default.toml`, embedded at compile
//! time so the defaults cannot drift from the code that reads them.
//! [`Loader`] stacks user files and explicit overrides on top of that layer
//! and deserializes the result into an [`EngineConfig`].

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, ValueKind};
use serde::Deserialize;
use std::path::Path;

const DEFAULT_TOML: &str = include_str!("../../defaults/trellis.default.toml");

/// Top-level configuration consumed by the engine.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EngineConfig {
    pub compiler: CompilerConfig,
    pub matching: MatchingConfig,
}

/// Knobs for the grammar compiler.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CompilerConfig {
    /// Ceiling on optional phrases per description. A description with k
    /// optionals expands into 2^k alternatives, so this bounds the blow-up.
    pub max_optionals: usize,
}

/// Knobs for recursion classification and matching.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MatchingConfig {
    /// Minimum hop count for a reappearance of the owning symbol to count as
    /// deep (self-embedding) recursion.
    pub deep_recurse_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            compiler: CompilerConfig { max_optionals: 6 },
            matching: MatchingConfig {
                deep_recurse_depth: 3,
            },
        }
    }
}

/// A stack of configuration layers, embedded defaults at the bottom.
#[derive(Debug, Clone)]
pub struct Loader {
    builder: ConfigBuilder<DefaultState>,
}

impl Loader {
    /// A stack holding only the embedded defaults.
    pub fn new() -> Self {
        let builder = Config::builder().add_source(File::from_str(DEFAULT_TOML, FileFormat::Toml));
        Self { builder }
    }

    /// Stack a TOML file on top. The file must exist when `build` runs.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(true);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Stack a TOML file that is allowed to be absent.
    pub fn with_optional_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(false);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Pin one dotted key above every file layer.
    pub fn set_override<I>(mut self, key: &str, value: I) -> Result<Self, ConfigError>
    where
        I: Into<ValueKind>,
    {
        self.builder = self.builder.set_override(key, value)?;
        Ok(self)
    }

    /// Collapse the stack into an [`EngineConfig`].
    pub fn build(self) -> Result<EngineConfig, ConfigError> {
        self.builder.build()?.try_deserialize()
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience helper for callers that only need the defaults.
pub fn load_defaults() -> Result<EngineConfig, ConfigError> {
    Loader::new().build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_defaults_parse() {
        let config = load_defaults().expect("defaults should parse");
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn overrides_layer_over_defaults() {
        let config = Loader::new()
            .set_override("compiler.max_optionals", 10_i64)
            .expect("override")
            .build()
            .expect("build");
        assert_eq!(config.compiler.max_optionals, 10);
        assert_eq!(config.matching.deep_recurse_depth, 3);
    }
}
