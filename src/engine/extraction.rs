//! Match results.
//!
//! Three shapes, mirroring the grammar model one level up:
//!
//! - [`TextSpan`]: what one cell captured. A terminal capture is plain text;
//!   a capture produced by a nested symbol carries that symbol's [`Results`]
//!   as its `buddy`, so the tree of spans mirrors the parse.
//! - [`Pattern`]: one trend's completed match, an ordered list of spans.
//! - [`Results`]: everything a cluster matched at one start position. A
//!   cluster can complete several trends over the same characters; `extract`
//!   collapses that ambiguity to the longest pattern.
//!
//! Positions and lengths count Unicode code points, not bytes.

use serde::Serialize;

use super::grammar::{CellId, ClusterId, TrendId};

/// Text captured by a single cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextSpan {
    pub text: String,
    pub position: usize,
    pub length: usize,
    /// The cell that captured this span, when one did; spans synthesized for
    /// raw terminal hits have none.
    pub cell: Option<CellId>,
    /// The nested results that produced this span, for non-terminal captures.
    pub buddy: Option<Box<Results>>,
}

impl TextSpan {
    pub fn new(text: impl Into<String>, position: usize) -> Self {
        let text = text.into();
        let length = text.chars().count();
        Self {
            text,
            position,
            length,
            cell: None,
            buddy: None,
        }
    }

    pub fn end(&self) -> usize {
        self.position + self.length
    }
}

/// One trend's completed match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pattern {
    pub trend: TrendId,
    pub position: usize,
    pub length: usize,
    pub extractions: Vec<TextSpan>,
}

impl Pattern {
    pub fn new(trend: TrendId, position: usize) -> Self {
        Self {
            trend,
            position,
            length: 0,
            extractions: Vec::new(),
        }
    }

    /// Append a captured span and grow the pattern to cover it.
    pub fn push(&mut self, span: TextSpan) {
        let end = span.end();
        if end > self.position + self.length {
            self.length = end - self.position;
        }
        self.extractions.push(span);
    }

    pub fn end(&self) -> usize {
        self.position + self.length
    }

    /// The full matched text, reassembled from the spans.
    pub fn text(&self) -> String {
        self.extractions.iter().map(|s| s.text.as_str()).collect()
    }
}

/// Everything one cluster matched at one start position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Results {
    pub cluster: ClusterId,
    pub symbol: String,
    pub position: usize,
    pub length: usize,
    pub patterns: Vec<Pattern>,
}

impl Results {
    pub fn new(cluster: ClusterId, symbol: impl Into<String>, position: usize) -> Self {
        Self {
            cluster,
            symbol: symbol.into(),
            position,
            length: 0,
            patterns: Vec::new(),
        }
    }

    /// Fold another pattern for the same cluster and position into this
    /// result set, growing the covered length if the pattern reaches further.
    pub fn include(&mut self, pattern: Pattern) {
        if pattern.end() > self.position + self.length {
            self.length = pattern.end() - self.position;
        }
        self.patterns.push(pattern);
    }

    pub fn end(&self) -> usize {
        self.position + self.length
    }

    /// Collapse ambiguity: the longest pattern wins, earliest-recorded first
    /// on ties.
    pub fn extract(&self) -> Option<&Pattern> {
        let mut best: Option<&Pattern> = None;
        for pattern in &self.patterns {
            match best {
                Some(current) if pattern.length <= current.length => {}
                _ => best = Some(pattern),
            }
        }
        best
    }

    /// The matched text of the winning pattern.
    pub fn text(&self) -> String {
        self.extract().map(|p| p.text()).unwrap_or_default()
    }

    /// Wrap these results as a captured span for the given cell, so a parent
    /// trend can take the whole sub-match as one slot filling.
    pub fn to_span(&self, cell: CellId) -> TextSpan {
        TextSpan {
            text: self.text(),
            position: self.position,
            length: self.length,
            cell: Some(cell),
            buddy: Some(Box::new(self.clone())),
        }
    }
}
