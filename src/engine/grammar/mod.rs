//! Compiled grammar model.
//!
//! The compiler turns a grammar-source tree into an [`Aggregation`]: an arena
//! of [`Cluster`]s (symbols), [`Trend`]s (alternative productions) and
//! [`Cell`]s (slots), all addressed by stable integer ids. Back-references
//! (`Cell` → owning `Trend`, `Trend` → owning `Cluster`, `Cluster.targets` ↔
//! `Cell.sources`) are stored as ids rather than pointers, which keeps the
//! cyclic grammar graph trivially cloneable.
//!
//! The model is built once, mutated once more by the relink pass (recursion
//! flags, deep closures), and is immutable for the lifetime of a parsing
//! session. Structural changes go through the explicit add/remove operations
//! on the driver, which rebuild and rebind everything.

pub mod builder;
pub mod graph;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt::Write;

use super::serial::SerialCounter;
use super::source::{Definition, Description};

/// Stable index of a cluster within its aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ClusterId(pub usize);

/// Stable index of a trend within its aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TrendId(pub usize);

/// Stable index of a cell within its aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CellId(pub usize);

static LETTER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\p{L}$").expect("letter class"));
static DIGIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\p{Nd}$").expect("digit class"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s$").expect("whitespace class"));
static PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\p{P}$").expect("punct class"));

/// Unicode category / range filter behind a [`ClusterKind::Range`] terminal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum CharFilter {
    Letter,
    Digit,
    Whitespace,
    Punct,
    Any,
    /// An inclusive code-point range, e.g. `<a-z>`.
    Span(char, char),
}

impl CharFilter {
    /// Does the filter accept this code point?
    pub fn matches(&self, c: char) -> bool {
        let mut buf = [0u8; 4];
        let s: &str = c.encode_utf8(&mut buf);
        match self {
            CharFilter::Letter => LETTER.is_match(s),
            CharFilter::Digit => DIGIT.is_match(s),
            CharFilter::Whitespace => WHITESPACE.is_match(s),
            CharFilter::Punct => PUNCT.is_match(s),
            CharFilter::Any => true,
            CharFilter::Span(lo, hi) => *lo <= c && c <= *hi,
        }
    }

    /// The `<…>` notation this filter was written as.
    pub fn label(&self) -> String {
        match self {
            CharFilter::Letter => "<letter>".to_string(),
            CharFilter::Digit => "<digit>".to_string(),
            CharFilter::Whitespace => "<whitespace>".to_string(),
            CharFilter::Punct => "<punct>".to_string(),
            CharFilter::Any => "<any>".to_string(),
            CharFilter::Span(lo, hi) => format!("<{}-{}>", lo, hi),
        }
    }
}

/// What kind of symbol a cluster is, keyed by the one capability that matters
/// to the driver: can it directly accept a raw code point?
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ClusterKind {
    /// Defined by one or more trends; never accepts raw input itself.
    Common,
    /// Accepts exactly one fixed code point.
    Character(char),
    /// Accepts code points matching a class/range filter.
    Range(CharFilter),
}

/// A named grammar symbol.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cluster {
    pub id: ClusterId,
    pub serial: u64,
    pub name: String,
    pub kind: ClusterKind,
    /// Alternative productions, in declaration order. Empty for terminals.
    pub trends: Vec<TrendId>,
    /// Cells that reference this cluster as a source. Kept mutually
    /// consistent with `Cell.sources` by the relink pass.
    pub targets: BTreeSet<CellId>,
}

impl Cluster {
    pub fn is_terminal(&self) -> bool {
        !matches!(self.kind, ClusterKind::Common)
    }

    /// Terminal-only: does this cluster directly accept the code point?
    /// Common clusters always answer no.
    pub fn accepts(&self, c: char) -> bool {
        match &self.kind {
            ClusterKind::Common => false,
            ClusterKind::Character(fixed) => *fixed == c,
            ClusterKind::Range(filter) => filter.matches(c),
        }
    }
}

/// One alternative production of a cluster: an ordered sequence of cells.
///
/// The recursion classifications are computed once by the relink pass and
/// never recomputed per parse.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trend {
    pub id: TrendId,
    pub serial: u64,
    pub owner: ClusterId,
    /// The source alternative this trend was compiled from.
    pub description: Description,
    pub cells: Vec<CellId>,
    /// First cell names the owning cluster.
    pub left_recurse: bool,
    /// Last cell names the owning cluster.
    pub right_recurse: bool,
    /// The owning cluster is reachable again through an interior slot
    /// (parenthesis-like self-embedding).
    pub deep_recurse: bool,
}

impl Trend {
    /// Left-recursive without self-embedding: a fold like `N -> N D`.
    pub fn simple_left_recurse(&self) -> bool {
        self.left_recurse && !self.deep_recurse
    }
}

/// One slot within a trend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cell {
    pub id: CellId,
    pub serial: u64,
    /// Owning trend; set exactly once by the back-bind pass. Cells shared
    /// between expanded optional variants keep their first owner.
    pub owner: Option<TrendId>,
    /// Symbol name or terminal label this slot matches.
    pub text: String,
    pub optional: bool,
    /// Position of the originating phrase within its description.
    pub index: usize,
    /// Clusters that can produce a match for this slot.
    pub sources: BTreeSet<ClusterId>,
    /// Trends that may legally be entered while this slot is open. Only
    /// populated for slots sitting strictly inside a deep-recursive trend.
    pub deep_closure_trends: BTreeSet<TrendId>,
    /// Any source cluster of this slot has a left-recursive (fold) trend, so
    /// an accepted sub-match may still grow.
    pub has_lower_recurse: bool,
}

/// The whole compiled grammar: an arena of clusters, trends and cells.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aggregation {
    pub name: String,
    clusters: Vec<Cluster>,
    trends: Vec<Trend>,
    cells: Vec<Cell>,
    /// The source tree this aggregation was compiled from.
    pub source: Vec<Definition>,
    /// Session serial counter; continues across structural mutations.
    pub serials: SerialCounter,
}

impl Aggregation {
    pub(crate) fn new(name: impl Into<String>, source: Vec<Definition>) -> Self {
        Self {
            name: name.into(),
            clusters: Vec::new(),
            trends: Vec::new(),
            cells: Vec::new(),
            source,
            serials: SerialCounter::new(),
        }
    }

    pub fn cluster(&self, id: ClusterId) -> &Cluster {
        &self.clusters[id.0]
    }

    pub fn trend(&self, id: TrendId) -> &Trend {
        &self.trends[id.0]
    }

    pub fn cell(&self, id: CellId) -> &Cell {
        &self.cells[id.0]
    }

    pub(crate) fn cluster_mut(&mut self, id: ClusterId) -> &mut Cluster {
        &mut self.clusters[id.0]
    }

    pub(crate) fn trend_mut(&mut self, id: TrendId) -> &mut Trend {
        &mut self.trends[id.0]
    }

    pub(crate) fn cell_mut(&mut self, id: CellId) -> &mut Cell {
        &mut self.cells[id.0]
    }

    pub fn clusters(&self) -> impl Iterator<Item = &Cluster> {
        self.clusters.iter()
    }

    pub fn trends(&self) -> impl Iterator<Item = &Trend> {
        self.trends.iter()
    }

    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter()
    }

    pub fn cluster_count(&self) -> usize {
        self.clusters.len()
    }

    pub fn find_cluster(&self, name: &str) -> Option<ClusterId> {
        self.clusters.iter().find(|c| c.name == name).map(|c| c.id)
    }

    pub(crate) fn push_cluster(&mut self, name: String, kind: ClusterKind) -> ClusterId {
        let id = ClusterId(self.clusters.len());
        let serial = self.serials.issue();
        self.clusters.push(Cluster {
            id,
            serial,
            name,
            kind,
            trends: Vec::new(),
            targets: BTreeSet::new(),
        });
        id
    }

    pub(crate) fn push_trend(&mut self, owner: ClusterId, description: Description) -> TrendId {
        let id = TrendId(self.trends.len());
        let serial = self.serials.issue();
        self.trends.push(Trend {
            id,
            serial,
            owner,
            description,
            cells: Vec::new(),
            left_recurse: false,
            right_recurse: false,
            deep_recurse: false,
        });
        self.clusters[owner.0].trends.push(id);
        id
    }

    pub(crate) fn push_cell(&mut self, text: String, optional: bool, index: usize) -> CellId {
        let id = CellId(self.cells.len());
        let serial = self.serials.issue();
        self.cells.push(Cell {
            id,
            serial,
            owner: None,
            text,
            optional,
            index,
            sources: BTreeSet::new(),
            deep_closure_trends: BTreeSet::new(),
            has_lower_recurse: false,
        });
        id
    }

    /// Wire owner back-references both ways after construction or mutation.
    ///
    /// Trend owners are fixed at construction; this pass sets each cell's
    /// owner to the first trend that carries it (shared cells keep their
    /// first owner) and leaves everything else untouched.
    pub fn back_bind(&mut self) {
        for trend_index in 0..self.trends.len() {
            let trend_id = TrendId(trend_index);
            let cell_ids = self.trends[trend_index].cells.clone();
            for cell_id in cell_ids {
                let cell = &mut self.cells[cell_id.0];
                if cell.owner.is_none() {
                    cell.owner = Some(trend_id);
                }
            }
        }
    }

    /// Human-readable dump of the compiled grammar, one cluster per block.
    pub fn outline(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "aggregation {}", self.name);
        for cluster in &self.clusters {
            match &cluster.kind {
                ClusterKind::Common => {
                    let _ = writeln!(out, "  {}", cluster.name);
                }
                ClusterKind::Character(c) => {
                    let _ = writeln!(out, "  {}  (character {:?})", cluster.name, c);
                }
                ClusterKind::Range(filter) => {
                    let _ = writeln!(out, "  {}  (range {})", cluster.name, filter.label());
                }
            }
            for &trend_id in &cluster.trends {
                let trend = self.trend(trend_id);
                let slots: Vec<&str> = trend
                    .cells
                    .iter()
                    .map(|&cid| self.cell(cid).text.as_str())
                    .collect();
                let mut flags = Vec::new();
                if trend.left_recurse {
                    flags.push("left");
                }
                if trend.right_recurse {
                    flags.push("right");
                }
                if trend.deep_recurse {
                    flags.push("deep");
                }
                let suffix = if flags.is_empty() {
                    String::new()
                } else {
                    format!("  [{}]", flags.join("+"))
                };
                let _ = writeln!(out, "    -> {}{}", slots.join(" "), suffix);
            }
        }
        out
    }
}
