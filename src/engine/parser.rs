//! The driver.
//!
//! A [`Parser`] owns one compiled grammar, the live matrix, and the session
//! bookkeeping (symbol-id table, serial counter, accumulated results). One
//! input character is processed in three stages:
//!
//! 1. *Synthesis*: every terminal cluster that accepts the code point yields
//!    one candidate [`Results`] covering exactly that character.
//! 2. *Cascade*: the candidates are fed to the matrix; completed patterns
//!    become new candidates, and the loop repeats until a round produces
//!    nothing new. A single character can thereby ripple arbitrarily many
//!    levels up through the grammar.
//! 3. *Classification*: a character that activates nothing is reported
//!    through the error callback as a character, lexical or syntax failure,
//!    and the callback decides whether the parse continues.
//!
//! The driver is resumable: `parse_step` advances one code point at a time
//! and can simply stop being called; all state lives in the parser instance.
//! Concurrent parses need separate instances.

use std::collections::{BTreeSet, HashMap, HashSet};

use super::config::EngineConfig;
use super::error::{BuildError, ErrorKind, ParseReport, ReportHandler};
use super::extraction::{Pattern, Results, TextSpan};
use super::grammar::builder::Builder;
use super::grammar::graph;
use super::grammar::{Aggregation, ClusterId, TrendId};
use super::matrix::MatrixRow;
use super::serial::SerialCounter;
use super::source::Definition;

/// Per-session interning of cluster ids to small dense ids, so candidate
/// routing compares integers instead of names. Ids are reused across steps.
#[derive(Debug, Default)]
struct SymbolTable {
    ids: HashMap<ClusterId, u32>,
}

impl SymbolTable {
    fn intern(&mut self, cluster: ClusterId) -> u32 {
        let next = self.ids.len() as u32;
        *self.ids.entry(cluster).or_insert(next)
    }
}

/// What one `parse_step` call produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// The character was consumed; `position` is the new scan position.
    Scanned { position: usize },
    /// The error callback aborted the parse at `position`.
    Aborted { position: usize },
}

/// Everything one matrix round reported back to the character loop.
struct Round {
    produced: Vec<Results>,
    progressed: bool,
    lexical_completion: bool,
    syntax_progress: bool,
}

impl Round {
    fn new() -> Self {
        Self {
            produced: Vec::new(),
            progressed: false,
            lexical_completion: false,
            syntax_progress: false,
        }
    }
}

/// An incremental, character-driven matching session over one grammar.
pub struct Parser {
    agg: Aggregation,
    config: EngineConfig,
    // derived sets, recomputed by bind
    input_accepters: Vec<ClusterId>,
    tops: Vec<ClusterId>,
    top_names: Vec<String>,
    above_atom_trends: BTreeSet<TrendId>,
    non_atom_trends: BTreeSet<TrendId>,
    trends_by_head: HashMap<ClusterId, Vec<TrendId>>,
    // live state
    rows: Vec<MatrixRow>,
    /// Serials of rows spawned for a deep-recursion closure; kept alive even
    /// while idle, until their construct closes.
    enclosures: HashSet<u64>,
    symbols: SymbolTable,
    serials: SerialCounter,
    position: usize,
    finals: Vec<Results>,
    reporter: Option<ReportHandler>,
}

impl Parser {
    pub fn new(agg: Aggregation, config: EngineConfig) -> Self {
        let mut parser = Self {
            agg,
            config,
            input_accepters: Vec::new(),
            tops: Vec::new(),
            top_names: Vec::new(),
            above_atom_trends: BTreeSet::new(),
            non_atom_trends: BTreeSet::new(),
            trends_by_head: HashMap::new(),
            rows: Vec::new(),
            enclosures: HashSet::new(),
            symbols: SymbolTable::default(),
            serials: SerialCounter::new(),
            position: 0,
            finals: Vec::new(),
            reporter: None,
        };
        parser.derive_sets();
        parser.seed_rows();
        parser
    }

    /// Compile a grammar-source tree and open a session over it.
    pub fn from_source(
        name: impl Into<String>,
        definitions: Vec<Definition>,
        config: EngineConfig,
    ) -> Result<Self, BuildError> {
        let agg = Builder::new(config.clone()).build(name, definitions)?;
        Ok(Self::new(agg, config))
    }

    /// Install the error callback. Returning `false` from it aborts the
    /// current parse.
    pub fn set_report_handler(&mut self, handler: ReportHandler) {
        self.reporter = Some(handler);
    }

    pub fn aggregation(&self) -> &Aggregation {
        &self.agg
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Completed top-symbol results so far, ordered by position.
    pub fn results(&self) -> &[Results] {
        &self.finals
    }

    pub fn top_names(&self) -> &[String] {
        &self.top_names
    }

    /// Live row count; useful to observe that recursion stays bounded.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Replace the compiled grammar and recompute every derived set. The
    /// session state restarts; the serial counter continues.
    pub fn bind(&mut self, agg: Aggregation) {
        self.agg = agg;
        self.derive_sets();
        self.reset();
    }

    /// Clear all matching state and results, keeping the compiled grammar.
    pub fn reset(&mut self) {
        self.position = 0;
        self.finals.clear();
        self.symbols = SymbolTable::default();
        self.enclosures.clear();
        self.seed_rows();
    }

    /// Add a definition to the grammar source and rebuild. On a build error
    /// the old grammar stays bound untouched.
    pub fn add_cluster(&mut self, definition: Definition) -> Result<(), BuildError> {
        let mut source = self.agg.source.clone();
        source.push(definition);
        let agg = Builder::new(self.config.clone()).build(self.agg.name.clone(), source)?;
        self.bind(agg);
        Ok(())
    }

    /// Remove a definition by name and rebuild. Returns whether anything was
    /// removed; a rebuild error (e.g. a now-dangling reference) leaves the
    /// old grammar bound.
    pub fn remove_cluster(&mut self, name: &str) -> Result<bool, BuildError> {
        let source: Vec<Definition> = self
            .agg
            .source
            .iter()
            .filter(|d| d.name != name)
            .cloned()
            .collect();
        if source.len() == self.agg.source.len() {
            return Ok(false);
        }
        let agg = Builder::new(self.config.clone()).build(self.agg.name.clone(), source)?;
        self.bind(agg);
        Ok(true)
    }

    /// Consume one code point. `is_final` marks the last code point of the
    /// current logical unit; the matrix is cleared across unit boundaries
    /// while accumulated results survive.
    pub fn parse_step(&mut self, c: char, is_final: bool) -> Step {
        if !self.scan_char(c) {
            return Step::Aborted {
                position: self.position,
            };
        }
        self.position += 1;
        if is_final {
            self.finish_unit();
        }
        Step::Scanned {
            position: self.position,
        }
    }

    /// Drive `parse_step` over a whole `(code point, is-final)` sequence,
    /// stopping early if the error callback aborts.
    pub fn parse<I>(&mut self, input: I) -> Vec<Results>
    where
        I: IntoIterator<Item = (char, bool)>,
    {
        for (c, is_final) in input {
            if let Step::Aborted { .. } = self.parse_step(c, is_final) {
                break;
            }
        }
        self.finals.clone()
    }

    /// Parse a string as one logical unit.
    pub fn parse_str(&mut self, text: &str) -> Vec<Results> {
        let count = text.chars().count();
        self.parse(
            text.chars()
                .enumerate()
                .map(move |(i, c)| (c, i + 1 == count)),
        )
    }

    fn derive_sets(&mut self) {
        self.input_accepters = graph::atoms(&self.agg);
        self.tops = graph::tops(&self.agg);
        self.top_names = self
            .tops
            .iter()
            .map(|&id| self.agg.cluster(id).name.clone())
            .collect();

        self.above_atom_trends = graph::above_atoms(&self.agg)
            .into_iter()
            .flat_map(|id| self.agg.cluster(id).trends.iter().copied().collect::<Vec<_>>())
            .collect();
        self.non_atom_trends = self
            .agg
            .trends()
            .map(|t| t.id)
            .filter(|id| !self.above_atom_trends.contains(id))
            .collect();

        self.trends_by_head = HashMap::new();
        for trend in self.agg.trends() {
            let Some(&head) = trend.cells.first() else {
                continue;
            };
            for &src in &self.agg.cell(head).sources {
                self.trends_by_head.entry(src).or_default().push(trend.id);
            }
        }
    }

    /// One fresh preset row per trend. Preset rows survive quiet characters;
    /// everything else is bookkeeping that lives only while busy.
    fn seed_rows(&mut self) {
        self.rows.clear();
        let trend_ids: Vec<TrendId> = self.agg.trends().map(|t| t.id).collect();
        for trend in trend_ids {
            let serial = self.serials.issue();
            self.rows.push(MatrixRow::new(trend, serial, true));
        }
    }

    fn finish_unit(&mut self) {
        self.enclosures.clear();
        self.rows.retain(|r| r.preset);
        for row in &mut self.rows {
            row.clear();
        }
    }

    /// Process one code point end to end. Returns whether to continue.
    fn scan_char(&mut self, c: char) -> bool {
        let mut candidates = self.synthesize(c);
        if candidates.is_empty() {
            let report = ParseReport {
                kind: ErrorKind::Character,
                position: self.position,
                code_point: Some(c),
                expectations: self.expected_terminal_names(),
            };
            return self.report(report);
        }

        let mut seen: HashSet<(ClusterId, usize, usize)> = candidates
            .iter()
            .map(|r| (r.cluster, r.position, r.length))
            .collect();
        let mut progressed = false;
        let mut lexical_completion = false;
        let mut syntax_progress = false;
        let mut top_hit = false;

        while !candidates.is_empty() {
            let round = self.match_matrix(&candidates);
            progressed |= round.progressed;
            lexical_completion |= round.lexical_completion;
            syntax_progress |= round.syntax_progress;

            let mut next = Vec::new();
            for results in round.produced {
                if !seen.insert((results.cluster, results.position, results.length)) {
                    continue;
                }
                if self.tops.contains(&results.cluster) {
                    top_hit = true;
                    self.upsert_final(&results);
                }
                next.push(results);
            }
            candidates = next;
        }

        // rows introduced only for this character's bookkeeping die here
        {
            let enclosures = &self.enclosures;
            self.rows
                .retain(|r| !r.blocked && (r.preset || r.is_busy() || enclosures.contains(&r.serial)));
        }
        let live: HashSet<u64> = self.rows.iter().map(|r| r.serial).collect();
        self.enclosures.retain(|s| live.contains(s));

        if !progressed {
            let report = ParseReport {
                kind: ErrorKind::Lexical,
                position: self.position,
                code_point: Some(c),
                expectations: self.expected_terminal_names(),
            };
            return self.report(report);
        }
        if lexical_completion && !syntax_progress && !top_hit && !self.non_atom_trends.is_empty() {
            let report = ParseReport {
                kind: ErrorKind::Syntax,
                position: self.position,
                code_point: Some(c),
                expectations: self.top_names.clone(),
            };
            return self.report(report);
        }
        true
    }

    /// Stage 1: one candidate per terminal cluster accepting the code point,
    /// carrying one single-span pattern per trend anchored on that terminal.
    fn synthesize(&self, c: char) -> Vec<Results> {
        let mut out = Vec::new();
        for &term in &self.input_accepters {
            let cluster = self.agg.cluster(term);
            if !cluster.accepts(c) {
                continue;
            }
            let mut results = Results::new(term, cluster.name.clone(), self.position);
            let mut seen_trends = BTreeSet::new();
            for &cell_id in &cluster.targets {
                let owner = match self.agg.cell(cell_id).owner {
                    Some(t) => t,
                    None => continue,
                };
                if !seen_trends.insert(owner) {
                    continue;
                }
                let mut pattern = Pattern::new(owner, self.position);
                let mut span = TextSpan::new(c, self.position);
                span.cell = Some(cell_id);
                pattern.push(span);
                results.include(pattern);
            }
            if results.patterns.is_empty() {
                results.length = 1;
            }
            out.push(results);
        }
        out
    }

    /// Stage 2, one round: route every candidate to the rows expecting its
    /// symbol, feed them, collapse the completions, spawn bookkeeping rows
    /// for candidates nobody took.
    fn match_matrix(&mut self, candidates: &[Results]) -> Round {
        let mut routing: HashMap<u32, Vec<usize>> = HashMap::new();
        for idx in 0..self.rows.len() {
            let expected = self.rows[idx].expected_sources(&self.agg);
            for src in expected {
                let id = self.symbols.intern(src);
                routing.entry(id).or_default().push(idx);
            }
        }

        let mut round = Round::new();
        let mut completions: Vec<(ClusterId, Pattern)> = Vec::new();

        for candidate in candidates {
            let id = self.symbols.intern(candidate.cluster);
            let targets: Vec<usize> = routing.get(&id).cloned().unwrap_or_default();
            let mut handled = false;
            for ri in targets {
                let outcome = self.rows[ri].try_accept(&self.agg, candidate);
                handled |= outcome.status.is_progress() || outcome.absorbed;
                self.absorb_outcome(ri, outcome, &mut round, &mut completions);
            }
            if !handled {
                self.spawn_for(candidate, &mut round, &mut completions);
            }
        }

        // ambiguity collapse: one pattern per definition per round, the
        // longest winning, first-encountered on ties
        let mut best: Vec<(ClusterId, Pattern)> = Vec::new();
        for (owner, pattern) in completions {
            match best.iter_mut().find(|(o, _)| *o == owner) {
                Some((_, kept)) => {
                    if pattern.length > kept.length {
                        *kept = pattern;
                    }
                }
                None => best.push((owner, pattern)),
            }
        }
        round.produced = best
            .into_iter()
            .map(|(owner, pattern)| {
                let name = self.agg.cluster(owner).name.clone();
                let mut results = Results::new(owner, name, pattern.position);
                results.include(pattern);
                results
            })
            .collect();
        round
    }

    /// Fold one row outcome into the round: progress flags, completions,
    /// closure rows on an opening, retirements on a close.
    fn absorb_outcome(
        &mut self,
        ri: usize,
        outcome: super::matrix::RowOutcome,
        round: &mut Round,
        completions: &mut Vec<(ClusterId, Pattern)>,
    ) {
        let trend = self.rows[ri].trend;
        if outcome.status.is_progress() {
            round.progressed = true;
            if !self.above_atom_trends.contains(&trend) {
                round.syntax_progress = true;
            }
        }
        if let Some(pattern) = outcome.pattern {
            if self.above_atom_trends.contains(&trend) {
                round.lexical_completion = true;
            }
            completions.push((self.agg.trend(trend).owner, pattern));
        }
        if let Some(cell) = outcome.opened {
            let closure: Vec<TrendId> = self
                .agg
                .cell(cell)
                .deep_closure_trends
                .iter()
                .copied()
                .collect();
            for t in closure {
                let serial = self.serials.issue();
                self.rows.push(MatrixRow::new(t, serial, false));
                self.enclosures.insert(serial);
                self.rows[ri].enclosings.push(serial);
            }
        }
        if outcome.closed {
            let retire: Vec<u64> = self.rows[ri].enclosings.drain(..).collect();
            for serial in retire {
                if let Some(row) = self.rows.iter_mut().find(|r| r.serial == serial) {
                    row.block();
                }
                self.enclosures.remove(&serial);
            }
        }
    }

    /// A candidate no live row wanted may still start a trend of its own;
    /// give it a fresh bookkeeping row per trend it can head.
    fn spawn_for(
        &mut self,
        candidate: &Results,
        round: &mut Round,
        completions: &mut Vec<(ClusterId, Pattern)>,
    ) {
        let trends = self
            .trends_by_head
            .get(&candidate.cluster)
            .cloned()
            .unwrap_or_default();
        for t in trends {
            let serial = self.serials.issue();
            self.rows.push(MatrixRow::new(t, serial, false));
            let ri = self.rows.len() - 1;
            let outcome = self.rows[ri].try_accept(&self.agg, candidate);
            if outcome.status.is_progress() {
                self.absorb_outcome(ri, outcome, round, completions);
            } else {
                self.rows.pop();
            }
        }
    }

    fn upsert_final(&mut self, results: &Results) {
        let start = results.position;
        let end = results.end();
        // a grown span replaces whatever it now covers
        self.finals
            .retain(|f| f.end() <= start || f.position >= end);
        self.finals.push(results.clone());
        self.finals.sort_by_key(|f| f.position);
    }

    fn expected_terminal_names(&self) -> Vec<String> {
        let mut names = BTreeSet::new();
        for row in &self.rows {
            for src in row.expected_sources(&self.agg) {
                let cluster = self.agg.cluster(src);
                if cluster.is_terminal() {
                    names.insert(cluster.name.clone());
                }
            }
        }
        if names.is_empty() {
            for &term in &self.input_accepters {
                names.insert(self.agg.cluster(term).name.clone());
            }
        }
        names.into_iter().collect()
    }

    fn report(&mut self, report: ParseReport) -> bool {
        match self.reporter.as_mut() {
            Some(handler) => handler(&report),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbers() -> Parser {
        let defs = vec![
            Definition::new("Digit").alt(["'0'"]).alt(["'1'"]),
            Definition::new("Number").alt(["Digit"]).alt(["Number", "Digit"]),
        ];
        Parser::from_source("numbers", defs, EngineConfig::default()).expect("grammar compiles")
    }

    fn expressions() -> Parser {
        let defs = vec![
            Definition::new("Digit").alt(["'0'"]).alt(["'1'"]),
            Definition::new("Expr")
                .alt(["Digit"])
                .alt(["'('", "Expr", "')'"]),
        ];
        Parser::from_source("expr", defs, EngineConfig::default()).expect("grammar compiles")
    }

    #[test]
    fn left_recursion_accumulates_one_result() {
        let mut parser = numbers();
        let results = parser.parse_str("101");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].symbol, "Number");
        assert_eq!(results[0].position, 0);
        assert_eq!(results[0].length, 3);
        assert_eq!(results[0].text(), "101");
    }

    #[test]
    fn left_recursion_keeps_row_count_bounded() {
        let mut parser = numbers();
        let baseline = parser.row_count();
        for (i, c) in "10110101".chars().enumerate() {
            parser.parse_step(c, i == 7);
        }
        assert!(parser.row_count() <= baseline + 2);
    }

    #[test]
    fn nesting_mirrors_the_brackets() {
        let mut parser = expressions();
        let results = parser.parse_str("((1))");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].length, 5);
        assert_eq!(results[0].text(), "((1))");

        // one nesting level per bracket pair
        let outer = results[0].extract().expect("pattern");
        let middle = outer.extractions[1].buddy.as_ref().expect("nested expr");
        assert_eq!(middle.text(), "(1)");
        let inner = middle.extract().expect("pattern").extractions[1]
            .buddy
            .as_ref()
            .expect("innermost expr")
            .clone();
        assert_eq!(inner.text(), "1");
    }

    #[test]
    fn reset_makes_reparsing_idempotent() {
        let mut parser = numbers();
        let first = parser.parse_str("101");
        parser.reset();
        let second = parser.parse_str("101");
        assert_eq!(first, second);
    }

    #[test]
    fn unknown_character_reports_and_can_abort() {
        let mut parser = numbers();
        let reports = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let sink = reports.clone();
        parser.set_report_handler(Box::new(move |report| {
            sink.borrow_mut().push(report.clone());
            false
        }));

        let step = parser.parse_step('~', false);
        assert_eq!(step, Step::Aborted { position: 0 });

        let reports = reports.borrow();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].kind, ErrorKind::Character);
        assert_eq!(reports[0].position, 0);
        assert_eq!(reports[0].code_point, Some('~'));
    }

    #[test]
    fn add_and_remove_cluster_rebuild_the_grammar() {
        let mut parser = numbers();
        parser
            .add_cluster(Definition::new("Pair").alt(["Number", "','", "Number"]))
            .expect("rebuild succeeds");
        assert!(parser.aggregation().find_cluster("Pair").is_some());

        let removed = parser.remove_cluster("Pair").expect("rebuild succeeds");
        assert!(removed);
        assert!(parser.aggregation().find_cluster("Pair").is_none());

        // removing a definition something still references is rejected and
        // leaves the old grammar bound
        let err = parser.remove_cluster("Digit").expect_err("dangling");
        assert!(matches!(err, BuildError::DanglingReference { .. }));
        assert!(parser.aggregation().find_cluster("Digit").is_some());
    }
}
