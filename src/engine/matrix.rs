//! Live matching state.
//!
//! A [`MatrixLine`] is one attempt to satisfy one trend: a pivot marking the
//! next slot expected, plus the spans captured so far. A [`MatrixRow`] owns a
//! stack of lines for one trend; the stack only grows past one entry for
//! self-embedding (deep-recursive) trends, one line per currently-open
//! nesting level.
//!
//! `try_accept` is the per-candidate transition function. Its outcomes:
//!
//! - `Impossible`: the line's trend has no cells; a malformed grammar.
//! - `Unaccepted`: the candidate is not for this line.
//! - `Advanced`: the candidate filled the expected slot, more slots remain.
//! - `Repeated`: a longer match for the same start replaced the last span in
//!   place, implementing longest-match-wins at one position.
//! - `Accepted` / `Reaccepted`: every slot is filled; a [`Pattern`] is built.
//! - `Overlapped`: the candidate starts before the line's frontier.
//! - `Disconnected`: the candidate left a gap and the line could not restart
//!   on it.
//! - `Blocked`: the row was administratively retired.

use std::collections::BTreeSet;

use super::extraction::{Pattern, Results};
use super::grammar::{Aggregation, CellId, ClusterId, TrendId};

/// Outcome of feeding one candidate to one line (or row).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStatus {
    Impossible,
    Unaccepted,
    Repeated,
    Advanced,
    Accepted,
    Reaccepted,
    Overlapped,
    Disconnected,
    Blocked,
}

impl LineStatus {
    /// Did the candidate end up inside this line?
    pub fn is_progress(&self) -> bool {
        matches!(
            self,
            LineStatus::Repeated
                | LineStatus::Advanced
                | LineStatus::Accepted
                | LineStatus::Reaccepted
        )
    }

    /// Did the line finish its trend?
    pub fn is_completion(&self) -> bool {
        matches!(self, LineStatus::Accepted | LineStatus::Reaccepted)
    }
}

#[derive(Debug, Clone)]
pub struct LineOutcome {
    pub status: LineStatus,
    pub pattern: Option<Pattern>,
    /// The candidate was not taken, but it is already covered by what this
    /// line holds (an equal or shorter re-match). Absorbed candidates need
    /// no bookkeeping elsewhere.
    pub absorbed: bool,
}

impl LineOutcome {
    fn plain(status: LineStatus) -> Self {
        Self {
            status,
            pattern: None,
            absorbed: false,
        }
    }

    fn absorbed() -> Self {
        Self {
            status: LineStatus::Unaccepted,
            pattern: None,
            absorbed: true,
        }
    }
}

/// One attempt to satisfy one trend.
#[derive(Debug, Clone)]
pub struct MatrixLine {
    pub trend: TrendId,
    /// Index of the slot the line is working on. Equals the span count while
    /// advancing normally; sticks to the last filled slot while that slot's
    /// source can still fold leftward and grow.
    pub pivot: usize,
    extractions: Vec<super::extraction::TextSpan>,
    /// The line has produced at least one pattern since construction.
    completed: bool,
}

impl MatrixLine {
    pub fn new(trend: TrendId) -> Self {
        Self {
            trend,
            pivot: 0,
            extractions: Vec::new(),
            completed: false,
        }
    }

    /// No spans captured yet (fresh, or reset after a disconnect).
    pub fn is_empty(&self) -> bool {
        self.extractions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.extractions.len()
    }

    pub fn start(&self) -> Option<usize> {
        self.extractions.first().map(|s| s.position)
    }

    /// One past the last captured code point.
    pub fn end(&self) -> Option<usize> {
        self.extractions.last().map(|s| s.end())
    }

    fn is_complete(&self, cell_count: usize) -> bool {
        self.completed && self.extractions.len() == cell_count
    }

    /// Drop all captured spans. The completion flag survives, so a later
    /// pattern from this line reports as `Reaccepted`.
    pub fn reset(&mut self) {
        self.extractions.clear();
        self.pivot = 0;
    }

    /// The per-candidate transition function.
    pub fn try_accept(&mut self, agg: &Aggregation, candidate: &Results) -> LineOutcome {
        let trend = agg.trend(self.trend);
        if trend.cells.is_empty() {
            return LineOutcome::plain(LineStatus::Impossible);
        }
        if self.extractions.is_empty() {
            return self
                .fresh_accept(agg, candidate)
                .unwrap_or_else(|| LineOutcome::plain(LineStatus::Unaccepted));
        }

        let last = self.extractions.last().expect("line is non-empty");
        let frontier = last.end();
        let last_start = last.position;

        if candidate.position == last_start {
            return self.reaccept_last(agg, candidate);
        }
        if candidate.position < frontier {
            return LineOutcome::plain(LineStatus::Overlapped);
        }
        if candidate.position == frontier {
            return self.append(agg, candidate);
        }

        // The candidate left a gap. An open self-embedding construct must
        // survive unrelated matches completing further right; everything
        // else restarts on the candidate or disconnects.
        if trend.deep_recurse && !trend.left_recurse {
            return LineOutcome::plain(LineStatus::Unaccepted);
        }
        self.reset();
        match self.fresh_accept(agg, candidate) {
            Some(outcome) => outcome,
            None => LineOutcome::plain(LineStatus::Disconnected),
        }
    }

    /// Accept a candidate into the head slot of an empty line. Empty lines
    /// are position-free: they anchor wherever the candidate starts.
    fn fresh_accept(&mut self, agg: &Aggregation, candidate: &Results) -> Option<LineOutcome> {
        let trend = agg.trend(self.trend);
        let first = agg.cell(trend.cells[0]);
        if !first.sources.contains(&candidate.cluster) {
            return None;
        }
        self.extractions.push(candidate.to_span(first.id));
        if self.extractions.len() == trend.cells.len() {
            return Some(self.complete(agg));
        }
        self.pivot = 1;
        Some(LineOutcome::plain(LineStatus::Advanced))
    }

    /// Candidate starts exactly where the last span did: a competing match
    /// for the same start. Strictly longer replaces in place; equal or
    /// shorter is absorbed.
    fn reaccept_last(&mut self, agg: &Aggregation, candidate: &Results) -> LineOutcome {
        let last = self.extractions.last().expect("line is non-empty");
        let cell_id = last.cell.expect("line spans always carry their cell");
        let cell = agg.cell(cell_id);
        if !cell.sources.contains(&candidate.cluster) {
            return LineOutcome::plain(LineStatus::Unaccepted);
        }
        if candidate.end() <= last.end() {
            return LineOutcome::absorbed();
        }
        let span = candidate.to_span(cell_id);
        *self.extractions.last_mut().expect("line is non-empty") = span;
        let cell_count = agg.trend(self.trend).cells.len();
        if self.extractions.len() == cell_count {
            return self.complete(agg);
        }
        LineOutcome::plain(LineStatus::Repeated)
    }

    /// Candidate starts at the frontier: continue into the next slot, or
    /// start the next occurrence if the line already completed.
    fn append(&mut self, agg: &Aggregation, candidate: &Results) -> LineOutcome {
        let trend = agg.trend(self.trend);
        let cells = &trend.cells;

        if self.is_complete(cells.len()) {
            // next occurrence: reset lazily, only once a restart actually
            // fits, so a finished match survives unrelated candidates
            let first = agg.cell(cells[0]);
            if !first.sources.contains(&candidate.cluster) {
                return LineOutcome::plain(LineStatus::Unaccepted);
            }
            self.reset();
            return self
                .fresh_accept(agg, candidate)
                .expect("head slot source was checked");
        }

        let slot_index = self.extractions.len();
        if slot_index >= cells.len() {
            return LineOutcome::plain(LineStatus::Unaccepted);
        }
        let cell = agg.cell(cells[slot_index]);
        if !cell.sources.contains(&candidate.cluster) {
            return LineOutcome::plain(LineStatus::Unaccepted);
        }
        self.extractions.push(candidate.to_span(cell.id));
        if self.extractions.len() == cells.len() {
            return self.complete(agg);
        }
        if !trend.left_recurse && cell.has_lower_recurse && slot_index >= 1 {
            // the slot's source can still fold leftward; hold the pivot here
            // so the grown sub-match replaces this span before we move on
            self.pivot = slot_index;
        } else {
            self.pivot = slot_index + 1;
        }
        LineOutcome::plain(LineStatus::Advanced)
    }

    /// Every slot is filled: build the pattern and prepare for what comes
    /// next. A simple-left-recursive trend folds its own completion back
    /// into the head slot so it keeps consuming repetitions; everything
    /// else parks on the last slot until the next occurrence restarts it.
    fn complete(&mut self, agg: &Aggregation) -> LineOutcome {
        let trend = agg.trend(self.trend);
        let position = self.extractions[0].position;
        let mut pattern = Pattern::new(self.trend, position);
        for span in &self.extractions {
            pattern.push(span.clone());
        }
        let status = if self.completed {
            LineStatus::Reaccepted
        } else {
            LineStatus::Accepted
        };
        self.completed = true;

        if trend.simple_left_recurse() {
            let owner = agg.cluster(trend.owner);
            let mut results = Results::new(owner.id, owner.name.clone(), position);
            results.include(pattern.clone());
            let folded = results.to_span(trend.cells[0]);
            self.extractions = vec![folded];
            self.pivot = 1;
        } else {
            self.pivot = trend.cells.len() - 1;
        }

        LineOutcome {
            status,
            pattern: Some(pattern),
            absorbed: false,
        }
    }

    /// Clusters a candidate must come from to mean anything to this line.
    fn expected_sources(&self, agg: &Aggregation, out: &mut BTreeSet<ClusterId>) {
        let trend = agg.trend(self.trend);
        let cells = &trend.cells;
        if cells.is_empty() {
            return;
        }
        // fresh starts, disconnect restarts and next occurrences all route
        // through the head slot
        out.extend(agg.cell(cells[0]).sources.iter().copied());
        if self.extractions.is_empty() {
            return;
        }
        // growth of the last filled slot
        if let Some(cell_id) = self.extractions.last().and_then(|s| s.cell) {
            out.extend(agg.cell(cell_id).sources.iter().copied());
        }
        // the next slot
        let next = self.extractions.len();
        if next < cells.len() && !self.is_complete(cells.len()) {
            out.extend(agg.cell(cells[next]).sources.iter().copied());
        }
    }
}

/// Outcome of feeding one candidate to a row.
#[derive(Debug, Clone)]
pub struct RowOutcome {
    pub status: LineStatus,
    pub pattern: Option<Pattern>,
    /// The opening slot of a self-embedding construct was just filled; the
    /// value is the interior slot that is now open.
    pub opened: Option<CellId>,
    /// A self-embedding construct just finished.
    pub closed: bool,
    pub absorbed: bool,
}

impl RowOutcome {
    fn plain(status: LineStatus) -> Self {
        Self {
            status,
            pattern: None,
            opened: None,
            closed: false,
            absorbed: false,
        }
    }
}

/// The live matching state for one trend: a stack of lines, top tried first.
#[derive(Debug, Clone)]
pub struct MatrixRow {
    pub serial: u64,
    pub trend: TrendId,
    /// Created by bind rather than per-character bookkeeping; preset rows
    /// survive quiet characters.
    pub preset: bool,
    pub blocked: bool,
    /// Serials of closure rows spawned while this row's construct was open;
    /// retired in one step when the construct closes.
    pub enclosings: Vec<u64>,
    lines: Vec<MatrixLine>,
}

impl MatrixRow {
    pub fn new(trend: TrendId, serial: u64, preset: bool) -> Self {
        Self {
            serial,
            trend,
            preset,
            blocked: false,
            enclosings: Vec::new(),
            lines: vec![MatrixLine::new(trend)],
        }
    }

    /// Current nesting depth (number of stacked lines).
    pub fn depth(&self) -> usize {
        self.lines.len()
    }

    /// Mid-flight in any way: something captured, or a nesting level open.
    pub fn is_busy(&self) -> bool {
        self.lines.len() > 1 || self.lines.iter().any(|l| !l.is_empty())
    }

    /// Administrative retirement; the row ignores all further candidates.
    pub fn block(&mut self) {
        self.blocked = true;
    }

    /// Forget all lines and registrations; back to a single fresh line.
    pub fn clear(&mut self) {
        self.lines = vec![MatrixLine::new(self.trend)];
        self.enclosings.clear();
        self.blocked = false;
    }

    /// Feed one candidate to the stack, top line first. The first line that
    /// does anything with it decides the row's outcome.
    pub fn try_accept(&mut self, agg: &Aggregation, candidate: &Results) -> RowOutcome {
        if self.blocked {
            return RowOutcome::plain(LineStatus::Blocked);
        }
        let mut saw_overlap = false;
        for idx in (0..self.lines.len()).rev() {
            let outcome = self.lines[idx].try_accept(agg, candidate);
            match outcome.status {
                LineStatus::Unaccepted if !outcome.absorbed => continue,
                LineStatus::Overlapped => {
                    saw_overlap = true;
                    continue;
                }
                _ => return self.settle(agg, idx, outcome),
            }
        }
        if saw_overlap {
            RowOutcome::plain(LineStatus::Overlapped)
        } else {
            RowOutcome::plain(LineStatus::Unaccepted)
        }
    }

    /// Row housekeeping around one line's outcome: drop stale speculative
    /// levels, open a new level on a self-embedding opening, pop a finished
    /// nested level.
    fn settle(&mut self, agg: &Aggregation, idx: usize, outcome: LineOutcome) -> RowOutcome {
        while self.lines.len() > idx + 1 && self.lines.last().map_or(false, |l| l.is_empty()) {
            self.lines.pop();
        }
        let trend = agg.trend(self.trend);

        let mut opened = None;
        if outcome.status == LineStatus::Advanced
            && idx + 1 == self.lines.len()
            && self.lines[idx].len() == 1
            && trend.deep_recurse
            && !trend.left_recurse
        {
            // the construct just opened: push a fresh level so another
            // nested opening can be accepted while this one waits to close
            opened = trend.cells.get(1).copied();
            self.lines.push(MatrixLine::new(self.trend));
        }

        let mut closed = false;
        if outcome.status.is_completion() {
            closed = trend.deep_recurse;
            if idx > 0 {
                self.lines.remove(idx);
            }
        }

        RowOutcome {
            status: outcome.status,
            pattern: outcome.pattern,
            opened,
            closed,
            absorbed: outcome.absorbed,
        }
    }

    /// Union of every line's expected source clusters; the driver routes
    /// candidates to rows by intersecting against this.
    pub fn expected_sources(&self, agg: &Aggregation) -> BTreeSet<ClusterId> {
        let mut out = BTreeSet::new();
        if self.blocked {
            return out;
        }
        for line in &self.lines {
            line.expected_sources(agg, &mut out);
        }
        out
    }
}
