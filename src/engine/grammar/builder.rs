//! Grammar compiler.
//!
//! Turns a grammar-source tree into a bound [`Aggregation`] in two passes:
//!
//! 1. *Build*: create one common cluster per definition, decompose literal
//!    phrases into memoized character/class terminals (literals longer than
//!    one code point get a synthetic sub-definition chaining per-character
//!    terminals), and expand every description with k optional phrases into
//!    the 2^k present/absent combinations, sharing the non-optional cells
//!    between combinations.
//! 2. *Relink*: bind every cell to its source clusters by name, classify
//!    recursion per trend, and attach deep-recursion closures to interior
//!    cells. Relink is re-run after any structural grammar change.
//!
//! A description whose optional count exceeds the configured ceiling rejects
//! the whole grammar: the caller gets an error and no aggregation, never a
//! partially expanded one.

use std::collections::{BTreeSet, HashMap};

use crate::engine::config::EngineConfig;
use crate::engine::error::BuildError;
use crate::engine::source::{Definition, Description, Phrase};

use super::graph;
use super::{Aggregation, CharFilter, ClusterId, ClusterKind, TrendId};

/// Structural key for cell sharing during optional expansion: one cell per
/// (definition, description, phrase), whatever combination it appears in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PhraseKey {
    definition: usize,
    description: usize,
    phrase: usize,
}

/// Compiles grammar-source trees into aggregations.
#[derive(Debug, Clone)]
pub struct Builder {
    config: EngineConfig,
}

impl Builder {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Compile a grammar. Returns no aggregation if any description blows
    /// the optional-expansion ceiling or references an unknown symbol.
    pub fn build(
        &self,
        name: impl Into<String>,
        definitions: Vec<Definition>,
    ) -> Result<Aggregation, BuildError> {
        let limit = self.config.compiler.max_optionals;
        for definition in &definitions {
            for description in &definition.descriptions {
                if description.phrases.is_empty() {
                    return Err(BuildError::EmptyDescription {
                        definition: definition.name.clone(),
                    });
                }
                let optionals = description.phrases.iter().filter(|p| p.optional).count();
                if optionals > limit {
                    return Err(BuildError::TooManyOptionals {
                        definition: definition.name.clone(),
                        count: optionals,
                        limit,
                    });
                }
            }
        }

        let mut agg = Aggregation::new(name, definitions.clone());
        let mut terminals: HashMap<String, ClusterId> = HashMap::new();
        let mut literals: HashMap<String, ClusterId> = HashMap::new();

        // Clusters first, so phrase texts resolve independent of order.
        for definition in &definitions {
            if agg.find_cluster(&definition.name).is_none() {
                agg.push_cluster(definition.name.clone(), ClusterKind::Common);
            }
        }

        for (d_idx, definition) in definitions.iter().enumerate() {
            let cluster = agg
                .find_cluster(&definition.name)
                .expect("cluster was just created");
            let mut cells: HashMap<PhraseKey, super::CellId> = HashMap::new();

            for (desc_idx, description) in definition.descriptions.iter().enumerate() {
                let mut slots = Vec::with_capacity(description.phrases.len());
                for (p_idx, phrase) in description.phrases.iter().enumerate() {
                    let text = self.resolve_phrase(
                        &mut agg,
                        &mut terminals,
                        &mut literals,
                        &definition.name,
                        phrase,
                    )?;
                    slots.push((text, phrase.optional, p_idx));
                }

                let optional_slots: Vec<usize> = slots
                    .iter()
                    .filter(|(_, optional, _)| *optional)
                    .map(|(_, _, idx)| *idx)
                    .collect();

                for combo in 0..(1usize << optional_slots.len()) {
                    let selected: Vec<&(String, bool, usize)> = slots
                        .iter()
                        .filter(|(_, optional, idx)| {
                            if !*optional {
                                return true;
                            }
                            let bit = optional_slots
                                .iter()
                                .position(|&o| o == *idx)
                                .expect("optional slot is indexed");
                            combo & (1 << bit) != 0
                        })
                        .collect();
                    if selected.is_empty() {
                        // zero-length alternatives are invalid
                        continue;
                    }

                    let trend = agg.push_trend(cluster, description.clone());
                    for (text, optional, p_idx) in selected {
                        let key = PhraseKey {
                            definition: d_idx,
                            description: desc_idx,
                            phrase: *p_idx,
                        };
                        let cell_id = *cells
                            .entry(key)
                            .or_insert_with(|| agg.push_cell(text.clone(), *optional, *p_idx));
                        agg.trend_mut(trend).cells.push(cell_id);
                    }
                }
            }
        }

        agg.back_bind();
        relink(&mut agg, self.config.matching.deep_recurse_depth)?;
        Ok(agg)
    }

    /// Resolve one phrase to the name of the cluster its cells will source.
    fn resolve_phrase(
        &self,
        agg: &mut Aggregation,
        terminals: &mut HashMap<String, ClusterId>,
        literals: &mut HashMap<String, ClusterId>,
        definition: &str,
        phrase: &Phrase,
    ) -> Result<String, BuildError> {
        if let Some(literal) = phrase.literal() {
            let chars: Vec<char> = literal.chars().collect();
            if chars.len() == 1 {
                return Ok(char_terminal(agg, terminals, chars[0]));
            }
            return Ok(literal_cluster(agg, terminals, literals, literal));
        }
        if let Some(class) = phrase.class() {
            let filter = parse_filter(class).ok_or_else(|| BuildError::UnknownClass {
                definition: definition.to_string(),
                class: class.to_string(),
            })?;
            return Ok(range_terminal(agg, terminals, filter));
        }
        Ok(phrase.text.clone())
    }
}

/// Memoized single-character terminal; identical characters share one
/// cluster across the whole grammar.
fn char_terminal(
    agg: &mut Aggregation,
    terminals: &mut HashMap<String, ClusterId>,
    c: char,
) -> String {
    let name = format!("'{}'", c);
    terminals
        .entry(name.clone())
        .or_insert_with(|| agg.push_cluster(name.clone(), ClusterKind::Character(c)));
    name
}

/// Memoized class terminal.
fn range_terminal(
    agg: &mut Aggregation,
    terminals: &mut HashMap<String, ClusterId>,
    filter: CharFilter,
) -> String {
    let name = filter.label();
    terminals
        .entry(name.clone())
        .or_insert_with(|| agg.push_cluster(name.clone(), ClusterKind::Range(filter)));
    name
}

/// Memoized synthetic sub-definition for a literal longer than one code
/// point: a common cluster with a single trend chaining character terminals.
fn literal_cluster(
    agg: &mut Aggregation,
    terminals: &mut HashMap<String, ClusterId>,
    literals: &mut HashMap<String, ClusterId>,
    literal: &str,
) -> String {
    let name = format!("'{}'", literal);
    if literals.contains_key(literal) {
        return name;
    }
    let cluster = agg.push_cluster(name.clone(), ClusterKind::Common);
    literals.insert(literal.to_string(), cluster);

    let mut description = Description::new();
    for c in literal.chars() {
        description = description.phrase(format!("'{}'", c));
    }
    let trend = agg.push_trend(cluster, description);
    for (i, c) in literal.chars().enumerate() {
        let text = char_terminal(agg, terminals, c);
        let cell = agg.push_cell(text, false, i);
        agg.trend_mut(trend).cells.push(cell);
    }
    name
}

fn parse_filter(class: &str) -> Option<CharFilter> {
    match class {
        "letter" => Some(CharFilter::Letter),
        "digit" => Some(CharFilter::Digit),
        "whitespace" => Some(CharFilter::Whitespace),
        "punct" => Some(CharFilter::Punct),
        "any" => Some(CharFilter::Any),
        _ => {
            let chars: Vec<char> = class.chars().collect();
            if chars.len() == 3 && chars[1] == '-' && chars[0] <= chars[2] {
                Some(CharFilter::Span(chars[0], chars[2]))
            } else {
                None
            }
        }
    }
}

/// Second pass: bind cells to their source clusters by name, classify every
/// trend's recursion kind, and attach deep-recursion closures. Must be
/// re-run after any cluster add/remove.
pub fn relink(agg: &mut Aggregation, min_depth: usize) -> Result<(), BuildError> {
    // Reset everything this pass derives.
    let cell_ids: Vec<super::CellId> = agg.cells().map(|c| c.id).collect();
    for &cid in &cell_ids {
        let cell = agg.cell_mut(cid);
        cell.sources.clear();
        cell.deep_closure_trends.clear();
        cell.has_lower_recurse = false;
    }
    let cluster_ids: Vec<ClusterId> = agg.clusters().map(|c| c.id).collect();
    for &cid in &cluster_ids {
        agg.cluster_mut(cid).targets.clear();
    }

    // Sources/targets, kept mutually consistent.
    let by_name: HashMap<String, ClusterId> = agg
        .clusters()
        .map(|c| (c.name.clone(), c.id))
        .collect();
    for &cid in &cell_ids {
        let text = agg.cell(cid).text.clone();
        match by_name.get(&text) {
            Some(&source) => {
                agg.cell_mut(cid).sources.insert(source);
                agg.cluster_mut(source).targets.insert(cid);
            }
            None => {
                let owner = cell_owner_name(agg, cid);
                return Err(BuildError::DanglingReference {
                    definition: owner,
                    symbol: text,
                });
            }
        }
    }

    // Edge recursion straight from the cell texts.
    let trend_ids: Vec<TrendId> = agg.trends().map(|t| t.id).collect();
    for &tid in &trend_ids {
        let trend = agg.trend(tid);
        let owner_name = agg.cluster(trend.owner).name.clone();
        let first = trend.cells.first().map(|&c| agg.cell(c).text.clone());
        let last = trend.cells.last().map(|&c| agg.cell(c).text.clone());
        let left = first.as_deref() == Some(owner_name.as_str());
        let right = last.as_deref() == Some(owner_name.as_str());
        let trend = agg.trend_mut(tid);
        trend.left_recurse = left;
        trend.right_recurse = right;
        trend.deep_recurse = false;
    }

    // Deep recursion needs the bound sources, so it runs as its own sweep.
    let deep: Vec<bool> = trend_ids
        .iter()
        .map(|&tid| graph::detect_deep_recurse(agg, tid, min_depth))
        .collect();
    for (&tid, &flag) in trend_ids.iter().zip(&deep) {
        agg.trend_mut(tid).deep_recurse = flag;
    }

    // A slot whose source can still fold leftward must not be consumed too
    // eagerly by its surrounding trend.
    let lower: Vec<bool> = cell_ids
        .iter()
        .map(|&cid| {
            agg.cell(cid).sources.iter().any(|&src| {
                agg.cluster(src)
                    .trends
                    .iter()
                    .any(|&t| agg.trend(t).left_recurse)
            })
        })
        .collect();
    for (&cid, &flag) in cell_ids.iter().zip(&lower) {
        agg.cell_mut(cid).has_lower_recurse = flag;
    }

    // Closures: for every interior slot of a deep trend that can itself open
    // a deep construct, record which deep trends may be entered while the
    // slot is open.
    let candidates: BTreeSet<TrendId> = trend_ids
        .iter()
        .copied()
        .filter(|&tid| agg.trend(tid).deep_recurse)
        .collect();
    let mut closures: Vec<(super::CellId, BTreeSet<TrendId>)> = Vec::new();
    for &tid in &trend_ids {
        let trend = agg.trend(tid);
        if !trend.deep_recurse || trend.cells.len() < 3 {
            continue;
        }
        for &cid in &trend.cells[1..trend.cells.len() - 1] {
            let cell = agg.cell(cid);
            let has_deep_source = cell.sources.iter().any(|&src| {
                agg.cluster(src)
                    .trends
                    .iter()
                    .any(|&t| agg.trend(t).deep_recurse)
            });
            if !has_deep_source {
                continue;
            }
            let mut selected = BTreeSet::new();
            graph::mark_deep_recurse_closure(agg, cid, &candidates, &mut selected, min_depth);
            closures.push((cid, selected));
        }
    }
    for (cid, selected) in closures {
        agg.cell_mut(cid).deep_closure_trends = selected;
    }

    Ok(())
}

fn cell_owner_name(agg: &Aggregation, cell: super::CellId) -> String {
    agg.cell(cell)
        .owner
        .map(|tid| agg.cluster(agg.trend(tid).owner).name.clone())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digits() -> Definition {
        Definition::new("Digit").alt(["'0'"]).alt(["'1'"])
    }

    #[test]
    fn literal_decomposition_shares_character_terminals() {
        let defs = vec![
            Definition::new("Keyword").alt(["'let'"]),
            Definition::new("Letter").alt(["'l'"]),
        ];
        let agg = Builder::new(EngineConfig::default())
            .build("keywords", defs)
            .expect("grammar should compile");

        // The synthetic literal cluster exists and chains three terminals.
        let lit = agg.find_cluster("'let'").expect("literal cluster");
        let lit_trend = agg.trend(agg.cluster(lit).trends[0]);
        assert_eq!(lit_trend.cells.len(), 3);

        // 'l' appears in both the literal chain and the Letter definition,
        // but there is exactly one 'l' terminal cluster.
        let l_clusters: Vec<_> = agg.clusters().filter(|c| c.name == "'l'").collect();
        assert_eq!(l_clusters.len(), 1);
        assert_eq!(l_clusters[0].targets.len(), 2);
    }

    #[test]
    fn optional_expansion_counts() {
        let defs = vec![
            digits(),
            Definition::new("Item").describe(
                Description::new()
                    .phrase("'a'")
                    .optional("'b'")
                    .optional("'c'"),
            ),
        ];
        let agg = Builder::new(EngineConfig::default())
            .build("optionals", defs)
            .expect("grammar should compile");
        let item = agg.find_cluster("Item").expect("Item");
        // k = 2 optionals, no all-optional combination to skip: 4 trends.
        assert_eq!(agg.cluster(item).trends.len(), 4);
    }

    #[test]
    fn all_optional_description_skips_empty_combination() {
        let defs = vec![Definition::new("Pad")
            .describe(Description::new().optional("'a'").optional("'b'"))];
        let agg = Builder::new(EngineConfig::default())
            .build("padding", defs)
            .expect("grammar should compile");
        let pad = agg.find_cluster("Pad").expect("Pad");
        // 2^2 - 1: the all-absent combination would be zero-length.
        assert_eq!(agg.cluster(pad).trends.len(), 3);
    }

    #[test]
    fn optional_cells_are_shared_between_combinations() {
        let defs = vec![Definition::new("Item").describe(
            Description::new().phrase("'a'").optional("'b'").phrase("'c'"),
        )];
        let agg = Builder::new(EngineConfig::default())
            .build("sharing", defs)
            .expect("grammar should compile");
        let item = agg.find_cluster("Item").expect("Item");
        let trends = &agg.cluster(item).trends;
        assert_eq!(trends.len(), 2);
        let with = agg.trend(trends[1]);
        let without = agg.trend(trends[0]);
        let longer = if with.cells.len() == 3 { with } else { without };
        let shorter = if with.cells.len() == 3 { without } else { with };
        assert_eq!(longer.cells.len(), 3);
        assert_eq!(shorter.cells.len(), 2);
        // 'a' and 'c' cells are the same arena entries in both trends.
        assert_eq!(longer.cells[0], shorter.cells[0]);
        assert_eq!(longer.cells[2], shorter.cells[1]);
    }

    #[test]
    fn optional_ceiling_rejects_the_whole_grammar() {
        let mut over = Description::new().phrase("'x'");
        for _ in 0..7 {
            over = over.optional("'y'");
        }
        let defs = vec![digits(), Definition::new("Big").describe(over)];
        let err = Builder::new(EngineConfig::default())
            .build("too-big", defs)
            .expect_err("grammar should be rejected");
        assert!(matches!(err, BuildError::TooManyOptionals { count: 7, .. }));
    }

    #[test]
    fn dangling_reference_is_rejected() {
        let defs = vec![Definition::new("Expr").alt(["Missing"])];
        let err = Builder::new(EngineConfig::default())
            .build("dangling", defs)
            .expect_err("grammar should be rejected");
        assert!(matches!(err, BuildError::DanglingReference { .. }));
    }

    #[test]
    fn unknown_class_is_rejected() {
        let defs = vec![Definition::new("Expr").alt(["<vowel>"])];
        let err = Builder::new(EngineConfig::default())
            .build("classes", defs)
            .expect_err("grammar should be rejected");
        assert!(matches!(err, BuildError::UnknownClass { .. }));
    }

    #[test]
    fn class_phrases_compile_to_range_terminals() {
        let defs = vec![Definition::new("Word").alt(["<letter>", "<a-z>"])];
        let agg = Builder::new(EngineConfig::default())
            .build("classes", defs)
            .expect("grammar should compile");
        let letter = agg.find_cluster("<letter>").expect("letter terminal");
        assert!(agg.cluster(letter).accepts('Q'));
        let span = agg.find_cluster("<a-z>").expect("span terminal");
        assert!(agg.cluster(span).accepts('q'));
        assert!(!agg.cluster(span).accepts('Q'));
    }

    #[test]
    fn sources_and_targets_stay_mutual() {
        let defs = vec![digits(), Definition::new("Number").alt(["Digit"])];
        let agg = Builder::new(EngineConfig::default())
            .build("mutual", defs)
            .expect("grammar should compile");
        for cell in agg.cells() {
            for &src in &cell.sources {
                assert!(agg.cluster(src).targets.contains(&cell.id));
            }
        }
        for cluster in agg.clusters() {
            for &target in &cluster.targets {
                assert!(agg.cell(target).sources.contains(&cluster.id));
            }
        }
    }
}
