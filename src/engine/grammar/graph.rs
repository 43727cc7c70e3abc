//! Pure queries over a compiled grammar.
//!
//! Nothing here mutates the aggregation or keeps state between calls; the
//! relink pass and the driver both lean on these to classify symbols and
//! recursion shapes.

use std::collections::{BTreeSet, VecDeque};

use super::{Aggregation, CellId, ClusterId, TrendId};

/// Grammar entry points: clusters that have alternatives but are never
/// referenced as a source by any cell.
///
/// When no such cluster exists (mutual top-level recursion, or a top that
/// embeds itself), fall back to the clusters whose reachable-source set
/// covers everything any cluster can reach.
pub fn tops(agg: &Aggregation) -> Vec<ClusterId> {
    let primary: Vec<ClusterId> = agg
        .clusters()
        .filter(|c| !c.trends.is_empty() && c.targets.is_empty())
        .map(|c| c.id)
        .collect();
    if !primary.is_empty() {
        return primary;
    }

    let mut full = BTreeSet::new();
    let mut reaches = Vec::new();
    for cluster in agg.clusters().filter(|c| !c.trends.is_empty()) {
        let reach = reachable_sources(agg, cluster.id);
        full.extend(reach.iter().copied());
        reaches.push((cluster.id, reach));
    }
    reaches
        .into_iter()
        .filter(|(_, reach)| *reach == full)
        .map(|(id, _)| id)
        .collect()
}

/// All terminal clusters.
pub fn atoms(agg: &Aggregation) -> Vec<ClusterId> {
    agg.clusters()
        .filter(|c| c.is_terminal())
        .map(|c| c.id)
        .collect()
}

/// Non-terminal clusters directly built from atoms: every source of every
/// cell across their trends is a terminal. These are the "lexical" layer;
/// failures below them are character-level, failures above them syntax-level.
pub fn above_atoms(agg: &Aggregation) -> Vec<ClusterId> {
    agg.clusters()
        .filter(|cluster| {
            !cluster.trends.is_empty()
                && cluster.trends.iter().all(|&tid| {
                    agg.trend(tid).cells.iter().all(|&cid| {
                        agg.cell(cid)
                            .sources
                            .iter()
                            .all(|&src| agg.cluster(src).is_terminal())
                    })
                })
        })
        .map(|c| c.id)
        .collect()
}

/// Every cluster reachable from `start` by walking trends, cells and their
/// sources. Includes `start` itself.
pub fn reachable_sources(agg: &Aggregation, start: ClusterId) -> BTreeSet<ClusterId> {
    let mut reach = BTreeSet::new();
    let mut queue = VecDeque::new();
    reach.insert(start);
    queue.push_back(start);
    while let Some(cluster_id) = queue.pop_front() {
        for &trend_id in &agg.cluster(cluster_id).trends {
            for &cell_id in &agg.trend(trend_id).cells {
                for &src in &agg.cell(cell_id).sources {
                    if reach.insert(src) {
                        queue.push_back(src);
                    }
                }
            }
        }
    }
    reach
}

/// Is this trend deep-recursive: does its owning cluster reappear through an
/// interior slot rather than at the edges?
///
/// Breadth-first over "cells → their sources → those clusters' trends' cells
/// → their sources", counting hops as: the trend itself is hop 1, its cells
/// hop 2, their source clusters hop 3, and so on. A reappearance of the
/// owning cluster counts once the hop count reaches `min_depth`; the direct
/// self-reference of the first or last cell never counts, since that is
/// plain left/right recursion.
pub fn detect_deep_recurse(agg: &Aggregation, trend_id: TrendId, min_depth: usize) -> bool {
    let trend = agg.trend(trend_id);
    let owner = trend.owner;
    let owner_name = agg.cluster(owner).name.clone();
    let len = trend.cells.len();

    let mut visited: BTreeSet<ClusterId> = BTreeSet::new();
    let mut queue: VecDeque<(ClusterId, usize)> = VecDeque::new();

    for (i, &cell_id) in trend.cells.iter().enumerate() {
        let cell = agg.cell(cell_id);
        let edge_self = (i == 0 || i + 1 == len) && cell.text == owner_name;
        if edge_self {
            continue;
        }
        for &src in &cell.sources {
            if src == owner && 3 >= min_depth {
                return true;
            }
            if visited.insert(src) {
                queue.push_back((src, 3));
            }
        }
    }

    while let Some((cluster_id, depth)) = queue.pop_front() {
        for &tid in &agg.cluster(cluster_id).trends {
            for &cid in &agg.trend(tid).cells {
                // cells sit one hop past their cluster, sources one more
                let source_depth = depth + 2;
                for &src in &agg.cell(cid).sources {
                    if src == owner && source_depth >= min_depth {
                        return true;
                    }
                    if visited.insert(src) {
                        queue.push_back((src, source_depth));
                    }
                }
            }
        }
    }
    false
}

/// Compute the deep-recursion closure of one interior cell: every candidate
/// deep-recursive trend that can be entered while this cell's slot is open.
///
/// Breadth-first from the cell's sources (depth 1). A candidate trend found
/// at depth `min_depth - 1` or beyond is added to `selected`; paths stop as
/// soon as the seed cell's own trend reappears.
pub fn mark_deep_recurse_closure(
    agg: &Aggregation,
    cell_id: CellId,
    candidates: &BTreeSet<TrendId>,
    selected: &mut BTreeSet<TrendId>,
    min_depth: usize,
) {
    let seed_trend = match agg.cell(cell_id).owner {
        Some(t) => t,
        None => return,
    };
    let threshold = min_depth.saturating_sub(1).max(2);

    let mut visited: BTreeSet<ClusterId> = BTreeSet::new();
    let mut queue: VecDeque<(ClusterId, usize)> = VecDeque::new();
    for &src in &agg.cell(cell_id).sources {
        if visited.insert(src) {
            queue.push_back((src, 1));
        }
    }

    while let Some((cluster_id, depth)) = queue.pop_front() {
        for &tid in &agg.cluster(cluster_id).trends {
            if tid == seed_trend {
                continue;
            }
            if depth >= threshold && candidates.contains(&tid) {
                selected.insert(tid);
            }
            for &cid in &agg.trend(tid).cells {
                for &src in &agg.cell(cid).sources {
                    if visited.insert(src) {
                        queue.push_back((src, depth + 1));
                    }
                }
            }
        }
    }
}
