//! Apply planner - orders resources by their dependency edges

use crate::types::Address;
use serde::Serialize;

/// Resources grouped into waves.
///
/// Every resource in a wave depends only on resources from earlier waves,
/// so the engine may create a whole wave concurrently.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyPlan {
    pub waves: Vec<Vec<Address>>,
}

impl ApplyPlan {
    /// Creation order, wave by wave
    pub fn apply_order(&self) -> impl Iterator<Item = &Address> {
        self.waves.iter().flatten()
    }

    /// Deletion order: the creation order reversed
    pub fn destroy_order(&self) -> impl Iterator<Item = &Address> {
        self.waves.iter().rev().flat_map(|wave| wave.iter().rev())
    }

    /// Index of the wave containing an address
    pub fn wave_of(&self, address: &Address) -> Option<usize> {
        self.waves.iter().position(|wave| wave.contains(address))
    }

    /// Total number of resources in the plan
    pub fn total_resources(&self) -> usize {
        self.waves.iter().map(Vec::len).sum()
    }

    /// Check if plan is empty
    pub fn is_empty(&self) -> bool {
        self.waves.is_empty()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Find one dependency cycle, if any.
///
/// `deps[i]` lists the nodes that node `i` depends on. The returned path
/// starts and ends at the same node. Nodes are visited in index order so the
/// reported cycle is deterministic.
pub(crate) fn find_cycle(deps: &[Vec<usize>]) -> Option<Vec<usize>> {
    let mut marks = vec![Mark::Unvisited; deps.len()];
    // Current DFS path: node plus the index of its next edge to follow
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for start in 0..deps.len() {
        if marks[start] != Mark::Unvisited {
            continue;
        }
        marks[start] = Mark::InProgress;
        stack.push((start, 0));

        while let Some(top) = stack.last_mut() {
            let (node, edge) = *top;
            let Some(&next) = deps[node].get(edge) else {
                marks[node] = Mark::Done;
                stack.pop();
                continue;
            };
            top.1 += 1;

            match marks[next] {
                Mark::InProgress => {
                    let pos = stack.iter().position(|&(n, _)| n == next).unwrap_or(0);
                    let mut cycle: Vec<usize> = stack[pos..].iter().map(|&(n, _)| n).collect();
                    cycle.push(next);
                    return Some(cycle);
                }
                Mark::Unvisited => {
                    marks[next] = Mark::InProgress;
                    stack.push((next, 0));
                }
                Mark::Done => {}
            }
        }
    }
    None
}

/// Group an acyclic graph into waves (Kahn's algorithm).
///
/// Nodes keep their index order inside each wave. Nodes caught in a cycle
/// never reach zero pending dependencies and are left out, so callers must
/// reject cycles first.
pub(crate) fn layer(deps: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let mut pending: Vec<usize> = deps.iter().map(Vec::len).collect();
    let mut dependents = vec![Vec::new(); deps.len()];
    for (node, node_deps) in deps.iter().enumerate() {
        for &dep in node_deps {
            dependents[dep].push(node);
        }
    }

    let mut waves = Vec::new();
    let mut current: Vec<usize> = (0..deps.len()).filter(|&n| pending[n] == 0).collect();

    while !current.is_empty() {
        let mut next = Vec::new();
        for &node in &current {
            for &dependent in &dependents[node] {
                pending[dependent] -= 1;
                if pending[dependent] == 0 {
                    next.push(dependent);
                }
            }
        }
        next.sort_unstable();
        waves.push(std::mem::take(&mut current));
        current = next;
    }

    waves
}
