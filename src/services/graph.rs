use crate::domain::errors::{ImportCause, SeedError};
use crate::domain::models::{ExecutionPlan, SeedModuleRef};
use crate::services::discovery::Catalog;
use crate::services::unit::{read_unit, SeedUnit};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet, VecDeque};

/// Seed units reachable from a plan, read and parsed once up front.
#[derive(Debug, Default)]
pub struct ResolvedUnits {
    pub units: HashMap<String, SeedUnit>,
    /// Units that could not be read or parsed, keyed by dotted path.
    pub failures: HashMap<String, ImportCause>,
}

/// Reads every planned unit and, transitively, every catalogued dependency,
/// then rejects the set if the dependency graph has a cycle.
pub fn resolve(plan: &ExecutionPlan, catalog: &Catalog) -> Result<ResolvedUnits, SeedError> {
    let mut resolved = ResolvedUnits::default();
    let planned: HashMap<&str, &SeedModuleRef> = plan
        .entries
        .iter()
        .map(|e| (e.dotted_path.as_str(), e))
        .collect();
    let mut queue: VecDeque<String> = plan.entries.iter().map(|e| e.dotted_path.clone()).collect();
    let mut seen: HashSet<String> = queue.iter().cloned().collect();

    while let Some(dotted_path) = queue.pop_front() {
        let Some(seed) = planned
            .get(dotted_path.as_str())
            .copied()
            .or_else(|| catalog.get(&dotted_path))
        else {
            continue;
        };
        match read_unit(seed) {
            Ok(unit) => {
                for dep in &unit.depends {
                    if catalog.get(dep).is_some() && seen.insert(dep.clone()) {
                        queue.push_back(dep.clone());
                    }
                }
                resolved.units.insert(dotted_path, unit);
            }
            Err(cause) => {
                tracing::debug!(%dotted_path, error = %cause, "seed unit unreadable");
                resolved.failures.insert(dotted_path, cause);
            }
        }
    }

    if let Some(cycle) = find_cycle(&resolved.units) {
        return Err(SeedError::CyclicDependency { cycle });
    }
    Ok(resolved)
}

/// First dependency cycle found, as `[a, b, ..., a]`, or `None` for a DAG.
pub fn find_cycle(units: &HashMap<String, SeedUnit>) -> Option<Vec<String>> {
    let mut names: Vec<&String> = units.keys().collect();
    names.sort();

    let mut graph: DiGraph<String, ()> = DiGraph::new();
    let mut index: HashMap<&str, NodeIndex> = HashMap::new();
    for name in &names {
        index.insert(name.as_str(), graph.add_node((*name).clone()));
    }
    for name in &names {
        for dep in &units[*name].depends {
            if let Some(&to) = index.get(dep.as_str()) {
                graph.add_edge(index[name.as_str()], to, ());
            }
        }
    }

    let mut cyclic: Vec<Vec<NodeIndex>> = petgraph::algo::tarjan_scc(&graph)
        .into_iter()
        .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
        .collect();
    for scc in &mut cyclic {
        scc.sort_by(|a, b| graph[*a].cmp(&graph[*b]));
    }
    cyclic.sort_by(|a, b| graph[a[0]].cmp(&graph[b[0]]));
    let scc = cyclic.into_iter().next()?;

    let members: HashSet<NodeIndex> = scc.iter().copied().collect();
    let start = scc[0];
    let mut path = vec![start];
    let mut visited = HashSet::from([start]);
    walk_back_to(&graph, start, start, &members, &mut visited, &mut path);
    path.push(start);
    Some(path.into_iter().map(|i| graph[i].clone()).collect())
}

fn walk_back_to(
    graph: &DiGraph<String, ()>,
    current: NodeIndex,
    start: NodeIndex,
    members: &HashSet<NodeIndex>,
    visited: &mut HashSet<NodeIndex>,
    path: &mut Vec<NodeIndex>,
) -> bool {
    let mut next: Vec<NodeIndex> = graph
        .neighbors(current)
        .filter(|n| members.contains(n))
        .collect();
    next.sort_by(|a, b| graph[*a].cmp(&graph[*b]));
    for n in next {
        if n == start {
            return true;
        }
        if visited.insert(n) {
            path.push(n);
            if walk_back_to(graph, n, start, members, visited, path) {
                return true;
            }
            path.pop();
        }
    }
    false
}
