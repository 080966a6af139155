use crate::graph::{Action, Dag, DagError, DagResult, NodeSpec};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, Reversed};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

/// Parent sets of the requested nodes: every referenced name that is the
/// expanded name of a node in `dag`.
///
/// Names bound outside the graph (attributes, scope values) are not parents.
pub fn parents(dag: &Dag, names: &[&str]) -> DagResult<BTreeMap<String, BTreeSet<String>>> {
    parents_in(dag.nodes().iter(), names)
}

/// Like [`parents`], but reading replaced nodes from `action`.
pub fn action_parents(
    dag: &Dag,
    action: &Action,
    names: &[&str],
) -> DagResult<BTreeMap<String, BTreeSet<String>>> {
    parents_in(action.nodes(dag), names)
}

fn parents_in<'a>(
    nodes: impl Iterator<Item = &'a Arc<NodeSpec>>,
    names: &[&str],
) -> DagResult<BTreeMap<String, BTreeSet<String>>> {
    let by_name: HashMap<&str, &NodeSpec> = nodes.map(|n| (n.expanded_name(), &**n)).collect();

    let mut out = BTreeMap::new();
    for &name in names {
        let node = by_name
            .get(name)
            .ok_or_else(|| DagError::UnknownNode { name: name.to_string() })?;
        let set: BTreeSet<String> = node
            .references()
            .into_iter()
            .filter(|r| by_name.contains_key(r.as_str()))
            .collect();
        out.insert(name.to_string(), set);
    }
    Ok(out)
}

/// The dependency graph for rendering tools: one vertex per node (weighted by
/// expanded name, in DAG order) and an edge from each parent to its child.
pub fn dependency_graph(dag: &Dag) -> DiGraph<String, ()> {
    let mut graph = DiGraph::with_capacity(dag.len(), 0);
    let mut index: HashMap<&str, NodeIndex> = HashMap::with_capacity(dag.len());
    for node in dag.nodes() {
        index.insert(node.expanded_name(), graph.add_node(node.expanded_name().to_string()));
    }
    for node in dag.nodes() {
        let child = index[node.expanded_name()];
        for parent in node.references() {
            if let Some(&p) = index.get(parent.as_str()) {
                graph.add_edge(p, child, ());
            }
        }
    }
    graph
}

/// Every node `name` depends on, directly or transitively.
pub fn ancestors(dag: &Dag, name: &str) -> DagResult<BTreeSet<String>> {
    reachable(dag, name, true)
}

/// Every node that depends on `name`, directly or transitively.
/// Used to find what an action's replacement can influence.
pub fn descendants(dag: &Dag, name: &str) -> DagResult<BTreeSet<String>> {
    reachable(dag, name, false)
}

fn reachable(dag: &Dag, name: &str, upstream: bool) -> DagResult<BTreeSet<String>> {
    let graph = dependency_graph(dag);
    let start = graph
        .node_indices()
        .find(|&i| graph[i] == name)
        .ok_or_else(|| DagError::UnknownNode { name: name.to_string() })?;

    let mut found = BTreeSet::new();
    if upstream {
        let reversed = Reversed(&graph);
        let mut dfs = Dfs::new(reversed, start);
        while let Some(i) = dfs.next(reversed) {
            found.insert(graph[i].clone());
        }
    } else {
        let mut dfs = Dfs::new(&graph, start);
        while let Some(i) = dfs.next(&graph) {
            found.insert(graph[i].clone());
        }
    }
    found.remove(name);
    Ok(found)
}
