use crate::graph::{Dag, NodeSpec};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Write;

/// One line per node in DAG order, followed by the attached actions.
pub fn format_dag(dag: &Dag) -> String {
    let mut out = String::new();
    let state = if dag.is_locked() { "locked" } else { "growable" };
    let _ = writeln!(out, "DAG ({}, {} nodes)", state, dag.len());
    let _ = writeln!(out, "--------------------------------------------------");
    for node in dag.nodes() {
        let _ = writeln!(out, "{}", format_node(node));
    }

    for action in dag.actions() {
        let _ = writeln!(out, "ACTION '{}':", action.name());
        for node in action.replacements() {
            let _ = writeln!(out, "  {}", format_node(node));
        }
        for (name, value) in action.attributes() {
            let _ = writeln!(out, "  attr {} = {}", name, value);
        }
    }
    out
}

fn format_node(node: &NodeSpec) -> String {
    let order = node.order().map_or_else(|| "-".to_string(), |o| o.to_string());
    let time = node.time().map_or_else(|| "-".to_string(), |t| t.to_string());
    let params = node
        .params()
        .iter()
        .map(|p| format!("{} = {}", p.name, p.expr))
        .collect::<Vec<_>>()
        .join(", ");
    let efu = if node.is_end_of_follow_up() { " [EFU]" } else { "" };
    format!(
        "[{:>3}] {} (t={}) ~ {}({}){}",
        order,
        node.expanded_name(),
        time,
        node.distribution(),
        params,
        efu
    )
}

/// Renders the ancestor tree of `target`. Nodes reached twice are printed
/// once and referenced by the level they first appeared at.
pub fn format_trace(dag: &Dag, target: &str) -> String {
    let mut output = String::new();
    let Some(node) = dag.node(target) else {
        let _ = writeln!(output, "Error: no node named '{}'", target);
        return output;
    };

    let parents: BTreeMap<String, BTreeSet<String>> = dag
        .nodes()
        .iter()
        .map(|n| {
            let set = n.references().into_iter().filter(|r| dag.node(r).is_some()).collect();
            (n.expanded_name().to_string(), set)
        })
        .collect();

    let mut tracer = Tracer {
        dag,
        parents: &parents,
        visited_at_level: HashMap::new(),
        output,
    };
    let _ = writeln!(tracer.output, "DEPENDENCY TRACE for node '{}':", node.expanded_name());
    let _ = writeln!(tracer.output, "--------------------------------------------------");
    tracer.trace_node(target, 1, "");
    tracer.output
}

struct Tracer<'a> {
    dag: &'a Dag,
    parents: &'a BTreeMap<String, BTreeSet<String>>,
    visited_at_level: HashMap<String, usize>,
    output: String,
}

impl<'a> Tracer<'a> {
    fn trace_node(&mut self, name: &str, level: usize, prefix: &str) {
        if let Some(&first_seen) = self.visited_at_level.get(name) {
            let _ = writeln!(self.output, "{}{} -> (Ref to L{})", prefix, name, first_seen);
            return;
        }
        self.visited_at_level.insert(name.to_string(), level);

        let Some(node) = self.dag.node(name) else { return };
        let _ = writeln!(self.output, "{}[L{}] {}", prefix, level, format_node(node));

        let parent_map = self.parents;
        let parents: Vec<&String> = parent_map
            .get(name)
            .map(|set| set.iter().collect())
            .unwrap_or_default();
        let stem = build_child_stem(prefix);
        for (i, parent) in parents.iter().enumerate() {
            let connector = if i == parents.len() - 1 { "`-- " } else { "|-- " };
            self.trace_node(parent, level + 1, &format!("{}{}", stem, connector));
        }
    }
}

fn build_child_stem(current_prefix: &str) -> String {
    current_prefix.replace("`-- ", "    ").replace("|-- ", "|   ")
}
