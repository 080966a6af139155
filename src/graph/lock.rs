//! Finalizes a growable DAG into an ordered, immutable, simulation-ready one.

use super::dag::{Dag, DagState};
use super::error::{DagError, DagResult};
use super::node::NodeSpec;
use crate::config::DagOptions;
use crate::validation::Validator;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

impl Dag {
    /// Resolves every node's order and checks the global invariants.
    ///
    /// Returns a new locked DAG sorted by order with no actions. `self` is
    /// left untouched, so a failed lock can be retried after fixing inputs.
    pub fn lock(&self, options: &DagOptions) -> DagResult<Dag> {
        if self.is_locked() {
            return Err(DagError::LockedDag);
        }
        if self.nodes.is_empty() {
            return Err(DagError::NotADag { reason: "the DAG has no nodes".to_string() });
        }

        let orders = resolve_orders(&self.nodes);
        let mut nodes: Vec<Arc<NodeSpec>> = self
            .nodes
            .iter()
            .zip(orders)
            .map(|(node, order)| {
                if node.order() == Some(order) {
                    Arc::clone(node)
                } else {
                    Arc::new(node.with_order(order))
                }
            })
            .collect();
        // Stable: nodes with a duplicated order keep insertion order for the report.
        nodes.sort_by_key(|n| n.order());

        Validator::new(&nodes).validate()?;

        if options.verbose {
            info!(nodes = nodes.len(), max_time = ?self.max_time(), "DAG locked");
        } else {
            debug!(nodes = nodes.len(), "DAG locked");
        }

        Ok(Dag {
            nodes,
            state: DagState::Locked { actions: BTreeMap::new() },
        })
    }
}

/// Keeps explicit orders and hands every unordered node the smallest unused
/// positive integer that still lets the time blocks line up.
///
/// Untimed nodes are placed first, in insertion order, each taking the
/// smallest free slot after which the unordered timed nodes can still be
/// placed. The timed nodes then fill the remaining slots in time order. When
/// explicit orders leave no consistent assignment, the smallest unused
/// integers are handed out and validation reports the conflict.
fn resolve_orders(nodes: &[Arc<NodeSpec>]) -> Vec<u32> {
    let n = nodes.len() as u32;
    let mut used: HashSet<u32> = nodes.iter().filter_map(|n| n.order()).collect();
    let mut free: BTreeSet<u32> = (1..=n).filter(|o| !used.contains(o)).collect();
    let explicit_timed: Vec<(u32, u32)> = nodes
        .iter()
        .filter_map(|node| Some((node.time()?, node.order()?)))
        .collect();

    let mut pending: Vec<(u32, usize)> = nodes
        .iter()
        .enumerate()
        .filter(|(_, node)| node.order().is_none())
        .filter_map(|(i, node)| node.time().map(|t| (t, i)))
        .collect();
    pending.sort_unstable();
    let pending_times: Vec<u32> = pending.iter().map(|&(t, _)| t).collect();

    let mut orders: Vec<u32> = nodes.iter().map(|node| node.order().unwrap_or(0)).collect();

    for (i, node) in nodes.iter().enumerate() {
        if node.order().is_some() || node.time().is_some() {
            continue;
        }
        let fits = |slot: u32| {
            let mut rest = free.clone();
            rest.remove(&slot);
            place_timed(&rest, &pending_times, &explicit_timed).is_some()
        };
        let slot = match free.iter().copied().find(|&s| fits(s)) {
            Some(slot) => slot,
            None => match free.iter().next().copied() {
                Some(slot) => slot,
                None => smallest_unused(&used),
            },
        };
        free.remove(&slot);
        used.insert(slot);
        orders[i] = slot;
    }

    match place_timed(&free, &pending_times, &explicit_timed) {
        Some(slots) => {
            for (&(_, i), slot) in pending.iter().zip(slots) {
                orders[i] = slot;
            }
        }
        None => {
            for &(_, i) in &pending {
                let slot = smallest_unused(&used);
                used.insert(slot);
                orders[i] = slot;
            }
        }
    }
    orders
}

/// Gives each unordered timed node, by ascending time, the smallest free
/// slot after every node of an earlier time and before every explicitly
/// ordered node of a later time. `None` when some node has no such slot.
fn place_timed(free: &BTreeSet<u32>, times: &[u32], explicit: &[(u32, u32)]) -> Option<Vec<u32>> {
    let mut free = free.clone();
    let mut slots = Vec::with_capacity(times.len());
    // Highest order among placed nodes of earlier times, and of the current time.
    let mut before_current = 0u32;
    let mut current: Option<(u32, u32)> = None;

    for &t in times {
        match current {
            Some((ct, max)) if ct < t => {
                before_current = before_current.max(max);
                current = Some((t, 0));
            }
            None => current = Some((t, 0)),
            Some(_) => {}
        }
        let lower = explicit
            .iter()
            .filter(|&&(et, _)| et < t)
            .map(|&(_, o)| o)
            .fold(before_current, u32::max);
        let upper = explicit
            .iter()
            .filter(|&&(et, _)| et > t)
            .map(|&(_, o)| o)
            .min()
            .unwrap_or(u32::MAX);
        if lower.saturating_add(1) >= upper {
            return None;
        }
        let slot = free.range(lower + 1..upper).next().copied()?;
        free.remove(&slot);
        slots.push(slot);
        if let Some((ct, max)) = current {
            current = Some((ct, max.max(slot)));
        }
    }
    Some(slots)
}

fn smallest_unused(used: &HashSet<u32>) -> u32 {
    (1u32..).find(|o| !used.contains(o)).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::DistributionRegistry;
    use crate::expr::Expr;
    use crate::graph::NodeList;
    use rstest::rstest;

    struct Decl {
        name: &'static str,
        times: Vec<u32>,
        orders: Vec<u32>,
        prob: Expr,
    }

    fn decl(name: &'static str, prob: Expr) -> Decl {
        Decl { name, times: vec![], orders: vec![], prob }
    }

    fn build(decls: Vec<Decl>) -> Dag {
        let reg = DistributionRegistry::with_defaults();
        let opts = DagOptions::default();
        let mut dag = Dag::new();
        for d in decls {
            let list = NodeList::builder(d.name, "rbern")
                .times(d.times)
                .orders(d.orders)
                .param("prob", d.prob)
                .build(&reg, &())
                .unwrap();
            dag.add_nodes(list, &opts).unwrap();
        }
        dag
    }

    fn orders(dag: &Dag) -> Vec<(String, u32)> {
        dag.nodes()
            .iter()
            .map(|n| (n.expanded_name().to_string(), n.order().unwrap()))
            .collect()
    }

    #[test]
    fn test_inferred_orders_follow_insertion() {
        let dag = build(vec![
            decl("W1", Expr::lit(0.5)),
            decl("W2", Expr::var("W1")),
            decl("A", Expr::var("W1") + Expr::var("W2")),
            decl("Y", Expr::var("A") * Expr::var("W1") * Expr::var("W2")),
        ]);
        let locked = dag.lock(&DagOptions::default()).unwrap();
        assert!(locked.is_locked());
        assert!(!dag.is_locked());
        assert_eq!(locked.actions().count(), 0);
        assert_eq!(
            orders(&locked),
            vec![("W1".into(), 1), ("W2".into(), 2), ("A".into(), 3), ("Y".into(), 4)]
        );
    }

    #[test]
    fn test_explicit_orders_are_preserved_and_gaps_filled() {
        let mut w = decl("W", Expr::lit(0.5));
        w.orders = vec![2];
        let dag = build(vec![decl("V", Expr::lit(0.5)), w, decl("X", Expr::lit(0.5))]);
        let locked = dag.lock(&DagOptions::default()).unwrap();
        assert_eq!(
            orders(&locked),
            vec![("V".into(), 1), ("W".into(), 2), ("X".into(), 3)]
        );
    }

    #[test]
    fn test_explicit_order_reorders_sampling() {
        let mut late = decl("B", Expr::lit(0.5));
        late.orders = vec![1];
        let dag = build(vec![decl("A", Expr::lit(0.5)), late]);
        let locked = dag.lock(&DagOptions::default()).unwrap();
        assert_eq!(orders(&locked), vec![("B".into(), 1), ("A".into(), 2)]);
    }

    #[test]
    fn test_orders_cover_one_to_n_with_time_blocks() {
        let dag = build(vec![
            decl("W", Expr::lit(0.5)),
            Decl { name: "L", times: vec![0, 1, 2], orders: vec![], prob: Expr::var("W") },
            Decl { name: "A", times: vec![0, 1, 2], orders: vec![], prob: Expr::lag("L", 0) },
        ]);
        let locked = dag.lock(&DagOptions::default()).unwrap();
        let got: Vec<u32> = locked.nodes().iter().map(|n| n.order().unwrap()).collect();
        assert_eq!(got, (1..=7).collect::<Vec<_>>());
        for a in locked.nodes() {
            for b in locked.nodes() {
                if let (Some(ta), Some(tb)) = (a.time(), b.time()) {
                    if ta < tb {
                        assert!(a.order() < b.order(), "{} vs {}", a.expanded_name(), b.expanded_name());
                    }
                }
            }
        }
        assert_eq!(locked.max_time(), Some(2));
    }

    #[rstest]
    #[case::duplicate(vec![1, 1])]
    #[case::out_of_range(vec![1, 5])]
    fn test_order_conflicts(#[case] explicit: Vec<u32>) {
        let mut a = decl("A", Expr::lit(0.5));
        a.orders = vec![explicit[0]];
        let mut b = decl("B", Expr::lit(0.5));
        b.orders = vec![explicit[1]];
        let dag = build(vec![a, b]);
        let err = dag.lock(&DagOptions::default()).unwrap_err();
        assert!(matches!(err, DagError::OrderConflict { .. }), "{:?}", err);
    }

    #[test]
    fn test_later_time_ordered_first_conflicts() {
        let dag = build(vec![Decl { name: "L", times: vec![0, 1], orders: vec![2, 1], prob: Expr::lit(0.5) }]);
        let err = dag.lock(&DagOptions::default()).unwrap_err();
        assert!(matches!(err, DagError::OrderConflict { .. }), "{:?}", err);
    }

    #[test]
    fn test_time_gap() {
        let dag = build(vec![Decl { name: "L", times: vec![0, 2], orders: vec![], prob: Expr::lit(0.5) }]);
        assert_eq!(dag.lock(&DagOptions::default()).unwrap_err(), DagError::TimeGap { missing: 1 });

        let late_start = build(vec![Decl { name: "L", times: vec![1, 2], orders: vec![], prob: Expr::lit(0.5) }]);
        assert_eq!(late_start.lock(&DagOptions::default()).unwrap_err(), DagError::TimeGap { missing: 0 });
    }

    #[rstest]
    #[case::later_node(vec![decl("A", Expr::var("B")), decl("B", Expr::lit(0.5))], "B")]
    #[case::itself(vec![decl("A", Expr::var("A") + Expr::lit(1.0))], "A")]
    fn test_forward_reference(#[case] decls: Vec<Decl>, #[case] parent: &str) {
        let dag = build(decls);
        let err = dag.lock(&DagOptions::default()).unwrap_err();
        assert_eq!(err, DagError::ForwardReference { node: "A".into(), parent: parent.into() });
    }

    #[test]
    fn test_bare_reference_to_promoted_node_is_unresolved() {
        let dag = build(vec![
            decl("L", Expr::lit(0.5)),
            decl("A", Expr::var("L")),
            Decl { name: "L", times: vec![0], orders: vec![], prob: Expr::lit(0.5) },
        ]);
        assert_eq!(
            dag.lock(&DagOptions::default()).unwrap_err(),
            DagError::UnresolvedReference { node: "A".into(), name: "L".into() }
        );
    }

    #[test]
    fn test_reference_to_undeclared_time_point_is_unresolved() {
        let dag = build(vec![
            Decl { name: "L", times: vec![0, 1], orders: vec![], prob: Expr::lit(0.5) },
            Decl { name: "A", times: vec![0, 1, 2], orders: vec![], prob: Expr::lag("L", 0) },
        ]);
        assert_eq!(dag.node("A#2").unwrap().references().into_iter().collect::<Vec<_>>(), vec!["L#2"]);
        assert_eq!(
            dag.lock(&DagOptions::default()).unwrap_err(),
            DagError::UnresolvedReference { node: "A#2".into(), name: "L#2".into() }
        );
    }

    #[test]
    fn test_time_suffix_on_untimed_node_is_unresolved() {
        let dag = build(vec![decl("W", Expr::lit(0.5)), decl("A", Expr::var("W#0"))]);
        assert_eq!(
            dag.lock(&DagOptions::default()).unwrap_err(),
            DagError::UnresolvedReference { node: "A".into(), name: "W#0".into() }
        );
    }

    #[test]
    fn test_inferred_orders_make_room_for_explicit_time_order() {
        let dag = build(vec![
            decl("W", Expr::lit(0.5)),
            Decl { name: "L", times: vec![0], orders: vec![], prob: Expr::lit(0.5) },
            Decl { name: "L", times: vec![1], orders: vec![2], prob: Expr::lag("L", -1) },
        ]);
        let locked = dag.lock(&DagOptions::default()).unwrap();
        assert_eq!(
            orders(&locked),
            vec![("L#0".into(), 1), ("L#1".into(), 2), ("W".into(), 3)]
        );
    }

    #[test]
    fn test_untimed_node_yields_only_the_slots_timed_nodes_need() {
        let dag = build(vec![
            decl("W", Expr::lit(0.5)),
            Decl { name: "L", times: vec![0, 1], orders: vec![], prob: Expr::lit(0.5) },
            Decl { name: "A", times: vec![1], orders: vec![2], prob: Expr::lag("L", -1) },
        ]);
        let locked = dag.lock(&DagOptions::default()).unwrap();
        assert_eq!(
            orders(&locked),
            vec![("L#0".into(), 1), ("A#1".into(), 2), ("W".into(), 3), ("L#1".into(), 4)]
        );
    }

    #[test]
    fn test_explicit_orders_without_consistent_completion_conflict() {
        // Two later time points cannot both fit after A#0 in a five-node DAG.
        let dag = build(vec![
            decl("W", Expr::lit(0.5)),
            Decl { name: "L", times: vec![0, 1, 2], orders: vec![], prob: Expr::lit(0.5) },
            Decl { name: "A", times: vec![0], orders: vec![4], prob: Expr::lit(0.5) },
        ]);
        let err = dag.lock(&DagOptions::default()).unwrap_err();
        assert!(matches!(err, DagError::OrderConflict { .. }), "{:?}", err);
    }

    #[test]
    fn test_external_names_are_not_parents() {
        let dag = build(vec![decl("A", Expr::var("threshold"))]);
        assert!(dag.lock(&DagOptions::default()).is_ok());
    }

    #[test]
    fn test_relock_and_empty_rejected() {
        let dag = build(vec![decl("A", Expr::lit(0.5))]);
        let locked = dag.lock(&DagOptions::verbose()).unwrap();
        assert_eq!(locked.lock(&DagOptions::default()).unwrap_err(), DagError::LockedDag);
        assert!(matches!(Dag::new().lock(&DagOptions::default()), Err(DagError::NotADag { .. })));
    }

    #[test]
    fn test_failed_lock_leaves_growable_dag_usable() {
        let reg = DistributionRegistry::with_defaults();
        let opts = DagOptions::default();
        let mut dag = build(vec![decl("A", Expr::var("B")), decl("B", Expr::lit(0.5))]);
        assert!(dag.lock(&opts).is_err());
        let fixed = NodeList::builder("A", "rbern").param("prob", Expr::lit(0.2)).build(&reg, &()).unwrap();
        dag.add_nodes(fixed, &opts).unwrap();
        assert!(dag.lock(&opts).is_ok());
    }
}
