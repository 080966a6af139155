use rstest::rstest;
use semdag_core::analysis::topology;
use semdag_core::display::trace::format_dag;
use semdag_core::expr::Scope;
use semdag_core::{
    compose, ActionSpec, Addendum, AddendumKind, Dag, DagError, DagOptions, DistributionRegistry,
    Expr, NodeList, Value,
};
use std::collections::HashMap;

fn registry() -> DistributionRegistry {
    DistributionRegistry::with_defaults()
}

fn orders(dag: &Dag) -> Vec<(String, u32)> {
    dag.nodes()
        .iter()
        .map(|n| (n.expanded_name().to_string(), n.order().unwrap()))
        .collect()
}

/// Baseline confounders, a treatment and an outcome.
fn point_treatment(options: &DagOptions) -> Dag {
    let reg = registry();
    let decls = [
        ("W1", Expr::lit(0.5)),
        ("W2", Expr::call("plogis", vec![Expr::lit(-0.5) + Expr::var("W1")])),
        ("A", Expr::call("plogis", vec![Expr::var("W1") + Expr::var("W2")])),
        ("Y", Expr::call("plogis", vec![Expr::var("A") - Expr::var("W1")])),
    ];
    let dag = decls.into_iter().fold(Dag::new(), |dag, (name, prob)| {
        let list = NodeList::builder(name, "rbern").param("prob", prob).build(&reg, &()).unwrap();
        compose(&dag, list, options).unwrap()
    });
    dag.lock(options).unwrap()
}

#[test]
fn test_point_treatment_model() {
    let dag = point_treatment(&DagOptions::default());
    assert_eq!(
        orders(&dag),
        vec![("W1".into(), 1), ("W2".into(), 2), ("A".into(), 3), ("Y".into(), 4)]
    );
    assert_eq!(topology::ancestors(&dag, "Y").unwrap().len(), 3);
}

#[test]
fn test_static_intervention_leaves_other_nodes_untouched() {
    let options = DagOptions::default();
    let dag = point_treatment(&options);
    let set_a = NodeList::builder("A", "rconst").param("const", 1.0).build(&registry(), &()).unwrap();
    let with_action = compose(&dag, ActionSpec::new("A1").nodes(set_a), &options).unwrap();

    let action = with_action.action("A1").unwrap();
    let overlay: Vec<_> = action.nodes(&with_action).collect();
    for (seen, base) in overlay.iter().zip(dag.nodes()) {
        if seen.expanded_name() == "A" {
            assert_eq!(seen.distribution(), "rconst");
            assert_eq!(seen.order(), base.order());
        } else {
            assert_eq!(*seen, base);
        }
    }
    assert!(format_dag(&with_action).contains("ACTION 'A1':"));
}

/// A longitudinal model: baseline W, then L, A and a censoring indicator C
/// at each of times 0..=2, with L depending on its own lag.
fn longitudinal(options: &DagOptions) -> Dag {
    let reg = registry();
    let mut dag = Dag::new();
    let w = NodeList::builder("W", "rnorm")
        .param("mean", 0.0)
        .param("sd", 1.0)
        .build(&reg, &())
        .unwrap();
    dag.add_nodes(w, options).unwrap();

    let l0 = NodeList::builder("L", "rbern")
        .times([0])
        .param("prob", Expr::call("plogis", vec![Expr::var("W")]))
        .build(&reg, &())
        .unwrap();
    let l = NodeList::builder("L", "rbern")
        .times([1, 2])
        .param("prob", Expr::call("plogis", vec![Expr::var("W") + Expr::lag("L", -1)]))
        .build(&reg, &())
        .unwrap();
    let a = NodeList::builder("A", "rbern")
        .times(0..=2)
        .param("prob", Expr::call("plogis", vec![Expr::lag("L", 0)]))
        .build(&reg, &())
        .unwrap();
    let c = NodeList::builder("C", "rbern")
        .times(0..=2)
        .param("prob", Expr::lit(0.05) * Expr::time())
        .end_of_follow_up(true)
        .build(&reg, &())
        .unwrap();
    for list in [l0, l, a, c] {
        dag.add_nodes(list, options).unwrap();
    }
    dag.lock(options).unwrap()
}

#[test]
fn test_longitudinal_model_is_ordered_by_time_block() {
    let dag = longitudinal(&DagOptions::verbose());
    let names: Vec<&str> = dag.expanded_names().collect();
    assert_eq!(
        names,
        vec!["W", "L#0", "A#0", "C#0", "L#1", "A#1", "C#1", "L#2", "A#2", "C#2"]
    );
    assert_eq!(dag.max_time(), Some(2));
    assert!(dag.node("C#1").unwrap().is_end_of_follow_up());
    assert_eq!(dag.node("L#2").unwrap().param("prob").unwrap().to_string(), "plogis(W + L#1)");
    assert_eq!(dag.node("C#2").unwrap().param("prob"), Some(&(Expr::lit(0.05) * Expr::lit(2.0))));

    let parents = topology::parents(&dag, &["L#2"]).unwrap();
    assert_eq!(parents["L#2"].iter().cloned().collect::<Vec<_>>(), vec!["L#1", "W"]);
}

#[test]
fn test_dynamic_intervention_reads_action_attributes() {
    let options = DagOptions::default();
    let dag = longitudinal(&options);
    let reg = registry();
    let rule = NodeList::builder("A", "rbern")
        .times(0..=2)
        .param("prob", Expr::lag("L", 0).gt(Expr::var("cutoff")))
        .build(&reg, &())
        .unwrap();
    let dag = dag
        .apply_action(ActionSpec::new("dynamic").nodes(rule).attribute("cutoff", 0.5))
        .unwrap();
    let action = dag.action("dynamic").unwrap();

    // Inherited from the base node, since the replacement leaves it unset.
    assert_eq!(action.replacement("A#1").unwrap().order(), dag.node("A#1").unwrap().order());

    let sampled: HashMap<String, Value> = [("L#1".to_string(), Value::from(1.0))].into();
    let scope = Scope::new().with(action).with(&sampled);
    let prob = action.replacement("A#1").unwrap().param("prob").unwrap();
    assert_eq!(prob.evaluate(&scope), Ok(Value::Scalar(1.0)));
}

#[test]
fn test_eager_marker_freezes_caller_value() {
    let reg = registry();
    let options = DagOptions::default();
    let caller: HashMap<String, Value> = [("beta".to_string(), Value::from(0.25))].into();
    let list = NodeList::builder("Y", "rnorm")
        .param("mean", Expr::eager(Expr::var("beta")) * Expr::var("X"))
        .param("sd", 1.0)
        .build(&reg, &caller)
        .unwrap();
    let x = NodeList::builder("X", "runif").param("min", 0.0).param("max", 1.0).build(&reg, &()).unwrap();

    let mut dag = Dag::new();
    dag.add_nodes(x, &options).unwrap();
    dag.add_nodes(list, &options).unwrap();
    let dag = dag.lock(&options).unwrap();
    assert_eq!(dag.node("Y").unwrap().param("mean"), Some(&(Expr::lit(0.25) * Expr::var("X"))));
}

#[rstest]
#[case::nodes_on_locked(true, AddendumKind::Nodes, DagError::LockedDag)]
#[case::action_on_growable(false, AddendumKind::Action, DagError::LockedRequired)]
fn test_compose_checks_dag_state(
    #[case] locked: bool,
    #[case] kind: AddendumKind,
    #[case] expected: DagError,
) {
    let options = DagOptions::default();
    let base = if locked { point_treatment(&options) } else { Dag::new() };
    let set_a = NodeList::builder("A", "rconst").param("const", 0.0).build(&registry(), &()).unwrap();
    let addendum = match kind {
        AddendumKind::Nodes => Addendum::from(set_a),
        AddendumKind::Action => Addendum::from(ActionSpec::new("A0").nodes(set_a)),
    };
    assert_eq!(addendum.kind(), kind);
    assert_eq!(compose(&base, addendum, &options).unwrap_err(), expected);
}

#[test]
fn test_options_from_json() {
    let options = DagOptions::from_json(r#"{ "verbose": true }"#).unwrap();
    assert!(options.verbose);
    assert_eq!(DagOptions::from_json("{}").unwrap(), DagOptions::default());
}
