use super::{OrderError, resolve_pipeline_order};
use crate::{
    node::{AggregationNode, Params, PipelineNode},
    path::{BucketPath, PathError, Resolution, resolve},
    registry::TypeRegistry,
    test_support::{aggregation, metric, pipeline, registry},
    tree::AggregationTreeBuilder,
    validate::PipelineRules,
};
use proptest::prelude::*;

fn names<'a>(ordered: &[&'a PipelineNode]) -> Vec<&'a str> {
    ordered.iter().map(|node| node.name()).collect()
}

// A registry with one unconstrained pipeline type, so paths can be
// generated freely.
fn reference_registry() -> TypeRegistry {
    let mut registry = TypeRegistry::with_defaults();
    registry
        .register_pipeline("ref", |_: &Params| Ok(PipelineRules::unconstrained()))
        .expect("ref should register");

    registry
}

fn reference(registry: &TypeRegistry, name: &str, paths: Vec<String>) -> PipelineNode {
    registry
        .pipeline(name, "ref", paths, Params::new())
        .expect("ref pipeline should build")
}

#[test]
fn chained_derivatives_are_ordered_dependencies_first() {
    let registry = registry();
    let aggregations = vec![aggregation(
        &registry,
        "my_sum",
        "sum",
        Params::new().with("field", "price"),
    )];
    let pipelines = vec![
        pipeline(&registry, "derivative_a", "derivative", ["derivative_b"]),
        pipeline(&registry, "derivative_b", "derivative", ["derivative_c"]),
        pipeline(&registry, "derivative_c", "derivative", ["my_sum"]),
    ];

    let ordered = resolve_pipeline_order(&aggregations, &pipelines).expect("order should resolve");

    assert_eq!(
        names(&ordered),
        ["derivative_c", "derivative_b", "derivative_a"]
    );
}

#[test]
fn unrelated_pipelines_keep_registration_order() {
    let registry = registry();
    let aggregations = vec![metric(&registry, "price")];
    let pipelines = vec![
        pipeline(&registry, "z_total", "sum_bucket", ["price"]),
        pipeline(&registry, "a_total", "max_bucket", ["price"]),
        pipeline(&registry, "count_only", "bucket_sort", ["_count"]),
    ];

    let ordered = resolve_pipeline_order(&aggregations, &pipelines).expect("order should resolve");

    assert_eq!(names(&ordered), ["z_total", "a_total", "count_only"]);
}

#[test]
fn two_pipeline_cycle_is_reported() {
    let registry = registry();
    let pipelines = vec![
        pipeline(&registry, "loop_a", "max_bucket", ["loop_b"]),
        pipeline(&registry, "loop_b", "max_bucket", ["loop_a"]),
    ];

    let err = resolve_pipeline_order(&[], &pipelines).expect_err("cycle should be rejected");

    assert_eq!(
        err,
        OrderError::CyclicDependency {
            pipeline: "loop_a".to_string()
        }
    );
    assert_eq!(
        err.to_string(),
        "Cyclical dependency found with pipeline aggregator [loop_a]"
    );
}

#[test]
fn self_reference_is_a_cycle() {
    let registry = registry();
    let pipelines = vec![pipeline(&registry, "echo", "max_bucket", ["echo"])];

    let err = resolve_pipeline_order(&[], &pipelines).expect_err("self cycle should be rejected");
    assert!(
        matches!(err, OrderError::CyclicDependency { ref pipeline } if pipeline == "echo"),
        "unexpected error: {err:?}"
    );
}

#[test]
fn aggregation_paths_must_resolve_inside_the_aggregation() {
    let registry = registry();
    let aggregations = vec![metric(&registry, "A"), metric(&registry, "B")];
    let pipelines = vec![pipeline(&registry, "P", "max_bucket", ["A.B._count"])];

    let err = resolve_pipeline_order(&aggregations, &pipelines)
        .expect_err("B is not a sub-aggregation of A");

    assert_eq!(
        err,
        OrderError::Path(PathError::Unresolved {
            path: "A.B._count".to_string(),
            element: Some("B".to_string()),
        })
    );
    assert!(err.to_string().contains("A.B._count"), "unexpected error: {err:?}");
}

#[test]
fn unknown_first_element_is_unresolved() {
    let registry = registry();
    let sales = metric(&registry, "sales").with_sub_aggregations(
        AggregationTreeBuilder::new()
            .with_aggregation(metric(&registry, "avg_price"))
            .expect("avg_price should insert"),
    );
    let pipelines = vec![pipeline(
        &registry,
        "price_bucket_sort",
        "bucket_sort",
        ["avg_price"],
    )];

    let err = resolve_pipeline_order(&[sales], &pipelines)
        .expect_err("avg_price only exists under sales");

    assert_eq!(err.to_string(), "No aggregation found for path [avg_price]");
}

#[test]
fn malformed_path_fails_ordering() {
    let registry = registry();
    let pipelines = vec![pipeline(&registry, "bad", "max_bucket", ["a..b"])];

    let err = resolve_pipeline_order(&[], &pipelines).expect_err("malformed path should fail");
    assert!(
        matches!(err, OrderError::Path(PathError::Malformed { .. })),
        "unexpected error: {err:?}"
    );
}

#[test]
fn duplicate_pipeline_names_resolve_to_the_last_registration() {
    let registry = reference_registry();
    let aggregations = vec![metric(&registry, "price")];
    let pipelines = vec![
        reference(&registry, "consumer", vec!["twin".into()]),
        reference(&registry, "twin", vec!["price".into()]),
        reference(&registry, "twin", vec!["_count".into()]),
    ];

    let ordered = resolve_pipeline_order(&aggregations, &pipelines).expect("order should resolve");

    // the first `twin` is never reached through a reference and is ordered
    // on its own turn
    assert_eq!(ordered.len(), 3);
    assert!(std::ptr::eq(ordered[0], &pipelines[2]));
    assert!(std::ptr::eq(ordered[1], &pipelines[0]));
    assert!(std::ptr::eq(ordered[2], &pipelines[1]));
}

#[test]
fn ordering_dispatches_first_elements_like_resolve() {
    let registry = registry();
    let namespace = AggregationTreeBuilder::new()
        .with_aggregation(metric(&registry, "price"))
        .expect("price should insert")
        .with_pipeline(pipeline(&registry, "peak", "max_bucket", ["price"]))
        .with_pipeline(pipeline(&registry, "price", "bucket_sort", ["_count"]))
        .with_pipeline(pipeline(&registry, "total", "sum_bucket", ["peak"]));

    let ordered = resolve_pipeline_order(namespace.aggregations(), namespace.pipelines())
        .expect("order should resolve");

    // `peak` reads the aggregation, not the pipeline sharing its name
    assert_eq!(names(&ordered), ["peak", "price", "total"]);

    let position = |name: &str| ordered.iter().position(|node| node.name() == name);
    for node in namespace.pipelines() {
        for raw in node.bucket_paths() {
            let path = BucketPath::parse(raw).expect("path should parse");
            let resolution = resolve(&path, &namespace).expect("path should resolve");
            if let Resolution::Pipeline(dependency) = resolution {
                assert!(
                    position(dependency.name()) < position(node.name()),
                    "{} should be ordered before {}",
                    dependency.name(),
                    node.name()
                );
            }
        }
    }
}

///
/// PROPERTIES
///

// Levels assign a rank per pipeline; an edge is kept only from a higher
// rank to a strictly lower one, so the generated graph is acyclic.
fn arb_dag() -> impl Strategy<Value = (Vec<u8>, Vec<Vec<usize>>)> {
    (1usize..8).prop_flat_map(|n| {
        (
            prop::collection::vec(0u8..4, n),
            prop::collection::vec(prop::collection::vec(0..n, 0..3), n),
        )
    })
}

fn dag_pipelines(
    registry: &TypeRegistry,
    levels: &[u8],
    edges: &[Vec<usize>],
) -> Vec<PipelineNode> {
    (0..levels.len())
        .map(|idx| {
            let mut paths = vec!["base._count".to_string()];
            paths.extend(
                edges[idx]
                    .iter()
                    .filter(|dep| levels[**dep] < levels[idx])
                    .map(|dep| format!("p{dep}")),
            );
            reference(registry, &format!("p{idx}"), paths)
        })
        .collect()
}

proptest! {
    #[test]
    fn dependencies_always_precede_dependents((levels, edges) in arb_dag()) {
        let registry = reference_registry();
        let aggregations: Vec<AggregationNode> = vec![metric(&registry, "base")];
        let pipelines = dag_pipelines(&registry, &levels, &edges);

        let ordered = resolve_pipeline_order(&aggregations, &pipelines)
            .expect("acyclic graph should order");
        let position = |name: &str| ordered.iter().position(|node| node.name() == name);

        prop_assert_eq!(ordered.len(), pipelines.len());
        for (idx, deps) in edges.iter().enumerate() {
            let dependent = position(&format!("p{idx}")).expect("every pipeline is ordered");
            for dep in deps.iter().filter(|dep| levels[**dep] < levels[idx]) {
                let dependency = position(&format!("p{dep}")).expect("every pipeline is ordered");
                prop_assert!(dependency < dependent, "p{} must precede p{}", dep, idx);
            }
        }
    }

    #[test]
    fn rings_are_always_cyclic(len in 1usize..6, rotation in 0usize..6) {
        let registry = reference_registry();
        let mut pipelines: Vec<PipelineNode> = (0..len)
            .map(|idx| {
                let next = format!("r{}", (idx + 1) % len);
                reference(&registry, &format!("r{idx}"), vec![next])
            })
            .collect();
        pipelines.rotate_left(rotation % len);

        let err = resolve_pipeline_order(&[], &pipelines).expect_err("ring should be cyclic");
        prop_assert!(
            matches!(err, OrderError::CyclicDependency { .. }),
            "unexpected error: {:?}",
            err
        );
    }
}
