use aggplan_core::{
    admission::{AdmissionError, QUERY_GROUP_ID_HEADER, RequestHeaders, RequestRejectionListener},
    codec::{decode_builder, encode_builder},
    config::Config,
    error::{Error, ErrorClass},
    node::{AggregationNode, Params},
    order::OrderError,
    path::PathError,
    plan::{AggregationPlan, AggregationRequest},
    registry::TypeRegistry,
    request::parse_aggregations,
    tree::{
        AggregationTreeBuilder, AggregatorSupplier, BuildError, FactoryContext, RewriteError,
        Rewriter, TreeError,
    },
    validate::ValidationError,
};
use serde_json::{Value, json};
use std::{borrow::Cow, sync::Arc};

#[derive(Debug)]
struct InertSupplier;

impl AggregatorSupplier for InertSupplier {}

struct InertContext;

impl FactoryContext for InertContext {
    fn create_supplier(
        &self,
        _node: &AggregationNode,
        _parent: Option<&AggregationNode>,
    ) -> Result<Arc<dyn AggregatorSupplier>, BuildError> {
        Ok(Arc::new(InertSupplier))
    }
}

fn admit_all(_group_id: &str) -> Result<(), AdmissionError> {
    Ok(())
}

fn parse(registry: &TypeRegistry, value: &Value) -> AggregationTreeBuilder {
    parse_aggregations(value, registry)
        .expect("request should parse")
        .expect("request should not be empty")
}

fn plan(value: &Value) -> Result<AggregationPlan, Error> {
    let registry = TypeRegistry::with_defaults();
    let request = AggregationRequest::new(parse(&registry, value));
    let admitted = request
        .admit(&RequestRejectionListener::new(admit_all), &RequestHeaders::new())
        .expect("request should be admitted");

    admitted.plan(&InertContext)
}

fn validation_errors(err: &Error) -> Vec<&ValidationError> {
    match err {
        Error::Validation(errors) => errors.iter().map(|issue| issue.error()).collect(),
        other => panic!("expected validation errors, got {other:?}"),
    }
}

#[test]
fn json_request_plans_end_to_end() {
    let plan = plan(&json!({
        "sales": {
            "terms": { "field": "product", "min_doc_count": 0 },
            "aggs": {
                "by_day": {
                    "date_histogram": { "field": "ts", "calendar_interval": "day" },
                    "aggs": {
                        "revenue": { "sum": { "field": "price" } },
                        "growth": { "derivative": { "buckets_path": "revenue" } },
                        "trend": { "cumulative_sum": { "buckets_path": "growth" } }
                    }
                }
            }
        },
        "everything": { "global": {} },
        "top_sales": { "max_bucket": { "buckets_path": "sales._count" } }
    }))
    .expect("request should plan");

    assert!(plan.must_visit_all_docs());
    let factories: Vec<&str> = plan
        .factories()
        .factories()
        .iter()
        .map(|factory| factory.name())
        .collect();
    assert_eq!(factories, ["sales", "everything"]);
    assert!(plan.factories().has_global_aggregator());
    assert!(plan.factories().has_non_global_aggregator());

    let by_day_tree = plan.pipeline_tree().sub_tree("sales").sub_tree("by_day");
    let order: Vec<&str> = by_day_tree
        .aggregators()
        .iter()
        .map(|aggregator| aggregator.name())
        .collect();
    assert_eq!(order, ["growth", "trend"]);
    assert_eq!(plan.pipeline_tree().aggregators()[0].name(), "top_sales");
}

#[test]
fn search_body_text_plans_in_written_order() {
    let registry = TypeRegistry::with_defaults();
    let builder = Config::default()
        .request_parser(&registry)
        .parse_body_str(
            r#"{
                "size": 0,
                "aggregations": {
                    "zeta": { "terms": { "field": "z" } },
                    "alpha": { "terms": { "field": "a" } },
                    "p_second": { "max_bucket": { "buckets_path": "zeta._count" } },
                    "p_first": { "max_bucket": { "buckets_path": "alpha._count" } }
                }
            }"#,
        )
        .expect("body should parse")
        .expect("body should hold aggregations");

    let plan = AggregationRequest::new(builder)
        .admit(&RequestRejectionListener::new(admit_all), &RequestHeaders::new())
        .expect("request should be admitted")
        .plan(&InertContext)
        .expect("request should plan");

    let factories: Vec<&str> = plan
        .factories()
        .factories()
        .iter()
        .map(|factory| factory.name())
        .collect();
    let pipelines: Vec<&str> = plan
        .pipeline_tree()
        .aggregators()
        .iter()
        .map(|aggregator| aggregator.name())
        .collect();
    assert_eq!(factories, ["zeta", "alpha"]);
    assert_eq!(pipelines, ["p_second", "p_first"]);
}

#[test]
fn repeated_names_in_body_text_are_rejected() {
    let registry = TypeRegistry::with_defaults();
    let err = Config::default()
        .request_parser(&registry)
        .parse_body_str(
            r#"{ "aggs": {
                "clicks": { "sum": { "field": "clicks" } },
                "clicks": { "sum": { "field": "clicks" } }
            } }"#,
        )
        .expect_err("second clicks should be rejected");

    assert_eq!(Error::from(err).class(), ErrorClass::Construction);
}

#[test]
fn path_into_a_missing_child_is_unresolved() {
    let err = plan(&json!({
        "A": { "terms": { "field": "a" } },
        "B": { "terms": { "field": "b" } },
        "P": { "max_bucket": { "buckets_path": "A.B._count" } }
    }))
    .expect_err("A has no child B");

    assert_eq!(err.class(), ErrorClass::Validation);
    assert_eq!(
        validation_errors(&err),
        [&ValidationError::Order(OrderError::Path(
            PathError::Unresolved {
                path: "A.B._count".to_string(),
                element: Some("B".to_string()),
            }
        ))]
    );
}

#[test]
fn root_pipeline_cannot_see_nested_aggregations() {
    let err = plan(&json!({
        "sales": {
            "terms": { "field": "product" },
            "aggs": { "avg_price": { "avg": { "field": "price" } } }
        },
        "price_bucket_sort": { "bucket_sort": { "buckets_path": "avg_price" } }
    }))
    .expect_err("avg_price lives under sales");

    let errors = validation_errors(&err);
    assert!(
        matches!(
            errors.as_slice(),
            [ValidationError::Order(OrderError::Path(PathError::Unresolved { path, .. }))]
                if path == "avg_price"
        ),
        "unexpected errors: {errors:?}"
    );
}

#[test]
fn chained_pipelines_run_dependencies_first() {
    let plan = plan(&json!({
        "my_sum": { "sum": { "field": "price" } },
        "derivative_a": { "max_bucket": { "buckets_path": "derivative_b" } },
        "derivative_b": { "max_bucket": { "buckets_path": "derivative_c" } },
        "derivative_c": { "max_bucket": { "buckets_path": "my_sum" } }
    }))
    .expect("chain should plan");

    let order: Vec<&str> = plan
        .pipeline_tree()
        .aggregators()
        .iter()
        .map(|aggregator| aggregator.name())
        .collect();
    assert_eq!(order, ["derivative_c", "derivative_b", "derivative_a"]);
}

#[test]
fn duplicate_sibling_names_fail_on_insert() {
    let registry = TypeRegistry::with_defaults();
    let clicks = || {
        registry
            .aggregation("clicks", "sum", Params::new().with("field", "clicks"))
            .expect("clicks should build")
    };

    let mut builder = AggregationTreeBuilder::new();
    builder
        .add_aggregation(clicks())
        .expect("first clicks should insert");
    let err = builder
        .add_aggregation(clicks())
        .expect_err("second clicks should be rejected");

    assert_eq!(
        err,
        TreeError::DuplicateName {
            name: "clicks".to_string()
        }
    );
    assert_eq!(builder.count(), 1);
}

#[test]
fn mutual_references_are_cyclic() {
    let err = plan(&json!({
        "loop_a": { "max_bucket": { "buckets_path": "loop_b" } },
        "loop_b": { "max_bucket": { "buckets_path": "loop_a" } }
    }))
    .expect_err("loop should be rejected");

    let errors = validation_errors(&err);
    assert!(
        matches!(
            errors.as_slice(),
            [ValidationError::Order(OrderError::CyclicDependency { pipeline })]
                if pipeline == "loop_a" || pipeline == "loop_b"
        ),
        "unexpected errors: {errors:?}"
    );
}

#[test]
fn rejected_group_never_reaches_planning() {
    let registry = TypeRegistry::with_defaults();
    let request = AggregationRequest::new(parse(
        &registry,
        &json!({ "price": { "avg": { "field": "price" } } }),
    ));
    let listener = RequestRejectionListener::new(|group_id: &str| {
        Err(AdmissionError::rejected(group_id, "cpu limit reached"))
    });
    let headers = RequestHeaders::new().with(QUERY_GROUP_ID_HEADER, "analytics");

    let err = request
        .admit(&listener, &headers)
        .expect_err("analytics should be rejected");

    assert_eq!(
        err.to_string(),
        "request rejected by query group [analytics]: cpu limit reached"
    );
    assert_eq!(Error::from(err).class(), ErrorClass::Admission);
}

#[test]
fn configured_types_parse_encode_and_decode() {
    let config = Config::from_toml_str(
        r#"
        [limits]
        max_depth = 4

        [[aggregation_types]]
        name = "percentile_sketch"
        concurrent_search = false

        [[pipeline_types]]
        name = "bucket_ratio"
        paths = { exactly = 2 }
        placement = "inside_tree"
        "#,
    )
    .expect("config should parse");
    let registry = config.registry().expect("registry should extend");

    let builder = config
        .request_parser(&registry)
        .parse(&json!({
            "by_day": {
                "date_histogram": { "field": "ts", "calendar_interval": "day" },
                "aggs": {
                    "hits": { "value_count": { "field": "id" } },
                    "misses": { "value_count": { "field": "miss" } },
                    "latency": { "percentile_sketch": { "field": "took" } },
                    "ratio": { "bucket_ratio": { "buckets_path": ["hits", "misses"] } }
                }
            }
        }))
        .expect("request should parse")
        .expect("request should not be empty");
    builder.check().expect("tree should be valid");

    let bytes = encode_builder(&builder).expect("tree should encode");
    let decoded = decode_builder(&bytes, &registry, &config.limits).expect("tree should decode");
    assert_eq!(decoded, builder);

    let factories = decoded
        .build(&InertContext, None)
        .expect("factories should build");
    assert!(!factories.all_support_concurrent_search());

    let err = decode_builder(&bytes, &TypeRegistry::with_defaults(), &config.limits)
        .expect_err("default registry lacks the configured types");
    assert_eq!(Error::from(err).class(), ErrorClass::Codec);
}

struct RenameField;

impl Rewriter for RenameField {
    fn rewrite_aggregation(
        &self,
        node: &AggregationNode,
    ) -> Result<Option<AggregationNode>, RewriteError> {
        if node.params().get_str("field") != Some("legacy_price") {
            return Ok(None);
        }

        let registry = TypeRegistry::with_defaults();
        let renamed = registry
            .aggregation(
                node.name(),
                node.type_name(),
                node.params().clone().with("field", "price"),
            )
            .map_err(|err| RewriteError::Failed {
                name: node.name().to_string(),
                reason: err.to_string(),
            })?;

        Ok(Some(
            renamed.with_sub_aggregations(node.sub_aggregations().clone()),
        ))
    }
}

#[test]
fn rewriting_until_stable_converges() {
    let registry = TypeRegistry::with_defaults();
    let builder = parse(
        &registry,
        &json!({
            "sales": {
                "terms": { "field": "product" },
                "aggs": { "price": { "avg": { "field": "legacy_price" } } }
            }
        }),
    );

    let rewritten = builder.rewrite(&RenameField).expect("rewrite should succeed");
    let Cow::Owned(rewritten) = rewritten else {
        panic!("nested field should have been rewritten");
    };
    let price = rewritten
        .aggregation("sales")
        .and_then(|sales| sales.sub_aggregations().aggregation("price"))
        .expect("price should survive the rewrite");
    assert_eq!(price.params().get_str("field"), Some("price"));

    let again = rewritten
        .rewrite(&RenameField)
        .expect("second rewrite should succeed");
    assert!(matches!(again, Cow::Borrowed(same) if std::ptr::eq(same, &rewritten)));
}
