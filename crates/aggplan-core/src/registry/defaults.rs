use crate::{
    node::Params,
    registry::{AggregationTraits, TypeRegistry},
    validate::{PathArity, PipelineRules, Placement},
};

// Value-source aggregations read either a mapped field or a script.
const VALUE_SOURCE: &[&str] = &["field", "script"];

///
/// Built-in types
///
/// Bucket aggregations, metric aggregations, and the pipeline families:
/// sequential (parent must be histogram-like), bucket-scoped (must sit
/// inside another aggregation) and sibling (anywhere, one path).
///

pub(super) fn install(registry: &mut TypeRegistry) {
    // buckets
    registry.insert_aggregation("terms", |params: &Params| {
        require_any(params, VALUE_SOURCE)?;
        let min_doc_count = params.get_i64("min_doc_count");

        Ok(AggregationTraits::new().visiting_all_docs(min_doc_count == Some(0)))
    });
    for sequential in ["histogram", "date_histogram", "auto_date_histogram"] {
        registry.insert_aggregation(sequential, |params: &Params| {
            require_any(params, VALUE_SOURCE)?;
            Ok(AggregationTraits::new().sequential())
        });
    }
    registry.insert_aggregation("range", value_source(AggregationTraits::new()));
    registry.insert_aggregation("filter", |_: &Params| Ok(AggregationTraits::new()));
    registry.insert_aggregation("filters", |params: &Params| {
        require_any(params, &["filters"])?;
        Ok(AggregationTraits::new())
    });
    registry.insert_aggregation("global", |_: &Params| Ok(AggregationTraits::new().global()));
    registry.insert_aggregation("sampler", |_: &Params| {
        Ok(AggregationTraits::new().without_concurrent_search())
    });
    registry.insert_aggregation("diversified_sampler", |params: &Params| {
        require_any(params, VALUE_SOURCE)?;
        Ok(AggregationTraits::new().without_concurrent_search())
    });

    // metrics
    for metric in [
        "avg",
        "cardinality",
        "max",
        "min",
        "percentiles",
        "stats",
        "sum",
        "value_count",
    ] {
        registry.insert_aggregation(metric, value_source(AggregationTraits::new()));
    }
    registry.insert_aggregation("top_hits", |_: &Params| Ok(AggregationTraits::new()));

    // sequential pipelines
    let sequential = PipelineRules::new(PathArity::Exactly(1), Placement::SequentialParent);
    registry.insert_pipeline("derivative", sequential, &[]);
    registry.insert_pipeline("cumulative_sum", sequential, &[]);
    registry.insert_pipeline("serial_diff", sequential, &[]);
    registry.insert_pipeline("moving_fn", sequential, &["script", "window"]);

    // bucket-scoped pipelines
    let scripted = PipelineRules::new(PathArity::AtLeast(1), Placement::InsideTree);
    registry.insert_pipeline("bucket_script", scripted, &["script"]);
    registry.insert_pipeline("bucket_selector", scripted, &["script"]);
    registry.insert_pipeline(
        "bucket_sort",
        PipelineRules::new(PathArity::Any, Placement::InsideTree),
        &[],
    );

    // sibling pipelines
    let sibling = PipelineRules::new(PathArity::Exactly(1), Placement::Anywhere);
    for bucket_metric in [
        "avg_bucket",
        "max_bucket",
        "min_bucket",
        "percentiles_bucket",
        "stats_bucket",
        "sum_bucket",
    ] {
        registry.insert_pipeline(bucket_metric, sibling, &[]);
    }
}

fn value_source(
    traits: AggregationTraits,
) -> impl Fn(&Params) -> Result<AggregationTraits, String> + Send + Sync + 'static {
    move |params: &Params| {
        require_any(params, VALUE_SOURCE)?;
        Ok(traits)
    }
}

/// At least one of `keys` must be present.
pub(crate) fn require_any(params: &Params, keys: &[&str]) -> Result<(), String> {
    if params.has_any(keys) {
        Ok(())
    } else {
        Err(format!(
            "required one of fields [{}], but none were specified",
            keys.join(", ")
        ))
    }
}

/// Every one of `keys` must be present.
pub(crate) fn require_all(params: &Params, keys: &[&str]) -> Result<(), String> {
    match keys.iter().find(|key| !params.has_any(&[**key])) {
        Some(missing) => Err(format!("required field [{missing}] is missing")),
        None => Ok(()),
    }
}
