use aggplan_core::{
    node::AggregationNode,
    plan::AggregationPlan,
    tree::{AggregatorFactory, AggregatorSupplier, BuildError, FactoryContext, PipelineTree},
};
use serde::Serialize;
use std::sync::Arc;

///
/// DryRunContext
///
/// Stands in for the execution layer. Suppliers carry no behavior, so
/// concurrency in the report comes from the type traits alone.
///

pub struct DryRunContext;

#[derive(Debug)]
struct DryRunSupplier;

impl AggregatorSupplier for DryRunSupplier {}

impl FactoryContext for DryRunContext {
    fn create_supplier(
        &self,
        _node: &AggregationNode,
        _parent: Option<&AggregationNode>,
    ) -> Result<Arc<dyn AggregatorSupplier>, BuildError> {
        Ok(Arc::new(DryRunSupplier))
    }
}

///
/// PlanReport
///

#[derive(Debug, Serialize)]
pub struct PlanReport {
    must_visit_all_docs: bool,
    concurrent_search: bool,
    aggregations: Vec<FactoryReport>,
    pipelines: PipelineReport,
}

impl PlanReport {
    pub fn new(plan: &AggregationPlan) -> Self {
        Self {
            must_visit_all_docs: plan.must_visit_all_docs(),
            concurrent_search: plan.factories().all_support_concurrent_search(),
            aggregations: plan
                .factories()
                .factories()
                .iter()
                .map(FactoryReport::new)
                .collect(),
            pipelines: PipelineReport::new(plan.pipeline_tree()),
        }
    }
}

#[derive(Debug, Serialize)]
struct FactoryReport {
    name: String,
    #[serde(rename = "type")]
    type_name: String,
    global: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<Self>,
}

impl FactoryReport {
    fn new(factory: &AggregatorFactory) -> Self {
        Self {
            name: factory.name().to_string(),
            type_name: factory.type_name().to_string(),
            global: factory.is_global(),
            children: factory
                .sub_factories()
                .factories()
                .iter()
                .map(Self::new)
                .collect(),
        }
    }
}

// Pipelines per level in execution order; empty levels are left out.
#[derive(Debug, Serialize)]
struct PipelineReport {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    order: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<(String, Self)>,
}

impl PipelineReport {
    fn new(tree: &PipelineTree) -> Self {
        Self {
            order: tree
                .aggregators()
                .iter()
                .map(|aggregator| aggregator.name().to_string())
                .collect(),
            children: tree
                .sub_trees()
                .iter()
                .filter(|(_, sub_tree)| !sub_tree.is_empty())
                .map(|(name, sub_tree)| (name.clone(), Self::new(sub_tree)))
                .collect(),
        }
    }
}

/// Lowercase hex, two characters per byte.
pub fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write as _;

    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }

    out
}
