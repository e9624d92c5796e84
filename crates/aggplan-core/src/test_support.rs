//! Shared fixtures for unit tests.

use crate::{
    node::{AggregationNode, Params, PipelineNode},
    registry::TypeRegistry,
    tree::{AggregatorSupplier, BuildError, FactoryContext},
};
use std::sync::Arc;

pub(crate) fn registry() -> TypeRegistry {
    TypeRegistry::with_defaults()
}

pub(crate) fn aggregation(
    registry: &TypeRegistry,
    name: &str,
    type_name: &str,
    params: Params,
) -> AggregationNode {
    registry
        .aggregation(name, type_name, params)
        .expect("aggregation fixture should build")
}

/// A `max` metric on `field`, the usual leaf in tests.
pub(crate) fn metric(registry: &TypeRegistry, name: &str) -> AggregationNode {
    aggregation(registry, name, "max", Params::new().with("field", "price"))
}

/// A `date_histogram` on `ts`, a valid parent for sequential pipelines.
pub(crate) fn histogram(registry: &TypeRegistry, name: &str) -> AggregationNode {
    aggregation(
        registry,
        name,
        "date_histogram",
        Params::new().with("field", "ts"),
    )
}

pub(crate) fn pipeline<const N: usize>(
    registry: &TypeRegistry,
    name: &str,
    type_name: &str,
    bucket_paths: [&str; N],
) -> PipelineNode {
    pipeline_with(registry, name, type_name, bucket_paths, Params::new())
}

pub(crate) fn pipeline_with<const N: usize>(
    registry: &TypeRegistry,
    name: &str,
    type_name: &str,
    bucket_paths: [&str; N],
    params: Params,
) -> PipelineNode {
    registry
        .pipeline(name, type_name, bucket_paths, params)
        .expect("pipeline fixture should build")
}

///
/// NoopSupplier
///

#[derive(Debug)]
pub(crate) struct NoopSupplier {
    pub(crate) concurrent: bool,
}

impl AggregatorSupplier for NoopSupplier {
    fn supports_concurrent_search(&self) -> bool {
        self.concurrent
    }
}

///
/// NoopContext
///
/// Accepts every node with a concurrent-capable supplier.
///

pub(crate) struct NoopContext;

impl FactoryContext for NoopContext {
    fn create_supplier(
        &self,
        _node: &AggregationNode,
        _parent: Option<&AggregationNode>,
    ) -> Result<Arc<dyn AggregatorSupplier>, BuildError> {
        Ok(Arc::new(NoopSupplier { concurrent: true }))
    }
}
