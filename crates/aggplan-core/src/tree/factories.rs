use crate::{
    node::{AggregationNode, Metadata},
    registry::AggregationTraits,
    tree::AggregationTreeBuilder,
};
use std::{
    fmt,
    sync::{Arc, LazyLock},
};
use thiserror::Error as ThisError;
use tracing::debug;

static EMPTY: LazyLock<AggregatorFactories> = LazyLock::new(|| AggregatorFactories {
    factories: Arc::from(Vec::new()),
});

///
/// BuildError
///
/// Raised while producing executable factories. The first failure aborts
/// the whole build.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum BuildError {
    #[error("failed to build aggregation [{aggregation}]: {reason}")]
    Failed { aggregation: String, reason: String },
}

impl BuildError {
    pub fn failed(aggregation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Failed {
            aggregation: aggregation.into(),
            reason: reason.into(),
        }
    }
}

///
/// AggregatorSupplier
///
/// Opaque executable half of a factory, produced by the execution layer.
/// Must be shareable across segment workers.
///

pub trait AggregatorSupplier: fmt::Debug + Send + Sync {
    fn supports_concurrent_search(&self) -> bool {
        true
    }
}

///
/// FactoryContext
///
/// Execution-side collaborator asked to realize one aggregation node.
/// `parent` is the enclosing aggregation, `None` at the tree root.
///

pub trait FactoryContext {
    fn create_supplier(
        &self,
        node: &AggregationNode,
        parent: Option<&AggregationNode>,
    ) -> Result<Arc<dyn AggregatorSupplier>, BuildError>;
}

///
/// AggregatorFactory
///

#[derive(Clone, Debug)]
pub struct AggregatorFactory {
    name: String,
    type_name: String,
    traits: AggregationTraits,
    metadata: Option<Metadata>,
    supplier: Arc<dyn AggregatorSupplier>,
    sub_factories: AggregatorFactories,
}

impl AggregatorFactory {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    #[must_use]
    pub const fn traits(&self) -> AggregationTraits {
        self.traits
    }

    #[must_use]
    pub const fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    #[must_use]
    pub fn supplier(&self) -> &Arc<dyn AggregatorSupplier> {
        &self.supplier
    }

    #[must_use]
    pub const fn sub_factories(&self) -> &AggregatorFactories {
        &self.sub_factories
    }

    #[must_use]
    pub const fn is_global(&self) -> bool {
        self.traits.is_global()
    }

    /// The type, the supplier and every child must all allow concurrent
    /// segment search.
    #[must_use]
    pub fn supports_concurrent_search(&self) -> bool {
        self.traits.supports_concurrent_search()
            && self.supplier.supports_concurrent_search()
            && self.sub_factories.all_support_concurrent_search()
    }
}

///
/// AggregatorFactories
///
/// Immutable, ordered result of building one tree level. Cheap to clone
/// and safe to share across executions.
///

#[derive(Clone, Debug)]
pub struct AggregatorFactories {
    factories: Arc<[AggregatorFactory]>,
}

impl AggregatorFactories {
    /// The shared value for a level without aggregations.
    #[must_use]
    pub fn empty() -> Self {
        EMPTY.clone()
    }

    #[must_use]
    pub fn factories(&self) -> &[AggregatorFactory] {
        &self.factories
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// True when both values share the same underlying allocation.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.factories, &other.factories)
    }

    #[must_use]
    pub fn all_support_concurrent_search(&self) -> bool {
        self.factories
            .iter()
            .all(AggregatorFactory::supports_concurrent_search)
    }

    #[must_use]
    pub fn has_global_aggregator(&self) -> bool {
        self.factories.iter().any(AggregatorFactory::is_global)
    }

    #[must_use]
    pub fn has_non_global_aggregator(&self) -> bool {
        self.factories.iter().any(|factory| !factory.is_global())
    }

    /// Top-level global factories; these run against every document.
    pub fn global(&self) -> impl Iterator<Item = &AggregatorFactory> {
        self.factories.iter().filter(|factory| factory.is_global())
    }

    /// Top-level factories scoped to the query.
    pub fn non_global(&self) -> impl Iterator<Item = &AggregatorFactory> {
        self.factories.iter().filter(|factory| !factory.is_global())
    }
}

impl AggregationTreeBuilder {
    /// Build executable factories for this level and, recursively, every
    /// nested level. Order follows aggregation registration order; pipelines
    /// are not part of the result.
    pub fn build(
        &self,
        context: &dyn FactoryContext,
        parent: Option<&AggregationNode>,
    ) -> Result<AggregatorFactories, BuildError> {
        if self.is_empty() {
            return Ok(AggregatorFactories::empty());
        }

        let factories = self
            .aggregations()
            .iter()
            .map(|node| node.build(context, parent))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(AggregatorFactories {
            factories: Arc::from(factories),
        })
    }
}

impl AggregationNode {
    /// Build this node's factory, then its sub-factories with this node
    /// as their parent.
    pub fn build(
        &self,
        context: &dyn FactoryContext,
        parent: Option<&Self>,
    ) -> Result<AggregatorFactory, BuildError> {
        debug!(
            aggregation = self.name(),
            type_name = self.type_name(),
            parent = parent.map(Self::name),
            "building aggregator factory"
        );

        let supplier = context.create_supplier(self, parent)?;
        let sub_factories = self.sub_aggregations().build(context, Some(self))?;

        Ok(AggregatorFactory {
            name: self.name().to_string(),
            type_name: self.type_name().to_string(),
            traits: self.traits(),
            metadata: self.metadata().cloned(),
            supplier,
            sub_factories,
        })
    }
}
