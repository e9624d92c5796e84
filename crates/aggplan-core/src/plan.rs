//! Request-level planning: admission, whole-tree validation, factory
//! building and pipeline-tree construction, in that order.

use crate::{
    admission::{AdmissionError, RejectionCheck, RequestHeaders, RequestRejectionListener},
    error::Error,
    tree::{AggregationTreeBuilder, AggregatorFactories, FactoryContext, PipelineTree},
};
use std::sync::Arc;
use tracing::debug;

///
/// AggregationRequest
///
/// Aggregations of one search request that has not been admitted yet.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AggregationRequest {
    aggregations: AggregationTreeBuilder,
}

impl AggregationRequest {
    #[must_use]
    pub const fn new(aggregations: AggregationTreeBuilder) -> Self {
        Self { aggregations }
    }

    #[must_use]
    pub const fn aggregations(&self) -> &AggregationTreeBuilder {
        &self.aggregations
    }

    /// Run admission control; only an admitted request can be planned.
    pub fn admit<C: RejectionCheck>(
        self,
        listener: &RequestRejectionListener<C>,
        headers: &RequestHeaders,
    ) -> Result<AdmittedRequest, AdmissionError> {
        listener.on_request_start(headers)?;

        Ok(AdmittedRequest {
            aggregations: self.aggregations,
        })
    }
}

///
/// AdmittedRequest
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AdmittedRequest {
    aggregations: AggregationTreeBuilder,
}

impl AdmittedRequest {
    #[must_use]
    pub const fn aggregations(&self) -> &AggregationTreeBuilder {
        &self.aggregations
    }

    /// Validate the whole tree, then build factories and the pipeline tree.
    /// Validation issues are returned together; build failures abort.
    pub fn plan(&self, context: &dyn FactoryContext) -> Result<AggregationPlan, Error> {
        self.aggregations.check()?;

        let factories = self.aggregations.build(context, None)?;
        let pipeline_tree = self.aggregations.build_pipeline_tree()?;
        debug!(
            factories = factories.len(),
            pipelines = pipeline_tree.aggregators().len(),
            "planned aggregations"
        );

        Ok(AggregationPlan {
            factories,
            pipeline_tree,
            must_visit_all_docs: self.aggregations.must_visit_all_docs(),
        })
    }
}

///
/// AggregationPlan
///
/// Everything execution needs: built factories and the reduction-time
/// pipeline tree.
///

#[derive(Clone, Debug)]
pub struct AggregationPlan {
    factories: AggregatorFactories,
    pipeline_tree: Arc<PipelineTree>,
    must_visit_all_docs: bool,
}

impl AggregationPlan {
    #[must_use]
    pub const fn factories(&self) -> &AggregatorFactories {
        &self.factories
    }

    #[must_use]
    pub const fn pipeline_tree(&self) -> &Arc<PipelineTree> {
        &self.pipeline_tree
    }

    /// Whether the top level must see every document regardless of the
    /// query.
    #[must_use]
    pub const fn must_visit_all_docs(&self) -> bool {
        self.must_visit_all_docs
    }
}

///
/// TESTS
///
