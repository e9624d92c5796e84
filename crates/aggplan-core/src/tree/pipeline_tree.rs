use crate::{
    node::{AggregationNode, PipelineAggregator},
    order::OrderError,
    tree::AggregationTreeBuilder,
};
use std::{
    collections::BTreeMap,
    sync::{Arc, LazyLock},
};
use tracing::debug;

static EMPTY: LazyLock<Arc<PipelineTree>> = LazyLock::new(|| Arc::new(PipelineTree::default()));

///
/// PipelineTree
///
/// Reduction-time view of the pipelines: per aggregation name the sub-tree
/// of that aggregation, plus this level's pipelines in dependency order.
/// Immutable once built and shared through `Arc`.
///

#[derive(Debug, Default, Eq, PartialEq)]
pub struct PipelineTree {
    sub_trees: BTreeMap<String, Arc<Self>>,
    aggregators: Vec<PipelineAggregator>,
}

impl PipelineTree {
    /// The shared tree used wherever a level holds no nodes.
    #[must_use]
    pub fn empty() -> Arc<Self> {
        Arc::clone(&EMPTY)
    }

    /// The sub-tree of aggregation `name`, or the shared empty tree.
    #[must_use]
    pub fn sub_tree(&self, name: &str) -> Arc<Self> {
        self.sub_trees.get(name).cloned().unwrap_or_else(Self::empty)
    }

    #[must_use]
    pub const fn sub_trees(&self) -> &BTreeMap<String, Arc<Self>> {
        &self.sub_trees
    }

    /// Pipelines of this level, dependencies first.
    #[must_use]
    pub fn aggregators(&self) -> &[PipelineAggregator] {
        &self.aggregators
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.aggregators.is_empty() && self.sub_trees.values().all(|tree| tree.is_empty())
    }
}

impl AggregationTreeBuilder {
    /// Build the pipeline tree for this level and everything below it.
    pub fn build_pipeline_tree(&self) -> Result<Arc<PipelineTree>, OrderError> {
        if self.is_empty() {
            return Ok(PipelineTree::empty());
        }

        let sub_trees = self
            .aggregations()
            .iter()
            .map(|node| Ok((node.name().to_string(), node.build_pipeline_tree()?)))
            .collect::<Result<BTreeMap<_, _>, OrderError>>()?;

        let aggregators: Vec<_> = self
            .ordered_pipelines()?
            .into_iter()
            .map(|pipeline| pipeline.create())
            .collect();
        debug!(
            aggregations = self.aggregations().len(),
            pipelines = aggregators.len(),
            "built pipeline tree level"
        );

        Ok(Arc::new(PipelineTree {
            sub_trees,
            aggregators,
        }))
    }
}

impl AggregationNode {
    /// Pipeline tree of this node's sub-aggregations.
    pub fn build_pipeline_tree(&self) -> Result<Arc<PipelineTree>, OrderError> {
        self.sub_aggregations().build_pipeline_tree()
    }
}
