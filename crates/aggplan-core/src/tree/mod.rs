//! The aggregation tree builder: one level of named aggregations and
//! pipelines, each aggregation owning its own nested level.
//!
//! Construction fails fast (`TreeError`). Ordering, validation, factory
//! building and rewriting live in sibling modules and operate on borrowed
//! builders; none of them mutate the builder they are given.

mod factories;
mod pipeline_tree;
mod rewrite;


use crate::{
    node::{AggregationNode, PipelineNode, validate_name},
    order::{OrderError, resolve_pipeline_order},
    validate::{ValidationErrors, validate_tree},
};
use std::collections::BTreeSet;
use thiserror::Error as ThisError;

// re-exports
pub use factories::{
    AggregatorFactories, AggregatorFactory, AggregatorSupplier, BuildError, FactoryContext,
};
pub use pipeline_tree::PipelineTree;
pub use rewrite::{RewriteError, Rewriter};

///
/// TreeError
///
/// Construction-time failures. These abort immediately.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum TreeError {
    #[error("Two sibling aggregations cannot have the same name: [{name}]")]
    DuplicateName { name: String },

    #[error(
        "Invalid aggregation name [{name}]. Aggregation names can contain any character except '[', ']', and '>'"
    )]
    InvalidName { name: String },
}

///
/// AggregationTreeBuilder
///
/// Mutable accumulator for one tree level.
/// `names` always equals the set of aggregation names held in
/// `aggregations`; pipeline names are not tracked there.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AggregationTreeBuilder {
    names: BTreeSet<String>,
    aggregations: Vec<AggregationNode>,
    pipelines: Vec<PipelineNode>,
}

impl AggregationTreeBuilder {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            names: BTreeSet::new(),
            aggregations: Vec::new(),
            pipelines: Vec::new(),
        }
    }

    /// Register an aggregation. Fails on a sibling name clash and leaves
    /// the builder untouched.
    pub fn add_aggregation(&mut self, node: AggregationNode) -> Result<&mut Self, TreeError> {
        validate_name(node.name())?;

        if self.names.contains(node.name()) {
            return Err(TreeError::DuplicateName {
                name: node.name().to_string(),
            });
        }

        self.names.insert(node.name().to_string());
        self.aggregations.push(node);

        Ok(self)
    }

    /// Register a pipeline. Pipeline names are not checked for uniqueness.
    pub fn add_pipeline(&mut self, node: PipelineNode) -> &mut Self {
        self.pipelines.push(node);
        self
    }

    /// Owned variant of [`Self::add_aggregation`] for expression-style
    /// construction.
    pub fn with_aggregation(mut self, node: AggregationNode) -> Result<Self, TreeError> {
        self.add_aggregation(node)?;
        Ok(self)
    }

    #[must_use]
    pub fn with_pipeline(mut self, node: PipelineNode) -> Self {
        self.add_pipeline(node);
        self
    }

    /// Total registered nodes, aggregations and pipelines.
    #[must_use]
    pub const fn count(&self) -> usize {
        self.aggregations.len() + self.pipelines.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Read-only view of the aggregations, in registration order.
    #[must_use]
    pub fn aggregations(&self) -> &[AggregationNode] {
        &self.aggregations
    }

    /// Read-only view of the pipelines, in registration order.
    #[must_use]
    pub fn pipelines(&self) -> &[PipelineNode] {
        &self.pipelines
    }

    #[must_use]
    pub fn aggregation(&self, name: &str) -> Option<&AggregationNode> {
        self.aggregations.iter().find(|node| node.name() == name)
    }

    /// Last pipeline registered under `name`.
    #[must_use]
    pub fn pipeline(&self, name: &str) -> Option<&PipelineNode> {
        self.pipelines.iter().rev().find(|node| node.name() == name)
    }

    /// Whether executing this level requires visiting every document,
    /// regardless of the query.
    #[must_use]
    pub fn must_visit_all_docs(&self) -> bool {
        self.aggregations
            .iter()
            .any(|node| node.traits().visits_all_docs())
    }

    /// This level's pipelines in dependency order.
    pub fn ordered_pipelines(&self) -> Result<Vec<&PipelineNode>, OrderError> {
        resolve_pipeline_order(&self.aggregations, &self.pipelines)
    }

    /// Validate this builder as a tree root, appending every issue found
    /// anywhere below it to `errors`.
    #[must_use]
    pub fn validate(&self, errors: ValidationErrors) -> ValidationErrors {
        validate_tree(&self.aggregations, &self.pipelines, errors)
    }

    /// Validate as a tree root; `Ok` when no issue was found.
    pub fn check(&self) -> Result<(), ValidationErrors> {
        self.validate(ValidationErrors::new()).into_result()
    }
}
