//! Pipeline ordering for one tree level.
//!
//! Depth-first topological sort over the pipelines of a level. A pipeline
//! depends on another pipeline of the same level when the first element of
//! one of its bucket paths names it. Paths whose first element names an
//! aggregation are checked for resolvability but add no edge.
//!
//! Edges are name lookups made on demand; no node ever holds a reference to
//! another. The only mutable state is the mark vector and the output of a
//! single call.

#[cfg(test)]
mod tests;

use crate::{
    node::{AggregationNode, PipelineNode},
    path::{BucketPath, Head, PathError, resolve_head},
};
use std::collections::HashMap;
use thiserror::Error as ThisError;
use tracing::{debug, trace};

///
/// OrderError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum OrderError {
    #[error("Cyclical dependency found with pipeline aggregator [{pipeline}]")]
    CyclicDependency { pipeline: String },

    #[error(transparent)]
    Path(#[from] PathError),
}

/// Order `pipelines` so that every pipeline follows the pipelines it
/// references. Unrelated pipelines keep registration order.
pub fn resolve_pipeline_order<'a>(
    aggregations: &'a [AggregationNode],
    pipelines: &'a [PipelineNode],
) -> Result<Vec<&'a PipelineNode>, OrderError> {
    let mut resolver = OrderResolver::new(aggregations, pipelines);

    for idx in 0..pipelines.len() {
        if resolver.marks[idx] == Mark::Unmarked {
            resolver.visit(idx)?;
        }
    }
    debug!(pipelines = resolver.ordered.len(), "resolved pipeline order");

    Ok(resolver.ordered)
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Mark {
    Unmarked,
    Temporary,
    Ordered,
}

///
/// OrderResolver
///
/// Scratch state of one resolution call.
///

struct OrderResolver<'a> {
    pipelines: &'a [PipelineNode],
    aggregations_by_name: HashMap<&'a str, &'a AggregationNode>,
    pipelines_by_name: HashMap<&'a str, usize>,
    marks: Vec<Mark>,
    ordered: Vec<&'a PipelineNode>,
}

impl<'a> OrderResolver<'a> {
    fn new(aggregations: &'a [AggregationNode], pipelines: &'a [PipelineNode]) -> Self {
        let aggregations_by_name = aggregations
            .iter()
            .map(|node| (node.name(), node))
            .collect();

        // later registrations shadow earlier ones with the same name
        let pipelines_by_name = pipelines
            .iter()
            .enumerate()
            .map(|(idx, node)| (node.name(), idx))
            .collect();

        Self {
            pipelines,
            aggregations_by_name,
            pipelines_by_name,
            marks: vec![Mark::Unmarked; pipelines.len()],
            ordered: Vec::with_capacity(pipelines.len()),
        }
    }

    fn visit(&mut self, idx: usize) -> Result<(), OrderError> {
        let pipelines = self.pipelines;
        let pipeline = &pipelines[idx];

        match self.marks[idx] {
            Mark::Ordered => return Ok(()),
            Mark::Temporary => {
                return Err(OrderError::CyclicDependency {
                    pipeline: pipeline.name().to_string(),
                });
            }
            Mark::Unmarked => {}
        }

        trace!(pipeline = pipeline.name(), "visiting pipeline");
        self.marks[idx] = Mark::Temporary;

        for raw in pipeline.bucket_paths() {
            let path = BucketPath::parse(raw)?;
            let head = resolve_head(
                &path,
                |name| self.aggregations_by_name.get(name).copied(),
                |name| self.pipelines_by_name.get(name).copied(),
            )?;

            if let Head::Pipeline(dependency) = head {
                self.visit(dependency)?;
            }
        }

        self.marks[idx] = Mark::Ordered;
        self.ordered.push(pipeline);

        Ok(())
    }
}
