//! Immutable descriptors for one aggregation or one pipeline aggregation.
//!
//! Nodes are created through [`crate::registry::TypeRegistry`], which
//! resolves the type tag and computes type-specific traits or rules.
//! Once inserted into a builder a node is never mutated in place; rewriting
//! produces a new node.

mod aggregation;
mod params;
mod pipeline;


use crate::tree::TreeError;

// re-exports
pub use aggregation::{AggregationKind, AggregationNode};
pub use params::{Metadata, Params};
pub use pipeline::{PipelineAggregator, PipelineKind, PipelineNode};

/// Characters that may never appear in an aggregation or pipeline name.
/// They are reserved by the bucket-path syntax.
pub const INVALID_NAME_CHARS: [char; 3] = ['[', ']', '>'];

/// Validate one node name against the bucket-path reserved characters.
pub fn validate_name(name: &str) -> Result<(), TreeError> {
    if name.is_empty() || name.contains(INVALID_NAME_CHARS) {
        return Err(TreeError::InvalidName {
            name: name.to_string(),
        });
    }

    Ok(())
}
