//! Core runtime for aggplan: aggregation nodes, the tree builder, bucket-path
//! resolution, pipeline ordering, validation, and the request/codec surfaces
//! that feed them.
#![warn(unreachable_pub)]

// public exports are one module level down
pub mod admission;
pub mod codec;
pub mod config;
pub mod error;
pub mod node;
pub mod order;
pub mod path;
pub mod plan;
pub mod registry;
pub mod request;
pub mod tree;
pub mod validate;

// test
#[cfg(test)]
pub(crate) mod test_support;

///
/// CONSTANTS
///

/// Default maximum nesting depth accepted by the request parser and the
/// descriptor decoder.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Default upper bound on an encoded builder payload.
pub const DEFAULT_MAX_ENCODED_BYTES: usize = 1024 * 1024;

/// Default number of rewrite rounds a single node may take before it is
/// considered non-converging.
pub const DEFAULT_MAX_REWRITE_ROUNDS: usize = 16;

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No codecs, parsers or collaborator traits are re-exported here.
///

pub mod prelude {
    pub use crate::{
        node::{AggregationNode, Metadata, Params, PipelineNode},
        path::BucketPath,
        registry::TypeRegistry,
        tree::{AggregationTreeBuilder, PipelineTree},
        validate::ValidationErrors,
    };
}
