//! Descriptor codec: the length-prefixed byte form of an aggregation tree
//! builder used to ship a request between nodes.
//!
//! Layout of one level:
//! - vint aggregation count, then per aggregation: type tag, name, params
//!   JSON, optional metadata JSON, nested level;
//! - vint pipeline count, then per pipeline: type tag, name, vint path
//!   count and paths, params JSON, optional metadata JSON.
//!
//! Strings are vint byte length followed by UTF-8. Decoding re-resolves
//! every type tag through a registry and re-applies the builder
//! invariants; payload size and nesting depth are bounded.

mod stream;


use crate::{
    config::Limits,
    node::{AggregationNode, Params, PipelineNode},
    registry::{RegistryError, TypeRegistry},
    tree::{AggregationTreeBuilder, TreeError},
};
use thiserror::Error as ThisError;
use tracing::debug;

// re-exports
pub use stream::{StreamInput, StreamOutput};

///
/// CodecError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum CodecError {
    #[error("encoded aggregations exceed max size: {len} bytes (max {max})")]
    TooLarge { len: usize, max: usize },

    #[error("encoded aggregations are nested deeper than the limit of {max_depth}")]
    TooDeep { max_depth: usize },

    #[error("unexpected end of input at offset {offset}")]
    UnexpectedEnd { offset: usize },

    #[error("malformed vint at offset {offset}")]
    VIntTooLong { offset: usize },

    #[error("length {len} at offset {offset} exceeds the {remaining} remaining bytes")]
    LengthOutOfBounds {
        offset: usize,
        len: usize,
        remaining: usize,
    },

    #[error("length {len} does not fit a vint")]
    LengthOverflow { len: usize },

    #[error("invalid bool byte {byte:#04x} at offset {offset}")]
    InvalidBool { offset: usize, byte: u8 },

    #[error("invalid UTF-8 string at offset {offset}")]
    InvalidUtf8 { offset: usize },

    #[error("invalid params JSON at offset {offset}: {reason}")]
    InvalidJson { offset: usize, reason: String },

    #[error("{remaining} trailing bytes after encoded aggregations")]
    TrailingBytes { remaining: usize },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Tree(#[from] TreeError),
}

/// Encode `builder` and every nested level.
pub fn encode_builder(builder: &AggregationTreeBuilder) -> Result<Vec<u8>, CodecError> {
    let mut out = StreamOutput::new();
    write_level(&mut out, builder)?;
    debug!(bytes = out.len(), nodes = builder.count(), "encoded aggregations");

    Ok(out.into_bytes())
}

/// Decode a payload produced by [`encode_builder`].
pub fn decode_builder(
    bytes: &[u8],
    registry: &TypeRegistry,
    limits: &Limits,
) -> Result<AggregationTreeBuilder, CodecError> {
    if bytes.len() > limits.max_encoded_bytes {
        return Err(CodecError::TooLarge {
            len: bytes.len(),
            max: limits.max_encoded_bytes,
        });
    }

    let decoder = Decoder { registry, limits };
    let mut input = StreamInput::new(bytes);
    let builder = decoder.read_level(&mut input, 1)?;

    if input.remaining() > 0 {
        return Err(CodecError::TrailingBytes {
            remaining: input.remaining(),
        });
    }
    debug!(bytes = bytes.len(), nodes = builder.count(), "decoded aggregations");

    Ok(builder)
}

fn write_level(
    out: &mut StreamOutput,
    builder: &AggregationTreeBuilder,
) -> Result<(), CodecError> {
    out.write_len(builder.aggregations().len())?;
    for node in builder.aggregations() {
        out.write_string(node.type_name())?;
        out.write_string(node.name())?;
        write_params(out, node.params())?;
        write_optional_params(out, node.metadata())?;
        write_level(out, node.sub_aggregations())?;
    }

    out.write_len(builder.pipelines().len())?;
    for node in builder.pipelines() {
        out.write_string(node.type_name())?;
        out.write_string(node.name())?;
        out.write_len(node.bucket_paths().len())?;
        for path in node.bucket_paths() {
            out.write_string(path)?;
        }
        write_params(out, node.params())?;
        write_optional_params(out, node.metadata())?;
    }

    Ok(())
}

fn write_params(out: &mut StreamOutput, params: &Params) -> Result<(), CodecError> {
    // a map of JSON values always serializes
    let json = serde_json::to_string(params).map_err(|err| CodecError::InvalidJson {
        offset: out.len(),
        reason: err.to_string(),
    })?;

    out.write_string(&json)
}

fn write_optional_params(
    out: &mut StreamOutput,
    params: Option<&Params>,
) -> Result<(), CodecError> {
    out.write_bool(params.is_some());
    match params {
        Some(params) => write_params(out, params),
        None => Ok(()),
    }
}

///
/// Decoder
///

struct Decoder<'a> {
    registry: &'a TypeRegistry,
    limits: &'a Limits,
}

impl Decoder<'_> {
    fn read_level(
        &self,
        input: &mut StreamInput<'_>,
        depth: usize,
    ) -> Result<AggregationTreeBuilder, CodecError> {
        let mut builder = AggregationTreeBuilder::new();

        let aggregations = input.read_len()?;
        self.check_depth(aggregations, depth)?;

        for _ in 0..aggregations {
            let type_name = input.read_string()?;
            let name = input.read_string()?;
            let params = read_params(input)?;
            let metadata = read_optional_params(input)?;
            let sub_aggregations = self.read_level(input, depth + 1)?;

            let kind = self.registry.aggregation_kind(type_name, params)?;
            let mut node =
                AggregationNode::new(name, kind)?.with_sub_aggregations(sub_aggregations);
            if let Some(metadata) = metadata {
                node = node.with_metadata(metadata);
            }
            builder.add_aggregation(node)?;
        }

        let pipelines = input.read_len()?;
        self.check_depth(pipelines, depth)?;
        for _ in 0..pipelines {
            let type_name = input.read_string()?;
            let name = input.read_string()?;
            let path_count = input.read_len()?;
            let mut bucket_paths = Vec::with_capacity(path_count);
            for _ in 0..path_count {
                bucket_paths.push(input.read_string()?);
            }
            let params = read_params(input)?;
            let metadata = read_optional_params(input)?;

            let kind = self.registry.pipeline_kind(type_name, params)?;
            let mut node = PipelineNode::new(name, kind, bucket_paths)?;
            if let Some(metadata) = metadata {
                node = node.with_metadata(metadata);
            }
            builder.add_pipeline(node);
        }

        Ok(builder)
    }

    // Only levels holding nodes count toward the depth limit, matching the
    // request parser.
    const fn check_depth(&self, nodes: usize, depth: usize) -> Result<(), CodecError> {
        if nodes > 0 && depth > self.limits.max_depth {
            return Err(CodecError::TooDeep {
                max_depth: self.limits.max_depth,
            });
        }

        Ok(())
    }
}

fn read_params(input: &mut StreamInput<'_>) -> Result<Params, CodecError> {
    let offset = input.offset();
    let json = input.read_string()?;

    serde_json::from_str(json).map_err(|err| CodecError::InvalidJson {
        offset,
        reason: err.to_string(),
    })
}

fn read_optional_params(input: &mut StreamInput<'_>) -> Result<Option<Params>, CodecError> {
    if input.read_bool()? {
        read_params(input).map(Some)
    } else {
        Ok(None)
    }
}
