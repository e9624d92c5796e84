//! JSON request parser: turns the `aggs` object of a search request into an
//! aggregation tree builder.
//!
//! Each definition is an object holding at most one type tag, an optional
//! `meta` object and an optional `aggs` / `aggregations` object of nested
//! definitions. Type tags are resolved through an explicit registry.
//!
//! Definitions are added in the order they are written. Text input is read
//! entry by entry, so a name repeated among siblings reaches the builder
//! twice and is rejected there.

mod document;

use document::{Document, json_kind};

use crate::{
    DEFAULT_MAX_DEPTH,
    node::{AggregationNode, Metadata, Params, PipelineNode, validate_name},
    registry::{RegistryError, TypeFamily, TypeRegistry},
    tree::{AggregationTreeBuilder, TreeError},
};
use serde_json::{Map, Value};
use thiserror::Error as ThisError;
use tracing::{debug, trace};

/// Key of the metadata object inside a definition.
pub const META_FIELD: &str = "meta";

/// Keys accepted for the nested definitions object.
pub const SUB_AGGREGATIONS_FIELDS: [&str; 2] = ["aggs", "aggregations"];

/// Key holding the bucket paths of a pipeline definition.
pub const BUCKETS_PATH_FIELD: &str = "buckets_path";

///
/// ParseError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum ParseError {
    #[error("Expected [object] under [{field}], but got a [{found}] in [{aggregation}]")]
    ExpectedObject {
        aggregation: String,
        field: String,
        found: &'static str,
    },

    #[error("Expected [object] for aggregations, but got a [{found}]")]
    ExpectedAggregations { found: &'static str },

    #[error("Expected [object] for the search body, but got a [{found}]")]
    ExpectedBody { found: &'static str },

    #[error("Found two aggregation definitions in the search body: [{first}] and [{second}]")]
    TwoBodyAggregations { first: String, second: String },

    #[error("request is not valid JSON: {reason}")]
    InvalidJson { reason: String },

    #[error("Found two aggregation type definitions in [{aggregation}]: [{first}] and [{second}]")]
    TwoTypeDefinitions {
        aggregation: String,
        first: String,
        second: String,
    },

    #[error("Found two sub aggregation definitions under [{aggregation}]")]
    TwoSubAggregations { aggregation: String },

    #[error("Missing definition for aggregation [{aggregation}]")]
    MissingDefinition { aggregation: String },

    #[error("Aggregation [{aggregation}] cannot define sub-aggregations")]
    PipelineSubAggregations { aggregation: String },

    #[error("[buckets_path] of [{aggregation}] must be a string, an array of strings or an object of strings, found a [{found}]")]
    InvalidBucketsPath {
        aggregation: String,
        found: &'static str,
    },

    #[error("aggregations are nested deeper than the limit of {max_depth}")]
    TooDeep { max_depth: usize },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Tree(#[from] TreeError),
}

/// Parse with the default nesting limit.
pub fn parse_aggregations(
    value: &Value,
    registry: &TypeRegistry,
) -> Result<Option<AggregationTreeBuilder>, ParseError> {
    RequestParser::new(registry).parse(value)
}

///
/// RequestParser
///

#[derive(Clone, Copy, Debug)]
pub struct RequestParser<'a> {
    registry: &'a TypeRegistry,
    max_depth: usize,
}

impl<'a> RequestParser<'a> {
    #[must_use]
    pub const fn new(registry: &'a TypeRegistry) -> Self {
        Self {
            registry,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    #[must_use]
    pub const fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Parse one `aggs` object. `None` when it holds no definitions.
    ///
    /// A `Value` has already merged repeated keys; use [`Self::parse_str`]
    /// to have them reported.
    pub fn parse(&self, value: &Value) -> Result<Option<AggregationTreeBuilder>, ParseError> {
        self.parse_document(Document::from(value))
    }

    /// Parse one `aggs` object from JSON text.
    pub fn parse_str(&self, text: &str) -> Result<Option<AggregationTreeBuilder>, ParseError> {
        self.parse_document(read_document(text)?)
    }

    /// Parse the aggregations of a whole search body from JSON text.
    ///
    /// The body may name its aggregations `aggs` or `aggregations`, not both.
    /// A body with neither yields `None`.
    pub fn parse_body_str(
        &self,
        text: &str,
    ) -> Result<Option<AggregationTreeBuilder>, ParseError> {
        let fields = match read_document(text)? {
            Document::Object(fields) => fields,
            other => {
                return Err(ParseError::ExpectedBody {
                    found: other.kind(),
                });
            }
        };

        let mut aggregations: Option<(String, Document)> = None;
        for (field, value) in fields {
            if !SUB_AGGREGATIONS_FIELDS.contains(&field.as_str()) {
                continue;
            }
            if let Some((first, _)) = aggregations {
                return Err(ParseError::TwoBodyAggregations {
                    first,
                    second: field,
                });
            }
            aggregations = Some((field, value));
        }

        match aggregations {
            Some((_, value)) => self.parse_document(value),
            None => Ok(None),
        }
    }

    fn parse_document(
        &self,
        document: Document,
    ) -> Result<Option<AggregationTreeBuilder>, ParseError> {
        let builder = self.parse_level(document, 1)?;
        debug!(
            nodes = builder.as_ref().map_or(0, AggregationTreeBuilder::count),
            "parsed aggregations"
        );

        Ok(builder)
    }

    fn parse_level(
        &self,
        document: Document,
        depth: usize,
    ) -> Result<Option<AggregationTreeBuilder>, ParseError> {
        let definitions = match document {
            Document::Object(definitions) => definitions,
            other => {
                return Err(ParseError::ExpectedAggregations {
                    found: other.kind(),
                });
            }
        };
        if !definitions.is_empty() && depth > self.max_depth {
            return Err(ParseError::TooDeep {
                max_depth: self.max_depth,
            });
        }

        let mut builder = AggregationTreeBuilder::new();
        for (name, definition) in definitions {
            validate_name(&name)?;
            self.parse_definition(&mut builder, &name, definition, depth)?;
        }

        Ok((!builder.is_empty()).then_some(builder))
    }

    fn parse_definition(
        &self,
        builder: &mut AggregationTreeBuilder,
        name: &str,
        definition: Document,
        depth: usize,
    ) -> Result<(), ParseError> {
        let fields = match definition {
            Document::Object(fields) => fields,
            other => {
                return Err(ParseError::ExpectedObject {
                    aggregation: name.to_string(),
                    field: name.to_string(),
                    found: other.kind(),
                });
            }
        };

        let mut metadata = None;
        let mut sub_aggregations = None;
        let mut typed: Option<(String, Vec<(String, Document)>)> = None;

        for (field, value) in fields {
            let body = match value {
                Document::Object(body) => body,
                other => {
                    return Err(ParseError::ExpectedObject {
                        aggregation: name.to_string(),
                        field,
                        found: other.kind(),
                    });
                }
            };

            if field == META_FIELD {
                metadata = Some(Metadata::from_map(Document::into_map(body)));
            } else if SUB_AGGREGATIONS_FIELDS.contains(&field.as_str()) {
                if sub_aggregations.is_some() {
                    return Err(ParseError::TwoSubAggregations {
                        aggregation: name.to_string(),
                    });
                }
                sub_aggregations = Some(Document::Object(body));
            } else {
                if let Some((first, _)) = typed {
                    return Err(ParseError::TwoTypeDefinitions {
                        aggregation: name.to_string(),
                        first,
                        second: field,
                    });
                }
                typed = Some((field, body));
            }
        }

        let Some((type_name, body)) = typed else {
            return Err(ParseError::MissingDefinition {
                aggregation: name.to_string(),
            });
        };
        let type_name = type_name.as_str();
        trace!(aggregation = name, type_name, depth, "parsing definition");

        match self.registry.family(type_name) {
            Some(TypeFamily::Aggregation) => {
                let kind = self
                    .registry
                    .aggregation_kind(type_name, Params::from_map(Document::into_map(body)))?;
                let mut node = AggregationNode::new(name, kind)?;
                if let Some(metadata) = metadata {
                    node = node.with_metadata(metadata);
                }
                if let Some(document) = sub_aggregations
                    && let Some(sub_aggregations) = self.parse_level(document, depth + 1)?
                {
                    node = node.with_sub_aggregations(sub_aggregations);
                }
                builder.add_aggregation(node)?;
            }
            Some(TypeFamily::Pipeline) => {
                if sub_aggregations.is_some() {
                    return Err(ParseError::PipelineSubAggregations {
                        aggregation: name.to_string(),
                    });
                }

                let (bucket_paths, params) = split_buckets_path(name, body)?;
                let kind = self.registry.pipeline_kind(type_name, params)?;
                let mut node = PipelineNode::new(name, kind, bucket_paths)?;
                if let Some(metadata) = metadata {
                    node = node.with_metadata(metadata);
                }
                builder.add_pipeline(node);
            }
            None => return Err(self.registry.unknown_type(type_name).into()),
        }

        Ok(())
    }
}

fn read_document(text: &str) -> Result<Document, ParseError> {
    Document::parse(text).map_err(|err| ParseError::InvalidJson {
        reason: err.to_string(),
    })
}

// Take `buckets_path` out of a pipeline body; the rest become its params in
// the order they were written.
fn split_buckets_path(
    aggregation: &str,
    body: Vec<(String, Document)>,
) -> Result<(Vec<String>, Params), ParseError> {
    let invalid = |found: &Value| ParseError::InvalidBucketsPath {
        aggregation: aggregation.to_string(),
        found: json_kind(found),
    };
    let as_path = |value: Value| match value {
        Value::String(path) => Ok(path),
        other => Err(invalid(&other)),
    };

    let mut buckets_path = None;
    let mut params = Map::new();
    for (key, value) in body {
        if key == BUCKETS_PATH_FIELD {
            buckets_path = Some(value.into_value());
        } else {
            params.insert(key, value.into_value());
        }
    }

    let paths = match buckets_path {
        None => Vec::new(),
        Some(Value::String(path)) => vec![path],
        Some(Value::Array(items)) => items.into_iter().map(as_path).collect::<Result<_, _>>()?,
        Some(Value::Object(vars)) => vars
            .into_iter()
            .map(|(_, value)| as_path(value))
            .collect::<Result<_, _>>()?,
        Some(other) => return Err(invalid(&other)),
    };

    Ok((paths, Params::from_map(params)))
}
