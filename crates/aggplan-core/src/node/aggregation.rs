use crate::{
    node::{Metadata, Params, validate_name},
    registry::AggregationTraits,
    tree::{AggregationTreeBuilder, TreeError},
};

///
/// AggregationKind
///
/// Resolved type of an aggregation node: the registry tag, the raw params
/// and the traits the registry constructor derived from them.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AggregationKind {
    type_name: String,
    params: Params,
    traits: AggregationTraits,
}

impl AggregationKind {
    #[must_use]
    pub fn new(type_name: impl Into<String>, params: Params, traits: AggregationTraits) -> Self {
        Self {
            type_name: type_name.into(),
            params,
            traits,
        }
    }

    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    #[must_use]
    pub const fn params(&self) -> &Params {
        &self.params
    }

    #[must_use]
    pub const fn traits(&self) -> AggregationTraits {
        self.traits
    }
}

///
/// AggregationNode
///
/// One named aggregation request and the sub-aggregation tree it owns.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AggregationNode {
    name: String,
    kind: AggregationKind,
    metadata: Option<Metadata>,
    pub(crate) sub_aggregations: AggregationTreeBuilder,
}

impl AggregationNode {
    /// Create a leaf aggregation node; the name is validated here.
    pub fn new(name: impl Into<String>, kind: AggregationKind) -> Result<Self, TreeError> {
        let name = name.into();
        validate_name(&name)?;

        Ok(Self {
            name,
            kind,
            metadata: None,
            sub_aggregations: AggregationTreeBuilder::new(),
        })
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    #[must_use]
    pub fn with_sub_aggregations(mut self, sub_aggregations: AggregationTreeBuilder) -> Self {
        self.sub_aggregations = sub_aggregations;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn kind(&self) -> &AggregationKind {
        &self.kind
    }

    #[must_use]
    pub fn type_name(&self) -> &str {
        self.kind.type_name()
    }

    #[must_use]
    pub const fn params(&self) -> &Params {
        self.kind.params()
    }

    #[must_use]
    pub const fn traits(&self) -> AggregationTraits {
        self.kind.traits()
    }

    #[must_use]
    pub const fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    #[must_use]
    pub const fn sub_aggregations(&self) -> &AggregationTreeBuilder {
        &self.sub_aggregations
    }
}
