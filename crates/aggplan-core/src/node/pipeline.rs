use crate::{
    node::{Metadata, Params, validate_name},
    tree::TreeError,
    validate::PipelineRules,
};

///
/// PipelineKind
///
/// Resolved type of a pipeline node and the validation rules the registry
/// constructor attached to it.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PipelineKind {
    type_name: String,
    params: Params,
    rules: PipelineRules,
}

impl PipelineKind {
    #[must_use]
    pub fn new(type_name: impl Into<String>, params: Params, rules: PipelineRules) -> Self {
        Self {
            type_name: type_name.into(),
            params,
            rules,
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
    pub const fn rules(&self) -> PipelineRules {
        self.rules
    }
}

///
/// PipelineNode
///
/// A pipeline aggregation: consumes the output of other aggregations
/// located by its bucket paths.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PipelineNode {
    name: String,
    kind: PipelineKind,
    bucket_paths: Vec<String>,
    metadata: Option<Metadata>,
}

impl PipelineNode {
    /// Create a pipeline node; the name is validated here, bucket paths are
    /// only parsed when the tree is ordered or validated.
    pub fn new<I, S>(
        name: impl Into<String>,
        kind: PipelineKind,
        bucket_paths: I,
    ) -> Result<Self, TreeError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        validate_name(&name)?;

        Ok(Self {
            name,
            kind,
            bucket_paths: bucket_paths.into_iter().map(Into::into).collect(),
            metadata: None,
        })
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn kind(&self) -> &PipelineKind {
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
    pub const fn rules(&self) -> PipelineRules {
        self.kind.rules()
    }

    #[must_use]
    pub fn bucket_paths(&self) -> &[String] {
        &self.bucket_paths
    }

    #[must_use]
    pub const fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    /// Realize this node as an immutable pipeline aggregator.
    #[must_use]
    pub fn create(&self) -> PipelineAggregator {
        PipelineAggregator {
            name: self.name.clone(),
            type_name: self.kind.type_name.clone(),
            bucket_paths: self.bucket_paths.clone(),
            params: self.kind.params.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

///
/// PipelineAggregator
///
/// Reduction-time form of a pipeline node, held by a `PipelineTree` in
/// dependency order.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PipelineAggregator {
    name: String,
    type_name: String,
    bucket_paths: Vec<String>,
    params: Params,
    metadata: Option<Metadata>,
}

impl PipelineAggregator {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    #[must_use]
    pub fn bucket_paths(&self) -> &[String] {
        &self.bucket_paths
    }

    #[must_use]
    pub const fn params(&self) -> &Params {
        &self.params
    }

    #[must_use]
    pub const fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }
}
