//! Type registry: the mapping from an aggregation or pipeline type tag to
//! the constructor that interprets its params.
//!
//! Registries are plain values. They are built by the caller (defaults,
//! configuration, tests) and passed explicitly to the parser and the
//! decoder; there is no process-wide registry.

mod defaults;
mod suggest;


use crate::{
    error::Error,
    node::{AggregationKind, AggregationNode, Params, PipelineKind, PipelineNode},
    validate::PipelineRules,
};
use derive_more::Display;
use std::{collections::BTreeMap, fmt, sync::Arc};
use thiserror::Error as ThisError;

pub(crate) use suggest::render_suggestions;

///
/// AggregationCtor
///
/// Interprets aggregation params and derives the node's traits.
/// Returns a human-readable reason when the params are unusable.
///

pub type AggregationCtor =
    Arc<dyn Fn(&Params) -> Result<AggregationTraits, String> + Send + Sync>;

///
/// PipelineCtor
///

pub type PipelineCtor = Arc<dyn Fn(&Params) -> Result<PipelineRules, String> + Send + Sync>;

///
/// RegistryError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum RegistryError {
    #[error("type [{type_name}] is already registered as {family}")]
    DuplicateType {
        type_name: String,
        family: TypeFamily,
    },

    #[error("invalid parameters for [{type_name}]: {message}")]
    InvalidParams { type_name: String, message: String },

    #[error("unknown aggregation type [{type_name}]{}", render_suggestions(.suggestions))]
    UnknownType {
        type_name: String,
        suggestions: Vec<String>,
    },

    #[error("[{type_name}] is registered as {found}, expected {expected}")]
    WrongFamily {
        type_name: String,
        expected: TypeFamily,
        found: TypeFamily,
    },
}

///
/// TypeFamily
///

#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum TypeFamily {
    #[display("aggregation")]
    Aggregation,

    #[display("pipeline aggregation")]
    Pipeline,
}

///
/// AggregationTraits
///
/// Structural facts about an aggregation type that the tree layer needs
/// without knowing the type itself.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct AggregationTraits {
    global: bool,
    sequential: bool,
    concurrent_search: bool,
    visits_all_docs: bool,
}

impl AggregationTraits {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            global: false,
            sequential: false,
            concurrent_search: true,
            visits_all_docs: false,
        }
    }

    /// Global aggregations ignore the query and always visit every document.
    #[must_use]
    pub const fn global(mut self) -> Self {
        self.global = true;
        self.visits_all_docs = true;
        self
    }

    /// Buckets are produced in a stable, sequential key order
    /// (histogram-like); sequential pipelines require such a parent.
    #[must_use]
    pub const fn sequential(mut self) -> Self {
        self.sequential = true;
        self
    }

    #[must_use]
    pub const fn without_concurrent_search(mut self) -> Self {
        self.concurrent_search = false;
        self
    }

    #[must_use]
    pub const fn visiting_all_docs(mut self, visits_all_docs: bool) -> Self {
        self.visits_all_docs = self.visits_all_docs || visits_all_docs;
        self
    }

    #[must_use]
    pub const fn is_global(self) -> bool {
        self.global
    }

    #[must_use]
    pub const fn is_sequential(self) -> bool {
        self.sequential
    }

    #[must_use]
    pub const fn supports_concurrent_search(self) -> bool {
        self.concurrent_search
    }

    #[must_use]
    pub const fn visits_all_docs(self) -> bool {
        self.visits_all_docs
    }
}

impl Default for AggregationTraits {
    fn default() -> Self {
        Self::new()
    }
}

///
/// TypeRegistry
///

#[derive(Clone, Default)]
pub struct TypeRegistry {
    aggregations: BTreeMap<String, AggregationCtor>,
    pipelines: BTreeMap<String, PipelineCtor>,
}

impl TypeRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in aggregation and pipeline types.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        defaults::install(&mut registry);

        registry
    }

    pub fn register_aggregation<F>(
        &mut self,
        type_name: impl Into<String>,
        ctor: F,
    ) -> Result<&mut Self, RegistryError>
    where
        F: Fn(&Params) -> Result<AggregationTraits, String> + Send + Sync + 'static,
    {
        let type_name = type_name.into();
        self.ensure_unregistered(&type_name)?;
        self.aggregations.insert(type_name, Arc::new(ctor));

        Ok(self)
    }

    pub fn register_pipeline<F>(
        &mut self,
        type_name: impl Into<String>,
        ctor: F,
    ) -> Result<&mut Self, RegistryError>
    where
        F: Fn(&Params) -> Result<PipelineRules, String> + Send + Sync + 'static,
    {
        let type_name = type_name.into();
        self.ensure_unregistered(&type_name)?;
        self.pipelines.insert(type_name, Arc::new(ctor));

        Ok(self)
    }

    #[must_use]
    pub fn family(&self, type_name: &str) -> Option<TypeFamily> {
        if self.aggregations.contains_key(type_name) {
            Some(TypeFamily::Aggregation)
        } else if self.pipelines.contains_key(type_name) {
            Some(TypeFamily::Pipeline)
        } else {
            None
        }
    }

    /// All registered type tags, aggregations first, each family sorted.
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.aggregations
            .keys()
            .chain(self.pipelines.keys())
            .map(String::as_str)
    }

    /// Resolve an aggregation tag and run its constructor over `params`.
    pub fn aggregation_kind(
        &self,
        type_name: &str,
        params: Params,
    ) -> Result<AggregationKind, RegistryError> {
        let ctor = self
            .aggregations
            .get(type_name)
            .ok_or_else(|| self.lookup_error(type_name, TypeFamily::Aggregation))?;
        let traits = ctor(&params).map_err(|message| RegistryError::InvalidParams {
            type_name: type_name.to_string(),
            message,
        })?;

        Ok(AggregationKind::new(type_name, params, traits))
    }

    /// Resolve a pipeline tag and run its constructor over `params`.
    pub fn pipeline_kind(
        &self,
        type_name: &str,
        params: Params,
    ) -> Result<PipelineKind, RegistryError> {
        let ctor = self
            .pipelines
            .get(type_name)
            .ok_or_else(|| self.lookup_error(type_name, TypeFamily::Pipeline))?;
        let rules = ctor(&params).map_err(|message| RegistryError::InvalidParams {
            type_name: type_name.to_string(),
            message,
        })?;

        Ok(PipelineKind::new(type_name, params, rules))
    }

    /// Construct a leaf aggregation node in one step.
    pub fn aggregation(
        &self,
        name: impl Into<String>,
        type_name: &str,
        params: Params,
    ) -> Result<AggregationNode, Error> {
        let kind = self.aggregation_kind(type_name, params)?;

        Ok(AggregationNode::new(name, kind)?)
    }

    /// Construct a pipeline node in one step.
    pub fn pipeline<I, S>(
        &self,
        name: impl Into<String>,
        type_name: &str,
        bucket_paths: I,
        params: Params,
    ) -> Result<PipelineNode, Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let kind = self.pipeline_kind(type_name, params)?;

        Ok(PipelineNode::new(name, kind, bucket_paths)?)
    }

    /// Build the error for a tag that is not registered at all.
    #[must_use]
    pub fn unknown_type(&self, type_name: &str) -> RegistryError {
        RegistryError::UnknownType {
            type_name: type_name.to_string(),
            suggestions: suggest::suggest(type_name, self.type_names()),
        }
    }

    fn lookup_error(&self, type_name: &str, expected: TypeFamily) -> RegistryError {
        match self.family(type_name) {
            Some(found) => RegistryError::WrongFamily {
                type_name: type_name.to_string(),
                expected,
                found,
            },
            None => self.unknown_type(type_name),
        }
    }

    fn ensure_unregistered(&self, type_name: &str) -> Result<(), RegistryError> {
        match self.family(type_name) {
            Some(family) => Err(RegistryError::DuplicateType {
                type_name: type_name.to_string(),
                family,
            }),
            None => Ok(()),
        }
    }

    // Defaults are installed into a fresh registry, so no duplicate check.
    fn insert_aggregation<F>(&mut self, type_name: &str, ctor: F)
    where
        F: Fn(&Params) -> Result<AggregationTraits, String> + Send + Sync + 'static,
    {
        self.aggregations.insert(type_name.to_string(), Arc::new(ctor));
    }

    fn insert_pipeline(
        &mut self,
        type_name: &str,
        rules: PipelineRules,
        required: &'static [&'static str],
    ) {
        self.pipelines.insert(
            type_name.to_string(),
            Arc::new(move |params: &Params| {
                defaults::require_all(params, required)?;
                Ok(rules)
            }),
        );
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("aggregations", &self.aggregations.keys().collect::<Vec<_>>())
            .field("pipelines", &self.pipelines.keys().collect::<Vec<_>>())
            .finish()
    }
}
