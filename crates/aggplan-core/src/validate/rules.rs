use crate::{node::PipelineNode, validate::ValidationContext};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error as ThisError;

///
/// RuleError
///
/// Type-specific semantic violations reported by a pipeline against its
/// validation context.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum RuleError {
    #[error("[buckets_path] of {type_name} aggregation [{pipeline}] must contain {expected} path(s), found {found}")]
    BucketPathCount {
        pipeline: String,
        type_name: String,
        expected: PathArity,
        found: usize,
    },

    #[error("{type_name} aggregation [{pipeline}] must be declared inside of another aggregation")]
    RootPlacement {
        pipeline: String,
        type_name: String,
    },

    #[error("{type_name} aggregation [{pipeline}] must have a histogram, date_histogram or auto_date_histogram as parent{}", render_parent(.parent))]
    SequentialParent {
        pipeline: String,
        type_name: String,
        parent: Option<String>,
    },
}

fn render_parent(parent: &Option<String>) -> String {
    match parent {
        Some(parent) => format!(" but [{parent}] is not"),
        None => " but doesn't have a parent".to_string(),
    }
}

///
/// PathArity
///
/// How many bucket paths a pipeline type accepts.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PathArity {
    Any,
    AtLeast(usize),
    Exactly(usize),
}

impl PathArity {
    #[must_use]
    pub const fn accepts(self, count: usize) -> bool {
        match self {
            Self::Any => true,
            Self::AtLeast(min) => count >= min,
            Self::Exactly(expected) => count == expected,
        }
    }
}

impl fmt::Display for PathArity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("any number of"),
            Self::AtLeast(min) => write!(f, "at least {min}"),
            Self::Exactly(expected) => write!(f, "exactly {expected}"),
        }
    }
}

///
/// Placement
///
/// Where in the tree a pipeline type may be declared.
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    #[default]
    Anywhere,
    InsideTree,
    SequentialParent,
}

///
/// PipelineRules
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PipelineRules {
    pub paths: PathArity,
    pub placement: Placement,
}

impl PipelineRules {
    #[must_use]
    pub const fn new(paths: PathArity, placement: Placement) -> Self {
        Self { paths, placement }
    }

    /// No constraints; used by types that only need ordering.
    #[must_use]
    pub const fn unconstrained() -> Self {
        Self::new(PathArity::Any, Placement::Anywhere)
    }
}

impl Default for PipelineRules {
    fn default() -> Self {
        Self::unconstrained()
    }
}

/// Apply `pipeline`'s type rules against its position in the tree.
pub(crate) fn check_rules(
    pipeline: &PipelineNode,
    context: &ValidationContext<'_>,
) -> Vec<RuleError> {
    let rules = pipeline.rules();
    let mut errors = Vec::new();

    let found = pipeline.bucket_paths().len();
    if !rules.paths.accepts(found) {
        errors.push(RuleError::BucketPathCount {
            pipeline: pipeline.name().to_string(),
            type_name: pipeline.type_name().to_string(),
            expected: rules.paths,
            found,
        });
    }

    match (rules.placement, context.parent()) {
        (Placement::Anywhere, _) | (Placement::InsideTree, Some(_)) => {}
        (Placement::InsideTree, None) => errors.push(RuleError::RootPlacement {
            pipeline: pipeline.name().to_string(),
            type_name: pipeline.type_name().to_string(),
        }),
        (Placement::SequentialParent, parent) => {
            if !parent.is_some_and(|parent| parent.traits().is_sequential()) {
                errors.push(RuleError::SequentialParent {
                    pipeline: pipeline.name().to_string(),
                    type_name: pipeline.type_name().to_string(),
                    parent: parent.map(|parent| parent.name().to_string()),
                });
            }
        }
    }

    errors
}
