//! Whole-tree structural validation.
//!
//! Walks every level of a builder, orders its pipelines and applies each
//! pipeline's type rules against its position. Issues are accumulated with
//! the scope they were found at; nothing here aborts on the first problem.

mod rules;


use crate::{
    node::{AggregationNode, PipelineNode},
    order::{OrderError, resolve_pipeline_order},
};
use std::fmt::{self, Write};
use thiserror::Error as ThisError;
use tracing::debug;

// re-exports
pub use rules::{PathArity, Placement, PipelineRules, RuleError};
pub(crate) use rules::check_rules;

/// Separator used when rendering the scope of an issue.
pub const SCOPE_SEPARATOR: char = '>';

///
/// ValidationContext
///
/// Where the level being validated sits: the tree root, or below the
/// aggregation that owns it.
///

#[derive(Clone, Copy, Debug)]
pub enum ValidationContext<'a> {
    TreeRoot,
    InsideTree { parent: &'a AggregationNode },
}

impl<'a> ValidationContext<'a> {
    #[must_use]
    pub const fn parent(&self) -> Option<&'a AggregationNode> {
        match self {
            Self::TreeRoot => None,
            Self::InsideTree { parent } => Some(parent),
        }
    }

    #[must_use]
    pub const fn is_root(&self) -> bool {
        matches!(self, Self::TreeRoot)
    }
}

///
/// ValidationError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum ValidationError {
    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Rule(#[from] RuleError),
}

///
/// ValidationIssue
///
/// One problem and the tree position it was found at. An empty scope is
/// the root level.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ValidationIssue {
    scope: String,
    error: ValidationError,
}

impl ValidationIssue {
    #[must_use]
    pub fn new(scope: impl Into<String>, error: impl Into<ValidationError>) -> Self {
        Self {
            scope: scope.into(),
            error: error.into(),
        }
    }

    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    #[must_use]
    pub const fn error(&self) -> &ValidationError {
        &self.error
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scope.is_empty() {
            write!(f, "{}", self.error)
        } else {
            write!(f, "[{}] {}", self.scope, self.error)
        }
    }
}

///
/// ValidationErrors
///
/// Ordered accumulation of issues. Empty means valid.
///

#[derive(Clone, Debug, Default, Eq, PartialEq, ThisError)]
#[error("{}", render_issues(.issues))]
pub struct ValidationErrors {
    issues: Vec<ValidationIssue>,
}

impl ValidationErrors {
    #[must_use]
    pub const fn new() -> Self {
        Self { issues: Vec::new() }
    }

    pub fn add(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.issues.len()
    }

    #[must_use]
    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter()
    }

    /// `Ok` when nothing was recorded.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl IntoIterator for ValidationErrors {
    type Item = ValidationIssue;
    type IntoIter = std::vec::IntoIter<ValidationIssue>;

    fn into_iter(self) -> Self::IntoIter {
        self.issues.into_iter()
    }
}

fn render_issues(issues: &[ValidationIssue]) -> String {
    let mut out = String::from("Validation Failed: ");
    for (idx, issue) in issues.iter().enumerate() {
        let _ = write!(out, "{}: {issue};", idx + 1);
    }

    out
}

/// Validate one tree starting at its root level, appending to `errors`.
pub(crate) fn validate_tree(
    aggregations: &[AggregationNode],
    pipelines: &[PipelineNode],
    errors: ValidationErrors,
) -> ValidationErrors {
    let before = errors.len();
    let mut validator = Validator {
        scope: Vec::new(),
        errors,
    };
    validator.level(aggregations, pipelines, ValidationContext::TreeRoot);

    let Validator { errors, .. } = validator;
    debug!(
        issues = errors.len() - before,
        "validated aggregation tree"
    );

    errors
}

///
/// Validator
///
/// Walk state: the names of the aggregations above the current level and
/// the issues found so far.
///

struct Validator<'a> {
    scope: Vec<&'a str>,
    errors: ValidationErrors,
}

impl<'a> Validator<'a> {
    fn level(
        &mut self,
        aggregations: &'a [AggregationNode],
        pipelines: &'a [PipelineNode],
        context: ValidationContext<'a>,
    ) {
        match resolve_pipeline_order(aggregations, pipelines) {
            Ok(ordered) => {
                for pipeline in ordered {
                    for error in check_rules(pipeline, &context) {
                        self.record(error);
                    }
                }
            }
            Err(error) => self.record(error),
        }

        for aggregation in aggregations {
            let subs = aggregation.sub_aggregations();
            if subs.is_empty() {
                continue;
            }

            self.scope.push(aggregation.name());
            self.level(
                subs.aggregations(),
                subs.pipelines(),
                ValidationContext::InsideTree {
                    parent: aggregation,
                },
            );
            self.scope.pop();
        }
    }

    fn record(&mut self, error: impl Into<ValidationError>) {
        let mut scope = String::new();
        for (idx, name) in self.scope.iter().enumerate() {
            if idx > 0 {
                scope.push(SCOPE_SEPARATOR);
            }
            scope.push_str(name);
        }

        self.errors.add(ValidationIssue::new(scope, error));
    }
}
