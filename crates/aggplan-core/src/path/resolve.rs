use crate::{
    node::{AggregationNode, PipelineNode},
    path::{BucketPath, PathError},
    tree::AggregationTreeBuilder,
};

///
/// Resolution
///
/// What a bucket path landed on.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Resolution<'a> {
    /// A reserved terminal (`_count` / `_key`).
    Terminal,

    /// The last matched aggregation.
    Aggregation(&'a AggregationNode),

    /// A pipeline; when matched by the first element, later elements are
    /// not inspected (they address that pipeline's own output).
    Pipeline(&'a PipelineNode),
}

/// Resolve `path` against one builder level.
///
/// The first element must name an aggregation or a pipeline registered in
/// `namespace`; the rest is resolved inside the matched aggregation by
/// [`resolve_within`].
pub fn resolve<'a>(
    path: &BucketPath,
    namespace: &'a AggregationTreeBuilder,
) -> Result<Resolution<'a>, PathError> {
    let head = resolve_head(
        path,
        |name| namespace.aggregation(name),
        |name| namespace.pipeline(name),
    )?;

    Ok(match head {
        Head::Resolved(resolution) => resolution,
        Head::Pipeline(pipeline) => Resolution::Pipeline(pipeline),
    })
}

///
/// Head
///
/// Outcome of first-element dispatch. `P` is however the caller
/// identifies a sibling pipeline.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Head<'a, P> {
    Resolved(Resolution<'a>),
    Pipeline(P),
}

/// First-element dispatch shared by [`resolve`] and the pipeline orderer.
///
/// A bare terminal resolves on its own. Otherwise an aggregation named by
/// the first element wins over a pipeline of the same name.
pub(crate) fn resolve_head<'a, P>(
    path: &BucketPath,
    aggregation: impl FnOnce(&str) -> Option<&'a AggregationNode>,
    pipeline: impl FnOnce(&str) -> Option<P>,
) -> Result<Head<'a, P>, PathError> {
    if path.is_bare_terminal() {
        return Ok(Head::Resolved(Resolution::Terminal));
    }

    let first = path.first().name();
    if let Some(aggregation) = aggregation(first) {
        return resolve_within(aggregation, path).map(Head::Resolved);
    }
    if let Some(pipeline) = pipeline(first) {
        return Ok(Head::Pipeline(pipeline));
    }

    Err(PathError::Unresolved {
        path: path.raw().to_string(),
        element: None,
    })
}

/// Resolve every element after the first inside `aggregation`'s sub-tree.
///
/// Each element must name a sub-aggregation of the previous match, except
/// the final element, which may instead be a terminal or the name of a
/// pipeline registered directly under the previous match.
pub fn resolve_within<'a>(
    aggregation: &'a AggregationNode,
    path: &BucketPath,
) -> Result<Resolution<'a>, PathError> {
    let elements = path.elements();
    let last = elements.len() - 1;
    let mut current = aggregation;

    for (idx, element) in elements.iter().enumerate().skip(1) {
        let is_last = idx == last;
        if is_last && element.is_terminal() {
            return Ok(Resolution::Terminal);
        }

        let subs = current.sub_aggregations();
        if let Some(sub) = subs.aggregation(element.name()) {
            current = sub;
            continue;
        }
        if is_last && let Some(pipeline) = subs.pipeline(element.name()) {
            return Ok(Resolution::Pipeline(pipeline));
        }

        return Err(PathError::Unresolved {
            path: path.raw().to_string(),
            element: Some(element.name().to_string()),
        });
    }

    Ok(Resolution::Aggregation(current))
}
