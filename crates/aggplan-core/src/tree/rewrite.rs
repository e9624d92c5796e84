use crate::{
    DEFAULT_MAX_REWRITE_ROUNDS,
    node::{AggregationNode, PipelineNode},
    tree::{AggregationTreeBuilder, TreeError},
};
use std::borrow::Cow;
use thiserror::Error as ThisError;
use tracing::trace;

///
/// RewriteError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum RewriteError {
    #[error("rewrite of [{name}] failed: {reason}")]
    Failed { name: String, reason: String },

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(
        "too many rewrite rounds for [{name}] ({rounds}); the rewriter returns new nodes even when nothing changed"
    )]
    TooManyRounds { name: String, rounds: usize },
}

///
/// Rewriter
///
/// Caller-supplied node transformation. Returning `None` means "unchanged";
/// the builder then keeps the original node and, if nothing in the tree
/// changed, hands back the original builder itself.
///

pub trait Rewriter {
    fn rewrite_aggregation(
        &self,
        _node: &AggregationNode,
    ) -> Result<Option<AggregationNode>, RewriteError> {
        Ok(None)
    }

    fn rewrite_pipeline(&self, _node: &PipelineNode) -> Result<Option<PipelineNode>, RewriteError> {
        Ok(None)
    }

    /// Rounds one node may be rewritten before it is considered
    /// non-converging.
    fn max_rounds(&self) -> usize {
        DEFAULT_MAX_REWRITE_ROUNDS
    }
}

impl AggregationTreeBuilder {
    /// Rewrite every node of this level and every nested level.
    ///
    /// Returns `Cow::Borrowed(self)` when no node changed, so callers that
    /// repeat rewriting until stable can compare by identity.
    pub fn rewrite(&self, rewriter: &dyn Rewriter) -> Result<Cow<'_, Self>, RewriteError> {
        let mut changed = false;

        let mut aggregations = Vec::with_capacity(self.aggregations().len());
        for node in self.aggregations() {
            let rewritten = node.rewrite(rewriter)?;
            changed |= matches!(rewritten, Cow::Owned(_));
            aggregations.push(rewritten);
        }

        let mut pipelines = Vec::with_capacity(self.pipelines().len());
        for node in self.pipelines() {
            let rewritten =
                rewrite_until_stable(node, PipelineNode::name, rewriter.max_rounds(), |n| {
                    rewriter.rewrite_pipeline(n)
                })?;
            changed |= matches!(rewritten, Cow::Owned(_));
            pipelines.push(rewritten);
        }

        if !changed {
            return Ok(Cow::Borrowed(self));
        }

        let mut builder = Self::new();
        for node in aggregations {
            builder.add_aggregation(node.into_owned())?;
        }
        for node in pipelines {
            builder.add_pipeline(node.into_owned());
        }

        Ok(Cow::Owned(builder))
    }
}

impl AggregationNode {
    /// Rewrite this node until stable, then its sub-tree.
    pub fn rewrite(&self, rewriter: &dyn Rewriter) -> Result<Cow<'_, Self>, RewriteError> {
        let mut current = rewrite_until_stable(self, Self::name, rewriter.max_rounds(), |n| {
            rewriter.rewrite_aggregation(n)
        })?;

        let sub_aggregations = match current.sub_aggregations().rewrite(rewriter)? {
            Cow::Borrowed(_) => None,
            Cow::Owned(sub_aggregations) => Some(sub_aggregations),
        };
        if let Some(sub_aggregations) = sub_aggregations {
            current.to_mut().sub_aggregations = sub_aggregations;
        }

        Ok(current)
    }
}

// Apply `step` until it reports no change, bounded by `max_rounds`.
fn rewrite_until_stable<'a, T, F>(
    node: &'a T,
    name: fn(&T) -> &str,
    max_rounds: usize,
    step: F,
) -> Result<Cow<'a, T>, RewriteError>
where
    T: Clone,
    F: Fn(&T) -> Result<Option<T>, RewriteError>,
{
    let mut current = Cow::Borrowed(node);

    for round in 0..max_rounds {
        match step(&*current)? {
            Some(next) => {
                trace!(node = name(&next), round, "node rewritten");
                current = Cow::Owned(next);
            }
            None => return Ok(current),
        }
    }

    Err(RewriteError::TooManyRounds {
        name: name(&current).to_string(),
        rounds: max_rounds,
    })
}
