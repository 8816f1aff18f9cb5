//! Relationship view model: the neighborhood of one focused member.

use std::sync::Arc;

use crate::cache::TreeCache;
use crate::client::GraphStore;
use crate::errors::TreeError;
use crate::models::{DeleteOutcome, DirectRelations, TreeContext};

/// Builds and caches [`DirectRelations`] for focused members.
#[derive(Clone)]
pub struct RelationshipView {
    graph: Arc<dyn GraphStore>,
    cache: Arc<TreeCache>,
}

impl RelationshipView {
    pub fn new(graph: Arc<dyn GraphStore>, cache: Arc<TreeCache>) -> Self {
        Self { graph, cache }
    }

    /// Parents, children and spouses of `member_id`. Fails with `NotFound` if
    /// the member is not in the tree.
    pub async fn direct_relations(
        &self,
        ctx: &TreeContext,
        member_id: &str,
    ) -> Result<DirectRelations, TreeError> {
        self.cache
            .direct_relations(&ctx.tree_id, member_id, || async {
                let raw = self.graph.direct_relations(ctx, member_id).await?;
                Ok::<_, TreeError>(normalize(raw))
            })
            .await
    }
}

/// Spouses ordered by marriage date (stable for ties); at most two parents.
pub fn normalize(mut relations: DirectRelations) -> DirectRelations {
    if relations.parents.len() > 2 {
        tracing::warn!(
            "Member {} has {} parent edges, keeping the first two",
            relations.member.id,
            relations.parents.len()
        );
        relations.parents.truncate(2);
    }
    relations.spouses.sort_by_key(|s| s.married);
    relations
}

/// Where the view should land after a member is deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Focus {
    /// A surviving relative of the deleted member.
    Member(String),
    /// No relative survives; show the tree's first member.
    TreeDefault,
    /// The tree itself is gone.
    Empty,
}

/// Pick the next focus from the deleted member's relations, captured before
/// the delete: a parent, else a child, else a spouse.
pub fn refocus_after_delete(relations: &DirectRelations, outcome: DeleteOutcome) -> Focus {
    if outcome == DeleteOutcome::TreeDeleted {
        return Focus::Empty;
    }

    relations
        .parents
        .first()
        .or_else(|| relations.children.first())
        .or_else(|| relations.spouses.first().map(|s| &s.member))
        .map(|m| Focus::Member(m.id.clone()))
        .unwrap_or(Focus::TreeDefault)
}
