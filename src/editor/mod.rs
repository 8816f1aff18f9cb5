//! The editing facade a tree view talks to.
//!
//! Reads go through the cache; every write goes through the lock coordinator.

use std::sync::Arc;

use crate::cache::{MutationKind, TreeCache};
use crate::client::{GraphStore, LockClient};
use crate::coordinator::{LockCoordinator, LockState};
use crate::errors::TreeError;
use crate::models::{
    CreateChildInput, CreateMemberInput, CreateParentInput, CreateSpouseInput, DeleteOutcome,
    DirectRelations, LockStatus, MediaFile, Member, PhotosUpload, PicUpload, Role, TreeContext,
    UpdateMemberInput, UpdateSpouseRelationInput,
};
use crate::relations::{refocus_after_delete, Focus, RelationshipView};

/// Result of deleting a member: what the store did and where the view goes next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteResult {
    pub outcome: DeleteOutcome,
    pub focus: Focus,
}

/// One collaborator's editing session on one tree.
pub struct TreeEditor {
    ctx: TreeContext,
    lock: Arc<dyn LockClient>,
    graph: Arc<dyn GraphStore>,
    cache: Arc<TreeCache>,
    coordinator: LockCoordinator,
    view: RelationshipView,
}

impl TreeEditor {
    /// Open an editing session. Viewers are refused before any lock traffic.
    pub fn new(
        ctx: TreeContext,
        role: Role,
        lock: Arc<dyn LockClient>,
        graph: Arc<dyn GraphStore>,
        cache: Arc<TreeCache>,
    ) -> Result<Self, TreeError> {
        if !role.can_edit() {
            tracing::debug!("{} is a {} on tree {}", ctx.user_id, role, ctx.tree_id);
            return Err(TreeError::ReadOnly(role));
        }

        Ok(Self {
            coordinator: LockCoordinator::new(lock.clone(), cache.clone()),
            view: RelationshipView::new(graph.clone(), cache.clone()),
            ctx,
            lock,
            graph,
            cache,
        })
    }

    pub fn context(&self) -> &TreeContext {
        &self.ctx
    }

    // ==================== Reads ====================

    pub async fn member(&self, member_id: &str) -> Result<Member, TreeError> {
        self.cache
            .member(&self.ctx.tree_id, member_id, || {
                self.graph.get_member(&self.ctx, member_id)
            })
            .await
    }

    pub async fn members(&self) -> Result<Vec<Member>, TreeError> {
        self.cache
            .member_list(&self.ctx.tree_id, || self.graph.list_members(&self.ctx))
            .await
    }

    pub async fn direct_relations(&self, member_id: &str) -> Result<DirectRelations, TreeError> {
        self.view.direct_relations(&self.ctx, member_id).await
    }

    /// Lease status as last cached; refreshed after any successful mutation.
    pub async fn lock_status(&self) -> Result<LockStatus, TreeError> {
        self.cache
            .lock_status(&self.ctx.tree_id, || self.lock.status(&self.ctx))
            .await
    }

    /// Lease state fetched fresh from the lock service.
    pub async fn lock_state(&self) -> Result<LockState, TreeError> {
        self.coordinator.observe(&self.ctx).await
    }

    // ==================== Lock ====================

    pub async fn release_lock(&self) -> Result<(), TreeError> {
        let result = self.lock.release(&self.ctx).await;
        match &result {
            Err(e) if e.is_lock_error() => tracing::info!(
                "{} cannot release the lock on tree {}: {}",
                self.ctx.user_id,
                self.ctx.tree_id,
                e
            ),
            _ => {}
        }
        self.cache.invalidate_lock_status(&self.ctx.tree_id).await;
        result
    }

    pub async fn force_release_lock(&self) -> Result<(), TreeError> {
        tracing::warn!(
            "{} is force-releasing the lock on tree {}",
            self.ctx.user_id,
            self.ctx.tree_id
        );
        let result = self.lock.force_release(&self.ctx).await;
        self.cache.invalidate_lock_status(&self.ctx.tree_id).await;
        result
    }

    // ==================== Guarded mutations ====================

    pub async fn create_member(&self, input: &CreateMemberInput) -> Result<Member, TreeError> {
        self.coordinator
            .guard(&self.ctx, MutationKind::CreateMember, || {
                self.graph.create_member(&self.ctx, input)
            })
            .await
    }

    pub async fn create_child(&self, input: &CreateChildInput) -> Result<Member, TreeError> {
        self.coordinator
            .guard(&self.ctx, MutationKind::CreateChild, || {
                self.graph.create_child(&self.ctx, input)
            })
            .await
    }

    pub async fn create_parent(&self, input: &CreateParentInput) -> Result<Member, TreeError> {
        self.coordinator
            .guard(&self.ctx, MutationKind::CreateParent, || {
                self.graph.create_parent(&self.ctx, input)
            })
            .await
    }

    pub async fn create_spouse(&self, input: &CreateSpouseInput) -> Result<Member, TreeError> {
        self.coordinator
            .guard(&self.ctx, MutationKind::CreateSpouse, || {
                self.graph.create_spouse(&self.ctx, input)
            })
            .await
    }

    pub async fn update_member(&self, input: &UpdateMemberInput) -> Result<Member, TreeError> {
        let kind = MutationKind::UpdateMember {
            member_id: input.id.clone(),
        };
        self.coordinator
            .guard(&self.ctx, kind, || self.graph.update_member(&self.ctx, input))
            .await
    }

    /// Delete a member and pick the next focus from its surviving relatives.
    pub async fn delete_member(&self, member_id: &str) -> Result<DeleteResult, TreeError> {
        let relations = self.direct_relations(member_id).await?;
        let kind = MutationKind::DeleteMember {
            member_id: member_id.to_string(),
        };

        let outcome = self
            .coordinator
            .guard(&self.ctx, kind, || {
                self.graph.delete_member(&self.ctx, member_id)
            })
            .await?;

        if outcome == DeleteOutcome::TreeDeleted {
            tracing::info!(
                "Deleting {} removed tree {}",
                member_id,
                self.ctx.tree_id
            );
        }

        Ok(DeleteResult {
            outcome,
            focus: refocus_after_delete(&relations, outcome),
        })
    }

    pub async fn update_spouse_relation(
        &self,
        input: &UpdateSpouseRelationInput,
    ) -> Result<(), TreeError> {
        self.coordinator
            .guard(&self.ctx, MutationKind::UpdateSpouseRelation, || {
                self.graph.update_spouse_relation(&self.ctx, input)
            })
            .await
    }

    pub async fn upload_pic(&self, member_id: &str, file: MediaFile) -> Result<PicUpload, TreeError> {
        let kind = MutationKind::UploadPic {
            member_id: member_id.to_string(),
        };
        self.coordinator
            .guard(&self.ctx, kind, || {
                self.graph.upload_pic(&self.ctx, member_id, file)
            })
            .await
    }

    pub async fn upload_photos(
        &self,
        member_id: &str,
        files: Vec<MediaFile>,
    ) -> Result<PhotosUpload, TreeError> {
        let kind = MutationKind::UploadPhotos {
            member_id: member_id.to_string(),
        };
        self.coordinator
            .guard(&self.ctx, kind, || {
                self.graph.upload_photos(&self.ctx, member_id, files)
            })
            .await
    }
}
