//! Process-local memoization of tree reads, invalidated only by successful writes.
//!
//! Each guarded mutation publishes a [`MutationSucceeded`] event; the cache drops
//! exactly the keys that event's [`MutationKind`] maps to. Reads never invalidate.

use std::collections::HashMap;
use std::future::Future;

use tokio::sync::Mutex;

use crate::errors::TreeError;
use crate::models::{DirectRelations, LockStatus, Member};

/// Every mutation the coordinator can guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationKind {
    CreateMember,
    CreateChild,
    CreateParent,
    CreateSpouse,
    UpdateMember { member_id: String },
    DeleteMember { member_id: String },
    UpdateSpouseRelation,
    UploadPic { member_id: String },
    UploadPhotos { member_id: String },
}

/// A cache key family to drop for one tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invalidation {
    LockStatus,
    /// All direct-relations entries of the tree, whichever member they focus.
    DirectRelations,
    MemberList,
    Member(String),
}

impl MutationKind {
    /// The invalidation table.
    pub fn invalidations(&self) -> Vec<Invalidation> {
        let mut targets = vec![Invalidation::LockStatus, Invalidation::DirectRelations];
        match self {
            MutationKind::CreateMember
            | MutationKind::CreateChild
            | MutationKind::CreateParent
            | MutationKind::CreateSpouse
            | MutationKind::UpdateSpouseRelation => {
                targets.push(Invalidation::MemberList);
            }
            MutationKind::UpdateMember { member_id }
            | MutationKind::DeleteMember { member_id }
            | MutationKind::UploadPic { member_id }
            | MutationKind::UploadPhotos { member_id } => {
                targets.push(Invalidation::MemberList);
                targets.push(Invalidation::Member(member_id.clone()));
            }
        }
        targets
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MutationKind::CreateMember => "create_member",
            MutationKind::CreateChild => "create_child",
            MutationKind::CreateParent => "create_parent",
            MutationKind::CreateSpouse => "create_spouse",
            MutationKind::UpdateMember { .. } => "update_member",
            MutationKind::DeleteMember { .. } => "delete_member",
            MutationKind::UpdateSpouseRelation => "update_spouse_relation",
            MutationKind::UploadPic { .. } => "upload_pic",
            MutationKind::UploadPhotos { .. } => "upload_photos",
        }
    }
}

/// Published after a guarded mutation returns successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationSucceeded {
    pub tree_id: String,
    pub kind: MutationKind,
}

type MemberKey = (String, String);

#[derive(Default)]
struct CacheState {
    members: HashMap<MemberKey, Member>,
    member_lists: HashMap<String, Vec<Member>>,
    relations: HashMap<MemberKey, DirectRelations>,
    lock_status: HashMap<String, LockStatus>,
    /// Bumped on every invalidation of a tree. A fetch that started under an
    /// older generation must not be stored.
    generations: HashMap<String, u64>,
}

/// Keyed cache over member-by-id, member lists, direct relations and lock status.
#[derive(Default)]
pub struct TreeCache {
    state: Mutex<CacheState>,
}

fn key(tree_id: &str, member_id: &str) -> MemberKey {
    (tree_id.to_string(), member_id.to_string())
}

impl TreeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve from `lookup` or run `fetch`, storing the result with `store`
    /// only if the tree was not invalidated while the fetch was in flight.
    async fn read_through<V, F, Fut>(
        &self,
        tree_id: &str,
        lookup: impl FnOnce(&CacheState) -> Option<V>,
        store: impl FnOnce(&mut CacheState, V),
        fetch: F,
    ) -> Result<V, TreeError>
    where
        V: Clone,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, TreeError>>,
    {
        let generation = {
            let state = self.state.lock().await;
            if let Some(hit) = lookup(&*state) {
                return Ok(hit);
            }
            state.generation(tree_id)
        };

        let value = fetch().await?;

        let mut state = self.state.lock().await;
        if state.generation(tree_id) == generation {
            store(&mut *state, value.clone());
        } else {
            tracing::debug!("Tree {} changed during fetch, not caching", tree_id);
        }
        Ok(value)
    }

    pub async fn member<F, Fut>(
        &self,
        tree_id: &str,
        member_id: &str,
        fetch: F,
    ) -> Result<Member, TreeError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Member, TreeError>>,
    {
        let k = key(tree_id, member_id);
        self.read_through(
            tree_id,
            |state| state.members.get(&k).cloned(),
            |state, member| {
                state.members.insert(k.clone(), member);
            },
            fetch,
        )
        .await
    }

    pub async fn member_list<F, Fut>(&self, tree_id: &str, fetch: F) -> Result<Vec<Member>, TreeError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<Member>, TreeError>>,
    {
        self.read_through(
            tree_id,
            |state| state.member_lists.get(tree_id).cloned(),
            |state, members| {
                state.member_lists.insert(tree_id.to_string(), members);
            },
            fetch,
        )
        .await
    }

    pub async fn direct_relations<F, Fut>(
        &self,
        tree_id: &str,
        member_id: &str,
        fetch: F,
    ) -> Result<DirectRelations, TreeError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<DirectRelations, TreeError>>,
    {
        let k = key(tree_id, member_id);
        self.read_through(
            tree_id,
            |state| state.relations.get(&k).cloned(),
            |state, relations| {
                state.relations.insert(k.clone(), relations);
            },
            fetch,
        )
        .await
    }

    pub async fn lock_status<F, Fut>(&self, tree_id: &str, fetch: F) -> Result<LockStatus, TreeError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<LockStatus, TreeError>>,
    {
        self.read_through(
            tree_id,
            |state| state.lock_status.get(tree_id).cloned(),
            |state, status| {
                state.lock_status.insert(tree_id.to_string(), status);
            },
            fetch,
        )
        .await
    }

    /// Drop the keys a successful mutation may have made stale.
    pub async fn apply(&self, event: &MutationSucceeded) {
        let targets = event.kind.invalidations();
        tracing::debug!(
            "Invalidating {:?} for tree {} after {}",
            targets,
            event.tree_id,
            event.kind.as_str()
        );
        let mut state = self.state.lock().await;
        for target in targets {
            state.invalidate(&event.tree_id, &target);
        }
    }

    pub async fn invalidate_lock_status(&self, tree_id: &str) {
        self.state
            .lock()
            .await
            .invalidate(tree_id, &Invalidation::LockStatus);
    }
}

impl CacheState {
    fn generation(&self, tree_id: &str) -> u64 {
        self.generations.get(tree_id).copied().unwrap_or(0)
    }

    fn invalidate(&mut self, tree_id: &str, target: &Invalidation) {
        *self.generations.entry(tree_id.to_string()).or_default() += 1;
        match target {
            Invalidation::LockStatus => {
                self.lock_status.remove(tree_id);
            }
            Invalidation::DirectRelations => self.relations.retain(|(tree, _), _| tree != tree_id),
            Invalidation::MemberList => {
                self.member_lists.remove(tree_id);
            }
            Invalidation::Member(member_id) => {
                self.members.remove(&key(tree_id, member_id));
            }
        }
    }
}
