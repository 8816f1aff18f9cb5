//! Test doubles shared by unit and integration tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use tempfile::TempDir;

use crate::client::{GraphStore, LockClient};
use crate::clock::Clock;
use crate::db::{init_database, LeaseRepository};
use crate::errors::TreeError;
use crate::models::{
    CreateChildInput, CreateMemberInput, CreateParentInput, CreateSpouseInput, DeleteOutcome,
    DirectRelations, Gender, Lease, LockStatus, MediaFile, Member, PhotosUpload, PicUpload,
    SpouseInfo, TreeContext, UpdateMemberInput, UpdateSpouseRelationInput,
};

pub const LEASE_TTL: Duration = Duration::from_secs(300);

/// A clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self {
            now: Mutex::new(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()),
        }
    }
}

impl ManualClock {
    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// A lease table in a fresh temp database, driven by a manual clock.
pub async fn lease_store() -> (Arc<LeaseRepository>, Arc<ManualClock>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let pool = init_database(&temp_dir.path().join("locks.sqlite"))
        .await
        .unwrap();
    let clock = Arc::new(ManualClock::default());
    let repo = LeaseRepository::with_clock(pool, LEASE_TTL, clock.clone());
    (Arc::new(repo), clock, temp_dir)
}

pub fn date(ymd: &str) -> DateTime<Utc> {
    NaiveDate::parse_from_str(ymd, "%Y-%m-%d")
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc()
}

pub fn member(id: &str, born: &str) -> Member {
    Member {
        id: id.to_string(),
        name: id.to_uppercase(),
        surname: "Test".to_string(),
        gender: Gender::Male,
        description: String::new(),
        born: date(born),
        died: None,
        pic: String::new(),
        photos: String::new(),
    }
}

pub fn new_member(name: &str, gender: Gender, born: &str) -> CreateMemberInput {
    CreateMemberInput {
        name: name.to_string(),
        surname: "Test".to_string(),
        gender,
        description: String::new(),
        born: date(born),
        died: None,
        pic: String::new(),
        photos: String::new(),
    }
}

/// Wraps a lock client, counting calls and optionally lying about status.
pub struct SpyLockClient {
    inner: Arc<dyn LockClient>,
    status_calls: AtomicUsize,
    acquire_calls: AtomicUsize,
    report_unlocked: AtomicBool,
    fail_status: AtomicBool,
}

impl SpyLockClient {
    pub fn new(inner: Arc<dyn LockClient>) -> Self {
        Self {
            inner,
            status_calls: AtomicUsize::new(0),
            acquire_calls: AtomicUsize::new(0),
            report_unlocked: AtomicBool::new(false),
            fail_status: AtomicBool::new(false),
        }
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn acquire_calls(&self) -> usize {
        self.acquire_calls.load(Ordering::SeqCst)
    }

    /// Make status claim the tree is free, simulating a check-to-acquire race.
    pub fn report_unlocked(&self, on: bool) {
        self.report_unlocked.store(on, Ordering::SeqCst);
    }

    pub fn fail_status(&self, on: bool) {
        self.fail_status.store(on, Ordering::SeqCst);
    }
}

#[async_trait]
impl LockClient for SpyLockClient {
    async fn status(&self, ctx: &TreeContext) -> Result<LockStatus, TreeError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_status.load(Ordering::SeqCst) {
            return Err(TreeError::Transport("lock service unreachable".to_string()));
        }
        if self.report_unlocked.load(Ordering::SeqCst) {
            return Ok(LockStatus::from_lease(&ctx.tree_id, None));
        }
        self.inner.status(ctx).await
    }

    async fn acquire(&self, ctx: &TreeContext) -> Result<Lease, TreeError> {
        self.acquire_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.acquire(ctx).await
    }

    async fn release(&self, ctx: &TreeContext) -> Result<(), TreeError> {
        self.inner.release(ctx).await
    }

    async fn force_release(&self, ctx: &TreeContext) -> Result<(), TreeError> {
        self.inner.force_release(ctx).await
    }
}

struct SpouseEdge {
    a: String,
    b: String,
    married: DateTime<Utc>,
    divorced: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct GraphState {
    members: Vec<Member>,
    /// (child, parent)
    parent_edges: Vec<(String, String)>,
    spouse_edges: Vec<SpouseEdge>,
}

impl GraphState {
    fn find(&self, id: &str) -> Result<&Member, TreeError> {
        self.members
            .iter()
            .find(|m| m.id == id)
            .ok_or_else(|| TreeError::NotFound(format!("Member {} not found", id)))
    }

    fn find_mut(&mut self, id: &str) -> Result<&mut Member, TreeError> {
        self.members
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| TreeError::NotFound(format!("Member {} not found", id)))
    }

    fn insert(&mut self, input: &CreateMemberInput) -> Member {
        let member = Member {
            id: uuid::Uuid::new_v4().to_string(),
            name: input.name.clone(),
            surname: input.surname.clone(),
            gender: input.gender,
            description: input.description.clone(),
            born: input.born,
            died: input.died,
            pic: input.pic.clone(),
            photos: input.photos.clone(),
        };
        self.members.push(member.clone());
        member
    }
}

/// In-memory graph store enforcing the two-parent rule, with call counters.
#[derive(Default)]
pub struct MemoryGraphStore {
    state: tokio::sync::Mutex<GraphState>,
    relation_fetches: AtomicUsize,
    member_fetches: AtomicUsize,
    mutations: AtomicUsize,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed_member(&self, member: Member) {
        self.state.lock().await.members.push(member);
    }

    pub async fn seed_parent(&self, child: &str, parent: &str) {
        self.state
            .lock()
            .await
            .parent_edges
            .push((child.to_string(), parent.to_string()));
    }

    pub async fn seed_spouses(&self, a: &str, b: &str, married: &str) {
        self.state.lock().await.spouse_edges.push(SpouseEdge {
            a: a.to_string(),
            b: b.to_string(),
            married: date(married),
            divorced: None,
        });
    }

    pub fn relation_fetches(&self) -> usize {
        self.relation_fetches.load(Ordering::SeqCst)
    }

    pub fn member_fetches(&self) -> usize {
        self.member_fetches.load(Ordering::SeqCst)
    }

    pub fn mutations(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    fn count_mutation(&self) {
        self.mutations.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn get_member(&self, _ctx: &TreeContext, member_id: &str) -> Result<Member, TreeError> {
        self.member_fetches.fetch_add(1, Ordering::SeqCst);
        self.state.lock().await.find(member_id).cloned()
    }

    async fn list_members(&self, _ctx: &TreeContext) -> Result<Vec<Member>, TreeError> {
        Ok(self.state.lock().await.members.clone())
    }

    async fn direct_relations(
        &self,
        _ctx: &TreeContext,
        member_id: &str,
    ) -> Result<DirectRelations, TreeError> {
        self.relation_fetches.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().await;
        let member = state.find(member_id)?.clone();

        let lookup = |id: &str| state.find(id).cloned();
        let parents = state
            .parent_edges
            .iter()
            .filter(|(child, _)| child == member_id)
            .map(|(_, parent)| lookup(parent))
            .collect::<Result<Vec<_>, _>>()?;
        let children = state
            .parent_edges
            .iter()
            .filter(|(_, parent)| parent == member_id)
            .map(|(child, _)| lookup(child))
            .collect::<Result<Vec<_>, _>>()?;
        let spouses = state
            .spouse_edges
            .iter()
            .filter_map(|edge| {
                let other = if edge.a == member_id {
                    &edge.b
                } else if edge.b == member_id {
                    &edge.a
                } else {
                    return None;
                };
                Some(lookup(other).map(|member| SpouseInfo {
                    member,
                    married: edge.married,
                    divorced: edge.divorced,
                }))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(DirectRelations {
            member,
            parents,
            children,
            spouses,
        })
    }

    async fn create_member(
        &self,
        _ctx: &TreeContext,
        input: &CreateMemberInput,
    ) -> Result<Member, TreeError> {
        self.count_mutation();
        Ok(self.state.lock().await.insert(input))
    }

    async fn create_child(
        &self,
        _ctx: &TreeContext,
        input: &CreateChildInput,
    ) -> Result<Member, TreeError> {
        self.count_mutation();
        let mut state = self.state.lock().await;
        state.find(&input.parent_id)?;
        let child = state.insert(&input.member);
        state
            .parent_edges
            .push((child.id.clone(), input.parent_id.clone()));
        Ok(child)
    }

    async fn create_parent(
        &self,
        _ctx: &TreeContext,
        input: &CreateParentInput,
    ) -> Result<Member, TreeError> {
        self.count_mutation();
        let mut state = self.state.lock().await;
        state.find(&input.child_id)?;
        let existing = state
            .parent_edges
            .iter()
            .filter(|(child, _)| *child == input.child_id)
            .count();
        if existing >= 2 {
            return Err(TreeError::MutationRejected(
                "A member cannot have more than two parents".to_string(),
            ));
        }
        let parent = state.insert(&input.member);
        state
            .parent_edges
            .push((input.child_id.clone(), parent.id.clone()));
        Ok(parent)
    }

    async fn create_spouse(
        &self,
        _ctx: &TreeContext,
        input: &CreateSpouseInput,
    ) -> Result<Member, TreeError> {
        self.count_mutation();
        let mut state = self.state.lock().await;
        state.find(&input.spouse_id)?;
        let spouse = state.insert(&input.member);
        state.spouse_edges.push(SpouseEdge {
            a: input.spouse_id.clone(),
            b: spouse.id.clone(),
            married: input.married,
            divorced: input.divorced,
        });
        Ok(spouse)
    }

    async fn update_member(
        &self,
        _ctx: &TreeContext,
        input: &UpdateMemberInput,
    ) -> Result<Member, TreeError> {
        self.count_mutation();
        let mut state = self.state.lock().await;
        let member = state.find_mut(&input.id)?;
        if let Some(name) = &input.name {
            member.name = name.clone();
        }
        if let Some(surname) = &input.surname {
            member.surname = surname.clone();
        }
        if let Some(description) = &input.description {
            member.description = description.clone();
        }
        if let Some(pic) = &input.pic {
            member.pic = pic.clone();
        }
        if let Some(photos) = &input.photos {
            member.photos = photos.clone();
        }
        Ok(member.clone())
    }

    async fn delete_member(
        &self,
        _ctx: &TreeContext,
        member_id: &str,
    ) -> Result<DeleteOutcome, TreeError> {
        self.count_mutation();
        let mut state = self.state.lock().await;
        state.find(member_id)?;
        state.members.retain(|m| m.id != member_id);
        state
            .parent_edges
            .retain(|(child, parent)| child != member_id && parent != member_id);
        state
            .spouse_edges
            .retain(|edge| edge.a != member_id && edge.b != member_id);

        Ok(if state.members.is_empty() {
            DeleteOutcome::TreeDeleted
        } else {
            DeleteOutcome::MemberDeleted
        })
    }

    async fn update_spouse_relation(
        &self,
        _ctx: &TreeContext,
        input: &UpdateSpouseRelationInput,
    ) -> Result<(), TreeError> {
        self.count_mutation();
        let mut state = self.state.lock().await;
        let edge = state
            .spouse_edges
            .iter_mut()
            .find(|e| {
                (e.a == input.husband_id && e.b == input.wife_id)
                    || (e.a == input.wife_id && e.b == input.husband_id)
            })
            .ok_or_else(|| TreeError::NotFound("Spouse relation not found".to_string()))?;
        edge.married = input.married;
        edge.divorced = input.divorced;
        Ok(())
    }

    async fn upload_pic(
        &self,
        _ctx: &TreeContext,
        member_id: &str,
        file: MediaFile,
    ) -> Result<PicUpload, TreeError> {
        self.count_mutation();
        let mut state = self.state.lock().await;
        let member = state.find_mut(member_id)?;
        member.pic = format!("{}/pic/{}", member_id, file.file_name);
        Ok(PicUpload {
            pic: member.pic.clone(),
            pic_url: format!("https://media.test/{}", member.pic),
        })
    }

    async fn upload_photos(
        &self,
        _ctx: &TreeContext,
        member_id: &str,
        files: Vec<MediaFile>,
    ) -> Result<PhotosUpload, TreeError> {
        self.count_mutation();
        let mut state = self.state.lock().await;
        let member = state.find_mut(member_id)?;
        member.photos = format!("{}/photos/", member_id);
        let keys: Vec<String> = files
            .iter()
            .map(|f| format!("{}{}", member.photos, f.file_name))
            .collect();
        Ok(PhotosUpload {
            photos: member.photos.clone(),
            urls: keys.iter().map(|k| format!("https://media.test/{}", k)).collect(),
            keys,
        })
    }
}
