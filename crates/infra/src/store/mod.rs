//! Tenant-isolated persistence abstractions.
//!
//! Every method that touches tenant-owned data takes the caller's `TenantId`
//! and filters by it. A row belonging to another tenant is indistinguishable
//! from a missing row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use workboard_auth::Role;
use workboard_core::{
    AuditLogId, BoardId, MembershipId, ProjectId, ProjectMemberId, TaskId, TaskStatus, TenantId, UserId,
};

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;

pub type StoreResult<T> = Result<T, StoreError>;

pub const TASK_NOT_FOUND: &str = "Task not found";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write (e.g. email or slug taken).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The row an update targeted no longer exists.
    #[error("not found: {0}")]
    NotFound(&'static str),

    #[error("storage error: {0}")]
    Backend(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Records
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantRecord {
    pub id: TenantId,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: UserId,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipRecord {
    pub id: MembershipId,
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRecord {
    pub id: ProjectId,
    pub tenant_id: TenantId,
    pub name: String,
    pub description: Option<String>,
    pub created_by_id: UserId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardRecord {
    pub id: BoardId,
    pub tenant_id: TenantId,
    pub project_id: ProjectId,
    pub name: String,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMemberRecord {
    pub id: ProjectMemberId,
    pub tenant_id: TenantId,
    pub project_id: ProjectId,
    pub user_id: UserId,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub id: TaskId,
    pub tenant_id: TenantId,
    pub project_id: ProjectId,
    pub board_id: BoardId,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub assignee_id: Option<UserId>,
    pub created_by_id: UserId,
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub id: AuditLogId,
    pub tenant_id: TenantId,
    pub actor_id: UserId,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingAccountRecord {
    pub tenant_id: TenantId,
    pub stripe_customer_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A project together with its boards, ordered by position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectWithBoards {
    #[serde(flatten)]
    pub project: ProjectRecord,
    pub boards: Vec<BoardRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TenantStats {
    pub members: u64,
    pub projects: u64,
    pub tasks: u64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Repositories
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait TenantRepository: Send + Sync {
    /// Create a tenant and its (empty) billing account. `Conflict` if the slug is taken.
    async fn create_tenant(&self, tenant: TenantRecord) -> StoreResult<()>;
    async fn find_tenant(&self, tenant_id: TenantId) -> StoreResult<Option<TenantRecord>>;
    async fn find_tenant_by_slug(&self, slug: &str) -> StoreResult<Option<TenantRecord>>;
    async fn tenant_stats(&self, tenant_id: TenantId) -> StoreResult<TenantStats>;
}

/// Users are global; tenant access goes through memberships.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// `Conflict` if the email is taken.
    async fn create_user(&self, user: UserRecord) -> StoreResult<()>;
    async fn find_user(&self, user_id: UserId) -> StoreResult<Option<UserRecord>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>>;
}

#[async_trait]
pub trait MembershipRepository: Send + Sync {
    /// Insert the membership, or change the role of the existing one.
    async fn upsert_membership(&self, tenant_id: TenantId, user_id: UserId, role: Role) -> StoreResult<MembershipRecord>;
    async fn find_membership(&self, tenant_id: TenantId, user_id: UserId) -> StoreResult<Option<MembershipRecord>>;
    async fn list_memberships(&self, tenant_id: TenantId) -> StoreResult<Vec<(MembershipRecord, UserRecord)>>;
}

#[async_trait]
pub trait ProjectRepository: Send + Sync {
    /// Create a project with its initial boards and members.
    async fn create_project(
        &self,
        project: ProjectRecord,
        boards: Vec<BoardRecord>,
        members: Vec<ProjectMemberRecord>,
    ) -> StoreResult<()>;

    /// All projects of the tenant, or only those `member` belongs to.
    async fn list_projects(&self, tenant_id: TenantId, member: Option<UserId>) -> StoreResult<Vec<ProjectWithBoards>>;
    async fn find_project(&self, tenant_id: TenantId, project_id: ProjectId) -> StoreResult<Option<ProjectRecord>>;
    async fn find_board(&self, tenant_id: TenantId, board_id: BoardId) -> StoreResult<Option<BoardRecord>>;

    async fn find_project_member(
        &self,
        tenant_id: TenantId,
        project_id: ProjectId,
        user_id: UserId,
    ) -> StoreResult<Option<ProjectMemberRecord>>;
    async fn list_project_members(
        &self,
        tenant_id: TenantId,
        project_id: ProjectId,
    ) -> StoreResult<Vec<(ProjectMemberRecord, UserRecord)>>;
    async fn upsert_project_member(
        &self,
        tenant_id: TenantId,
        project_id: ProjectId,
        user_id: UserId,
        role: Role,
    ) -> StoreResult<ProjectMemberRecord>;
    /// Returns how many rows were removed (0 or 1).
    async fn remove_project_member(&self, tenant_id: TenantId, project_id: ProjectId, user_id: UserId) -> StoreResult<u64>;

    // Deletion is split into independent calls; callers run them children first.
    async fn delete_project_tasks(&self, tenant_id: TenantId, project_id: ProjectId) -> StoreResult<u64>;
    async fn delete_project_members(&self, tenant_id: TenantId, project_id: ProjectId) -> StoreResult<u64>;
    async fn delete_project_boards(&self, tenant_id: TenantId, project_id: ProjectId) -> StoreResult<u64>;
    async fn delete_project(&self, tenant_id: TenantId, project_id: ProjectId) -> StoreResult<u64>;
}

#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn create_task(&self, task: TaskRecord) -> StoreResult<()>;
    async fn find_task(&self, tenant_id: TenantId, task_id: TaskId) -> StoreResult<Option<TaskRecord>>;
    /// Overwrite the mutable fields of an existing task of the same tenant.
    /// Fails with [`StoreError::NotFound`] if the task is gone.
    async fn update_task(&self, task: &TaskRecord) -> StoreResult<()>;
    async fn delete_task(&self, tenant_id: TenantId, task_id: TaskId) -> StoreResult<u64>;
    /// Newest first.
    async fn list_project_tasks(&self, tenant_id: TenantId, project_id: ProjectId) -> StoreResult<Vec<TaskRecord>>;
}

#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn append_audit(&self, record: AuditRecord) -> StoreResult<()>;
    /// Newest first, at most `limit`.
    async fn list_audit(&self, tenant_id: TenantId, limit: usize) -> StoreResult<Vec<AuditRecord>>;
}

#[async_trait]
pub trait BillingRepository: Send + Sync {
    async fn find_billing_account(&self, tenant_id: TenantId) -> StoreResult<Option<BillingAccountRecord>>;
}

/// Everything the API needs from persistence.
pub trait Store:
    TenantRepository
    + UserRepository
    + MembershipRepository
    + ProjectRepository
    + TaskRepository
    + AuditRepository
    + BillingRepository
{
}

impl<T> Store for T where
    T: TenantRepository
        + UserRepository
        + MembershipRepository
        + ProjectRepository
        + TaskRepository
        + AuditRepository
        + BillingRepository
{
}
