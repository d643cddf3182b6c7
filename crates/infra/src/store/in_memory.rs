use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;

use workboard_auth::Role;
use workboard_core::{
    BoardId, MembershipId, ProjectId, ProjectMemberId, TaskId, TenantId, UserId,
};

use super::{
    AuditRecord, AuditRepository, BillingAccountRecord, BillingRepository, BoardRecord, MembershipRecord,
    MembershipRepository, ProjectMemberRecord, ProjectRecord, ProjectRepository, ProjectWithBoards, StoreError,
    StoreResult, TASK_NOT_FOUND, TaskRecord, TaskRepository, TenantRecord, TenantRepository, TenantStats,
    UserRecord, UserRepository,
};

#[derive(Debug, Default)]
struct State {
    tenants: HashMap<TenantId, TenantRecord>,
    billing: HashMap<TenantId, BillingAccountRecord>,
    users: HashMap<UserId, UserRecord>,
    memberships: HashMap<(TenantId, UserId), MembershipRecord>,
    projects: HashMap<(TenantId, ProjectId), ProjectRecord>,
    boards: HashMap<(TenantId, BoardId), BoardRecord>,
    project_members: HashMap<(TenantId, ProjectId, UserId), ProjectMemberRecord>,
    tasks: HashMap<(TenantId, TaskId), TaskRecord>,
    audit: Vec<AuditRecord>,
}

/// In-memory tenant-isolated store for tests/dev.
///
/// Tenant-owned rows are keyed by `(TenantId, ..)`, so a lookup with the wrong
/// tenant simply misses.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, State>> {
        self.inner
            .read()
            .map_err(|_| StoreError::Backend("in-memory store lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, State>> {
        self.inner
            .write()
            .map_err(|_| StoreError::Backend("in-memory store lock poisoned".to_string()))
    }
}

impl State {
    fn boards_of(&self, tenant_id: TenantId, project_id: ProjectId) -> Vec<BoardRecord> {
        let mut boards: Vec<BoardRecord> = self
            .boards
            .iter()
            .filter(|((t, _), b)| *t == tenant_id && b.project_id == project_id)
            .map(|(_, b)| b.clone())
            .collect();
        boards.sort_by_key(|b| b.position);
        boards
    }

    fn user_pairs<R: Clone>(&self, rows: impl Iterator<Item = (R, UserId)>) -> Vec<(R, UserRecord)> {
        rows.filter_map(|(row, user_id)| self.users.get(&user_id).map(|u| (row, u.clone())))
            .collect()
    }
}

#[async_trait]
impl TenantRepository for InMemoryStore {
    async fn create_tenant(&self, tenant: TenantRecord) -> StoreResult<()> {
        let mut state = self.write()?;
        if state.tenants.values().any(|t| t.slug == tenant.slug) {
            return Err(StoreError::Conflict(format!("tenant slug '{}' already exists", tenant.slug)));
        }
        state.billing.insert(
            tenant.id,
            BillingAccountRecord {
                tenant_id: tenant.id,
                stripe_customer_id: None,
                created_at: tenant.created_at,
            },
        );
        state.tenants.insert(tenant.id, tenant);
        Ok(())
    }

    async fn find_tenant(&self, tenant_id: TenantId) -> StoreResult<Option<TenantRecord>> {
        Ok(self.read()?.tenants.get(&tenant_id).cloned())
    }

    async fn find_tenant_by_slug(&self, slug: &str) -> StoreResult<Option<TenantRecord>> {
        Ok(self.read()?.tenants.values().find(|t| t.slug == slug).cloned())
    }

    async fn tenant_stats(&self, tenant_id: TenantId) -> StoreResult<TenantStats> {
        let state = self.read()?;
        let count = |n: usize| n as u64;
        Ok(TenantStats {
            members: count(state.memberships.keys().filter(|(t, _)| *t == tenant_id).count()),
            projects: count(state.projects.keys().filter(|(t, _)| *t == tenant_id).count()),
            tasks: count(state.tasks.keys().filter(|(t, _)| *t == tenant_id).count()),
        })
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn create_user(&self, user: UserRecord) -> StoreResult<()> {
        let mut state = self.write()?;
        if state.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict(format!("email '{}' already registered", user.email)));
        }
        state.users.insert(user.id, user);
        Ok(())
    }

    async fn find_user(&self, user_id: UserId) -> StoreResult<Option<UserRecord>> {
        Ok(self.read()?.users.get(&user_id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>> {
        Ok(self.read()?.users.values().find(|u| u.email == email).cloned())
    }
}

#[async_trait]
impl MembershipRepository for InMemoryStore {
    async fn upsert_membership(&self, tenant_id: TenantId, user_id: UserId, role: Role) -> StoreResult<MembershipRecord> {
        let mut state = self.write()?;
        let record = state
            .memberships
            .entry((tenant_id, user_id))
            .and_modify(|m| m.role = role)
            .or_insert_with(|| MembershipRecord {
                id: MembershipId::new(),
                tenant_id,
                user_id,
                role,
                created_at: Utc::now(),
            });
        Ok(record.clone())
    }

    async fn find_membership(&self, tenant_id: TenantId, user_id: UserId) -> StoreResult<Option<MembershipRecord>> {
        Ok(self.read()?.memberships.get(&(tenant_id, user_id)).cloned())
    }

    async fn list_memberships(&self, tenant_id: TenantId) -> StoreResult<Vec<(MembershipRecord, UserRecord)>> {
        let state = self.read()?;
        let mut rows = state.user_pairs(
            state
                .memberships
                .iter()
                .filter(|((t, _), _)| *t == tenant_id)
                .map(|((_, u), m)| (m.clone(), *u)),
        );
        rows.sort_by_key(|(m, _)| m.created_at);
        Ok(rows)
    }
}

#[async_trait]
impl ProjectRepository for InMemoryStore {
    async fn create_project(
        &self,
        project: ProjectRecord,
        boards: Vec<BoardRecord>,
        members: Vec<ProjectMemberRecord>,
    ) -> StoreResult<()> {
        let mut state = self.write()?;
        let tenant_id = project.tenant_id;
        for board in boards {
            state.boards.insert((tenant_id, board.id), board);
        }
        for member in members {
            state
                .project_members
                .insert((tenant_id, member.project_id, member.user_id), member);
        }
        state.projects.insert((tenant_id, project.id), project);
        Ok(())
    }

    async fn list_projects(&self, tenant_id: TenantId, member: Option<UserId>) -> StoreResult<Vec<ProjectWithBoards>> {
        let state = self.read()?;
        let mut projects: Vec<ProjectWithBoards> = state
            .projects
            .iter()
            .filter(|((t, _), _)| *t == tenant_id)
            .filter(|((t, p), _)| match member {
                Some(user_id) => state.project_members.contains_key(&(*t, *p, user_id)),
                None => true,
            })
            .map(|(_, project)| ProjectWithBoards {
                project: project.clone(),
                boards: state.boards_of(tenant_id, project.id),
            })
            .collect();
        projects.sort_by_key(|p| p.project.created_at);
        Ok(projects)
    }

    async fn find_project(&self, tenant_id: TenantId, project_id: ProjectId) -> StoreResult<Option<ProjectRecord>> {
        Ok(self.read()?.projects.get(&(tenant_id, project_id)).cloned())
    }

    async fn find_board(&self, tenant_id: TenantId, board_id: BoardId) -> StoreResult<Option<BoardRecord>> {
        Ok(self.read()?.boards.get(&(tenant_id, board_id)).cloned())
    }

    async fn find_project_member(
        &self,
        tenant_id: TenantId,
        project_id: ProjectId,
        user_id: UserId,
    ) -> StoreResult<Option<ProjectMemberRecord>> {
        Ok(self
            .read()?
            .project_members
            .get(&(tenant_id, project_id, user_id))
            .cloned())
    }

    async fn list_project_members(
        &self,
        tenant_id: TenantId,
        project_id: ProjectId,
    ) -> StoreResult<Vec<(ProjectMemberRecord, UserRecord)>> {
        let state = self.read()?;
        let mut rows = state.user_pairs(
            state
                .project_members
                .iter()
                .filter(|((t, p, _), _)| *t == tenant_id && *p == project_id)
                .map(|((_, _, u), m)| (m.clone(), *u)),
        );
        rows.sort_by_key(|(m, _)| m.created_at);
        Ok(rows)
    }

    async fn upsert_project_member(
        &self,
        tenant_id: TenantId,
        project_id: ProjectId,
        user_id: UserId,
        role: Role,
    ) -> StoreResult<ProjectMemberRecord> {
        let mut state = self.write()?;
        let record = state
            .project_members
            .entry((tenant_id, project_id, user_id))
            .and_modify(|m| m.role = role)
            .or_insert_with(|| ProjectMemberRecord {
                id: ProjectMemberId::new(),
                tenant_id,
                project_id,
                user_id,
                role,
                created_at: Utc::now(),
            });
        Ok(record.clone())
    }

    async fn remove_project_member(&self, tenant_id: TenantId, project_id: ProjectId, user_id: UserId) -> StoreResult<u64> {
        let removed = self
            .write()?
            .project_members
            .remove(&(tenant_id, project_id, user_id));
        Ok(u64::from(removed.is_some()))
    }

    async fn delete_project_tasks(&self, tenant_id: TenantId, project_id: ProjectId) -> StoreResult<u64> {
        let mut state = self.write()?;
        let before = state.tasks.len();
        state
            .tasks
            .retain(|(t, _), task| !(*t == tenant_id && task.project_id == project_id));
        Ok((before - state.tasks.len()) as u64)
    }

    async fn delete_project_members(&self, tenant_id: TenantId, project_id: ProjectId) -> StoreResult<u64> {
        let mut state = self.write()?;
        let before = state.project_members.len();
        state
            .project_members
            .retain(|(t, p, _), _| !(*t == tenant_id && *p == project_id));
        Ok((before - state.project_members.len()) as u64)
    }

    async fn delete_project_boards(&self, tenant_id: TenantId, project_id: ProjectId) -> StoreResult<u64> {
        let mut state = self.write()?;
        let before = state.boards.len();
        state
            .boards
            .retain(|(t, _), board| !(*t == tenant_id && board.project_id == project_id));
        Ok((before - state.boards.len()) as u64)
    }

    async fn delete_project(&self, tenant_id: TenantId, project_id: ProjectId) -> StoreResult<u64> {
        let removed = self.write()?.projects.remove(&(tenant_id, project_id));
        Ok(u64::from(removed.is_some()))
    }
}

#[async_trait]
impl TaskRepository for InMemoryStore {
    async fn create_task(&self, task: TaskRecord) -> StoreResult<()> {
        self.write()?.tasks.insert((task.tenant_id, task.id), task);
        Ok(())
    }

    async fn find_task(&self, tenant_id: TenantId, task_id: TaskId) -> StoreResult<Option<TaskRecord>> {
        Ok(self.read()?.tasks.get(&(tenant_id, task_id)).cloned())
    }

    async fn update_task(&self, task: &TaskRecord) -> StoreResult<()> {
        let mut state = self.write()?;
        let existing = state
            .tasks
            .get_mut(&(task.tenant_id, task.id))
            .ok_or(StoreError::NotFound(TASK_NOT_FOUND))?;
        *existing = task.clone();
        Ok(())
    }

    async fn delete_task(&self, tenant_id: TenantId, task_id: TaskId) -> StoreResult<u64> {
        let removed = self.write()?.tasks.remove(&(tenant_id, task_id));
        Ok(u64::from(removed.is_some()))
    }

    async fn list_project_tasks(&self, tenant_id: TenantId, project_id: ProjectId) -> StoreResult<Vec<TaskRecord>> {
        let state = self.read()?;
        let mut tasks: Vec<TaskRecord> = state
            .tasks
            .iter()
            .filter(|((t, _), task)| *t == tenant_id && task.project_id == project_id)
            .map(|(_, task)| task.clone())
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(tasks)
    }
}

#[async_trait]
impl AuditRepository for InMemoryStore {
    async fn append_audit(&self, record: AuditRecord) -> StoreResult<()> {
        self.write()?.audit.push(record);
        Ok(())
    }

    async fn list_audit(&self, tenant_id: TenantId, limit: usize) -> StoreResult<Vec<AuditRecord>> {
        let state = self.read()?;
        // Appends are chronological, so walking backwards yields newest first.
        Ok(state
            .audit
            .iter()
            .rev()
            .filter(|r| r.tenant_id == tenant_id)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl BillingRepository for InMemoryStore {
    async fn find_billing_account(&self, tenant_id: TenantId) -> StoreResult<Option<BillingAccountRecord>> {
        Ok(self.read()?.billing.get(&tenant_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use workboard_core::TaskStatus;

    fn tenant(slug: &str) -> TenantRecord {
        TenantRecord {
            id: TenantId::new(),
            name: slug.to_uppercase(),
            slug: slug.to_string(),
            created_at: Utc::now(),
        }
    }

    fn user(email: &str) -> UserRecord {
        UserRecord {
            id: UserId::new(),
            email: email.to_string(),
            name: "Test".to_string(),
            password_hash: "x".to_string(),
            created_at: Utc::now(),
        }
    }

    fn project(tenant_id: TenantId, owner: UserId) -> (ProjectRecord, Vec<BoardRecord>, Vec<ProjectMemberRecord>) {
        let now = Utc::now();
        let project = ProjectRecord {
            id: ProjectId::new(),
            tenant_id,
            name: "Roadmap".to_string(),
            description: None,
            created_by_id: owner,
            created_at: now,
        };
        let boards = vec![BoardRecord {
            id: BoardId::new(),
            tenant_id,
            project_id: project.id,
            name: "Backlog".to_string(),
            position: 0,
            created_at: now,
        }];
        let members = vec![ProjectMemberRecord {
            id: ProjectMemberId::new(),
            tenant_id,
            project_id: project.id,
            user_id: owner,
            role: Role::Owner,
            created_at: now,
        }];
        (project, boards, members)
    }

    #[tokio::test]
    async fn slug_and_email_are_unique() {
        let store = InMemoryStore::new();
        store.create_tenant(tenant("acme")).await.unwrap();
        assert!(matches!(store.create_tenant(tenant("acme")).await, Err(StoreError::Conflict(_))));

        store.create_user(user("ann@x.com")).await.unwrap();
        assert!(matches!(store.create_user(user("ann@x.com")).await, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn creating_a_tenant_opens_a_billing_account() {
        let store = InMemoryStore::new();
        let t = tenant("acme");
        store.create_tenant(t.clone()).await.unwrap();
        let billing = store.find_billing_account(t.id).await.unwrap().unwrap();
        assert_eq!(billing.stripe_customer_id, None);
    }

    #[tokio::test]
    async fn tenant_isolation_enforced() {
        let store = InMemoryStore::new();
        let a = tenant("a");
        let b = tenant("b");
        let owner = user("owner@x.com");
        store.create_tenant(a.clone()).await.unwrap();
        store.create_tenant(b.clone()).await.unwrap();
        store.create_user(owner.clone()).await.unwrap();

        let (p, boards, members) = project(a.id, owner.id);
        let board_id = boards[0].id;
        store.create_project(p.clone(), boards, members).await.unwrap();

        assert!(store.find_project(a.id, p.id).await.unwrap().is_some());
        assert!(store.find_project(b.id, p.id).await.unwrap().is_none());
        assert!(store.find_board(b.id, board_id).await.unwrap().is_none());
        assert!(store.list_projects(b.id, None).await.unwrap().is_empty());
        assert_eq!(store.delete_project(b.id, p.id).await.unwrap(), 0);
        assert_eq!(store.tenant_stats(a.id).await.unwrap().projects, 1);
    }

    #[tokio::test]
    async fn member_filter_limits_project_listing() {
        let store = InMemoryStore::new();
        let t = tenant("acme");
        let owner = user("owner@x.com");
        let outsider = user("outsider@x.com");
        store.create_user(owner.clone()).await.unwrap();
        store.create_user(outsider.clone()).await.unwrap();

        let (p, boards, members) = project(t.id, owner.id);
        store.create_project(p.clone(), boards, members).await.unwrap();

        assert_eq!(store.list_projects(t.id, Some(owner.id)).await.unwrap().len(), 1);
        assert!(store.list_projects(t.id, Some(outsider.id)).await.unwrap().is_empty());

        store
            .upsert_project_member(t.id, p.id, outsider.id, Role::Viewer)
            .await
            .unwrap();
        let listed = store.list_projects(t.id, Some(outsider.id)).await.unwrap();
        assert_eq!(listed[0].boards.len(), 1);
    }

    #[tokio::test]
    async fn upsert_membership_changes_role_in_place() {
        let store = InMemoryStore::new();
        let t = tenant("acme");
        let u = user("ann@x.com");
        store.create_user(u.clone()).await.unwrap();

        let first = store.upsert_membership(t.id, u.id, Role::Viewer).await.unwrap();
        let second = store.upsert_membership(t.id, u.id, Role::Admin).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.role, Role::Admin);
        assert_eq!(store.list_memberships(t.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn project_cascade_removes_children() {
        let store = InMemoryStore::new();
        let t = tenant("acme");
        let owner = user("owner@x.com");
        store.create_user(owner.clone()).await.unwrap();
        let (p, boards, members) = project(t.id, owner.id);
        let board_id = boards[0].id;
        store.create_project(p.clone(), boards, members).await.unwrap();

        let now = Utc::now();
        store
            .create_task(TaskRecord {
                id: TaskId::new(),
                tenant_id: t.id,
                project_id: p.id,
                board_id,
                title: "Write docs".to_string(),
                description: None,
                status: TaskStatus::Todo,
                assignee_id: None,
                created_by_id: owner.id,
                due_date: None,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();

        assert_eq!(store.delete_project_tasks(t.id, p.id).await.unwrap(), 1);
        assert_eq!(store.delete_project_members(t.id, p.id).await.unwrap(), 1);
        assert_eq!(store.delete_project_boards(t.id, p.id).await.unwrap(), 1);
        assert_eq!(store.delete_project(t.id, p.id).await.unwrap(), 1);
        assert_eq!(store.tenant_stats(t.id).await.unwrap(), TenantStats::default());
    }

    #[tokio::test]
    async fn update_of_deleted_task_is_not_found() {
        let store = InMemoryStore::new();
        let t = tenant("acme");
        let owner = user("owner@x.com");
        let (p, boards, members) = project(t.id, owner.id);
        let board_id = boards[0].id;
        store.create_project(p.clone(), boards, members).await.unwrap();

        let now = Utc::now();
        let mut task = TaskRecord {
            id: TaskId::new(),
            tenant_id: t.id,
            project_id: p.id,
            board_id,
            title: "Write docs".to_string(),
            description: None,
            status: TaskStatus::Todo,
            assignee_id: None,
            created_by_id: owner.id,
            due_date: None,
            created_at: now,
            updated_at: now,
        };
        store.create_task(task.clone()).await.unwrap();

        task.status = TaskStatus::Done;
        store.update_task(&task).await.unwrap();
        assert_eq!(store.find_task(t.id, task.id).await.unwrap().unwrap().status, TaskStatus::Done);

        store.delete_task(t.id, task.id).await.unwrap();
        assert_eq!(store.update_task(&task).await, Err(StoreError::NotFound(TASK_NOT_FOUND)));
        assert!(store.find_task(t.id, task.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn audit_listing_is_newest_first_and_limited() {
        let store = InMemoryStore::new();
        let t = TenantId::new();
        let other = TenantId::new();
        let actor = UserId::new();
        for (i, tenant_id) in [t, other, t, t].into_iter().enumerate() {
            store
                .append_audit(AuditRecord {
                    id: workboard_core::AuditLogId::new(),
                    tenant_id,
                    actor_id: actor,
                    action: format!("action.{i}"),
                    entity_type: "task".to_string(),
                    entity_id: i.to_string(),
                    metadata: None,
                    created_at: Utc::now(),
                })
                .await
                .unwrap();
        }

        let listed = store.list_audit(t, 2).await.unwrap();
        let actions: Vec<&str> = listed.iter().map(|r| r.action.as_str()).collect();
        assert_eq!(actions, vec!["action.3", "action.2"]);
    }
}
