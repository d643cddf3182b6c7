//! Postgres-backed store.
//!
//! Every query that reads or writes tenant-owned rows includes `tenant_id` in
//! its WHERE clause, so a row from another tenant behaves exactly like a
//! missing one.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (other) | Any other | `Backend` |
//! | PoolClosed / Decode / Other | N/A | `Backend` |

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use workboard_auth::Role;
use workboard_core::{
    AuditLogId, BoardId, MembershipId, ProjectId, ProjectMemberId, TaskId, TaskStatus, TenantId, UserId,
};

use super::{
    AuditRecord, AuditRepository, BillingAccountRecord, BillingRepository, BoardRecord, MembershipRecord,
    MembershipRepository, ProjectMemberRecord, ProjectRecord, ProjectRepository, ProjectWithBoards, StoreError,
    StoreResult, TASK_NOT_FOUND, TaskRecord, TaskRepository, TenantRecord, TenantRepository, TenantStats,
    UserRecord, UserRepository,
};

const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

/// Postgres-backed implementation of every repository trait.
///
/// Uses the SQLx connection pool, which is `Send + Sync`. Multi-row writes
/// (tenant + billing account, project + boards + members) run in one
/// transaction each.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    /// Open a pool against `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Apply the schema. Every statement is idempotent.
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row mapping
// ─────────────────────────────────────────────────────────────────────────────

fn decode_err<E>(err: E) -> sqlx::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    sqlx::Error::Decode(Box::new(err))
}

fn role_at(row: &PgRow, column: &str) -> Result<Role, sqlx::Error> {
    row.try_get::<String, _>(column)?.parse().map_err(decode_err)
}

fn tenant_from_row(row: &PgRow) -> Result<TenantRecord, sqlx::Error> {
    Ok(TenantRecord {
        id: TenantId::from_uuid(row.try_get("id")?),
        name: row.try_get("name")?,
        slug: row.try_get("slug")?,
        created_at: row.try_get("created_at")?,
    })
}

fn user_from_row(row: &PgRow, prefix: &str) -> Result<UserRecord, sqlx::Error> {
    let col = |name: &str| format!("{prefix}{name}");
    Ok(UserRecord {
        id: UserId::from_uuid(row.try_get(col("id").as_str())?),
        email: row.try_get(col("email").as_str())?,
        name: row.try_get(col("name").as_str())?,
        password_hash: row.try_get(col("password_hash").as_str())?,
        created_at: row.try_get(col("created_at").as_str())?,
    })
}

fn membership_from_row(row: &PgRow) -> Result<MembershipRecord, sqlx::Error> {
    Ok(MembershipRecord {
        id: MembershipId::from_uuid(row.try_get("id")?),
        tenant_id: TenantId::from_uuid(row.try_get("tenant_id")?),
        user_id: UserId::from_uuid(row.try_get("user_id")?),
        role: role_at(row, "role")?,
        created_at: row.try_get("created_at")?,
    })
}

fn project_from_row(row: &PgRow) -> Result<ProjectRecord, sqlx::Error> {
    Ok(ProjectRecord {
        id: ProjectId::from_uuid(row.try_get("id")?),
        tenant_id: TenantId::from_uuid(row.try_get("tenant_id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        created_by_id: UserId::from_uuid(row.try_get("created_by_id")?),
        created_at: row.try_get("created_at")?,
    })
}

fn board_from_row(row: &PgRow) -> Result<BoardRecord, sqlx::Error> {
    Ok(BoardRecord {
        id: BoardId::from_uuid(row.try_get("id")?),
        tenant_id: TenantId::from_uuid(row.try_get("tenant_id")?),
        project_id: ProjectId::from_uuid(row.try_get("project_id")?),
        name: row.try_get("name")?,
        position: row.try_get("position")?,
        created_at: row.try_get("created_at")?,
    })
}

fn project_member_from_row(row: &PgRow) -> Result<ProjectMemberRecord, sqlx::Error> {
    Ok(ProjectMemberRecord {
        id: ProjectMemberId::from_uuid(row.try_get("id")?),
        tenant_id: TenantId::from_uuid(row.try_get("tenant_id")?),
        project_id: ProjectId::from_uuid(row.try_get("project_id")?),
        user_id: UserId::from_uuid(row.try_get("user_id")?),
        role: role_at(row, "role")?,
        created_at: row.try_get("created_at")?,
    })
}

fn task_from_row(row: &PgRow) -> Result<TaskRecord, sqlx::Error> {
    let status: String = row.try_get("status")?;
    Ok(TaskRecord {
        id: TaskId::from_uuid(row.try_get("id")?),
        tenant_id: TenantId::from_uuid(row.try_get("tenant_id")?),
        project_id: ProjectId::from_uuid(row.try_get("project_id")?),
        board_id: BoardId::from_uuid(row.try_get("board_id")?),
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        status: status.parse::<TaskStatus>().map_err(decode_err)?,
        assignee_id: row.try_get::<Option<Uuid>, _>("assignee_id")?.map(UserId::from_uuid),
        created_by_id: UserId::from_uuid(row.try_get("created_by_id")?),
        due_date: row.try_get::<Option<DateTime<Utc>>, _>("due_date")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn audit_from_row(row: &PgRow) -> Result<AuditRecord, sqlx::Error> {
    Ok(AuditRecord {
        id: AuditLogId::from_uuid(row.try_get("id")?),
        tenant_id: TenantId::from_uuid(row.try_get("tenant_id")?),
        actor_id: UserId::from_uuid(row.try_get("actor_id")?),
        action: row.try_get("action")?,
        entity_type: row.try_get("entity_type")?,
        entity_id: row.try_get("entity_id")?,
        metadata: row.try_get("metadata")?,
        created_at: row.try_get("created_at")?,
    })
}

fn map_rows<T>(
    operation: &str,
    rows: Vec<PgRow>,
    f: impl Fn(&PgRow) -> Result<T, sqlx::Error>,
) -> StoreResult<Vec<T>> {
    rows.iter()
        .map(|row| f(row).map_err(|e| map_sqlx_error(operation, e)))
        .collect()
}

fn map_optional<T>(
    operation: &str,
    row: Option<PgRow>,
    f: impl Fn(&PgRow) -> Result<T, sqlx::Error>,
) -> StoreResult<Option<T>> {
    row.as_ref()
        .map(|row| f(row).map_err(|e| map_sqlx_error(operation, e)))
        .transpose()
}

fn count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

const USER_COLUMNS: &str =
    "u.id AS u_id, u.email AS u_email, u.name AS u_name, u.password_hash AS u_password_hash, u.created_at AS u_created_at";

// ─────────────────────────────────────────────────────────────────────────────
// Repositories
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl TenantRepository for PostgresStore {
    #[instrument(skip(self, tenant), fields(tenant_id = %tenant.id), err)]
    async fn create_tenant(&self, tenant: TenantRecord) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("create_tenant", e))?;

        sqlx::query("INSERT INTO tenants (id, name, slug, created_at) VALUES ($1, $2, $3, $4)")
            .bind(tenant.id.as_uuid())
            .bind(&tenant.name)
            .bind(&tenant.slug)
            .bind(tenant.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("create_tenant", e))?;

        sqlx::query("INSERT INTO billing_accounts (tenant_id, stripe_customer_id, created_at) VALUES ($1, NULL, $2)")
            .bind(tenant.id.as_uuid())
            .bind(tenant.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("create_tenant", e))?;

        tx.commit().await.map_err(|e| map_sqlx_error("create_tenant", e))
    }

    async fn find_tenant(&self, tenant_id: TenantId) -> StoreResult<Option<TenantRecord>> {
        let row = sqlx::query("SELECT id, name, slug, created_at FROM tenants WHERE id = $1")
            .bind(tenant_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_tenant", e))?;
        map_optional("find_tenant", row, tenant_from_row)
    }

    async fn find_tenant_by_slug(&self, slug: &str) -> StoreResult<Option<TenantRecord>> {
        let row = sqlx::query("SELECT id, name, slug, created_at FROM tenants WHERE slug = $1")
            .bind(slug)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_tenant_by_slug", e))?;
        map_optional("find_tenant_by_slug", row, tenant_from_row)
    }

    async fn tenant_stats(&self, tenant_id: TenantId) -> StoreResult<TenantStats> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM memberships WHERE tenant_id = $1) AS members,
                (SELECT COUNT(*) FROM projects WHERE tenant_id = $1) AS projects,
                (SELECT COUNT(*) FROM tasks WHERE tenant_id = $1) AS tasks
            "#,
        )
        .bind(tenant_id.as_uuid())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("tenant_stats", e))?;

        let get = |column: &str| {
            row.try_get::<i64, _>(column)
                .map(count)
                .map_err(|e| map_sqlx_error("tenant_stats", e))
        };
        Ok(TenantStats {
            members: get("members")?,
            projects: get("projects")?,
            tasks: get("tasks")?,
        })
    }
}

#[async_trait]
impl UserRepository for PostgresStore {
    async fn create_user(&self, user: UserRecord) -> StoreResult<()> {
        sqlx::query("INSERT INTO users (id, email, name, password_hash, created_at) VALUES ($1, $2, $3, $4, $5)")
            .bind(user.id.as_uuid())
            .bind(&user.email)
            .bind(&user.name)
            .bind(&user.password_hash)
            .bind(user.created_at)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("create_user", e))?;
        Ok(())
    }

    async fn find_user(&self, user_id: UserId) -> StoreResult<Option<UserRecord>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = $1");
        let row = sqlx::query(&sql)
            .bind(user_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_user", e))?;
        map_optional("find_user", row, |r| user_from_row(r, "u_"))
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.email = $1");
        let row = sqlx::query(&sql)
            .bind(email)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_user_by_email", e))?;
        map_optional("find_user_by_email", row, |r| user_from_row(r, "u_"))
    }
}

#[async_trait]
impl MembershipRepository for PostgresStore {
    async fn upsert_membership(&self, tenant_id: TenantId, user_id: UserId, role: Role) -> StoreResult<MembershipRecord> {
        let row = sqlx::query(
            r#"
            INSERT INTO memberships (id, tenant_id, user_id, role, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (tenant_id, user_id) DO UPDATE SET role = EXCLUDED.role
            RETURNING id, tenant_id, user_id, role, created_at
            "#,
        )
        .bind(MembershipId::new().as_uuid())
        .bind(tenant_id.as_uuid())
        .bind(user_id.as_uuid())
        .bind(role.as_str())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("upsert_membership", e))?;
        membership_from_row(&row).map_err(|e| map_sqlx_error("upsert_membership", e))
    }

    async fn find_membership(&self, tenant_id: TenantId, user_id: UserId) -> StoreResult<Option<MembershipRecord>> {
        let row = sqlx::query(
            "SELECT id, tenant_id, user_id, role, created_at FROM memberships WHERE tenant_id = $1 AND user_id = $2",
        )
        .bind(tenant_id.as_uuid())
        .bind(user_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_membership", e))?;
        map_optional("find_membership", row, membership_from_row)
    }

    async fn list_memberships(&self, tenant_id: TenantId) -> StoreResult<Vec<(MembershipRecord, UserRecord)>> {
        let sql = format!(
            r#"
            SELECT m.id, m.tenant_id, m.user_id, m.role, m.created_at, {USER_COLUMNS}
            FROM memberships m
            JOIN users u ON u.id = m.user_id
            WHERE m.tenant_id = $1
            ORDER BY m.created_at ASC
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(tenant_id.as_uuid())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_memberships", e))?;
        map_rows("list_memberships", rows, |r| {
            Ok((membership_from_row(r)?, user_from_row(r, "u_")?))
        })
    }
}

#[async_trait]
impl ProjectRepository for PostgresStore {
    #[instrument(skip(self, project, boards, members), fields(tenant_id = %project.tenant_id, project_id = %project.id), err)]
    async fn create_project(
        &self,
        project: ProjectRecord,
        boards: Vec<BoardRecord>,
        members: Vec<ProjectMemberRecord>,
    ) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("create_project", e))?;

        sqlx::query(
            "INSERT INTO projects (id, tenant_id, name, description, created_by_id, created_at) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(project.id.as_uuid())
        .bind(project.tenant_id.as_uuid())
        .bind(&project.name)
        .bind(&project.description)
        .bind(project.created_by_id.as_uuid())
        .bind(project.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("create_project", e))?;

        for board in &boards {
            sqlx::query(
                "INSERT INTO boards (id, tenant_id, project_id, name, position, created_at) VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(board.id.as_uuid())
            .bind(board.tenant_id.as_uuid())
            .bind(board.project_id.as_uuid())
            .bind(&board.name)
            .bind(board.position)
            .bind(board.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("create_project", e))?;
        }

        for member in &members {
            sqlx::query(
                "INSERT INTO project_members (id, tenant_id, project_id, user_id, role, created_at) VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(member.id.as_uuid())
            .bind(member.tenant_id.as_uuid())
            .bind(member.project_id.as_uuid())
            .bind(member.user_id.as_uuid())
            .bind(member.role.as_str())
            .bind(member.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("create_project", e))?;
        }

        tx.commit().await.map_err(|e| map_sqlx_error("create_project", e))
    }

    async fn list_projects(&self, tenant_id: TenantId, member: Option<UserId>) -> StoreResult<Vec<ProjectWithBoards>> {
        let rows = sqlx::query(
            r#"
            SELECT p.id, p.tenant_id, p.name, p.description, p.created_by_id, p.created_at
            FROM projects p
            WHERE p.tenant_id = $1
              AND ($2::uuid IS NULL OR EXISTS (
                    SELECT 1 FROM project_members pm
                    WHERE pm.tenant_id = p.tenant_id AND pm.project_id = p.id AND pm.user_id = $2
              ))
            ORDER BY p.created_at ASC
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(member.map(|m| *m.as_uuid()))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_projects", e))?;
        let projects = map_rows("list_projects", rows, project_from_row)?;

        let ids: Vec<Uuid> = projects.iter().map(|p| *p.id.as_uuid()).collect();
        let board_rows = sqlx::query(
            r#"
            SELECT id, tenant_id, project_id, name, position, created_at
            FROM boards
            WHERE tenant_id = $1 AND project_id = ANY($2)
            ORDER BY position ASC
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(&ids)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_projects", e))?;

        let mut boards: HashMap<ProjectId, Vec<BoardRecord>> = HashMap::new();
        for board in map_rows("list_projects", board_rows, board_from_row)? {
            boards.entry(board.project_id).or_default().push(board);
        }

        Ok(projects
            .into_iter()
            .map(|project| ProjectWithBoards {
                boards: boards.remove(&project.id).unwrap_or_default(),
                project,
            })
            .collect())
    }

    async fn find_project(&self, tenant_id: TenantId, project_id: ProjectId) -> StoreResult<Option<ProjectRecord>> {
        let row = sqlx::query(
            "SELECT id, tenant_id, name, description, created_by_id, created_at FROM projects WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant_id.as_uuid())
        .bind(project_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_project", e))?;
        map_optional("find_project", row, project_from_row)
    }

    async fn find_board(&self, tenant_id: TenantId, board_id: BoardId) -> StoreResult<Option<BoardRecord>> {
        let row = sqlx::query(
            "SELECT id, tenant_id, project_id, name, position, created_at FROM boards WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant_id.as_uuid())
        .bind(board_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_board", e))?;
        map_optional("find_board", row, board_from_row)
    }

    async fn find_project_member(
        &self,
        tenant_id: TenantId,
        project_id: ProjectId,
        user_id: UserId,
    ) -> StoreResult<Option<ProjectMemberRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, tenant_id, project_id, user_id, role, created_at
            FROM project_members
            WHERE tenant_id = $1 AND project_id = $2 AND user_id = $3
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(project_id.as_uuid())
        .bind(user_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_project_member", e))?;
        map_optional("find_project_member", row, project_member_from_row)
    }

    async fn list_project_members(
        &self,
        tenant_id: TenantId,
        project_id: ProjectId,
    ) -> StoreResult<Vec<(ProjectMemberRecord, UserRecord)>> {
        let sql = format!(
            r#"
            SELECT pm.id, pm.tenant_id, pm.project_id, pm.user_id, pm.role, pm.created_at, {USER_COLUMNS}
            FROM project_members pm
            JOIN users u ON u.id = pm.user_id
            WHERE pm.tenant_id = $1 AND pm.project_id = $2
            ORDER BY pm.created_at ASC
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(tenant_id.as_uuid())
            .bind(project_id.as_uuid())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_project_members", e))?;
        map_rows("list_project_members", rows, |r| {
            Ok((project_member_from_row(r)?, user_from_row(r, "u_")?))
        })
    }

    async fn upsert_project_member(
        &self,
        tenant_id: TenantId,
        project_id: ProjectId,
        user_id: UserId,
        role: Role,
    ) -> StoreResult<ProjectMemberRecord> {
        let row = sqlx::query(
            r#"
            INSERT INTO project_members (id, tenant_id, project_id, user_id, role, created_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            ON CONFLICT (project_id, user_id) DO UPDATE SET role = EXCLUDED.role
            RETURNING id, tenant_id, project_id, user_id, role, created_at
            "#,
        )
        .bind(ProjectMemberId::new().as_uuid())
        .bind(tenant_id.as_uuid())
        .bind(project_id.as_uuid())
        .bind(user_id.as_uuid())
        .bind(role.as_str())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("upsert_project_member", e))?;
        project_member_from_row(&row).map_err(|e| map_sqlx_error("upsert_project_member", e))
    }

    async fn remove_project_member(&self, tenant_id: TenantId, project_id: ProjectId, user_id: UserId) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM project_members WHERE tenant_id = $1 AND project_id = $2 AND user_id = $3")
            .bind(tenant_id.as_uuid())
            .bind(project_id.as_uuid())
            .bind(user_id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("remove_project_member", e))?;
        Ok(result.rows_affected())
    }

    async fn delete_project_tasks(&self, tenant_id: TenantId, project_id: ProjectId) -> StoreResult<u64> {
        self.delete_scoped("delete_project_tasks", "DELETE FROM tasks WHERE tenant_id = $1 AND project_id = $2", tenant_id, project_id)
            .await
    }

    async fn delete_project_members(&self, tenant_id: TenantId, project_id: ProjectId) -> StoreResult<u64> {
        self.delete_scoped(
            "delete_project_members",
            "DELETE FROM project_members WHERE tenant_id = $1 AND project_id = $2",
            tenant_id,
            project_id,
        )
        .await
    }

    async fn delete_project_boards(&self, tenant_id: TenantId, project_id: ProjectId) -> StoreResult<u64> {
        self.delete_scoped("delete_project_boards", "DELETE FROM boards WHERE tenant_id = $1 AND project_id = $2", tenant_id, project_id)
            .await
    }

    async fn delete_project(&self, tenant_id: TenantId, project_id: ProjectId) -> StoreResult<u64> {
        self.delete_scoped("delete_project", "DELETE FROM projects WHERE tenant_id = $1 AND id = $2", tenant_id, project_id)
            .await
    }
}

impl PostgresStore {
    async fn delete_scoped(
        &self,
        operation: &str,
        sql: &'static str,
        tenant_id: TenantId,
        project_id: ProjectId,
    ) -> StoreResult<u64> {
        let result = sqlx::query(sql)
            .bind(tenant_id.as_uuid())
            .bind(project_id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        Ok(result.rows_affected())
    }
}

const TASK_COLUMNS: &str = "id, tenant_id, project_id, board_id, title, description, status, assignee_id, created_by_id, due_date, created_at, updated_at";

#[async_trait]
impl TaskRepository for PostgresStore {
    async fn create_task(&self, task: TaskRecord) -> StoreResult<()> {
        let sql = format!("INSERT INTO tasks ({TASK_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)");
        sqlx::query(&sql)
            .bind(task.id.as_uuid())
            .bind(task.tenant_id.as_uuid())
            .bind(task.project_id.as_uuid())
            .bind(task.board_id.as_uuid())
            .bind(&task.title)
            .bind(&task.description)
            .bind(task.status.as_str())
            .bind(task.assignee_id.map(|u| *u.as_uuid()))
            .bind(task.created_by_id.as_uuid())
            .bind(task.due_date)
            .bind(task.created_at)
            .bind(task.updated_at)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("create_task", e))?;
        Ok(())
    }

    async fn find_task(&self, tenant_id: TenantId, task_id: TaskId) -> StoreResult<Option<TaskRecord>> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE tenant_id = $1 AND id = $2");
        let row = sqlx::query(&sql)
            .bind(tenant_id.as_uuid())
            .bind(task_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_task", e))?;
        map_optional("find_task", row, task_from_row)
    }

    async fn update_task(&self, task: &TaskRecord) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE tasks
            SET title = $3, description = $4, status = $5, assignee_id = $6, due_date = $7, updated_at = $8
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(task.tenant_id.as_uuid())
        .bind(task.id.as_uuid())
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.status.as_str())
        .bind(task.assignee_id.map(|u| *u.as_uuid()))
        .bind(task.due_date)
        .bind(task.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_task", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(TASK_NOT_FOUND));
        }
        Ok(())
    }

    async fn delete_task(&self, tenant_id: TenantId, task_id: TaskId) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM tasks WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id.as_uuid())
            .bind(task_id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_task", e))?;
        Ok(result.rows_affected())
    }

    async fn list_project_tasks(&self, tenant_id: TenantId, project_id: ProjectId) -> StoreResult<Vec<TaskRecord>> {
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE tenant_id = $1 AND project_id = $2 ORDER BY created_at DESC, id DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(tenant_id.as_uuid())
            .bind(project_id.as_uuid())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_project_tasks", e))?;
        map_rows("list_project_tasks", rows, task_from_row)
    }
}

#[async_trait]
impl AuditRepository for PostgresStore {
    async fn append_audit(&self, record: AuditRecord) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (id, tenant_id, actor_id, action, entity_type, entity_id, metadata, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(record.tenant_id.as_uuid())
        .bind(record.actor_id.as_uuid())
        .bind(&record.action)
        .bind(&record.entity_type)
        .bind(&record.entity_id)
        .bind(&record.metadata)
        .bind(record.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("append_audit", e))?;
        Ok(())
    }

    async fn list_audit(&self, tenant_id: TenantId, limit: usize) -> StoreResult<Vec<AuditRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, tenant_id, actor_id, action, entity_type, entity_id, metadata, created_at
            FROM audit_logs
            WHERE tenant_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_audit", e))?;
        map_rows("list_audit", rows, audit_from_row)
    }
}

#[async_trait]
impl BillingRepository for PostgresStore {
    async fn find_billing_account(&self, tenant_id: TenantId) -> StoreResult<Option<BillingAccountRecord>> {
        let row = sqlx::query("SELECT tenant_id, stripe_customer_id, created_at FROM billing_accounts WHERE tenant_id = $1")
            .bind(tenant_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_billing_account", e))?;
        map_optional("find_billing_account", row, |r| {
            Ok(BillingAccountRecord {
                tenant_id: TenantId::from_uuid(r.try_get("tenant_id")?),
                stripe_customer_id: r.try_get("stripe_customer_id")?,
                created_at: r.try_get("created_at")?,
            })
        })
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => StoreError::Backend(format!("connection pool closed in {}", operation)),
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}
