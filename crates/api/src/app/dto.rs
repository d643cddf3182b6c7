use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

use workboard_auth::{Permission, Role};
use workboard_core::{MembershipId, ProjectMemberId, TaskStatus, TenantId, UserId};
use workboard_infra::store::{MembershipRecord, ProjectMemberRecord, TenantRecord, TenantStats, UserRecord};

use crate::app::errors::ApiError;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[validate(length(min = 2))]
    pub tenant_name: String,
    #[validate(length(min = 2))]
    pub tenant_slug: String,
    #[validate(length(min = 2))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8))]
    pub password: String,
    #[validate(length(min = 2))]
    pub tenant_slug: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct InviteRequest {
    #[validate(length(min = 2))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    pub role: Role,
    #[validate(length(min = 8))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectRequest {
    #[validate(length(min = 2))]
    pub name: String,
    pub description: Option<String>,
}

/// `userId` stays a raw string so a missing or malformed id is a 400 from the
/// handler rather than a body rejection.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddProjectMemberRequest {
    pub user_id: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub board_id: String,
    #[validate(length(min = 2))]
    pub title: String,
    pub description: Option<String>,
    pub assignee_id: Option<String>,
    pub due_date: Option<String>,
}

/// Absent fields are left alone; `assigneeId: null` / `dueDate: null` clear.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    pub status: Option<TaskStatus>,
    #[validate(length(min = 2))]
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub assignee_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub due_date: Option<Option<String>>,
}

/// Distinguishes an explicit `null` (`Some(None)`) from an absent field (`None`).
fn nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub role: Role,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WhoamiResponse {
    pub user_id: UserId,
    pub tenant_id: TenantId,
    pub role: Role,
    pub permissions: Vec<Permission>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: UserId,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl UserSummary {
    pub fn brief(user: &UserRecord) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            created_at: None,
        }
    }

    pub fn full(user: &UserRecord) -> Self {
        Self {
            created_at: Some(user.created_at),
            ..Self::brief(user)
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberView {
    pub id: MembershipId,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    pub user: UserSummary,
}

impl MemberView {
    pub fn listed(membership: &MembershipRecord, user: &UserRecord) -> Self {
        Self {
            id: membership.id,
            role: membership.role,
            created_at: Some(membership.created_at),
            user: UserSummary::full(user),
        }
    }

    pub fn invited(membership: &MembershipRecord, user: &UserRecord) -> Self {
        Self {
            id: membership.id,
            role: membership.role,
            created_at: None,
            user: UserSummary::brief(user),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMemberView {
    pub id: ProjectMemberId,
    pub role: Role,
    pub user: UserSummary,
}

impl ProjectMemberView {
    pub fn new(member: &ProjectMemberRecord, user: &UserRecord) -> Self {
        Self {
            id: member.id,
            role: member.role,
            user: UserSummary::brief(user),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantOverview {
    pub id: TenantId,
    pub name: String,
    pub slug: String,
    pub members: u64,
    pub projects: u64,
    pub tasks: u64,
    pub created_at: DateTime<Utc>,
}

impl TenantOverview {
    pub fn new(tenant: TenantRecord, stats: TenantStats) -> Self {
        Self {
            id: tenant.id,
            name: tenant.name,
            slug: tenant.slug,
            members: stats.members,
            projects: stats.projects,
            tasks: stats.tasks,
            created_at: tenant.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

impl OkResponse {
    pub fn ok() -> Self {
        Self { ok: true }
    }
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub url: String,
}

// -------------------------
// Mapping helpers
// -------------------------

/// Accepts RFC 3339 timestamps and bare `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_due_date(raw: &str) -> Result<DateTime<Utc>, ApiError> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| ApiError::validation(format!("dueDate '{raw}' is not an RFC 3339 timestamp or YYYY-MM-DD date")))
}
