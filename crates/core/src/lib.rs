//! `workboard-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod error;
pub mod id;
pub mod task;

pub use error::DomainError;
pub use id::{AuditLogId, BoardId, MembershipId, ProjectId, ProjectMemberId, TaskId, TenantId, UserId};
pub use task::TaskStatus;
