//! # Stratus Core Domain Models
//!
//! Core domain models for the Stratus notification service. All models
//! implement serialization/deserialization with serde; the persisted ones
//! map to their PostgreSQL rows with sqlx.
//!
//! ## Key Models
//!
//! - **User**: a registered account, the owning side of every scheduled email
//! - **EmailRequest**: a normalized send request, built per API call
//! - **PendingEmail**: a scheduled email persisted until its due time
//! - **ComposedMessage**: the transport-ready payload after template
//!   resolution and recipient splitting

pub mod email;
pub mod user;

pub use email::*;
pub use user::*;
