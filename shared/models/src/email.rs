use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A normalized email send request, built per API call.
///
/// `send_at` decides the path: present means the request is persisted as a
/// [`PendingEmail`] and delivered by the sweep, absent means immediate send.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailRequest {
    pub template_key: String,
    pub subject: String,
    /// Free-form template data, shape is template-specific.
    pub body: serde_json::Value,
    pub recipients: Vec<String>,
    pub bcc: Option<Vec<String>>,
    pub send_at: Option<DateTime<Utc>>,
    pub user_id: Uuid,
}

/// A scheduled email persisted until its due time.
///
/// Created when a send request carries a `send_at`, selected by the sweep
/// once due, deleted after a successful send. Never mutated otherwise.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PendingEmail {
    pub id: Uuid,
    pub template_key: String,
    pub subject: String,
    pub body: serde_json::Value,
    pub recipients: Vec<String>,
    pub bcc: Option<Vec<String>>,
    pub send_at: DateTime<Utc>,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl From<&PendingEmail> for EmailRequest {
    fn from(email: &PendingEmail) -> Self {
        Self {
            template_key: email.template_key.clone(),
            subject: email.subject.clone(),
            body: email.body.clone(),
            recipients: email.recipients.clone(),
            bcc: email.bcc.clone(),
            send_at: Some(email.send_at),
            user_id: email.user_id,
        }
    }
}

/// The transport-ready payload after template resolution.
///
/// The first entry of the request's recipient list is always the primary
/// `to` address, every remaining entry becomes a CC.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComposedMessage {
    pub to: String,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub from: String,
    pub subject: String,
    pub html: String,
}
