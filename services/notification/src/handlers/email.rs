//! Send-or-store email endpoint.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use stratus_models::EmailRequest;
use stratus_utils::{validate_email_list, validate_model, NotifyError};

use crate::dispatch::Outcome;
use crate::extractors::CurrentUser;
use crate::AppState;

/// Send email request body.
#[derive(Debug, Deserialize, Validate)]
pub struct SendEmailRequest {
    /// Template key selecting the email body.
    pub key: String,
    pub subject: String,
    /// Free-form data merged into the template.
    pub body_data: serde_json::Value,
    /// Recipient addresses; the first entry is the primary recipient.
    #[validate(custom = "validate_email_list")]
    pub email: Vec<String>,
    #[validate(custom = "validate_email_list")]
    pub bcc: Option<Vec<String>>,
    /// When present, the email is stored and delivered by the sweep.
    pub delayed_send: Option<DateTime<Utc>>,
}

impl SendEmailRequest {
    fn into_email_request(self, user_id: Uuid) -> EmailRequest {
        EmailRequest {
            template_key: self.key,
            subject: self.subject,
            body: self.body_data,
            recipients: self.email,
            bcc: self.bcc,
            send_at: self.delayed_send,
            user_id,
        }
    }
}

pub async fn send_or_store_email(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<SendEmailRequest>,
) -> Result<impl IntoResponse, NotifyError> {
    validate_model(&request)?;
    tracing::info!(user_id = %user.id, subject = %request.subject, "received send email request");

    let outcome = state
        .dispatcher
        .send_or_store(request.into_email_request(user.id))
        .await?;

    Ok(match outcome {
        Outcome::Stored(_) => (StatusCode::ACCEPTED, "Email will be sent later."),
        Outcome::SentImmediately => (StatusCode::OK, "Email sent immediately."),
    })
}
