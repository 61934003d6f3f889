//! SMTP Client
//!
//! Email delivery via SMTP using lettre. Implements the dispatch engine's
//! transport seam; one outbound call per message, no retries here.

use lettre::message::{header::ContentType, Mailbox, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use stratus_models::ComposedMessage;
use stratus_utils::{EmailConfig, NotifyError, NotifyResult};

use crate::dispatch::EmailTransport;

#[derive(Clone)]
pub struct SmtpClient {
    config: EmailConfig,
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpClient {
    pub fn new(config: EmailConfig) -> NotifyResult<Self> {
        let creds = Credentials::new(config.smtp_username.clone(), config.smtp_password.clone());

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| {
                NotifyError::configuration(format!("failed to create SMTP transport: {}", e))
            })?
            .port(config.smtp_port)
            .credentials(creds)
            .build();

        Ok(Self { config, mailer })
    }

    fn build_message(&self, msg: &ComposedMessage) -> NotifyResult<Message> {
        let from: Mailbox = format!("{} <{}>", self.config.from_name, msg.from)
            .parse()
            .map_err(|e| NotifyError::transport(format!("invalid sender address: {}", e)))?;

        let to: Mailbox = msg
            .to
            .parse()
            .map_err(|e| NotifyError::transport(format!("invalid recipient address: {}", e)))?;

        let mut builder = Message::builder()
            .from(from)
            .to(to)
            .subject(msg.subject.as_str());

        for cc in &msg.cc {
            let mailbox: Mailbox = cc
                .parse()
                .map_err(|e| NotifyError::transport(format!("invalid CC address: {}", e)))?;
            builder = builder.cc(mailbox);
        }

        for bcc in &msg.bcc {
            let mailbox: Mailbox = bcc
                .parse()
                .map_err(|e| NotifyError::transport(format!("invalid BCC address: {}", e)))?;
            builder = builder.bcc(mailbox);
        }

        builder
            .singlepart(
                SinglePart::builder()
                    .header(ContentType::TEXT_HTML)
                    .body(msg.html.clone()),
            )
            .map_err(|e| NotifyError::transport(format!("failed to build email: {}", e)))
    }
}

impl EmailTransport for SmtpClient {
    async fn send(&self, msg: &ComposedMessage) -> NotifyResult<()> {
        let email = self.build_message(msg)?;

        if self.config.sandbox {
            tracing::info!(
                to = %msg.to,
                subject = %msg.subject,
                "sandbox mode enabled, skipping SMTP delivery"
            );
            return Ok(());
        }

        self.mailer
            .send(email)
            .await
            .map_err(|e| NotifyError::transport(e.to_string()))?;

        Ok(())
    }
}
