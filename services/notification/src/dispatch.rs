//! Email Dispatch Engine
//!
//! Decides immediate-vs-deferred for each send request, composes the
//! transport payload and runs the periodic sweep over due scheduled emails.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use uuid::Uuid;

use stratus_database::EmailRepository;
use stratus_models::{ComposedMessage, EmailRequest, PendingEmail};
use stratus_utils::{EmailConfig, NotifyError, NotifyResult};

use crate::template_engine::TemplateEngine;

/// Persistence seam for scheduled emails.
pub trait PendingEmailStore: Send + Sync + Clone + 'static {
    fn persist(
        &self,
        request: &EmailRequest,
    ) -> impl Future<Output = NotifyResult<PendingEmail>> + Send;

    fn find_due_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> impl Future<Output = NotifyResult<Vec<PendingEmail>>> + Send;

    fn delete(&self, id: Uuid) -> impl Future<Output = NotifyResult<()>> + Send;
}

/// Transport seam. One outbound call per composed message, no retries.
pub trait EmailTransport: Send + Sync + Clone + 'static {
    fn send(&self, msg: &ComposedMessage) -> impl Future<Output = NotifyResult<()>> + Send;
}

/// How a send request was handled.
#[derive(Debug)]
pub enum Outcome {
    /// The message went out through the transport right away.
    SentImmediately,
    /// The request was persisted for the sweep to deliver later.
    Stored(PendingEmail),
}

/// Email dispatch engine.
#[derive(Clone)]
pub struct EmailDispatcher<S, T> {
    store: S,
    transport: T,
    templates: Arc<TemplateEngine>,
    from_address: String,
}

impl<S: PendingEmailStore, T: EmailTransport> EmailDispatcher<S, T> {
    pub fn new(store: S, transport: T, templates: Arc<TemplateEngine>, config: &EmailConfig) -> Self {
        Self {
            store,
            transport,
            templates,
            from_address: config.from_address.clone(),
        }
    }

    /// Store the request for later delivery when it carries a send-at
    /// timestamp, otherwise send it right away.
    ///
    /// A send-at in the past is accepted; the next sweep picks it up.
    pub async fn send_or_store(&self, request: EmailRequest) -> NotifyResult<Outcome> {
        self.validate(&request)?;

        if request.send_at.is_some() {
            let stored = self.store.persist(&request).await?;
            return Ok(Outcome::Stored(stored));
        }

        self.send_immediately(&request).await?;
        Ok(Outcome::SentImmediately)
    }

    fn validate(&self, request: &EmailRequest) -> NotifyResult<()> {
        if request.recipients.is_empty() {
            return Err(NotifyError::NoRecipient);
        }
        if request.template_key.is_empty() {
            return Err(NotifyError::MissingTemplateKey);
        }
        if !self.templates.has_template(&request.template_key) {
            return Err(NotifyError::template_not_found(&request.template_key));
        }
        Ok(())
    }

    /// Compose and send one message through the transport. Failures are
    /// logged with their request context before they propagate.
    async fn send_immediately(&self, request: &EmailRequest) -> NotifyResult<()> {
        let result: NotifyResult<()> = async {
            let msg = self.compose(request)?;
            self.transport.send(&msg).await
        }
        .await;

        if let Err(error) = &result {
            tracing::error!(
                subject = %request.subject,
                user_id = %request.user_id,
                %error,
                "send email failed"
            );
        }

        result
    }

    /// The first recipient is always the primary `to` address; every
    /// remaining recipient becomes a CC.
    fn compose(&self, request: &EmailRequest) -> NotifyResult<ComposedMessage> {
        let (to, cc) = request
            .recipients
            .split_first()
            .ok_or(NotifyError::NoRecipient)?;

        let html = self.templates.render(&request.template_key, &request.body)?;

        Ok(ComposedMessage {
            to: to.clone(),
            cc: cc.to_vec(),
            bcc: request.bcc.clone().unwrap_or_default(),
            from: self.from_address.clone(),
            subject: request.subject.clone(),
            html,
        })
    }

    /// One pass over every due scheduled email.
    ///
    /// Due items are delivered concurrently and each item's outcome is
    /// isolated: a failed send leaves its record in the store for the next
    /// cycle, and never affects the other items. The sweep waits for all
    /// attempts to settle and never fails itself.
    pub async fn run_scheduled_sweep(&self) {
        let due = match self.store.find_due_before(Utc::now()).await {
            Ok(due) => due,
            Err(error) => {
                tracing::error!(%error, "failed to query due scheduled emails");
                return;
            }
        };

        if due.is_empty() {
            return;
        }

        tracing::debug!(count = due.len(), "delivering due scheduled emails");
        join_all(due.into_iter().map(|email| self.deliver_due(email))).await;
    }

    async fn deliver_due(&self, email: PendingEmail) {
        let request = EmailRequest::from(&email);

        let result: NotifyResult<()> = async {
            self.send_immediately(&request).await?;
            self.store.delete(email.id).await
        }
        .await;

        if let Err(error) = result {
            tracing::error!(
                subject = %email.subject,
                user_id = %email.user_id,
                %error,
                "handling scheduled email failed"
            );
        }
    }
}

impl PendingEmailStore for EmailRepository {
    async fn persist(&self, request: &EmailRequest) -> NotifyResult<PendingEmail> {
        self.create(request).await
    }

    async fn find_due_before(&self, cutoff: DateTime<Utc>) -> NotifyResult<Vec<PendingEmail>> {
        EmailRepository::find_due_before(self, cutoff).await
    }

    async fn delete(&self, id: Uuid) -> NotifyResult<()> {
        EmailRepository::delete(self, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    use stratus_utils::AppConfig;

    #[derive(Clone, Default)]
    struct MockStore {
        emails: Arc<Mutex<Vec<PendingEmail>>>,
        persist_calls: Arc<AtomicUsize>,
        fail_queries: Arc<AtomicBool>,
    }

    impl MockStore {
        fn seed_due(&self, recipient: &str) -> Uuid {
            let id = Uuid::new_v4();
            self.emails.lock().unwrap().push(PendingEmail {
                id,
                template_key: "expiration".into(),
                subject: format!("Trial expiry for {}", recipient),
                body: body_data(),
                recipients: vec![recipient.to_string()],
                bcc: None,
                send_at: Utc::now() - chrono::Duration::seconds(5),
                user_id: Uuid::new_v4(),
                created_at: Utc::now(),
            });
            id
        }

        fn stored_ids(&self) -> Vec<Uuid> {
            self.emails.lock().unwrap().iter().map(|e| e.id).collect()
        }
    }

    impl PendingEmailStore for MockStore {
        async fn persist(&self, request: &EmailRequest) -> NotifyResult<PendingEmail> {
            self.persist_calls.fetch_add(1, Ordering::SeqCst);
            let email = PendingEmail {
                id: Uuid::new_v4(),
                template_key: request.template_key.clone(),
                subject: request.subject.clone(),
                body: request.body.clone(),
                recipients: request.recipients.clone(),
                bcc: request.bcc.clone(),
                send_at: request.send_at.expect("persist requires send_at"),
                user_id: request.user_id,
                created_at: Utc::now(),
            };
            self.emails.lock().unwrap().push(email.clone());
            Ok(email)
        }

        async fn find_due_before(&self, cutoff: DateTime<Utc>) -> NotifyResult<Vec<PendingEmail>> {
            if self.fail_queries.load(Ordering::SeqCst) {
                return Err(NotifyError::database("connection reset"));
            }
            Ok(self
                .emails
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.send_at < cutoff)
                .cloned()
                .collect())
        }

        async fn delete(&self, id: Uuid) -> NotifyResult<()> {
            self.emails.lock().unwrap().retain(|e| e.id != id);
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct MockTransport {
        sent: Arc<Mutex<Vec<ComposedMessage>>>,
        failing_recipients: Arc<Mutex<HashSet<String>>>,
    }

    impl MockTransport {
        fn fail_for(&self, recipient: &str) {
            self.failing_recipients
                .lock()
                .unwrap()
                .insert(recipient.to_string());
        }

        fn sent_count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    impl EmailTransport for MockTransport {
        async fn send(&self, msg: &ComposedMessage) -> NotifyResult<()> {
            if self.failing_recipients.lock().unwrap().contains(&msg.to) {
                return Err(NotifyError::transport("provider rejected the message"));
            }
            self.sent.lock().unwrap().push(msg.clone());
            Ok(())
        }
    }

    fn dispatcher() -> (EmailDispatcher<MockStore, MockTransport>, MockStore, MockTransport) {
        let store = MockStore::default();
        let transport = MockTransport::default();
        let engine = EmailDispatcher::new(
            store.clone(),
            transport.clone(),
            Arc::new(TemplateEngine::new()),
            &AppConfig::default().email,
        );
        (engine, store, transport)
    }

    fn body_data() -> serde_json::Value {
        serde_json::json!({
            "id": "dep-42",
            "date": "2024-06-01",
            "link": "https://console.stratus.cloud/dep-42",
        })
    }

    fn request(recipients: Vec<&str>, send_at: Option<DateTime<Utc>>) -> EmailRequest {
        EmailRequest {
            template_key: "expiration".into(),
            subject: "Trial expires soon".into(),
            body: body_data(),
            recipients: recipients.into_iter().map(String::from).collect(),
            bcc: None,
            send_at,
            user_id: Uuid::new_v4(),
        }
    }

    #[tokio::test]
    async fn delayed_request_is_stored_without_transport_calls() {
        let (engine, store, transport) = dispatcher();
        let send_at = Utc::now() + chrono::Duration::hours(1);

        let outcome = engine
            .send_or_store(request(vec!["to@example.com"], Some(send_at)))
            .await
            .unwrap();

        assert!(matches!(outcome, Outcome::Stored(ref stored) if stored.send_at == send_at));
        assert_eq!(store.persist_calls.load(Ordering::SeqCst), 1);
        assert_eq!(transport.sent_count(), 0);
    }

    #[tokio::test]
    async fn past_send_at_is_accepted_and_stored() {
        // A send-at in the past is not rejected; the next sweep delivers it.
        let (engine, store, transport) = dispatcher();
        let send_at = Utc::now() - chrono::Duration::hours(1);

        let outcome = engine
            .send_or_store(request(vec!["to@example.com"], Some(send_at)))
            .await
            .unwrap();

        assert!(matches!(outcome, Outcome::Stored(_)));
        assert_eq!(store.persist_calls.load(Ordering::SeqCst), 1);
        assert_eq!(transport.sent_count(), 0);

        engine.run_scheduled_sweep().await;
        assert_eq!(transport.sent_count(), 1);
        assert!(store.stored_ids().is_empty());
    }

    #[tokio::test]
    async fn immediate_request_sends_once_with_positional_split() {
        let (engine, store, transport) = dispatcher();

        let mut req = request(vec!["a@example.com", "b@example.com", "c@example.com"], None);
        req.bcc = Some(vec!["hidden@example.com".into()]);

        let outcome = engine.send_or_store(req).await.unwrap();

        assert!(matches!(outcome, Outcome::SentImmediately));
        assert_eq!(store.persist_calls.load(Ordering::SeqCst), 0);

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "a@example.com");
        assert_eq!(sent[0].cc, vec!["b@example.com", "c@example.com"]);
        assert_eq!(sent[0].bcc, vec!["hidden@example.com"]);
        assert_eq!(sent[0].from, AppConfig::default().email.from_address);
        assert!(sent[0].html.contains("dep-42"));
    }

    #[tokio::test]
    async fn empty_recipients_fail_regardless_of_other_fields() {
        let (engine, store, transport) = dispatcher();

        let error = engine
            .send_or_store(request(vec![], Some(Utc::now())))
            .await
            .unwrap_err();

        assert!(matches!(error, NotifyError::NoRecipient));
        assert_eq!(store.persist_calls.load(Ordering::SeqCst), 0);
        assert_eq!(transport.sent_count(), 0);
    }

    #[tokio::test]
    async fn empty_template_key_fails() {
        let (engine, _, _) = dispatcher();

        let mut req = request(vec!["to@example.com"], None);
        req.template_key = String::new();

        let error = engine.send_or_store(req).await.unwrap_err();
        assert!(matches!(error, NotifyError::MissingTemplateKey));
    }

    #[tokio::test]
    async fn unregistered_template_key_fails() {
        let (engine, _, transport) = dispatcher();

        let mut req = request(vec!["to@example.com"], None);
        req.template_key = "missing".into();

        let error = engine.send_or_store(req).await.unwrap_err();
        assert!(matches!(error, NotifyError::TemplateNotFound { key } if key == "missing"));
        assert_eq!(transport.sent_count(), 0);
    }

    #[tokio::test]
    async fn transport_failure_propagates_on_the_immediate_path() {
        let (engine, _, transport) = dispatcher();
        transport.fail_for("to@example.com");

        let error = engine
            .send_or_store(request(vec!["to@example.com"], None))
            .await
            .unwrap_err();

        assert!(matches!(error, NotifyError::Transport { .. }));
    }

    #[tokio::test]
    async fn sweep_isolates_individual_failures() {
        let (engine, store, transport) = dispatcher();

        let _first = store.seed_due("one@example.com");
        let second = store.seed_due("two@example.com");
        let _third = store.seed_due("three@example.com");
        transport.fail_for("two@example.com");

        engine.run_scheduled_sweep().await;

        // First and third were sent and removed; the failed one stays for
        // the next cycle.
        assert_eq!(transport.sent_count(), 2);
        assert_eq!(store.stored_ids(), vec![second]);
    }

    #[tokio::test]
    async fn repeated_sweep_sends_nothing_new() {
        let (engine, store, transport) = dispatcher();
        store.seed_due("one@example.com");
        store.seed_due("two@example.com");

        engine.run_scheduled_sweep().await;
        assert_eq!(transport.sent_count(), 2);
        assert!(store.stored_ids().is_empty());

        engine.run_scheduled_sweep().await;
        assert_eq!(transport.sent_count(), 2);
    }

    #[tokio::test]
    async fn retried_item_is_delivered_once_the_transport_recovers() {
        let (engine, store, transport) = dispatcher();
        store.seed_due("flaky@example.com");
        transport.fail_for("flaky@example.com");

        engine.run_scheduled_sweep().await;
        assert_eq!(transport.sent_count(), 0);
        assert_eq!(store.stored_ids().len(), 1);

        transport.failing_recipients.lock().unwrap().clear();

        engine.run_scheduled_sweep().await;
        assert_eq!(transport.sent_count(), 1);
        assert!(store.stored_ids().is_empty());
    }

    #[tokio::test]
    async fn sweep_survives_a_store_query_failure() {
        let (engine, store, transport) = dispatcher();
        store.seed_due("one@example.com");
        store.fail_queries.store(true, Ordering::SeqCst);

        engine.run_scheduled_sweep().await;

        assert_eq!(transport.sent_count(), 0);
        assert_eq!(store.stored_ids().len(), 1);
    }

    proptest! {
        /// The primary/CC split is positional for every recipient list.
        #[test]
        fn prop_primary_cc_split(locals in prop::collection::vec("[a-z]{1,10}", 1..5)) {
            let (engine, _, _) = dispatcher();
            let recipients: Vec<String> = locals
                .iter()
                .map(|local| format!("{}@example.com", local))
                .collect();

            let mut req = request(vec![], None);
            req.recipients = recipients.clone();

            let msg = engine.compose(&req).unwrap();
            prop_assert_eq!(&msg.to, &recipients[0]);
            prop_assert_eq!(&msg.cc[..], &recipients[1..]);
        }
    }
}
