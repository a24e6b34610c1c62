//! One interactive session: the `submit` path from question to answer.
//!
//! ```text
//! question --> cache hit? --yes--------------------------------> answer
//!                  | no
//!                  v
//!          ModelSelector --> RetryPolicy --> LlmProvider
//!                                 |
//!                 ok: cache + transcript    exhausted: fallback text
//! ```
//!
//! A session owns its ledger. Ending the session (dropping it) discards the
//! transcript, cache and counts; nothing is shared between sessions except
//! the provider handle.

use std::sync::Arc;

use chrono::{DateTime, Local};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::error::RetryError;
use crate::ledger::Ledger;
use crate::llm::LlmProvider;
use crate::retry::{RetryPolicy, RetryWarning, FALLBACK_MESSAGE};
use crate::selector::ModelSelector;
use crate::types::{ChatRequest, Message};

/// Notifications for the front-end while a question is in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    RetryWarning(RetryWarning),
    /// Every attempt failed; the fallback text was returned.
    Fallback { question: String, attempts: u32 },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Non-blank `submit` calls.
    pub submissions: u64,
    pub cache_hits: u64,
    /// Provider attempts, successful or not.
    pub provider_calls: u64,
    pub fallbacks: u64,
}

pub struct Session {
    id: String,
    started_at: DateTime<Local>,
    provider: Arc<dyn LlmProvider>,
    retry: RetryPolicy,
    selector: ModelSelector,
    system_prompt: Option<String>,
    ledger: Ledger,
    stats: SessionStats,
    events: Option<mpsc::UnboundedSender<SessionEvent>>,
}

impl Session {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        retry: RetryPolicy,
        selector: ModelSelector,
        system_prompt: Option<String>,
    ) -> Self {
        let id = generate_session_id();
        info!(
            session = %id,
            provider = provider.name(),
            max_attempts = retry.max_attempts(),
            "Session started"
        );
        Self {
            id,
            started_at: Local::now(),
            provider,
            retry,
            selector,
            system_prompt: system_prompt.filter(|p| !p.trim().is_empty()),
            ledger: Ledger::new(),
            stats: SessionStats::default(),
            events: None,
        }
    }

    pub fn from_config(provider: Arc<dyn LlmProvider>, config: &AppConfig) -> Self {
        Self::new(
            provider,
            RetryPolicy::from_config(&config.retry),
            ModelSelector::from_config(config),
            config.assistant.system_prompt.clone(),
        )
    }

    /// Deliver retry warnings and fallbacks to `tx` as they happen.
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Ask a question. Blank input is ignored and returns `None`.
    ///
    /// Never fails: when the provider cannot be reached the answer is
    /// [`FALLBACK_MESSAGE`]. Fallback answers are recorded in the transcript
    /// but not cached.
    #[tracing::instrument(skip(self, question), fields(session = %self.id))]
    pub async fn submit(&mut self, question: &str) -> Option<String> {
        if question.trim().is_empty() {
            return None;
        }
        self.stats.submissions += 1;

        if let Some(answer) = self.ledger.cached(question).map(str::to_string) {
            let count = self.ledger.record_query(question);
            self.stats.cache_hits += 1;
            debug!(count, "Answered from cache");
            return Some(answer);
        }

        self.ledger.append(Message::user(question));
        let request = self.build_request(question);

        let events = self.events.clone();
        let mut on_warning = move |warning: RetryWarning| {
            if let Some(tx) = &events {
                let _ = tx.send(SessionEvent::RetryWarning(warning));
            }
        };
        let result = self
            .retry
            .run(self.provider.as_ref(), &request, &mut on_warning)
            .await;

        let answer = match result {
            Ok(done) => {
                self.stats.provider_calls += u64::from(done.attempts);
                info!(
                    requested = %request.model,
                    served = done.response.model.as_deref().unwrap_or("(unreported)"),
                    attempts = done.attempts,
                    "Completion received"
                );
                self.ledger.cache_answer(question, done.response.content.clone());
                done.response.content
            }
            Err(err) => self.fallback(question, err),
        };

        self.ledger.append(Message::assistant(answer.clone()));
        self.ledger.record_query(question);
        Some(answer)
    }

    /// Turn exhausted retries into the user-facing fallback answer.
    fn fallback(&mut self, question: &str, err: RetryError) -> String {
        let RetryError::Exhausted { attempts, last } = err;
        self.stats.provider_calls += u64::from(attempts);
        self.stats.fallbacks += 1;
        warn!(attempts, error = %last, "Giving up, returning fallback answer");
        if let Some(tx) = &self.events {
            let _ = tx.send(SessionEvent::Fallback {
                question: question.to_string(),
                attempts,
            });
        }
        FALLBACK_MESSAGE.to_string()
    }

    /// System prompt followed by the whole transcript.
    fn build_request(&self, question: &str) -> ChatRequest {
        let mut messages = Vec::with_capacity(self.ledger.transcript().len() + 1);
        if let Some(prompt) = &self.system_prompt {
            messages.push(Message::system(prompt.clone()));
        }
        messages.extend_from_slice(self.ledger.transcript());
        ChatRequest {
            model: self.selector.select_model(question).to_string(),
            messages,
        }
    }

    pub fn transcript(&self) -> &[Message] {
        self.ledger.transcript()
    }

    pub fn trending(&self, limit: usize) -> Vec<(String, u64)> {
        self.ledger.trending(limit)
    }

    #[cfg(test)]
    pub fn query_count(&self, question: &str) -> u64 {
        self.ledger.query_count(question)
    }

    pub fn cache_len(&self) -> usize {
        self.ledger.cache_len()
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    /// End this session and start an empty one with the same settings.
    pub fn restart(self) -> Self {
        info!(session = %self.id, submissions = self.stats.submissions, "Session ended");
        let mut next = Self::new(self.provider, self.retry, self.selector, self.system_prompt);
        next.events = self.events;
        next
    }
}

pub fn generate_session_id() -> String {
    uuid::Uuid::new_v4().to_string()[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::tests::ScriptedProvider;
    use crate::types::Role;
    use std::time::Duration;

    fn session_with(provider: Arc<ScriptedProvider>) -> Session {
        Session::new(
            provider,
            RetryPolicy::new(3, Duration::ZERO),
            ModelSelector::new(["nclex", "priority intervention"], "fast", "deep"),
            Some("You are MilenAI.".to_string()),
        )
    }

    #[test]
    fn test_generate_session_id() {
        let id = generate_session_id();
        assert_eq!(id.len(), 8);
    }

    #[tokio::test]
    async fn test_blank_question_is_noop() {
        let provider = Arc::new(ScriptedProvider::always_ok());
        let mut session = session_with(provider.clone());
        assert_eq!(session.submit("   \n").await, None);
        assert_eq!(session.submit("").await, None);
        assert!(session.transcript().is_empty());
        assert_eq!(session.stats().submissions, 0);
        assert_eq!(session.query_count(""), 0);
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_repeated_question_hits_cache() {
        let provider = Arc::new(ScriptedProvider::always_ok());
        let mut session = session_with(provider.clone());

        for _ in 0..3 {
            let answer = session.submit("abg interpretation?").await.unwrap();
            assert_eq!(answer, "answer #1");
        }

        assert_eq!(provider.call_count(), 1);
        assert_eq!(session.query_count("abg interpretation?"), 3);
        assert_eq!(session.cache_len(), 1);
        // Only the first submission reaches the transcript.
        assert_eq!(session.transcript().len(), 2);
        assert_eq!(session.stats().cache_hits, 2);
    }

    #[tokio::test]
    async fn test_transcript_grows_two_per_question_in_order() {
        let provider = Arc::new(ScriptedProvider::always_ok());
        let mut session = session_with(provider.clone());
        let questions = ["q1", "q2", "q3"];
        for q in questions {
            session.submit(q).await;
        }

        let transcript = session.transcript();
        assert_eq!(transcript.len(), 2 * questions.len());
        for (i, q) in questions.iter().enumerate() {
            assert_eq!(transcript[2 * i], Message::user(*q));
            assert_eq!(
                transcript[2 * i + 1],
                Message::assistant(format!("answer #{}", i + 1))
            );
        }
    }

    #[tokio::test]
    async fn test_request_carries_system_prompt_and_history() {
        let provider = Arc::new(ScriptedProvider::always_ok());
        let mut session = session_with(provider.clone());
        session.submit("What are normal vital signs?").await;
        session.submit("NCLEX practice: sepsis priority?").await;

        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests[0].model, "fast");
        assert_eq!(requests[0].messages.len(), 2);
        assert_eq!(requests[0].messages[0], Message::system("You are MilenAI."));

        assert_eq!(requests[1].model, "deep");
        let roles: Vec<Role> = requests[1].messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::User]
        );
    }

    #[tokio::test]
    async fn test_exhausted_retries_return_fallback() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut session = session_with(provider.clone()).with_events(tx);

        let answer = session.submit("heparin dosing?").await.unwrap();
        assert_eq!(answer, FALLBACK_MESSAGE);
        assert_eq!(provider.call_count(), 3);

        // Recorded in the transcript, not cached, still counted.
        assert_eq!(
            session.transcript(),
            &[Message::user("heparin dosing?"), Message::assistant(FALLBACK_MESSAGE)]
        );
        assert_eq!(session.cache_len(), 0);
        assert_eq!(session.query_count("heparin dosing?"), 1);
        assert_eq!(session.stats().fallbacks, 1);
        assert_eq!(session.stats().provider_calls, 3);

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert_eq!(events.len(), 4);
        assert!(matches!(
            events[0],
            SessionEvent::RetryWarning(RetryWarning { attempt: 1, max_attempts: 3, .. })
        ));
        assert_eq!(
            events[3],
            SessionEvent::Fallback {
                question: "heparin dosing?".to_string(),
                attempts: 3
            }
        );
    }

    #[tokio::test]
    async fn test_fallback_is_retried_next_time() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Err("down"),
            Err("down"),
            Err("down"),
            Ok("Check aPTT every 6 hours."),
        ]));
        let mut session = session_with(provider.clone());

        assert_eq!(session.submit("heparin?").await.unwrap(), FALLBACK_MESSAGE);
        assert_eq!(
            session.submit("heparin?").await.unwrap(),
            "Check aPTT every 6 hours."
        );
        assert_eq!(provider.call_count(), 4);
        assert_eq!(session.query_count("heparin?"), 2);
        assert_eq!(session.cache_len(), 1);
        assert_eq!(session.transcript().len(), 4);

    }

    #[tokio::test]
    async fn test_request_is_full_transcript_after_fallback() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Err("down"),
            Err("down"),
            Err("down"),
            Ok("Hold if glucose is low."),
        ]));
        let mut session = Session::new(
            provider.clone(),
            RetryPolicy::new(3, Duration::ZERO),
            ModelSelector::new(["nclex"], "fast", "deep"),
            None,
        );

        session.submit("heparin?").await;
        session.submit("insulin?").await;

        let expected = vec![
            Message::user("heparin?"),
            Message::assistant(FALLBACK_MESSAGE),
            Message::user("insulin?"),
        ];
        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests.last().unwrap().messages, expected);
        assert_eq!(&session.transcript()[..3], expected.as_slice());
    }

    #[tokio::test]
    async fn test_trending_across_hits_and_misses() {
        let provider = Arc::new(ScriptedProvider::always_ok());
        let mut session = session_with(provider);
        for q in ["sepsis", "abg", "abg", "insulin", "sepsis", "abg", "foley"] {
            session.submit(q).await;
        }
        assert_eq!(
            session.trending(3),
            vec![
                ("abg".to_string(), 3),
                ("sepsis".to_string(), 2),
                ("insulin".to_string(), 1),
            ]
        );
    }

    #[tokio::test]
    async fn test_restart_discards_ledger() {
        let provider = Arc::new(ScriptedProvider::always_ok());
        let mut session = session_with(provider.clone());
        session.submit("abg?").await;
        let old_id = session.id().to_string();

        let mut session = session.restart();
        assert_ne!(session.id(), old_id);
        assert!(session.transcript().is_empty());
        assert_eq!(session.query_count("abg?"), 0);
        assert_eq!(session.stats(), &SessionStats::default());

        session.submit("abg?").await;
        assert_eq!(provider.call_count(), 2);
    }
}
