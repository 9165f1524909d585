//! Interaction controller for the chat widget.
//!
//! [`ChatWidget`] owns the [`InteractionState`] of one mounted widget. It validates the
//! question, runs the retry policy around the transport, checks the response shape and
//! persists the open/closed flag. State changes go through [`InteractionState::apply`].

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, error, info, warn};

use crate::client::TransportClient;
use crate::errors::{ChatError, TransportError, ValidationError, MAX_QUERY_CHARS};
use crate::messages::{AnswerResponse, RetrievalParameters};
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::storage::KeyValueStore;

/// Storage key of the persisted open/closed flag.
pub const IS_OPEN_KEY: &str = "rag_chat_is_open";

/// Everything the widget renders from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InteractionState {
    pub is_open: bool,
    pub is_submitting: bool,
    pub is_loading: bool,
    pub last_response: Option<AnswerResponse>,
    pub last_error: Option<String>,
}

/// Transitions of [`InteractionState`].
#[derive(Debug, Clone, PartialEq)]
pub enum WidgetAction {
    Hydrated { is_open: bool },
    Toggled,
    InputRejected { message: String },
    SubmissionStarted,
    AnswerReceived(AnswerResponse),
    SubmissionFailed { message: String },
    SubmissionReleased,
}

impl InteractionState {
    pub fn apply(&mut self, action: WidgetAction) {
        match action {
            WidgetAction::Hydrated { is_open } => self.is_open = is_open,
            WidgetAction::Toggled => self.is_open = !self.is_open,
            WidgetAction::InputRejected { message } => self.last_error = Some(message),
            WidgetAction::SubmissionStarted => {
                self.is_submitting = true;
                self.is_loading = true;
                self.last_error = None;
                self.last_response = None;
            }
            WidgetAction::AnswerReceived(response) => self.last_response = Some(response),
            WidgetAction::SubmissionFailed { message } => self.last_error = Some(message),
            WidgetAction::SubmissionReleased => {
                self.is_loading = false;
                self.is_submitting = false;
            }
        }
    }
}

/// Result of a [`ChatWidget::submit`] call that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Answered(AnswerResponse),
    /// Another submission was in flight; nothing happened.
    Ignored,
}

/// Trims the question and enforces the length limits.
pub fn validate_query(raw_input: &str) -> Result<&str, ValidationError> {
    let trimmed = raw_input.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty);
    }
    let length = trimmed.chars().count();
    if length > MAX_QUERY_CHARS {
        return Err(ValidationError::TooLong {
            length,
            limit: MAX_QUERY_CHARS,
        });
    }
    Ok(trimmed)
}

pub struct ChatWidget {
    transport: Arc<dyn TransportClient>,
    store: Arc<dyn KeyValueStore>,
    params: RetrievalParameters,
    retry: RetryPolicy,
    state: Mutex<InteractionState>,
    /// Text of the most recent `submit` call, as entered.
    last_input: Mutex<String>,
}

/// Clears the in-flight flags when the submission ends, however it ends.
struct SubmissionGuard<'a> {
    state: &'a Mutex<InteractionState>,
}

impl Drop for SubmissionGuard<'_> {
    fn drop(&mut self) {
        lock(self.state).apply(WidgetAction::SubmissionReleased);
        debug!("Submission completed");
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl ChatWidget {
    /// Widget at rest and closed. Call [`ChatWidget::hydrate`] before accepting input.
    pub fn new(transport: Arc<dyn TransportClient>, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            transport,
            store,
            params: RetrievalParameters::default(),
            retry: RetryPolicy::default(),
            state: Mutex::new(InteractionState::default()),
            last_input: Mutex::new(String::new()),
        }
    }

    /// [`ChatWidget::new`] followed by [`ChatWidget::hydrate`].
    pub fn mount(transport: Arc<dyn TransportClient>, store: Arc<dyn KeyValueStore>) -> Self {
        let widget = Self::new(transport, store);
        widget.hydrate();
        widget
    }

    pub fn with_parameters(mut self, params: RetrievalParameters) -> Self {
        self.params = params;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Restores the persisted open/closed flag. Anything unreadable means closed.
    pub fn hydrate(&self) {
        let is_open = match self.store.get(IS_OPEN_KEY) {
            Ok(Some(raw)) => serde_json::from_str::<bool>(&raw).unwrap_or_else(|e| {
                warn!("Ignoring stored {} value {:?}: {}", IS_OPEN_KEY, raw, e);
                false
            }),
            Ok(None) => false,
            Err(e) => {
                warn!("Failed to read {}: {}", IS_OPEN_KEY, e);
                false
            }
        };
        lock(&self.state).apply(WidgetAction::Hydrated { is_open });
    }

    pub fn state(&self) -> InteractionState {
        lock(&self.state).clone()
    }

    /// Opens or closes the widget and persists the new value right away.
    pub fn toggle(&self) -> bool {
        let is_open = {
            let mut state = lock(&self.state);
            state.apply(WidgetAction::Toggled);
            state.is_open
        };
        let value = if is_open { "true" } else { "false" };
        if let Err(e) = self.store.set(IS_OPEN_KEY, value) {
            warn!("Failed to persist {}: {}", IS_OPEN_KEY, e);
        }
        is_open
    }

    /// Puts one question to the backend.
    ///
    /// Invalid input fails without a network call. A call made while another submission is in
    /// flight is dropped and returns [`SubmitOutcome::Ignored`]. Every failure also lands in
    /// `last_error`, and the in-flight flags are cleared on every exit path.
    pub async fn submit(&self, raw_input: &str) -> Result<SubmitOutcome, ChatError> {
        *lock(&self.last_input) = raw_input.to_string();
        let query = match validate_query(raw_input) {
            Ok(query) => query,
            Err(err) => {
                debug!("Input validation failed: {:?}", err);
                lock(&self.state).apply(WidgetAction::InputRejected {
                    message: err.to_string(),
                });
                return Err(err.into());
            }
        };

        {
            let mut state = lock(&self.state);
            if state.is_submitting {
                debug!("Submission blocked: already submitting");
                return Ok(SubmitOutcome::Ignored);
            }
            state.apply(WidgetAction::SubmissionStarted);
        }
        let _release = SubmissionGuard { state: &self.state };

        debug!(
            "Submitting question: {}...",
            query.chars().take(50).collect::<String>()
        );

        match self.ask(query).await {
            Ok(response) => {
                info!(
                    "Received response: has_answer={}, sources={}, chunks={}",
                    response.answer.as_deref().is_some_and(|a| !a.is_empty()),
                    response.sources.as_ref().map_or(0, Vec::len),
                    response.matched_chunks.as_ref().map_or(0, Vec::len),
                );
                lock(&self.state).apply(WidgetAction::AnswerReceived(response.clone()));
                Ok(SubmitOutcome::Answered(response))
            }
            Err(err) => {
                error!("Error submitting question: {}", err);
                lock(&self.state).apply(WidgetAction::SubmissionFailed {
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Re-submits the text of the previous `submit` call, validating it again.
    pub async fn retry_last(&self) -> Result<SubmitOutcome, ChatError> {
        let last = lock(&self.last_input).clone();
        self.submit(&last).await
    }

    async fn ask(&self, query: &str) -> Result<AnswerResponse, ChatError> {
        let payload = retry_with_backoff(&self.retry, TransportError::is_retryable, || {
            self.transport.ask(query, &self.params)
        })
        .await?;
        Ok(AnswerResponse::from_json(&payload)?)
    }
}
