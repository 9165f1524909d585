//! Question-answering client for the documentation chat widget.
//! HTTP transport, retry policy, response validation, persisted widget state and the
//! interaction controller that ties them together. Used by the `rag-chat` binary.

pub mod client;
pub mod config;
pub mod errors;
pub mod messages;
pub mod retry;
pub mod storage;
pub mod widget;

pub use client::{HttpTransport, TransportClient, DEFAULT_TIMEOUT};
pub use config::{default_config_path, Config, ConfigError};
pub use errors::{ChatError, TransportError, ValidationError};
pub use messages::{AnswerResponse, Chunk, HealthStatus, RetrievalParameters};
pub use retry::{retry_with_backoff, RetryPolicy};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError};
pub use widget::{ChatWidget, InteractionState, SubmitOutcome, WidgetAction};
