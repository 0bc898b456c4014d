//! # quotesync agent
//!
//! Drives a [`quotesync_engine::QuoteBook`] against a quote server: fetches
//! the server's quotes on a timer or on demand, reconciles them into the
//! local book, persists the result, reports notable outcomes and pushes
//! local-only quotes back.
//!
//! The collaborators are traits so the agent can be run against an
//! in-memory server and store in tests:
//!
//! - [`QuoteSource`]: fetch and push-back ([`HttpQuoteSource`], [`MemorySource`])
//! - [`QuoteStorage`]: persistence ([`JsonFileStorage`], [`MemoryStorage`])
//! - [`Notifier`]: outcome reporting ([`LogNotifier`], [`ChannelNotifier`])

pub mod agent;
pub mod config;
pub mod error;
pub mod http;
pub mod notify;
pub mod source;
pub mod storage;

pub use agent::{now_millis, AgentHandle, SyncAgent};
pub use config::Config;
pub use error::{ConfigError, Result, SyncError};
pub use http::{HttpQuoteSource, PayloadFormat};
pub use notify::{ChannelNotifier, LogNotifier, Notifier, SyncEvent};
pub use source::{MemorySource, PushAck, QuoteSource};
pub use storage::{JsonFileStorage, MemoryStorage, QuoteStorage};
