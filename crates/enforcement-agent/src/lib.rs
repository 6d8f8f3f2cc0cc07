//! Element hider enforcement agent.
//!
//! One agent runs per document. It keeps the persisted hidden-class and
//! hidden-id lists applied to the page, follows page mutations so that
//! injected or restyled elements stay hidden, and answers control-surface
//! commands through [`CommandRouter`].

pub mod agent;
pub mod config;
pub mod errors;
pub mod events;
pub mod metrics;
pub mod observer;
pub mod protocol;
pub mod queue;
pub mod retry;
pub mod router;
pub mod state;

pub use agent::EnforcementAgent;
pub use config::{AgentConfig, HighlightCfg, ObserverCfg, QueueCfg, StoreRetryCfg};
pub use errors::AgentError;
pub use metrics::{AgentMetrics, AgentMetricsSnapshot};
pub use observer::{assess_burst, ChangeObserver, Trigger, Verdict};
pub use protocol::{ErrorCode, Request, Response};
pub use router::CommandRouter;
pub use state::{BurstOutcome, HIDDEN_MARKER, ORIGINAL_BACKGROUND, ORIGINAL_OUTLINE};
