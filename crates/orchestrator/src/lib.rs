//! Run orchestration: admission, locking, retry, cancellation, the
//! event stream, and the Runner that drives a single run end to end
//! (components 1–11, §2). Depends only on `sa_domain`'s collaborator
//! traits — never on a concrete `sa-sessions`/`sa-providers`/`sa-tools`
//! implementation.

pub mod admission_queue;
pub mod cancel;
pub mod event_stream;
pub mod hooks;
pub mod lock_manager;
pub mod retry;
pub mod run_id;
pub mod runner;
pub mod state_machine;
pub mod tool_parser;
pub mod turn_driver;

pub use admission_queue::{AdmissionQueue, QueueItem, QueueStatus};
pub use cancel::{CancelController, CancelToken};
pub use event_stream::{EventStreamConsumer, EventStreamProducer};
pub use hooks::{HookContext, HookHandler, HookName, HooksRegistry};
pub use lock_manager::{LockGuard, SessionLockManager};
pub use retry::RetryEngine;
pub use runner::{Orchestrator, RunHandle, RunRequest};
pub use turn_driver::TurnDriver;
