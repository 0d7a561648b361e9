//! The `ToolExecutor` collaborator contract (§4.9) plus a built-in
//! exec/process tool pair:
//! - `exec`: run commands foreground or auto-background after `yield_ms`
//! - `process`: manage background sessions (list/poll/log/write/kill/clear/remove)

pub mod exec;
pub mod executor;
pub mod manager;
pub mod process;

pub use executor::BuiltinToolExecutor;
pub use manager::{ExecConfig, ProcessManager};
