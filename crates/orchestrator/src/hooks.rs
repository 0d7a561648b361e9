//! Component 10: the hooks registry (§4.10, §6.3). Named lifecycle
//! callbacks invoked sequentially in registration order; a failing
//! handler is logged (with hook name and run id, §1.2) and never aborts
//! the run.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use sa_domain::Result;

/// Exact hook names from §6.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookName {
    BeforeRun,
    AfterContextAssembly,
    BeforeModelCall,
    AfterModelCall,
    BeforeToolExecution,
    AfterToolExecution,
    AfterRun,
    OnError,
}

impl HookName {
    pub fn as_str(self) -> &'static str {
        match self {
            HookName::BeforeRun => "beforeRun",
            HookName::AfterContextAssembly => "afterContextAssembly",
            HookName::BeforeModelCall => "beforeModelCall",
            HookName::AfterModelCall => "afterModelCall",
            HookName::BeforeToolExecution => "beforeToolExecution",
            HookName::AfterToolExecution => "afterToolExecution",
            HookName::AfterRun => "afterRun",
            HookName::OnError => "onError",
        }
    }

    const ALL: [HookName; 8] = [
        HookName::BeforeRun,
        HookName::AfterContextAssembly,
        HookName::BeforeModelCall,
        HookName::AfterModelCall,
        HookName::BeforeToolExecution,
        HookName::AfterToolExecution,
        HookName::AfterRun,
        HookName::OnError,
    ];
}

/// Payload handed to a hook handler. `payload` carries whatever the
/// call site finds useful (e.g. the assembled context, the tool
/// result); handlers must not retain references to mutable Runner
/// state beyond this call (§4.10).
#[derive(Debug, Clone)]
pub struct HookContext {
    pub run_id: String,
    pub session_id: String,
    pub payload: Value,
}

type HookFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;
pub type HookHandler = Arc<dyn Fn(HookContext) -> HookFuture + Send + Sync>;

pub struct HooksRegistry {
    handlers: Mutex<std::collections::HashMap<&'static str, Vec<HookHandler>>>,
}

impl Default for HooksRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HooksRegistry {
    pub fn new() -> Self {
        let mut handlers = std::collections::HashMap::new();
        for name in HookName::ALL {
            handlers.insert(name.as_str(), Vec::new());
        }
        Self { handlers: Mutex::new(handlers) }
    }

    /// Append a handler — handlers for a hook run in registration order.
    pub fn register(&self, name: HookName, handler: HookHandler) {
        self.handlers.lock().entry(name.as_str()).or_default().push(handler);
    }

    /// Invoke every handler registered for `name`, sequentially,
    /// awaiting each. A handler's failure is logged with the hook name
    /// and run id and does not propagate.
    pub async fn execute(&self, name: HookName, ctx: HookContext) {
        let handlers = self.handlers.lock().get(name.as_str()).cloned().unwrap_or_default();
        for handler in handlers {
            if let Err(err) = handler(ctx.clone()).await {
                tracing::warn!(hook = name.as_str(), run_id = %ctx.run_id, error = %err, "hook failed");
            }
        }
    }
}
