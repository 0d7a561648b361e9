//! Bridges `sa_tools::BuiltinToolExecutor` (the async `ToolExecutor` the
//! orchestrator calls to run tools) into `sa_contextpack::ToolSource`
//! (the synchronous descriptor list the assembler needs to put tool
//! schemas in front of the model). Both traits describe the same
//! built-in tool pair from two different collaborators' point of view;
//! this adapter has to live here rather than in `sa-tools` itself since
//! `sa-tools` never depends on `sa-contextpack`.

use sa_contextpack::ToolSource;
use sa_domain::ToolDefinition;

pub struct BuiltinToolSource;

impl ToolSource for BuiltinToolSource {
    fn tools(&self) -> Vec<ToolDefinition> {
        sa_tools::BuiltinToolExecutor::tool_definitions()
    }
}
