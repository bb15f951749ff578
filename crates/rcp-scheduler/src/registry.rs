//! Tool registry (component E, §4.6 "Resolve the tool via (E)"). Owned by
//! the caller that wires up an engine; the scheduler only ever sees it
//! through `Arc` so parallel-batch tasks can `tokio::spawn` with owned
//! data instead of borrowing across the task boundary.

use std::collections::HashMap;
use std::sync::Arc;

use rcp_core::ToolKind;

use crate::executor::StepExecutor;

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<ToolKind, Arc<dyn StepExecutor>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: ToolKind, executor: Arc<dyn StepExecutor>) -> &mut Self {
        self.tools.insert(kind, executor);
        self
    }

    pub fn get(&self, kind: ToolKind) -> Option<Arc<dyn StepExecutor>> {
        self.tools.get(&kind).cloned()
    }
}
