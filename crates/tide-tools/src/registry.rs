//! Name-to-tool index used for dispatch and for the advertised tool list.

use std::collections::BTreeMap;
use std::sync::Arc;

use tide_core::tools::Tool;
use tracing::debug;

use crate::fs::{GlobTool, ListDirTool, ReadFileTool, UpdateFileTool, WriteFileTool};
use crate::research::ResearchCodebaseTool;
use crate::search::GrepTool;
use crate::system::BashTool;
use crate::traits::{AgentTool, FileSystemOps, ProcessRunner, ResearchDelegate};

/// Tools by name, iterated in name order.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn AgentTool>>,
}

impl ToolRegistry {
    /// No tools.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the read-only tools only.
    #[must_use]
    pub fn read_only(fs: Arc<dyn FileSystemOps>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ReadFileTool::new(Arc::clone(&fs))));
        registry.register(Arc::new(ListDirTool::new(fs)));
        registry.register(Arc::new(GlobTool::new()));
        registry.register(Arc::new(GrepTool::new()));
        registry
    }

    /// Registry with every built-in tool.
    ///
    /// `research_codebase` is registered only when a delegate is supplied.
    #[must_use]
    pub fn builtin(
        fs: Arc<dyn FileSystemOps>,
        runner: Arc<dyn ProcessRunner>,
        research: Option<(Arc<dyn ResearchDelegate>, usize)>,
    ) -> Self {
        let mut registry = Self::read_only(Arc::clone(&fs));
        registry.register(Arc::new(WriteFileTool::new(Arc::clone(&fs))));
        registry.register(Arc::new(UpdateFileTool::new(fs)));
        registry.register(Arc::new(BashTool::new(runner)));
        if let Some((delegate, max_files)) = research {
            registry.register(Arc::new(ResearchCodebaseTool::new(delegate, max_files)));
        }
        registry
    }

    /// Add `tool`, replacing one already registered under its name.
    pub fn register(&mut self, tool: Arc<dyn AgentTool>) {
        let name = tool.name().to_owned();
        if self.tools.insert(name.clone(), tool).is_some() {
            debug!(tool_name = name.as_str(), "tool replaced");
        } else {
            debug!(tool_name = name.as_str(), "tool registered");
        }
    }

    /// The tool registered as `name`.
    pub fn get(&self, name: &str) -> Option<Arc<dyn AgentTool>> {
        self.tools.get(name).cloned()
    }

    /// Declarations for a model request, by name.
    pub fn definitions(&self) -> Vec<Tool> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// Tool count.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// No tools registered.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }
}
