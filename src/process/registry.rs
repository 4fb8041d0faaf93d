/*!
 * Program Registry
 * Maps command names to runnable programs
 */

use super::builtins;
use super::traits::Program;
use ahash::RandomState;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

/// Shared command table; clones see the same registrations
#[derive(Clone, Default)]
pub struct ProgramRegistry {
    programs: Arc<DashMap<String, Arc<dyn Program>, RandomState>>,
}

impl std::fmt::Debug for ProgramRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names = self.names();
        names.sort();
        f.debug_struct("ProgramRegistry")
            .field("programs", &names)
            .finish()
    }
}

impl ProgramRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the builtin commands
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        builtins::install(&registry);
        registry
    }

    /// Register `program` under `name`, replacing any previous entry
    pub fn register(&self, name: impl Into<String>, program: impl Program) {
        let name = name.into();
        debug!(command = %name, "program registered");
        self.programs.insert(name, Arc::new(program));
    }

    /// Look up a command by name.
    ///
    /// A path such as `/bin/echo` falls back to its final component.
    pub fn get(&self, command: &str) -> Option<Arc<dyn Program>> {
        if let Some(program) = self.programs.get(command) {
            return Some(Arc::clone(program.value()));
        }
        let base = command.rsplit('/').next()?;
        if base == command || base.is_empty() {
            return None;
        }
        self.programs.get(base).map(|p| Arc::clone(p.value()))
    }

    pub fn contains(&self, command: &str) -> bool {
        self.get(command).is_some()
    }

    pub fn names(&self) -> Vec<String> {
        self.programs.iter().map(|e| e.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }
}
