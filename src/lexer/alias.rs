//! Alias table consulted by the reference lexer in command position.

use rustc_hash::FxHashMap;

/// Maximum nested alias expansions at one input position.
pub(crate) const MAX_EXPANSION_DEPTH: usize = 128;

/// Name-to-text alias definitions.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    aliases: FxHashMap<String, String>,
}

impl AliasTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Defines or replaces an alias.
    pub fn define(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.aliases.insert(name.into(), value.into());
    }

    /// Removes an alias, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.aliases.remove(name)
    }

    /// Returns the value of `name`, if defined.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.aliases.get(name).map(String::as_str)
    }

    /// Returns `true` when no alias is defined.
    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}
