//! Client configuration.

use std::collections::BTreeMap;

/// Default number of change events kept for polling.
pub const DEFAULT_MAX_HISTORY: usize = 10_000;

/// Configuration for a client connection's reconciler.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Primary-key column name per table.
    ///
    /// The schema description carries no key information, so tables absent
    /// from this map are treated as keyless.
    pub primary_keys: BTreeMap<String, String>,

    /// Maximum number of events kept in the change feed history.
    pub max_history: usize,

    /// Whether updates for tables missing from the schema are an error.
    pub strict_tables: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            primary_keys: BTreeMap::new(),
            max_history: DEFAULT_MAX_HISTORY,
            strict_tables: false,
        }
    }
}

impl ClientConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `column` as the primary key of `table`.
    #[must_use]
    pub fn with_primary_key(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.primary_keys.insert(table.into(), column.into());
        self
    }

    /// Sets the change feed history limit.
    #[must_use]
    pub const fn max_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history;
        self
    }

    /// Sets whether unknown tables are rejected.
    #[must_use]
    pub const fn strict_tables(mut self, value: bool) -> Self {
        self.strict_tables = value;
        self
    }

    /// Primary-key column configured for `table`.
    pub fn primary_key(&self, table: &str) -> Option<&str> {
        self.primary_keys.get(table).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ClientConfig::default();
        assert!(config.primary_keys.is_empty());
        assert_eq!(config.max_history, DEFAULT_MAX_HISTORY);
        assert!(!config.strict_tables);
    }

    #[test]
    fn builder_pattern() {
        let config = ClientConfig::new()
            .with_primary_key("User", "identity")
            .max_history(16)
            .strict_tables(true);

        assert_eq!(config.primary_key("User"), Some("identity"));
        assert_eq!(config.primary_key("Message"), None);
        assert_eq!(config.max_history, 16);
        assert!(config.strict_tables);
    }
}
