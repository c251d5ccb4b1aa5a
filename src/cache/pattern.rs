use std::fmt;

use glob::{Pattern, PatternError};

/// Glob over cache keys, e.g. `horse:123:*` or `statistics:*`.
///
/// A pattern matches a stored key either in full (`namespace:key`) or with
/// the namespace prefix stripped, so horse-scoped patterns reach every
/// namespace at once.
#[derive(Debug, Clone)]
pub struct CachePattern {
    pattern: Pattern
}

impl CachePattern {
    pub fn new(pattern: &str) -> Result<Self, PatternError> {
        Ok(CachePattern {
            pattern: Pattern::new(pattern)?
        })
    }

    /// Every key starting with `prefix`, taken literally.
    pub fn prefix(prefix: &str) -> Self {
        CachePattern {
            pattern: Pattern::new(&format!("{}*", Pattern::escape(prefix))).unwrap_or_default()
        }
    }

    pub fn horse(horse_id: i32) -> Self {
        Self::prefix(&format!("horse:{horse_id}:"))
    }

    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn matches(&self, full_key: &str) -> bool {
        if self.pattern.matches(full_key) {
            return true;
        }

        full_key
            .split_once(':')
            .is_some_and(|(_, key)| self.pattern.matches(key))
    }
}

impl fmt::Display for CachePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
