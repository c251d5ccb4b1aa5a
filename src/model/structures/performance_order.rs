use serde::{Deserialize, Serialize};

/// Ordering of a performance sequence handed to the calculator.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PerformanceOrder {
    #[default]
    MostRecentFirst,
    OldestFirst
}
