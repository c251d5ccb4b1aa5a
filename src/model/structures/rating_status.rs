use serde_repr::{Deserialize_repr, Serialize_repr};
use std::convert::TryFrom;

/// Lifecycle of a stored rating. Transitions only move forward:
/// `Provisional`/`Calculated` -> `Superseded`.
#[derive(Deserialize_repr, Serialize_repr, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RatingStatus {
    /// Fewer than the minimum number of races were available
    Provisional = 0,
    Calculated = 1,
    /// A newer calculation exists for the same horse
    Superseded = 2
}

impl RatingStatus {
    pub fn can_transition_to(&self, next: RatingStatus) -> bool {
        matches!(
            (self, next),
            (RatingStatus::Provisional, RatingStatus::Superseded) | (RatingStatus::Calculated, RatingStatus::Superseded)
        )
    }
}

impl TryFrom<i32> for RatingStatus {
    type Error = ();

    fn try_from(v: i32) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(RatingStatus::Provisional),
            1 => Ok(RatingStatus::Calculated),
            2 => Ok(RatingStatus::Superseded),
            _ => Err(())
        }
    }
}
