use serde_repr::{Deserialize_repr, Serialize_repr};
use std::convert::TryFrom;
use strum_macros::EnumIter;

/// Race class, ordered from most to least prestigious.
#[derive(Deserialize_repr, Serialize_repr, Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
#[repr(u8)]
pub enum RaceCategory {
    Group1 = 0,
    Group2 = 1,
    Group3 = 2,
    Listed = 3,
    Class1 = 4,
    Class2 = 5,
    Unclassified = 6
}

impl RaceCategory {
    /// Position in the class ladder, 0 being the top tier.
    pub fn tier(&self) -> usize {
        *self as usize
    }

    pub fn is_pattern_race(&self) -> bool {
        matches!(self, RaceCategory::Group1 | RaceCategory::Group2 | RaceCategory::Group3)
    }
}

impl TryFrom<i32> for RaceCategory {
    type Error = ();

    fn try_from(v: i32) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(RaceCategory::Group1),
            1 => Ok(RaceCategory::Group2),
            2 => Ok(RaceCategory::Group3),
            3 => Ok(RaceCategory::Listed),
            4 => Ok(RaceCategory::Class1),
            5 => Ok(RaceCategory::Class2),
            6 => Ok(RaceCategory::Unclassified),
            _ => Err(())
        }
    }
}
