use serde_repr::{Deserialize_repr, Serialize_repr};
use std::convert::TryFrom;
use strum_macros::EnumIter;

/// Going of the track on race day.
#[derive(Deserialize_repr, Serialize_repr, Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
#[repr(u8)]
pub enum TerrainCondition {
    Firm = 0,
    Good = 1,
    Soft = 2,
    Heavy = 3,
    VeryHeavy = 4
}

impl TryFrom<i32> for TerrainCondition {
    type Error = ();

    fn try_from(v: i32) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(TerrainCondition::Firm),
            1 => Ok(TerrainCondition::Good),
            2 => Ok(TerrainCondition::Soft),
            3 => Ok(TerrainCondition::Heavy),
            4 => Ok(TerrainCondition::VeryHeavy),
            _ => Err(())
        }
    }
}
