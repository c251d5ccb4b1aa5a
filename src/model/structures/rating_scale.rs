use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

/// Foreign rating scales a local rating can be expressed in.
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter, EnumString, Display
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum RatingScale {
    France,
    Uk,
    Uae,
    Ifha
}
