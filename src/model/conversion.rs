use std::{collections::BTreeMap, str::FromStr};

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::{
    error::RatingError,
    model::{constants, constants::round_one_decimal, structures::rating_scale::RatingScale}
};

/// One row of the conversion table: an anchor on the local scale and the
/// equivalent value on every foreign scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionBand {
    pub anchor: f64,
    pub tolerance: f64,
    pub france: f64,
    pub uk: f64,
    pub uae: f64,
    pub ifha: f64,
    pub tier: String
}

impl ConversionBand {
    pub fn local_min(&self) -> f64 {
        self.anchor - self.tolerance
    }

    pub fn local_max(&self) -> f64 {
        self.anchor + self.tolerance
    }

    pub fn contains(&self, local_rating: f64) -> bool {
        local_rating >= self.local_min() && local_rating <= self.local_max()
    }

    pub fn value(&self, scale: RatingScale) -> f64 {
        match scale {
            RatingScale::France => self.france,
            RatingScale::Uk => self.uk,
            RatingScale::Uae => self.uae,
            RatingScale::Ifha => self.ifha
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum ConversionMethod {
    Table { tier: String },
    Coefficient
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub scale: RatingScale,
    pub converted: f64,
    pub confidence: f64,
    pub method: ConversionMethod
}

/// Maps local ratings onto foreign scales.
///
/// Bands are kept ordered by descending anchor; the first band containing
/// the input wins. Inputs between bands fall back to linear coefficients.
#[derive(Debug, Clone)]
pub struct ScaleConverter {
    bands: Vec<ConversionBand>
}

impl Default for ScaleConverter {
    fn default() -> Self {
        ScaleConverter::new(default_bands())
    }
}

impl ScaleConverter {
    pub fn new(mut bands: Vec<ConversionBand>) -> Self {
        bands.sort_by(|a, b| b.anchor.total_cmp(&a.anchor));
        ScaleConverter { bands }
    }

    pub fn bands(&self) -> &[ConversionBand] {
        &self.bands
    }

    /// Converts using a scale name, as received from API callers.
    pub fn convert_named(&self, local_rating: f64, scale: &str) -> Result<ConversionResult, RatingError> {
        let scale = RatingScale::from_str(scale).map_err(|_| RatingError::UnknownScale(scale.to_string()))?;

        Ok(self.convert(local_rating, scale))
    }

    pub fn convert(&self, local_rating: f64, scale: RatingScale) -> ConversionResult {
        let (converted, method) = match self.find_band(local_rating) {
            Some(band) => (
                band.value(scale),
                ConversionMethod::Table {
                    tier: band.tier.clone()
                }
            ),
            None => (coefficient_conversion(local_rating, scale), ConversionMethod::Coefficient)
        };

        ConversionResult {
            scale,
            converted: round_one_decimal(converted),
            confidence: conversion_confidence(local_rating, scale),
            method
        }
    }

    /// Converts to every known scale.
    pub fn convert_all(&self, local_rating: f64) -> BTreeMap<RatingScale, f64> {
        RatingScale::iter()
            .map(|scale| (scale, self.convert(local_rating, scale).converted))
            .collect()
    }

    pub fn find_band(&self, local_rating: f64) -> Option<&ConversionBand> {
        self.bands.iter().find(|band| band.contains(local_rating))
    }
}

fn coefficient_conversion(local_rating: f64, scale: RatingScale) -> f64 {
    match scale {
        RatingScale::France => local_rating * constants::FRANCE_COEFFICIENT,
        RatingScale::Uk => local_rating * constants::FRANCE_COEFFICIENT * constants::UK_FROM_FRANCE_COEFFICIENT,
        RatingScale::Uae => local_rating * constants::UAE_COEFFICIENT,
        RatingScale::Ifha => local_rating * constants::IFHA_COEFFICIENT
    }
}

/// France and the UAE run structurally similar systems; the UK differs the
/// most in units and method. IFHA sits in between.
fn conversion_confidence(local_rating: f64, scale: RatingScale) -> f64 {
    let base = match scale {
        RatingScale::France => constants::FRANCE_CONFIDENCE,
        RatingScale::Uk => constants::UK_CONFIDENCE,
        RatingScale::Uae => constants::UAE_CONFIDENCE,
        RatingScale::Ifha => constants::IFHA_CONFIDENCE
    };

    if local_rating > constants::PLAUSIBLE_RATING_MAX || local_rating < constants::PLAUSIBLE_RATING_MIN {
        return base - constants::IMPLAUSIBLE_CONFIDENCE_PENALTY;
    }

    base
}

fn band(anchor: f64, france: f64, uk: f64, uae: f64, ifha: f64, tier: &str) -> ConversionBand {
    ConversionBand {
        anchor,
        tolerance: constants::BAND_TOLERANCE,
        france,
        uk,
        uae,
        ifha,
        tier: tier.to_string()
    }
}

/// Reference points for the local scale.
///
/// Every column sits on the coefficient line at its anchor, so a band only
/// snaps nearby ratings to the anchor value and conversion stays monotone
/// across band edges.
pub fn default_bands() -> Vec<ConversionBand> {
    vec![
        band(120.0, 108.0, 237.6, 108.0, 102.0, "Champion, top international Group 1 level"),
        band(110.0, 99.0, 217.8, 99.0, 93.5, "Group 1 winner"),
        band(100.0, 90.0, 198.0, 90.0, 85.0, "Group 1 contender"),
        band(95.0, 85.5, 188.1, 85.5, 80.8, "Group 2 level"),
        band(90.0, 81.0, 178.2, 81.0, 76.5, "Group 3 level"),
        band(80.0, 72.0, 158.4, 72.0, 68.0, "Listed level"),
        band(75.0, 67.5, 148.5, 67.5, 63.8, "Strong handicapper"),
        band(70.0, 63.0, 138.6, 63.0, 59.5, "Class 1 handicapper"),
        band(60.0, 54.0, 118.8, 54.0, 51.0, "Class 2 handicapper"),
        band(50.0, 45.0, 99.0, 45.0, 42.5, "Lower grade handicapper"),
        band(40.0, 36.0, 79.2, 36.0, 34.0, "Maiden level")
    ]
}
