//! Hex color validation and manual color entry.
//!
//! Manual entry lets a user classify colors picked by hand instead of (or
//! alongside) the extractor's output. Validation happens locally before
//! anything is submitted.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::CoreError;
use crate::regions::{Region, EXPECTED_REGIONS};
use crate::types::ColorMap;

static HEX_COLOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#[0-9A-Fa-f]{6}$").expect("valid regex"));

/// `true` for `#RRGGBB` strings (either case), nothing else.
pub fn is_valid_hex(value: &str) -> bool {
    HEX_COLOR_RE.is_match(value)
}

/// Drop the beard-suppressed regions from a color map when `beard_detected`.
pub fn suppress_beard_regions(colors: &ColorMap, beard_detected: bool) -> ColorMap {
    if !beard_detected {
        return colors.clone();
    }
    colors
        .iter()
        .filter(|(key, _)| !Region::parse(key).is_some_and(Region::is_beard_suppressed))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// User-edited region → hex mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManualColorInput {
    colors: BTreeMap<Region, String>,
}

impl ManualColorInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefill from a wire color map (e.g. an extraction result or a saved
    /// template). Unknown region keys are ignored.
    pub fn from_color_map(colors: &ColorMap) -> Self {
        let colors = colors
            .iter()
            .filter_map(|(key, value)| match Region::parse(key) {
                Some(region) => Some((region, value.trim().to_string())),
                None => {
                    tracing::warn!(region = %key, "Ignoring unknown region in color map");
                    None
                }
            })
            .collect();
        Self { colors }
    }

    pub fn set(&mut self, region: Region, value: impl Into<String>) {
        self.colors.insert(region, value.into().trim().to_string());
    }

    pub fn get(&self, region: Region) -> Option<&str> {
        self.colors.get(&region).map(String::as_str)
    }

    /// Regions the user is asked to fill in.
    pub fn editable_regions(beard_detected: bool) -> Vec<Region> {
        EXPECTED_REGIONS
            .iter()
            .copied()
            .filter(|r| !(beard_detected && r.is_beard_suppressed()))
            .collect()
    }

    /// Editable regions whose value is missing or not a valid hex color.
    ///
    /// A blank `eyebrows` is allowed: it falls back to `hair_root`.
    pub fn invalid_regions(&self, beard_detected: bool) -> Vec<Region> {
        Self::editable_regions(beard_detected)
            .into_iter()
            .filter(|region| {
                let value = self.get(*region).unwrap_or("");
                if *region == Region::Eyebrows && value.is_empty() {
                    return false;
                }
                !is_valid_hex(value)
            })
            .collect()
    }

    /// Validate and build the color map to submit for classification.
    ///
    /// Fills a blank `eyebrows` with the `hair_root` color and removes the
    /// beard-suppressed regions. The stored input is left untouched.
    pub fn prepare_submission(&self, beard_detected: bool) -> Result<ColorMap, CoreError> {
        let invalid = self.invalid_regions(beard_detected);
        if !invalid.is_empty() {
            let names: Vec<&str> = invalid.iter().map(|r| r.display_name()).collect();
            return Err(CoreError::Validation(format!(
                "Cores inválidas (use o formato #RRGGBB): {}",
                names.join(", ")
            )));
        }

        let mut payload = ColorMap::new();
        for region in Self::editable_regions(beard_detected) {
            if let Some(value) = self.get(region).filter(|v| !v.is_empty()) {
                payload.insert(region.as_str().to_string(), value.to_string());
            }
        }

        if !payload.contains_key(Region::Eyebrows.as_str()) {
            if let Some(hair) = payload.get(Region::HairRoot.as_str()).cloned() {
                payload.insert(Region::Eyebrows.as_str().to_string(), hair);
            }
        }

        Ok(payload)
    }
}
