//! Extraction job results.
//!
//! An extraction job turns a face (or eye close-up) photo into a color
//! palette per region, optionally with the geometry of each region in
//! source-image pixel space for overlay rendering.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::colors::suppress_beard_regions;
use crate::regions::{Region, EXPECTED_REGIONS};
use crate::types::{ColorMap, JobId};

/// Five representative colors sampled from one region.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColorPalette {
    #[serde(default)]
    pub average: String,
    #[serde(default)]
    pub dark: String,
    #[serde(default)]
    pub light: String,
    #[serde(default)]
    pub median: String,
    /// The color forwarded to classification.
    #[serde(default)]
    pub result: String,
    /// Diagnostic output from the extractor, passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs: Option<serde_json::Value>,
}

impl ColorPalette {
    /// `(label, hex)` pairs in display order.
    pub fn swatches(&self) -> [(&'static str, &str); 5] {
        [
            ("average", self.average.as_str()),
            ("dark", self.dark.as_str()),
            ("light", self.light.as_str()),
            ("median", self.median.as_str()),
            ("result", self.result.as_str()),
        ]
    }
}

/// A point in source-image pixel space.
pub type Point = [f64; 2];

/// Landmark geometry, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LandmarkShape {
    Polygon {
        coordinates: Vec<Point>,
    },
    Donut {
        coordinates: DonutRings,
    },
    Circle {
        metadata: CircleMetadata,
    },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DonutRings {
    pub outer: Vec<Point>,
    pub inner: Vec<Point>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircleMetadata {
    pub center: Point,
    pub radius: f64,
}

/// Pixels actually sampled: one polygon or several.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProcessedRegion {
    Multi(Vec<Vec<Point>>),
    Single(Vec<Point>),
}

impl ProcessedRegion {
    /// Flatten into a list of polygons, skipping empty ones.
    pub fn polygons(&self) -> Vec<&[Point]> {
        match self {
            Self::Multi(polys) => polys
                .iter()
                .filter(|p| !p.is_empty())
                .map(Vec::as_slice)
                .collect(),
            Self::Single(poly) if !poly.is_empty() => vec![poly.as_slice()],
            Self::Single(_) => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionCoordinates {
    #[serde(default, deserialize_with = "lenient")]
    pub landmark_region: Option<LandmarkShape>,
    #[serde(default, deserialize_with = "lenient")]
    pub processed_region: Option<ProcessedRegion>,
}

/// Per-region extraction output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionDetail {
    #[serde(default)]
    pub color_palette: ColorPalette,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_coordinates: Option<RegionCoordinates>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionOutput {
    #[serde(default)]
    pub details: BTreeMap<String, RegionDetail>,
    #[serde(default)]
    pub image_url: String,
    /// Region → final hex color.
    #[serde(default)]
    pub result: ColorMap,
}

/// A completed extraction job as returned by the poll endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResponse {
    #[serde(default)]
    pub id: JobId,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub output: ExtractionOutput,
}

impl ExtractionResponse {
    /// Expected regions absent from `output.details`.
    pub fn missing_regions(&self) -> Vec<Region> {
        EXPECTED_REGIONS
            .iter()
            .copied()
            .filter(|r| !self.output.details.contains_key(r.as_str()))
            .collect()
    }

    pub fn region(&self, region: Region) -> Option<&RegionDetail> {
        self.output.details.get(region.as_str())
    }
}

/// Frontal extraction, optionally joined with an eye close-up, as one
/// color map.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedAnalysisResult {
    pub frontal: ExtractionResponse,
    pub eye: Option<ExtractionResponse>,
    /// Frontal colors with the eye job's `iris` substituted in.
    pub combined_colors: ColorMap,
    pub beard_detected: bool,
}

impl CombinedAnalysisResult {
    /// Merge the two jobs. The eye close-up is the better iris sample, so
    /// its `iris` color wins whenever it has one.
    pub fn new(frontal: ExtractionResponse, eye: ExtractionResponse, beard_detected: bool) -> Self {
        let mut combined_colors = frontal.output.result.clone();
        if let Some(iris) = eye.output.result.get(Region::Iris.as_str()) {
            combined_colors.insert(Region::Iris.as_str().to_string(), iris.clone());
        }
        Self {
            frontal,
            eye: Some(eye),
            combined_colors,
            beard_detected,
        }
    }

    /// Frontal photo only.
    pub fn single(frontal: ExtractionResponse, beard_detected: bool) -> Self {
        Self {
            combined_colors: frontal.output.result.clone(),
            frontal,
            eye: None,
            beard_detected,
        }
    }

    /// Color map to submit for classification.
    pub fn classification_colors(&self) -> ColorMap {
        suppress_beard_regions(&self.combined_colors, self.beard_detected)
    }

    fn is_hidden(&self, key: &str) -> bool {
        self.beard_detected && Region::parse(key).is_some_and(Region::is_beard_suppressed)
    }

    /// Frontal regions to display, minus beard-suppressed ones.
    pub fn displayed_regions(&self) -> Vec<(&str, &RegionDetail)> {
        self.frontal
            .output
            .details
            .iter()
            .filter(|(key, _)| !self.is_hidden(key))
            .map(|(key, detail)| (key.as_str(), detail))
            .collect()
    }

    /// Geometry source for a region: the eye photo for `iris` when one was
    /// analyzed, the frontal photo otherwise.
    pub fn overlay_source(&self, region: Region) -> (&str, Option<&RegionDetail>) {
        match &self.eye {
            Some(eye) if region == Region::Iris => (eye.output.image_url.as_str(), eye.region(region)),
            _ => (self.frontal.output.image_url.as_str(), self.frontal.region(region)),
        }
    }

    /// Every shown region that carries geometry, with the photo it was
    /// measured on, in `EXPECTED_REGIONS` order.
    pub fn overlay_regions(&self) -> Vec<(Region, &str, &RegionCoordinates)> {
        EXPECTED_REGIONS
            .iter()
            .copied()
            .filter(|r| !self.is_hidden(r.as_str()))
            .filter_map(|region| {
                let (url, detail) = self.overlay_source(region);
                let coords = detail?.region_coordinates.as_ref()?;
                Some((region, url, coords))
            })
            .collect()
    }
}

/// Decode an optional field, treating malformed geometry as absent rather
/// than failing the whole response.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match serde_json::from_value(v) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring malformed region geometry");
            None
        }
    }))
}
