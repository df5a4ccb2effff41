//! Classification job results.
//!
//! A classification job scores a region → color map against the twelve
//! seasonal palettes and reports per-region brightness/saturation, the
//! winning season and, depending on the backend version, a decision table
//! and a dimensional breakdown.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::regions::{Metric, Region};
use crate::types::{ColorMap, JobId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Primary,
    Secondary,
    None,
}

impl MatchKind {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Primary => "●",
            Self::Secondary => "◐",
            Self::None => "○",
        }
    }
}

/// How one dimension of a candidate season matched the measured values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterMatch {
    #[serde(rename = "match")]
    pub kind: MatchKind,
    #[serde(default)]
    pub expected: String,
    #[serde(default)]
    pub primary: String,
    #[serde(default)]
    pub secondary: String,
}

/// Scoring of one candidate season across the four dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonData {
    pub score: f64,
    pub contraste: ParameterMatch,
    pub temperatura: ParameterMatch,
    pub profundidade: ParameterMatch,
    pub intensidade: ParameterMatch,
}

impl SeasonData {
    /// `(dimension, match)` pairs in display order.
    pub fn dimensions(&self) -> [(&'static str, &ParameterMatch); 4] {
        [
            ("contraste", &self.contraste),
            ("temperatura", &self.temperatura),
            ("profundidade", &self.profundidade),
            ("intensidade", &self.intensidade),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionTable {
    #[serde(default)]
    pub seasons: BTreeMap<String, SeasonData>,
    #[serde(default)]
    pub season_scores: BTreeMap<String, f64>,
}

impl DecisionTable {
    /// Seasons sorted by descending score, ties broken by name.
    pub fn ranked(&self) -> Vec<(&str, &SeasonData)> {
        let mut rows: Vec<(&str, &SeasonData)> =
            self.seasons.iter().map(|(k, v)| (k.as_str(), v)).collect();
        rows.sort_by(|a, b| b.1.score.total_cmp(&a.1.score).then_with(|| a.0.cmp(b.0)));
        rows
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopCandidate {
    pub season: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub match_score: f64,
    #[serde(default)]
    pub exact_match: bool,
    #[serde(default)]
    pub used_primary: Vec<String>,
    #[serde(default)]
    pub used_secondary: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationDetails {
    #[serde(rename = "brightness-details", default, deserialize_with = "numeric_entries")]
    pub brightness_details: BTreeMap<String, f64>,
    #[serde(rename = "saturation-details", default, deserialize_with = "numeric_entries")]
    pub saturation_details: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_table: Option<DecisionTable>,
    #[serde(default)]
    pub top_candidates: Vec<TopCandidate>,
    /// Per-dimension diagnostics; shape varies across backend versions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensional_analysis: Option<serde_json::Value>,
    #[serde(default)]
    pub approximation_flags: Vec<String>,
}

impl ClassificationDetails {
    /// Value of `metric` for `region`, if the backend reported one.
    pub fn metric(&self, region: Region, metric: Metric) -> Option<f64> {
        let map = match metric {
            Metric::Saturation => &self.saturation_details,
            Metric::Brightness => &self.brightness_details,
        };
        map.get(&region.metric_key(metric)).copied()
    }

    /// Same lookup for a raw region key, including keys not in [`Region`].
    pub fn metric_for_key(&self, region: &str, metric: Metric) -> Option<f64> {
        match Region::parse(region) {
            Some(r) => self.metric(r, metric),
            None => {
                let map = match metric {
                    Metric::Saturation => &self.saturation_details,
                    Metric::Brightness => &self.brightness_details,
                };
                map.get(&format!("{region}_{}", metric.as_str())).copied()
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeasonResult {
    pub season: String,
    #[serde(default)]
    pub brightness: f64,
    #[serde(default)]
    pub saturation: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationOutput {
    #[serde(default)]
    pub colors: ColorMap,
    #[serde(default)]
    pub details: ClassificationDetails,
    pub result: SeasonResult,
}

/// A completed classification job as returned by the poll endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResponse {
    #[serde(default)]
    pub id: JobId,
    #[serde(default)]
    pub status: String,
    pub output: ClassificationOutput,
    #[serde(rename = "delayTime", default, skip_serializing_if = "Option::is_none")]
    pub delay_time: Option<u64>,
    #[serde(rename = "executionTime", default, skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<u64>,
}

/// Metric map keeping only numeric entries. A `null` or non-numeric value
/// drops that one region instead of failing the whole reply.
fn numeric_entries<'de, D>(deserializer: D) -> Result<BTreeMap<String, f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .filter_map(|(key, value)| match value.as_f64() {
            Some(number) => Some((key, number)),
            None => {
                tracing::debug!(metric = %key, value = %value, "Ignoring non-numeric metric");
                None
            }
        })
        .collect())
}
