//! Facial region catalogue.
//!
//! The backend keys every color and metric by a snake_case region name.
//! [`Region`] gives those names a closed type plus the Portuguese labels
//! used when rendering.

use serde::{Deserialize, Serialize};

/// A facial region the extraction service may report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    Cheek,
    Chin,
    Eyebrows,
    Forehead,
    HairRoot,
    Iris,
    Mouth,
    MouthContour,
    UnderEyeSkin,
}

/// Regions expected in an extraction result, in display order.
pub const EXPECTED_REGIONS: &[Region] = &[
    Region::Cheek,
    Region::Chin,
    Region::Eyebrows,
    Region::Forehead,
    Region::HairRoot,
    Region::Iris,
    Region::Mouth,
    Region::MouthContour,
    Region::UnderEyeSkin,
];

/// Regions shown on the per-region metric gauges, in display order.
pub const METRIC_REGIONS: &[Region] = &[
    Region::HairRoot,
    Region::UnderEyeSkin,
    Region::Iris,
    Region::Chin,
    Region::Forehead,
    Region::MouthContour,
    Region::Cheek,
    Region::Mouth,
];

/// Regions dropped from classification when a beard is detected.
pub const BEARD_SUPPRESSED: &[Region] = &[Region::Chin, Region::MouthContour];

impl Region {
    /// Wire name, e.g. `"hair_root"`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cheek => "cheek",
            Self::Chin => "chin",
            Self::Eyebrows => "eyebrows",
            Self::Forehead => "forehead",
            Self::HairRoot => "hair_root",
            Self::Iris => "iris",
            Self::Mouth => "mouth",
            Self::MouthContour => "mouth_contour",
            Self::UnderEyeSkin => "under_eye_skin",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        EXPECTED_REGIONS.iter().copied().find(|r| r.as_str() == raw)
    }

    /// Human-readable name used in tables and forms.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Cheek => "Bochecha",
            Self::Chin => "Queixo",
            Self::Eyebrows => "Sobrancelhas",
            Self::Forehead => "Testa",
            Self::HairRoot => "Raiz do Cabelo",
            Self::Iris => "Íris",
            Self::Mouth => "Boca",
            Self::MouthContour => "Contorno da Boca",
            Self::UnderEyeSkin => "Pele Abaixo dos Olhos",
        }
    }

    /// Upper-case label shown above a metric gauge.
    pub fn gauge_label(self) -> &'static str {
        match self {
            Self::Cheek => "BOCHECHA",
            Self::Chin => "QUEIXO",
            Self::Eyebrows => "SOBRANCELHAS",
            Self::Forehead => "TESTA",
            Self::HairRoot => "CABELO",
            Self::Iris => "OLHO",
            Self::Mouth => "BOCA (PREDOMINANTE)",
            Self::MouthContour => "BOCA (CONTORNO)",
            Self::UnderEyeSkin => "CAVIDADE OCULAR",
        }
    }

    /// Key into the `<metric>-details` maps of a classification result.
    ///
    /// `hair_root` is reported under the shorter `hair_` prefix.
    pub fn metric_key(self, metric: Metric) -> String {
        let prefix = match self {
            Self::HairRoot => "hair",
            other => other.as_str(),
        };
        format!("{prefix}_{}", metric.as_str())
    }

    pub fn is_beard_suppressed(self) -> bool {
        BEARD_SUPPRESSED.contains(&self)
    }
}

/// Display name for a raw region key, falling back to the key itself.
pub fn display_name_for(raw: &str) -> &str {
    Region::parse(raw).map(Region::display_name).unwrap_or(raw)
}

/// Per-region metric reported by the classification service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    /// Rendered as "temperatura".
    Saturation,
    /// Rendered as "profundidade".
    Brightness,
}

impl Metric {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Saturation => "saturation",
            Self::Brightness => "brightness",
        }
    }

    /// Name of the details map carrying this metric.
    pub fn details_key(self) -> &'static str {
        match self {
            Self::Saturation => "saturation-details",
            Self::Brightness => "brightness-details",
        }
    }
}
