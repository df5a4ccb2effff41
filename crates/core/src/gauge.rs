//! Slider-style gauges and the derived intensity metric.
//!
//! Every metric is on a 0–100 scale with a neutral midpoint at 50. A gauge
//! places a marker on that scale between a left, center and right label.

use crate::classification::ClassificationDetails;
use crate::regions::{Metric, Region, METRIC_REGIONS};

/// Neutral point on both axes.
const NEUTRAL: f64 = 50.0;

/// Intensity is held inside this band so the marker never sits on the
/// gauge extremes.
const INTENSITY_FLOOR: f64 = 25.0;
const INTENSITY_CEIL: f64 = 75.0;

/// Tick positions drawn under every gauge.
pub const TICKS: [u8; 5] = [0, 25, 50, 75, 100];

/* --------------------------------------------------------------------------
Intensity
-------------------------------------------------------------------------- */

/// Unclamped intensity for temperature `t` and depth `p`.
///
/// The distance from the neutral point `(50, 50)` is normalised by the
/// distance to a corner. When both coordinates lie on the same side of
/// neutral (warm + light, cool + dark) intensity falls as the distance
/// grows; on opposite sides it rises with the distance. The neutral point
/// itself takes the same-side branch and scores 100.
pub fn raw_intensity(t: f64, p: f64) -> f64 {
    let dx = t - NEUTRAL;
    let dy = p - NEUTRAL;
    let normalised = dx.hypot(dy) / NEUTRAL.hypot(NEUTRAL);

    if dx * dy >= 0.0 {
        100.0 * (1.0 - normalised)
    } else {
        100.0 * normalised
    }
}

/// Intensity gauge value: the raw value clamped to `[25, 75]`, rounded and
/// mirrored (`100 - round(intensity)`).
pub fn calcular_intensidade(t: f64, p: f64) -> u8 {
    let clamped = raw_intensity(t, p).clamp(INTENSITY_FLOOR, INTENSITY_CEIL);
    (100.0 - clamped.round()) as u8
}

/* --------------------------------------------------------------------------
Gauges
-------------------------------------------------------------------------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GaugeKind {
    /// Driven by saturation.
    Temperature,
    /// Driven by brightness.
    Depth,
    /// Derived from temperature and depth.
    Intensity,
}

impl GaugeKind {
    /// `(left, center, right)` labels.
    pub fn labels(self) -> (&'static str, &'static str, &'static str) {
        match self {
            Self::Temperature => ("FRIO", "N", "QUENTE"),
            Self::Depth => ("ESCURO", "N", "CLARO"),
            Self::Intensity => ("SUAVE", "N", "BRILHANTE"),
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Temperature => "Temperatura",
            Self::Depth => "Profundidade",
            Self::Intensity => "Intensidade",
        }
    }
}

/// One labelled slider.
#[derive(Debug, Clone, PartialEq)]
pub struct Gauge {
    pub label: String,
    pub kind: GaugeKind,
    pub value: f64,
}

impl Gauge {
    pub fn new(label: impl Into<String>, kind: GaugeKind, value: f64) -> Self {
        Self {
            label: label.into(),
            kind,
            value,
        }
    }

    /// Marker position as a percentage of the track, clamped to `[0, 100]`.
    pub fn position(&self) -> f64 {
        if self.value.is_finite() {
            self.value.clamp(0.0, 100.0)
        } else {
            NEUTRAL
        }
    }

    /// Text rendering: label, track with marker, labels, value.
    ///
    /// `width` is the number of cells in the track (minimum 11).
    pub fn render_ascii(&self, width: usize) -> String {
        let width = width.max(11);
        let last = width - 1;
        let marker = ((self.position() / 100.0) * last as f64).round() as usize;

        let mut track: Vec<char> = vec!['─'; width];
        for tick in TICKS {
            let idx = ((f64::from(tick) / 100.0) * last as f64).round() as usize;
            track[idx] = '┼';
        }
        track[marker.min(last)] = '●';
        let track: String = track.into_iter().collect();

        let (left, center, right) = self.kind.labels();
        let gap = width.saturating_sub(left.chars().count() + center.len() + right.chars().count());
        let left_gap = gap / 2;
        let right_gap = gap - left_gap;

        format!(
            "{label}\n{track}\n{left}{lpad}{center}{rpad}{right}\n{value:.2}",
            label = self.label,
            lpad = " ".repeat(left_gap),
            rpad = " ".repeat(right_gap),
            value = self.value,
        )
    }
}

/// Per-region gauges for one metric tab, in the display order.
///
/// Regions without a reported value are skipped.
pub fn region_gauges(details: &ClassificationDetails, metric: Metric) -> Vec<Gauge> {
    let kind = match metric {
        Metric::Saturation => GaugeKind::Temperature,
        Metric::Brightness => GaugeKind::Depth,
    };
    METRIC_REGIONS
        .iter()
        .filter_map(|region: &Region| {
            details
                .metric(*region, metric)
                .map(|value| Gauge::new(region.gauge_label(), kind, value))
        })
        .collect()
}

/// The three summary gauges for a final result.
pub fn summary_gauges(saturation: f64, brightness: f64) -> [Gauge; 3] {
    [
        Gauge::new("TEMPERATURA", GaugeKind::Temperature, saturation),
        Gauge::new("PROFUNDIDADE", GaugeKind::Depth, brightness),
        Gauge::new(
            "INTENSIDADE",
            GaugeKind::Intensity,
            f64::from(calcular_intensidade(saturation, brightness)),
        ),
    ]
}
