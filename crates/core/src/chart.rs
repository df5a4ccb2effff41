//! Saturation × brightness scatter chart.
//!
//! Both axes run 0–100. The plane is partitioned into the twelve seasonal
//! areas; region measurements and the final result are plotted on top.

use std::fmt::Write as _;

use crate::classification::ClassificationResponse;
use crate::overlay::escape_attr;
use crate::regions::{display_name_for, Metric};

/// A seasonal area in chart coordinates (`[saturation, brightness]`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeasonArea {
    pub name: &'static str,
    pub points: &'static [[f64; 2]],
}

impl SeasonArea {
    /// Vertex average, used to place the area label.
    pub fn centroid(&self) -> [f64; 2] {
        let n = self.points.len().max(1) as f64;
        let (sx, sy) = self
            .points
            .iter()
            .fold((0.0, 0.0), |(ax, ay), [x, y]| (ax + x, ay + y));
        [sx / n, sy / n]
    }

    /// Even-odd ray cast. Points on a shared edge may land in either
    /// neighbour.
    pub fn contains(&self, [x, y]: [f64; 2]) -> bool {
        let pts = self.points;
        let mut inside = false;
        let mut j = pts.len().wrapping_sub(1);
        for i in 0..pts.len() {
            let [xi, yi] = pts[i];
            let [xj, yj] = pts[j];
            if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
                inside = !inside;
            }
            j = i;
        }
        inside
    }
}

pub const SEASON_AREAS: [SeasonArea; 12] = [
    SeasonArea {
        name: "Verão Claro",
        points: &[[0.0, 100.0], [25.0, 75.0], [50.0, 70.0], [50.0, 100.0]],
    },
    SeasonArea {
        name: "Verão Frio",
        points: &[[0.0, 100.0], [0.0, 50.0], [30.0, 50.0], [25.0, 75.0]],
    },
    SeasonArea {
        name: "Verão Suave",
        points: &[[25.0, 75.0], [30.0, 50.0], [50.0, 50.0], [50.0, 70.0]],
    },
    SeasonArea {
        name: "Primavera Clara",
        points: &[[50.0, 100.0], [50.0, 70.0], [75.0, 75.0], [100.0, 100.0]],
    },
    SeasonArea {
        name: "Primavera Quente",
        points: &[[75.0, 75.0], [70.0, 50.0], [100.0, 50.0], [100.0, 100.0]],
    },
    SeasonArea {
        name: "Primavera Brilhante",
        points: &[[50.0, 70.0], [50.0, 50.0], [70.0, 50.0], [75.0, 75.0]],
    },
    SeasonArea {
        name: "Inverno Frio",
        points: &[[0.0, 50.0], [0.0, 0.0], [25.0, 25.0], [30.0, 50.0]],
    },
    SeasonArea {
        name: "Inverno Escuro",
        points: &[[25.0, 25.0], [0.0, 0.0], [50.0, 0.0], [50.0, 30.0]],
    },
    SeasonArea {
        name: "Inverno Brilhante",
        points: &[[30.0, 50.0], [25.0, 25.0], [50.0, 30.0], [50.0, 50.0]],
    },
    SeasonArea {
        name: "Outono Escuro",
        points: &[[50.0, 30.0], [50.0, 0.0], [100.0, 0.0], [75.0, 25.0]],
    },
    SeasonArea {
        name: "Outono Quente",
        points: &[[70.0, 50.0], [75.0, 25.0], [100.0, 0.0], [100.0, 50.0]],
    },
    SeasonArea {
        name: "Outono Suave",
        points: &[[50.0, 50.0], [50.0, 30.0], [75.0, 25.0], [70.0, 50.0]],
    },
];

/// First seasonal area containing `point`.
pub fn area_containing(point: [f64; 2]) -> Option<&'static SeasonArea> {
    SEASON_AREAS.iter().find(|area| area.contains(point))
}

/* --------------------------------------------------------------------------
Layout
-------------------------------------------------------------------------- */

/// Linear map from a value domain onto a pixel range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearScale {
    pub domain: (f64, f64),
    pub range: (f64, f64),
}

impl LinearScale {
    pub fn new(domain: (f64, f64), range: (f64, f64)) -> Self {
        Self { domain, range }
    }

    pub fn map(&self, value: f64) -> f64 {
        let (d0, d1) = self.domain;
        let (r0, r1) = self.range;
        if d1 == d0 {
            return r0;
        }
        r0 + (value - d0) / (d1 - d0) * (r1 - r0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margin {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

pub const DEFAULT_MARGIN: Margin = Margin {
    top: 20.0,
    right: 0.0,
    bottom: 60.0,
    left: 20.0,
};

/// Square plot area centred inside the space left by the margins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotArea {
    pub x_offset: f64,
    pub y_offset: f64,
    pub size: f64,
}

impl PlotArea {
    pub fn compute(width: f64, height: f64, margin: Margin) -> Self {
        let available_w = (width - margin.left - margin.right).max(0.0);
        let available_h = (height - margin.top - margin.bottom).max(0.0);
        let size = available_w.min(available_h);
        Self {
            x_offset: margin.left + (available_w - size) / 2.0,
            y_offset: margin.top + (available_h - size) / 2.0,
            size,
        }
    }

    pub fn x_scale(&self) -> LinearScale {
        LinearScale::new((0.0, 100.0), (0.0, self.size))
    }

    /// Inverted: brightness 100 is the top edge.
    pub fn y_scale(&self) -> LinearScale {
        LinearScale::new((0.0, 100.0), (self.size, 0.0))
    }
}

/* --------------------------------------------------------------------------
Data points
-------------------------------------------------------------------------- */

pub const FINAL_RESULT_KEY: &str = "final_result";
pub const FINAL_RESULT_COLOR: &str = "#ff8000";

#[derive(Debug, Clone, PartialEq)]
pub struct ChartPoint {
    pub region: String,
    pub display_name: String,
    pub saturation: f64,
    pub brightness: f64,
    pub color: String,
}

impl ChartPoint {
    pub fn is_final_result(&self) -> bool {
        self.region == FINAL_RESULT_KEY
    }
}

/// One point per classified region that has both metrics, then the final
/// result.
pub fn chart_points(response: &ClassificationResponse) -> Vec<ChartPoint> {
    let output = &response.output;
    let mut points: Vec<ChartPoint> = output
        .colors
        .iter()
        .filter_map(|(region, color)| {
            let saturation = output.details.metric_for_key(region, Metric::Saturation)?;
            let brightness = output.details.metric_for_key(region, Metric::Brightness)?;
            Some(ChartPoint {
                region: region.clone(),
                display_name: display_name_for(region).to_string(),
                saturation,
                brightness,
                color: color.clone(),
            })
        })
        .collect();

    points.push(ChartPoint {
        region: FINAL_RESULT_KEY.to_string(),
        display_name: "Resultado Final".to_string(),
        saturation: output.result.saturation,
        brightness: output.result.brightness,
        color: FINAL_RESULT_COLOR.to_string(),
    });
    points
}

/* --------------------------------------------------------------------------
SVG
-------------------------------------------------------------------------- */

fn area_path(area: &SeasonArea, x: &LinearScale, y: &LinearScale) -> String {
    let mut d = String::new();
    for (i, [px, py]) in area.points.iter().enumerate() {
        let cmd = if i == 0 { 'M' } else { 'L' };
        let _ = write!(d, "{cmd} {:.2} {:.2} ", x.map(*px), y.map(*py));
    }
    d.push('Z');
    d
}

/// Full chart document at `width × height`.
pub fn render_chart_svg(response: &ClassificationResponse, width: f64, height: f64) -> String {
    let plot = PlotArea::compute(width, height, DEFAULT_MARGIN);
    let (xs, ys) = (plot.x_scale(), plot.y_scale());
    let size = plot.size;

    let mut svg = String::new();
    let _ = write!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}">"#
    );
    svg.push_str(concat!(
        "<defs>",
        r##"<linearGradient id="sb-gradient-x" x1="0%" y1="0%" x2="100%" y2="0%"><stop offset="0%" stop-color="#808080"/><stop offset="100%" stop-color="#ff8000"/></linearGradient>"##,
        r##"<linearGradient id="sb-gradient-y" x1="0%" y1="100%" x2="0%" y2="0%"><stop offset="0%" stop-color="#000"/><stop offset="100%" stop-color="#fff"/></linearGradient>"##,
        "</defs>"
    ));
    let _ = write!(
        svg,
        r#"<g transform="translate({:.2},{:.2})">"#,
        plot.x_offset, plot.y_offset
    );
    let _ = write!(
        svg,
        r#"<rect x="0" y="0" width="{size:.2}" height="{size:.2}" fill="url(#sb-gradient-x)" opacity="0.8"/><rect x="0" y="0" width="{size:.2}" height="{size:.2}" fill="url(#sb-gradient-y)" opacity="0.8" style="mix-blend-mode:multiply"/>"#
    );

    for tick in (0..=100).step_by(10) {
        let v = f64::from(tick);
        let _ = write!(
            svg,
            r##"<line x1="{x:.2}" y1="0" x2="{x:.2}" y2="{size:.2}" stroke="#e0e0e0" stroke-opacity="0.3"/><line x1="0" y1="{y:.2}" x2="{size:.2}" y2="{y:.2}" stroke="#e0e0e0" stroke-opacity="0.3"/>"##,
            x = xs.map(v),
            y = ys.map(v),
        );
        let _ = write!(
            svg,
            r#"<text x="{x:.2}" y="{below:.2}" text-anchor="middle" font-size="10">{tick}</text><text x="-6" y="{y:.2}" text-anchor="end" font-size="10">{tick}</text>"#,
            x = xs.map(v),
            below = size + 14.0,
            y = ys.map(v) + 3.0,
        );
    }

    for area in &SEASON_AREAS {
        let [cx, cy] = area.centroid();
        let _ = write!(
            svg,
            r##"<path d="{d}" fill="transparent" stroke="#ffffff" stroke-width="1.5" stroke-dasharray="4,2" opacity="0.7"><title>{name}</title></path><text x="{lx:.2}" y="{ly:.2}" text-anchor="middle" font-size="10" font-weight="600" fill="#ffffff" opacity="0.85">{name}</text>"##,
            d = area_path(area, &xs, &ys),
            name = area.name,
            lx = xs.map(cx),
            ly = ys.map(cy),
        );
    }

    for point in chart_points(response) {
        let (cx, cy) = (xs.map(point.saturation), ys.map(point.brightness));
        let (shadow_r, r, stroke_w) = if point.is_final_result() {
            (11.0, 8.0, 3.5)
        } else {
            (9.0, 6.0, 2.0)
        };
        let (border, shadow) = if point.brightness < 80.0 {
            ("#fff", "#0008")
        } else {
            ("#111", "#fff8")
        };
        let _ = write!(
            svg,
            r#"<circle cx="{cx:.2}" cy="{cy:.2}" r="{shadow_r}" fill="{shadow}" opacity="0.35"/><circle cx="{cx:.2}" cy="{cy:.2}" r="{r}" fill="{fill}" stroke="{border}" stroke-width="{stroke_w}"><title>{title}: {sat:.1} / {bri:.1}</title></circle>"#,
            fill = escape_attr(&point.color),
            title = escape_attr(&point.display_name),
            sat = point.saturation,
            bri = point.brightness,
        );
    }

    let _ = write!(
        svg,
        r#"<text x="{:.2}" y="{:.2}" text-anchor="middle" font-size="12">Saturação</text>"#,
        size / 2.0,
        size + 40.0
    );
    let _ = write!(
        svg,
        r#"<text transform="translate(-14,{:.2}) rotate(-90)" text-anchor="middle" font-size="12">Brilho</text>"#,
        size / 2.0
    );
    svg.push_str("</g></svg>");
    svg
}
