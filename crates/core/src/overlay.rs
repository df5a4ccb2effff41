//! SVG overlays highlighting an extracted region on the source photo.
//!
//! Region geometry arrives in source-image pixels. The photo is shown in a
//! fixed-size frame with `object-fit: cover` semantics, so every point goes
//! through the same scale + offset that the cover fit applies to the image.

use std::fmt::Write as _;

use crate::extraction::{LandmarkShape, Point, ProcessedRegion, RegionCoordinates};

/// Frame the photo is displayed in.
pub const DEFAULT_CONTAINER: Size = Size {
    width: 400.0,
    height: 500.0,
};

/// Landmark shapes are drawn in yellow, sampled pixels in red on top.
pub const LANDMARK_COLOR: &str = "#ffe600";
pub const PROCESSED_COLOR: &str = "#ff0000";

const LANDMARK_OPACITY: f64 = 0.4;
const PROCESSED_OPACITY: f64 = 0.35;

const POLYGON_EXPANSION: f64 = 1.08;
const DONUT_INNER_EXPANSION: f64 = 1.04;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/* --------------------------------------------------------------------------
Cover fit
-------------------------------------------------------------------------- */

/// Scale and offset mapping source pixels into the display frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoverFit {
    pub scale: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl Default for CoverFit {
    fn default() -> Self {
        Self {
            scale: 1.0,
            offset_x: 0.0,
            offset_y: 0.0,
        }
    }
}

impl CoverFit {
    /// Fit computed from the image's natural size and the frame size.
    ///
    /// A wider-than-frame image fills the height and is cropped (centred)
    /// horizontally; otherwise it fills the width and is cropped vertically.
    /// Degenerate sizes yield the identity fit.
    pub fn compute(natural: Size, container: Size) -> Self {
        if natural.width <= 0.0 || natural.height <= 0.0 || container.height <= 0.0 {
            return Self::default();
        }
        let image_aspect = natural.width / natural.height;
        let container_aspect = container.width / container.height;

        if image_aspect > container_aspect {
            let scale = container.height / natural.height;
            Self {
                scale,
                offset_x: (container.width - natural.width * scale) / 2.0,
                offset_y: 0.0,
            }
        } else {
            let scale = container.width / natural.width;
            Self {
                scale,
                offset_x: 0.0,
                offset_y: (container.height - natural.height * scale) / 2.0,
            }
        }
    }

    pub fn apply(&self, [x, y]: Point) -> Point {
        [x * self.scale + self.offset_x, y * self.scale + self.offset_y]
    }

    pub fn apply_all(&self, points: &[Point]) -> Vec<Point> {
        points.iter().map(|p| self.apply(*p)).collect()
    }
}

/// Push every point away from the centroid by `factor`.
pub fn expand_polygon(points: &[Point], factor: f64) -> Vec<Point> {
    if points.is_empty() {
        return Vec::new();
    }
    let n = points.len() as f64;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(ax, ay), [x, y]| (ax + x, ay + y));
    let (cx, cy) = (sx / n, sy / n);
    points
        .iter()
        .map(|[x, y]| [cx + (x - cx) * factor, cy + (y - cy) * factor])
        .collect()
}

/* --------------------------------------------------------------------------
SVG rendering
-------------------------------------------------------------------------- */

fn points_attr(points: &[Point]) -> String {
    points
        .iter()
        .map(|[x, y]| format!("{x:.2},{y:.2}"))
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn escape_attr(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn landmark_fragment(shape: &LandmarkShape, fit: &CoverFit, container: Size) -> Option<String> {
    let style = format!(
        r#"fill="{LANDMARK_COLOR}" fill-opacity="{LANDMARK_OPACITY}" stroke="none" filter="url(#overlay-blur)""#
    );
    match shape {
        LandmarkShape::Polygon { coordinates } if !coordinates.is_empty() => {
            let points = expand_polygon(&fit.apply_all(coordinates), POLYGON_EXPANSION);
            Some(format!(r#"<polygon points="{}" {style}/>"#, points_attr(&points)))
        }
        LandmarkShape::Circle { metadata } => {
            let [cx, cy] = fit.apply(metadata.center);
            let r = metadata.radius * fit.scale * POLYGON_EXPANSION;
            Some(format!(r#"<circle cx="{cx:.2}" cy="{cy:.2}" r="{r:.2}" {style}/>"#))
        }
        LandmarkShape::Donut { coordinates }
            if !coordinates.outer.is_empty() && !coordinates.inner.is_empty() =>
        {
            let outer = expand_polygon(&fit.apply_all(&coordinates.outer), POLYGON_EXPANSION);
            let inner = expand_polygon(&fit.apply_all(&coordinates.inner), DONUT_INNER_EXPANSION);
            Some(format!(
                concat!(
                    r#"<g><defs><mask id="landmark-mask">"#,
                    r#"<rect x="0" y="0" width="{w}" height="{h}" fill="white"/>"#,
                    r#"<polygon points="{inner}" fill="black"/></mask></defs>"#,
                    r#"<polygon points="{outer}" {style} mask="url(#landmark-mask)"/></g>"#
                ),
                w = container.width,
                h = container.height,
                inner = points_attr(&inner),
                outer = points_attr(&outer),
                style = style,
            ))
        }
        _ => None,
    }
}

fn processed_polygons(region: &ProcessedRegion, fit: &CoverFit, fill: &str, extra: &str) -> String {
    region
        .polygons()
        .into_iter()
        .filter(|poly| poly.len() >= 2)
        .map(|poly| {
            format!(
                r#"<polygon points="{}" fill="{fill}"{extra}/>"#,
                points_attr(&fit.apply_all(poly))
            )
        })
        .collect()
}

/// Overlay for one region, sized to `container`. `None` when the region has
/// no drawable geometry.
pub fn render_region_overlay(
    coords: &RegionCoordinates,
    fit: &CoverFit,
    container: Size,
) -> Option<String> {
    let landmark = coords
        .landmark_region
        .as_ref()
        .and_then(|shape| landmark_fragment(shape, fit, container));
    let processed = coords.processed_region.as_ref().map(|region| {
        processed_polygons(
            region,
            fit,
            PROCESSED_COLOR,
            &format!(r#" fill-opacity="{PROCESSED_OPACITY}" stroke="none""#),
        )
    });
    let processed = processed.filter(|s| !s.is_empty());

    if landmark.is_none() && processed.is_none() {
        return None;
    }

    let mut svg = String::new();
    let _ = write!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = container.width,
        h = container.height,
    );
    svg.push_str(r#"<defs><filter id="overlay-blur"><feGaussianBlur stdDeviation="7"/></filter>"#);
    // Yellow never shows underneath the red sampled pixels.
    let _ = write!(
        svg,
        r#"<mask id="yellow-cutout-mask"><rect x="0" y="0" width="{}" height="{}" fill="white"/>"#,
        container.width, container.height
    );
    if let Some(region) = coords.processed_region.as_ref() {
        svg.push_str(&processed_polygons(region, fit, "black", ""));
    }
    svg.push_str("</mask></defs>");

    if let Some(landmark) = landmark {
        let _ = write!(svg, r#"<g mask="url(#yellow-cutout-mask)">{landmark}</g>"#);
    }
    if let Some(processed) = processed {
        svg.push_str(&processed);
    }
    svg.push_str("</svg>");
    Some(svg)
}

/// Standalone document: the photo cropped like `object-fit: cover` with
/// the region overlay on top.
pub fn render_overlay_document(
    image_url: &str,
    natural: Size,
    coords: &RegionCoordinates,
    container: Size,
) -> Option<String> {
    let fit = CoverFit::compute(natural, container);
    let overlay = render_region_overlay(coords, &fit, container)?;
    let mut doc = String::new();
    let _ = write!(
        doc,
        concat!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            r#"<image href="{href}" x="0" y="0" width="{w}" height="{h}" preserveAspectRatio="xMidYMid slice" filter="grayscale(1)"/>"#,
            "{overlay}</svg>"
        ),
        w = container.width,
        h = container.height,
        href = escape_attr(image_url),
        overlay = overlay,
    );
    Some(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::{CircleMetadata, DonutRings};

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn wide_image_fills_height_and_centres_horizontally() {
        let fit = CoverFit::compute(Size::new(1000.0, 500.0), DEFAULT_CONTAINER);
        assert!(close(fit.scale, 1.0));
        assert!(close(fit.offset_x, (400.0 - 1000.0) / 2.0));
        assert!(close(fit.offset_y, 0.0));
    }

    #[test]
    fn tall_image_fills_width_and_centres_vertically() {
        let fit = CoverFit::compute(Size::new(800.0, 1200.0), DEFAULT_CONTAINER);
        assert!(close(fit.scale, 0.5));
        assert!(close(fit.offset_x, 0.0));
        assert!(close(fit.offset_y, (500.0 - 600.0) / 2.0));
        assert_eq!(fit.apply([400.0, 600.0]), [200.0, 250.0]);
    }

    #[test]
    fn degenerate_natural_size_is_identity() {
        assert_eq!(CoverFit::compute(Size::new(0.0, 10.0), DEFAULT_CONTAINER), CoverFit::default());
    }

    #[test]
    fn expansion_keeps_centroid_and_scales_distance() {
        let square = [[0.0, 0.0], [2.0, 0.0], [2.0, 2.0], [0.0, 2.0]];
        let expanded = expand_polygon(&square, 1.5);
        assert_eq!(expanded[0], [-0.5, -0.5]);
        assert_eq!(expanded[2], [2.5, 2.5]);
        assert!(expand_polygon(&[], 2.0).is_empty());
    }

    #[test]
    fn circle_radius_scaled_and_expanded() {
        let coords = RegionCoordinates {
            landmark_region: Some(LandmarkShape::Circle {
                metadata: CircleMetadata {
                    center: [100.0, 100.0],
                    radius: 10.0,
                },
            }),
            processed_region: None,
        };
        let fit = CoverFit {
            scale: 2.0,
            offset_x: 5.0,
            offset_y: 0.0,
        };
        let svg = render_region_overlay(&coords, &fit, DEFAULT_CONTAINER).unwrap();
        assert!(svg.contains(r#"cx="205.00" cy="200.00" r="21.60""#), "{svg}");
    }

    #[test]
    fn donut_uses_inner_ring_mask() {
        let coords = RegionCoordinates {
            landmark_region: Some(LandmarkShape::Donut {
                coordinates: DonutRings {
                    outer: vec![[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]],
                    inner: vec![[4.0, 4.0], [6.0, 4.0], [6.0, 6.0], [4.0, 6.0]],
                },
            }),
            processed_region: None,
        };
        let svg = render_region_overlay(&coords, &CoverFit::default(), DEFAULT_CONTAINER).unwrap();
        assert!(svg.contains(r#"<mask id="landmark-mask">"#));
        assert!(svg.contains(r#"mask="url(#landmark-mask)""#));
    }

    #[test]
    fn processed_polygons_cut_out_of_landmark() {
        let coords = RegionCoordinates {
            landmark_region: Some(LandmarkShape::Polygon {
                coordinates: vec![[0.0, 0.0], [10.0, 0.0], [5.0, 10.0]],
            }),
            processed_region: Some(ProcessedRegion::Multi(vec![
                vec![[1.0, 1.0], [2.0, 1.0], [2.0, 2.0]],
                vec![[3.0, 3.0], [4.0, 3.0], [4.0, 4.0]],
            ])),
        };
        let svg = render_region_overlay(&coords, &CoverFit::default(), DEFAULT_CONTAINER).unwrap();
        assert_eq!(svg.matches(r#"fill="black""#).count(), 2);
        assert_eq!(svg.matches(PROCESSED_COLOR).count(), 2);
        assert!(svg.contains(r#"<g mask="url(#yellow-cutout-mask)">"#));
    }

    #[test]
    fn nothing_drawable_yields_none() {
        let coords = RegionCoordinates {
            landmark_region: Some(LandmarkShape::Unsupported),
            processed_region: Some(ProcessedRegion::Single(Vec::new())),
        };
        assert!(render_region_overlay(&coords, &CoverFit::default(), DEFAULT_CONTAINER).is_none());
    }

    #[test]
    fn document_escapes_image_url() {
        let coords = RegionCoordinates {
            landmark_region: Some(LandmarkShape::Polygon {
                coordinates: vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]],
            }),
            processed_region: None,
        };
        let doc = render_overlay_document(
            "https://cdn/x.png?a=1&b=2",
            Size::new(400.0, 500.0),
            &coords,
            DEFAULT_CONTAINER,
        )
        .unwrap();
        assert!(doc.contains("a=1&amp;b=2"));
        assert!(doc.contains(r#"preserveAspectRatio="xMidYMid slice""#));
    }
}
