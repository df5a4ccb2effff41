//! SVG report files: the season chart and per-region overlays.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use coloracao_core::chart::render_chart_svg;
use coloracao_core::classification::ClassificationResponse;
use coloracao_core::extraction::RegionCoordinates;
use coloracao_core::overlay::{render_overlay_document, Size, DEFAULT_CONTAINER};
use coloracao_core::regions::Region;

pub const CHART_WIDTH: f64 = 900.0;
pub const CHART_HEIGHT: f64 = 600.0;

/// One file to write: name relative to the report directory and contents.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportFile {
    pub name: String,
    pub contents: String,
}

/// Pixel size of an encoded image, read from its header.
pub fn image_dimensions(bytes: &[u8]) -> Option<Size> {
    let (w, h) = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()?;
    Some(Size::new(f64::from(w), f64::from(h)))
}

pub fn chart_file(label: &str, response: &ClassificationResponse) -> ReportFile {
    ReportFile {
        name: format!("grafico-{label}.svg"),
        contents: render_chart_svg(response, CHART_WIDTH, CHART_HEIGHT),
    }
}

/// Overlay document for one region, `None` when its geometry has nothing
/// drawable.
///
/// `natural` is the pixel size of the photo at `image_url`; region
/// coordinates are in that space.
pub fn overlay_file(
    prefix: &str,
    region: Region,
    image_url: &str,
    coords: &RegionCoordinates,
    natural: Size,
) -> Option<ReportFile> {
    let svg = render_overlay_document(image_url, natural, coords, DEFAULT_CONTAINER)?;
    Some(ReportFile {
        name: format!("{prefix}-{}.svg", region.as_str()),
        contents: svg,
    })
}

/// Write `files` under `dir`, creating it if needed.
pub async fn write_files(dir: &Path, files: &[ReportFile]) -> anyhow::Result<Vec<PathBuf>> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("criar diretório {}", dir.display()))?;

    let mut written = Vec::with_capacity(files.len());
    for file in files {
        let path = dir.join(&file.name);
        tokio::fs::write(&path, &file.contents)
            .await
            .with_context(|| format!("gravar {}", path.display()))?;
        tracing::debug!(path = %path.display(), bytes = file.contents.len(), "Report file written");
        written.push(path);
    }
    Ok(written)
}
