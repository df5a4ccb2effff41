//! Terminal rendering of extraction and classification results.

use std::fmt::Write;

use coloracao_core::classification::ClassificationResponse;
use coloracao_core::extraction::CombinedAnalysisResult;
use coloracao_core::gauge::{region_gauges, summary_gauges, Gauge};
use coloracao_core::regions::{display_name_for, Metric, EXPECTED_REGIONS};

const GAUGE_WIDTH: usize = 41;

/// Extraction tab: source image, coverage, per-region palettes and the
/// colors that will be classified (for a combined analysis, the frontal
/// map with the eye's iris).
pub fn extraction_tab(analysis: &CombinedAnalysisResult) -> String {
    let mut out = String::new();
    let frontal = &analysis.frontal;
    let missing = frontal.missing_regions();
    let found = EXPECTED_REGIONS.len() - missing.len();

    let _ = writeln!(out, "== Extração ==");
    if !frontal.output.image_url.is_empty() {
        let _ = writeln!(out, "Imagem: {}", frontal.output.image_url);
    }
    if let Some(eye) = analysis.eye.as_ref().filter(|e| !e.output.image_url.is_empty()) {
        let _ = writeln!(out, "Imagem do olho: {}", eye.output.image_url);
    }
    let _ = writeln!(out, "Regiões extraídas: {found}/{}", EXPECTED_REGIONS.len());
    if !missing.is_empty() {
        let names: Vec<&str> = missing.iter().map(|r| r.display_name()).collect();
        let _ = writeln!(out, "Regiões ausentes: {}", names.join(", "));
    }
    if analysis.beard_detected {
        let _ = writeln!(
            out,
            "Barba detectada: Queixo e Contorno da Boca não entram na classificação."
        );
    }

    for (key, detail) in analysis.displayed_regions() {
        let _ = writeln!(out, "\n{}", display_name_for(key));
        for (label, hex) in detail.color_palette.swatches() {
            if !hex.is_empty() {
                let _ = writeln!(out, "  {label:<8} {hex}");
            }
        }
    }

    let colors = analysis.classification_colors();
    if !colors.is_empty() {
        let _ = writeln!(out, "\nCores para classificação:");
        for (key, hex) in &colors {
            let _ = writeln!(out, "  {:<24} {hex}", display_name_for(key));
        }
    }
    out
}

fn gauges(out: &mut String, title: &str, gauges: &[Gauge]) {
    if gauges.is_empty() {
        return;
    }
    let _ = writeln!(out, "\n-- {title} --");
    for gauge in gauges {
        let _ = writeln!(out, "{}\n", gauge.render_ascii(GAUGE_WIDTH));
    }
}

/// Classification tab: season, metrics, gauges, candidates and the
/// decision table.
pub fn classification_tab(title: &str, response: &ClassificationResponse) -> String {
    let mut out = String::new();
    let result = &response.output.result;
    let details = &response.output.details;

    let _ = writeln!(out, "== {title} ==");
    let _ = writeln!(out, "Estação: {}", result.season);
    let _ = writeln!(out, "Brilho: {:.2}", result.brightness);
    let _ = writeln!(out, "Saturação: {:.2}", result.saturation);
    if let Some(confidence) = result.confidence {
        let _ = writeln!(out, "Confiança: {:.0}%", confidence * 100.0);
    }
    if let Some(explanation) = result.explanation.as_deref().filter(|e| !e.is_empty()) {
        let _ = writeln!(out, "Explicação: {explanation}");
    }

    gauges(&mut out, "Resultado", &summary_gauges(result.saturation, result.brightness));
    gauges(&mut out, "Temperatura por região", &region_gauges(details, Metric::Saturation));
    gauges(&mut out, "Profundidade por região", &region_gauges(details, Metric::Brightness));

    if !details.top_candidates.is_empty() {
        let _ = writeln!(out, "\n-- Melhores candidatas --");
        for (i, candidate) in details.top_candidates.iter().enumerate() {
            let _ = writeln!(
                out,
                "{}. {} (confiança {:.0}%, aderência {:.2}{})",
                i + 1,
                candidate.season,
                candidate.confidence * 100.0,
                candidate.match_score,
                if candidate.exact_match { ", exata" } else { "" },
            );
        }
    }

    if let Some(table) = &details.decision_table {
        let _ = writeln!(out, "\n-- Tabela de decisão --");
        let _ = writeln!(out, "● primária  ◐ secundária  ○ nenhuma");
        for (season, data) in table.ranked() {
            let marks: Vec<String> = data
                .dimensions()
                .iter()
                .map(|(name, m)| format!("{name} {}", m.kind.symbol()))
                .collect();
            let _ = writeln!(out, "{season:<20} {:>6.2}  {}", data.score, marks.join("  "));
        }
    }

    if !details.approximation_flags.is_empty() {
        let _ = writeln!(out, "\nAproximações: {}", details.approximation_flags.join(", "));
    }
    out
}
