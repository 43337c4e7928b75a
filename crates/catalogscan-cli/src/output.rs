use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use catalogscan_core::{PdfMetadata, VendorType};
use catalogscan_detect::{ConfidenceLevel, DetectionResult, DetectionStats, SignatureStore};
use catalogscan_ingest::IngestSummary;
use catalogscan_years::{DecadeBucket, YearRange};
use owo_colors::OwoColorize;

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

fn vendor_label(vendor: VendorType, color: ColorMode) -> String {
    let label = vendor.as_str().to_uppercase();
    if !color.enabled() {
        return label;
    }
    match vendor {
        VendorType::Depo => label.cyan().to_string(),
        VendorType::Yuto => label.magenta().to_string(),
        VendorType::Hushan => label.blue().to_string(),
        VendorType::Generic => label.dimmed().to_string(),
        VendorType::Unknown => label.red().to_string(),
    }
}

fn level_label(level: ConfidenceLevel, color: ColorMode) -> String {
    let label = level.as_str().replace('_', " ");
    if !color.enabled() {
        return label;
    }
    match level {
        ConfidenceLevel::VeryHigh | ConfidenceLevel::High => label.green().to_string(),
        ConfidenceLevel::Medium => label.yellow().to_string(),
        ConfidenceLevel::Low | ConfidenceLevel::VeryLow => label.red().to_string(),
    }
}

fn heading(w: &mut dyn Write, title: &str, color: ColorMode) -> std::io::Result<()> {
    let sep = "=".repeat(60);
    writeln!(w)?;
    if color.enabled() {
        writeln!(w, "{}", sep.bold())?;
        writeln!(w, "{}", title.bold())?;
        writeln!(w, "{}", sep.bold())?;
    } else {
        writeln!(w, "{}", sep)?;
        writeln!(w, "{}", title)?;
        writeln!(w, "{}", sep)?;
    }
    Ok(())
}

/// One line per document, plus the error or matched signatures beneath it.
pub fn print_detection(
    w: &mut dyn Write,
    metadata: &PdfMetadata,
    result: &DetectionResult,
    color: ColorMode,
) -> std::io::Result<()> {
    writeln!(
        w,
        "{} -> {} ({:.2}, {})",
        metadata.file_name(),
        vendor_label(result.vendor, color),
        result.confidence(),
        level_label(result.confidence_level(), color)
    )?;

    if let Some(error) = &result.evidence.error {
        if color.enabled() {
            writeln!(w, "    {}", error.red())?;
        } else {
            writeln!(w, "    {}", error)?;
        }
        return Ok(());
    }

    if !result.matched_signatures.is_empty() {
        let msg = format!(
            "matched {} ({} of {} signatures, {} pages read)",
            result.matched_signatures.join(", "),
            result.evidence.analysis_summary.matched_signatures,
            result.evidence.analysis_summary.total_signatures,
            result.evidence.pages_analyzed
        );
        if color.enabled() {
            writeln!(w, "    {}", msg.dimmed())?;
        } else {
            writeln!(w, "    {}", msg)?;
        }
    }
    Ok(())
}

pub fn print_detection_stats(
    w: &mut dyn Write,
    stats: &DetectionStats,
    color: ColorMode,
) -> std::io::Result<()> {
    heading(w, "SUMMARY", color)?;
    writeln!(w, "  Documents: {}", stats.total_detections)?;
    writeln!(w, "  Average confidence: {:.2}", stats.average_confidence)?;
    writeln!(w)?;
    for (vendor, count) in &stats.vendor_distribution {
        writeln!(w, "  {}: {}", vendor_label(*vendor, color), count)?;
    }
    writeln!(w)?;
    for (level, count) in &stats.confidence_distribution {
        writeln!(w, "  {}: {}", level_label(*level, color), count)?;
    }
    writeln!(w)?;
    Ok(())
}

/// Ingest totals followed by every file that did not come back valid.
pub fn print_ingest_summary(
    w: &mut dyn Write,
    dir: &Path,
    records: &[PdfMetadata],
    summary: &IngestSummary,
    color: ColorMode,
) -> std::io::Result<()> {
    heading(w, &format!("INGEST {}", dir.display()), color)?;
    writeln!(w, "  Files: {}", summary.total_files)?;
    if color.enabled() {
        writeln!(w, "  {} {}", "Valid:".green(), summary.valid_files)?;
    } else {
        writeln!(w, "  Valid: {}", summary.valid_files)?;
    }
    if summary.error_files > 0 {
        if color.enabled() {
            writeln!(w, "  {} {}", "Errors:".red(), summary.error_files)?;
        } else {
            writeln!(w, "  Errors: {}", summary.error_files)?;
        }
    }
    writeln!(w, "  Success rate: {}%", summary.success_rate)?;
    writeln!(
        w,
        "  Pages: {} (avg {} per file)",
        summary.total_pages, summary.avg_pages_per_file
    )?;
    writeln!(w, "  Size: {} MB", summary.total_size_mb)?;
    writeln!(w, "  Files with text: {}", summary.files_with_text)?;

    let failed: Vec<&PdfMetadata> = records.iter().filter(|m| !m.is_valid()).collect();
    if !failed.is_empty() {
        writeln!(w)?;
        for meta in failed {
            let reason = meta.error_message.as_deref().unwrap_or("");
            let line = format!("{} [{}] {}", meta.file_name(), meta.status, reason);
            if color.enabled() {
                writeln!(w, "  {}", line.yellow())?;
            } else {
                writeln!(w, "  {}", line)?;
            }
        }
    }
    writeln!(w)?;
    Ok(())
}

pub fn print_year_ranges(
    w: &mut dyn Write,
    text: &str,
    ranges: &[YearRange],
    color: ColorMode,
) -> std::io::Result<()> {
    if ranges.is_empty() {
        if color.enabled() {
            writeln!(w, "{}", format!("No years found in \"{}\"", text).dimmed())?;
        } else {
            writeln!(w, "No years found in \"{}\"", text)?;
        }
        return Ok(());
    }

    for range in ranges {
        let span = range.to_string();
        let span = if color.enabled() {
            span.green().to_string()
        } else {
            span
        };
        writeln!(
            w,
            "{:<20} {} [{}]",
            truncate(&range.original_text, 20),
            span,
            range.format_detected
        )?;
    }
    Ok(())
}

pub fn print_expanded_years(
    w: &mut dyn Write,
    years: &[i32],
    decades: &BTreeMap<String, DecadeBucket>,
    color: ColorMode,
) -> std::io::Result<()> {
    let list: Vec<String> = years.iter().map(i32::to_string).collect();
    writeln!(w)?;
    writeln!(w, "Years ({}): {}", years.len(), list.join(", "))?;
    for (label, bucket) in decades {
        let label = if color.enabled() {
            label.bold().to_string()
        } else {
            label.clone()
        };
        writeln!(
            w,
            "  {}: {} ({}-{})",
            label, bucket.count, bucket.min, bucket.max
        )?;
    }
    Ok(())
}

pub fn print_signatures(
    w: &mut dyn Write,
    store: &SignatureStore,
    color: ColorMode,
) -> std::io::Result<()> {
    for (vendor, signatures) in store.get_all() {
        writeln!(
            w,
            "{} ({} signatures)",
            vendor_label(*vendor, color),
            signatures.len()
        )?;
        for (index, signature) in signatures.iter().enumerate() {
            let name = signature
                .name
                .clone()
                .unwrap_or_else(|| format!("signature_{index}"));
            writeln!(w, "  {} (weight {})", name, signature.weight)?;
            for (kind, patterns) in [
                ("required", signature.required_patterns().collect::<Vec<_>>()),
                ("optional", signature.optional_patterns().collect()),
                ("exclusion", signature.exclusion_patterns().collect()),
            ] {
                if patterns.is_empty() {
                    continue;
                }
                let line = format!("{kind}: {}", patterns.join("  "));
                if color.enabled() {
                    writeln!(w, "    {}", line.dimmed())?;
                } else {
                    writeln!(w, "    {}", line)?;
                }
            }
        }
    }
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{head}...")
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalogscan_years::YearFormat;
    use chrono::Utc;

    const PLAIN: ColorMode = ColorMode(false);

    fn render(f: impl FnOnce(&mut dyn Write) -> std::io::Result<()>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn unknown_detection_shows_error() {
        let meta = PdfMetadata::new("/c/broken.pdf", 1, "h", Utc::now());
        let result = DetectionResult::unknown("no text could be extracted from PDF");
        let out = render(|w| print_detection(w, &meta, &result, PLAIN));
        assert!(out.starts_with("broken.pdf -> UNKNOWN (0.00, very low)"));
        assert!(out.contains("no text could be extracted from PDF"));
    }

    #[test]
    fn year_ranges_render_span_and_format() {
        let ranges = vec![YearRange::new(2003, 2008, "'03-'08", YearFormat::RangeShort)];
        let out = render(|w| print_year_ranges(w, "Fits '03-'08", &ranges, PLAIN));
        assert!(out.contains("2003-2008 [range_short]"));

        let out = render(|w| print_year_ranges(w, "no years", &[], PLAIN));
        assert_eq!(out, "No years found in \"no years\"\n");
    }

    #[test]
    fn signatures_listing_names_defaults() {
        let out = render(|w| print_signatures(w, &SignatureStore::defaults(), PLAIN));
        assert!(out.contains("DEPO (1 signatures)"));
        assert!(out.contains("signature_0 (weight 1.5)"));
    }

    #[test]
    fn truncate_is_char_safe() {
        assert_eq!(truncate("short", 20), "short");
        assert_eq!(truncate("añoañoañoaño", 8), "añoañ...");
    }
}
