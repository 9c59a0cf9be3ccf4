use printpdf::{
    BuiltinFont, Color, Line, Mm, PdfDocument, PdfLayerReference, Point, Rect, Rgb,
};
use std::io::{BufWriter, Cursor};

use super::billing::format_cents;
use super::metrics::{ChartStyle, MetricChart};
use super::ReportDocument;
use crate::error::{InsightsError, Result};
use crate::model::DataOrigin;

const PAGE_W: f32 = 210.0;
const PAGE_H: f32 = 297.0;
const LEFT:   f32 = 20.0;
const RIGHT:  f32 = 190.0;

const COMPUTE_WIDTHS:  [f32; 5] = [46.0, 44.0, 30.0, 28.0, 20.0];
const DATABASE_WIDTHS: [f32; 5] = [46.0, 44.0, 30.0, 28.0, 20.0];

// ======================================================
// PDF OUTPUT
// ======================================================

/// Render the document to PDF bytes. A4, paginated, builtin fonts only.
pub fn render_pdf(document: &ReportDocument) -> Result<Vec<u8>> {
    let cover = &document.cover;

    let (doc, page1, layer1) = PdfDocument::new(
        ascii(&format!("{} {} Report", cover.provider, cover.category)),
        Mm(PAGE_W),
        Mm(PAGE_H),
        "Layer 1",
    );

    let mut page_idx  = page1;
    let mut layer_idx = layer1;
    let mut pages     = vec![(page1, layer1)];

    let font_bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| render_error("Font error", e))?;
    let font_regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| render_error("Font error", e))?;
    let font_mono = doc
        .add_builtin_font(BuiltinFont::Courier)
        .map_err(|e| render_error("Font error", e))?;

    let top_start     = Mm(277.0);
    let bottom_margin = Mm(22.0);
    let line_height_lg = Mm(8.0);
    let line_height_md = Mm(6.0);
    let line_height_sm = Mm(5.0);

    let mut y = top_start;

    macro_rules! current_layer {
        () => {
            doc.get_page(page_idx).get_layer(layer_idx)
        };
    }

    macro_rules! new_page_if_needed {
        ($needed:expr) => {
            if y < bottom_margin + $needed {
                let (np, nl) = doc.add_page(Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
                page_idx  = np;
                layer_idx = nl;
                pages.push((np, nl));
                y = top_start;
            }
        };
    }

    let draw_rule = |layer: &PdfLayerReference, y_pos: Mm| {
        layer.set_outline_color(rgb(0.75, 0.75, 0.75));
        layer.set_outline_thickness(0.5);
        layer.add_line(polyline(&[(LEFT, y_pos.0), (RIGHT, y_pos.0)]));
    };

    // ══════════════════════════════════════════════
    // COVER
    // ══════════════════════════════════════════════
    {
        let layer = current_layer!();

        layer.set_fill_color(rgb(0.10, 0.10, 0.10));
        layer.use_text("Cloud Insights", 22.0, Mm(LEFT), y, &font_bold);
        layer.use_text(ascii(&cover.category), 14.0, Mm(84.0), y, &font_regular);

        y -= line_height_lg;
        draw_rule(&layer, y);
        y -= line_height_md;

        layer.use_text(
            ascii(&format!(
                "Provider: {}   |   Generated: {}   |   ID: {}",
                cover.provider,
                cover.generated_at_human,
                &cover.report_id[..cover.report_id.len().min(8)],
            )),
            8.0,
            Mm(LEFT),
            y,
            &font_regular,
        );

        y -= line_height_lg;
    }

    macro_rules! section_heading {
        ($title:expr) => {{
            new_page_if_needed!(Mm(24.0));
            y -= line_height_md;
            let layer = current_layer!();
            layer.set_fill_color(rgb(0.10, 0.10, 0.10));
            layer.use_text($title, 11.0, Mm(LEFT), y, &font_bold);
            y -= Mm(1.5);
            draw_rule(&current_layer!(), y);
            y -= line_height_sm;
        }};
    }

    macro_rules! kv_line {
        ($label:expr, $value:expr) => {{
            new_page_if_needed!(line_height_sm);
            let layer = current_layer!();
            layer.set_fill_color(rgb(0.35, 0.35, 0.35));
            layer.use_text($label, 8.5, Mm(LEFT + 2.0), y, &font_bold);
            layer.set_fill_color(rgb(0.10, 0.10, 0.10));
            layer.use_text(ascii($value), 8.5, Mm(70.0), y, &font_regular);
            y -= line_height_sm;
        }};
    }

    macro_rules! mono_line {
        ($text:expr) => {{
            new_page_if_needed!(line_height_sm);
            let layer = current_layer!();
            layer.set_fill_color(rgb(0.20, 0.20, 0.20));
            layer.use_text(ascii($text), 7.5, Mm(LEFT + 2.0), y, &font_mono);
            y -= line_height_sm;
        }};
    }

    // Shaded note across the full width, amber for sample data.
    macro_rules! origin_banner {
        ($origin:expr, $text:expr) => {{
            new_page_if_needed!(Mm(12.0));
            let layer = current_layer!();
            let (background, foreground) = match $origin {
                DataOrigin::Sample => (rgb(1.0, 0.96, 0.85), rgb(0.70, 0.42, 0.02)),
                DataOrigin::Live   => (rgb(0.90, 0.97, 0.92), rgb(0.13, 0.50, 0.28)),
            };
            layer.set_fill_color(background);
            layer.add_rect(Rect::new(Mm(LEFT), y - Mm(3.0), Mm(RIGHT), y + Mm(4.5)));
            layer.set_fill_color(foreground);
            layer.use_text(ascii($text), 8.5, Mm(LEFT + 2.0), y, &font_bold);
            y -= Mm(9.0);
        }};
    }

    macro_rules! resource_table {
        ($table:expr, $widths:expr) => {{
            let table = $table;
            let widths: &[f32] = &$widths;
            new_page_if_needed!(Mm(12.0));
            {
                let layer = current_layer!();
                layer.set_fill_color(rgb(0.92, 0.93, 0.95));
                layer.add_rect(Rect::new(Mm(LEFT), y - Mm(1.8), Mm(RIGHT), y + Mm(3.8)));
                layer.set_fill_color(rgb(0.20, 0.20, 0.20));
                let mut x = LEFT + 2.0;
                for (column, width) in table.columns.iter().zip(widths) {
                    layer.use_text(ascii(column), 8.0, Mm(x), y, &font_bold);
                    x += width;
                }
                y -= line_height_sm;
            }
            if table.rows.is_empty() {
                mono_line!(&table.empty_note);
            }
            for row in &table.rows {
                new_page_if_needed!(line_height_sm);
                let layer = current_layer!();
                layer.set_fill_color(rgb(0.10, 0.10, 0.10));
                let mut x = LEFT + 2.0;
                for (cell, width) in row.iter().zip(widths) {
                    layer.use_text(fit(cell, *width, 8.0), 8.0, Mm(x), y, &font_regular);
                    x += width;
                }
                y -= line_height_sm;
            }
        }};
    }

    // ══════════════════════════════════════════════
    // 1. OVERVIEW
    // ══════════════════════════════════════════════
    section_heading!("1. Overview");
    kv_line!("Cloud Provider", &cover.provider);
    kv_line!("Report",         &cover.category);
    if let Some(account) = &cover.account_id {
        kv_line!("Account", account);
    }
    kv_line!("Scope",          &cover.scope);
    kv_line!("Generated",      &cover.generated_at);
    kv_line!("Report ID",      &cover.report_id);
    y -= Mm(2.0);
    origin_banner!(
        cover.inventory_origin,
        &format!("Inventory: {}. {}", cover.inventory_origin.label(), cover.origin_note)
    );

    // ══════════════════════════════════════════════
    // 2. RESOURCES
    // ══════════════════════════════════════════════
    section_heading!(&format!("2. {}", document.compute.title));
    resource_table!(&document.compute, COMPUTE_WIDTHS);

    let mut next_section = 3;
    if let Some(databases) = &document.databases {
        section_heading!(&format!("{}. {}", next_section, databases.title));
        resource_table!(databases, DATABASE_WIDTHS);
        next_section += 1;
    }

    // ══════════════════════════════════════════════
    // BILLING
    // ══════════════════════════════════════════════
    if let Some(billing) = &document.billing {
        section_heading!(&format!("{}. Billing Summary", next_section));
        kv_line!("Year",     &billing.year);
        kv_line!("Month",    &format!("{} ({})", billing.month, billing.month_name));
        kv_line!("Currency", &billing.currency);
        y -= Mm(2.0);
        origin_banner!(billing.origin, &format!("Costs: {}", billing.origin.label()));

        mono_line!(&format!("{:<14} {:<36} {:>16}", "Category", "Description", "Amount"));
        mono_line!(&"-".repeat(68));
        for item in &billing.items {
            mono_line!(&format!(
                "{:<14} {:<36} {:>16}",
                truncate(&item.category, 14),
                truncate(&item.description, 36),
                format_cents(item.amount_cents)
            ));
        }
        mono_line!(&"-".repeat(68));
        mono_line!(&format!("{:<51} {:>16}", "Total", format_cents(billing.total_cents)));
    }

    // ══════════════════════════════════════════════
    // METRICS
    // ══════════════════════════════════════════════
    if let Some(metrics) = &document.metrics {
        section_heading!(&format!("{}. Performance Metrics ({})", next_section, metrics.frequency.label()));

        for chart in &metrics.charts {
            let chart: &MetricChart = chart;
            let height = 45.0_f32;
            new_page_if_needed!(Mm(height + 24.0));

            let layer = current_layer!();
            layer.set_fill_color(rgb(0.10, 0.10, 0.10));
            layer.use_text(
                ascii(&format!("{} ({})", chart.title, chart.unit)),
                9.5,
                Mm(LEFT + 2.0),
                y,
                &font_bold,
            );
            layer.set_fill_color(match chart.origin {
                DataOrigin::Sample => rgb(0.70, 0.42, 0.02),
                DataOrigin::Live   => rgb(0.13, 0.50, 0.28),
            });
            layer.use_text(ascii(&chart.origin_label), 7.0, Mm(RIGHT - 52.0), y, &font_bold);
            y -= line_height_sm;

            let top  = y.0 - 2.0;
            let base = top - height;
            let x0   = LEFT + 12.0;
            let x1   = RIGHT - 2.0;
            let max  = chart.metric.axis_max().unwrap_or_else(|| nice_max(chart.peak()));
            let slot = (x1 - x0) / chart.values.len().max(1) as f32;
            let scale = |v: f64| base + ((v / max).clamp(0.0, 1.0) as f32) * height;

            layer.set_outline_color(rgb(0.55, 0.55, 0.55));
            layer.set_outline_thickness(0.5);
            layer.add_line(polyline(&[(x0, top), (x0, base), (x1, base)]));

            layer.set_fill_color(rgb(0.45, 0.45, 0.45));
            layer.use_text(format_value(max), 6.5, Mm(LEFT + 1.0), Mm(top - 1.5), &font_regular);
            layer.use_text("0", 6.5, Mm(LEFT + 1.0), Mm(base), &font_regular);

            match chart.style {
                ChartStyle::Bar => {
                    layer.set_fill_color(rgb(0.39, 0.40, 0.95));
                    for (i, value) in chart.values.iter().enumerate() {
                        let bx = x0 + slot * i as f32 + slot * 0.2;
                        layer.add_rect(Rect::new(Mm(bx), Mm(base), Mm(bx + slot * 0.6), Mm(scale(*value))));
                    }
                }
                ChartStyle::Line => {
                    let points: Vec<(f32, f32)> = chart
                        .values
                        .iter()
                        .enumerate()
                        .map(|(i, v)| (x0 + slot * (i as f32 + 0.5), scale(*v)))
                        .collect();
                    layer.set_outline_color(rgb(0.23, 0.51, 0.96));
                    layer.set_outline_thickness(1.2);
                    if points.len() >= 2 {
                        layer.add_line(polyline(&points));
                    }
                    layer.set_fill_color(rgb(0.23, 0.51, 0.96));
                    for (px, py) in &points {
                        layer.add_rect(Rect::new(Mm(px - 0.8), Mm(py - 0.8), Mm(px + 0.8), Mm(py + 0.8)));
                    }
                }
            }

            layer.set_fill_color(rgb(0.45, 0.45, 0.45));
            for (i, label) in chart.buckets.iter().enumerate() {
                let centre = x0 + slot * (i as f32 + 0.5);
                let offset = label.len() as f32 * 0.6;
                layer.use_text(ascii(label), 6.5, Mm(centre - offset), Mm(base - 4.0), &font_regular);
            }

            y = Mm(base - 9.0);
            mono_line!(&format!(
                "peak {} {}   average {} {}",
                format_value(chart.peak()),
                chart.unit,
                format_value(chart.average()),
                chart.unit
            ));
            y -= Mm(3.0);
        }
    }

    // ══════════════════════════════════════════════
    // FOOTER (every page)
    // ══════════════════════════════════════════════
    let page_count = pages.len();
    for (number, (page, layer)) in pages.iter().enumerate() {
        let layer = doc.get_page(*page).get_layer(*layer);
        draw_rule(&layer, Mm(14.0));
        layer.set_fill_color(rgb(0.55, 0.55, 0.55));
        layer.use_text(
            ascii(&format!(
                "Cloud Insights v{}  |  Report ID: {}  |  Page {} of {}",
                cover.app_version,
                cover.report_id,
                number + 1,
                page_count,
            )),
            7.0,
            Mm(LEFT),
            Mm(9.0),
            &font_regular,
        );
    }

    // ──────────────────────────────────────────────
    // Serialise to bytes
    // ──────────────────────────────────────────────
    let mut buf = BufWriter::new(Cursor::new(Vec::new()));
    doc.save(&mut buf).map_err(|e| render_error("PDF save error", e))?;

    let cursor = buf.into_inner().map_err(|e| render_error("PDF flush error", e))?;
    Ok(cursor.into_inner())
}

// ======================================================
// HELPERS
// ======================================================

fn render_error(context: &str, e: impl std::fmt::Display) -> InsightsError {
    InsightsError::Render(format!("{}: {}", context, e))
}

fn rgb(r: f32, g: f32, b: f32) -> Color {
    Color::Rgb(Rgb::new(r, g, b, None))
}

fn polyline(points: &[(f32, f32)]) -> Line {
    Line {
        points: points
            .iter()
            .map(|&(x, y)| (Point::new(Mm(x), Mm(y)), false))
            .collect(),
        is_closed: false,
    }
}

/// Builtin PDF fonts only cover a Latin charset.
fn ascii(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{2013}' | '\u{2014}' => '-',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '?',
        })
        .collect()
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars.saturating_sub(2)).collect();
    format!("{}..", kept)
}

/// Truncate a cell so it fits a column of `width_mm` in Helvetica.
fn fit(text: &str, width_mm: f32, font_size: f32) -> String {
    let char_width = font_size * 0.176;
    let max_chars = ((width_mm - 2.0) / char_width).floor().max(3.0) as usize;
    ascii(&truncate(text, max_chars))
}

/// Round an axis maximum up to one significant digit: 19 -> 20, 820 -> 900.
fn nice_max(peak: f64) -> f64 {
    if peak <= 0.0 {
        return 1.0;
    }
    let magnitude = 10f64.powf(peak.log10().floor());
    (peak / magnitude).ceil() * magnitude
}

fn format_value(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{:.0}", v)
    } else {
        format!("{:.1}", v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        BillingPeriod, CloudProvider, Credentials, Instance, InstanceState, ReportConfig,
        ReportFrequency, ReportType,
    };
    use crate::report::{build_document, AssemblyContext};

    fn instance(n: usize) -> Instance {
        Instance {
            id:            format!("i-{:017x}", n),
            name:          format!("worker node with a rather long descriptive name {}", n),
            instance_type: "m5.xlarge".into(),
            region:        "eu-central-1".into(),
            state:         InstanceState::Running,
            selected:      true,
        }
    }

    fn config(report_type: ReportType, instances: Vec<Instance>) -> ReportConfig {
        ReportConfig {
            provider:       CloudProvider::Aws,
            report_type:    Some(report_type),
            credentials:    Credentials::new("AKIA", "secret", Some("123456789012")),
            instances,
            rds_instances:  Vec::new(),
            frequency:      ReportFrequency::Weekly,
            billing_period: Some(BillingPeriod::new(2025, 3).unwrap()),
        }
    }

    #[test]
    fn utilization_report_renders_a_pdf() {
        let doc = build_document(
            &config(ReportType::Utilization, vec![instance(1)]),
            &AssemblyContext::new(DataOrigin::Sample),
        )
        .unwrap();
        let bytes = render_pdf(&doc).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn billing_report_renders_a_pdf() {
        let doc = build_document(
            &config(ReportType::Billing, Vec::new()),
            &AssemblyContext::new(DataOrigin::Live),
        )
        .unwrap();
        let bytes = render_pdf(&doc).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn long_tables_paginate() {
        let short = build_document(
            &config(ReportType::Utilization, vec![instance(1)]),
            &AssemblyContext::new(DataOrigin::Sample),
        )
        .unwrap();
        let long = build_document(
            &config(ReportType::Utilization, (0..150).map(instance).collect()),
            &AssemblyContext::new(DataOrigin::Sample),
        )
        .unwrap();
        let short_bytes = render_pdf(&short).unwrap();
        let long_bytes = render_pdf(&long).unwrap();
        assert!(long_bytes.starts_with(b"%PDF"));
        assert!(long_bytes.len() > short_bytes.len());
    }

    #[test]
    fn cells_are_truncated_to_their_column() {
        let fitted = fit("worker node with a rather long descriptive name", 20.0, 8.0);
        assert!(fitted.len() < 20);
        assert!(fitted.ends_with(".."));
        assert_eq!(fit("web", 44.0, 8.0), "web");
    }

    #[test]
    fn text_is_reduced_to_ascii() {
        assert_eq!(ascii("Cost \u{2014} Zürich"), "Cost - Z?rich");
    }

    #[test]
    fn axis_maximum_rounds_up() {
        assert_eq!(nice_max(19.0), 20.0);
        assert_eq!(nice_max(160.0), 200.0);
        assert_eq!(nice_max(820.0), 900.0);
        assert_eq!(nice_max(0.0), 1.0);
    }
}
