use chrono::{DateTime, Utc};
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};
use eqviz_parser::{EquipmentRecord, NumericField};

use crate::analytics::{self, AnalysisSnapshot};

pub const REPORT_TITLE: &str = "Chemical Equipment Analysis Report";
pub const REPORT_FOOTER: &str = "Generated by Chemical Equipment Parameter Visualizer";
pub const SAMPLE_ROWS: usize = 20;
const NAME_WIDTH: usize = 20;
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn render_report(
    dataset_name: &str,
    uploaded_at: DateTime<Utc>,
    generated_at: DateTime<Utc>,
    snapshot: &AnalysisSnapshot,
    records: &[EquipmentRecord],
) -> String {
    let mut out = String::new();

    line(&mut out, REPORT_TITLE);
    line(&mut out, "=".repeat(REPORT_TITLE.len()));
    line(&mut out, format!("Dataset: {dataset_name}"));
    line(
        &mut out,
        format!("Generated: {}", generated_at.format(TIMESTAMP_FORMAT)),
    );
    line(
        &mut out,
        format!("Data Uploaded: {}", uploaded_at.format(TIMESTAMP_FORMAT)),
    );

    section(&mut out, "Summary Statistics", summary_table(snapshot));
    section(
        &mut out,
        "Equipment Type Distribution",
        distribution_table(snapshot),
    );
    section(
        &mut out,
        "Average Parameters by Equipment Type",
        averages_by_type_table(snapshot),
    );
    section(
        &mut out,
        "Equipment Data Sample",
        equipment_table(&records[..records.len().min(SAMPLE_ROWS)]),
    );
    if records.len() > SAMPLE_ROWS {
        line(
            &mut out,
            format!("... and {} more records", records.len() - SAMPLE_ROWS),
        );
    }

    line(&mut out, "");
    line(&mut out, REPORT_FOOTER);
    out
}

fn line(out: &mut String, text: impl AsRef<str>) {
    out.push_str(text.as_ref());
    out.push('\n');
}

fn section(out: &mut String, heading: &str, table: Table) {
    line(out, "");
    line(out, heading);
    line(out, table.to_string());
}

fn new_table<I, S>(header: I) -> Table
where
    I: IntoIterator<Item = S>,
    S: Into<comfy_table::Cell>,
{
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(header);
    table
}

fn summary_table(snapshot: &AnalysisSnapshot) -> Table {
    let mut table = new_table(["Metric", "Flowrate", "Pressure", "Temperature"]);
    let stats = NumericField::ALL.map(|field| snapshot.field(field));

    let rows: [(&str, fn(&analytics::FieldStats) -> f64); 4] = [
        ("Average", |s| s.avg),
        ("Minimum", |s| s.min),
        ("Maximum", |s| s.max),
        ("Std Dev", |s| s.std),
    ];
    for (label, pick) in rows {
        let mut row = vec![label.to_string()];
        row.extend(stats.iter().map(|s| format!("{:.2}", pick(s))));
        table.add_row(row);
    }
    table
}

fn distribution_table(snapshot: &AnalysisSnapshot) -> Table {
    let mut table = new_table(["Equipment Type", "Count", "Percentage"]);
    let total: usize = snapshot.type_distribution.values().sum();

    for (equipment_type, count) in &snapshot.type_distribution {
        let percentage = if total > 0 {
            *count as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        table.add_row(vec![
            equipment_type.clone(),
            count.to_string(),
            format!("{percentage:.1}%"),
        ]);
    }

    if snapshot.type_distribution.is_empty() {
        table.add_row(vec!["No data available", "-", "-"]);
    }
    table
}

fn averages_by_type_table(snapshot: &AnalysisSnapshot) -> Table {
    let chart = analytics::chart_view(snapshot);
    let mut header = vec!["Equipment Type".to_string()];
    header.extend(chart.bar_chart.datasets.iter().map(|s| s.label.clone()));
    let mut table = new_table(header);

    for (index, label) in chart.bar_chart.labels.iter().enumerate() {
        let mut row = vec![label.clone()];
        row.extend(
            chart
                .bar_chart
                .datasets
                .iter()
                .map(|series| format!("{:.2}", series.data[index])),
        );
        table.add_row(row);
    }

    if chart.bar_chart.labels.is_empty() {
        table.add_row(vec!["No data available", "-", "-", "-"]);
    }
    table
}

fn equipment_table(records: &[EquipmentRecord]) -> Table {
    let mut table = new_table(["Name", "Type", "Flowrate", "Pressure", "Temperature"]);
    for record in records {
        table.add_row(vec![
            record.name.chars().take(NAME_WIDTH).collect::<String>(),
            record.equipment_type.clone(),
            format!("{:.2}", record.flowrate),
            format!("{:.2}", record.pressure),
            format!("{:.2}", record.temperature),
        ]);
    }
    table
}
