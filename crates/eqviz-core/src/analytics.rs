use std::collections::BTreeMap;

use eqviz_parser::{EquipmentRecord, NumericField};
use serde::{Deserialize, Serialize};

/// Mean, extremes and sample standard deviation of one numeric field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldStats {
    pub avg: f64,
    pub min: f64,
    pub max: f64,
    pub std: f64,
}

impl FieldStats {
    fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }

        let n = values.len() as f64;
        let avg = values.iter().sum::<f64>() / n;
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        // Sample deviation; a single observation has none.
        let std = if values.len() > 1 {
            let sum_sq: f64 = values.iter().map(|v| (v - avg).powi(2)).sum();
            (sum_sq / (n - 1.0)).sqrt()
        } else {
            0.0
        };

        Self { avg, min, max, std }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeStats {
    pub count: usize,
    pub flowrate: FieldStats,
    pub pressure: FieldStats,
    pub temperature: FieldStats,
}

impl TypeStats {
    pub fn field(&self, field: NumericField) -> &FieldStats {
        match field {
            NumericField::Flowrate => &self.flowrate,
            NumericField::Pressure => &self.pressure,
            NumericField::Temperature => &self.temperature,
        }
    }
}

/// Aggregate statistics of one dataset, flat as persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSnapshot {
    pub total_count: usize,
    pub avg_flowrate: f64,
    pub avg_pressure: f64,
    pub avg_temperature: f64,
    pub min_flowrate: f64,
    pub max_flowrate: f64,
    pub min_pressure: f64,
    pub max_pressure: f64,
    pub min_temperature: f64,
    pub max_temperature: f64,
    pub std_flowrate: f64,
    pub std_pressure: f64,
    pub std_temperature: f64,
    pub type_distribution: BTreeMap<String, usize>,
    pub stats_by_type: BTreeMap<String, TypeStats>,
}

impl AnalysisSnapshot {
    /// The snapshot of a dataset without rows: every number zero, both maps empty.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.total_count == 0
    }

    pub fn field(&self, field: NumericField) -> FieldStats {
        match field {
            NumericField::Flowrate => FieldStats {
                avg: self.avg_flowrate,
                min: self.min_flowrate,
                max: self.max_flowrate,
                std: self.std_flowrate,
            },
            NumericField::Pressure => FieldStats {
                avg: self.avg_pressure,
                min: self.min_pressure,
                max: self.max_pressure,
                std: self.std_pressure,
            },
            NumericField::Temperature => FieldStats {
                avg: self.avg_temperature,
                min: self.min_temperature,
                max: self.max_temperature,
                std: self.std_temperature,
            },
        }
    }

    fn set_field(&mut self, field: NumericField, stats: FieldStats) {
        let FieldStats { avg, min, max, std } = stats;
        match field {
            NumericField::Flowrate => {
                self.avg_flowrate = avg;
                self.min_flowrate = min;
                self.max_flowrate = max;
                self.std_flowrate = std;
            }
            NumericField::Pressure => {
                self.avg_pressure = avg;
                self.min_pressure = min;
                self.max_pressure = max;
                self.std_pressure = std;
            }
            NumericField::Temperature => {
                self.avg_temperature = avg;
                self.min_temperature = min;
                self.max_temperature = max;
                self.std_temperature = std;
            }
        }
    }
}

/// Computes the snapshot of a set of cleaned rows.
///
/// Rows are expected to come out of the ingestor, so every numeric value is
/// finite. Type maps are keyed in sorted order, which keeps the chart series
/// aligned with their labels.
pub fn compute(records: &[EquipmentRecord]) -> AnalysisSnapshot {
    if records.is_empty() {
        return AnalysisSnapshot::empty();
    }

    let mut snapshot = AnalysisSnapshot {
        total_count: records.len(),
        ..AnalysisSnapshot::default()
    };
    for field in NumericField::ALL {
        snapshot.set_field(field, field_stats(records.iter(), field));
    }

    let mut groups: BTreeMap<&str, Vec<&EquipmentRecord>> = BTreeMap::new();
    for record in records {
        groups
            .entry(record.equipment_type.as_str())
            .or_default()
            .push(record);
    }

    for (equipment_type, rows) in groups {
        snapshot
            .type_distribution
            .insert(equipment_type.to_string(), rows.len());
        snapshot.stats_by_type.insert(
            equipment_type.to_string(),
            TypeStats {
                count: rows.len(),
                flowrate: field_stats(rows.iter().copied(), NumericField::Flowrate),
                pressure: field_stats(rows.iter().copied(), NumericField::Pressure),
                temperature: field_stats(rows.iter().copied(), NumericField::Temperature),
            },
        );
    }

    snapshot
}

fn field_stats<'a>(
    records: impl Iterator<Item = &'a EquipmentRecord>,
    field: NumericField,
) -> FieldStats {
    let values: Vec<f64> = records.map(|record| record.value(field)).collect();
    FieldStats::from_values(&values)
}

/// Rounds to two decimal places from the exact binary value, so exact ties
/// go to the even digit (`0.125` becomes `0.12`).
pub fn round2(value: f64) -> f64 {
    format!("{value:.2}").parse().unwrap_or(value)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PerField<T> {
    pub flowrate: T,
    pub pressure: T,
    pub temperature: T,
}

impl<T> PerField<T> {
    fn from_fn(mut f: impl FnMut(NumericField) -> T) -> Self {
        Self {
            flowrate: f(NumericField::Flowrate),
            pressure: f(NumericField::Pressure),
            temperature: f(NumericField::Temperature),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryView {
    pub total_count: usize,
    pub equipment_types: Vec<String>,
    pub averages: PerField<f64>,
    pub ranges: PerField<Range>,
    pub type_distribution: BTreeMap<String, usize>,
    pub stats_by_type: BTreeMap<String, TypeStats>,
}

pub fn summary_view(snapshot: &AnalysisSnapshot) -> SummaryView {
    SummaryView {
        total_count: snapshot.total_count,
        equipment_types: snapshot.type_distribution.keys().cloned().collect(),
        averages: PerField::from_fn(|field| round2(snapshot.field(field).avg)),
        ranges: PerField::from_fn(|field| {
            let stats = snapshot.field(field);
            Range {
                min: round2(stats.min),
                max: round2(stats.max),
            }
        }),
        type_distribution: snapshot.type_distribution.clone(),
        stats_by_type: snapshot.stats_by_type.clone(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PieChart {
    pub labels: Vec<String>,
    pub data: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarSeries {
    pub label: String,
    pub data: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarChart {
    pub labels: Vec<String>,
    pub datasets: Vec<BarSeries>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartView {
    pub pie_chart: PieChart,
    pub bar_chart: BarChart,
}

pub fn chart_view(snapshot: &AnalysisSnapshot) -> ChartView {
    let pie_chart = PieChart {
        labels: snapshot.type_distribution.keys().cloned().collect(),
        data: snapshot.type_distribution.values().copied().collect(),
    };

    let labels: Vec<String> = snapshot.stats_by_type.keys().cloned().collect();
    let datasets = NumericField::ALL
        .into_iter()
        .map(|field| BarSeries {
            label: format!("Avg {}", field.display_name()),
            data: snapshot
                .stats_by_type
                .values()
                .map(|stats| stats.field(field).avg)
                .collect(),
        })
        .collect();

    ChartView {
        pie_chart,
        bar_chart: BarChart { labels, datasets },
    }
}
