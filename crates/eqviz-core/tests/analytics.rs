use eqviz_core::analytics::{self, AnalysisSnapshot};
use eqviz_parser::{CsvIngestor, EquipmentRecord, NumericField};

fn fixture_records(name: &str) -> Vec<EquipmentRecord> {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../eqviz-parser/tests/data")
        .join(name);
    let bytes = std::fs::read(path).expect("read fixture");
    let (records, success) = CsvIngestor::new().parse(&bytes);
    assert!(success);
    records
}

fn record(name: &str, equipment_type: &str, flowrate: f64) -> EquipmentRecord {
    EquipmentRecord::new(name, equipment_type, flowrate, 5.0, 100.0)
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn pump_and_valve_example() {
    let records = vec![
        record("P1", "Pump", 10.0),
        record("P2", "Pump", 20.0),
        record("V1", "Valve", 5.0),
    ];
    let snapshot = analytics::compute(&records);

    assert_eq!(snapshot.total_count, 3);
    assert_eq!(snapshot.type_distribution["Pump"], 2);
    assert_eq!(snapshot.type_distribution["Valve"], 1);
    assert_eq!(snapshot.stats_by_type["Pump"].count, 2);
    assert!(approx(snapshot.stats_by_type["Pump"].flowrate.avg, 15.0));
    assert!(approx(snapshot.avg_flowrate, 35.0 / 3.0));
    assert_eq!(snapshot.min_flowrate, 5.0);
    assert_eq!(snapshot.max_flowrate, 20.0);

    let summary = analytics::summary_view(&snapshot);
    assert_eq!(summary.averages.flowrate, 11.67);
    assert_eq!(summary.equipment_types, ["Pump", "Valve"]);
}

#[test]
fn empty_input_yields_canonical_empty_snapshot() {
    let snapshot = analytics::compute(&[]);
    assert_eq!(snapshot, AnalysisSnapshot::empty());
    assert!(snapshot.is_empty());
    assert_eq!(snapshot.avg_temperature, 0.0);
    assert!(snapshot.type_distribution.is_empty());
    assert!(snapshot.stats_by_type.is_empty());

    let chart = analytics::chart_view(&snapshot);
    assert!(chart.pie_chart.labels.is_empty());
    assert_eq!(chart.bar_chart.datasets.len(), 3);
    assert!(chart.bar_chart.datasets.iter().all(|s| s.data.is_empty()));
}

#[test]
fn single_row_has_zero_deviation() {
    let snapshot = analytics::compute(&[record("P1", "Pump", 42.0)]);

    assert_eq!(snapshot.std_flowrate, 0.0);
    assert_eq!(snapshot.std_pressure, 0.0);
    assert_eq!(snapshot.stats_by_type["Pump"].flowrate.std, 0.0);
    assert_eq!(snapshot.avg_flowrate, 42.0);
    assert_eq!(snapshot.min_flowrate, snapshot.max_flowrate);
}

#[test]
fn single_row_partition_has_zero_deviation_inside_larger_set() {
    let records = vec![
        record("P1", "Pump", 10.0),
        record("P2", "Pump", 30.0),
        record("V1", "Valve", 5.0),
    ];
    let snapshot = analytics::compute(&records);

    assert_eq!(snapshot.stats_by_type["Valve"].flowrate.std, 0.0);
    // Sample deviation of 10 and 30.
    assert!(approx(
        snapshot.stats_by_type["Pump"].flowrate.std,
        200.0_f64.sqrt()
    ));
}

#[test]
fn ordering_invariants_hold_for_sample_file() {
    let records = fixture_records("sample_equipment_data.csv");
    let snapshot = analytics::compute(&records);

    for field in NumericField::ALL {
        let stats = snapshot.field(field);
        assert!(stats.min <= stats.avg && stats.avg <= stats.max, "{field}");
        for per_type in snapshot.stats_by_type.values() {
            let stats = per_type.field(field);
            assert!(stats.min <= stats.avg && stats.avg <= stats.max, "{field}");
            assert!(stats.std >= 0.0);
        }
    }

    let distributed: usize = snapshot.type_distribution.values().sum();
    assert_eq!(distributed, snapshot.total_count);
    let per_type_counts: usize = snapshot.stats_by_type.values().map(|s| s.count).sum();
    assert_eq!(per_type_counts, snapshot.total_count);
}

#[test]
fn chart_series_align_with_labels() {
    let records = fixture_records("sample_equipment_data.csv");
    let snapshot = analytics::compute(&records);
    let chart = analytics::chart_view(&snapshot);

    assert_eq!(chart.pie_chart.labels, chart.bar_chart.labels);
    assert_eq!(
        chart.pie_chart.data.iter().sum::<usize>(),
        snapshot.total_count
    );

    let labels: Vec<&str> = chart
        .bar_chart
        .datasets
        .iter()
        .map(|s| s.label.as_str())
        .collect();
    assert_eq!(labels, ["Avg Flowrate", "Avg Pressure", "Avg Temperature"]);

    let pump = chart
        .bar_chart
        .labels
        .iter()
        .position(|label| label == "Pump")
        .expect("pump label");
    assert_eq!(chart.pie_chart.data[pump], 4);
    assert!(approx(chart.bar_chart.datasets[0].data[pump], 119.5));
}

#[test]
fn summary_rounds_to_two_decimals() {
    let records = vec![
        EquipmentRecord::new("A", "Pump", 1.0, 2.0, 3.0),
        EquipmentRecord::new("B", "Pump", 2.0, 2.5, 3.333),
        EquipmentRecord::new("C", "Pump", 2.0, 2.0, 3.0),
    ];
    let snapshot = analytics::compute(&records);
    let summary = analytics::summary_view(&snapshot);

    assert_eq!(summary.averages.flowrate, 1.67);
    assert_eq!(summary.averages.pressure, 2.17);
    assert_eq!(summary.averages.temperature, 3.11);
    assert_eq!(summary.ranges.temperature.max, 3.33);
    assert_eq!(summary.ranges.flowrate.min, 1.0);
    // Per-type stats pass through unrounded.
    assert!(approx(
        summary.stats_by_type["Pump"].flowrate.avg,
        5.0 / 3.0
    ));
}

#[test]
fn summary_serializes_with_wire_field_names() {
    let snapshot = analytics::compute(&[record("P1", "Pump", 10.0)]);
    let summary = serde_json::to_value(analytics::summary_view(&snapshot)).expect("summary json");

    assert_eq!(summary["total_count"], 1);
    assert_eq!(summary["averages"]["flowrate"], 10.0);
    assert_eq!(summary["ranges"]["pressure"]["min"], 5.0);
    assert_eq!(summary["type_distribution"]["Pump"], 1);
    assert_eq!(summary["stats_by_type"]["Pump"]["count"], 1);
    assert_eq!(summary["stats_by_type"]["Pump"]["temperature"]["std"], 0.0);

    let chart = serde_json::to_value(analytics::chart_view(&snapshot)).expect("chart json");
    assert_eq!(chart["pie_chart"]["labels"][0], "Pump");
    assert_eq!(chart["bar_chart"]["datasets"][1]["label"], "Avg Pressure");
}

#[test]
fn round2_sends_exact_ties_to_even() {
    assert_eq!(analytics::round2(0.125), 0.12);
    assert_eq!(analytics::round2(12.125), 12.12);
    assert_eq!(analytics::round2(-12.125), -12.12);
    assert_eq!(analytics::round2(0.375), 0.38);
    assert_eq!(analytics::round2(-2.5), -2.5);
}

#[test]
fn round2_uses_the_stored_binary_value() {
    // 2.675 and 1.005 sit just below the tie in binary.
    assert_eq!(analytics::round2(2.675), 2.67);
    assert_eq!(analytics::round2(1.005), 1.0);
    assert_eq!(analytics::round2(1.234), 1.23);
}

#[test]
fn summary_rounds_ties_to_even() {
    let records = vec![EquipmentRecord::new("Pump-1", "Pump", 12.125, 0.125, 1.0)];
    let summary = analytics::summary_view(&analytics::compute(&records));

    assert_eq!(summary.averages.flowrate, 12.12);
    assert_eq!(summary.averages.pressure, 0.12);
    assert_eq!(summary.ranges.flowrate.max, 12.12);
    assert_eq!(summary.ranges.pressure.min, 0.12);
}
