//! Row reshaping into the per-variant frontend formats.

use crate::sql::QueryOutput;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Elite-performance ceilings used to scale radar stats to 0-100.
pub const STAT_BENCHMARKS: [(&str, f64); 5] = [
    ("PTS", 35.0),
    ("AST", 11.0),
    ("REB", 14.0),
    ("STL", 2.5),
    ("BLK", 2.5),
];

fn benchmark(category: &str) -> f64 {
    STAT_BENCHMARKS
        .iter()
        .find(|(cat, _)| *cat == category)
        .map(|(_, max)| *max)
        .unwrap_or(30.0)
}

fn player_label(row: &Map<String, Value>) -> String {
    row.get("full_name")
        .or_else(|| row.get("player_name"))
        .and_then(Value::as_str)
        .unwrap_or("Unknown")
        .to_string()
}

fn numeric(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Case-insensitive stat lookup for one radar category.
fn category_value(row: &Map<String, Value>, category: &str) -> f64 {
    row.iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(category))
        .map(|(_, value)| numeric(value))
        .unwrap_or(0.0)
}

fn normalized(raw: f64, category: &str) -> i64 {
    let scaled = (raw / benchmark(category)) * 100.0;
    scaled.min(100.0) as i64
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Resolve the time key a comparison row groups under: `season`, else the
/// stringified `game_date`, else the literal "Current".
fn time_key(row: &Map<String, Value>) -> String {
    for key in ["season", "game_date"] {
        match row.get(key) {
            Some(Value::String(s)) if !s.is_empty() => return s.clone(),
            Some(Value::Number(n)) => return n.to_string(),
            _ => {}
        }
    }
    "Current".to_string()
}

/// One record per time period with a field per player, sorted ascending by
/// the time key.
pub fn reshape_comparison(output: &QueryOutput) -> Vec<Value> {
    let mut periods: BTreeMap<String, Map<String, Value>> = BTreeMap::new();

    for row in &output.rows {
        let key = time_key(row);
        let player = player_label(row);
        let value = row.get("stat_value").cloned().unwrap_or(Value::from(0));

        periods
            .entry(key.clone())
            .or_insert_with(|| {
                let mut record = Map::new();
                record.insert("season".to_string(), Value::String(key));
                record
            })
            .insert(player, value);
    }

    periods.into_values().map(Value::Object).collect()
}

/// Radar records for a single player: one per category, value scaled 0-100
/// against the benchmark ceiling, raw value kept at one decimal.
pub fn reshape_single_categorical(output: &QueryOutput) -> Vec<Value> {
    let first_row = match output.rows.first() {
        Some(row) => row,
        None => return Vec::new(),
    };

    STAT_BENCHMARKS
        .iter()
        .map(|(category, _)| {
            let raw = category_value(first_row, category);
            let mut record = Map::new();
            record.insert("category".to_string(), Value::String(category.to_string()));
            record.insert("value".to_string(), Value::from(normalized(raw, category)));
            record.insert(
                "raw_value".to_string(),
                serde_json::Number::from_f64(round1(raw))
                    .map(Value::Number)
                    .unwrap_or(Value::from(0)),
            );
            Value::Object(record)
        })
        .collect()
}

/// Radar records for several players: one per category with one normalized
/// field per player.
pub fn reshape_multi_categorical(output: &QueryOutput) -> Vec<Value> {
    STAT_BENCHMARKS
        .iter()
        .map(|(category, _)| {
            let mut record = Map::new();
            record.insert("category".to_string(), Value::String(category.to_string()));
            for row in &output.rows {
                let raw = category_value(row, category);
                record.insert(player_label(row), Value::from(normalized(raw, category)));
            }
            Value::Object(record)
        })
        .collect()
}
