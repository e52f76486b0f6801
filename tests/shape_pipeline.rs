//! End-to-end tests for the result-shape classification and reshaping stage:
//! executed rows go in, chart-ready records come out.

use hoopquery::chart::{
    reshape_comparison, reshape_single_categorical, validate_shape, ChartConfig, ChartType,
};
use hoopquery::sql::{validate, Governor, QueryOutput};
use serde_json::{json, Map, Value};

/// Build a QueryOutput from column names and row values.
fn query_output(columns: &[&str], rows: &[&[Value]]) -> QueryOutput {
    QueryOutput {
        columns: columns.iter().map(|c| c.to_string()).collect(),
        rows: rows
            .iter()
            .map(|values| {
                let mut row = Map::new();
                for (column, value) in columns.iter().zip(values.iter()) {
                    row.insert(column.to_string(), value.clone());
                }
                row
            })
            .collect(),
    }
}

#[test]
fn top_scorers_leaderboard_is_accepted_unchanged() {
    // "Who are the top 5 scorers in 2024?"
    let output = query_output(
        &["player_name", "team_abbreviation", "stat_value"],
        &[
            &[json!("Luka Doncic"), json!("DAL"), json!(33.9)],
            &[json!("Giannis Antetokounmpo"), json!("MIL"), json!(30.4)],
            &[json!("Shai Gilgeous-Alexander"), json!("OKC"), json!(30.1)],
            &[json!("Jalen Brunson"), json!("NYK"), json!(28.7)],
            &[json!("Kevin Durant"), json!("PHX"), json!(27.1)],
        ],
    );

    let verdict = validate_shape(
        Some(ChartType::Leaderboard),
        &output,
        &ChartConfig::default(),
    );
    assert!(verdict.valid);
    assert_eq!(verdict.corrected, Some(ChartType::Leaderboard));
}

#[test]
fn skill_profile_is_reclassified_and_reshaped() {
    // "Show me Luka's skill profile" mislabeled by the model as a leaderboard.
    let output = query_output(
        &["pts", "ast", "reb", "stl", "blk"],
        &[&[
            json!(33.9),
            json!(9.8),
            json!(9.2),
            json!(1.4),
            json!(0.5),
        ]],
    );

    let verdict = validate_shape(
        Some(ChartType::Leaderboard),
        &output,
        &ChartConfig::default(),
    );
    assert!(verdict.valid);
    assert_eq!(verdict.corrected, Some(ChartType::CategoricalBreakdown));

    let records = reshape_single_categorical(&output);
    assert_eq!(records.len(), 5);
    for record in &records {
        let value = record["value"].as_i64().unwrap();
        assert!((0..=100).contains(&value), "value out of range: {}", value);
        assert!(record["raw_value"].as_f64().is_some());
        assert!(record["category"].as_str().is_some());
    }
}

#[test]
fn two_player_profile_becomes_compare_breakdown() {
    let output = query_output(
        &["player_name", "pts", "ast", "reb", "stl", "blk"],
        &[
            &[
                json!("Luka Doncic"),
                json!(33.9),
                json!(9.8),
                json!(9.2),
                json!(1.4),
                json!(0.5),
            ],
            &[
                json!("Kevin Durant"),
                json!(27.1),
                json!(5.0),
                json!(6.6),
                json!(0.9),
                json!(1.2),
            ],
        ],
    );

    let verdict = validate_shape(
        Some(ChartType::SinglePlayerStat),
        &output,
        &ChartConfig::default(),
    );
    assert!(verdict.valid);
    assert_eq!(
        verdict.corrected,
        Some(ChartType::CompareCategoricalBreakdown)
    );
}

#[test]
fn season_comparison_groups_and_sorts() {
    let output = query_output(
        &["full_name", "season", "stat_value"],
        &[
            &[json!("LeBron James"), json!("2023-24"), json!(25.7)],
            &[json!("Kevin Durant"), json!("2023-24"), json!(27.1)],
            &[json!("LeBron James"), json!("2022-23"), json!(28.9)],
            &[json!("Kevin Durant"), json!("2022-23"), json!(29.1)],
        ],
    );

    let verdict = validate_shape(
        Some(ChartType::CompareStats),
        &output,
        &ChartConfig::default(),
    );
    assert!(verdict.valid);

    let records = reshape_comparison(&output);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["season"], "2022-23");
    assert_eq!(records[1]["season"], "2023-24");
    assert_eq!(records[1]["Kevin Durant"], json!(27.1));
    assert_eq!(records[1]["LeBron James"], json!(25.7));
}

#[test]
fn claimed_breakdown_without_radar_columns_is_rejected_with_reason() {
    let output = query_output(
        &["player_name", "stat_value"],
        &[&[json!("Luka Doncic"), json!(33.9)]],
    );

    let verdict = validate_shape(
        Some(ChartType::CategoricalBreakdown),
        &output,
        &ChartConfig::default(),
    );
    assert!(!verdict.valid);
    assert!(!verdict.reason.is_empty());
}

#[test]
fn generated_sql_is_normalized_then_capped() {
    // The path every candidate takes: validate (normalize) then govern.
    let governor = Governor::default();
    let normalized = validate("select player_name, pts as stat_value from all_players_regular_2023_2024 order by stat_value desc").unwrap();
    let capped = governor.ensure_limit(&normalized);
    assert!(capped.ends_with("LIMIT 50"));

    // Re-validating the capped query is a no-op round trip.
    let revalidated = validate(&capped).unwrap();
    assert_eq!(governor.ensure_limit(&revalidated), revalidated);
}

#[test]
fn union_candidate_gets_outer_limit_only() {
    let governor = Governor::default();
    let normalized = validate(
        "SELECT '2023-24' AS season, pts AS stat_value FROM all_players_regular_2023_2024 \
         UNION ALL \
         SELECT '2022-23' AS season, pts AS stat_value FROM all_players_regular_2022_2023",
    )
    .unwrap();
    let capped = governor.ensure_limit(&normalized);
    assert!(capped.starts_with("SELECT * FROM ("));
    assert!(capped.ends_with(") AS combined_results LIMIT 50"));
    assert_eq!(capped.to_lowercase().matches("limit").count(), 1);
}
