//! Result-shape validation.
//!
//! The model's claimed chart type is just a label; the executed row shape is
//! ground truth. This module decides whether the claim is consistent with the
//! rows, silently reclassifies when the rows are unambiguous (the radar
//! override), and otherwise reports the mismatch so the caller can run one
//! repair round-trip.

use super::{ChartConfig, ChartType};
use crate::sql::QueryOutput;

/// Stat columns whose presence commits the data to a radar breakdown.
pub const RADAR_CATEGORIES: [&str; 5] = ["PTS", "AST", "REB", "STL", "BLK"];

/// Minimum overlap with `RADAR_CATEGORIES` to trigger the override.
const RADAR_OVERLAP_THRESHOLD: usize = 3;

#[derive(Debug, Clone)]
pub struct ShapeVerdict {
    pub valid: bool,
    /// The type to render with when valid; may differ from the claim.
    pub corrected: Option<ChartType>,
    pub reason: String,
}

impl ShapeVerdict {
    fn ok(corrected: ChartType, reason: impl Into<String>) -> Self {
        Self {
            valid: true,
            corrected: Some(corrected),
            reason: reason.into(),
        }
    }

    fn invalid(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            corrected: None,
            reason: reason.into(),
        }
    }
}

/// Check a claimed chart type against the executed rows. Rules are ordered;
/// the first match wins.
pub fn validate_shape(
    claimed: Option<ChartType>,
    output: &QueryOutput,
    config: &ChartConfig,
) -> ShapeVerdict {
    let claimed = match claimed {
        Some(c) => c,
        None => return ShapeVerdict::invalid("unknown chart type tag"),
    };

    // Radar override: if the rows carry at least 3 of the 5 core stat
    // columns the data is shape-committed to a categorical breakdown no
    // matter what the model called it.
    let overlap = RADAR_CATEGORIES
        .iter()
        .filter(|cat| output.has_column_ci(cat))
        .count();
    if overlap >= RADAR_OVERLAP_THRESHOLD {
        let multi = config.player_names.len() > 1 || output.rows.len() > 1;
        let corrected = if multi {
            ChartType::CompareCategoricalBreakdown
        } else {
            ChartType::CategoricalBreakdown
        };
        let reason = if corrected == claimed {
            "radar columns match claimed breakdown".to_string()
        } else {
            format!(
                "rows carry {} radar stat columns; reclassified {} as {}",
                overlap,
                claimed.as_str(),
                corrected.as_str()
            )
        };
        return ShapeVerdict::ok(corrected, reason);
    }

    match claimed {
        ChartType::Leaderboard => {
            if output.has_column("stat_value")
                && (output.has_column("player_name") || output.has_column("full_name"))
            {
                ShapeVerdict::ok(claimed, "leaderboard columns present")
            } else {
                ShapeVerdict::invalid(
                    "Leaderboard requires stat_value and a player_name/full_name column",
                )
            }
        }
        ChartType::SinglePlayerStat => {
            if !output.has_column("stat_value") {
                return ShapeVerdict::invalid("SinglePlayerStat requires a stat_value column");
            }
            let has_axis = output.has_column("season")
                || output.has_column("game_date")
                || config
                    .x_axis_key
                    .as_deref()
                    .map(|key| output.has_column(key))
                    .unwrap_or(false);
            if has_axis {
                ShapeVerdict::ok(claimed, "stat_value and x-axis column present")
            } else {
                ShapeVerdict::invalid(
                    "SinglePlayerStat requires season, game_date or a matching xAxisKey column",
                )
            }
        }
        ChartType::CompareStats => {
            let has_time = output.has_column("season") || output.has_column("game_date");
            let has_player = output.has_column("full_name") || output.has_column("player_name");
            if output.has_column("stat_value") && has_time && has_player {
                ShapeVerdict::ok(claimed, "comparison columns present")
            } else {
                ShapeVerdict::invalid(
                    "CompareStats requires stat_value, a time column and a player column",
                )
            }
        }
        // Claimed categorical but the rows do not carry radar columns.
        ChartType::CategoricalBreakdown | ChartType::CompareCategoricalBreakdown => {
            ShapeVerdict::invalid(
                "categorical breakdown claimed but rows lack the radar stat columns",
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn output_with(columns: &[&str], rows: usize) -> QueryOutput {
        let mut out = QueryOutput {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        };
        for i in 0..rows {
            let mut row = serde_json::Map::new();
            for col in columns {
                row.insert(col.to_string(), json!(i as f64 + 1.0));
            }
            out.rows.push(row);
        }
        out
    }

    #[test]
    fn unknown_tag_is_invalid() {
        let output = output_with(&["stat_value", "player_name"], 3);
        let verdict = validate_shape(None, &output, &ChartConfig::default());
        assert!(!verdict.valid);
    }

    #[test]
    fn radar_override_wins_over_any_claim() {
        let output = output_with(&["pts", "ast", "reb", "stl", "blk"], 1);
        let verdict = validate_shape(
            Some(ChartType::Leaderboard),
            &output,
            &ChartConfig::default(),
        );
        assert!(verdict.valid);
        assert_eq!(verdict.corrected, Some(ChartType::CategoricalBreakdown));
    }

    #[test]
    fn radar_override_needs_three_columns() {
        let output = output_with(&["pts", "ast", "stat_value", "player_name"], 3);
        let verdict = validate_shape(
            Some(ChartType::Leaderboard),
            &output,
            &ChartConfig::default(),
        );
        assert_eq!(verdict.corrected, Some(ChartType::Leaderboard));
    }

    #[test]
    fn radar_override_multi_player_on_row_count() {
        let output = output_with(&["pts", "ast", "reb", "player_name"], 2);
        let verdict = validate_shape(
            Some(ChartType::CategoricalBreakdown),
            &output,
            &ChartConfig::default(),
        );
        assert_eq!(
            verdict.corrected,
            Some(ChartType::CompareCategoricalBreakdown)
        );
    }

    #[test]
    fn radar_override_multi_player_on_config() {
        let output = output_with(&["pts", "ast", "reb"], 1);
        let config = ChartConfig {
            player_names: vec!["Luka Doncic".to_string(), "Kevin Durant".to_string()],
            ..ChartConfig::default()
        };
        let verdict = validate_shape(Some(ChartType::CategoricalBreakdown), &output, &config);
        assert_eq!(
            verdict.corrected,
            Some(ChartType::CompareCategoricalBreakdown)
        );
    }

    #[test]
    fn leaderboard_accepted_unchanged() {
        let output = output_with(&["player_name", "team_abbreviation", "stat_value"], 5);
        let verdict = validate_shape(
            Some(ChartType::Leaderboard),
            &output,
            &ChartConfig::default(),
        );
        assert!(verdict.valid);
        assert_eq!(verdict.corrected, Some(ChartType::Leaderboard));
    }

    #[test]
    fn leaderboard_without_player_column_is_invalid() {
        let output = output_with(&["team_abbreviation", "stat_value"], 5);
        let verdict = validate_shape(
            Some(ChartType::Leaderboard),
            &output,
            &ChartConfig::default(),
        );
        assert!(!verdict.valid);
    }

    #[test]
    fn single_player_stat_accepts_configured_axis() {
        let output = output_with(&["month", "stat_value"], 6);
        let config = ChartConfig {
            x_axis_key: Some("month".to_string()),
            ..ChartConfig::default()
        };
        let verdict = validate_shape(Some(ChartType::SinglePlayerStat), &output, &config);
        assert!(verdict.valid);
    }

    #[test]
    fn single_player_stat_without_axis_is_invalid() {
        let output = output_with(&["stat_value"], 6);
        let verdict = validate_shape(
            Some(ChartType::SinglePlayerStat),
            &output,
            &ChartConfig::default(),
        );
        assert!(!verdict.valid);
    }

    #[test]
    fn compare_stats_needs_all_three_columns() {
        let ok = output_with(&["full_name", "season", "stat_value"], 4);
        assert!(
            validate_shape(Some(ChartType::CompareStats), &ok, &ChartConfig::default()).valid
        );

        let missing_player = output_with(&["season", "stat_value"], 4);
        assert!(
            !validate_shape(
                Some(ChartType::CompareStats),
                &missing_player,
                &ChartConfig::default()
            )
            .valid
        );
    }

    #[test]
    fn claimed_categorical_without_radar_columns_is_invalid() {
        let output = output_with(&["player_name", "stat_value"], 1);
        let verdict = validate_shape(
            Some(ChartType::CategoricalBreakdown),
            &output,
            &ChartConfig::default(),
        );
        assert!(!verdict.valid);
    }
}
