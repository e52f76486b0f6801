//! Chart interpretation types shared by the dashboard path.

pub mod reshape;
pub mod validate;

use serde::{Deserialize, Serialize};

pub use reshape::{reshape_comparison, reshape_multi_categorical, reshape_single_categorical};
pub use validate::{validate_shape, ShapeVerdict};

/// The closed set of chart variants the frontend can render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChartType {
    Leaderboard,
    CategoricalBreakdown,
    CompareCategoricalBreakdown,
    SinglePlayerStat,
    CompareStats,
}

impl ChartType {
    /// Parse a model-claimed tag. Anything outside the closed set is `None`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "Leaderboard" => Some(Self::Leaderboard),
            "CategoricalBreakdown" => Some(Self::CategoricalBreakdown),
            "CompareCategoricalBreakdown" => Some(Self::CompareCategoricalBreakdown),
            "SinglePlayerStat" => Some(Self::SinglePlayerStat),
            "CompareStats" => Some(Self::CompareStats),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Leaderboard => "Leaderboard",
            Self::CategoricalBreakdown => "CategoricalBreakdown",
            Self::CompareCategoricalBreakdown => "CompareCategoricalBreakdown",
            Self::SinglePlayerStat => "SinglePlayerStat",
            Self::CompareStats => "CompareStats",
        }
    }
}

/// Free-form chart configuration the model returns alongside the SQL.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stat_key: Option<String>,
    #[serde(default)]
    pub player_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_axis_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stat_display_name: Option<String>,
}

/// What the dashboard model call must return: a claimed chart type, the SQL
/// to run, and rendering configuration. The tag stays a raw string here so an
/// unknown value reaches the shape validator instead of failing deserialization.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interpretation {
    pub chart_type: String,
    pub sql_query: String,
    #[serde(default)]
    pub chart_config: ChartConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_tags() {
        assert_eq!(
            ChartType::from_tag("Leaderboard"),
            Some(ChartType::Leaderboard)
        );
        assert_eq!(ChartType::from_tag("PieChart"), None);
    }

    #[test]
    fn interpretation_deserializes_with_partial_config() {
        let raw = r#"{"chartType": "SinglePlayerStat", "sqlQuery": "SELECT 1", "chartConfig": {"xAxisKey": "game_date"}}"#;
        let interp: Interpretation = serde_json::from_str(raw).unwrap();
        assert_eq!(interp.chart_type, "SinglePlayerStat");
        assert_eq!(interp.chart_config.x_axis_key.as_deref(), Some("game_date"));
        assert!(interp.chart_config.player_names.is_empty());
    }
}
