//! Narrative analysis over pipeline results.
//!
//! A composite score table is computed locally (weighted min-max
//! normalization with inversion for lower-is-better metrics) and handed to
//! the model with a do-not-reorder contract, so the ranking is deterministic
//! and the model only writes the prose around it.

use crate::error::{HoopError, Result};
use crate::llm::LlmClient;
use crate::pipeline::QueryResult;
use crate::sql::QueryOutput;
use itertools::Itertools;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;

const COMPARE_KEYWORDS: [&str; 6] = ["compare", "better", "versus", "vs", "between", "who"];
const PREVIEW_ROWS: usize = 20;
const MAX_ANALYSIS_TOKENS: u32 = 1600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    Defense,
    Shooting,
    Playmaking,
    Scoring,
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Defense => "defense",
            Domain::Shooting => "shooting",
            Domain::Playmaking => "playmaking",
            Domain::Scoring => "scoring",
        }
    }
}

/// Weights, lower-is-better metrics and tie-break order for one domain.
pub struct ScoreConfig {
    pub weights: &'static [(&'static str, f64)],
    pub invert: &'static [&'static str],
    pub tiebreakers: &'static [&'static str],
}

const DEFENSE_CONFIG: ScoreConfig = ScoreConfig {
    weights: &[
        ("defensive_impact", 0.35),
        ("rim_fg_pct_allowed", 0.18),
        ("rim_shots_contested", 0.12),
        ("opp_fg_pct_as_primary_defender", 0.10),
        ("versatility_index", 0.10),
        ("deflections_per_game", 0.08),
        ("loose_balls_recovered", 0.04),
        ("stl_per_game", 0.02),
        ("blk_per_game", 0.01),
    ],
    invert: &["rim_fg_pct_allowed", "opp_fg_pct_as_primary_defender"],
    tiebreakers: &[
        "defensive_impact",
        "rim_fg_pct_allowed",
        "rim_shots_contested",
        "versatility_index",
        "opp_fg_pct_as_primary_defender",
        "deflections_per_game",
    ],
};

const SHOOTING_CONFIG: ScoreConfig = ScoreConfig {
    weights: &[("three_pt_pct", 0.55), ("three_pm", 0.30), ("three_pa", 0.15)],
    invert: &[],
    tiebreakers: &["three_pt_pct", "three_pm", "three_pa"],
};

const PLAYMAKING_CONFIG: ScoreConfig = ScoreConfig {
    weights: &[
        ("ast_per_game", 0.45),
        ("ast_pct", 0.20),
        ("potential_ast", 0.15),
        ("assist_points_created", 0.10),
        ("tov_per_game", 0.05),
        ("ast_to_tov", 0.05),
    ],
    invert: &["tov_per_game"],
    tiebreakers: &["ast_per_game", "ast_pct", "ast_to_tov", "potential_ast"],
};

const SCORING_CONFIG: ScoreConfig = ScoreConfig {
    weights: &[
        ("ppg", 0.45),
        ("ts_pct", 0.30),
        ("fga", 0.15),
        ("usage_pct", 0.10),
    ],
    invert: &[],
    tiebreakers: &["ppg", "ts_pct", "usage_pct"],
};

pub fn domain_config(domain: Domain) -> &'static ScoreConfig {
    match domain {
        Domain::Defense => &DEFENSE_CONFIG,
        Domain::Shooting => &SHOOTING_CONFIG,
        Domain::Playmaking => &PLAYMAKING_CONFIG,
        Domain::Scoring => &SCORING_CONFIG,
    }
}

fn rubric(domain: Domain) -> &'static str {
    match domain {
        Domain::Defense => "Prioritize defensive_impact; rim protection (rim_fg_pct_allowed lower is better; rim_shots_contested higher is better); on-ball impact (opp_fg_pct_as_primary_defender lower is better); versatility; disruptions (deflections, loose balls).",
        Domain::Shooting => "Prioritize accuracy (three_pt_pct), then volume (three_pm, three_pa). Include role, shot quality, and sustainability commentary.",
        Domain::Playmaking => "Prioritize ast_per_game, ast_pct, potential_ast, assist_points_created; penalize turnovers (tov_per_game lower is better); reward efficiency (ast_to_tov). Consider on-ball workload.",
        Domain::Scoring => "Prioritize ppg and efficiency (ts_pct), then usage and volume (fga). Discuss shot mix and scalability.",
    }
}

/// Route a question (plus the columns it produced) to a scoring domain.
pub fn infer_domain(question: &str, columns: &[String]) -> Domain {
    let q = question.to_lowercase();
    let cols = columns.join(" ").to_lowercase();

    if ["defense", "defender", "rim", "steal", "block"]
        .iter()
        .any(|k| q.contains(k))
        || ["defensive_impact", "rim_fg_pct_allowed", "deflections_per_game"]
            .iter()
            .any(|k| cols.contains(k))
    {
        return Domain::Defense;
    }
    if ["shoot", "3pt", "three", "percentage", "catch-and-shoot"]
        .iter()
        .any(|k| q.contains(k))
        || ["three_pt_pct", "three_pm", "three_pa"]
            .iter()
            .any(|k| cols.contains(k))
    {
        return Domain::Shooting;
    }
    if ["assist", "playmaker", "passing"].iter().any(|k| q.contains(k))
        || ["ast_per_game", "ast_pct", "potential_ast"]
            .iter()
            .any(|k| cols.contains(k))
    {
        return Domain::Playmaking;
    }
    Domain::Scoring
}

/// One ranked row of the score table.
#[derive(Debug, Clone)]
pub struct ScoreRow {
    pub player_name: String,
    pub composite_score: f64,
    /// Top-3 metrics by weighted contribution.
    pub top_contributors: Vec<(String, f64)>,
}

/// Composite scores, ranked descending with the domain's tie-break order.
pub fn compute_scores(output: &QueryOutput, config: &ScoreConfig) -> Result<Vec<ScoreRow>> {
    if !output.has_column("player_name") {
        return Err(HoopError::NoData);
    }

    let present: Vec<(&str, f64)> = config
        .weights
        .iter()
        .filter(|(col, _)| output.has_column(col))
        .map(|(col, w)| (*col, *w))
        .collect();
    if present.is_empty() {
        return Err(HoopError::NoData);
    }

    let row_count = output.rows.len();
    let mut normalized: HashMap<&str, Vec<f64>> = HashMap::new();

    for (col, _) in &present {
        let raw: Vec<Option<f64>> = output
            .rows
            .iter()
            .map(|row| row.get(*col).and_then(numeric))
            .collect();

        let finite: Vec<f64> = raw.iter().flatten().copied().filter(|v| v.is_finite()).collect();
        let (min, max) = match (
            finite.iter().cloned().fold(f64::INFINITY, f64::min),
            finite.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
        ) {
            (min, max) if min.is_finite() && max.is_finite() => (min, max),
            _ => (0.0, 0.0),
        };
        let span = max - min;
        let invert = config.invert.contains(col);

        let values = raw
            .into_iter()
            .map(|v| match v {
                Some(v) if span > 0.0 => {
                    let scaled = (v - min) / span;
                    if invert {
                        1.0 - scaled
                    } else {
                        scaled
                    }
                }
                // Constant column or missing value contributes nothing.
                _ => 0.0,
            })
            .collect();
        normalized.insert(*col, values);
    }

    let scores: Vec<f64> = (0..row_count)
        .map(|i| {
            present
                .iter()
                .map(|(col, weight)| weight * normalized[col][i])
                .sum()
        })
        .collect();

    let tiebreak_key = |i: usize| -> Vec<f64> {
        config
            .tiebreakers
            .iter()
            .filter_map(|col| normalized.get(col).map(|values| values[i]))
            .collect()
    };

    let order = (0..row_count).sorted_by(|&a, &b| {
        let key_a: Vec<f64> = std::iter::once(scores[a]).chain(tiebreak_key(a)).collect();
        let key_b: Vec<f64> = std::iter::once(scores[b]).chain(tiebreak_key(b)).collect();
        compare_keys(&key_b, &key_a)
    });

    Ok(order
        .map(|i| {
            let top_contributors = present
                .iter()
                .map(|(col, weight)| (col.to_string(), weight * normalized[col][i]))
                .sorted_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal))
                .take(3)
                .collect();

            ScoreRow {
                player_name: output.rows[i]
                    .get("player_name")
                    .and_then(Value::as_str)
                    .unwrap_or("Unknown")
                    .to_string(),
                composite_score: scores[i],
                top_contributors,
            }
        })
        .collect())
}

fn compare_keys(a: &[f64], b: &[f64]) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        match x.partial_cmp(y).unwrap_or(Ordering::Equal) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// A comparison question over a handful of rows gets shown in full; large
/// result sets are previewed.
pub fn is_comparison(question: &str, row_count: usize) -> bool {
    let q = question.to_lowercase();
    row_count <= 5 && COMPARE_KEYWORDS.iter().any(|k| q.contains(k))
}

/// Produce the narrative analysis for a pipeline result.
pub async fn analyze(llm: &LlmClient, result: &QueryResult) -> Result<String> {
    if result.output.rows.is_empty() {
        return Err(HoopError::NoData);
    }

    let domain = infer_domain(&result.question, &result.output.columns);
    let score_table = compute_scores(&result.output, domain_config(domain)).ok();

    let comparison = is_comparison(&result.question, result.output.rows.len());
    let shown = if comparison {
        result.output.rows.len()
    } else {
        result.output.rows.len().min(PREVIEW_ROWS)
    };
    let data_text = render_rows(&result.output, shown);

    let (system, user) = match score_table.filter(|t| !t.is_empty()) {
        Some(table) => {
            let score_text = render_score_table(&table);
            (
                "You are an expert NBA analyst. Use ONLY the provided data and ranking. \
                 DO NOT change the ranking order. Write an in-depth analysis with clear sections: \
                 1) Executive summary, 2) Ranking rationale, 3) Top contenders breakdown with metric-by-metric evidence \
                 (include strengths, weaknesses, and role fit), 4) Context (usage, role, sample caveats), \
                 5) Sensitivity and limitations, 6) Actionable insights. Be specific and role-aware."
                    .to_string(),
                format!(
                    "Question: {}\n\nDomain: {}\nGuidance: {}\n\nRANKED (DO NOT REORDER):\n{}\n\n\
                     ORIGINAL DATA (first rows):\n{}\n\n\
                     Explain the result by identifying #1 and comparing them to the next strongest contenders.",
                    result.question,
                    domain.as_str(),
                    rubric(domain),
                    score_text,
                    data_text
                ),
            )
        }
        None => (
            format!(
                "You are an expert NBA data analyst. Produce an in-depth analysis based ONLY on the provided data.\n\n\
                 DECISION RUBRIC (domain={}): {}\n\
                 If players span positions, explain role differences but still pick ONE overall best unless asked by role.\n\
                 Structure your response with: Executive summary; Detailed findings (metric-by-metric); \
                 Comparative evaluation; Context (role, usage, sample size); Limitations; Actionable insights. \
                 Be specific, avoid generic statements, and tie every claim to the data shown.",
                domain.as_str(),
                rubric(domain)
            ),
            format!(
                "User's question: {}\n\nData:\n{}\nPlease analyze the data and answer the question clearly.",
                result.question,
                summarize(&result.output, &data_text)
            ),
        ),
    };

    llm.complete(&system, &user, 0.0, MAX_ANALYSIS_TOKENS).await
}

fn summarize(output: &QueryOutput, data_text: &str) -> String {
    format!(
        "Result shape: {} rows, {} columns\nColumns: {}\n\nData:\n{}\n",
        output.rows.len(),
        output.columns.len(),
        output.columns.join(", "),
        data_text
    )
}

fn render_rows(output: &QueryOutput, limit: usize) -> String {
    let mut lines = vec![output.columns.join(" | ")];
    for row in output.rows.iter().take(limit) {
        let rendered = output
            .columns
            .iter()
            .map(|col| match row.get(col) {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            })
            .join(" | ");
        lines.push(rendered);
    }
    lines.join("\n")
}

fn render_score_table(table: &[ScoreRow]) -> String {
    table
        .iter()
        .enumerate()
        .map(|(rank, row)| {
            let contributors = row
                .top_contributors
                .iter()
                .map(|(col, contribution)| format!("{}={:.4}", col, contribution))
                .join(", ");
            format!(
                "{}. {} | composite_score={:.4} | top contributors: {}",
                rank + 1,
                row.player_name,
                row.composite_score,
                contributors
            )
        })
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn output(columns: &[&str], rows: Vec<Vec<Value>>) -> QueryOutput {
        QueryOutput {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: rows
                .into_iter()
                .map(|values| {
                    columns
                        .iter()
                        .zip(values)
                        .map(|(c, v)| (c.to_string(), v))
                        .collect()
                })
                .collect(),
        }
    }

    #[test]
    fn routes_defense_questions() {
        assert_eq!(
            infer_domain("Who is the best rim protector?", &[]),
            Domain::Defense
        );
    }

    #[test]
    fn routes_by_columns_when_question_is_vague() {
        let columns = vec!["player_name".to_string(), "three_pt_pct".to_string()];
        assert_eq!(infer_domain("rank these players", &columns), Domain::Shooting);
    }

    #[test]
    fn defaults_to_scoring() {
        assert_eq!(infer_domain("show me the data", &[]), Domain::Scoring);
    }

    #[test]
    fn inverted_metric_flips_the_ranking() {
        // Equal defensive impact; B allows a lower rim FG% so B must rank
        // first after inversion, even though A's raw rim number is higher.
        let out = output(
            &["player_name", "defensive_impact", "rim_fg_pct_allowed"],
            vec![
                vec![json!("Player A"), json!(5.0), json!(0.60)],
                vec![json!("Player B"), json!(5.0), json!(0.40)],
            ],
        );
        let table = compute_scores(&out, &DEFENSE_CONFIG).unwrap();
        assert_eq!(table[0].player_name, "Player B");
        assert!(table[0].composite_score > table[1].composite_score);
    }

    #[test]
    fn top_contributors_are_sorted_and_capped_at_three() {
        let out = output(
            &[
                "player_name",
                "ppg",
                "ts_pct",
                "fga",
                "usage_pct",
            ],
            vec![
                vec![json!("A"), json!(30.0), json!(0.62), json!(22.0), json!(0.33)],
                vec![json!("B"), json!(20.0), json!(0.55), json!(18.0), json!(0.25)],
            ],
        );
        let table = compute_scores(&out, &SCORING_CONFIG).unwrap();
        let top = &table[0].top_contributors;
        assert_eq!(top.len(), 3);
        assert!(top[0].1 >= top[1].1 && top[1].1 >= top[2].1);
        assert_eq!(top[0].0, "ppg");
    }

    #[test]
    fn missing_player_column_yields_no_data() {
        let out = output(&["ppg"], vec![vec![json!(30.0)]]);
        assert!(matches!(
            compute_scores(&out, &SCORING_CONFIG),
            Err(HoopError::NoData)
        ));
    }

    #[test]
    fn no_metric_columns_yields_no_data() {
        let out = output(
            &["player_name", "team_abbreviation"],
            vec![vec![json!("A"), json!("DAL")]],
        );
        assert!(matches!(
            compute_scores(&out, &SCORING_CONFIG),
            Err(HoopError::NoData)
        ));
    }

    #[test]
    fn comparison_requires_few_rows_and_a_keyword() {
        assert!(is_comparison("Who is better, Luka or KD?", 2));
        assert!(!is_comparison("Who is better, Luka or KD?", 12));
        assert!(!is_comparison("Show season averages", 2));
    }
}
