//! Dashboard interpretation: question -> chart type + SQL -> validated,
//! governed execution -> shape-checked, reshaped rows.
//!
//! Unlike the reference system, the SQL the interpreter model returns is not
//! trusted: it passes the same safety validator and governor as the analysis
//! pipeline. A shape rejection gets exactly one repair round-trip through the
//! interpreter with the rejection reason embedded; a second rejection is
//! terminal.

use crate::chart::{
    reshape_comparison, reshape_multi_categorical, reshape_single_categorical, validate_shape,
    ChartConfig, ChartType, Interpretation,
};
use crate::config::Config;
use crate::error::{HoopError, Result};
use crate::llm::LlmClient;
use crate::sql::{validate, Governor, QueryOutput};
use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;
use tracing::{info, warn};

const INTERPRETER_TEMPERATURE: f32 = 0.1;

/// Payload returned to the visualization boundary.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    pub success: bool,
    pub chart_type: ChartType,
    pub data: Value,
    pub config: ChartConfig,
}

pub struct DashboardService {
    pool: PgPool,
    llm: LlmClient,
    governor: Governor,
}

struct ShapeRejection {
    chart_type: String,
    sql: String,
    reason: String,
}

impl DashboardService {
    pub fn new(pool: PgPool, config: &Config) -> Self {
        let llm = LlmClient::new(
            config.openai_api_key.clone(),
            config.dashboard_model.clone(),
            config.openai_base_url.clone(),
        );
        Self {
            pool,
            llm,
            governor: Governor::from_config(config),
        }
    }

    pub async fn interpret_question(&self, question: &str) -> Result<DashboardResponse> {
        let interpretation = self.interpret(question, None).await?;
        info!(
            "Chart type: {} | SQL: {}",
            interpretation.chart_type, interpretation.sql_query
        );

        let (output, verdict) = self.execute(&interpretation).await?;
        if let (true, Some(corrected)) = (verdict.valid, verdict.corrected) {
            return Ok(build_response(
                corrected,
                &output,
                interpretation.chart_config,
            ));
        }

        // One repair round-trip with the rejection embedded; never a third
        // attempt.
        warn!("Result shape rejected: {}", verdict.reason);
        let rejection = ShapeRejection {
            chart_type: interpretation.chart_type.clone(),
            sql: interpretation.sql_query.clone(),
            reason: verdict.reason.clone(),
        };
        let repaired = self.interpret(question, Some(&rejection)).await?;
        info!(
            "Repaired chart type: {} | SQL: {}",
            repaired.chart_type, repaired.sql_query
        );

        let (output, verdict) = self.execute(&repaired).await?;
        if let (true, Some(corrected)) = (verdict.valid, verdict.corrected) {
            Ok(build_response(corrected, &output, repaired.chart_config))
        } else {
            Err(HoopError::ShapeInvalid(verdict.reason))
        }
    }

    async fn interpret(
        &self,
        question: &str,
        rejection: Option<&ShapeRejection>,
    ) -> Result<Interpretation> {
        let user = match rejection {
            None => question.to_string(),
            Some(r) => format!(
                "{}\n\nA previous interpretation of this question was rejected.\n\
                 Claimed chart type: {}\n\
                 SQL: {}\n\
                 Rejection: {}\n\
                 Return a corrected JSON interpretation whose SQL produces columns that match the chart type.",
                question, r.chart_type, r.sql, r.reason
            ),
        };

        let raw = self
            .llm
            .complete_json(SYSTEM_PROMPT, &user, INTERPRETER_TEMPERATURE)
            .await?;

        serde_json::from_str(&raw).map_err(|e| {
            HoopError::Generation(format!(
                "Malformed interpretation from model: {}. Response: {}",
                e, raw
            ))
        })
    }

    async fn execute(
        &self,
        interpretation: &Interpretation,
    ) -> Result<(QueryOutput, crate::chart::ShapeVerdict)> {
        let sql = validate(&interpretation.sql_query)?;
        let output = self.governor.run(&self.pool, &sql).await?;
        if output.rows.is_empty() {
            return Err(HoopError::EmptyResult);
        }

        let claimed = ChartType::from_tag(&interpretation.chart_type);
        let verdict = validate_shape(claimed, &output, &interpretation.chart_config);
        Ok((output, verdict))
    }
}

fn build_response(
    chart_type: ChartType,
    output: &QueryOutput,
    config: ChartConfig,
) -> DashboardResponse {
    let data = match chart_type {
        ChartType::Leaderboard | ChartType::SinglePlayerStat => Value::Array(
            output
                .rows
                .iter()
                .cloned()
                .map(Value::Object)
                .collect(),
        ),
        ChartType::CompareStats => Value::Array(reshape_comparison(output)),
        ChartType::CategoricalBreakdown => Value::Array(reshape_single_categorical(output)),
        ChartType::CompareCategoricalBreakdown => {
            Value::Array(reshape_multi_categorical(output))
        }
    };

    DashboardResponse {
        success: true,
        chart_type,
        data,
        config,
    }
}

/// System prompt for the interpreter model: table semantics, SQL rules and
/// worked examples for each chart variant.
const SYSTEM_PROMPT: &str = r#"You are an NBA analytics assistant.

You have access to a PostgreSQL database with two types of tables.

1. **Season Summaries** (`all_players_regular_YYYY_YYYY`):
   - **USE FOR:** "Trends" (Year-over-Year), "Career", "Averages", "Top Scorers", "Profiles".
   - **COLUMNS:** `pts`, `ast`, `reb`, `gp`, `min` (All are PER GAME averages).
   - **CRITICAL:** This table DOES NOT have a 'season' column. You must SELECT it as a string literal (e.g., `'2023-24'`).

2. **Game Logs** (`player_game_logs`):
   - **USE FOR:** "Last 10 games", "Vs Lakers", "March 2024", "Playoffs".
   - **COLUMNS:** `game_date`, `matchup`, `season_type` ('Regular Season' or 'Playoffs').
   - **STATS:** `pts`, `ast`, `reb` are TOTALS for that single game.

IMPORTANT SQL RULES:
1. **Ordering (CRITICAL)**:
   - Career Trends: `ORDER BY season ASC` (Must go Oldest -> Newest).
   - Game Trends: `ORDER BY game_date ASC`.
   - "Last 10 Games": Use subquery pattern: `SELECT * FROM (...) sub ORDER BY game_date ASC`.

2. **Dynamic Table Selection**:
   - Query mentions "Date", "Month", "Vs Team", "Last X Games" -> **USE `player_game_logs`**.
   - Query mentions "Season", "Year", "Trend" (Career) -> **USE `all_players_regular_...`**.

3. **Leaderboard Filters**:
   - "Top Scorer" / Averages -> `WHERE gp > 40` (Remove outliers).
   - "Total Points" -> `ORDER BY (pts * gp) DESC`.

4. **Name Matching**:
   - Always use `ILIKE '%First%Last%'` to be safe.

Return JSON with this structure:
{
  "chartType": "Leaderboard|CategoricalBreakdown|SinglePlayerStat|CompareStats",
  "sqlQuery": "SELECT ...",
  "chartConfig": {
      "statKey": "stat_value",
      "playerNames": [],
      "xAxisKey": "season",
      "statDisplayName": "Points"
  }
}

EXAMPLES:

1. **"Show me Steph Curry's 3-point trend 2019-2024"** (Career Trend - Ordered ASC)
   - Type: "SinglePlayerStat"
   - SQL: "SELECT * FROM (SELECT '2023-24' as season, fg3_pct as stat_value FROM all_players_regular_2023_2024 WHERE player_name ILIKE '%Steph%Curry%' UNION ALL SELECT '2022-23' as season, fg3_pct as stat_value FROM all_players_regular_2022_2023 WHERE player_name ILIKE '%Steph%Curry%') as career_trend ORDER BY season ASC"

2. **"Compare LeBron and KD points in 2024"** (Comparison)
   - Type: "CompareStats"
   - SQL: "SELECT player_name as full_name, '2023-24' as season, pts as stat_value FROM all_players_regular_2023_2024 WHERE player_name ILIKE '%LeBron%' OR player_name ILIKE '%Durant%'"

3. **"How is Wembanyama performing in his last 10 games?"** (Recent Form)
   - Type: "SinglePlayerStat"
   - SQL: "SELECT * FROM (SELECT game_date, pts as stat_value FROM player_game_logs WHERE player_name ILIKE '%Wembanyama%' ORDER BY game_date DESC LIMIT 10) sub ORDER BY game_date ASC"
   - Config: { "xAxisKey": "game_date" }

4. **"How many points did Curry score vs the Lakers in 2024?"** (Matchup)
   - Type: "SinglePlayerStat"
   - SQL: "SELECT game_date, pts as stat_value FROM player_game_logs WHERE player_name ILIKE '%Steph%Curry%' AND matchup ILIKE '%LAL%' AND game_date > '2023-10-01' ORDER BY game_date ASC"
   - Config: { "xAxisKey": "game_date" }

5. **"Show me Jimmy Butler's points trend in the 2023 Playoffs"** (Playoffs)
   - Type: "SinglePlayerStat"
   - SQL: "SELECT game_date, pts as stat_value FROM player_game_logs WHERE player_name ILIKE '%Jimmy%Butler%' AND season_type = 'Playoffs' AND game_date BETWEEN '2023-04-01' AND '2023-07-01' ORDER BY game_date ASC"
   - Config: { "xAxisKey": "game_date" }

6. **"Who are the top 5 scorers in 2024?"** (Leaderboard Average)
   - Type: "Leaderboard"
   - SQL: "SELECT player_name, team_abbreviation, pts as stat_value FROM all_players_regular_2023_2024 WHERE gp > 40 ORDER BY stat_value DESC LIMIT 5"

7. **"Who had the most total assists in 2024?"** (Leaderboard Total)
   - Type: "Leaderboard"
   - SQL: "SELECT player_name, team_abbreviation, (ast * gp) as stat_value FROM all_players_regular_2023_2024 ORDER BY stat_value DESC LIMIT 10"

8. **"Show me Luka's skill profile"** (Radar)
   - Type: "CategoricalBreakdown"
   - SQL: "SELECT pts, ast, reb, stl, blk FROM all_players_regular_2023_2024 WHERE player_name ILIKE '%Luka%Doncic%'"
   - Config: { "playerNames": ["Luka Doncic"] }
"#;
