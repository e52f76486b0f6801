//! NL→SQL generation and repair prompts.
//!
//! Stateless request/response: every call re-embeds the freshly fetched
//! schema description, and both paths run at temperature 0 so a repair
//! attempt differs from its predecessor only because of the added context.

use crate::error::Result;
use crate::llm::LlmClient;

const GENERATION_SYSTEM: &str =
    "You are a SQL query generator. Return ONLY valid SQL queries.";
const REPAIR_SYSTEM: &str = "Return ONLY valid SQL.";
const MAX_SQL_TOKENS: u32 = 1500;

pub struct SqlGenerator {
    llm: LlmClient,
}

/// The failing query and database error carried into a repair attempt.
#[derive(Debug, Clone)]
pub struct RepairContext {
    pub failing_sql: String,
    pub db_error: String,
}

impl SqlGenerator {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }

    /// Generate a candidate query for a question against the given schema.
    pub async fn generate(&self, question: &str, schema_description: &str) -> Result<String> {
        let prompt = build_generation_prompt(question, schema_description);
        let response = self
            .llm
            .complete(GENERATION_SYSTEM, &prompt, 0.0, MAX_SQL_TOKENS)
            .await?;
        Ok(strip_sql_fences(&response))
    }

    /// Regenerate a query after a schema-shaped execution failure.
    pub async fn repair(
        &self,
        question: &str,
        schema_description: &str,
        context: &RepairContext,
    ) -> Result<String> {
        let prompt = build_repair_prompt(question, schema_description, context);
        let response = self
            .llm
            .complete(REPAIR_SYSTEM, &prompt, 0.0, MAX_SQL_TOKENS)
            .await?;
        Ok(strip_sql_fences(&response))
    }
}

fn build_generation_prompt(question: &str, schema_description: &str) -> String {
    format!(
        r#"You are a senior SQL data engineer.
Your task is to convert a natural language request into a VALID PostgreSQL SELECT query for the NBA stats database.

RULES:
- Use ONLY tables and columns that exist in the schema below.
- Do NOT invent columns.
- Do NOT guess column names.
- If unsure, choose the closest matching column from the schema.
- Use explicit table aliases when joining.
- Fully qualify ambiguous columns (table.column).
- ONLY generate SELECT queries.
- Do NOT include explanations.
- Do NOT include markdown.
- Output SQL only.

PERFORMANCE RULES:
- Use GROUP BY only when aggregation is required.
- Avoid SELECT * unless explicitly requested.
- Use the most efficient query structure.

DATABASE SCHEMA:
{}

USER REQUEST:
{}

Generate the SQL"#,
        schema_description, question
    )
}

fn build_repair_prompt(
    question: &str,
    schema_description: &str,
    context: &RepairContext,
) -> String {
    format!(
        r#"The following SQL query failed:

Database schema:
{}

User request:
"{}"

Failed SQL:
{}

Database error:
{}

Fix the SQL to match the schema exactly.
Return ONLY a valid PostgreSQL SELECT query.
Do NOT include any additional text or markdown."#,
        schema_description, question, context.failing_sql, context.db_error
    )
}

/// Strip markdown code fences from a raw model response.
pub fn strip_sql_fences(response: &str) -> String {
    response
        .replace("```sql", "")
        .replace("```", "")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_fenced_sql() {
        let raw = "```sql\nSELECT 1\n```";
        assert_eq!(strip_sql_fences(raw), "SELECT 1");
    }

    #[test]
    fn leaves_bare_sql_untouched() {
        assert_eq!(strip_sql_fences("SELECT 1"), "SELECT 1");
    }

    #[test]
    fn generation_prompt_embeds_schema_and_question() {
        let prompt = build_generation_prompt("top scorers", "players(name, pts)\n");
        assert!(prompt.contains("players(name, pts)"));
        assert!(prompt.contains("top scorers"));
        assert!(prompt.contains("ONLY generate SELECT queries"));
    }

    #[test]
    fn repair_prompt_embeds_failing_query_and_error() {
        let context = RepairContext {
            failing_sql: "SELECT points_per_game FROM players".to_string(),
            db_error: "column \"points_per_game\" does not exist".to_string(),
        };
        let prompt = build_repair_prompt("top scorers", "players(name, pts)\n", &context);
        assert!(prompt.contains("SELECT points_per_game FROM players"));
        assert!(prompt.contains("does not exist"));
        assert!(prompt.contains("players(name, pts)"));
    }
}
