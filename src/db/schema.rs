//! Live schema introspection.
//!
//! The descriptor is re-read from `information_schema` every time it is
//! needed for prompting or repair; nothing here is cached across requests,
//! so column additions show up on the next question.

use crate::error::{HoopError, Result};
use sqlx::{PgPool, Row};

/// Ordered table -> column listing for the public schema.
#[derive(Debug, Clone, Default)]
pub struct SchemaDescriptor {
    pub tables: Vec<(String, Vec<String>)>,
}

impl SchemaDescriptor {
    /// Render the `table(col1, col2, ...)` lines embedded in prompts.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for (table, columns) in &self.tables {
            out.push_str(table);
            out.push('(');
            out.push_str(&columns.join(", "));
            out.push_str(")\n");
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Read table and column metadata from the live catalog. Failure is fatal to
/// the calling operation: generation and repair cannot be grounded without it.
pub async fn fetch_schema(pool: &PgPool) -> Result<SchemaDescriptor> {
    let table_rows = sqlx::query(
        r#"
        SELECT table_name
        FROM information_schema.tables
        WHERE table_schema = 'public'
        ORDER BY table_name
        "#,
    )
    .fetch_all(pool)
    .await
    .map_err(|e| HoopError::SchemaUnavailable(format!("Failed to list tables: {}", e)))?;

    let mut tables = Vec::with_capacity(table_rows.len());
    for row in table_rows {
        let table_name: String = row
            .try_get("table_name")
            .map_err(|e| HoopError::SchemaUnavailable(format!("Bad catalog row: {}", e)))?;

        let column_rows = sqlx::query(
            r#"
            SELECT column_name
            FROM information_schema.columns
            WHERE table_name = $1
            ORDER BY ordinal_position
            "#,
        )
        .bind(&table_name)
        .fetch_all(pool)
        .await
        .map_err(|e| {
            HoopError::SchemaUnavailable(format!(
                "Failed to list columns for {}: {}",
                table_name, e
            ))
        })?;

        let columns = column_rows
            .into_iter()
            .filter_map(|r| r.try_get::<String, _>("column_name").ok())
            .collect();

        tables.push((table_name, columns));
    }

    Ok(SchemaDescriptor { tables })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_renders_one_line_per_table() {
        let schema = SchemaDescriptor {
            tables: vec![
                (
                    "player_game_logs".to_string(),
                    vec!["player_name".to_string(), "pts".to_string()],
                ),
                ("teams".to_string(), vec!["abbreviation".to_string()]),
            ],
        };
        assert_eq!(
            schema.describe(),
            "player_game_logs(player_name, pts)\nteams(abbreviation)\n"
        );
    }
}
