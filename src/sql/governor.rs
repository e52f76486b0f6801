//! Query governor.
//!
//! Every statement that reaches the database goes through here: a row cap is
//! injected when missing, a statement timeout is set with transaction scope
//! (`SET LOCAL`, so a reused pooled connection cannot inherit it), and the
//! planner's cost estimate is checked against a ceiling before the real
//! execution is allowed to start.

use crate::config::Config;
use crate::error::{HoopError, Result};
use bigdecimal::ToPrimitive;
use regex::Regex;
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{Column, PgPool, Row, TypeInfo};
use sqlparser::ast::{SetExpr, Statement};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use std::sync::OnceLock;
use tracing::{debug, warn};

static LIMIT_KEYWORD: OnceLock<Regex> = OnceLock::new();

fn limit_keyword() -> &'static Regex {
    LIMIT_KEYWORD.get_or_init(|| Regex::new(r"(?i)\blimit\b").expect("limit regex"))
}

/// Executed rows plus the column order of the query that produced them.
/// Column order and names come from the executed query, not from any
/// a-priori schema.
#[derive(Debug, Clone, Default)]
pub struct QueryOutput {
    pub columns: Vec<String>,
    pub rows: Vec<serde_json::Map<String, Value>>,
}

impl QueryOutput {
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn has_column_ci(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone)]
pub struct Governor {
    pub row_limit: u32,
    pub statement_timeout_ms: u64,
    pub cost_ceiling: f64,
}

impl Default for Governor {
    fn default() -> Self {
        Self {
            row_limit: 50,
            statement_timeout_ms: 3000,
            cost_ceiling: 100_000.0,
        }
    }
}

impl Governor {
    pub fn from_config(config: &Config) -> Self {
        Self {
            row_limit: config.row_limit,
            statement_timeout_ms: config.statement_timeout_ms,
            cost_ceiling: config.cost_ceiling,
        }
    }

    /// Inject a LIMIT when the query has none. A bare UNION cannot take a
    /// trailing LIMIT in PostgreSQL without ambiguity, so set operations are
    /// wrapped in a subquery and the cap applied to the wrapper.
    pub fn ensure_limit(&self, sql: &str) -> String {
        if limit_keyword().is_match(sql) {
            return sql.to_string();
        }

        let trimmed = sql.trim().trim_end_matches(';');

        let dialect = PostgreSqlDialect {};
        let is_set_operation = Parser::parse_sql(&dialect, trimmed)
            .ok()
            .and_then(|statements| statements.into_iter().next())
            .map(|statement| match statement {
                Statement::Query(query) => {
                    matches!(query.body.as_ref(), SetExpr::SetOperation { .. })
                }
                _ => false,
            })
            .unwrap_or(false);

        if is_set_operation {
            format!(
                "SELECT * FROM ({}) AS combined_results LIMIT {}",
                trimmed, self.row_limit
            )
        } else {
            format!("{} LIMIT {}", trimmed, self.row_limit)
        }
    }

    /// Run a validated, normalized query under the governor's constraints.
    /// Timeout, cost check and execution share one transaction; any failure
    /// rolls it back.
    pub async fn run(&self, pool: &PgPool, sql: &str) -> Result<QueryOutput> {
        let sql = self.ensure_limit(sql);
        debug!("Executing governed query: {}", sql);

        let mut tx = pool
            .begin()
            .await
            .map_err(|e| HoopError::Execution(format!("Failed to open transaction: {}", e)))?;

        // Scoped to this transaction only.
        let set_timeout = format!("SET LOCAL statement_timeout = {}", self.statement_timeout_ms);
        if let Err(e) = sqlx::query(&set_timeout).execute(&mut *tx).await {
            tx.rollback().await.ok();
            return Err(HoopError::Execution(format!(
                "Failed to set statement timeout: {}",
                e
            )));
        }

        // Cost gate runs before the real execution so a runaway plan is
        // rejected without ever starting.
        match self.estimated_cost(&mut tx, &sql).await {
            Ok(Some(cost)) if cost > self.cost_ceiling => {
                tx.rollback().await.ok();
                return Err(HoopError::TooExpensive {
                    cost,
                    ceiling: self.cost_ceiling,
                });
            }
            Ok(Some(cost)) => debug!("Planner cost estimate: {:.1}", cost),
            Ok(None) => warn!("Planner returned no cost estimate; executing anyway"),
            Err(e) => {
                tx.rollback().await.ok();
                return Err(e);
            }
        }

        let rows = match sqlx::query(&sql).fetch_all(&mut *tx).await {
            Ok(rows) => rows,
            Err(e) => {
                tx.rollback().await.ok();
                return Err(HoopError::Execution(e.to_string()));
            }
        };

        tx.commit()
            .await
            .map_err(|e| HoopError::Execution(format!("Failed to commit: {}", e)))?;

        Ok(decode_rows(&rows))
    }

    async fn estimated_cost(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        sql: &str,
    ) -> Result<Option<f64>> {
        let explain = format!("EXPLAIN (FORMAT JSON) {}", sql);
        let row = sqlx::query(&explain)
            .fetch_one(&mut **tx)
            .await
            .map_err(|e| HoopError::Execution(format!("EXPLAIN failed: {}", e)))?;

        let plan: Value = row
            .try_get(0)
            .map_err(|e| HoopError::Execution(format!("Unreadable EXPLAIN output: {}", e)))?;

        Ok(plan
            .get(0)
            .and_then(|p| p.get("Plan"))
            .and_then(|p| p.get("Total Cost"))
            .and_then(Value::as_f64))
    }
}

fn decode_rows(rows: &[PgRow]) -> QueryOutput {
    let columns = rows
        .first()
        .map(|row| {
            row.columns()
                .iter()
                .map(|c| c.name().to_string())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    let decoded = rows
        .iter()
        .map(|row| {
            let mut record = serde_json::Map::new();
            for (idx, column) in row.columns().iter().enumerate() {
                record.insert(column.name().to_string(), decode_value(row, idx));
            }
            record
        })
        .collect();

    QueryOutput {
        columns,
        rows: decoded,
    }
}

/// Decode one column of one row into a JSON scalar, dispatching on the
/// Postgres type name. Unknown types fall back to text, then NULL.
fn decode_value(row: &PgRow, idx: usize) -> Value {
    let type_name = row.columns()[idx].type_info().name().to_uppercase();

    match type_name.as_str() {
        "INT2" => opt_number(row.try_get::<Option<i16>, _>(idx).ok().flatten().map(f64::from)),
        "INT4" => opt_number(row.try_get::<Option<i32>, _>(idx).ok().flatten().map(f64::from)),
        "INT8" => row
            .try_get::<Option<i64>, _>(idx)
            .ok()
            .flatten()
            .map(Value::from)
            .unwrap_or(Value::Null),
        "FLOAT4" => opt_number(row.try_get::<Option<f32>, _>(idx).ok().flatten().map(f64::from)),
        "FLOAT8" => opt_number(row.try_get::<Option<f64>, _>(idx).ok().flatten()),
        "NUMERIC" => opt_number(
            row.try_get::<Option<sqlx::types::BigDecimal>, _>(idx)
                .ok()
                .flatten()
                .and_then(|d| d.to_f64()),
        ),
        "BOOL" => row
            .try_get::<Option<bool>, _>(idx)
            .ok()
            .flatten()
            .map(Value::Bool)
            .unwrap_or(Value::Null),
        "DATE" => row
            .try_get::<Option<chrono::NaiveDate>, _>(idx)
            .ok()
            .flatten()
            .map(|d| Value::String(d.to_string()))
            .unwrap_or(Value::Null),
        "TIMESTAMP" => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(idx)
            .ok()
            .flatten()
            .map(|t| Value::String(t.to_string()))
            .unwrap_or(Value::Null),
        "TIMESTAMPTZ" => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(idx)
            .ok()
            .flatten()
            .map(|t| Value::String(t.to_rfc3339()))
            .unwrap_or(Value::Null),
        "JSON" | "JSONB" => row
            .try_get::<Option<Value>, _>(idx)
            .ok()
            .flatten()
            .unwrap_or(Value::Null),
        _ => row
            .try_get::<Option<String>, _>(idx)
            .ok()
            .flatten()
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}

fn opt_number(value: Option<f64>) -> Value {
    value
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}
