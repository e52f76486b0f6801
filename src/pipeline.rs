//! The question-to-rows pipeline with bounded self-repair.
//!
//! Flow: fetch schema -> generate -> validate -> govern/execute, and on a
//! schema-shaped execution failure, loop back through the generator with the
//! failing query and database error as repair context. Safety and syntax
//! failures are terminal on the spot: a model that produced unsafe SQL is not
//! given more attempts with the same unsafe output class, because nothing in
//! the context would change.

use crate::config::Config;
use crate::db::{fetch_schema, SchemaDescriptor};
use crate::error::{HoopError, Result};
use crate::generator::{RepairContext, SqlGenerator};
use crate::llm::LlmClient;
use crate::sql::{classify_execution_error, validate, ExecutionErrorClass, Governor, QueryOutput};
use sqlx::PgPool;
use tracing::{info, warn};

/// What the pipeline hands to its consumers (analyzer, boundaries). This is
/// the explicit contract between the SQL stage and everything downstream.
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub question: String,
    pub sql: String,
    pub output: QueryOutput,
    pub attempts: u8,
}

pub struct Pipeline {
    pool: PgPool,
    generator: SqlGenerator,
    governor: Governor,
    max_repair_attempts: u8,
}

impl Pipeline {
    pub fn new(pool: PgPool, config: &Config) -> Self {
        let llm = LlmClient::new(
            config.openai_api_key.clone(),
            config.openai_model.clone(),
            config.openai_base_url.clone(),
        );
        Self {
            pool,
            generator: SqlGenerator::new(llm),
            governor: Governor::from_config(config),
            max_repair_attempts: config.max_repair_attempts,
        }
    }

    /// Run a question end to end. Every repaired candidate is re-validated
    /// and re-governed exactly like the first one.
    pub async fn run(&self, question: &str) -> Result<QueryResult> {
        // Re-read per request; a stale descriptor would poison every repair.
        let schema: SchemaDescriptor = fetch_schema(&self.pool).await?;
        let description = schema.describe();

        let candidate = self.generator.generate(question, &description).await?;
        let mut sql = validate(&candidate)?;

        for attempt in 1..=self.max_repair_attempts {
            info!(
                "Execution attempt {} of {}",
                attempt, self.max_repair_attempts
            );

            match self.governor.run(&self.pool, &sql).await {
                Ok(output) => {
                    if output.rows.is_empty() {
                        return Err(HoopError::EmptyResult);
                    }
                    info!("Query succeeded on attempt {}", attempt);
                    return Ok(QueryResult {
                        question: question.to_string(),
                        sql,
                        output,
                        attempts: attempt,
                    });
                }
                Err(HoopError::Execution(message))
                    if classify_execution_error(&message)
                        == ExecutionErrorClass::SchemaMismatch =>
                {
                    warn!("Schema-shaped execution failure: {}", message);
                    if attempt == self.max_repair_attempts {
                        return Err(HoopError::MaxRepairAttempts(self.max_repair_attempts));
                    }

                    let context = RepairContext {
                        failing_sql: sql.clone(),
                        db_error: message,
                    };
                    let repaired = self
                        .generator
                        .repair(question, &description, &context)
                        .await?;
                    // No shortcuts for repaired candidates.
                    sql = validate(&repaired)?;
                }
                // Timeout, cost rejection, connectivity: not repairable.
                Err(e) => return Err(e),
            }
        }

        Err(HoopError::MaxRepairAttempts(self.max_repair_attempts))
    }
}
