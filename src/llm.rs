//! OpenAI-compatible chat completions client.
//!
//! SQL generation and repair use deterministic sampling (temperature 0) so a
//! repaired query does not regress for reasons unrelated to the repair
//! context. The dashboard interpretation path runs at low but nonzero
//! temperature in JSON mode.

use crate::error::{HoopError, Result};
use tracing::warn;

#[derive(Clone)]
pub struct LlmClient {
    api_key: String,
    base_url: String,
    model: String,
}

impl LlmClient {
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self {
            api_key,
            base_url,
            model,
        }
    }

    /// Plain text completion.
    pub async fn complete(
        &self,
        system: &str,
        user: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user}
            ],
            "temperature": temperature,
            "max_tokens": max_tokens,
        });
        self.call(body, user).await
    }

    /// Completion constrained to a JSON object response.
    pub async fn complete_json(
        &self,
        system: &str,
        user: &str,
        temperature: f32,
    ) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user}
            ],
            "temperature": temperature,
            "response_format": {"type": "json_object"},
        });
        self.call(body, user).await
    }

    async fn call(&self, body: serde_json::Value, user_prompt: &str) -> Result<String> {
        // Mock mode for tests and offline demos.
        if self.api_key == "dummy-api-key" {
            return Ok(mock_response(&body, user_prompt));
        }

        let client = reqwest::Client::new();
        let response = client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| HoopError::Generation(format!("LLM API call failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(HoopError::Generation(format!(
                "LLM API error ({}): {}",
                status, error_text
            )));
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| HoopError::Generation(format!("Failed to parse LLM response: {}", e)))?;

        if let Some(error) = response_json.get("error") {
            return Err(HoopError::Generation(format!("LLM API error: {}", error)));
        }

        let choices = response_json
            .get("choices")
            .and_then(|c| c.as_array())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                HoopError::Generation("No choices in LLM response".to_string())
            })?;

        if let Some(finish_reason) = choices[0].get("finish_reason").and_then(|r| r.as_str()) {
            if finish_reason == "length" {
                warn!("LLM response truncated by length limit");
            } else if finish_reason == "content_filter" {
                return Err(HoopError::Generation(
                    "LLM response was filtered by content policy".to_string(),
                ));
            }
        }

        let content = choices[0]["message"]["content"].as_str().ok_or_else(|| {
            HoopError::Generation("No content in LLM response".to_string())
        })?;

        if content.is_empty() {
            return Err(HoopError::Generation(
                "Empty content in LLM response".to_string(),
            ));
        }

        Ok(content.to_string())
    }
}

/// Canned responses keyed off the prompt, mirroring the request shapes the
/// pipeline sends. Keeps the full flow exercisable without network access.
fn mock_response(body: &serde_json::Value, user_prompt: &str) -> String {
    let json_mode = body.get("response_format").is_some();

    if json_mode {
        // Dashboard interpretation request.
        return r#"{"chartType": "Leaderboard", "sqlQuery": "SELECT player_name, team_abbreviation, pts AS stat_value FROM all_players_regular_2023_2024 WHERE gp > 40 ORDER BY stat_value DESC LIMIT 5", "chartConfig": {"statKey": "stat_value", "playerNames": [], "statDisplayName": "Points"}}"#
            .to_string();
    }

    if user_prompt.contains("Failed SQL") {
        // Repair request.
        return "SELECT player_name, pts AS stat_value FROM all_players_regular_2023_2024 ORDER BY stat_value DESC".to_string();
    }

    if user_prompt.contains("DATABASE SCHEMA") {
        // First-pass SQL generation.
        return "```sql\nSELECT player_name, pts AS stat_value FROM all_players_regular_2023_2024 ORDER BY stat_value DESC\n```".to_string();
    }

    "The ranked table identifies the leading player; see the composite scores for the margin over the next contenders.".to_string()
}
