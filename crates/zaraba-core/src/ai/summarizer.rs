use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::AiConfig;
use crate::storage::{ArticleRepository, Database};
use crate::{Error, Result};

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// Client for the chat-completions summarization endpoint.
///
/// One synchronous request per article: the body goes into a single
/// user-role message with the configured temperature and token budget,
/// bounded by the configured timeout.
pub struct SummaryClient {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl SummaryClient {
    pub fn new(config: &AiConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| Error::Config("ai.api_key is not set".to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(Error::Http)?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    /// Generate a summary for one article body
    pub async fn generate(&self, body: &str) -> Result<String> {
        let prompt = format!(
            "あなたは上場企業の決算ニュース要約アシスタントです。\
             以下の記事本文を読み、売上高・利益などの数字と変化を必ず含めて、\
             日本語200文字以内で要点をまとめてください。\n\n【記事本文】\n{}",
            body
        );

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt,
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(Error::Http)?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Summary(format!(
                "summary endpoint returned HTTP {}",
                status
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Summary(format!("unparseable summary response: {}", e)))?;

        extract_content(parsed)
    }

    /// Generate and persist a summary for one article
    pub async fn generate_and_store(&self, db: &Database, article_id: i64, body: &str) -> Result<()> {
        let summary = self.generate(body).await?;

        let repo = ArticleRepository::new(db);
        repo.update_summary(article_id, &summary).await?;

        tracing::info!("Stored summary for article {}", article_id);
        Ok(())
    }
}

/// An empty choice list is a failure, never an empty summary
fn extract_content(response: ChatResponse) -> Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content)
        .ok_or_else(|| Error::Summary("no summary was generated".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_choice_content_is_extracted() {
        let response: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"増益の決算でした。"}}]}"#,
        )
        .unwrap();
        assert_eq!(extract_content(response).unwrap(), "増益の決算でした。");
    }

    #[test]
    fn test_empty_choices_is_a_failure() {
        let response: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(extract_content(response), Err(Error::Summary(_))));
    }
}
