use crate::responder::{Prompts, Reply, Responder, recover_intent, recover_reply};
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: Message,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub content: Option<String>,
}

/// A `Responder` backed by an OpenAI-compatible chat-completions endpoint.
pub struct ResponderClient {
    client: Client,
    base_url: String,
    api_key: SecretString,
    model: String,
    prompts: Prompts,
}

impl ResponderClient {
    pub fn new(api_key: SecretString, model: String, prompts: Prompts) -> Self {
        Self {
            client: Client::new(),
            base_url: OPENAI_BASE_URL.to_string(),
            api_key,
            model,
            prompts,
        }
    }

    /// Points the client at another compatible server (a local gateway, a proxy).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    async fn complete(&self, body: serde_json::Value) -> Result<String> {
        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json::<LlmResponse>()
            .await?;

        let answer = resp
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("No response from LLM"))?
            .message
            .content
            .unwrap_or_default();
        Ok(answer)
    }
}

#[async_trait]
impl Responder for ResponderClient {
    async fn reply(&self, user_text: &str) -> Result<Reply> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": self.prompts.reply_system },
                { "role": "user", "content": user_text }
            ],
            "response_format": { "type": "json_object" },
            "temperature": 0.7
        });
        Ok(recover_reply(self.complete(body).await))
    }

    async fn intent(&self, user_text: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": self.prompts.intent_system },
                { "role": "user", "content": Prompts::intent_request(user_text) }
            ],
            "temperature": 0.1
        });
        Ok(recover_intent(self.complete(body).await))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_response_tolerates_null_content() {
        let json = r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
        let resp: LlmResponse = serde_json::from_str(json).unwrap();
        assert!(resp.choices[0].message.content.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_server_yields_apology() {
        // Nothing listens on port 9 of the loopback interface.
        let client = ResponderClient::new(
            SecretString::from("sk-test".to_string()),
            "gpt-4o".to_string(),
            Prompts::default(),
        )
        .with_base_url("http://127.0.0.1:9/v1/");

        let reply = client.reply("hello").await.unwrap();
        assert_eq!(reply, Reply::apology());
        assert_eq!(client.intent("hello").await.unwrap(), "Analysis");
    }
}
