use crate::responder::{Prompts, Reply, Responder, recover_intent, recover_reply};
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    pub content: Option<Content>,
}

#[derive(Debug, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
pub struct Part {
    pub text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenates the text parts of the first candidate.
    pub fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| {
                c.parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

/// A `Responder` that calls Gemini's `generateContent` REST endpoint.
pub struct GeminiResponder {
    client: Client,
    base_url: String,
    api_key: SecretString,
    model: String,
    prompts: Prompts,
}

impl GeminiResponder {
    pub fn new(api_key: SecretString, model: String, prompts: Prompts) -> Self {
        Self {
            client: Client::new(),
            base_url: GEMINI_BASE_URL.to_string(),
            api_key,
            model,
            prompts,
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    async fn generate(&self, body: serde_json::Value) -> Result<String> {
        let resp = self
            .client
            .post(format!(
                "{}/models/{}:generateContent",
                self.base_url, self.model
            ))
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json::<GenerateContentResponse>()
            .await?;
        Ok(resp.text())
    }
}

#[async_trait]
impl Responder for GeminiResponder {
    async fn reply(&self, user_text: &str) -> Result<Reply> {
        let body = serde_json::json!({
            "systemInstruction": { "parts": [{ "text": self.prompts.reply_system }] },
            "contents": [{ "role": "user", "parts": [{ "text": user_text }] }],
            "generationConfig": {
                "temperature": 0.7,
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "OBJECT",
                    "properties": {
                        "text": {
                            "type": "STRING",
                            "description": "The conversational response to the user."
                        },
                        "languageCode": {
                            "type": "STRING",
                            "description": "The BCP 47 language code of the response."
                        }
                    },
                    "required": ["text", "languageCode"]
                }
            }
        });
        Ok(recover_reply(self.generate(body).await))
    }

    async fn intent(&self, user_text: &str) -> Result<String> {
        let body = serde_json::json!({
            "systemInstruction": { "parts": [{ "text": self.prompts.intent_system }] },
            "contents": [{ "role": "user", "parts": [{ "text": Prompts::intent_request(user_text) }] }],
            "generationConfig": { "temperature": 0.1 }
        });
        Ok(recover_intent(self.generate(body).await))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_joins_parts_of_first_candidate() {
        let json = r#"{
            "candidates": [
                {"content": {"role": "model", "parts": [{"text": "{\"text\": \"Hi\","}, {"text": " \"languageCode\": \"en-US\"}"}]}},
                {"content": {"role": "model", "parts": [{"text": "ignored"}]}}
            ]
        }"#;
        let resp: GenerateContentResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            crate::responder::parse_reply(&resp.text()),
            Reply::new("Hi", "en-US")
        );
    }

    #[test]
    fn test_blocked_prompt_has_no_text() {
        let json = r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#;
        let resp: GenerateContentResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.text(), "");
    }
}
