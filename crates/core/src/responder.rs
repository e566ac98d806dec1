use anyhow::Result;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DEFAULT_LANGUAGE: &str = "en-US";

pub const APOLOGY_TEXT: &str =
    "I'm sorry, I've lost the connection to our main system. Let me try to reconnect.";
pub const NOT_CAUGHT_TEXT: &str = "I didn't quite catch that. Could you say it again?";

/// Label used when the model returns nothing for an intent.
pub const EMPTY_INTENT: &str = "Query";
/// Label used when intent analysis fails outright.
pub const FAILED_INTENT: &str = "Analysis";

pub const REPLY_SYSTEM_PROMPT: &str = r#"You are VoxAI, a sophisticated and empathetic AI voice assistant designed for seamless human-AI collaboration.
PERSONA RULES:
1. TONE: Warm, professional, and genuinely helpful. Avoid sounding like a rigid machine.
2. CONVERSATIONAL STYLE: Use natural language patterns. Brief acknowledgments like "Certainly" or "Great" are welcome.
3. BREVITY: Keep responses to 1-3 sentences. Short enough for voice interaction, long enough to feel human.
4. EMOTIONAL INTELLIGENCE: Acknowledge the user's intent with subtle empathy or enthusiasm where appropriate.
5. LANGUAGE: Detect the user's language and respond fluently in the EXACT same language.
6. IDENTITY: You are VoxAI. Refer to yourself naturally if needed, but keep the focus on the user's needs.
7. FORMAT: ALWAYS return a JSON object with 'text' and 'languageCode' (BCP 47 format, e.g., 'en-US', 'es-ES')."#;

pub const INTENT_SYSTEM_PROMPT: &str = "You are an intent analysis engine. Respond with exactly 1 or 2 words describing the user's primary goal.";

/// The agent's answer to one utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub text: String,
    #[serde(rename = "languageCode")]
    pub language_code: String,
}

impl Reply {
    pub fn new(text: impl Into<String>, language_code: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            language_code: language_code.into(),
        }
    }

    pub fn apology() -> Self {
        Self::new(APOLOGY_TEXT, DEFAULT_LANGUAGE)
    }
}

/// System prompts handed to the hosted model.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompts {
    pub reply_system: String,
    pub intent_system: String,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            reply_system: REPLY_SYSTEM_PROMPT.to_string(),
            intent_system: INTENT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl Prompts {
    /// Builds prompts from a `name -> text` map, keeping the defaults for missing keys.
    /// Recognised names are `reply_system` and `intent_system`.
    pub fn from_map(mut map: HashMap<String, String>) -> Self {
        let defaults = Self::default();
        let mut take = |key: &str, fallback: String| {
            map.remove(key)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or(fallback)
        };
        Self {
            reply_system: take("reply_system", defaults.reply_system),
            intent_system: take("intent_system", defaults.intent_system),
        }
    }

    pub fn intent_request(user_text: &str) -> String {
        format!("Categorize the intent of this message in 1-2 words: \"{user_text}\"")
    }
}

/// The hosted language model, seen from the orchestrator.
///
/// The two calls are independent: the orchestrator issues both for every
/// utterance and never waits on `intent` before speaking the `reply`.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Responder: Send + Sync {
    async fn reply(&self, user_text: &str) -> Result<Reply>;

    async fn intent(&self, user_text: &str) -> Result<String>;
}

/// Turns raw model output into a speakable reply.
///
/// Empty output asks the user to repeat; output that is not the expected JSON
/// object is spoken as-is in the default language.
pub fn parse_reply(raw: &str) -> Reply {
    let raw = raw.trim();
    if raw.is_empty() {
        return Reply::new(NOT_CAUGHT_TEXT, DEFAULT_LANGUAGE);
    }
    match serde_json::from_str::<Reply>(raw) {
        Ok(reply) if !reply.text.trim().is_empty() => {
            let language_code = if reply.language_code.trim().is_empty() {
                DEFAULT_LANGUAGE.to_string()
            } else {
                reply.language_code.trim().to_string()
            };
            Reply::new(reply.text.trim(), language_code)
        }
        Ok(_) => Reply::new(NOT_CAUGHT_TEXT, DEFAULT_LANGUAGE),
        Err(e) => {
            tracing::debug!("Model reply is not JSON ({}), speaking raw text", e);
            Reply::new(raw, DEFAULT_LANGUAGE)
        }
    }
}

/// Applies the service-boundary recovery policy to a raw reply request.
pub fn recover_reply(raw: Result<String>) -> Reply {
    match raw {
        Ok(text) => parse_reply(&text),
        Err(e) => {
            tracing::warn!("Reply request failed, substituting apology: {:?}", e);
            Reply::apology()
        }
    }
}

/// Applies the service-boundary recovery policy to a raw intent request.
pub fn recover_intent(raw: Result<String>) -> String {
    match raw {
        Ok(text) => {
            let label = text.trim().trim_matches(|c| c == '"' || c == '.').trim();
            if label.is_empty() {
                EMPTY_INTENT.to_string()
            } else {
                label.to_string()
            }
        }
        Err(e) => {
            tracing::warn!("Intent request failed: {:?}", e);
            FAILED_INTENT.to_string()
        }
    }
}

/// An offline `Responder` with canned answers.
///
/// Lets the console run without an API key. It recognises a handful of
/// greetings to exercise the language switch, and otherwise echoes the user.
pub struct ScriptedResponder;

#[async_trait]
impl Responder for ScriptedResponder {
    async fn reply(&self, user_text: &str) -> Result<Reply> {
        let words = words(user_text);
        let has = |w: &str| words.iter().any(|x| x == w);
        let reply = if has("hola") {
            Reply::new("¡Hola! ¿En qué puedo ayudarte hoy?", "es-ES")
        } else if has("bonjour") {
            Reply::new("Bonjour ! Comment puis-je vous aider ?", "fr-FR")
        } else if has("hallo") {
            Reply::new("Hallo! Wie kann ich Ihnen helfen?", "de-DE")
        } else if has("hello") || has("hi") {
            Reply::new("Hi there! How can I help you today?", DEFAULT_LANGUAGE)
        } else {
            Reply::new(
                format!("Certainly. You said: {}. Tell me more.", user_text.trim()),
                DEFAULT_LANGUAGE,
            )
        };
        Ok(reply)
    }

    async fn intent(&self, user_text: &str) -> Result<String> {
        let words = words(user_text);
        let first = words.first().map(String::as_str);
        let label = if user_text.contains('?') || matches!(first, Some("what" | "how" | "why")) {
            "Question"
        } else if ["hello", "hi", "hola", "bonjour", "hallo"]
            .iter()
            .any(|g| words.iter().any(|w| w == g))
        {
            "Greeting"
        } else {
            EMPTY_INTENT
        };
        Ok(label.to_string())
    }
}

fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}
