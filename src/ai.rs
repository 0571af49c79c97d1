//! Intent classification and AI reply generation.
//!
//! Both adapters wrap a [`GenerativeBackend`] and never fail outward:
//! classification degrades to a low-confidence `general_question`, reply
//! generation degrades to a localized apology.

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, LazyLock};
use tracing::{debug, warn};

use crate::circuit_breaker::CircuitBreaker;
use crate::config::{RecoveryConfig, DEFAULT_HISTORY_LIMIT};
use crate::error::{BotError, Result};
use crate::localization::t_lang;
use crate::models::{ChatTurn, Language, Product};

/// Confidence reported when classification could not run
pub const FALLBACK_CONFIDENCE: f32 = 0.3;

static JSON_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("JSON object pattern should be valid"));

/// A text generation service (Gemini in production)
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    async fn generate(&self, system_prompt: &str, history: &[ChatTurn], message: &str)
        -> Result<String>;
}

/// Backend handle shared by the adapters: absent backend and open breaker
/// both surface as [`BotError::Backend`]
#[derive(Clone)]
pub struct GuardedBackend {
    backend: Option<Arc<dyn GenerativeBackend>>,
    breaker: Arc<CircuitBreaker>,
}

impl GuardedBackend {
    pub fn new(backend: Option<Arc<dyn GenerativeBackend>>, recovery: &RecoveryConfig) -> Self {
        Self {
            backend,
            breaker: Arc::new(CircuitBreaker::new(recovery)),
        }
    }

    /// No backend configured: every call takes the fallback path
    pub fn disabled() -> Self {
        Self::new(None, &RecoveryConfig::default())
    }

    async fn generate(&self, system_prompt: &str, history: &[ChatTurn], message: &str) -> Result<String> {
        let Some(backend) = &self.backend else {
            return Err(BotError::Backend("generative backend not configured".to_string()));
        };
        if self.breaker.is_open() {
            return Err(BotError::Backend("circuit breaker open".to_string()));
        }
        match backend.generate(system_prompt, history, message).await {
            Ok(text) => {
                self.breaker.record_success();
                Ok(text)
            }
            Err(e) => {
                self.breaker.record_failure();
                Err(e)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    ProductInquiry,
    OrderRequest,
    GeneralQuestion,
    Complaint,
    Greeting,
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Intent::ProductInquiry => "product_inquiry",
            Intent::OrderRequest => "order_request",
            Intent::GeneralQuestion => "general_question",
            Intent::Complaint => "complaint",
            Intent::Greeting => "greeting",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IntentEntities {
    pub product_name: Option<String>,
    pub quantity: Option<u32>,
    pub price_range: Option<PriceRange>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentResult {
    pub intent: Intent,
    pub confidence: f32,
    pub entities: Option<IntentEntities>,
}

impl IntentResult {
    pub fn fallback() -> Self {
        Self {
            intent: Intent::GeneralQuestion,
            confidence: FALLBACK_CONFIDENCE,
            entities: None,
        }
    }
}

/// Shape the model is asked to produce; tolerant of unknown intents
#[derive(Debug, Deserialize)]
struct RawIntent {
    intent: String,
    #[serde(default)]
    confidence: Option<f32>,
    #[serde(default)]
    entities: Option<IntentEntities>,
}

/// Parse a model reply into an intent, accepting prose or code fences
/// around the JSON object
pub fn parse_intent_response(text: &str) -> Option<IntentResult> {
    let json = JSON_OBJECT.find(text)?.as_str();
    let raw: RawIntent = serde_json::from_str(json).ok()?;

    let intent = match raw.intent.trim().to_lowercase().as_str() {
        "product_inquiry" => Intent::ProductInquiry,
        "order_request" => Intent::OrderRequest,
        "complaint" => Intent::Complaint,
        "greeting" => Intent::Greeting,
        _ => Intent::GeneralQuestion,
    };

    Some(IntentResult {
        intent,
        confidence: raw.confidence.unwrap_or(0.5).clamp(0.0, 1.0),
        entities: raw.entities,
    })
}

const CLASSIFIER_PROMPT: &str = "You classify messages sent to an online shop's Telegram bot. \
Customers write in Uzbek or Russian. Reply with a single JSON object and nothing else: \
{\"intent\": one of \"product_inquiry\", \"order_request\", \"general_question\", \"complaint\", \"greeting\", \
\"confidence\": number between 0 and 1, \
\"entities\": {\"product_name\": string or null, \"quantity\": integer or null, \
\"price_range\": {\"min\": number or null, \"max\": number or null} or null}}";

#[derive(Clone)]
pub struct IntentClassifier {
    backend: GuardedBackend,
}

impl IntentClassifier {
    pub fn new(backend: GuardedBackend) -> Self {
        Self { backend }
    }

    pub async fn classify(&self, text: &str, language: Language) -> IntentResult {
        let message = format!("Language: {}\nMessage: {text}", language.display_name());
        match self.backend.generate(CLASSIFIER_PROMPT, &[], &message).await {
            Ok(reply) => match parse_intent_response(&reply) {
                Some(result) => {
                    debug!(intent = %result.intent, confidence = result.confidence, "Message classified");
                    result
                }
                None => {
                    warn!(reply = %reply, "Unparseable intent classification, using fallback");
                    IntentResult::fallback()
                }
            },
            Err(e) => {
                warn!(error = %e, "Intent classification failed, using fallback");
                IntentResult::fallback()
            }
        }
    }
}

/// Inputs for one AI reply
#[derive(Debug, Clone, Copy)]
pub struct ReplyContext<'a> {
    pub language: Language,
    pub history: &'a [ChatTurn],
    pub products: &'a [Product],
}

/// System prompt pinning the reply language and the catalog context
pub fn build_system_prompt(language: Language, products: &[Product]) -> String {
    let mut prompt = format!(
        "You are a polite sales assistant for an online shop in Uzbekistan. \
Always answer in {} only, briefly and helpfully. \
Never invent products, prices or stock levels. \
If you cannot help, suggest contacting the operator.",
        language.display_name()
    );

    if !products.is_empty() {
        prompt.push_str("\n\nRelevant products from the catalog:\n");
        for product in products {
            prompt.push_str(&format!(
                "- {} | price: {} | in stock: {}",
                product.name(language),
                product.price,
                product.stock
            ));
            if let Some(description) = product.description(language) {
                prompt.push_str(&format!(" | {description}"));
            }
            prompt.push('\n');
        }
    }

    prompt
}

#[derive(Clone)]
pub struct ResponseGenerator {
    backend: GuardedBackend,
    history_limit: usize,
}

impl ResponseGenerator {
    pub fn new(backend: GuardedBackend) -> Self {
        Self {
            backend,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    pub fn with_history_limit(mut self, history_limit: usize) -> Self {
        self.history_limit = history_limit;
        self
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    pub async fn generate_reply(&self, message: &str, context: ReplyContext<'_>) -> String {
        let start = context.history.len().saturating_sub(self.history_limit);
        let history = &context.history[start..];
        let system_prompt = build_system_prompt(context.language, context.products);

        match self.backend.generate(&system_prompt, history, message).await {
            Ok(reply) if !reply.trim().is_empty() => reply.trim().to_string(),
            Ok(_) => {
                warn!("Empty AI reply, sending apology");
                t_lang("ai-apology", context.language)
            }
            Err(e) => {
                warn!(error = %e, "AI reply generation failed, sending apology");
                t_lang("ai-apology", context.language)
            }
        }
    }
}
