//! # Data Model
//!
//! Records exchanged with the persistence layer. The "cart" has no table of
//! its own: a cart line is an [`Order`] whose status is still
//! [`OrderStatus::Pending`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Languages the bot converses in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Uz,
    Ru,
}

impl Language {
    pub fn code(self) -> &'static str {
        match self {
            Language::Uz => "uz",
            Language::Ru => "ru",
        }
    }

    /// Strict parse of a stored language code
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_lowercase().as_str() {
            "uz" => Some(Language::Uz),
            "ru" => Some(Language::Ru),
            _ => None,
        }
    }

    /// Best guess from a Telegram client language code (`ru-RU`, `uz`, `en`...)
    pub fn from_client_code(code: Option<&str>) -> Self {
        match code {
            Some(code) if code.to_lowercase().starts_with("ru") => Language::Ru,
            _ => Language::Uz,
        }
    }

    /// Human-readable name used in system prompts
    pub fn display_name(self) -> &'static str {
        match self {
            Language::Uz => "Uzbek",
            Language::Ru => "Russian",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Messaging platforms users can reach the shop from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Telegram,
    Instagram,
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Telegram => "telegram",
            Platform::Instagram => "instagram",
        }
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "telegram" => Ok(Platform::Telegram),
            "instagram" => Ok(Platform::Instagram),
            other => Err(format!("unknown platform: {other}")),
        }
    }
}

/// A catalog product with bilingual name and description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name_uz: String,
    pub name_ru: String,
    pub description_uz: Option<String>,
    pub description_ru: Option<String>,
    pub price: f64,
    pub stock: i32,
    pub image_url: Option<String>,
    pub is_active: bool,
}

impl Product {
    pub fn name(&self, language: Language) -> &str {
        match language {
            Language::Uz => &self.name_uz,
            Language::Ru => &self.name_ru,
        }
    }

    pub fn description(&self, language: Language) -> Option<&str> {
        match language {
            Language::Uz => self.description_uz.as_deref(),
            Language::Ru => self.description_ru.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "processing" => Ok(OrderStatus::Processing),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}

/// An order row; a cart line while `status == Pending`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub user_id: i64,
    pub product_id: i64,
    /// Denormalized at add-to-cart time
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: f64,
    pub total_price: f64,
    pub status: OrderStatus,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_address: Option<String>,
    pub payment_method: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields for a new cart line
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub user_id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: f64,
    pub total_price: f64,
}

impl NewOrder {
    pub fn for_product(user_id: i64, product: &Product, language: Language, quantity: u32) -> Self {
        let quantity = quantity as i32;
        Self {
            user_id,
            product_id: product.id,
            product_name: product.name(language).to_string(),
            quantity,
            unit_price: product.price,
            total_price: product.price * f64::from(quantity),
        }
    }
}

/// Partial update applied to an order; `None` leaves a column untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderUpdate {
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_address: Option<String>,
    pub payment_method: Option<String>,
    pub status: Option<OrderStatus>,
}

/// A platform user as known to the shop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub platform_id: String,
    pub platform_type: Platform,
    /// `None` until the user picks a language
    pub language: Option<Language>,
    pub username: Option<String>,
    pub phone_number: Option<String>,
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub platform_id: String,
    pub platform_type: Platform,
    pub language: Option<Language>,
    pub username: Option<String>,
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserUpdate {
    pub language: Option<Language>,
    pub phone_number: Option<String>,
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One stored turn of a user's conversation with the assistant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    pub id: i64,
    pub user_id: i64,
    pub platform: Platform,
    pub messages: Vec<ChatTurn>,
}

/// A keyword-triggered canned reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleEntry {
    pub keyword: String,
    pub response: String,
}

impl RuleEntry {
    pub fn new(keyword: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            response: response.into(),
        }
    }
}

/// Operator-managed settings read by the bot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BotSettings {
    pub contact_info: Option<String>,
    pub operator_phone: Option<String>,
    pub working_hours: Option<String>,
    pub company_address: Option<String>,
    pub telegram_bot_username: Option<String>,
    /// Per-language keyword tables; order within each table is significant
    #[serde(default)]
    pub rule_based_responses: HashMap<Language, Vec<RuleEntry>>,
}

/// A bilingual broadcast message resent every `interval_days`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketingMessage {
    pub id: i64,
    pub title_uz: String,
    pub title_ru: String,
    pub content_uz: String,
    pub content_ru: String,
    pub image_url: Option<String>,
    pub is_active: bool,
    pub interval_days: i32,
    pub last_sent_at: Option<DateTime<Utc>>,
}

impl MarketingMessage {
    pub fn title(&self, language: Language) -> &str {
        match language {
            Language::Uz => &self.title_uz,
            Language::Ru => &self.title_ru,
        }
    }

    pub fn content(&self, language: Language) -> &str {
        match language {
            Language::Uz => &self.content_uz,
            Language::Ru => &self.content_ru,
        }
    }
}
