//! Persistence contract consumed by the bot.
//!
//! Every method is a single read or a single-row write; batch operations
//! (checkout, clear cart) are composed by the caller row by row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{
    BotSettings, ChatTurn, Conversation, Language, MarketingMessage, NewOrder, NewUser, Order,
    OrderStatus, OrderUpdate, Platform, Product, User, UserUpdate,
};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryStorage;
pub use postgres::PgStorage;

#[async_trait]
pub trait Storage: Send + Sync {
    async fn get_product(&self, id: i64) -> Result<Option<Product>>;
    /// Active products whose name or description contains `query`, case-insensitively
    async fn search_products(&self, query: &str, language: Language) -> Result<Vec<Product>>;
    /// Active in-stock products, at most `limit`
    async fn list_products(&self, limit: usize) -> Result<Vec<Product>>;

    async fn create_order(&self, order: NewOrder) -> Result<Order>;
    async fn update_order(&self, id: i64, update: OrderUpdate) -> Result<Order>;
    async fn update_order_status(&self, id: i64, status: OrderStatus) -> Result<Order>;
    /// Returns `false` when no such order existed
    async fn delete_order(&self, id: i64) -> Result<bool>;
    async fn get_orders_by_user(&self, user_id: i64) -> Result<Vec<Order>>;

    async fn get_user_by_platform_id(
        &self,
        platform_id: &str,
        platform: Platform,
    ) -> Result<Option<User>>;
    async fn create_user(&self, user: NewUser) -> Result<User>;
    async fn update_user(&self, id: i64, update: UserUpdate) -> Result<User>;
    async fn get_all_users(&self) -> Result<Vec<User>>;

    async fn get_conversation(&self, user_id: i64, platform: Platform)
        -> Result<Option<Conversation>>;
    async fn create_conversation(
        &self,
        user_id: i64,
        platform: Platform,
        messages: Vec<ChatTurn>,
    ) -> Result<Conversation>;
    async fn update_conversation_messages(&self, id: i64, messages: Vec<ChatTurn>) -> Result<()>;

    async fn get_bot_settings(&self) -> Result<Option<BotSettings>>;

    async fn get_active_marketing_messages(&self) -> Result<Vec<MarketingMessage>>;
    async fn get_marketing_message(&self, id: i64) -> Result<Option<MarketingMessage>>;
    async fn update_marketing_last_sent(&self, id: i64, sent_at: DateTime<Utc>) -> Result<()>;
}

/// Pending orders of a user, i.e. their cart
pub async fn pending_orders(storage: &dyn Storage, user_id: i64) -> Result<Vec<Order>> {
    Ok(storage
        .get_orders_by_user(user_id)
        .await?
        .into_iter()
        .filter(|order| order.status == OrderStatus::Pending)
        .collect())
}
