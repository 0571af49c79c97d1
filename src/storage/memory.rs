//! In-memory [`Storage`] backend, used by the test suite and for running
//! the bot without a database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use tokio::sync::Mutex;

use super::Storage;
use crate::error::{BotError, Result};
use crate::models::{
    BotSettings, ChatTurn, Conversation, Language, MarketingMessage, NewOrder, NewUser, Order,
    OrderStatus, OrderUpdate, Platform, Product, User, UserUpdate,
};

#[derive(Default)]
struct Tables {
    products: BTreeMap<i64, Product>,
    orders: BTreeMap<i64, Order>,
    users: BTreeMap<i64, User>,
    conversations: BTreeMap<i64, Conversation>,
    marketing: BTreeMap<i64, MarketingMessage>,
    settings: Option<BotSettings>,
    next_id: i64,
    /// Order ids whose writes fail, to exercise partial batch failures
    failing_orders: HashSet<i64>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct InMemoryStorage {
    tables: Mutex<Tables>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a product; an id of 0 is replaced by a fresh one
    pub async fn insert_product(&self, mut product: Product) -> Product {
        let mut tables = self.tables.lock().await;
        if product.id == 0 {
            product.id = tables.next_id();
        }
        tables.products.insert(product.id, product.clone());
        product
    }

    /// Insert a marketing message; an id of 0 is replaced by a fresh one
    pub async fn insert_marketing_message(&self, mut message: MarketingMessage) -> MarketingMessage {
        let mut tables = self.tables.lock().await;
        if message.id == 0 {
            message.id = tables.next_id();
        }
        tables.marketing.insert(message.id, message.clone());
        message
    }

    pub async fn set_bot_settings(&self, settings: BotSettings) {
        self.tables.lock().await.settings = Some(settings);
    }

    /// Make every later write to `order_id` fail
    pub async fn fail_writes_for_order(&self, order_id: i64) {
        self.tables.lock().await.failing_orders.insert(order_id);
    }

    pub async fn all_orders(&self) -> Vec<Order> {
        self.tables.lock().await.orders.values().cloned().collect()
    }
}

fn check_writable(tables: &Tables, order_id: i64) -> Result<()> {
    if tables.failing_orders.contains(&order_id) {
        return Err(BotError::InvalidData(format!(
            "write rejected for order {order_id}"
        )));
    }
    Ok(())
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn get_product(&self, id: i64) -> Result<Option<Product>> {
        Ok(self.tables.lock().await.products.get(&id).cloned())
    }

    async fn search_products(&self, query: &str, language: Language) -> Result<Vec<Product>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        let tables = self.tables.lock().await;
        Ok(tables
            .products
            .values()
            .filter(|product| product.is_active)
            .filter(|product| {
                product.name_uz.to_lowercase().contains(&needle)
                    || product.name_ru.to_lowercase().contains(&needle)
                    || product
                        .description(language)
                        .is_some_and(|d| d.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect())
    }

    async fn list_products(&self, limit: usize) -> Result<Vec<Product>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .products
            .values()
            .filter(|product| product.is_active && product.stock > 0)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn create_order(&self, order: NewOrder) -> Result<Order> {
        let mut tables = self.tables.lock().await;
        let id = tables.next_id();
        let order = Order {
            id,
            user_id: order.user_id,
            product_id: order.product_id,
            product_name: order.product_name,
            quantity: order.quantity,
            unit_price: order.unit_price,
            total_price: order.total_price,
            status: OrderStatus::Pending,
            customer_name: None,
            customer_phone: None,
            customer_address: None,
            payment_method: None,
            created_at: Utc::now(),
        };
        tables.orders.insert(id, order.clone());
        Ok(order)
    }

    async fn update_order(&self, id: i64, update: OrderUpdate) -> Result<Order> {
        let mut tables = self.tables.lock().await;
        check_writable(&tables, id)?;
        let order = tables
            .orders
            .get_mut(&id)
            .ok_or_else(|| BotError::not_found("Order", id))?;

        if let Some(name) = update.customer_name {
            order.customer_name = Some(name);
        }
        if let Some(phone) = update.customer_phone {
            order.customer_phone = Some(phone);
        }
        if let Some(address) = update.customer_address {
            order.customer_address = Some(address);
        }
        if let Some(method) = update.payment_method {
            order.payment_method = Some(method);
        }
        if let Some(status) = update.status {
            order.status = status;
        }
        Ok(order.clone())
    }

    async fn update_order_status(&self, id: i64, status: OrderStatus) -> Result<Order> {
        self.update_order(
            id,
            OrderUpdate {
                status: Some(status),
                ..OrderUpdate::default()
            },
        )
        .await
    }

    async fn delete_order(&self, id: i64) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        check_writable(&tables, id)?;
        Ok(tables.orders.remove(&id).is_some())
    }

    async fn get_orders_by_user(&self, user_id: i64) -> Result<Vec<Order>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .orders
            .values()
            .filter(|order| order.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn get_user_by_platform_id(
        &self,
        platform_id: &str,
        platform: Platform,
    ) -> Result<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .values()
            .find(|user| user.platform_id == platform_id && user.platform_type == platform)
            .cloned())
    }

    async fn create_user(&self, user: NewUser) -> Result<User> {
        let mut tables = self.tables.lock().await;
        let id = tables.next_id();
        let user = User {
            id,
            platform_id: user.platform_id,
            platform_type: user.platform_type,
            language: user.language,
            username: user.username,
            phone_number: None,
            full_name: user.full_name,
        };
        tables.users.insert(id, user.clone());
        Ok(user)
    }

    async fn update_user(&self, id: i64, update: UserUpdate) -> Result<User> {
        let mut tables = self.tables.lock().await;
        let user = tables
            .users
            .get_mut(&id)
            .ok_or_else(|| BotError::not_found("User", id))?;
        if let Some(language) = update.language {
            user.language = Some(language);
        }
        if let Some(phone) = update.phone_number {
            user.phone_number = Some(phone);
        }
        if let Some(name) = update.full_name {
            user.full_name = Some(name);
        }
        Ok(user.clone())
    }

    async fn get_all_users(&self) -> Result<Vec<User>> {
        Ok(self.tables.lock().await.users.values().cloned().collect())
    }

    async fn get_conversation(
        &self,
        user_id: i64,
        platform: Platform,
    ) -> Result<Option<Conversation>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .conversations
            .values()
            .find(|c| c.user_id == user_id && c.platform == platform)
            .cloned())
    }

    async fn create_conversation(
        &self,
        user_id: i64,
        platform: Platform,
        messages: Vec<ChatTurn>,
    ) -> Result<Conversation> {
        let mut tables = self.tables.lock().await;
        let id = tables.next_id();
        let conversation = Conversation {
            id,
            user_id,
            platform,
            messages,
        };
        tables.conversations.insert(id, conversation.clone());
        Ok(conversation)
    }

    async fn update_conversation_messages(&self, id: i64, messages: Vec<ChatTurn>) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let conversation = tables
            .conversations
            .get_mut(&id)
            .ok_or_else(|| BotError::not_found("Conversation", id))?;
        conversation.messages = messages;
        Ok(())
    }

    async fn get_bot_settings(&self) -> Result<Option<BotSettings>> {
        Ok(self.tables.lock().await.settings.clone())
    }

    async fn get_active_marketing_messages(&self) -> Result<Vec<MarketingMessage>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .marketing
            .values()
            .filter(|message| message.is_active)
            .cloned()
            .collect())
    }

    async fn get_marketing_message(&self, id: i64) -> Result<Option<MarketingMessage>> {
        Ok(self.tables.lock().await.marketing.get(&id).cloned())
    }

    async fn update_marketing_last_sent(&self, id: i64, sent_at: DateTime<Utc>) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let message = tables
            .marketing
            .get_mut(&id)
            .ok_or_else(|| BotError::not_found("MarketingMessage", id))?;
        message.last_sent_at = Some(sent_at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(name: &str, price: f64) -> Product {
        Product {
            id: 0,
            name_uz: name.to_string(),
            name_ru: format!("{name} (ru)"),
            description_uz: None,
            description_ru: None,
            price,
            stock: 10,
            image_url: None,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive_and_skips_inactive() -> Result<()> {
        let storage = InMemoryStorage::new();
        storage.insert_product(product("Qizil Olma", 5.0)).await;
        let mut hidden = product("Olma sharbati", 7.0);
        hidden.is_active = false;
        storage.insert_product(hidden).await;

        let found = storage.search_products("olma", Language::Uz).await?;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name_uz, "Qizil Olma");
        Ok(())
    }

    #[tokio::test]
    async fn test_order_status_update_and_delete() -> Result<()> {
        let storage = InMemoryStorage::new();
        let apple = storage.insert_product(product("Olma", 5.0)).await;
        let order = storage
            .create_order(NewOrder::for_product(1, &apple, Language::Uz, 2))
            .await?;
        assert_eq!(order.status, OrderStatus::Pending);

        let updated = storage
            .update_order_status(order.id, OrderStatus::Completed)
            .await?;
        assert_eq!(updated.status, OrderStatus::Completed);

        assert!(storage.delete_order(order.id).await?);
        assert!(!storage.delete_order(order.id).await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_update_missing_order_is_not_found() {
        let storage = InMemoryStorage::new();
        let result = storage
            .update_order_status(404, OrderStatus::Processing)
            .await;
        assert!(matches!(result, Err(BotError::NotFound { .. })));
    }
}
