//! Postgres [`Storage`] backend over an sqlx connection pool.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::Row;
use tracing::{debug, info};

use super::Storage;
use crate::error::{BotError, Result};
use crate::models::{
    BotSettings, ChatTurn, Conversation, Language, MarketingMessage, NewOrder, NewUser, Order,
    OrderStatus, OrderUpdate, Platform, Product, RuleEntry, User, UserUpdate,
};

const SCHEMA: &[(&str, &str)] = &[
    (
        "products",
        "CREATE TABLE IF NOT EXISTS products (
            id BIGSERIAL PRIMARY KEY,
            name_uz TEXT NOT NULL,
            name_ru TEXT NOT NULL,
            description_uz TEXT,
            description_ru TEXT,
            price DOUBLE PRECISION NOT NULL,
            stock INTEGER NOT NULL DEFAULT 0,
            image_url TEXT,
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    ),
    (
        "users",
        "CREATE TABLE IF NOT EXISTS users (
            id BIGSERIAL PRIMARY KEY,
            platform_id TEXT NOT NULL,
            platform_type TEXT NOT NULL,
            language_code TEXT,
            username TEXT,
            phone_number TEXT,
            full_name TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            UNIQUE (platform_id, platform_type)
        )",
    ),
    (
        "orders",
        "CREATE TABLE IF NOT EXISTS orders (
            id BIGSERIAL PRIMARY KEY,
            user_id BIGINT NOT NULL REFERENCES users(id),
            product_id BIGINT NOT NULL REFERENCES products(id),
            product_name TEXT NOT NULL,
            quantity INTEGER NOT NULL CHECK (quantity BETWEEN 1 AND 10000),
            unit_price DOUBLE PRECISION NOT NULL,
            total_price DOUBLE PRECISION NOT NULL,
            order_status TEXT NOT NULL DEFAULT 'pending',
            customer_name TEXT,
            customer_phone TEXT,
            customer_address TEXT,
            payment_method TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    ),
    (
        "conversations",
        "CREATE TABLE IF NOT EXISTS conversations (
            id BIGSERIAL PRIMARY KEY,
            user_id BIGINT NOT NULL REFERENCES users(id),
            platform TEXT NOT NULL,
            messages JSONB NOT NULL DEFAULT '[]'::jsonb,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    ),
    (
        "bot_settings",
        "CREATE TABLE IF NOT EXISTS bot_settings (
            id SERIAL PRIMARY KEY,
            contact_info TEXT,
            operator_phone TEXT,
            working_hours TEXT,
            company_address TEXT,
            telegram_bot_username TEXT,
            rule_based_responses JSONB
        )",
    ),
    (
        "marketing_messages",
        "CREATE TABLE IF NOT EXISTS marketing_messages (
            id BIGSERIAL PRIMARY KEY,
            title_uz TEXT NOT NULL,
            title_ru TEXT NOT NULL,
            content_uz TEXT NOT NULL,
            content_ru TEXT NOT NULL,
            image_url TEXT,
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            interval_days INTEGER NOT NULL DEFAULT 7,
            last_sent_at TIMESTAMPTZ
        )",
    ),
];

const ORDER_COLUMNS: &str = "id, user_id, product_id, product_name, quantity, unit_price, \
    total_price, order_status, customer_name, customer_phone, customer_address, payment_method, \
    created_at";

const USER_COLUMNS: &str =
    "id, platform_id, platform_type, language_code, username, phone_number, full_name";

const PRODUCT_COLUMNS: &str = "id, name_uz, name_ru, description_uz, description_ru, price, \
    stock, image_url, is_active";

const MARKETING_COLUMNS: &str = "id, title_uz, title_ru, content_uz, content_ru, image_url, \
    is_active, interval_days, last_sent_at";

/// Create the tables the bot reads and writes, if missing
pub async fn init_database_schema(pool: &PgPool) -> Result<()> {
    info!("Initializing database schema...");
    for (table, ddl) in SCHEMA {
        sqlx::query(ddl).execute(pool).await?;
        debug!(table = %table, "Table ready");
    }
    info!("Database schema initialized successfully");
    Ok(())
}

pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn product_from_row(row: &PgRow) -> Result<Product> {
    Ok(Product {
        id: row.try_get("id")?,
        name_uz: row.try_get("name_uz")?,
        name_ru: row.try_get("name_ru")?,
        description_uz: row.try_get("description_uz")?,
        description_ru: row.try_get("description_ru")?,
        price: row.try_get("price")?,
        stock: row.try_get("stock")?,
        image_url: row.try_get("image_url")?,
        is_active: row.try_get("is_active")?,
    })
}

fn order_from_row(row: &PgRow) -> Result<Order> {
    let status: String = row.try_get("order_status")?;
    Ok(Order {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        product_id: row.try_get("product_id")?,
        product_name: row.try_get("product_name")?,
        quantity: row.try_get("quantity")?,
        unit_price: row.try_get("unit_price")?,
        total_price: row.try_get("total_price")?,
        status: status.parse().map_err(BotError::InvalidData)?,
        customer_name: row.try_get("customer_name")?,
        customer_phone: row.try_get("customer_phone")?,
        customer_address: row.try_get("customer_address")?,
        payment_method: row.try_get("payment_method")?,
        created_at: row.try_get("created_at")?,
    })
}

fn user_from_row(row: &PgRow) -> Result<User> {
    let platform: String = row.try_get("platform_type")?;
    let language: Option<String> = row.try_get("language_code")?;
    Ok(User {
        id: row.try_get("id")?,
        platform_id: row.try_get("platform_id")?,
        platform_type: platform.parse().map_err(BotError::InvalidData)?,
        language: language.as_deref().and_then(Language::from_code),
        username: row.try_get("username")?,
        phone_number: row.try_get("phone_number")?,
        full_name: row.try_get("full_name")?,
    })
}

fn conversation_from_row(row: &PgRow) -> Result<Conversation> {
    let platform: String = row.try_get("platform")?;
    let Json(messages): Json<Vec<ChatTurn>> = row.try_get("messages")?;
    Ok(Conversation {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        platform: platform.parse().map_err(BotError::InvalidData)?,
        messages,
    })
}

fn marketing_from_row(row: &PgRow) -> Result<MarketingMessage> {
    Ok(MarketingMessage {
        id: row.try_get("id")?,
        title_uz: row.try_get("title_uz")?,
        title_ru: row.try_get("title_ru")?,
        content_uz: row.try_get("content_uz")?,
        content_ru: row.try_get("content_ru")?,
        image_url: row.try_get("image_url")?,
        is_active: row.try_get("is_active")?,
        interval_days: row.try_get("interval_days")?,
        last_sent_at: row.try_get("last_sent_at")?,
    })
}

/// Escape LIKE wildcards so user text matches literally
fn like_pattern(query: &str) -> String {
    let escaped = query
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

#[async_trait]
impl Storage for PgStorage {
    async fn get_product(&self, id: i64) -> Result<Option<Product>> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(product_from_row).transpose()
    }

    async fn search_products(&self, query: &str, language: Language) -> Result<Vec<Product>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products
             WHERE is_active
               AND (name_uz ILIKE $1 OR name_ru ILIKE $1
                    OR (CASE WHEN $2 = 'ru' THEN description_ru ELSE description_uz END) ILIKE $1)
             ORDER BY CASE WHEN $2 = 'ru' THEN name_ru ELSE name_uz END"
        ))
        .bind(like_pattern(query))
        .bind(language.code())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(product_from_row).collect()
    }

    async fn list_products(&self, limit: usize) -> Result<Vec<Product>> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE is_active AND stock > 0 ORDER BY id LIMIT $1"
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(product_from_row).collect()
    }

    async fn create_order(&self, order: NewOrder) -> Result<Order> {
        let row = sqlx::query(&format!(
            "INSERT INTO orders (user_id, product_id, product_name, quantity, unit_price, total_price, order_status)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(order.user_id)
        .bind(order.product_id)
        .bind(&order.product_name)
        .bind(order.quantity)
        .bind(order.unit_price)
        .bind(order.total_price)
        .bind(OrderStatus::Pending.as_str())
        .fetch_one(&self.pool)
        .await?;
        order_from_row(&row)
    }

    async fn update_order(&self, id: i64, update: OrderUpdate) -> Result<Order> {
        let row = sqlx::query(&format!(
            "UPDATE orders SET
                customer_name = COALESCE($2, customer_name),
                customer_phone = COALESCE($3, customer_phone),
                customer_address = COALESCE($4, customer_address),
                payment_method = COALESCE($5, payment_method),
                order_status = COALESCE($6, order_status),
                updated_at = NOW()
             WHERE id = $1
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id)
        .bind(update.customer_name)
        .bind(update.customer_phone)
        .bind(update.customer_address)
        .bind(update.payment_method)
        .bind(update.status.map(OrderStatus::as_str))
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => order_from_row(&row),
            None => Err(BotError::not_found("Order", id)),
        }
    }

    async fn update_order_status(&self, id: i64, status: OrderStatus) -> Result<Order> {
        let row = sqlx::query(&format!(
            "UPDATE orders SET order_status = $2, updated_at = NOW()
             WHERE id = $1
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => order_from_row(&row),
            None => Err(BotError::not_found("Order", id)),
        }
    }

    async fn delete_order(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_orders_by_user(&self, user_id: i64) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at, id"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(order_from_row).collect()
    }

    async fn get_user_by_platform_id(
        &self,
        platform_id: &str,
        platform: Platform,
    ) -> Result<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE platform_id = $1 AND platform_type = $2"
        ))
        .bind(platform_id)
        .bind(platform.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn create_user(&self, user: NewUser) -> Result<User> {
        let row = sqlx::query(&format!(
            "INSERT INTO users (platform_id, platform_type, language_code, username, full_name)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.platform_id)
        .bind(user.platform_type.as_str())
        .bind(user.language.map(Language::code))
        .bind(&user.username)
        .bind(&user.full_name)
        .fetch_one(&self.pool)
        .await?;
        user_from_row(&row)
    }

    async fn update_user(&self, id: i64, update: UserUpdate) -> Result<User> {
        let row = sqlx::query(&format!(
            "UPDATE users SET
                language_code = COALESCE($2, language_code),
                phone_number = COALESCE($3, phone_number),
                full_name = COALESCE($4, full_name)
             WHERE id = $1
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(update.language.map(Language::code))
        .bind(update.phone_number)
        .bind(update.full_name)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => user_from_row(&row),
            None => Err(BotError::not_found("User", id)),
        }
    }

    async fn get_all_users(&self) -> Result<Vec<User>> {
        let rows = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(user_from_row).collect()
    }

    async fn get_conversation(
        &self,
        user_id: i64,
        platform: Platform,
    ) -> Result<Option<Conversation>> {
        let row = sqlx::query(
            "SELECT id, user_id, platform, messages FROM conversations
             WHERE user_id = $1 AND platform = $2
             ORDER BY id DESC LIMIT 1",
        )
        .bind(user_id)
        .bind(platform.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(conversation_from_row).transpose()
    }

    async fn create_conversation(
        &self,
        user_id: i64,
        platform: Platform,
        messages: Vec<ChatTurn>,
    ) -> Result<Conversation> {
        let row = sqlx::query(
            "INSERT INTO conversations (user_id, platform, messages)
             VALUES ($1, $2, $3)
             RETURNING id, user_id, platform, messages",
        )
        .bind(user_id)
        .bind(platform.as_str())
        .bind(Json(&messages))
        .fetch_one(&self.pool)
        .await?;
        conversation_from_row(&row)
    }

    async fn update_conversation_messages(&self, id: i64, messages: Vec<ChatTurn>) -> Result<()> {
        let result = sqlx::query(
            "UPDATE conversations SET messages = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(Json(&messages))
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(BotError::not_found("Conversation", id));
        }
        Ok(())
    }

    async fn get_bot_settings(&self) -> Result<Option<BotSettings>> {
        let row = sqlx::query(
            "SELECT contact_info, operator_phone, working_hours, company_address,
                    telegram_bot_username, rule_based_responses
             FROM bot_settings ORDER BY id LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let rules: Option<Json<std::collections::HashMap<Language, Vec<RuleEntry>>>> =
            row.try_get("rule_based_responses")?;

        Ok(Some(BotSettings {
            contact_info: row.try_get("contact_info")?,
            operator_phone: row.try_get("operator_phone")?,
            working_hours: row.try_get("working_hours")?,
            company_address: row.try_get("company_address")?,
            telegram_bot_username: row.try_get("telegram_bot_username")?,
            rule_based_responses: rules.map(|Json(rules)| rules).unwrap_or_default(),
        }))
    }

    async fn get_active_marketing_messages(&self) -> Result<Vec<MarketingMessage>> {
        let rows = sqlx::query(&format!(
            "SELECT {MARKETING_COLUMNS} FROM marketing_messages WHERE is_active ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(marketing_from_row).collect()
    }

    async fn get_marketing_message(&self, id: i64) -> Result<Option<MarketingMessage>> {
        let row = sqlx::query(&format!(
            "SELECT {MARKETING_COLUMNS} FROM marketing_messages WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(marketing_from_row).transpose()
    }

    async fn update_marketing_last_sent(&self, id: i64, sent_at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE marketing_messages SET last_sent_at = $2 WHERE id = $1")
            .bind(id)
            .bind(sent_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(" olma "), "%olma%");
        assert_eq!(like_pattern("100%_off"), "%100\\%\\_off%");
    }
}
