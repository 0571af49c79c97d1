use anyhow::{Context, Result};
use std::sync::Arc;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::prelude::*;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use savdo_bot::ai::{GenerativeBackend, GuardedBackend, IntentClassifier, ResponseGenerator};
use savdo_bot::bot::{run_dispatcher, BotGateway, TelegramChannel};
use savdo_bot::channel::OutboundChannel;
use savdo_bot::config::BotConfig;
use savdo_bot::dialogue::{ConversationSession, SessionStore};
use savdo_bot::gemini::GeminiClient;
use savdo_bot::marketing::MarketingScheduler;
use savdo_bot::storage::{postgres::init_database_schema, PgStorage, Storage};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file before reading RUST_LOG
    dotenv::dotenv().ok();
    init_tracing();

    info!("Starting Savdo Telegram Bot");

    let config = BotConfig::from_env().context("Failed to load configuration")?;

    info!(max_connections = config.max_db_connections, "Connecting to database");
    let storage = PgStorage::connect(&config.database_url, config.max_db_connections)
        .await
        .context("Failed to connect to database")?;
    init_database_schema(storage.pool())
        .await
        .context("Failed to initialize database schema")?;
    let storage: Arc<dyn Storage> = Arc::new(storage);

    let bot = Bot::new(&config.telegram_token);
    let channel: Arc<dyn OutboundChannel> = Arc::new(TelegramChannel::new(bot.clone()));

    let backend: Option<Arc<dyn GenerativeBackend>> = match &config.ai.api_key {
        Some(api_key) => {
            let client: Arc<dyn GenerativeBackend> = Arc::new(
                GeminiClient::new(api_key.clone(), &config.ai)
                    .context("Failed to build Gemini client")?,
            );
            info!(model = %config.ai.model, "Gemini backend enabled");
            Some(client)
        }
        None => {
            warn!("GEMINI_API_KEY not set, AI answers fall back to apologies");
            None
        }
    };
    let guarded = GuardedBackend::new(backend, &config.ai.recovery);
    let classifier = IntentClassifier::new(guarded.clone());
    let responder = ResponseGenerator::new(guarded).with_history_limit(config.ai.history_limit);

    let gateway = Arc::new(BotGateway::new(
        Arc::clone(&storage),
        Arc::clone(&channel),
        SessionStore::with_storage(InMemStorage::<ConversationSession>::new()),
        classifier,
        responder,
    ));

    if config.scheduler.enabled {
        let scheduler = Arc::new(MarketingScheduler::new(
            storage,
            channel,
            config.scheduler.clone(),
        ));
        let _scheduler = scheduler.spawn();
    } else {
        info!("Marketing scheduler disabled");
    }

    run_dispatcher(bot, gateway).await;

    info!("Bot stopped");
    Ok(())
}
