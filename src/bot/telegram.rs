//! Telegram transport: command set, outbound adapter and the dispatcher
//! that turns teloxide updates into [`InboundUpdate`]s.

use async_trait::async_trait;
use std::sync::Arc;
use teloxide::dispatching::HandlerExt;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, InputFile};
use teloxide::utils::command::BotCommands;
use tracing::{debug, info, warn};

use crate::channel::{Keyboard, OutboundChannel};
use crate::error::{BotError, Result};

use super::gateway::{BotGateway, InboundUpdate, Sender, UpdateKind};

#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "start the bot")]
    Start,
    #[command(description = "show help")]
    Help,
    #[command(description = "browse the catalog")]
    Catalog,
    #[command(description = "show your cart")]
    Cart,
    #[command(description = "change language")]
    Language,
    #[command(description = "contact information")]
    Contact,
}

/// [`OutboundChannel`] backed by the Telegram Bot API
#[derive(Clone)]
pub struct TelegramChannel {
    bot: Bot,
}

impl TelegramChannel {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

fn inline_keyboard(keyboard: &Keyboard) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(keyboard.rows.iter().map(|row| {
        row.iter()
            .map(|button| InlineKeyboardButton::callback(button.label.clone(), button.action.to_string()))
            .collect::<Vec<_>>()
    }))
}

#[async_trait]
impl OutboundChannel for TelegramChannel {
    async fn send_message(&self, chat_id: i64, text: &str, keyboard: Option<&Keyboard>) -> Result<()> {
        let request = self.bot.send_message(ChatId(chat_id), text);
        match keyboard {
            Some(keyboard) => request.reply_markup(inline_keyboard(keyboard)).await?,
            None => request.await?,
        };
        Ok(())
    }

    async fn send_photo(
        &self,
        chat_id: i64,
        photo_url: &str,
        caption: Option<&str>,
        keyboard: Option<&Keyboard>,
    ) -> Result<()> {
        let url = reqwest::Url::parse(photo_url)
            .map_err(|e| BotError::InvalidData(format!("invalid photo URL {photo_url}: {e}")))?;

        let mut request = self.bot.send_photo(ChatId(chat_id), InputFile::url(url));
        if let Some(caption) = caption {
            request = request.caption(caption);
        }
        if let Some(keyboard) = keyboard {
            request = request.reply_markup(inline_keyboard(keyboard));
        }
        request.await?;
        Ok(())
    }
}

fn sender_from(user: &teloxide::types::User) -> Sender {
    Sender {
        id: user.id.0 as i64,
        first_name: user.first_name.clone(),
        username: user.username.clone(),
        language_code: user.language_code.clone(),
    }
}

async fn on_command(gateway: Arc<BotGateway>, msg: Message, command: Command) -> ResponseResult<()> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    gateway
        .handle_update(InboundUpdate {
            chat_id: msg.chat.id.0,
            sender: sender_from(user),
            kind: UpdateKind::Command(command),
        })
        .await;
    Ok(())
}

async fn on_message(gateway: Arc<BotGateway>, msg: Message) -> ResponseResult<()> {
    let Some(user) = msg.from.as_ref() else {
        debug!(chat_id = %msg.chat.id, "Ignoring message without sender");
        return Ok(());
    };
    let kind = match msg.text() {
        Some(text) => UpdateKind::Text(text.to_string()),
        None => UpdateKind::Unsupported,
    };
    gateway
        .handle_update(InboundUpdate {
            chat_id: msg.chat.id.0,
            sender: sender_from(user),
            kind,
        })
        .await;
    Ok(())
}

async fn on_callback(bot: Bot, gateway: Arc<BotGateway>, q: CallbackQuery) -> ResponseResult<()> {
    // Stop the client spinner before doing any work
    if let Err(e) = bot.answer_callback_query(q.id.clone()).await {
        warn!(user_id = %q.from.id, error = %e, "Failed to answer callback query");
    }

    let Some(data) = q.data.clone() else {
        return Ok(());
    };
    let chat_id = q
        .message
        .as_ref()
        .map_or(q.from.id.0 as i64, |message| message.chat().id.0);

    gateway
        .handle_update(InboundUpdate {
            chat_id,
            sender: sender_from(&q.from),
            kind: UpdateKind::Callback { data },
        })
        .await;
    Ok(())
}

/// Serve updates until Ctrl-C. Updates from one chat are handled in order.
pub async fn run_dispatcher(bot: Bot, gateway: Arc<BotGateway>) {
    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!(error = %e, "Failed to register bot commands");
    }

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .branch(dptree::entry().filter_command::<Command>().endpoint(on_command))
                .branch(dptree::endpoint(on_message)),
        )
        .branch(Update::filter_callback_query().endpoint(on_callback));

    info!("Starting Telegram dispatcher");
    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![gateway])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::CallbackAction;
    use crate::channel::Button;

    #[test]
    fn test_commands_parse_lowercase() {
        assert_eq!(Command::parse("/start", "savdo_bot").unwrap(), Command::Start);
        assert_eq!(Command::parse("/catalog", "savdo_bot").unwrap(), Command::Catalog);
        assert!(Command::parse("/unknown", "savdo_bot").is_err());
    }

    #[test]
    fn test_inline_keyboard_carries_action_payloads() {
        let keyboard = Keyboard::new(vec![vec![
            Button::new("Cart", CallbackAction::Cart),
            Button::new("Add", CallbackAction::AddToCart { product_id: 7 }),
        ]]);
        let markup = inline_keyboard(&keyboard);
        let json = serde_json::to_value(&markup).unwrap();
        assert_eq!(json["inline_keyboard"][0][0]["callback_data"], "cart");
        assert_eq!(json["inline_keyboard"][0][1]["callback_data"], "add_to_cart_7");
    }
}
