//! Message Handler module for commands and free-text messages

use tracing::{debug, info, warn};

use crate::ai::{Intent, IntentResult, ReplyContext};
use crate::dialogue::PendingFlow;
use crate::error::Result;
use crate::localization::{t_args_lang, t_lang};
use crate::models::{ChatTurn, Platform, Product};
use crate::rules::RuleResponseTable;

use super::gateway::{BotGateway, UserContext};
use super::telegram::Command;
use super::ui_builder::{
    back_to_menu_keyboard, format_search_results, language_keyboard, main_menu_keyboard,
    order_request_keyboard, search_results_keyboard, SEARCH_RESULT_LIMIT,
};

/// Stored conversation turns per user; older turns are dropped
pub const MAX_STORED_TURNS: usize = 50;

/// Catalog rows handed to the reply generator as grounding
const AI_PRODUCT_CONTEXT: usize = 5;

impl BotGateway {
    pub(super) async fn handle_command(&self, ctx: &UserContext, command: Command) -> Result<()> {
        info!(user_id = ctx.sender_id, command = ?command, "Handling command");

        match command {
            Command::Start => {
                // A fresh /start abandons whatever flow was pending
                self.sessions.clear_flow(ctx.sender_id).await?;
                if ctx.user.language.is_none() {
                    self.show_language_choice(ctx).await
                } else {
                    self.send_welcome(ctx).await
                }
            }
            Command::Help => {
                self.send(
                    ctx.chat_id,
                    &t_lang("help", ctx.language),
                    Some(main_menu_keyboard(ctx.language)),
                )
                .await
            }
            Command::Catalog => self.show_catalog(ctx).await,
            Command::Cart => self.show_cart(ctx).await,
            Command::Language => self.show_language_choice(ctx).await,
            Command::Contact => self.show_contact(ctx).await,
        }
    }

    pub(super) async fn send_welcome(&self, ctx: &UserContext) -> Result<()> {
        let welcome = t_args_lang("welcome", &[("name", &ctx.sender_name)], ctx.language);
        let text = format!("{welcome}\n\n{}", t_lang("main-menu-title", ctx.language));
        self.send(ctx.chat_id, &text, Some(main_menu_keyboard(ctx.language)))
            .await
    }

    pub(super) async fn show_language_choice(&self, ctx: &UserContext) -> Result<()> {
        self.send(
            ctx.chat_id,
            &t_lang("choose-language", ctx.language),
            Some(language_keyboard()),
        )
        .await
    }

    /// Free text: a pending flow wins, then the rule table, then the
    /// classified intent
    pub(super) async fn handle_text(&self, ctx: &UserContext, text: &str) -> Result<()> {
        let session = self.sessions.get_or_create(ctx.sender_id, ctx.language).await?;

        match session.pending_flow {
            PendingFlow::AwaitingCheckoutFields => {
                return self.accept_checkout_fields(ctx, text).await;
            }
            PendingFlow::AwaitingQuantity { product_id } => {
                return self.accept_quantity_text(ctx, product_id, text).await;
            }
            PendingFlow::None => {}
        }

        let settings = self.bot_settings().await;
        let rules = RuleResponseTable::for_language(&settings, ctx.language);
        if let Some(response) = rules.lookup(text) {
            debug!(user_id = ctx.sender_id, "Answered from rule table");
            return self
                .send(ctx.chat_id, response, Some(back_to_menu_keyboard(ctx.language)))
                .await;
        }

        let classified = self.classifier.classify(text, ctx.language).await;
        info!(
            user_id = ctx.sender_id,
            intent = %classified.intent,
            confidence = classified.confidence,
            "Routing by intent"
        );

        match classified.intent {
            Intent::ProductInquiry => self.answer_product_inquiry(ctx, text, &classified).await,
            Intent::OrderRequest => {
                self.send(
                    ctx.chat_id,
                    &t_lang("order-request-reply", ctx.language),
                    Some(order_request_keyboard(ctx.language)),
                )
                .await
            }
            Intent::GeneralQuestion | Intent::Complaint | Intent::Greeting => {
                self.ai_reply(ctx, text).await
            }
        }
    }

    async fn answer_product_inquiry(
        &self,
        ctx: &UserContext,
        text: &str,
        classified: &IntentResult,
    ) -> Result<()> {
        let query = classified
            .entities
            .as_ref()
            .and_then(|entities| entities.product_name.as_deref())
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(text);

        let mut products = self.storage.search_products(query, ctx.language).await?;
        if products.is_empty() {
            debug!(user_id = ctx.sender_id, query, "No products matched, asking the assistant");
            return self.ai_reply(ctx, text).await;
        }
        products.truncate(SEARCH_RESULT_LIMIT);

        self.send(
            ctx.chat_id,
            &format_search_results(&products, ctx.language),
            Some(search_results_keyboard(&products, ctx.language)),
        )
        .await
    }

    /// Generated reply grounded on history and matching products; both
    /// turns are appended to the stored conversation
    async fn ai_reply(&self, ctx: &UserContext, text: &str) -> Result<()> {
        let conversation = match self
            .storage
            .get_conversation(ctx.user.id, Platform::Telegram)
            .await
        {
            Ok(conversation) => conversation,
            Err(e) => {
                warn!(user_id = ctx.sender_id, error = %e, "Failed to load conversation history");
                None
            }
        };
        let history: &[ChatTurn] = conversation
            .as_ref()
            .map_or(&[][..], |conversation| conversation.messages.as_slice());

        let products: Vec<Product> = match self.storage.search_products(text, ctx.language).await {
            Ok(mut products) => {
                products.truncate(AI_PRODUCT_CONTEXT);
                products
            }
            Err(e) => {
                warn!(error = %e, "Product context lookup failed");
                Vec::new()
            }
        };

        let reply = self
            .responder
            .generate_reply(
                text,
                ReplyContext {
                    language: ctx.language,
                    history,
                    products: &products,
                },
            )
            .await;

        let mut messages = history.to_vec();
        messages.push(ChatTurn::user(text));
        messages.push(ChatTurn::assistant(reply.clone()));
        if messages.len() > MAX_STORED_TURNS {
            messages.drain(..messages.len() - MAX_STORED_TURNS);
        }

        let saved = match &conversation {
            Some(conversation) => {
                self.storage
                    .update_conversation_messages(conversation.id, messages)
                    .await
            }
            None => self
                .storage
                .create_conversation(ctx.user.id, Platform::Telegram, messages)
                .await
                .map(|_| ()),
        };
        if let Err(e) = saved {
            warn!(user_id = ctx.sender_id, error = %e, "Failed to save conversation history");
        }

        self.send(ctx.chat_id, &reply, Some(back_to_menu_keyboard(ctx.language)))
            .await
    }

    pub(super) async fn handle_unsupported(&self, ctx: &UserContext) -> Result<()> {
        debug!(user_id = ctx.sender_id, "Unsupported message type");
        self.send(
            ctx.chat_id,
            &t_lang("help", ctx.language),
            Some(main_menu_keyboard(ctx.language)),
        )
        .await
    }
}
