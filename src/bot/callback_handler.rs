//! Callback Handler module for inline keyboard button presses

use tracing::{debug, info, warn};

use crate::actions::CallbackAction;
use crate::error::Result;
use crate::localization::t_lang;
use crate::models::{Language, UserUpdate};

use super::gateway::{BotGateway, UserContext};
use super::ui_builder::{
    back_to_menu_keyboard, catalog_keyboard, catalog_keyboard_short, format_contact,
    format_operator, format_product_card, main_menu_keyboard, product_keyboard,
    CATALOG_PAGE_SIZE,
};

impl BotGateway {
    /// Parse the button payload and run its action
    pub(super) async fn handle_callback(&self, ctx: &UserContext, data: &str) -> Result<()> {
        let action: CallbackAction = match data.parse() {
            Ok(action) => action,
            Err(e) => {
                warn!(user_id = ctx.sender_id, error = %e, "Unrecognized callback data");
                return self
                    .send(
                        ctx.chat_id,
                        &t_lang("unknown-action", ctx.language),
                        Some(main_menu_keyboard(ctx.language)),
                    )
                    .await;
            }
        };
        debug!(user_id = ctx.sender_id, action = %action, "Handling callback");

        match action {
            CallbackAction::SetLanguage(language) => self.set_language(ctx, language).await,
            CallbackAction::Catalog | CallbackAction::ContinueShopping => {
                self.show_catalog(ctx).await
            }
            CallbackAction::Cart => self.show_cart(ctx).await,
            CallbackAction::Product { product_id } => self.show_product(ctx, product_id).await,
            CallbackAction::AddToCart { product_id } => {
                self.start_quantity_flow(ctx, product_id).await
            }
            CallbackAction::Quantity {
                product_id,
                quantity,
            } => self.accept_quantity_choice(ctx, product_id, quantity).await,
            CallbackAction::Checkout | CallbackAction::ConfirmOrder => {
                self.start_checkout(ctx).await
            }
            CallbackAction::ClearCart => self.clear_cart(ctx).await,
            CallbackAction::Contact => self.show_contact(ctx).await,
            CallbackAction::Operator => self.show_operator(ctx).await,
            CallbackAction::MainMenu => {
                self.send(
                    ctx.chat_id,
                    &t_lang("main-menu-title", ctx.language),
                    Some(main_menu_keyboard(ctx.language)),
                )
                .await
            }
        }
    }

    /// Persist the choice, then greet in the new language
    async fn set_language(&self, ctx: &UserContext, language: Language) -> Result<()> {
        self.storage
            .update_user(
                ctx.user.id,
                UserUpdate {
                    language: Some(language),
                    ..Default::default()
                },
            )
            .await?;
        self.sessions.set_language(ctx.sender_id, language).await?;
        info!(user_id = ctx.sender_id, language = language.code(), "Language updated");

        let ctx = UserContext {
            language,
            ..ctx.clone()
        };
        self.send(ctx.chat_id, &t_lang("language-set", language), None)
            .await?;
        self.send_welcome(&ctx).await
    }

    pub(super) async fn show_catalog(&self, ctx: &UserContext) -> Result<()> {
        let products = self.storage.list_products(CATALOG_PAGE_SIZE).await?;
        if products.is_empty() {
            return self
                .send(
                    ctx.chat_id,
                    &t_lang("catalog-empty", ctx.language),
                    Some(back_to_menu_keyboard(ctx.language)),
                )
                .await;
        }

        self.send(
            ctx.chat_id,
            &t_lang("catalog-title", ctx.language),
            Some(catalog_keyboard(&products, ctx.language)),
        )
        .await
    }

    async fn show_product(&self, ctx: &UserContext, product_id: i64) -> Result<()> {
        let Some(product) = self
            .storage
            .get_product(product_id)
            .await?
            .filter(|product| product.is_active)
        else {
            return self
                .send(
                    ctx.chat_id,
                    &t_lang("product-not-found", ctx.language),
                    Some(catalog_keyboard_short(ctx.language)),
                )
                .await;
        };

        let card = format_product_card(&product, ctx.language);
        let keyboard = product_keyboard(&product, ctx.language);
        match product.image_url.as_deref().filter(|url| !url.trim().is_empty()) {
            Some(url) => {
                self.send_photo_or_text(ctx.chat_id, url, &card, Some(keyboard))
                    .await
            }
            None => self.send(ctx.chat_id, &card, Some(keyboard)).await,
        }
    }

    pub(super) async fn show_contact(&self, ctx: &UserContext) -> Result<()> {
        let settings = self.bot_settings().await;
        self.send(
            ctx.chat_id,
            &format_contact(&settings, ctx.language),
            Some(back_to_menu_keyboard(ctx.language)),
        )
        .await
    }

    async fn show_operator(&self, ctx: &UserContext) -> Result<()> {
        let settings = self.bot_settings().await;
        self.send(
            ctx.chat_id,
            &format_operator(&settings, ctx.language),
            Some(back_to_menu_keyboard(ctx.language)),
        )
        .await
    }
}
