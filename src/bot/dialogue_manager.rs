//! Dialogue Manager module for the quantity and checkout flows
//!
//! The cart is the set of a user's `pending` orders. Adding to the cart
//! inserts a row; checkout moves every pending row to `processing` with the
//! customer's details attached.

use tracing::{debug, error, info, warn};

use crate::dialogue::{
    check_quantity, parse_checkout_fields, validate_quantity, PendingFlow, MAX_QUANTITY,
    MIN_QUANTITY,
};
use crate::error::Result;
use crate::localization::{t_args_lang, t_lang};
use crate::models::{NewOrder, Order, OrderStatus, OrderUpdate, UserUpdate};
use crate::storage::pending_orders;

use super::gateway::{BotGateway, UserContext};
use super::ui_builder::{
    after_add_keyboard, cart_keyboard, catalog_keyboard_short, format_cart, format_price,
    main_menu_keyboard, quantity_keyboard,
};

impl BotGateway {
    /// Ask how many units of a product to add; replaces any pending flow
    pub(super) async fn start_quantity_flow(&self, ctx: &UserContext, product_id: i64) -> Result<()> {
        let product = self
            .storage
            .get_product(product_id)
            .await?
            .filter(|product| product.is_active);

        let Some(product) = product else {
            self.sessions.clear_flow(ctx.sender_id).await?;
            return self
                .send(
                    ctx.chat_id,
                    &t_lang("product-not-found", ctx.language),
                    Some(catalog_keyboard_short(ctx.language)),
                )
                .await;
        };

        self.sessions
            .set_flow(ctx.sender_id, PendingFlow::AwaitingQuantity { product_id })
            .await?;
        debug!(user_id = ctx.sender_id, product_id, "Awaiting quantity");

        let prompt = t_args_lang(
            "quantity-prompt",
            &[
                ("name", product.name(ctx.language)),
                ("stock", &product.stock.to_string()),
            ],
            ctx.language,
        );
        self.send(ctx.chat_id, &prompt, Some(quantity_keyboard(&product, ctx.language)))
            .await
    }

    /// Typed quantity while a quantity flow is pending
    pub(super) async fn accept_quantity_text(
        &self,
        ctx: &UserContext,
        product_id: i64,
        text: &str,
    ) -> Result<()> {
        match validate_quantity(text) {
            Ok(quantity) => self.add_to_cart(ctx, product_id, quantity).await,
            Err(e) => {
                debug!(user_id = ctx.sender_id, error = %e, "Rejected quantity");
                self.send_quantity_invalid(ctx).await
            }
        }
    }

    /// Quick-pick quantity button
    pub(super) async fn accept_quantity_choice(
        &self,
        ctx: &UserContext,
        product_id: i64,
        quantity: i64,
    ) -> Result<()> {
        match check_quantity(quantity) {
            Ok(quantity) => self.add_to_cart(ctx, product_id, quantity).await,
            Err(e) => {
                debug!(user_id = ctx.sender_id, error = %e, "Rejected quantity button");
                self.send_quantity_invalid(ctx).await
            }
        }
    }

    async fn send_quantity_invalid(&self, ctx: &UserContext) -> Result<()> {
        let text = t_args_lang(
            "quantity-invalid",
            &[
                ("min", &MIN_QUANTITY.to_string()),
                ("max", &MAX_QUANTITY.to_string()),
            ],
            ctx.language,
        );
        self.send(ctx.chat_id, &text, None).await
    }

    /// Insert one pending order row for a validated quantity.
    ///
    /// Stock is shown in the prompt but not enforced.
    async fn add_to_cart(&self, ctx: &UserContext, product_id: i64, quantity: u32) -> Result<()> {
        let product = self
            .storage
            .get_product(product_id)
            .await?
            .filter(|product| product.is_active);

        let Some(product) = product else {
            self.sessions.clear_flow(ctx.sender_id).await?;
            return self
                .send(
                    ctx.chat_id,
                    &t_lang("product-not-found", ctx.language),
                    Some(catalog_keyboard_short(ctx.language)),
                )
                .await;
        };

        let order = self
            .storage
            .create_order(NewOrder::for_product(ctx.user.id, &product, ctx.language, quantity))
            .await?;
        self.sessions.clear_flow(ctx.sender_id).await?;
        info!(
            user_id = ctx.sender_id,
            order_id = order.id,
            product_id,
            quantity,
            "Added to cart"
        );

        let text = t_args_lang(
            "cart-added",
            &[
                ("name", &order.product_name),
                ("quantity", &order.quantity.to_string()),
                ("total", &format_price(order.total_price, ctx.language)),
            ],
            ctx.language,
        );
        self.send(ctx.chat_id, &text, Some(after_add_keyboard(ctx.language)))
            .await
    }

    pub(super) async fn show_cart(&self, ctx: &UserContext) -> Result<()> {
        let orders = pending_orders(self.storage.as_ref(), ctx.user.id).await?;
        if orders.is_empty() {
            return self
                .send(
                    ctx.chat_id,
                    &t_lang("cart-empty", ctx.language),
                    Some(catalog_keyboard_short(ctx.language)),
                )
                .await;
        }

        self.send(
            ctx.chat_id,
            &format_cart(&orders, ctx.language),
            Some(cart_keyboard(ctx.language)),
        )
        .await
    }

    /// Ask for customer details, unless the cart is empty
    pub(super) async fn start_checkout(&self, ctx: &UserContext) -> Result<()> {
        let orders = pending_orders(self.storage.as_ref(), ctx.user.id).await?;
        if orders.is_empty() {
            self.sessions.clear_flow(ctx.sender_id).await?;
            return self
                .send(
                    ctx.chat_id,
                    &t_lang("cart-empty", ctx.language),
                    Some(catalog_keyboard_short(ctx.language)),
                )
                .await;
        }

        self.sessions
            .set_flow(ctx.sender_id, PendingFlow::AwaitingCheckoutFields)
            .await?;
        debug!(user_id = ctx.sender_id, lines = orders.len(), "Awaiting checkout fields");
        self.send(ctx.chat_id, &t_lang("checkout-prompt", ctx.language), None)
            .await
    }

    /// Apply the submitted details to every pending row.
    ///
    /// Rows are updated one by one; a failed row stays pending and is
    /// left out of the confirmation.
    pub(super) async fn accept_checkout_fields(&self, ctx: &UserContext, text: &str) -> Result<()> {
        let fields = match parse_checkout_fields(text) {
            Ok(fields) => fields,
            Err(e) => {
                debug!(user_id = ctx.sender_id, error = %e, "Checkout details incomplete");
                return self
                    .send(ctx.chat_id, &t_lang("checkout-format-error", ctx.language), None)
                    .await;
            }
        };

        let orders = pending_orders(self.storage.as_ref(), ctx.user.id).await?;
        if orders.is_empty() {
            self.sessions.clear_flow(ctx.sender_id).await?;
            return self
                .send(
                    ctx.chat_id,
                    &t_lang("cart-empty", ctx.language),
                    Some(catalog_keyboard_short(ctx.language)),
                )
                .await;
        }

        let mut confirmed: Vec<Order> = Vec::with_capacity(orders.len());
        for order in &orders {
            let update = OrderUpdate {
                customer_name: Some(fields.name.clone()),
                customer_phone: Some(fields.phone.clone()),
                customer_address: Some(fields.address.clone()),
                payment_method: Some(fields.payment_method.clone()),
                status: Some(OrderStatus::Processing),
            };
            match self.storage.update_order(order.id, update).await {
                Ok(updated) => confirmed.push(updated),
                Err(e) => error!(
                    user_id = ctx.sender_id,
                    order_id = order.id,
                    error = %e,
                    "Failed to confirm cart line"
                ),
            }
        }

        if confirmed.is_empty() {
            // Nothing moved; keep the flow so the user can resend
            return self
                .send(ctx.chat_id, &t_lang("error-generic", ctx.language), None)
                .await;
        }

        if let Err(e) = self
            .storage
            .update_user(
                ctx.user.id,
                UserUpdate {
                    phone_number: Some(fields.phone.clone()),
                    full_name: Some(fields.name.clone()),
                    ..Default::default()
                },
            )
            .await
        {
            warn!(user_id = ctx.sender_id, error = %e, "Failed to save customer details");
        }

        self.sessions.clear_flow(ctx.sender_id).await?;

        let total: f64 = confirmed.iter().map(|order| order.total_price).sum();
        info!(
            user_id = ctx.sender_id,
            lines = confirmed.len(),
            failed = orders.len() - confirmed.len(),
            total,
            "Checkout completed"
        );

        let text = t_args_lang(
            "checkout-success",
            &[
                ("count", &confirmed.len().to_string()),
                ("total", &format_price(total, ctx.language)),
            ],
            ctx.language,
        );
        self.send(ctx.chat_id, &text, Some(main_menu_keyboard(ctx.language)))
            .await
    }

    /// Delete every pending row; failures are logged and skipped
    pub(super) async fn clear_cart(&self, ctx: &UserContext) -> Result<()> {
        let orders = pending_orders(self.storage.as_ref(), ctx.user.id).await?;
        for order in &orders {
            if let Err(e) = self.storage.delete_order(order.id).await {
                error!(user_id = ctx.sender_id, order_id = order.id, error = %e, "Failed to delete cart line");
            }
        }
        info!(user_id = ctx.sender_id, lines = orders.len(), "Cart cleared");

        self.send(
            ctx.chat_id,
            &t_lang("cart-cleared", ctx.language),
            Some(catalog_keyboard_short(ctx.language)),
        )
        .await
    }
}
