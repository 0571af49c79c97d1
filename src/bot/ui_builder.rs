//! UI Builder module for creating keyboards and formatting messages

use crate::actions::CallbackAction;
use crate::channel::{Button, Keyboard};
use crate::dialogue::QUICK_QUANTITIES;
use crate::localization::{t_args_lang, t_lang};
use crate::models::{BotSettings, Language, Order, Product};

/// Catalog screens list at most this many products
pub const CATALOG_PAGE_SIZE: usize = 20;

/// Product inquiries show at most this many matches
pub const SEARCH_RESULT_LIMIT: usize = 3;

/// Price with space-grouped thousands and the local currency name
pub fn format_price(amount: f64, language: Language) -> String {
    let rounded = (amount * 100.0).round() / 100.0;
    let whole = rounded.trunc() as i64;
    let cents = ((rounded.fract()).abs() * 100.0).round() as i64;

    let digits = whole.abs().to_string();
    let mut grouped = String::new();
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(ch);
    }
    if whole < 0 {
        grouped.insert(0, '-');
    }
    if cents > 0 {
        grouped.push_str(&format!(".{cents:02}"));
    }

    format!("{grouped} {}", t_lang("currency", language))
}

pub fn language_keyboard() -> Keyboard {
    Keyboard::new(vec![vec![
        Button::new("🇺🇿 O'zbekcha", CallbackAction::SetLanguage(Language::Uz)),
        Button::new("🇷🇺 Русский", CallbackAction::SetLanguage(Language::Ru)),
    ]])
}

pub fn main_menu_keyboard(language: Language) -> Keyboard {
    Keyboard::new(vec![
        vec![
            Button::new(t_lang("btn-catalog", language), CallbackAction::Catalog),
            Button::new(t_lang("btn-cart", language), CallbackAction::Cart),
        ],
        vec![
            Button::new(t_lang("btn-contact", language), CallbackAction::Contact),
            Button::new(t_lang("btn-operator", language), CallbackAction::Operator),
        ],
    ])
}

fn main_menu_row(language: Language) -> Vec<Button> {
    vec![Button::new(t_lang("btn-main-menu", language), CallbackAction::MainMenu)]
}

/// Catalog shortcut, shown with empty-cart style dead ends
pub fn catalog_keyboard_short(language: Language) -> Keyboard {
    Keyboard::new(vec![
        vec![Button::new(t_lang("btn-catalog", language), CallbackAction::Catalog)],
        main_menu_row(language),
    ])
}

/// One button per product, two per row
pub fn catalog_keyboard(products: &[Product], language: Language) -> Keyboard {
    let mut rows: Vec<Vec<Button>> = products
        .chunks(2)
        .map(|chunk| {
            chunk
                .iter()
                .map(|product| {
                    Button::new(
                        product.name(language),
                        CallbackAction::Product {
                            product_id: product.id,
                        },
                    )
                })
                .collect()
        })
        .collect();
    rows.push(vec![Button::new(t_lang("btn-cart", language), CallbackAction::Cart)]);
    rows.push(main_menu_row(language));
    Keyboard::new(rows)
}

pub fn format_product_card(product: &Product, language: Language) -> String {
    let mut card = t_args_lang(
        "product-card",
        &[
            ("name", product.name(language)),
            ("price", &format_price(product.price, language)),
            ("stock", &product.stock.to_string()),
        ],
        language,
    );
    if let Some(description) = product.description(language).filter(|d| !d.trim().is_empty()) {
        card.push_str("\n\n");
        card.push_str(description);
    }
    card
}

pub fn product_keyboard(product: &Product, language: Language) -> Keyboard {
    let mut rows = Vec::new();
    if product.stock > 0 {
        rows.push(vec![Button::new(
            t_lang("btn-add-to-cart", language),
            CallbackAction::AddToCart {
                product_id: product.id,
            },
        )]);
    }
    rows.push(vec![Button::new(
        t_lang("btn-back-to-catalog", language),
        CallbackAction::Catalog,
    )]);
    rows.push(main_menu_row(language));
    Keyboard::new(rows)
}

pub fn quantity_keyboard(product: &Product, language: Language) -> Keyboard {
    let buttons: Vec<Button> = QUICK_QUANTITIES
        .iter()
        .copied()
        .map(|quantity| {
            Button::new(
                quantity.to_string(),
                CallbackAction::Quantity {
                    product_id: product.id,
                    quantity: i64::from(quantity),
                },
            )
        })
        .collect();

    let mut rows: Vec<Vec<Button>> = buttons.chunks(3).map(<[Button]>::to_vec).collect();
    rows.push(vec![Button::new(
        t_lang("btn-back-to-catalog", language),
        CallbackAction::Catalog,
    )]);
    Keyboard::new(rows)
}

pub fn after_add_keyboard(language: Language) -> Keyboard {
    Keyboard::new(vec![
        vec![
            Button::new(t_lang("btn-cart", language), CallbackAction::Cart),
            Button::new(t_lang("btn-confirm-order", language), CallbackAction::ConfirmOrder),
        ],
        vec![Button::new(
            t_lang("btn-continue-shopping", language),
            CallbackAction::ContinueShopping,
        )],
    ])
}

/// Numbered cart lines followed by the aggregate total
pub fn format_cart(orders: &[Order], language: Language) -> String {
    let mut text = t_lang("cart-title", language);
    text.push('\n');
    for (i, order) in orders.iter().enumerate() {
        text.push('\n');
        text.push_str(&t_args_lang(
            "cart-line",
            &[
                ("index", &(i + 1).to_string()),
                ("name", &order.product_name),
                ("quantity", &order.quantity.to_string()),
                ("total", &format_price(order.total_price, language)),
            ],
            language,
        ));
    }
    let total: f64 = orders.iter().map(|order| order.total_price).sum();
    text.push_str("\n\n");
    text.push_str(&t_args_lang(
        "cart-total",
        &[("total", &format_price(total, language))],
        language,
    ));
    text
}

pub fn cart_keyboard(language: Language) -> Keyboard {
    Keyboard::new(vec![
        vec![Button::new(t_lang("btn-checkout", language), CallbackAction::Checkout)],
        vec![Button::new(t_lang("btn-clear-cart", language), CallbackAction::ClearCart)],
        vec![Button::new(
            t_lang("btn-continue-shopping", language),
            CallbackAction::ContinueShopping,
        )],
    ])
}

/// Product inquiry matches, each with its own order button
pub fn format_search_results(products: &[Product], language: Language) -> String {
    let mut text = t_lang("search-results-title", language);
    for product in products {
        text.push_str("\n\n");
        text.push_str(&t_args_lang(
            "search-result-line",
            &[
                ("name", product.name(language)),
                ("price", &format_price(product.price, language)),
                ("stock", &product.stock.to_string()),
            ],
            language,
        ));
    }
    text
}

pub fn search_results_keyboard(products: &[Product], language: Language) -> Keyboard {
    let mut rows: Vec<Vec<Button>> = products
        .iter()
        .map(|product| {
            vec![Button::new(
                format!("{} {}", t_lang("btn-order", language), product.name(language)),
                CallbackAction::AddToCart {
                    product_id: product.id,
                },
            )]
        })
        .collect();
    rows.push(main_menu_row(language));
    Keyboard::new(rows)
}

pub fn order_request_keyboard(language: Language) -> Keyboard {
    Keyboard::new(vec![vec![
        Button::new(t_lang("btn-catalog", language), CallbackAction::Catalog),
        Button::new(t_lang("btn-operator", language), CallbackAction::Operator),
    ]])
}

fn or_not_set(value: Option<&str>, language: Language) -> String {
    match value.map(str::trim) {
        Some(value) if !value.is_empty() => value.to_string(),
        _ => t_lang("not-set", language),
    }
}

pub fn format_contact(settings: &BotSettings, language: Language) -> String {
    t_args_lang(
        "contact-info",
        &[
            ("contact", &or_not_set(settings.contact_info.as_deref(), language)),
            ("hours", &or_not_set(settings.working_hours.as_deref(), language)),
            ("address", &or_not_set(settings.company_address.as_deref(), language)),
        ],
        language,
    )
}

pub fn format_operator(settings: &BotSettings, language: Language) -> String {
    let username = settings
        .telegram_bot_username
        .as_deref()
        .map(|name| format!("@{}", name.trim_start_matches('@')));
    t_args_lang(
        "operator-info",
        &[
            ("phone", &or_not_set(settings.operator_phone.as_deref(), language)),
            ("username", &or_not_set(username.as_deref(), language)),
        ],
        language,
    )
}

pub fn back_to_menu_keyboard(language: Language) -> Keyboard {
    Keyboard::new(vec![main_menu_row(language)])
}
