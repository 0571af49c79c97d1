//! Callback button actions.
//!
//! Button payloads are parsed once at the edge into [`CallbackAction`] and
//! matched exhaustively by the callback handler. Every action is reachable
//! from any screen.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::models::Language;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    SetLanguage(Language),
    Catalog,
    Cart,
    AddToCart { product_id: i64 },
    Quantity { product_id: i64, quantity: i64 },
    Checkout,
    ConfirmOrder,
    ClearCart,
    Contact,
    Operator,
    Product { product_id: i64 },
    ContinueShopping,
    MainMenu,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown callback action: {0}")]
pub struct UnknownAction(pub String);

impl FromStr for CallbackAction {
    type Err = UnknownAction;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let unknown = || UnknownAction(data.to_string());

        let action = match data {
            "catalog" => CallbackAction::Catalog,
            "cart" => CallbackAction::Cart,
            "checkout" => CallbackAction::Checkout,
            "confirm_order" => CallbackAction::ConfirmOrder,
            "clear_cart" => CallbackAction::ClearCart,
            "contact" => CallbackAction::Contact,
            "operator" => CallbackAction::Operator,
            "continue_shopping" => CallbackAction::ContinueShopping,
            "main_menu" => CallbackAction::MainMenu,
            _ => {
                if let Some(code) = data.strip_prefix("lang_") {
                    CallbackAction::SetLanguage(Language::from_code(code).ok_or_else(unknown)?)
                } else if let Some(id) = data.strip_prefix("add_to_cart_") {
                    CallbackAction::AddToCart {
                        product_id: id.parse().map_err(|_| unknown())?,
                    }
                } else if let Some(rest) = data.strip_prefix("quantity_") {
                    // quantity_<productId>_<n>
                    let (id, quantity) = rest.split_once('_').ok_or_else(unknown)?;
                    CallbackAction::Quantity {
                        product_id: id.parse().map_err(|_| unknown())?,
                        quantity: quantity.parse().map_err(|_| unknown())?,
                    }
                } else if let Some(id) = data.strip_prefix("product_") {
                    CallbackAction::Product {
                        product_id: id.parse().map_err(|_| unknown())?,
                    }
                } else {
                    return Err(unknown());
                }
            }
        };

        Ok(action)
    }
}

impl fmt::Display for CallbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackAction::SetLanguage(language) => write!(f, "lang_{}", language.code()),
            CallbackAction::Catalog => f.write_str("catalog"),
            CallbackAction::Cart => f.write_str("cart"),
            CallbackAction::AddToCart { product_id } => write!(f, "add_to_cart_{product_id}"),
            CallbackAction::Quantity {
                product_id,
                quantity,
            } => write!(f, "quantity_{product_id}_{quantity}"),
            CallbackAction::Checkout => f.write_str("checkout"),
            CallbackAction::ConfirmOrder => f.write_str("confirm_order"),
            CallbackAction::ClearCart => f.write_str("clear_cart"),
            CallbackAction::Contact => f.write_str("contact"),
            CallbackAction::Operator => f.write_str("operator"),
            CallbackAction::Product { product_id } => write!(f, "product_{product_id}"),
            CallbackAction::ContinueShopping => f.write_str("continue_shopping"),
            CallbackAction::MainMenu => f.write_str("main_menu"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_actions() {
        assert_eq!("catalog".parse(), Ok(CallbackAction::Catalog));
        assert_eq!("clear_cart".parse(), Ok(CallbackAction::ClearCart));
        assert_eq!("main_menu".parse(), Ok(CallbackAction::MainMenu));
        assert_eq!(
            "lang_ru".parse(),
            Ok(CallbackAction::SetLanguage(Language::Ru))
        );
    }

    #[test]
    fn test_parse_parameterized_actions() {
        assert_eq!(
            "add_to_cart_42".parse(),
            Ok(CallbackAction::AddToCart { product_id: 42 })
        );
        assert_eq!(
            "quantity_42_500".parse(),
            Ok(CallbackAction::Quantity {
                product_id: 42,
                quantity: 500
            })
        );
        assert_eq!(
            "product_9".parse(),
            Ok(CallbackAction::Product { product_id: 9 })
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for data in ["", "lang_en", "add_to_cart_x", "quantity_5", "quantity_a_1", "checkout_now"] {
            assert!(
                data.parse::<CallbackAction>().is_err(),
                "{data:?} should not parse"
            );
        }
    }

    #[test]
    fn test_unknown_action_message() {
        let err = "lang_en".parse::<CallbackAction>().unwrap_err();
        assert_eq!(err, UnknownAction("lang_en".to_string()));
        assert_eq!(err.to_string(), "unknown callback action: lang_en");
    }

    #[test]
    fn test_display_matches_wire_format() {
        let action = CallbackAction::Quantity {
            product_id: 3,
            quantity: 50,
        };
        assert_eq!(action.to_string(), "quantity_3_50");
        assert_eq!(action.to_string().parse(), Ok(action));
    }
}
