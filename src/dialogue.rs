//! Conversation session state: which multi-step flow, if any, owns the
//! next text message from a user.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use teloxide::dispatching::dialogue::{Dialogue, InMemStorage};
use teloxide::types::ChatId;
use thiserror::Error;

use crate::error;
use crate::models::Language;

pub const MIN_QUANTITY: u32 = 1;
pub const MAX_QUANTITY: u32 = 10_000;

/// Quick-pick quantities offered as buttons
pub const QUICK_QUANTITIES: [u32; 6] = [1, 5, 10, 50, 100, 500];

/// Number of newline-separated checkout fields
pub const CHECKOUT_FIELD_COUNT: usize = 4;

/// A multi-step interaction waiting for the user's next message
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PendingFlow {
    #[default]
    None,
    AwaitingQuantity {
        product_id: i64,
    },
    AwaitingCheckoutFields,
}

/// Ephemeral per-user state, keyed by platform user id
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSession {
    pub pending_flow: PendingFlow,
    /// Cached from the persisted user record
    pub language: Language,
}

impl ConversationSession {
    pub fn new(language: Language) -> Self {
        Self {
            pending_flow: PendingFlow::None,
            language,
        }
    }
}

/// Teloxide dialogue handle for one user's session
pub type SessionDialogue = Dialogue<ConversationSession, InMemStorage<ConversationSession>>;

/// Session table owned by the gateway, backed by teloxide's dialogue storage.
///
/// Sessions are keyed by platform user id and live until process restart.
/// A handler's read-modify-write spans awaits on storage and the network,
/// so two concurrent updates from the same user can interleave.
#[derive(Clone)]
pub struct SessionStore {
    storage: Arc<InMemStorage<ConversationSession>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::with_storage(InMemStorage::new())
    }

    pub fn with_storage(storage: Arc<InMemStorage<ConversationSession>>) -> Self {
        Self { storage }
    }

    pub fn dialogue(&self, user_id: i64) -> SessionDialogue {
        Dialogue::new(self.storage.clone(), ChatId(user_id))
    }

    pub async fn get(&self, user_id: i64) -> error::Result<Option<ConversationSession>> {
        Ok(self.dialogue(user_id).get().await?)
    }

    /// Return the user's session, creating it with `language` if unseen
    pub async fn get_or_create(&self, user_id: i64, language: Language) -> error::Result<ConversationSession> {
        let dialogue = self.dialogue(user_id);
        if let Some(session) = dialogue.get().await? {
            return Ok(session);
        }
        let session = ConversationSession::new(language);
        dialogue.update(session.clone()).await?;
        Ok(session)
    }

    /// Enter a flow; any flow already pending is replaced
    pub async fn set_flow(&self, user_id: i64, flow: PendingFlow) -> error::Result<()> {
        let dialogue = self.dialogue(user_id);
        let mut session = dialogue
            .get()
            .await?
            .unwrap_or_else(|| ConversationSession::new(Language::default()));
        session.pending_flow = flow;
        Ok(dialogue.update(session).await?)
    }

    pub async fn clear_flow(&self, user_id: i64) -> error::Result<()> {
        self.set_flow(user_id, PendingFlow::None).await
    }

    pub async fn set_language(&self, user_id: i64, language: Language) -> error::Result<()> {
        let dialogue = self.dialogue(user_id);
        let mut session = dialogue
            .get()
            .await?
            .unwrap_or_else(|| ConversationSession::new(language));
        session.language = language;
        Ok(dialogue.update(session).await?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QuantityError {
    #[error("quantity is not a number")]
    NotANumber,
    #[error("quantity must be between {min} and {max}", min = MIN_QUANTITY, max = MAX_QUANTITY)]
    OutOfRange,
}

/// Check a quantity against the inclusive `[MIN_QUANTITY, MAX_QUANTITY]` range
pub fn check_quantity(quantity: i64) -> Result<u32, QuantityError> {
    if quantity < i64::from(MIN_QUANTITY) || quantity > i64::from(MAX_QUANTITY) {
        return Err(QuantityError::OutOfRange);
    }
    Ok(quantity as u32)
}

/// Parse a free-text quantity
pub fn validate_quantity(input: &str) -> Result<u32, QuantityError> {
    let quantity: i64 = input
        .trim()
        .parse()
        .map_err(|_| QuantityError::NotANumber)?;
    check_quantity(quantity)
}

/// Customer details submitted at checkout, stored verbatim
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutFields {
    pub name: String,
    pub phone: String,
    pub address: String,
    pub payment_method: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CheckoutError {
    #[error("expected {expected} checkout lines, got {found}", expected = CHECKOUT_FIELD_COUNT)]
    MissingFields { found: usize },
}

/// Parse newline-delimited `name, phone, address, payment method`.
///
/// Blank lines are skipped; lines beyond the fourth are ignored.
pub fn parse_checkout_fields(input: &str) -> Result<CheckoutFields, CheckoutError> {
    let lines: Vec<&str> = input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    if lines.len() < CHECKOUT_FIELD_COUNT {
        return Err(CheckoutError::MissingFields { found: lines.len() });
    }

    Ok(CheckoutFields {
        name: lines[0].to_string(),
        phone: lines[1].to_string(),
        address: lines[2].to_string(),
        payment_method: lines[3].to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_bounds_are_inclusive() {
        assert_eq!(validate_quantity("1"), Ok(1));
        assert_eq!(validate_quantity("10000"), Ok(10_000));
        assert_eq!(validate_quantity(" 5 "), Ok(5));

        assert_eq!(validate_quantity("0"), Err(QuantityError::OutOfRange));
        assert_eq!(validate_quantity("-3"), Err(QuantityError::OutOfRange));
        assert_eq!(validate_quantity("10001"), Err(QuantityError::OutOfRange));
        assert_eq!(
            validate_quantity("99999999999999999999"),
            Err(QuantityError::NotANumber)
        );
    }

    #[test]
    fn test_quantity_not_a_number() {
        assert_eq!(validate_quantity("five"), Err(QuantityError::NotANumber));
        assert_eq!(validate_quantity(""), Err(QuantityError::NotANumber));
        assert_eq!(validate_quantity("2.5"), Err(QuantityError::NotANumber));
    }

    #[test]
    fn test_check_quantity_over_range() {
        for q in [-1_i64, 0, 10_001, i64::MAX] {
            assert!(check_quantity(q).is_err(), "{q} should be rejected");
        }
        for q in [1_i64, 500, 10_000] {
            assert_eq!(check_quantity(q), Ok(q as u32));
        }
    }

    #[test]
    fn test_checkout_fields() {
        let fields = parse_checkout_fields("Ali\n+998901234567\nTashkent\nCash").unwrap();
        assert_eq!(fields.name, "Ali");
        assert_eq!(fields.phone, "+998901234567");
        assert_eq!(fields.address, "Tashkent");
        assert_eq!(fields.payment_method, "Cash");
    }

    #[test]
    fn test_validation_error_messages() {
        assert_eq!(
            QuantityError::OutOfRange.to_string(),
            "quantity must be between 1 and 10000"
        );
        assert_eq!(
            CheckoutError::MissingFields { found: 2 }.to_string(),
            "expected 4 checkout lines, got 2"
        );
    }

    #[test]
    fn test_checkout_fields_incomplete() {
        assert_eq!(
            parse_checkout_fields("Ali\n+998901234567\nTashkent"),
            Err(CheckoutError::MissingFields { found: 3 })
        );
        assert_eq!(
            parse_checkout_fields("Ali\n\n\n+998901234567"),
            Err(CheckoutError::MissingFields { found: 2 })
        );
    }

    #[tokio::test]
    async fn test_new_flow_overwrites_pending_flow() {
        let store = SessionStore::new();
        store.get_or_create(1, Language::Ru).await.unwrap();

        store
            .set_flow(1, PendingFlow::AwaitingQuantity { product_id: 3 })
            .await
            .unwrap();
        store.set_flow(1, PendingFlow::AwaitingCheckoutFields).await.unwrap();

        let session = store.get(1).await.unwrap().unwrap();
        assert_eq!(session.pending_flow, PendingFlow::AwaitingCheckoutFields);
        assert_eq!(session.language, Language::Ru);
    }

    #[tokio::test]
    async fn test_sessions_are_per_user() {
        let store = SessionStore::new();
        store.get_or_create(1, Language::Uz).await.unwrap();
        store.get_or_create(2, Language::Ru).await.unwrap();
        store.set_flow(1, PendingFlow::AwaitingCheckoutFields).await.unwrap();

        assert_eq!(store.get(2).await.unwrap().unwrap().pending_flow, PendingFlow::None);
        assert!(store.get(3).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sessions_share_injected_dialogue_storage() {
        let storage = InMemStorage::<ConversationSession>::new();
        let store = SessionStore::with_storage(storage.clone());
        store
            .set_flow(9, PendingFlow::AwaitingQuantity { product_id: 4 })
            .await
            .unwrap();

        // A second handle over the same storage sees the flow
        let dialogue = SessionStore::with_storage(storage).dialogue(9);
        let session = dialogue.get().await.unwrap().unwrap();
        assert_eq!(session.pending_flow, PendingFlow::AwaitingQuantity { product_id: 4 });
    }
}
