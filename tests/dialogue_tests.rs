use anyhow::Result;

use savdo_bot::dialogue::{
    parse_checkout_fields, validate_quantity, CheckoutError, ConversationSession, PendingFlow,
    QuantityError, SessionStore,
};
use savdo_bot::models::Language;

/// Session state survives a serde round trip, so it can be persisted later
#[tokio::test]
async fn test_session_serialization() -> Result<()> {
    let session = ConversationSession {
        pending_flow: PendingFlow::AwaitingQuantity { product_id: 12 },
        language: Language::Ru,
    };

    let json = serde_json::to_string(&session)?;
    let restored: ConversationSession = serde_json::from_str(&json)?;
    assert_eq!(restored, session);
    Ok(())
}

#[tokio::test]
async fn test_language_switch_keeps_pending_flow() -> Result<()> {
    let store = SessionStore::new();
    store.get_or_create(7, Language::Uz).await?;
    store.set_flow(7, PendingFlow::AwaitingCheckoutFields).await?;
    store.set_language(7, Language::Ru).await?;

    let session = store.get(7).await?.expect("session");
    assert_eq!(session.language, Language::Ru);
    assert_eq!(session.pending_flow, PendingFlow::AwaitingCheckoutFields);
    Ok(())
}

#[tokio::test]
async fn test_quantity_input_variants() -> Result<()> {
    assert_eq!(validate_quantity(" 42 "), Ok(42));
    assert_eq!(validate_quantity("1.5"), Err(QuantityError::NotANumber));
    assert_eq!(validate_quantity(""), Err(QuantityError::NotANumber));
    assert_eq!(
        validate_quantity("99999999999999999999"),
        Err(QuantityError::NotANumber)
    );
    Ok(())
}

#[tokio::test]
async fn test_checkout_fields_with_windows_newlines() -> Result<()> {
    let fields = parse_checkout_fields("Ali Valiyev\r\n+998901234567\r\nToshkent, Chilonzor 5\r\nKarta\r\nextra")?;
    assert_eq!(fields.name, "Ali Valiyev");
    assert_eq!(fields.address, "Toshkent, Chilonzor 5");
    assert_eq!(fields.payment_method, "Karta");

    assert_eq!(
        parse_checkout_fields("   \n\n"),
        Err(CheckoutError::MissingFields { found: 0 })
    );
    Ok(())
}
