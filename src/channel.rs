//! Outbound messaging seam.
//!
//! Handlers describe keyboards with [`Keyboard`] and send through
//! [`OutboundChannel`]; the Telegram adapter lives in
//! [`crate::bot::telegram`].

use async_trait::async_trait;

use crate::actions::CallbackAction;
use crate::error::Result;

/// An inline button: visible label plus the action it triggers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub action: CallbackAction,
}

impl Button {
    pub fn new(label: impl Into<String>, action: CallbackAction) -> Self {
        Self {
            label: label.into(),
            action,
        }
    }
}

/// A grid of inline buttons, one inner vector per row
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    pub fn new(rows: Vec<Vec<Button>>) -> Self {
        Self { rows }
    }

    pub fn actions(&self) -> impl Iterator<Item = CallbackAction> + '_ {
        self.rows.iter().flatten().map(|button| button.action)
    }
}

#[async_trait]
pub trait OutboundChannel: Send + Sync {
    async fn send_message(&self, chat_id: i64, text: &str, keyboard: Option<&Keyboard>)
        -> Result<()>;

    async fn send_photo(
        &self,
        chat_id: i64,
        photo_url: &str,
        caption: Option<&str>,
        keyboard: Option<&Keyboard>,
    ) -> Result<()>;
}
