//! Gateway between the messaging platform and the shop: resolves the
//! sender, routes the update to its handler and guarantees a reply.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::ai::{IntentClassifier, ResponseGenerator};
use crate::channel::{Keyboard, OutboundChannel};
use crate::dialogue::{ConversationSession, SessionStore};
use crate::error::Result;
use crate::localization::t_lang;
use crate::models::{BotSettings, Language, NewUser, Platform, User};
use crate::storage::Storage;

use super::telegram::Command;

/// Who sent an update, as reported by the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub id: i64,
    pub first_name: String,
    pub username: Option<String>,
    /// Client UI language, only a hint
    pub language_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateKind {
    Command(Command),
    Callback { data: String },
    Text(String),
    /// Stickers, photos, voice notes...
    Unsupported,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InboundUpdate {
    pub chat_id: i64,
    pub sender: Sender,
    pub kind: UpdateKind,
}

/// Per-update view of the sender shared by all handlers
#[derive(Debug, Clone)]
pub struct UserContext {
    pub chat_id: i64,
    /// Platform user id, the session key
    pub sender_id: i64,
    pub sender_name: String,
    pub user: User,
    pub language: Language,
}

pub struct BotGateway {
    pub(super) storage: Arc<dyn Storage>,
    pub(super) channel: Arc<dyn OutboundChannel>,
    pub(super) sessions: SessionStore,
    pub(super) classifier: IntentClassifier,
    pub(super) responder: ResponseGenerator,
}

impl BotGateway {
    pub fn new(
        storage: Arc<dyn Storage>,
        channel: Arc<dyn OutboundChannel>,
        sessions: SessionStore,
        classifier: IntentClassifier,
        responder: ResponseGenerator,
    ) -> Self {
        Self {
            storage,
            channel,
            sessions,
            classifier,
            responder,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Process one update. Never fails: errors end in a localized apology.
    pub async fn handle_update(&self, update: InboundUpdate) {
        debug!(user_id = update.sender.id, kind = ?update.kind, "Received update");

        let ctx = match self.resolve_user(update.chat_id, &update.sender).await {
            Ok(ctx) => ctx,
            Err(e) => {
                error!(user_id = update.sender.id, error = %e, "Failed to resolve user");
                let language = Language::from_client_code(update.sender.language_code.as_deref());
                self.apologize(update.chat_id, language).await;
                return;
            }
        };

        let result = match update.kind {
            UpdateKind::Command(command) => self.handle_command(&ctx, command).await,
            UpdateKind::Callback { data } => self.handle_callback(&ctx, &data).await,
            UpdateKind::Text(text) => self.handle_text(&ctx, &text).await,
            UpdateKind::Unsupported => self.handle_unsupported(&ctx).await,
        };

        if let Err(e) = result {
            error!(user_id = ctx.sender_id, error = %e, "Update handling failed");
            // The session may have switched language mid-update
            let language = self
                .sessions
                .get(ctx.sender_id)
                .await
                .ok()
                .flatten()
                .map_or(ctx.language, |session| session.language);
            self.apologize(ctx.chat_id, language).await;
        }
    }

    /// Load or create the persisted user and the in-memory session
    async fn resolve_user(&self, chat_id: i64, sender: &Sender) -> Result<UserContext> {
        let platform_id = sender.id.to_string();
        let user = match self
            .storage
            .get_user_by_platform_id(&platform_id, Platform::Telegram)
            .await?
        {
            Some(user) => user,
            None => {
                let user = self
                    .storage
                    .create_user(NewUser {
                        platform_id,
                        platform_type: Platform::Telegram,
                        language: None,
                        username: sender.username.clone(),
                        full_name: Some(sender.first_name.clone()),
                    })
                    .await?;
                info!(user_id = sender.id, db_user_id = user.id, "Registered new user");
                user
            }
        };

        let initial_language = user
            .language
            .unwrap_or_else(|| Language::from_client_code(sender.language_code.as_deref()));
        let session: ConversationSession = self.sessions.get_or_create(sender.id, initial_language).await?;

        Ok(UserContext {
            chat_id,
            sender_id: sender.id,
            sender_name: sender.first_name.clone(),
            user,
            language: session.language,
        })
    }

    pub(super) async fn send(&self, chat_id: i64, text: &str, keyboard: Option<Keyboard>) -> Result<()> {
        self.channel.send_message(chat_id, text, keyboard.as_ref()).await
    }

    /// Photo with caption, degrading to a text message if the photo is refused
    pub(super) async fn send_photo_or_text(
        &self,
        chat_id: i64,
        photo_url: &str,
        caption: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<()> {
        match self
            .channel
            .send_photo(chat_id, photo_url, Some(caption), keyboard.as_ref())
            .await
        {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(chat_id, error = %e, "Photo send failed, falling back to text");
                self.send(chat_id, caption, keyboard).await
            }
        }
    }

    async fn apologize(&self, chat_id: i64, language: Language) {
        if let Err(e) = self
            .send(chat_id, &t_lang("error-generic", language), None)
            .await
        {
            error!(chat_id, error = %e, "Failed to send error reply");
        }
    }

    /// Bot settings, or defaults when unset or unreadable
    pub(super) async fn bot_settings(&self) -> BotSettings {
        match self.storage.get_bot_settings().await {
            Ok(settings) => settings.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "Failed to load bot settings, using defaults");
                BotSettings::default()
            }
        }
    }
}
