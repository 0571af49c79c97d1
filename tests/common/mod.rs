//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use savdo_bot::ai::{GenerativeBackend, GuardedBackend, IntentClassifier, ResponseGenerator};
use savdo_bot::bot::{BotGateway, InboundUpdate, Sender, UpdateKind};
use savdo_bot::channel::{Keyboard, OutboundChannel};
use savdo_bot::config::RecoveryConfig;
use savdo_bot::dialogue::SessionStore;
use savdo_bot::error::{BotError, Result};
use savdo_bot::models::{ChatTurn, Product};
use savdo_bot::storage::InMemoryStorage;

/// One message as it left the bot
#[derive(Debug, Clone, PartialEq)]
pub struct Sent {
    pub chat_id: i64,
    pub text: String,
    pub photo_url: Option<String>,
    pub keyboard: Option<Keyboard>,
}

/// Channel that records every successful send
#[derive(Default)]
pub struct RecordingChannel {
    sent: Mutex<Vec<Sent>>,
    failing_chats: Mutex<HashSet<i64>>,
    fail_photos: Mutex<bool>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_chat(&self, chat_id: i64) {
        self.failing_chats.lock().unwrap().insert(chat_id);
    }

    pub fn fail_photos(&self) {
        *self.fail_photos.lock().unwrap() = true;
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, chat_id: i64) -> Vec<Sent> {
        self.sent()
            .into_iter()
            .filter(|sent| sent.chat_id == chat_id)
            .collect()
    }

    pub fn last_text(&self) -> String {
        self.sent()
            .last()
            .map(|sent| sent.text.clone())
            .unwrap_or_default()
    }

    pub fn last(&self) -> Option<Sent> {
        self.sent().last().cloned()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }

    fn check(&self, chat_id: i64) -> Result<()> {
        if self.failing_chats.lock().unwrap().contains(&chat_id) {
            return Err(BotError::Send(format!("chat {chat_id} blocked the bot")));
        }
        Ok(())
    }
}

#[async_trait]
impl OutboundChannel for RecordingChannel {
    async fn send_message(&self, chat_id: i64, text: &str, keyboard: Option<&Keyboard>) -> Result<()> {
        self.check(chat_id)?;
        self.sent.lock().unwrap().push(Sent {
            chat_id,
            text: text.to_string(),
            photo_url: None,
            keyboard: keyboard.cloned(),
        });
        Ok(())
    }

    async fn send_photo(
        &self,
        chat_id: i64,
        photo_url: &str,
        caption: Option<&str>,
        keyboard: Option<&Keyboard>,
    ) -> Result<()> {
        self.check(chat_id)?;
        if *self.fail_photos.lock().unwrap() {
            return Err(BotError::Send("wrong file identifier/HTTP URL specified".to_string()));
        }
        self.sent.lock().unwrap().push(Sent {
            chat_id,
            text: caption.unwrap_or_default().to_string(),
            photo_url: Some(photo_url.to_string()),
            keyboard: keyboard.cloned(),
        });
        Ok(())
    }
}

/// Backend replying from a queue; an empty queue is a backend failure
#[derive(Default)]
pub struct ScriptedBackend {
    replies: Mutex<VecDeque<Result<String>>>,
    calls: Mutex<usize>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, reply: &str) {
        self.replies.lock().unwrap().push_back(Ok(reply.to_string()));
    }

    pub fn push_failure(&self) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(BotError::Backend("scripted failure".to_string())));
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl GenerativeBackend for ScriptedBackend {
    async fn generate(&self, _system_prompt: &str, _history: &[ChatTurn], _message: &str) -> Result<String> {
        *self.calls.lock().unwrap() += 1;
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(BotError::Backend("no scripted reply".to_string())))
    }
}

pub struct Harness {
    pub storage: Arc<InMemoryStorage>,
    pub channel: Arc<RecordingChannel>,
    pub backend: Arc<ScriptedBackend>,
    pub gateway: BotGateway,
}

pub fn harness() -> Harness {
    let storage = Arc::new(InMemoryStorage::new());
    let channel = Arc::new(RecordingChannel::new());
    let backend = Arc::new(ScriptedBackend::new());

    // Breaker must never trip across a test's scripted failures
    let recovery = RecoveryConfig {
        circuit_breaker_threshold: 1_000,
        ..RecoveryConfig::default()
    };
    let generative: Arc<dyn GenerativeBackend> = backend.clone();
    let guarded = GuardedBackend::new(Some(generative), &recovery);

    let gateway = BotGateway::new(
        storage.clone(),
        channel.clone(),
        SessionStore::new(),
        IntentClassifier::new(guarded.clone()),
        ResponseGenerator::new(guarded),
    );

    Harness {
        storage,
        channel,
        backend,
        gateway,
    }
}

pub const CHAT_ID: i64 = 4242;

pub fn sender() -> Sender {
    Sender {
        id: CHAT_ID,
        first_name: "Ali".to_string(),
        username: Some("ali_uz".to_string()),
        language_code: Some("uz".to_string()),
    }
}

pub fn text(body: &str) -> InboundUpdate {
    InboundUpdate {
        chat_id: CHAT_ID,
        sender: sender(),
        kind: UpdateKind::Text(body.to_string()),
    }
}

pub fn callback(data: &str) -> InboundUpdate {
    InboundUpdate {
        chat_id: CHAT_ID,
        sender: sender(),
        kind: UpdateKind::Callback {
            data: data.to_string(),
        },
    }
}

pub fn command(command: savdo_bot::bot::Command) -> InboundUpdate {
    InboundUpdate {
        chat_id: CHAT_ID,
        sender: sender(),
        kind: UpdateKind::Command(command),
    }
}

pub fn product(name: &str, price: f64, stock: i32) -> Product {
    Product {
        id: 0,
        name_uz: name.to_string(),
        name_ru: format!("{name} RU"),
        description_uz: None,
        description_ru: None,
        price,
        stock,
        image_url: None,
        is_active: true,
    }
}
