//! Bot module for handling Telegram interactions
//!
//! This module is split into several submodules:
//! - `gateway`: Resolves the sender and routes each update
//! - `message_handler`: Commands and free-text messages
//! - `callback_handler`: Inline keyboard callback queries
//! - `dialogue_manager`: Quantity and checkout flows over the cart
//! - `ui_builder`: Creates keyboards and formats messages
//! - `telegram`: teloxide adapter and dispatcher

pub mod callback_handler;
pub mod dialogue_manager;
pub mod gateway;
pub mod message_handler;
pub mod telegram;
pub mod ui_builder;

pub use gateway::{BotGateway, InboundUpdate, Sender, UpdateKind};
pub use message_handler::MAX_STORED_TURNS;
pub use telegram::{run_dispatcher, Command, TelegramChannel};
