//! # Savdo Telegram Bot
//!
//! A bilingual (Uzbek/Russian) shop assistant for Telegram: catalog
//! browsing, a cart built from pending orders, checkout, keyword and
//! AI-backed answers, and scheduled marketing broadcasts.

pub mod actions;
pub mod ai;
pub mod bot;
pub mod channel;
pub mod circuit_breaker;
pub mod config;
pub mod dialogue;
pub mod error;
pub mod gemini;
pub mod localization;
pub mod marketing;
pub mod models;
pub mod rules;
pub mod storage;
