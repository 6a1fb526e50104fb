/// Whisperly - messaging client core
///
/// Client-side state and interaction logic: conversation directory, message
/// threads, media catalog, onboarding sequencer and settings, plus a local
/// HTTP bridge for an external renderer.

pub mod error;
pub mod config;
pub mod conversation_store;
pub mod message_thread;
pub mod media_catalog;
pub mod onboarding;
pub mod settings;
pub mod session_store;
pub mod seed;
pub mod routes;
pub mod messenger_types;
pub mod notifier;
pub mod client;
pub mod transport;
pub mod messenger_api;
pub mod cli_app;

pub use client::Client;
pub use config::Config;
pub use error::{ChatError, Result};
