//! Chat transports for rollcall.
//!
//! Each channel connects to a chat platform and relays operator messages to
//! the session controller. Channels are trait-based and platform-agnostic.
//!
//! Available channels:
//! - **Telegram**: Telegram Bot API (long polling or webhook)
//! - **CLI**: Interactive terminal session (stdin/stdout)
//!
//! Around them:
//! - **Registry**: owns the running channels and merges their inbound streams
//! - **Dispatcher**: serializes each requester's messages and drives the controller
//! - **Render**: turns controller outcomes into chat text

pub mod cli;
pub mod dispatch;
pub mod inbound;
pub mod registry;
pub mod render;
pub mod telegram;

pub use cli::CliChannel;
pub use dispatch::{Dispatcher, Reply, respond};
pub use registry::ChannelRegistry;
pub use telegram::{TelegramChannel, TelegramConfig};
