//! # gavel-channels
//!
//! Messaging platform integrations for Gavel. Discord is the only
//! platform; everything behind [`gavel_core::traits::Channel`].

pub mod discord;

pub use discord::DiscordChannel;
