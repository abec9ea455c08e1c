//! # gavel-core
//!
//! Core types, traits, configuration, and error handling for the Gavel bot.

pub mod chunk;
pub mod config;
pub mod error;
pub mod message;
pub mod traits;
