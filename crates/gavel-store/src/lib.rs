//! # gavel-store
//!
//! SQLite-backed persistence for the club: member roster, notification
//! preferences, and meeting attendance.

pub mod store;

pub use store::{MemberProfile, OptChannel, Store};
