//! Queue-position polling and change-notification engine.
//!
//! One run loads the stored order list, drives a headless Chrome page
//! through the vendor's queue-check form for each order, decodes the
//! obfuscated response into a queue number, notifies order owners whose
//! position changed, and persists the updated list.

pub mod cdp;
pub mod config;
pub mod decode;
pub mod detect;
pub mod notify;
pub mod order;
pub mod probe;
pub mod run;
pub mod state;
