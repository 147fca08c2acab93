//! Minimal Chrome DevTools Protocol client for driving the vendor form.
//!
//! Connects to a Chrome instance started with `--remote-debugging-port`,
//! opens one page and exposes the handful of operations the probe needs:
//! navigation, selector waits, input, clicks and network-response
//! interception.

mod client;
mod error;
mod page;
mod protocol;

pub use client::CdpClient;
pub use error::CdpError;
pub use page::{InterceptedResponse, PageSession};
