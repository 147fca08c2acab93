//! Decoding of the vendor's obfuscated queue-check payload.

#[cfg(test)]
#[path = "decode_tests.rs"]
mod tests;

use serde::Deserialize;
use thiserror::Error;

/// Vendor message returned once an order has shipped.
pub const SHIPPED_MESSAGE: &str = "Deze order is reeds verzonden. Het wachten is voorbij!";

/// Sentinel queue position meaning the order is fulfilled.
pub const QUEUE_DONE: u32 = 0;

/// The two shapes a check response can take, validated at the boundary.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum CheckPayload {
    /// Queue digits, each offset by +2 by the vendor.
    Digits { a: i64, b: i64, c: i64, d: i64 },
    /// Vendor-side error message.
    Error { error: String },
}

/// Decode failures, a sub-kind of probe failure.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Body is not valid JSON at all.
    #[error("malformed response body: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Valid JSON that carries neither the four digit fields nor an error.
    #[error("unrecognized response shape")]
    UnrecognizedShape,

    /// A digit slot outside the obfuscated single-digit range 2..=11.
    #[error("queue digits out of range")]
    DigitOutOfRange,

    /// Vendor reported an error other than the shipped sentinel.
    #[error("vendor error: {0}")]
    Vendor(String),
}

/// Parse a response body into one of the two known payload shapes.
pub fn parse_payload(body: &str) -> Result<CheckPayload, DecodeError> {
    let value: serde_json::Value = serde_json::from_str(body)?;
    serde_json::from_value(value).map_err(|_| DecodeError::UnrecognizedShape)
}

/// Decode a payload into a queue position. `0` means fulfilled.
///
/// The vendor obfuscates each digit by adding 2; the queue number is the
/// base-10 concatenation of the de-obfuscated digits in a,b,c,d order.
pub fn decode(payload: CheckPayload) -> Result<u32, DecodeError> {
    match payload {
        CheckPayload::Digits { a, b, c, d } => {
            let slots = [a, b, c, d];
            // Each slot must de-obfuscate to a single decimal digit; anything
            // outside 2..=11 would concatenate into a structurally wrong
            // number (e.g. 13 contributing "11").
            if slots.iter().any(|n| !(2..=11).contains(n)) {
                return Err(DecodeError::DigitOutOfRange);
            }
            let digits: String = slots.iter().map(|n| (n - 2).to_string()).collect();
            digits.parse().map_err(|_| DecodeError::DigitOutOfRange)
        }
        CheckPayload::Error { error } if error == SHIPPED_MESSAGE => Ok(QUEUE_DONE),
        CheckPayload::Error { error } => Err(DecodeError::Vendor(error)),
    }
}
