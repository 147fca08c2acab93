//! One browser-driven submission of the vendor queue-check form.

#[cfg(test)]
#[path = "probe_tests.rs"]
mod tests;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::cdp::{CdpError, InterceptedResponse};
use crate::decode::{self, DecodeError};
use crate::order::ProductCategory;

/// Selector of the order-reference input on the form page.
pub const ORDER_NR_SELECTOR: &str = "#ordernummer";
/// Selector of the postal-code input.
pub const ZIPCODE_SELECTOR: &str = "#postcode";
/// Selector of the submit control.
pub const SUBMIT_SELECTOR: &str = "button[type=\"submit\"]";

/// Page-automation capability the probe drives.
///
/// [`crate::cdp::PageSession`] is the real implementation; tests script a
/// fake. Methods take `&mut self` because one probe owns the page at a time.
#[async_trait]
pub trait FormPage: Send {
    async fn navigate(&mut self, url: &str) -> Result<(), CdpError>;
    async fn wait_for_selector(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), CdpError>;
    async fn fill(&mut self, selector: &str, value: &str) -> Result<(), CdpError>;
    async fn click(&mut self, selector: &str) -> Result<(), CdpError>;
    async fn wait_for_response(
        &mut self,
        url: &str,
        timeout: Duration,
    ) -> Result<InterceptedResponse, CdpError>;
}

/// Probe failures. Scoped to one order; the run continues past them.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Navigation, selector wait, interception timeout or other page error.
    #[error("page automation failed: {0}")]
    Page(#[from] CdpError),

    /// The matching check response had a non-200 status.
    #[error("invalid response (status {0})")]
    InvalidResponse(u16),

    /// The check response body did not decode into a queue number.
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Drives one page through one product-specific form flow.
pub struct QueueProbe {
    /// Upper bound on selector waits and on waiting for the check response.
    response_timeout: Duration,
}

impl QueueProbe {
    pub fn new(response_timeout: Duration) -> Self {
        Self { response_timeout }
    }

    /// Submit one order's reference and zipcode and decode the vendor's
    /// check response into a queue position. `0` means fulfilled.
    pub async fn probe<P: FormPage>(
        &self,
        page: &mut P,
        category: ProductCategory,
        order_nr: u64,
        zipcode: &str,
    ) -> Result<u32, ProbeError> {
        let (form_url, check_url) = category.endpoints();
        debug!(%category, order_nr, zipcode, "submitting queue-check form");

        page.navigate(form_url).await?;
        page.wait_for_selector(ORDER_NR_SELECTOR, self.response_timeout)
            .await?;
        page.fill(ORDER_NR_SELECTOR, &order_nr.to_string()).await?;
        page.fill(ZIPCODE_SELECTOR, zipcode).await?;
        page.click(SUBMIT_SELECTOR).await?;

        let response = page
            .wait_for_response(check_url, self.response_timeout)
            .await?;
        if response.status != 200 {
            return Err(ProbeError::InvalidResponse(response.status));
        }

        let payload = decode::parse_payload(&response.body)?;
        Ok(decode::decode(payload)?)
    }
}
