//! Session attached to a single page: the form-driving operations.

#[cfg(test)]
#[path = "page_tests.rs"]
mod tests;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::SinkExt;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, trace};

use super::client::{COMMAND_TIMEOUT, PendingRequest, WsSink};
use super::error::CdpError;
use super::protocol::{CdpRequest, CdpResponse, LoadingFinishedParams, ResponseReceivedParams};
use crate::probe::FormPage;

/// How often selector and load polls re-check the page.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A network response captured for an exactly matching URL.
///
/// For non-200 responses the body is empty: the caller fails on status
/// before any body would be inspected.
#[derive(Debug, Clone)]
pub struct InterceptedResponse {
    pub status: u16,
    pub body: String,
}

/// A session attached to a single page/target.
pub struct PageSession {
    /// Target ID.
    target_id: String,
    /// Session ID for this target.
    session_id: String,
    /// WebSocket sender (shared with client).
    ws_tx: Arc<tokio::sync::Mutex<WsSink>>,
    /// Pending requests (shared with client).
    pending: Arc<Mutex<HashMap<u64, PendingRequest>>>,
    /// Request ID counter (shared with client).
    request_id: Arc<AtomicU64>,
    /// Session-scoped events routed here by the client's receive loop.
    event_rx: mpsc::UnboundedReceiver<CdpResponse>,
}

impl PageSession {
    pub(crate) fn new(
        target_id: String,
        session_id: String,
        ws_tx: Arc<tokio::sync::Mutex<WsSink>>,
        pending: Arc<Mutex<HashMap<u64, PendingRequest>>>,
        request_id: Arc<AtomicU64>,
        event_rx: mpsc::UnboundedReceiver<CdpResponse>,
    ) -> Self {
        Self {
            target_id,
            session_id,
            ws_tx,
            pending,
            request_id,
            event_rx,
        }
    }

    /// Get target ID.
    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    /// Send a CDP command to this page session.
    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<Value, CdpError> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);

        let request = CdpRequest {
            id,
            method: method.to_string(),
            params,
            session_id: Some(self.session_id.clone()),
        };

        let json = serde_json::to_string(&request)?;
        trace!("CDP session send: {}", json);

        let (tx, rx) = tokio::sync::oneshot::channel();
        self.pending.lock().insert(id, PendingRequest { tx });

        {
            let mut ws = self.ws_tx.lock().await;
            ws.send(Message::Text(json.into())).await?;
        }

        match tokio::time::timeout(COMMAND_TIMEOUT, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(CdpError::SessionClosed),
            Err(_) => {
                self.pending.lock().remove(&id);
                Err(CdpError::Timeout(format!("Request {} timed out", method)))
            }
        }
    }

    /// Enable the CDP domains the probe relies on.
    pub(crate) async fn enable_domains(&self) -> Result<(), CdpError> {
        self.call("Page.enable", None).await?;
        self.call("DOM.enable", None).await?;
        self.call("Runtime.enable", None).await?;
        self.call("Network.enable", None).await?;

        debug!("Enabled CDP domains for session {}", self.session_id);
        Ok(())
    }

    /// Evaluate a JavaScript expression and return its value.
    pub async fn evaluate(&self, expression: &str) -> Result<Value, CdpError> {
        let result = self
            .call(
                "Runtime.evaluate",
                Some(json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                })),
            )
            .await?;

        if let Some(exception) = result.get("exceptionDetails") {
            let text = exception["text"].as_str().unwrap_or("Unknown error");
            return Err(CdpError::JavaScript(text.to_string()));
        }

        Ok(result["result"]["value"].clone())
    }

    /// Navigate to a URL and wait for the document to load.
    pub async fn goto(&self, url: &str) -> Result<(), CdpError> {
        let result = self
            .call("Page.navigate", Some(json!({"url": url})))
            .await?;

        if let Some(error) = result.get("errorText") {
            return Err(CdpError::NavigationFailed(
                error.as_str().unwrap_or("Unknown error").to_string(),
            ));
        }

        self.wait_for_load().await?;

        debug!("Navigated to {}", url);
        Ok(())
    }

    /// Wait for the document to reach an interactive state.
    async fn wait_for_load(&self) -> Result<(), CdpError> {
        let start = std::time::Instant::now();

        loop {
            let result = self.evaluate("document.readyState").await?;

            if let Some(state) = result.as_str() {
                if state == "complete" || state == "interactive" {
                    return Ok(());
                }
            }

            if start.elapsed() > COMMAND_TIMEOUT {
                return Err(CdpError::Timeout("Page load timeout".to_string()));
            }

            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Poll until the selector matches an element, up to `timeout`.
    pub async fn poll_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<i64, CdpError> {
        let start = std::time::Instant::now();

        loop {
            if let Some(node_id) = self.query_selector(selector).await? {
                return Ok(node_id);
            }

            if start.elapsed() > timeout {
                return Err(CdpError::Timeout(format!(
                    "Waiting for selector '{}' timed out",
                    selector
                )));
            }

            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Query selector against the current document.
    async fn query_selector(&self, selector: &str) -> Result<Option<i64>, CdpError> {
        let doc = self
            .call("DOM.getDocument", Some(json!({"depth": 0})))
            .await?;
        let root_id = doc["root"]["nodeId"]
            .as_i64()
            .ok_or_else(|| CdpError::InvalidResponse("Missing document root".to_string()))?;

        let result = self
            .call(
                "DOM.querySelector",
                Some(json!({
                    "nodeId": root_id,
                    "selector": selector,
                })),
            )
            .await?;

        let node_id = result["nodeId"].as_i64().unwrap_or(0);
        if node_id == 0 { Ok(None) } else { Ok(Some(node_id)) }
    }

    /// Focus an input and type a value into it.
    pub async fn fill_selector(&self, selector: &str, value: &str) -> Result<(), CdpError> {
        let node_id = self
            .query_selector(selector)
            .await?
            .ok_or_else(|| CdpError::ElementNotFound(selector.to_string()))?;

        self.call("DOM.focus", Some(json!({"nodeId": node_id})))
            .await?;
        self.call("Input.insertText", Some(json!({"text": value})))
            .await?;

        debug!("Filled {} ({} characters)", selector, value.len());
        Ok(())
    }

    /// Click the center of the element matching a selector.
    pub async fn click_selector(&self, selector: &str) -> Result<(), CdpError> {
        let node_id = self
            .query_selector(selector)
            .await?
            .ok_or_else(|| CdpError::ElementNotFound(selector.to_string()))?;

        let result = self
            .call("DOM.getBoxModel", Some(json!({"nodeId": node_id})))
            .await
            .map_err(|_| CdpError::ElementNotFound(format!("{} (not visible)", selector)))?;

        let quad: Vec<f64> = serde_json::from_value(result["model"]["content"].clone())?;
        let (x, y) = Self::quad_center(&quad);

        for event_type in ["mousePressed", "mouseReleased"] {
            self.call(
                "Input.dispatchMouseEvent",
                Some(json!({
                    "type": event_type,
                    "x": x,
                    "y": y,
                    "button": "left",
                    "clickCount": 1,
                })),
            )
            .await?;
        }

        debug!("Clicked {} at ({}, {})", selector, x, y);
        Ok(())
    }

    /// Center point of a content quad.
    fn quad_center(quad: &[f64]) -> (f64, f64) {
        if quad.len() >= 8 {
            let x = (quad[0] + quad[2] + quad[4] + quad[6]) / 4.0;
            let y = (quad[1] + quad[3] + quad[5] + quad[7]) / 4.0;
            (x, y)
        } else {
            (0.0, 0.0)
        }
    }

    /// Wait for the network response whose URL exactly equals `url`.
    ///
    /// Non-matching responses and unrelated events are ignored. A matching
    /// non-200 response returns immediately with an empty body; for 200 the
    /// wait extends to `Network.loadingFinished` so the body is retrievable.
    pub async fn intercept_response(
        &mut self,
        url: &str,
        timeout: Duration,
    ) -> Result<InterceptedResponse, CdpError> {
        // Events left over from an earlier submission (e.g. a response that
        // arrived after its probe timed out) must not be attributed to this
        // one. The same check URL is reused across orders of one category,
        // so a stale match would hand this order someone else's number.
        let mut drained = 0usize;
        while self.event_rx.try_recv().is_ok() {
            drained += 1;
        }
        if drained > 0 {
            trace!("Dropped {} stale event(s) before interception", drained);
        }

        let deadline = tokio::time::Instant::now() + timeout;
        let mut matched: Option<(String, u16)> = None;

        loop {
            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Err(CdpError::Timeout(format!(
                    "No response from {} within {:?}",
                    url, timeout
                )));
            }

            let event = match tokio::time::timeout(deadline - now, self.event_rx.recv()).await {
                Ok(Some(event)) => event,
                Ok(None) => return Err(CdpError::SessionClosed),
                Err(_) => {
                    return Err(CdpError::Timeout(format!(
                        "No response from {} within {:?}",
                        url, timeout
                    )));
                }
            };

            let Some(method) = event.method.as_deref() else {
                continue;
            };
            let params = event.params.unwrap_or(Value::Null);

            match method {
                "Network.responseReceived" => {
                    let Ok(params) = serde_json::from_value::<ResponseReceivedParams>(params)
                    else {
                        continue;
                    };
                    if params.response.url == url {
                        trace!(
                            "Matched response {} (status {})",
                            params.request_id, params.response.status
                        );
                        if params.response.status != 200 {
                            return Ok(InterceptedResponse {
                                status: params.response.status,
                                body: String::new(),
                            });
                        }
                        matched = Some((params.request_id, params.response.status));
                    }
                }
                "Network.loadingFinished" => {
                    let Ok(params) = serde_json::from_value::<LoadingFinishedParams>(params)
                    else {
                        continue;
                    };
                    if let Some((request_id, status)) = &matched {
                        if &params.request_id == request_id {
                            let result = self
                                .call(
                                    "Network.getResponseBody",
                                    Some(json!({"requestId": request_id})),
                                )
                                .await?;
                            // check.php serves plain JSON; a binary body
                            // would never decode anyway.
                            if result["base64Encoded"].as_bool() == Some(true) {
                                return Err(CdpError::InvalidResponse(
                                    "Unexpected binary response body".to_string(),
                                ));
                            }
                            let body =
                                result["body"].as_str().unwrap_or_default().to_string();
                            return Ok(InterceptedResponse {
                                status: *status,
                                body,
                            });
                        }
                    }
                }
                _ => {}
            }
        }
    }
}

#[async_trait]
impl FormPage for PageSession {
    async fn navigate(&mut self, url: &str) -> Result<(), CdpError> {
        self.goto(url).await
    }

    async fn wait_for_selector(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), CdpError> {
        self.poll_for_selector(selector, timeout).await.map(|_| ())
    }

    async fn fill(&mut self, selector: &str, value: &str) -> Result<(), CdpError> {
        self.fill_selector(selector, value).await
    }

    async fn click(&mut self, selector: &str) -> Result<(), CdpError> {
        self.click_selector(selector).await
    }

    async fn wait_for_response(
        &mut self,
        url: &str,
        timeout: Duration,
    ) -> Result<InterceptedResponse, CdpError> {
        self.intercept_response(url, timeout).await
    }
}
