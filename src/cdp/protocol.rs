//! CDP message and event types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// CDP request message.
#[derive(Debug, Serialize)]
pub struct CdpRequest {
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

/// CDP response or event message.
#[derive(Debug, Deserialize)]
pub struct CdpResponse {
    pub id: Option<u64>,
    pub result: Option<Value>,
    pub error: Option<CdpErrorResponse>,
    pub method: Option<String>,
    pub params: Option<Value>,
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

/// CDP error in response.
#[derive(Debug, Deserialize)]
pub struct CdpErrorResponse {
    pub code: i64,
    pub message: String,
}

/// Page info from the `/json` HTTP endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub id: String,
    pub url: String,
}

/// Browser version info.
///
/// Note: Chrome returns PascalCase field names for this endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserVersion {
    #[serde(rename = "Browser")]
    pub browser: String,
    #[serde(rename = "webSocketDebuggerUrl")]
    pub web_socket_debugger_url: String,
}

// ============================================================================
// Network events
// ============================================================================

/// `Network.responseReceived` event parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseReceivedParams {
    pub request_id: String,
    pub response: NetworkResponse,
}

/// Response descriptor inside `Network.responseReceived`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkResponse {
    pub url: String,
    pub status: u16,
}

/// `Network.loadingFinished` event parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadingFinishedParams {
    pub request_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serializes_without_absent_fields() {
        let request = CdpRequest {
            id: 1,
            method: "Page.enable".to_string(),
            params: None,
            session_id: None,
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(!json.contains("params"));
        assert!(!json.contains("sessionId"));
    }

    #[test]
    fn test_event_parses_without_id() {
        let text = r#"{"method":"Network.loadingFinished","params":{"requestId":"12.3"},"sessionId":"S1"}"#;
        let resp: CdpResponse = serde_json::from_str(text).unwrap();
        assert!(resp.id.is_none());
        assert_eq!(resp.method.as_deref(), Some("Network.loadingFinished"));

        let params: LoadingFinishedParams = serde_json::from_value(resp.params.unwrap()).unwrap();
        assert_eq!(params.request_id, "12.3");
    }

    #[test]
    fn test_response_received_parses() {
        let params = serde_json::json!({
            "requestId": "7.1",
            "loaderId": "L1",
            "timestamp": 123.4,
            "type": "XHR",
            "response": {
                "url": "http://include.alternate.nl/ryzen5000/check.php",
                "status": 200,
                "statusText": "OK",
                "headers": {}
            }
        });

        let parsed: ResponseReceivedParams = serde_json::from_value(params).unwrap();
        assert_eq!(parsed.response.status, 200);
        assert!(parsed.response.url.ends_with("check.php"));
    }
}
