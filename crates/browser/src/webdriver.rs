//! Low-level W3C WebDriver client over HTTP.
//!
//! Talks JSON to a running driver executable (chromedriver, msedgedriver,
//! geckodriver, safaridriver). Only the commands the lookup flow needs are
//! wrapped.

use dell_lookup_core::{Error, Result};
use reqwest::Method;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// Key under which the protocol returns web element references.
pub(crate) const ELEMENT_KEY: &str = "element-6066-11e4-a52f-4c72d7f6f2c7";

/// Per-request HTTP timeout. Page loads triggered by `navigate` can be slow.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Opaque reference to an element in the current page.
///
/// A new page yields new references, which makes the id of `<html>` usable
/// as a navigation token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRef(String);

impl ElementRef {
    pub fn id(&self) -> &str {
        &self.0
    }
}

/// Element lookup strategy.
#[derive(Debug, Clone, Copy)]
pub enum Locator<'a> {
    Css(&'a str),
    TagName(&'a str),
}

impl<'a> Locator<'a> {
    fn to_json(self) -> Value {
        let (using, value) = match self {
            Locator::Css(s) => ("css selector", s),
            Locator::TagName(s) => ("tag name", s),
        };
        json!({ "using": using, "value": value })
    }
}

/// Error reported by the driver in a response body.
#[derive(Debug)]
enum WireError {
    Http(String),
    Driver { error: String, message: String },
}

impl WireError {
    fn is(&self, code: &str) -> bool {
        matches!(self, WireError::Driver { error, .. } if error == code)
    }

    fn into_error(self, command: &str) -> Error {
        match self {
            WireError::Http(msg) => Error::Browser(format!("{} failed: {}", command, msg)),
            WireError::Driver { error, message } => {
                Error::Browser(format!("{} failed: {}: {}", command, error, message))
            }
        }
    }
}

fn build_http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| Error::Browser(format!("Failed to build HTTP client: {}", e)))
}

async fn send_raw(
    http: &reqwest::Client,
    method: Method,
    url: &str,
    body: Option<Value>,
) -> std::result::Result<Value, WireError> {
    let mut req = http.request(method, url);
    // Drivers reject POSTs without a JSON body, even for commands without parameters.
    if let Some(body) = body {
        req = req.json(&body);
    }

    let resp = req
        .send()
        .await
        .map_err(|e| WireError::Http(e.to_string()))?;
    let status = resp.status();
    let payload: Value = resp
        .json()
        .await
        .map_err(|e| WireError::Http(format!("invalid response ({}): {}", status, e)))?;

    let value = payload.get("value").cloned().unwrap_or(Value::Null);
    if let Some(error) = value.get("error").and_then(|v| v.as_str()) {
        return Err(WireError::Driver {
            error: error.to_string(),
            message: value
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
        });
    }
    if !status.is_success() {
        return Err(WireError::Http(format!("HTTP {}", status)));
    }
    Ok(value)
}

fn element_from_value(value: &Value) -> Option<ElementRef> {
    value
        .get(ELEMENT_KEY)
        .and_then(|v| v.as_str())
        .map(|id| ElementRef(id.to_string()))
}

/// Ask a driver whether it accepts new sessions.
pub async fn driver_ready(base_url: &str) -> bool {
    let Ok(http) = build_http_client() else {
        return false;
    };
    match send_raw(&http, Method::GET, &format!("{}/status", base_url), None).await {
        Ok(value) => value.get("ready").and_then(|v| v.as_bool()).unwrap_or(false),
        Err(_) => false,
    }
}

/// A live WebDriver session.
pub struct WebDriverClient {
    http: reqwest::Client,
    session_url: String,
    session_id: String,
}

impl WebDriverClient {
    /// Open a new session on the driver listening at `base_url`.
    pub async fn new_session(base_url: &str, capabilities: Value) -> Result<Self> {
        let http = build_http_client()?;
        let value = send_raw(
            &http,
            Method::POST,
            &format!("{}/session", base_url),
            Some(json!({ "capabilities": { "alwaysMatch": capabilities } })),
        )
        .await
        .map_err(|e| e.into_error("New session"))?;

        let session_id = value
            .get("sessionId")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::Browser("New session response has no sessionId".to_string()))?
            .to_string();

        debug!(session_id = %session_id, "WebDriver session created");

        Ok(Self {
            session_url: format!("{}/session/{}", base_url, session_id),
            session_id,
            http,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> std::result::Result<Value, WireError> {
        send_raw(&self.http, method, &format!("{}{}", self.session_url, path), body).await
    }

    async fn command(&self, name: &str, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        self.send(method, path, body)
            .await
            .map_err(|e| e.into_error(name))
    }

    pub async fn navigate(&self, url: &str) -> Result<()> {
        self.command("Navigate", Method::POST, "/url", Some(json!({ "url": url })))
            .await?;
        Ok(())
    }

    /// First element matching `locator`, or `None` when nothing matches.
    pub async fn find_element(&self, locator: Locator<'_>) -> Result<Option<ElementRef>> {
        match self
            .send(Method::POST, "/element", Some(locator.to_json()))
            .await
        {
            Ok(value) => element_from_value(&value)
                .map(Some)
                .ok_or_else(|| Error::Browser("Find element returned no element reference".to_string())),
            Err(e) if e.is("no such element") => Ok(None),
            Err(e) => Err(e.into_error("Find element")),
        }
    }

    pub async fn click(&self, element: &ElementRef) -> Result<()> {
        self.command(
            "Element click",
            Method::POST,
            &format!("/element/{}/click", element.id()),
            Some(json!({})),
        )
        .await?;
        Ok(())
    }

    pub async fn send_keys(&self, element: &ElementRef, text: &str) -> Result<()> {
        self.command(
            "Element send keys",
            Method::POST,
            &format!("/element/{}/value", element.id()),
            Some(json!({ "text": text })),
        )
        .await?;
        Ok(())
    }

    pub async fn text(&self, element: &ElementRef) -> Result<String> {
        let value = self
            .command(
                "Element text",
                Method::GET,
                &format!("/element/{}/text", element.id()),
                None,
            )
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    pub async fn attribute(&self, element: &ElementRef, name: &str) -> Result<Option<String>> {
        let value = self
            .command(
                "Element attribute",
                Method::GET,
                &format!("/element/{}/attribute/{}", element.id(), name),
                None,
            )
            .await?;
        Ok(value.as_str().map(|s| s.to_string()))
    }

    /// Live DOM property, which for form fields reflects script-set values
    /// that the markup attribute does not.
    pub async fn property(&self, element: &ElementRef, name: &str) -> Result<Option<String>> {
        let value = self
            .command(
                "Element property",
                Method::GET,
                &format!("/element/{}/property/{}", element.id(), name),
                None,
            )
            .await?;
        Ok(match value {
            Value::Null => None,
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        })
    }

    /// Displayed state; stale or vanished elements count as hidden.
    pub async fn is_displayed(&self, element: &ElementRef) -> Result<bool> {
        match self
            .send(Method::GET, &format!("/element/{}/displayed", element.id()), None)
            .await
        {
            Ok(value) => Ok(value.as_bool().unwrap_or(false)),
            Err(e) if e.is("stale element reference") || e.is("no such element") => Ok(false),
            Err(e) => Err(e.into_error("Element displayed")),
        }
    }

    pub async fn is_enabled(&self, element: &ElementRef) -> Result<bool> {
        match self
            .send(Method::GET, &format!("/element/{}/enabled", element.id()), None)
            .await
        {
            Ok(value) => Ok(value.as_bool().unwrap_or(false)),
            Err(e) if e.is("stale element reference") || e.is("no such element") => Ok(false),
            Err(e) => Err(e.into_error("Element enabled")),
        }
    }

    /// End the session; the browser window closes with it.
    pub async fn delete_session(&self) -> Result<()> {
        if let Err(e) = self.send(Method::DELETE, "", None).await {
            warn!(session_id = %self.session_id, error = ?e, "Failed to delete WebDriver session");
            return Err(e.into_error("Delete session"));
        }
        debug!(session_id = %self.session_id, "WebDriver session deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_wire_format() {
        assert_eq!(
            Locator::Css("#mh-search-input").to_json(),
            json!({"using": "css selector", "value": "#mh-search-input"})
        );
        assert_eq!(
            Locator::TagName("html").to_json(),
            json!({"using": "tag name", "value": "html"})
        );
    }

    #[test]
    fn test_element_reference_extraction() {
        let value = json!({ ELEMENT_KEY: "f.1.d.e-42" });
        assert_eq!(element_from_value(&value).unwrap().id(), "f.1.d.e-42");
        assert!(element_from_value(&json!({"ELEMENT": "legacy"})).is_none());
    }

    #[test]
    fn test_wire_error_codes() {
        let err = WireError::Driver {
            error: "no such element".to_string(),
            message: "Unable to locate element".to_string(),
        };
        assert!(err.is("no such element"));
        assert!(!err.is("timeout"));
        let msg = err.into_error("Find element").to_string();
        assert!(msg.contains("Find element failed: no such element"));
        assert!(!WireError::Http("refused".to_string()).is("no such element"));
    }
}
