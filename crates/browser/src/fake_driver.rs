//! In-process WebDriver endpoint serving scripted pages, for page-flow tests.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;

use crate::webdriver::ELEMENT_KEY;

const SESSION_ID: &str = "fake-session";

/// One element on a scripted page, matched by exact CSS selector.
#[derive(Debug, Clone, Default)]
pub struct FakeElement {
    pub id: &'static str,
    pub css: &'static str,
    pub text: &'static str,
    pub attributes: Vec<(&'static str, &'static str)>,
    pub properties: Vec<(&'static str, &'static str)>,
    /// Page loaded when this element is clicked.
    pub leads_to: Option<Vec<FakeElement>>,
}

impl FakeElement {
    pub fn new(id: &'static str, css: &'static str) -> Self {
        Self {
            id,
            css,
            ..Default::default()
        }
    }

    pub fn text(mut self, text: &'static str) -> Self {
        self.text = text;
        self
    }

    pub fn attribute(mut self, name: &'static str, value: &'static str) -> Self {
        self.attributes.push((name, value));
        self
    }

    pub fn property(mut self, name: &'static str, value: &'static str) -> Self {
        self.properties.push((name, value));
        self
    }

    pub fn leads_to(mut self, page: Vec<FakeElement>) -> Self {
        self.leads_to = Some(page);
        self
    }
}

/// Browser state plus a log of what the client did.
#[derive(Debug, Default)]
pub struct Script {
    page: Vec<FakeElement>,
    /// Bumped on every page load so `<html>` gets a fresh reference.
    generation: u32,
    pub navigations: Vec<String>,
    pub clicks: Vec<String>,
    pub typed: Vec<String>,
    pub sessions_deleted: usize,
}

type Reply = (StatusCode, Value);

fn ok(value: Value) -> Reply {
    (StatusCode::OK, json!({ "value": value }))
}

fn wire_error(status: StatusCode, error: &str, message: String) -> Reply {
    (
        status,
        json!({ "value": { "error": error, "message": message, "stacktrace": "" } }),
    )
}

impl Script {
    fn element(&self, id: &str) -> Result<&FakeElement, Reply> {
        self.page.iter().find(|el| el.id == id).ok_or_else(|| {
            wire_error(
                StatusCode::NOT_FOUND,
                "stale element reference",
                format!("element {} is not on the current page", id),
            )
        })
    }

    fn find(&self, body: &Value) -> Reply {
        let using = body["using"].as_str().unwrap_or_default();
        let value = body["value"].as_str().unwrap_or_default();

        if using == "tag name" && value == "html" {
            return ok(json!({ ELEMENT_KEY: format!("html-{}", self.generation) }));
        }

        let wanted: Vec<&str> = value.split(',').map(str::trim).collect();
        match self.page.iter().find(|el| wanted.contains(&el.css)) {
            Some(el) => ok(json!({ ELEMENT_KEY: el.id })),
            None => wire_error(
                StatusCode::NOT_FOUND,
                "no such element",
                format!("Unable to locate element: {}", value),
            ),
        }
    }

    fn click(&mut self, id: &str) -> Reply {
        let next = match self.element(id) {
            Ok(el) => el.leads_to.clone(),
            Err(reply) => return reply,
        };
        self.clicks.push(id.to_string());
        if let Some(page) = next {
            self.page = page;
            self.generation += 1;
        }
        ok(Value::Null)
    }

    fn respond(&mut self, method: &Method, path: &str, body: &Value) -> Reply {
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

        match (method.as_str(), segments.as_slice()) {
            ("POST", ["session"]) => ok(json!({ "sessionId": SESSION_ID, "capabilities": {} })),
            ("DELETE", ["session", _]) => {
                self.sessions_deleted += 1;
                ok(Value::Null)
            }
            ("POST", ["session", _, "url"]) => {
                self.navigations
                    .push(body["url"].as_str().unwrap_or_default().to_string());
                self.generation += 1;
                ok(Value::Null)
            }
            ("POST", ["session", _, "element"]) => self.find(body),
            ("POST", ["session", _, "element", id, "click"]) => self.click(id),
            ("POST", ["session", _, "element", id, "value"]) => {
                if let Err(reply) = self.element(id) {
                    return reply;
                }
                self.typed
                    .push(body["text"].as_str().unwrap_or_default().to_string());
                ok(Value::Null)
            }
            ("GET", ["session", _, "element", id, "text"]) => match self.element(id) {
                Ok(el) => ok(json!(el.text)),
                Err(reply) => reply,
            },
            ("GET", ["session", _, "element", id, "attribute", name]) => match self.element(id) {
                Ok(el) => ok(lookup(&el.attributes, name)),
                Err(reply) => reply,
            },
            ("GET", ["session", _, "element", id, "property", name]) => match self.element(id) {
                Ok(el) => ok(lookup(&el.properties, name)),
                Err(reply) => reply,
            },
            ("GET", ["session", _, "element", id, "displayed" | "enabled"]) => {
                match self.element(id) {
                    Ok(_) => ok(json!(true)),
                    Err(reply) => reply,
                }
            }
            _ => wire_error(
                StatusCode::NOT_FOUND,
                "unknown command",
                format!("{} {}", method, path),
            ),
        }
    }
}

fn lookup(pairs: &[(&'static str, &'static str)], name: &str) -> Value {
    pairs
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, value)| json!(value))
        .unwrap_or(Value::Null)
}

type Shared = Arc<Mutex<Script>>;

async fn handle(
    State(state): State<Shared>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let (status, value) = state.lock().unwrap().respond(&method, uri.path(), &body);
    (status, Json(value))
}

/// A running fake driver; the server stops when this is dropped.
pub struct FakeDriver {
    pub base_url: String,
    state: Shared,
    server: JoinHandle<()>,
}

impl FakeDriver {
    /// Serve `homepage` as the page every navigation lands on.
    pub async fn serve(homepage: Vec<FakeElement>) -> Self {
        let state: Shared = Arc::new(Mutex::new(Script {
            page: homepage,
            ..Default::default()
        }));
        let app = Router::new().fallback(handle).with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            state,
            server,
        }
    }

    pub fn script(&self) -> MutexGuard<'_, Script> {
        self.state.lock().unwrap()
    }
}

impl Drop for FakeDriver {
    fn drop(&mut self) {
        self.server.abort();
    }
}
