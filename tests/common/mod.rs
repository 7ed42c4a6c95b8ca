#![allow(dead_code)]
//! Shared test support: a stateful fake blob store served through wiremock,
//! plus config/state builders.

use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use warmeleads_api::config::Config;
use wiremock::matchers::any;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// In-memory blob store behind a wiremock server, speaking the same HTTP
/// contract as the real store: prefix listing, content fetch by URL,
/// conditional puts keyed on the stored record's `version`, and deletes.
#[derive(Clone, Default)]
pub struct FakeBlobStore {
    blobs: Arc<Mutex<BTreeMap<String, String>>>,
    base_url: Arc<Mutex<String>>,
}

impl FakeBlobStore {
    pub async fn start() -> (MockServer, FakeBlobStore) {
        let server = MockServer::start().await;
        let fake = FakeBlobStore::default();
        *fake.base_url.lock().unwrap() = server.uri();
        Mock::given(any())
            .respond_with(fake.clone())
            .mount(&server)
            .await;
        (server, fake)
    }

    /// All stored pathnames, sorted.
    pub fn paths(&self) -> Vec<String> {
        self.blobs.lock().unwrap().keys().cloned().collect()
    }

    pub fn get(&self, path: &str) -> Option<Value> {
        self.blobs
            .lock()
            .unwrap()
            .get(path)
            .and_then(|body| serde_json::from_str(body).ok())
    }

    /// Seeds a blob directly, bypassing version checks (pre-existing data).
    pub fn seed(&self, path: &str, body: &str) {
        self.blobs
            .lock()
            .unwrap()
            .insert(path.to_string(), body.to_string());
    }

    fn content_url(&self, path: &str) -> String {
        format!("{}/content/{}", self.base_url.lock().unwrap(), path)
    }

    fn stored_version(body: &str) -> Option<u64> {
        serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| v.get("version").and_then(|v| v.as_u64()))
    }
}

impl Respond for FakeBlobStore {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let path = request.url.path().to_string();
        match request.method.as_str() {
            "GET" if path == "/list" => {
                let prefix = request
                    .url
                    .query_pairs()
                    .find(|(k, _)| k == "prefix")
                    .map(|(_, v)| v.to_string())
                    .unwrap_or_default();
                let blobs: Vec<Value> = self
                    .blobs
                    .lock()
                    .unwrap()
                    .keys()
                    .filter(|k| k.starts_with(&prefix))
                    .map(|k| json!({"pathname": k, "url": self.content_url(k)}))
                    .collect();
                ResponseTemplate::new(200).set_body_json(json!({ "blobs": blobs }))
            }
            "GET" if path.starts_with("/content/") => {
                let key = path.trim_start_matches("/content/");
                match self.blobs.lock().unwrap().get(key) {
                    Some(body) => ResponseTemplate::new(200).set_body_string(body.clone()),
                    None => ResponseTemplate::new(404),
                }
            }
            "PUT" => {
                let key = path.trim_start_matches('/').to_string();
                let mut blobs = self.blobs.lock().unwrap();
                let current_version = blobs.get(&key).and_then(|b| Self::stored_version(b));
                let if_match = request
                    .headers
                    .get("if-match")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok());
                let if_none_match = request.headers.get("if-none-match").is_some();

                let precondition_ok = if if_none_match {
                    !blobs.contains_key(&key)
                } else if let Some(expected) = if_match {
                    current_version == Some(expected)
                } else {
                    true
                };
                if !precondition_ok {
                    return ResponseTemplate::new(412);
                }

                let body = String::from_utf8_lossy(&request.body).to_string();
                blobs.insert(key.clone(), body);
                ResponseTemplate::new(200)
                    .set_body_json(json!({"url": self.content_url(&key)}))
            }
            "DELETE" => {
                let key = path.trim_start_matches('/').to_string();
                match self.blobs.lock().unwrap().remove(&key) {
                    Some(_) => ResponseTemplate::new(200).set_body_json(json!({"ok": true})),
                    None => ResponseTemplate::new(404),
                }
            }
            _ => ResponseTemplate::new(404),
        }
    }
}

/// Config wired to test doubles.
pub fn test_config(blob_base_url: String, email_api_url: String) -> Config {
    Config {
        port: 8080,
        blob_base_url,
        blob_read_write_token: "test-token".to_string(),
        payment_webhook_secret: Some("test-webhook-secret".to_string()),
        email_api_url,
        email_api_key: Some("test-email-key".to_string()),
        email_from_address: "facturen@warmeleads.nl".to_string(),
        admin_email: "info@warmeleads.nl".to_string(),
        whatsapp_api_url: None,
        whatsapp_api_key: None,
    }
}
