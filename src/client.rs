//! HTTP client for the student API, used by the `sms` binary.
//!
//! Wraps reqwest with bearer-token handling and a small freshness cache
//! for GET results. Any mutation on the student family invalidates the
//! whole `students:` key space.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use reqwest::{multipart, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::types::{
    AuthResponse, ImportResult, Student, StudentsListResponse, User,
};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("not authenticated, run login first")]
    Unauthorized,
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// GET results keyed by (operation, normalized parameters), kept only
/// while fresh.
struct QueryCache {
    entries: HashMap<String, (Instant, Value)>,
    ttl: Duration,
}

impl QueryCache {
    fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    fn get(&self, key: &str) -> Option<Value> {
        let (at, value) = self.entries.get(key)?;
        if at.elapsed() < self.ttl {
            Some(value.clone())
        } else {
            None
        }
    }

    fn put(&mut self, key: String, value: Value) {
        self.entries.insert(key, (Instant::now(), value));
    }

    fn invalidate_prefix(&mut self, prefix: &str) {
        self.entries.retain(|k, _| !k.starts_with(prefix));
    }
}

/// Sorted key=value pairs so equivalent queries share a cache entry.
fn cache_key(operation: &str, params: &[(&str, &str)]) -> String {
    let mut pairs: Vec<String> = params
        .iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| format!("{}={}", k, v))
        .collect();
    pairs.sort();
    format!("students:{}:{}", operation, pairs.join("&"))
}

const CACHE_TTL: Duration = Duration::from_secs(30);

pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
    token: Option<String>,
    cache: QueryCache,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            token: None,
            cache: QueryCache::new(CACHE_TTL),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// Decode a response, mapping 401 to Unauthorized (and dropping the
    /// now-useless token) and other error statuses to the server message.
    async fn handle(&mut self, response: reqwest::Response) -> Result<Value, ClientError> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            self.token = None;
            return Err(ClientError::Unauthorized);
        }
        if status == StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }
        let body: Value = response.json().await?;
        if status.is_success() {
            return Ok(body);
        }
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("request failed")
            .to_string();
        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn get_cached<T: DeserializeOwned>(
        &mut self,
        key: String,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ClientError> {
        if let Some(hit) = self.cache.get(&key) {
            return Ok(serde_json::from_value(hit)?);
        }
        let query: Vec<(&str, &str)> =
            query.iter().filter(|(_, v)| !v.is_empty()).copied().collect();
        let request = self.authed(self.http.get(self.url(path)).query(&query));
        let body = self.handle(request.send().await?).await?;
        self.cache.put(key, body.clone());
        Ok(serde_json::from_value(body)?)
    }

    pub async fn login(&mut self, email: &str, password: &str) -> Result<AuthResponse, ClientError> {
        let request = self
            .http
            .post(self.url("/api/auth/login"))
            .json(&serde_json::json!({ "email": email, "password": password }));
        let body = self.handle(request.send().await?).await?;
        let auth: AuthResponse = serde_json::from_value(body)?;
        self.token = Some(auth.token.clone());
        Ok(auth)
    }

    pub async fn me(&mut self) -> Result<User, ClientError> {
        let request = self.authed(self.http.get(self.url("/api/auth/me")));
        let body = self.handle(request.send().await?).await?;
        Ok(serde_json::from_value(body)?)
    }

    pub async fn logout(&mut self) -> Result<(), ClientError> {
        let request = self.authed(self.http.post(self.url("/api/auth/logout")));
        self.handle(request.send().await?).await?;
        self.token = None;
        Ok(())
    }

    pub async fn list_students(
        &mut self,
        page: i64,
        limit: i64,
        search: &str,
        status: &str,
        grade: &str,
    ) -> Result<StudentsListResponse, ClientError> {
        let page = page.to_string();
        let limit = limit.to_string();
        let query = [
            ("page", page.as_str()),
            ("limit", limit.as_str()),
            ("search", search),
            ("status", status),
            ("grade", grade),
        ];
        let key = cache_key("list", &query);
        self.get_cached(key, "/api/students", &query).await
    }

    pub async fn get_student(&mut self, id: &str) -> Result<Student, ClientError> {
        let key = cache_key("get", &[("id", id)]);
        let path = format!("/api/students/{}", id);
        self.get_cached(key, &path, &[]).await
    }

    pub async fn create_student(&mut self, payload: Value) -> Result<Student, ClientError> {
        let request = self
            .authed(self.http.post(self.url("/api/students")))
            .json(&payload);
        let body = self.handle(request.send().await?).await?;
        self.cache.invalidate_prefix("students:");
        Ok(serde_json::from_value(body)?)
    }

    pub async fn update_student(&mut self, id: &str, payload: Value) -> Result<Student, ClientError> {
        let request = self
            .authed(self.http.patch(self.url(&format!("/api/students/{}", id))))
            .json(&payload);
        let body = self.handle(request.send().await?).await?;
        self.cache.invalidate_prefix("students:");
        Ok(serde_json::from_value(body)?)
    }

    pub async fn delete_student(&mut self, id: &str) -> Result<(), ClientError> {
        let request = self.authed(
            self.http
                .delete(self.url(&format!("/api/students/{}", id))),
        );
        self.handle(request.send().await?).await?;
        self.cache.invalidate_prefix("students:");
        Ok(())
    }

    pub async fn import_students(
        &mut self,
        file_name: &str,
        data: Vec<u8>,
    ) -> Result<ImportResult, ClientError> {
        let part = multipart::Part::bytes(data)
            .file_name(file_name.to_string())
            .mime_str("text/csv")
            .map_err(ClientError::Http)?;
        let form = multipart::Form::new().part("file", part);
        let request = self
            .authed(self.http.post(self.url("/api/students/import")))
            .multipart(form);
        let body = self.handle(request.send().await?).await?;
        self.cache.invalidate_prefix("students:");
        Ok(serde_json::from_value(body)?)
    }

    /// Raw CSV text; never cached.
    pub async fn export_students(
        &mut self,
        search: &str,
        status: &str,
        grade: &str,
    ) -> Result<String, ClientError> {
        let query: Vec<(&str, &str)> = [("search", search), ("status", status), ("grade", grade)]
            .into_iter()
            .filter(|(_, v)| !v.is_empty())
            .collect();
        let request = self.authed(self.http.get(self.url("/api/students/export")).query(&query));
        let response = request.send().await?;
        let status_code = response.status();
        if status_code == StatusCode::UNAUTHORIZED {
            self.token = None;
            return Err(ClientError::Unauthorized);
        }
        if !status_code.is_success() {
            let body: Value = response.json().await?;
            let message = body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("request failed")
                .to_string();
            return Err(ClientError::Api {
                status: status_code.as_u16(),
                message,
            });
        }
        Ok(response.text().await?)
    }
}
