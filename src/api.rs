use crate::filters::ArticleFilters;
use crate::model::{
    Article, ArticleRequest, AuthResponse, LoginRequest, Page, RegisterRequest,
    UpdateProfileRequest, UserProfile,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not found")]
    NotFound,
    #[error("not authenticated; log in again")]
    Unauthenticated,
    #[error("permission denied: {0}")]
    Forbidden(String),
    #[error("request failed ({status}): {message}")]
    Request { status: u16, message: String },
    #[error("could not reach the server: {0}")]
    Transport(String),
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Map an HTTP error status and body to an error
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            401 => Self::Unauthenticated,
            403 => Self::Forbidden(
                error_message(body).unwrap_or_else(|| "access denied".to_string()),
            ),
            404 => Self::NotFound,
            _ => Self::Request {
                status,
                message: error_message(body).unwrap_or_else(|| "request failed".to_string()),
            },
        }
    }
}

/// Pull a readable message out of an error body.
/// Understands `{"message": ...}`, `{"errors": [{"defaultMessage": ...}]}`
/// and `{"error": ...}`; anything else is used as plain text.
pub fn error_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }

    if let Ok(json) = serde_json::from_str::<Value>(body) {
        if let Some(msg) = json.get("message").and_then(|v| v.as_str()) {
            return Some(msg.to_string());
        }
        if let Some(errors) = json.get("errors").and_then(|v| v.as_array()) {
            let joined = errors
                .iter()
                .filter_map(|e| e.get("defaultMessage").and_then(|m| m.as_str()))
                .collect::<Vec<_>>()
                .join(", ");
            if !joined.is_empty() {
                return Some(joined);
            }
        }
        if let Some(msg) = json.get("error").and_then(|v| v.as_str()) {
            return Some(msg.to_string());
        }
    }

    Some(body.to_string())
}

/// Operations of the blog REST API. Implemented over HTTP by [`Client`];
/// tests substitute an in-memory fake.
pub trait BlogApi {
    fn login(&self, username: &str, password: &str) -> Result<AuthResponse, ApiError>;
    fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ApiError>;
    fn list_articles(
        &self,
        filters: &ArticleFilters,
        token: Option<&str>,
    ) -> Result<Page<Article>, ApiError>;
    /// Category names; empty when the request fails
    fn categories(&self) -> Vec<String>;
    fn get_article(&self, id: i64, token: Option<&str>) -> Result<Article, ApiError>;
    fn create_article(&self, request: &ArticleRequest, token: &str) -> Result<Article, ApiError>;
    fn update_article(
        &self,
        id: i64,
        request: &ArticleRequest,
        token: &str,
    ) -> Result<Article, ApiError>;
    fn delete_article(&self, id: i64, token: &str) -> Result<(), ApiError>;
    fn profile(&self, token: &str) -> Result<UserProfile, ApiError>;
    fn update_profile(
        &self,
        request: &UpdateProfileRequest,
        token: &str,
    ) -> Result<UserProfile, ApiError>;
}

pub struct Client {
    base_url: String,
    agent: ureq::Agent,
}

impl Client {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }

    fn request(&self, method: &str, path: &str, token: Option<&str>) -> ureq::Request {
        let url = format!("{}{}", self.base_url, path);
        let req = self
            .agent
            .request(method, &url)
            .set("Accept", "application/json");
        match token {
            Some(token) => req.set("Authorization", &format!("Bearer {}", token)),
            None => req,
        }
    }

    fn send(&self, req: ureq::Request, body: Option<Value>) -> Result<ureq::Response, ApiError> {
        let method = req.method().to_string();
        let url = req.url().to_string();

        let result = match body {
            Some(body) => req.send_json(body),
            None => req.call(),
        };

        match result {
            Ok(resp) => {
                debug!(%method, %url, status = resp.status(), "api request");
                Ok(resp)
            }
            Err(ureq::Error::Status(code, resp)) => {
                let body = resp.into_string().unwrap_or_default();
                debug!(%method, %url, status = code, "api request failed");
                Err(ApiError::from_status(code, &body))
            }
            Err(e) => {
                warn!(%method, %url, error = %e, "api transport error");
                Err(ApiError::Transport(e.to_string()))
            }
        }
    }

    fn send_body<B: serde::Serialize>(
        &self,
        req: ureq::Request,
        body: &B,
    ) -> Result<ureq::Response, ApiError> {
        let value = serde_json::to_value(body).map_err(|e| ApiError::Decode(e.to_string()))?;
        self.send(req, Some(value))
    }
}

fn decode<T: DeserializeOwned>(resp: ureq::Response) -> Result<T, ApiError> {
    let text = resp
        .into_string()
        .map_err(|e| ApiError::Transport(e.to_string()))?;
    if text.trim().is_empty() {
        return Err(ApiError::Decode("empty response body".to_string()));
    }
    serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))
}

impl BlogApi for Client {
    fn login(&self, username: &str, password: &str) -> Result<AuthResponse, ApiError> {
        let req = self.request("POST", "/auth/login", None);
        let resp = self.send_body(req, &LoginRequest { username, password })?;
        decode(resp)
    }

    fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ApiError> {
        let req = self.request("POST", "/auth/register", None);
        decode(self.send_body(req, request)?)
    }

    fn list_articles(
        &self,
        filters: &ArticleFilters,
        token: Option<&str>,
    ) -> Result<Page<Article>, ApiError> {
        let mut req = self.request("GET", "/articles", token);
        for (key, value) in filters.query_pairs() {
            req = req.query(key, &value);
        }
        decode(self.send(req, None)?)
    }

    fn categories(&self) -> Vec<String> {
        let req = self.request("GET", "/articles/categories", None);
        match self.send(req, None).and_then(decode::<Vec<String>>) {
            Ok(categories) => categories,
            Err(e) => {
                debug!(error = %e, "categories unavailable");
                Vec::new()
            }
        }
    }

    fn get_article(&self, id: i64, token: Option<&str>) -> Result<Article, ApiError> {
        let req = self.request("GET", &format!("/articles/{}", id), token);
        decode(self.send(req, None)?)
    }

    fn create_article(&self, request: &ArticleRequest, token: &str) -> Result<Article, ApiError> {
        let req = self.request("POST", "/articles", Some(token));
        decode(self.send_body(req, request)?)
    }

    fn update_article(
        &self,
        id: i64,
        request: &ArticleRequest,
        token: &str,
    ) -> Result<Article, ApiError> {
        let req = self.request("PUT", &format!("/articles/{}", id), Some(token));
        decode(self.send_body(req, request)?)
    }

    fn delete_article(&self, id: i64, token: &str) -> Result<(), ApiError> {
        let req = self.request("DELETE", &format!("/articles/{}", id), Some(token));
        self.send(req, None)?;
        Ok(())
    }

    fn profile(&self, token: &str) -> Result<UserProfile, ApiError> {
        let req = self.request("GET", "/users/me", Some(token));
        decode(self.send(req, None)?)
    }

    fn update_profile(
        &self,
        request: &UpdateProfileRequest,
        token: &str,
    ) -> Result<UserProfile, ApiError> {
        let req = self.request("PUT", "/users/me", Some(token));
        decode(self.send_body(req, request)?)
    }
}
