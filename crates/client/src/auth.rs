// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Channel authorization for private and presence channels.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Deserialize;
use url::Url;

use crate::credentials::Credentials;

/// Error type for channel authorization.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The endpoint could not be reached.
    #[error("auth request failed: {0}")]
    Request(String),

    /// The endpoint answered with a non-success status.
    #[error("auth endpoint returned status {0}")]
    Status(u16),

    /// The response body had no usable `auth` field.
    #[error("auth response has no token")]
    MissingToken,

    #[error("invalid auth response: {0}")]
    Decode(String),

    /// No auth endpoint is configured.
    #[error("no auth endpoint configured")]
    NotConfigured,
}

/// Future returned by [`Authorizer::authorize`].
pub type AuthFuture<'a> = Pin<Box<dyn Future<Output = Result<String, AuthError>> + Send + 'a>>;

/// Produces the auth signature for a restricted channel.
pub trait Authorizer: Send + Sync {
    /// Authorizes `channel` for the connection identified by `socket_id`.
    fn authorize<'a>(&'a self, socket_id: &'a str, channel: &'a str) -> AuthFuture<'a>;
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    auth: Option<String>,
}

/// Builds the form body. The socket id is sent as-is, the channel name is
/// percent-encoded.
pub fn form_body(socket_id: &str, channel: &str) -> String {
    format!(
        "socket_id={}&channel_name={}",
        socket_id,
        urlencoding::encode(channel)
    )
}

/// Authorizer that POSTs to an HTTP endpoint.
pub struct HttpAuthorizer {
    client: reqwest::Client,
    endpoint: Url,
    credentials: Arc<dyn Credentials>,
}

impl HttpAuthorizer {
    pub fn new(endpoint: Url, credentials: Arc<dyn Credentials>) -> Self {
        HttpAuthorizer {
            client: reqwest::Client::new(),
            endpoint,
            credentials,
        }
    }

    async fn request(&self, socket_id: &str, channel: &str) -> Result<String, AuthError> {
        let mut request = self
            .client
            .post(self.endpoint.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(reqwest::header::ACCEPT, "application/json")
            .body(form_body(socket_id, channel));
        if let Some(token) = self.credentials.auth_token() {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AuthError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Status(status.as_u16()));
        }

        let body: AuthResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Decode(e.to_string()))?;

        body.auth
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MissingToken)
    }
}

impl Authorizer for HttpAuthorizer {
    fn authorize<'a>(&'a self, socket_id: &'a str, channel: &'a str) -> AuthFuture<'a> {
        Box::pin(async move {
            tracing::debug!(channel, "requesting channel auth");
            self.request(socket_id, channel).await
        })
    }
}

/// Authorizer used when no endpoint is configured; always fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAuthorizer;

impl Authorizer for NoAuthorizer {
    fn authorize<'a>(&'a self, _socket_id: &'a str, _channel: &'a str) -> AuthFuture<'a> {
        Box::pin(async { Err(AuthError::NotConfigured) })
    }
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
