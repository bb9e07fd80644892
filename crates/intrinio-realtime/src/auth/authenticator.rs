/*
[INPUT]:  Username/password and the provider's auth endpoint
[OUTPUT]: Bearer token for one connect cycle
[POS]:    Auth layer - credential exchange over HTTP Basic
[UPDATE]: When the auth endpoint contract changes
*/

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, header};
use tracing::{debug, warn};
use url::Url;

use crate::error::{RealtimeError, Result};
use crate::types::{Credentials, Token};

/// Exchanges credentials for a bearer token.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn fetch_token(&self) -> Result<Token>;
}

/// Authenticator calling the provider's auth endpoint with HTTP Basic credentials.
#[derive(Debug, Clone)]
pub struct HttpAuthenticator {
    http_client: Client,
    auth_url: Url,
    credentials: Credentials,
}

impl HttpAuthenticator {
    pub fn new(auth_url: Url, credentials: Credentials, timeout: Duration) -> Result<Self> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            auth_url,
            credentials,
        })
    }
}

#[async_trait]
impl Authenticator for HttpAuthenticator {
    /// GET {auth_url} with basic auth; a 200 body is the token.
    async fn fetch_token(&self) -> Result<Token> {
        debug!(url = %self.auth_url, "requesting realtime token");

        let response = self
            .http_client
            .get(self.auth_url.clone())
            .header(header::CONTENT_TYPE, "application/json")
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            warn!(status = status.as_u16(), "realtime token request rejected");
            return Err(RealtimeError::auth(status, "Auth failed."));
        }

        let body = response.text().await?;
        debug!(bytes = body.len(), "realtime token received");
        Ok(Token::new(body))
    }
}
