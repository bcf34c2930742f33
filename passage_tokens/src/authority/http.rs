//! An [`AuthApi`] that talks JSON over HTTP

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use super::{
    dto::{LoginRequest, LoginResponse, RefreshRequest, RefreshResponse, UserProfile},
    endpoints, AuthApi, AuthApiError,
};
use crate::{config::ApiConfig, AccessTokenRef, ConfigError, RefreshTokenRef};

/// The authority's REST API, reached through `reqwest`
#[derive(Clone, Debug)]
pub struct HttpAuthApi {
    client: reqwest::Client,
    base_url: reqwest::Url,
}

impl HttpAuthApi {
    /// Constructs a new API client
    ///
    /// Endpoint paths are joined onto `base_url`, which should end in `/`
    /// if it carries a path prefix.
    pub fn new(client: reqwest::Client, base_url: reqwest::Url) -> Self {
        Self { client, base_url }
    }

    /// Constructs an API client with an HTTP client built from `config`
    pub fn from_config(config: &ApiConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent())
            .build()
            .map_err(ConfigError::Client)?;

        Ok(Self::new(client, config.base_url().clone()))
    }

    /// The base URL endpoints are resolved against
    pub fn base_url(&self) -> &reqwest::Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<reqwest::Url, AuthApiError> {
        self.base_url
            .join(path)
            .map_err(|e| AuthApiError::RequestSend(e.into()))
    }
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    #[tracing::instrument(
        err,
        skip(self, request),
        fields(base_url = %self.base_url, email = %request.email),
    )]
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, AuthApiError> {
        tracing::trace!("requesting login from authority");
        let url = self.endpoint(endpoints::LOGIN)?;
        let resp: LoginResponse = send(self.client.post(url).json(request)).await?;

        tracing::info!(
            user.id = %resp.user.id,
            lifetime = resp.expires_in,
            "authority accepted login"
        );

        Ok(resp)
    }

    #[tracing::instrument(err, skip(self, refresh_token), fields(base_url = %self.base_url))]
    async fn refresh(
        &self,
        refresh_token: &RefreshTokenRef,
    ) -> Result<RefreshResponse, AuthApiError> {
        tracing::trace!("requesting token refresh from authority");
        let url = self.endpoint(endpoints::REFRESH)?;
        let resp: RefreshResponse =
            send(self.client.post(url).json(&RefreshRequest { refresh_token })).await?;

        tracing::info!(
            has_refresh_token = resp.refresh_token.is_some(),
            lifetime = resp.expires_in,
            "received refreshed tokens"
        );

        Ok(resp)
    }

    #[tracing::instrument(err, skip(self, access_token), fields(base_url = %self.base_url))]
    async fn fetch_profile(
        &self,
        access_token: &AccessTokenRef,
    ) -> Result<UserProfile, AuthApiError> {
        let url = self.endpoint(endpoints::PROFILE)?;
        send(self.client.get(url).bearer_auth(access_token.as_str())).await
    }
}

async fn send<T: DeserializeOwned>(req: reqwest::RequestBuilder) -> Result<T, AuthApiError> {
    let resp = req
        .send()
        .await
        .map_err(|e| AuthApiError::RequestSend(e.into()))?;

    let status = resp.status();
    tracing::debug!(
        response.status = status.as_u16(),
        "received response from authority"
    );

    if !status.is_success() {
        let body = resp
            .text()
            .await
            .map_err(|e| AuthApiError::BodyRead(e.into()))?;
        return Err(AuthApiError::Status {
            status: status.as_u16(),
            body,
        });
    }

    let body = resp
        .bytes()
        .await
        .map_err(|e| AuthApiError::BodyRead(e.into()))?;

    serde_json::from_slice(&body).map_err(|e| AuthApiError::Malformed(e.into()))
}
