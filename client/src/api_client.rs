use std::time::Duration;

use reqwest::Method;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::debug;
use tracing::warn;

use crate::config::Config;
use crate::error::ApiError;
use crate::error::Result;
use crate::refresh::RefreshFailure;
use crate::refresh::try_refresh_token;
use crate::single_flight::SingleFlight;
use crate::token_store::TokenStore;

/// Immutable description of one logical API call. A replay after a token
/// refresh re-sends this same descriptor; retry accounting lives in the
/// execution loop, never in the descriptor itself.
#[derive(Clone, Debug)]
pub(crate) struct RequestSpec {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) body: Option<Value>,
}

impl RequestSpec {
    pub(crate) fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            body: None,
        }
    }

    pub(crate) fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            body: Some(body),
        }
    }
}

type SessionExpiredHook = Box<dyn Fn() + Send + Sync>;

/// Authenticated HTTP client for the Deala API.
///
/// Every request carries the stored access token as a bearer credential. A
/// 401 triggers at most one concurrent refresh cycle; requests that hit a 401
/// while a refresh is pending attach to it and replay exactly once with the
/// refreshed token. A second 401 on a replayed request is fatal for that
/// call and never starts another cycle.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    tokens: TokenStore,
    refresh_gate: SingleFlight<std::result::Result<String, RefreshFailure>>,
    on_session_expired: Option<SessionExpiredHook>,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_token_store(
            config.api_base_url.clone(),
            TokenStore::with_deala_home(config.deala_home.clone()),
        )
    }

    pub fn with_token_store(base_url: impl Into<String>, tokens: TokenStore) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            http,
            base_url,
            tokens,
            refresh_gate: SingleFlight::new(),
            on_session_expired: None,
        })
    }

    /// Called once per unrecoverable auth failure, after the stored tokens
    /// have been cleared. The SPA equivalent was a hard navigation to the
    /// login page with a session-expired flag.
    pub fn set_session_expired_hook(&mut self, hook: impl Fn() + Send + Sync + 'static) {
        self.on_session_expired = Some(Box::new(hook));
    }

    pub fn token_store(&self) -> &TokenStore {
        &self.tokens
    }

    /// Sends `spec`, transparently refreshing the access token on a 401.
    /// Returns the response for any 2xx status; other statuses become
    /// `ApiError::Status` with the body attached.
    pub(crate) async fn execute(&self, spec: RequestSpec) -> Result<reqwest::Response> {
        // One refresh-triggered replay per logical request.
        const MAX_ATTEMPTS: u32 = 2;

        let mut attempt = 0;
        loop {
            attempt += 1;
            let response = self.send(&spec).await?;
            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }
            if status != StatusCode::UNAUTHORIZED {
                return Err(status_error(response).await);
            }
            if attempt >= MAX_ATTEMPTS {
                warn!("{} {} still unauthorized after refresh", spec.method, spec.path);
                return Err(status_error(response).await);
            }
            debug!(
                "401 on {} {}; refreshing access token",
                spec.method, spec.path
            );
            self.refresh_access_token().await?;
        }
    }

    async fn send(&self, spec: &RequestSpec) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url, spec.path);
        let mut request = self.http.request(spec.method.clone(), url);
        // Requests without a stored token still go out; the server is the
        // authority on whether auth was required.
        if let Some(token) = self.tokens.access_token()? {
            request = request.bearer_auth(token);
        }
        if let Some(body) = &spec.body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }

    /// Runs one refresh cycle, shared by every caller whose 401 arrived
    /// while it was pending. On success the new token pair is persisted; on
    /// failure the stored credentials are cleared and the session-expired
    /// hook fires before every attached caller rejects.
    async fn refresh_access_token(&self) -> Result<String> {
        let outcome = self
            .refresh_gate
            .run(|| self.run_refresh(), || Err(RefreshFailure::Abandoned))
            .await;
        outcome.map_err(|failure| ApiError::SessionExpired(failure.to_string()))
    }

    async fn run_refresh(&self) -> std::result::Result<String, RefreshFailure> {
        let refresh_token = self
            .tokens
            .refresh_token()
            .map_err(|err| RefreshFailure::Transport(err.to_string()))?;
        let Some(refresh_token) = refresh_token else {
            warn!("401 with no stored refresh token; clearing credentials");
            self.expire_session();
            return Err(RefreshFailure::MissingRefreshToken);
        };

        match try_refresh_token(&self.http, &self.base_url, &refresh_token).await {
            Ok(refreshed) => {
                self.tokens
                    .set_tokens(&refreshed.access, refreshed.refresh.as_deref())
                    .map_err(|err| RefreshFailure::Transport(err.to_string()))?;
                debug!("access token refreshed");
                Ok(refreshed.access)
            }
            Err(failure) => {
                warn!("token refresh failed: {failure}");
                self.expire_session();
                Err(failure)
            }
        }
    }

    fn expire_session(&self) {
        if let Err(err) = self.tokens.clear() {
            warn!("failed to clear stored credentials: {err}");
        }
        if let Some(hook) = &self.on_session_expired {
            hook();
        }
    }
}

async fn status_error(response: reqwest::Response) -> ApiError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    ApiError::Status { status, body }
}
