use reqwest::StatusCode;
use serde::Deserialize;
use serde::Serialize;

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Deserialize, Clone)]
pub(crate) struct RefreshResponse {
    pub(crate) access: String,
    /// Present only when the server rotated the refresh token.
    pub(crate) refresh: Option<String>,
}

/// Why a refresh cycle settled without a usable access token. Cloneable so
/// every caller attached to the same in-flight refresh receives it.
#[derive(Clone, Debug)]
pub(crate) enum RefreshFailure {
    MissingRefreshToken,
    Rejected(StatusCode),
    Transport(String),
    Abandoned,
}

impl std::fmt::Display for RefreshFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingRefreshToken => write!(f, "no refresh token is stored"),
            Self::Rejected(status) => write!(f, "refresh endpoint returned {status}"),
            Self::Transport(message) => write!(f, "{message}"),
            Self::Abandoned => write!(f, "refresh was abandoned before completing"),
        }
    }
}

/// Exchanges the refresh token for a new access token. Any non-2xx status or
/// malformed body counts as a refresh failure.
pub(crate) async fn try_refresh_token(
    http: &reqwest::Client,
    base_url: &str,
    refresh_token: &str,
) -> Result<RefreshResponse, RefreshFailure> {
    let response = http
        .post(format!("{base_url}/api/token/refresh/"))
        .json(&RefreshRequest {
            refresh: refresh_token,
        })
        .send()
        .await
        .map_err(|err| RefreshFailure::Transport(err.to_string()))?;

    if response.status().is_success() {
        response
            .json::<RefreshResponse>()
            .await
            .map_err(|err| RefreshFailure::Transport(format!("malformed refresh response: {err}")))
    } else {
        Err(RefreshFailure::Rejected(response.status()))
    }
}
