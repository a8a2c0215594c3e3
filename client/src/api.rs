use serde::Deserialize;
use serde_json::Value;
use serde_json::json;

use crate::api_client::ApiClient;
use crate::api_client::RequestSpec;
use crate::error::ApiError;
use crate::error::Result;

#[derive(Deserialize)]
struct TokenPairResponse {
    access: String,
    refresh: String,
}

#[derive(Deserialize)]
struct SubscriptionResponse {
    is_subscribed: bool,
}

#[derive(Deserialize)]
struct CheckoutResponse {
    checkout_url: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct RegisterResponse {
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Deserialize)]
struct VerifyEmailResponse {
    message: Option<String>,
}

/// Assistant reply to one search query. `response` is the free-form text the
/// deal parser consumes; `deals` carries any records the server already
/// structured itself.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub response: String,

    #[serde(default)]
    pub deals: Vec<Value>,

    #[serde(default)]
    pub conversation_id: Option<Value>,

    #[serde(default)]
    pub message_id: Option<Value>,
}

impl ApiClient {
    /// Exchanges credentials for a token pair and persists it.
    pub async fn login(&self, email: &str, password: &str) -> Result<()> {
        let spec = RequestSpec::post(
            "/api/token/",
            json!({ "email": email, "password": password }),
        );
        let response = self.execute(spec).await?;
        let pair: TokenPairResponse = response
            .json()
            .await
            .map_err(|err| ApiError::UnexpectedResponse(err.to_string()))?;
        self.token_store()
            .set_tokens(&pair.access, Some(&pair.refresh))?;
        Ok(())
    }

    /// Creates an account. The server sends a verification email before the
    /// first login is accepted.
    pub async fn register(&self, email: &str, password: &str) -> Result<RegisterResponse> {
        let spec = RequestSpec::post(
            "/api/user/register/",
            json!({ "email": email, "password": password }),
        );
        let response = self.execute(spec).await?;
        response
            .json()
            .await
            .map_err(|err| ApiError::UnexpectedResponse(err.to_string()))
    }

    /// Confirms the address behind an emailed verification token. Returns
    /// the server's confirmation message; a body without one is treated as
    /// a failed verification.
    pub async fn verify_email(&self, token: &str) -> Result<String> {
        let spec = RequestSpec::get(format!("/api/verify-email/{token}/"));
        let response = self.execute(spec).await?;
        let verification: VerifyEmailResponse = response
            .json()
            .await
            .map_err(|err| ApiError::UnexpectedResponse(err.to_string()))?;
        verification.message.ok_or_else(|| {
            ApiError::UnexpectedResponse("verification response had no message".to_string())
        })
    }

    pub async fn check_subscription(&self) -> Result<bool> {
        let response = self.execute(RequestSpec::get("/api/check-subscription/")).await?;
        let subscription: SubscriptionResponse = response
            .json()
            .await
            .map_err(|err| ApiError::UnexpectedResponse(err.to_string()))?;
        Ok(subscription.is_subscribed)
    }

    /// Starts a checkout for the given plan variant and returns the URL the
    /// caller should open. What happens on that page is not our concern.
    pub async fn create_checkout(&self, variant_id: &str) -> Result<String> {
        let spec = RequestSpec::post("/api/create-checkout/", json!({ "variant_id": variant_id }));
        let response = self.execute(spec).await?;
        let checkout: CheckoutResponse = response
            .json()
            .await
            .map_err(|err| ApiError::UnexpectedResponse(err.to_string()))?;
        Ok(checkout.checkout_url)
    }

    /// Sends one deal-search query, threading the conversation id from the
    /// previous reply when there is one.
    pub async fn user_query(
        &self,
        query: &str,
        conversation_id: Option<&Value>,
    ) -> Result<QueryResponse> {
        let spec = RequestSpec::post(
            "/api/user-query/",
            json!({ "query": query, "conversation_id": conversation_id }),
        );
        let response = self.execute(spec).await?;
        response
            .json()
            .await
            .map_err(|err| ApiError::UnexpectedResponse(err.to_string()))
    }

    /// Local only: drops the stored token pair. Returns true if credentials
    /// were present.
    pub fn logout(&self) -> Result<bool> {
        Ok(self.token_store().clear()?)
    }
}
