mod api;
mod api_client;
mod config;
mod error;
mod refresh;
mod single_flight;
mod token_store;

pub use api::QueryResponse;
pub use api::RegisterResponse;
pub use api_client::ApiClient;
pub use config::Config;
pub use config::DEALA_API_URL_ENV_VAR;
pub use config::DEALA_HOME_ENV_VAR;
pub use error::ApiError;
pub use error::Result;
pub use token_store::TokenStore;
