pub mod auth;
pub mod client;
pub mod error;
pub mod types;

pub use auth::{AuthSession, Authenticator};
pub use client::{ApiResponse, RequestOptions, ScreeningClient};
pub use error::ApiError;
pub use types::{Credentials, RemoteId, VerificationRecord};
