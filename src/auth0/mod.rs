pub mod client;
pub mod dto;
pub mod generator;
pub mod jwks;
pub mod validator;

pub use client::TokenClient;
pub use dto::{Claims, RefreshOutcome, TokenRequest, TokenResponse};
pub use validator::TokenValidator;
