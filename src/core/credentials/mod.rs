pub mod credential_models;
pub mod credential_store;
pub mod oauth_provider;
pub mod token_manager;

pub use credential_models::{ClientSecrets, CredentialRecord, RefreshedToken};
pub use credential_store::{TokenStore, TokenStoreError};
pub use oauth_provider::{OAuthError, OAuthProvider};
pub use token_manager::{CredentialSource, TokenError, TokenManager};
