// The infra module contains implementations of core traits.
// Each feature implementation goes in its own submodule.

#[path = "gmail/gmail_api_client.rs"]
pub mod gmail;

#[path = "google_oauth/google_oauth_client.rs"]
pub mod google_oauth;

#[path = "token_store/json_token_store.rs"]
pub mod token_store;
