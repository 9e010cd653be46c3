// Google's OAuth 2.0 endpoints for an installed (desktop) application.
//
// Three calls live here:
// - refresh-token grant against the client's `token_uri`
// - tokeninfo introspection to learn how long a stored access token lives
// - the loopback browser flow with PKCE for first-time authorization
//
// The loopback flow binds an ephemeral port on 127.0.0.1, sends the user to
// Google's consent page with `redirect_uri=http://localhost:<port>/`, and
// serves a one-route axum app until the redirect with the authorization code
// arrives.

use crate::core::credentials::{
    ClientSecrets, CredentialRecord, OAuthError, OAuthProvider, RefreshedToken,
};
use async_trait::async_trait;
use axum::extract::{RawQuery, State};
use axum::routing::get;
use axum::Router;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::RngCore;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};

pub const TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
/// How long the browser flow waits for the user before giving up.
pub const AUTHORIZATION_TIMEOUT: Duration = Duration::from_secs(300);

const SUCCESS_PAGE: &str =
    "The authentication flow has completed. You may close this window.";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// tokeninfo sends numbers as strings (`"expires_in": "3599"`).
#[derive(Debug, Deserialize)]
struct TokenInfo {
    #[serde(default)]
    expires_in: Option<serde_json::Value>,
}

impl TokenInfo {
    fn expires_in_secs(&self) -> Option<i64> {
        match self.expires_in.as_ref()? {
            serde_json::Value::String(s) => s.parse().ok(),
            serde_json::Value::Number(n) => n.as_i64(),
            _ => None,
        }
    }
}

pub struct GoogleOAuthClient {
    http: Client,
    tokeninfo_url: String,
    authorization_timeout: Duration,
}

impl GoogleOAuthClient {
    pub fn new() -> Result<Self, OAuthError> {
        let http = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(transport_error)?;

        Ok(Self {
            http,
            tokeninfo_url: TOKENINFO_URL.to_string(),
            authorization_timeout: AUTHORIZATION_TIMEOUT,
        })
    }

    pub fn with_tokeninfo_url(mut self, url: impl Into<String>) -> Self {
        self.tokeninfo_url = url.into();
        self
    }

    async fn post_token_form(
        &self,
        token_uri: &str,
        form: &[(&str, &str)],
    ) -> Result<TokenResponse, OAuthError> {
        let resp = self
            .http
            .post(token_uri)
            .form(form)
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_token_error(status, body));
        }

        resp.json().await.map_err(|e| {
            OAuthError::Http(format!("Malformed token response: {}", e.without_url()))
        })
    }

    /// Trades an authorization code from the browser redirect for tokens.
    async fn exchange_code(
        &self,
        secrets: &ClientSecrets,
        code: &str,
        redirect_uri: &str,
        code_verifier: &str,
    ) -> Result<TokenResponse, OAuthError> {
        self.post_token_form(
            &secrets.token_uri,
            &[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", secrets.client_id.as_str()),
                ("client_secret", secrets.client_secret.as_str()),
                ("redirect_uri", redirect_uri),
                ("code_verifier", code_verifier),
            ],
        )
        .await
    }
}

#[async_trait]
impl OAuthProvider for GoogleOAuthClient {
    async fn introspect(
        &self,
        record: &CredentialRecord,
    ) -> Result<Option<DateTime<Utc>>, OAuthError> {
        let resp = self
            .http
            .get(&self.tokeninfo_url)
            .query(&[("access_token", record.token.as_str())])
            .send()
            .await
            .map_err(transport_error)?;

        // tokeninfo answers 400 for tokens it no longer recognizes.
        if resp.status() == StatusCode::BAD_REQUEST {
            return Ok(None);
        }
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(OAuthError::Endpoint { status, body });
        }

        let info: TokenInfo = resp.json().await.map_err(|e| {
            OAuthError::Http(format!("Malformed tokeninfo response: {}", e.without_url()))
        })?;

        Ok(info
            .expires_in_secs()
            .filter(|secs| *secs > 0)
            .map(|secs| Utc::now() + ChronoDuration::seconds(secs)))
    }

    async fn refresh(&self, record: &CredentialRecord) -> Result<RefreshedToken, OAuthError> {
        let refresh_token = record
            .refresh_token
            .as_deref()
            .ok_or_else(|| OAuthError::InvalidGrant("no refresh token stored".to_string()))?;

        let token = self
            .post_token_form(
                &record.token_uri,
                &[
                    ("grant_type", "refresh_token"),
                    ("refresh_token", refresh_token),
                    ("client_id", record.client_id.as_str()),
                    ("client_secret", record.client_secret.as_str()),
                ],
            )
            .await?;

        tracing::debug!(expires_in = ?token.expires_in, "Refresh grant succeeded");

        Ok(RefreshedToken {
            expiry: expiry_from(token.expires_in),
            scopes: token.scope.as_deref().map(split_scopes),
            access_token: token.access_token,
            refresh_token: token.refresh_token,
        })
    }

    async fn authorize_interactively(
        &self,
        secrets: &ClientSecrets,
        scopes: &[String],
    ) -> Result<CredentialRecord, OAuthError> {
        let server = LocalCallbackServer::bind().await?;
        let redirect_uri = server.redirect_uri();
        let state = random_urlsafe(32);
        let pkce = PkcePair::generate();

        let auth_url = build_authorize_url(secrets, &redirect_uri, scopes, &state, &pkce.challenge)?;

        println!("Please visit this URL to authorize this application: {auth_url}");
        open_browser(auth_url.as_str());

        let code = server
            .wait_for_code(&state, self.authorization_timeout)
            .await?;
        let token = self
            .exchange_code(secrets, &code, &redirect_uri, &pkce.verifier)
            .await?;

        tracing::info!("Browser authorization completed");

        Ok(CredentialRecord {
            expiry: expiry_from(token.expires_in),
            scopes: token
                .scope
                .as_deref()
                .map(split_scopes)
                .unwrap_or_else(|| scopes.to_vec()),
            token: token.access_token,
            refresh_token: token.refresh_token,
            token_uri: secrets.token_uri.clone(),
            client_id: secrets.client_id.clone(),
            client_secret: secrets.client_secret.clone(),
        })
    }
}

/// reqwest errors print the request URL, and tokeninfo carries the access
/// token in its query string. Strip it before the text can reach a log line.
fn transport_error(err: reqwest::Error) -> OAuthError {
    OAuthError::Http(err.without_url().to_string())
}

fn classify_token_error(status: StatusCode, body: String) -> OAuthError {
    match serde_json::from_str::<TokenErrorBody>(&body) {
        Ok(err) if err.error == "invalid_grant" => {
            OAuthError::InvalidGrant(err.error_description.unwrap_or(err.error))
        }
        _ => OAuthError::Endpoint {
            status: status.as_u16(),
            body,
        },
    }
}

fn expiry_from(expires_in: Option<i64>) -> Option<DateTime<Utc>> {
    expires_in.map(|secs| Utc::now() + ChronoDuration::seconds(secs))
}

fn split_scopes(scope: &str) -> Vec<String> {
    scope.split_whitespace().map(str::to_string).collect()
}

fn random_urlsafe(byte_count: usize) -> String {
    let mut buf = vec![0u8; byte_count];
    rand::thread_rng().fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}

struct PkcePair {
    verifier: String,
    challenge: String,
}

impl PkcePair {
    fn generate() -> Self {
        // 32 random bytes encode to a 43 character verifier, the minimum length.
        Self::from_verifier(random_urlsafe(32))
    }

    fn from_verifier(verifier: String) -> Self {
        let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
        Self {
            verifier,
            challenge,
        }
    }
}

fn build_authorize_url(
    secrets: &ClientSecrets,
    redirect_uri: &str,
    scopes: &[String],
    state: &str,
    code_challenge: &str,
) -> Result<Url, OAuthError> {
    Url::parse_with_params(
        &secrets.auth_uri,
        &[
            ("response_type", "code"),
            ("client_id", secrets.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("scope", scopes.join(" ").as_str()),
            ("state", state),
            ("code_challenge", code_challenge),
            ("code_challenge_method", "S256"),
            ("access_type", "offline"),
        ],
    )
    .map_err(|e| OAuthError::Callback(format!("Invalid auth_uri {}: {e}", secrets.auth_uri)))
}

/// Best effort. The URL is always printed, so a headless host still works.
fn open_browser(url: &str) {
    let (program, args): (&str, Vec<&str>) = if cfg!(target_os = "macos") {
        ("open", vec![url])
    } else if cfg!(target_os = "windows") {
        ("cmd", vec!["/C", "start", "", url])
    } else {
        ("xdg-open", vec![url])
    };

    let spawned = std::process::Command::new(program)
        .args(&args)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn();

    if let Err(e) = spawned {
        tracing::warn!("Could not open a browser ({e}). Open the URL above manually.");
    }
}

#[derive(Debug, PartialEq, Eq)]
enum CallbackOutcome {
    Code { code: String, state: Option<String> },
    Denied(String),
    /// Not the OAuth redirect (favicon requests and the like).
    Ignored,
}

fn parse_callback_query(query: &str) -> CallbackOutcome {
    let Ok(url) = Url::parse(&format!("http://localhost/?{query}")) else {
        return CallbackOutcome::Ignored;
    };

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    match (code, error) {
        (_, Some(error)) => CallbackOutcome::Denied(error),
        (Some(code), None) => CallbackOutcome::Code { code, state },
        (None, None) => CallbackOutcome::Ignored,
    }
}

type CodeSender = oneshot::Sender<Result<String, OAuthError>>;

#[derive(Clone)]
struct CallbackState {
    expected_state: Arc<str>,
    sender: Arc<Mutex<Option<CodeSender>>>,
}

/// Listener for the OAuth redirect. Each connection is served on its own
/// task, so an idle browser preconnect cannot hold up the real redirect.
pub struct LocalCallbackServer {
    listener: TcpListener,
    port: u16,
}

impl LocalCallbackServer {
    pub async fn bind() -> Result<Self, OAuthError> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let port = listener.local_addr()?.port();
        Ok(Self { listener, port })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn redirect_uri(&self) -> String {
        format!("http://localhost:{}/", self.port)
    }

    /// Serves the redirect route and returns the authorization code. The
    /// returned `state` must match `expected_state`.
    pub async fn wait_for_code(
        self,
        expected_state: &str,
        timeout: Duration,
    ) -> Result<String, OAuthError> {
        let (code_tx, code_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let state = CallbackState {
            expected_state: Arc::from(expected_state),
            sender: Arc::new(Mutex::new(Some(code_tx))),
        };
        let app = Router::new()
            .route("/", get(handle_callback))
            .with_state(state);

        let listener = self.listener;
        tokio::spawn(async move {
            let shutdown = async move {
                let _ = shutdown_rx.await;
            };
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
            {
                tracing::debug!("Loopback server stopped: {e}");
            }
        });

        let outcome = tokio::time::timeout(timeout, code_rx).await;
        // In-flight responses still finish after this.
        let _ = shutdown_tx.send(());

        match outcome {
            Err(_) => Err(OAuthError::Timeout),
            Ok(Err(_)) => Err(OAuthError::Callback(
                "Loopback server stopped before the redirect arrived".to_string(),
            )),
            Ok(Ok(result)) => result,
        }
    }
}

async fn handle_callback(
    State(callback): State<CallbackState>,
    RawQuery(query): RawQuery,
) -> (axum::http::StatusCode, &'static str) {
    use axum::http::StatusCode as Status;

    let (status, body, result) = match parse_callback_query(query.as_deref().unwrap_or("")) {
        CallbackOutcome::Ignored => return (Status::NOT_FOUND, "Not found"),
        CallbackOutcome::Denied(error) => (
            Status::OK,
            "Authorization was not granted.",
            Err(OAuthError::Callback(format!("Authorization denied: {error}"))),
        ),
        CallbackOutcome::Code { code, state }
            if state.as_deref() == Some(&*callback.expected_state) =>
        {
            (Status::OK, SUCCESS_PAGE, Ok(code))
        }
        CallbackOutcome::Code { .. } => {
            (Status::BAD_REQUEST, "State mismatch.", Err(OAuthError::StateMismatch))
        }
    };

    match callback.sender.lock().await.take() {
        Some(sender) => {
            let _ = sender.send(result);
            (status, body)
        }
        None => (Status::GONE, "This authorization request was already handled."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn record(token_uri: String) -> CredentialRecord {
        CredentialRecord {
            token: "ya29.old".to_string(),
            refresh_token: Some("1//refresh".to_string()),
            token_uri,
            client_id: "client-id".to_string(),
            client_secret: "client-secret".to_string(),
            scopes: vec!["https://www.googleapis.com/auth/gmail.readonly".to_string()],
            expiry: None,
        }
    }

    fn secrets(token_uri: String) -> ClientSecrets {
        ClientSecrets {
            client_id: "client-id".to_string(),
            client_secret: "client-secret".to_string(),
            auth_uri: "https://accounts.google.com/o/oauth2/auth".to_string(),
            token_uri,
        }
    }

    #[test]
    fn pkce_challenge_matches_reference_vector() {
        let pair =
            PkcePair::from_verifier("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk".to_string());
        assert_eq!(pair.challenge, "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
    }

    #[test]
    fn generated_verifier_has_valid_length() {
        let pair = PkcePair::generate();
        assert!((43..=128).contains(&pair.verifier.len()));
        assert_ne!(pair.verifier, PkcePair::generate().verifier);
    }

    #[test]
    fn authorize_url_carries_flow_parameters() {
        let url = build_authorize_url(
            &secrets("https://oauth2.googleapis.com/token".to_string()),
            "http://localhost:8080/",
            &["https://www.googleapis.com/auth/gmail.readonly".to_string()],
            "state123",
            "challenge456",
        )
        .unwrap();
        let params: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();

        assert_eq!(url.host_str(), Some("accounts.google.com"));
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["client_id"], "client-id");
        assert_eq!(params["redirect_uri"], "http://localhost:8080/");
        assert_eq!(
            params["scope"],
            "https://www.googleapis.com/auth/gmail.readonly"
        );
        assert_eq!(params["state"], "state123");
        assert_eq!(params["code_challenge"], "challenge456");
        assert_eq!(params["code_challenge_method"], "S256");
        assert_eq!(params["access_type"], "offline");
    }

    #[test]
    fn callback_queries_are_classified() {
        assert_eq!(
            parse_callback_query("state=abc&code=4%2F0Ab&scope=x"),
            CallbackOutcome::Code {
                code: "4/0Ab".to_string(),
                state: Some("abc".to_string())
            }
        );
        assert_eq!(
            parse_callback_query("error=access_denied&state=abc"),
            CallbackOutcome::Denied("access_denied".to_string())
        );
        assert_eq!(parse_callback_query(""), CallbackOutcome::Ignored);
    }

    #[tokio::test]
    async fn refresh_returns_new_access_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=1%2F%2Frefresh"))
            .and(body_string_contains("client_secret=client-secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "ya29.new",
                "expires_in": 3599,
                "scope": "https://www.googleapis.com/auth/gmail.readonly",
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = GoogleOAuthClient::new().unwrap();
        let refreshed = client
            .refresh(&record(format!("{}/token", server.uri())))
            .await
            .unwrap();

        assert_eq!(refreshed.access_token, "ya29.new");
        assert!(refreshed.refresh_token.is_none());
        assert_eq!(
            refreshed.scopes,
            Some(vec![
                "https://www.googleapis.com/auth/gmail.readonly".to_string()
            ])
        );
        let expiry = refreshed.expiry.unwrap();
        assert!(expiry > Utc::now() + ChronoDuration::seconds(3500));
    }

    #[tokio::test]
    async fn revoked_refresh_token_is_invalid_grant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Token has been expired or revoked."
            })))
            .mount(&server)
            .await;

        let client = GoogleOAuthClient::new().unwrap();
        let err = client
            .refresh(&record(format!("{}/token", server.uri())))
            .await
            .unwrap_err();

        match err {
            OAuthError::InvalidGrant(reason) => {
                assert_eq!(reason, "Token has been expired or revoked.")
            }
            other => panic!("expected InvalidGrant, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn server_errors_are_not_invalid_grant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(&server)
            .await;

        let client = GoogleOAuthClient::new().unwrap();
        let err = client
            .refresh(&record(format!("{}/token", server.uri())))
            .await
            .unwrap_err();

        assert!(matches!(err, OAuthError::Endpoint { status: 503, .. }));
    }

    #[tokio::test]
    async fn refresh_without_refresh_token_fails_locally() {
        let mut rec = record("http://127.0.0.1:9/token".to_string());
        rec.refresh_token = None;

        let err = GoogleOAuthClient::new()
            .unwrap()
            .refresh(&rec)
            .await
            .unwrap_err();
        assert!(matches!(err, OAuthError::InvalidGrant(_)));
    }

    #[tokio::test]
    async fn introspect_reads_string_expires_in() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tokeninfo"))
            .and(query_param("access_token", "ya29.old"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "azp": "client-id",
                "scope": "https://www.googleapis.com/auth/gmail.readonly",
                "exp": "1760000000",
                "expires_in": "3000",
                "access_type": "offline"
            })))
            .mount(&server)
            .await;

        let client = GoogleOAuthClient::new()
            .unwrap()
            .with_tokeninfo_url(format!("{}/tokeninfo", server.uri()));
        let expiry = client
            .introspect(&record("unused".to_string()))
            .await
            .unwrap()
            .unwrap();

        let remaining = expiry - Utc::now();
        assert!(remaining > ChronoDuration::seconds(2990));
        assert!(remaining <= ChronoDuration::seconds(3000));
    }

    #[tokio::test]
    async fn introspect_treats_bad_request_as_dead_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tokeninfo"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_token"})),
            )
            .mount(&server)
            .await;

        let client = GoogleOAuthClient::new()
            .unwrap()
            .with_tokeninfo_url(format!("{}/tokeninfo", server.uri()));

        assert_eq!(
            client.introspect(&record("unused".to_string())).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn introspect_transport_error_does_not_leak_token() {
        // A port nobody listens on.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let mut rec = record("unused".to_string());
        rec.token = "ya29.SECRET_ACCESS_TOKEN".to_string();

        let client = GoogleOAuthClient::new()
            .unwrap()
            .with_tokeninfo_url(format!("http://127.0.0.1:{port}/tokeninfo"));
        let err = client.introspect(&rec).await.unwrap_err();

        assert!(matches!(err, OAuthError::Http(_)));
        assert!(!err.to_string().contains("SECRET_ACCESS_TOKEN"));
    }

    #[tokio::test]
    async fn introspect_decode_error_does_not_leak_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tokeninfo"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;
        let mut rec = record("unused".to_string());
        rec.token = "ya29.SECRET_ACCESS_TOKEN".to_string();

        let client = GoogleOAuthClient::new()
            .unwrap()
            .with_tokeninfo_url(format!("{}/tokeninfo", server.uri()));
        let err = client.introspect(&rec).await.unwrap_err();

        let text = err.to_string();
        assert!(text.contains("Malformed tokeninfo response"));
        assert!(!text.contains("SECRET_ACCESS_TOKEN"));
    }

    #[tokio::test]
    async fn code_exchange_sends_verifier() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=auth-code"))
            .and(body_string_contains("code_verifier=verifier-xyz"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "ya29.fresh",
                "refresh_token": "1//new-refresh",
                "expires_in": 3599
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = GoogleOAuthClient::new().unwrap();
        let token = client
            .exchange_code(
                &secrets(format!("{}/token", server.uri())),
                "auth-code",
                "http://localhost:1234/",
                "verifier-xyz",
            )
            .await
            .unwrap();

        assert_eq!(token.access_token, "ya29.fresh");
        assert_eq!(token.refresh_token.as_deref(), Some("1//new-refresh"));
    }

    #[tokio::test]
    async fn callback_server_returns_code_and_shows_completion_page() {
        let server = LocalCallbackServer::bind().await.unwrap();
        let port = server.port();
        assert_eq!(server.redirect_uri(), format!("http://localhost:{port}/"));

        let waiter = tokio::spawn(async move {
            server
                .wait_for_code("expected-state", Duration::from_secs(5))
                .await
        });

        let body = reqwest::get(format!(
            "http://127.0.0.1:{port}/?state=expected-state&code=the-code"
        ))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

        assert_eq!(body, SUCCESS_PAGE);
        assert_eq!(waiter.await.unwrap().unwrap(), "the-code");
    }

    #[tokio::test]
    async fn idle_connection_does_not_block_the_redirect() {
        let server = LocalCallbackServer::bind().await.unwrap();
        let port = server.port();
        let waiter = tokio::spawn(async move {
            server
                .wait_for_code("expected-state", Duration::from_secs(5))
                .await
        });

        // Browsers often open a connection early and send nothing on it.
        let _idle = tokio::net::TcpStream::connect(("127.0.0.1", port))
            .await
            .unwrap();

        let resp = reqwest::get(format!(
            "http://127.0.0.1:{port}/?state=expected-state&code=the-code"
        ))
        .await
        .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(waiter.await.unwrap().unwrap(), "the-code");
    }

    #[tokio::test]
    async fn stray_requests_do_not_end_the_flow() {
        let server = LocalCallbackServer::bind().await.unwrap();
        let port = server.port();
        let waiter = tokio::spawn(async move {
            server
                .wait_for_code("expected-state", Duration::from_secs(5))
                .await
        });

        let favicon = reqwest::get(format!("http://127.0.0.1:{port}/favicon.ico"))
            .await
            .unwrap();
        assert_eq!(favicon.status(), StatusCode::NOT_FOUND);

        reqwest::get(format!(
            "http://127.0.0.1:{port}/?state=expected-state&code=later-code"
        ))
        .await
        .unwrap();

        assert_eq!(waiter.await.unwrap().unwrap(), "later-code");
    }

    #[tokio::test]
    async fn callback_server_rejects_wrong_state() {
        let server = LocalCallbackServer::bind().await.unwrap();
        let port = server.port();
        let waiter = tokio::spawn(async move {
            server
                .wait_for_code("expected-state", Duration::from_secs(5))
                .await
        });

        let resp = reqwest::get(format!("http://127.0.0.1:{port}/?state=forged&code=c"))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(matches!(
            waiter.await.unwrap(),
            Err(OAuthError::StateMismatch)
        ));
    }

    #[tokio::test]
    async fn callback_server_times_out() {
        let server = LocalCallbackServer::bind().await.unwrap();
        let result = server
            .wait_for_code("state", Duration::from_millis(50))
            .await;

        assert!(matches!(result, Err(OAuthError::Timeout)));
    }
}
