use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use url::Url;

/// Public client id registered for this launcher
pub const CLIENT_ID: &str = "1f3a663c5fdd4056b4c0e122ea55a3af";

pub const SCOPES: &str = "user-modify-playback-state user-read-playback-state \
                          user-read-recently-played user-library-modify";

const AUTHORIZE_URL: &str = "https://accounts.spotify.com/authorize";
const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

/// Tokens this close to expiry are refreshed before use
const EXPIRY_MARGIN_SECS: i64 = 60;

/// How long the redirect listener gets to finish its last response
const SHUTDOWN_GRACE: std::time::Duration = std::time::Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no cached credential, run the authorization first")]
    NotAuthorized,
    #[error("token cache {path}: {source}")]
    Cache {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed token cache: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("authorization callback failed: {0}")]
    Callback(String),
    #[error("token request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("token endpoint rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// Access token plus what is needed to renew it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: String,
    pub expires_at: DateTime<Utc>,
}

impl Token {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - Duration::seconds(EXPIRY_MARGIN_SECS) <= now
    }

    /// Still valid, or renewable without the browser
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        !self.is_expired(now) || self.refresh_token.is_some()
    }
}

/// Body of the token endpoint response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    scope: String,
    expires_in: i64,
}

impl TokenResponse {
    fn into_token(self, previous_refresh: Option<String>) -> Token {
        Token {
            access_token: self.access_token,
            // Refresh responses may omit the refresh token; keep the old one
            refresh_token: self.refresh_token.or(previous_refresh),
            scope: self.scope,
            expires_at: Utc::now() + Duration::seconds(self.expires_in),
        }
    }
}

/// JSON token file on disk
#[derive(Debug, Clone)]
pub struct TokenCache {
    path: PathBuf,
}

impl TokenCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        TokenCache { path: path.into() }
    }

    /// `<cache dir>/spotify-launcher/token.json`
    pub fn default_path() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("spotify-launcher")
            .join("token.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the cached token, `None` when the file is missing or unreadable
    pub fn load(&self) -> Option<Token> {
        let content = std::fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&content) {
            Ok(token) => Some(token),
            Err(e) => {
                log::warn!("Ignoring malformed token cache {}: {}", self.path.display(), e);
                None
            }
        }
    }

    pub fn save(&self, token: &Token) -> Result<(), AuthError> {
        let cache_err = |source| AuthError::Cache {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(cache_err)?;
        }
        let content = serde_json::to_string_pretty(token)?;
        std::fs::write(&self.path, content).map_err(cache_err)?;
        Ok(())
    }

    /// Forget the cached token so the next query asks for authorization
    pub fn clear(&self) -> Result<(), AuthError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(AuthError::Cache {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

/// Authorization Code flow with PKCE against the Spotify accounts service
pub struct PkceAuth {
    http: reqwest::Client,
    cache: TokenCache,
}

impl PkceAuth {
    pub fn new(http: reqwest::Client, cache: TokenCache) -> Self {
        PkceAuth { http, cache }
    }

    pub fn cached_token(&self) -> Option<Token> {
        self.cache.load()
    }

    pub fn has_usable_token(&self) -> bool {
        self.cached_token()
            .map_or(false, |token| token.is_usable(Utc::now()))
    }

    /// Return a usable access token, refreshing it first when it is about to expire
    pub async fn access_token(&self) -> Result<String, AuthError> {
        let token = self.cached_token().ok_or(AuthError::NotAuthorized)?;
        if !token.is_expired(Utc::now()) {
            return Ok(token.access_token);
        }

        let refresh_token = token.refresh_token.clone().ok_or(AuthError::NotAuthorized)?;
        log::debug!("Access token expired, refreshing");
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
            ("client_id", CLIENT_ID),
        ];
        let fresh = match self.request_token(&form, token.refresh_token).await {
            Ok(fresh) => fresh,
            Err(e @ AuthError::Rejected { .. }) => {
                log::warn!("Refresh rejected, dropping cached credential: {}", e);
                self.cache.clear()?;
                return Err(e);
            }
            Err(e) => return Err(e),
        };
        self.cache.save(&fresh)?;
        Ok(fresh.access_token)
    }

    /// Run the full browser round trip and store the resulting token
    pub async fn authorize(&self, redirect_port: u16) -> Result<Token, AuthError> {
        let redirect_uri = redirect_uri(redirect_port);
        let (verifier, challenge) = pkce_pair();
        let state: String = random_string(16);

        // Bind before printing the URL so a fast browser cannot beat us
        let listener = TcpListener::bind(("127.0.0.1", redirect_port))
            .await
            .map_err(|e| AuthError::Callback(format!("cannot listen on port {}: {}", redirect_port, e)))?;

        let url = authorize_url(&redirect_uri, &challenge, &state)?;
        log::info!("Open this URL to authorize: {}", url);
        eprintln!("Open this URL in a browser to authorize Spotify access:\n\n  {}\n", url);

        let code = wait_for_code(listener, &state).await?;
        log::debug!("Received authorization code, exchanging for token");

        let form = [
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("redirect_uri", redirect_uri.as_str()),
            ("client_id", CLIENT_ID),
            ("code_verifier", verifier.as_str()),
        ];
        let token = self.request_token(&form, None).await?;
        self.cache.save(&token)?;
        log::info!("Authorization complete, token cached at {}", self.cache.path().display());
        Ok(token)
    }

    async fn request_token(
        &self,
        form: &[(&str, &str)],
        previous_refresh: Option<String>,
    ) -> Result<Token, AuthError> {
        let response = self.http.post(TOKEN_URL).form(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        let body: TokenResponse = response.json().await?;
        Ok(body.into_token(previous_refresh))
    }
}

pub fn redirect_uri(port: u16) -> String {
    format!("http://127.0.0.1:{}", port)
}

fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Code verifier and its S256 challenge
fn pkce_pair() -> (String, String) {
    let verifier = random_string(64);
    let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
    (verifier, challenge)
}

fn authorize_url(redirect_uri: &str, challenge: &str, state: &str) -> Result<Url, AuthError> {
    let url = Url::parse_with_params(
        AUTHORIZE_URL,
        &[
            ("client_id", CLIENT_ID),
            ("response_type", "code"),
            ("redirect_uri", redirect_uri),
            ("scope", SCOPES),
            ("code_challenge_method", "S256"),
            ("code_challenge", challenge),
            ("state", state),
        ],
    )?;
    Ok(url)
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

type CodeSender = oneshot::Sender<Result<String, AuthError>>;

struct CallbackState {
    expected_state: String,
    sender: Mutex<Option<CodeSender>>,
}

/// What a redirect request means for the flow, `None` when it is not ours
fn callback_result(
    params: &CallbackParams,
    expected_state: &str,
) -> Option<Result<String, AuthError>> {
    if params.state.as_deref() != Some(expected_state) {
        return None;
    }
    if let Some(error) = &params.error {
        return Some(Err(AuthError::Callback(format!("denied: {}", error))));
    }
    params.code.clone().map(Ok)
}

async fn handle_callback(
    State(state): State<Arc<CallbackState>>,
    Query(params): Query<CallbackParams>,
) -> (StatusCode, &'static str) {
    let Some(result) = callback_result(&params, &state.expected_state) else {
        log::debug!("Ignoring request without a matching state");
        return (StatusCode::BAD_REQUEST, "Waiting for the Spotify authorization redirect.");
    };

    let body = match &result {
        Ok(_) => "Authorization complete. You can close this tab.",
        Err(_) => "Authorization failed. Check the launcher log.",
    };
    let sender = state.sender.lock().ok().and_then(|mut slot| slot.take());
    match sender {
        Some(sender) => {
            let _ = sender.send(result);
            (StatusCode::OK, body)
        }
        None => (StatusCode::OK, "Authorization already handled. You can close this tab."),
    }
}

/// Serve the redirect URI until a request carrying our `state` arrives
async fn wait_for_code(listener: TcpListener, expected_state: &str) -> Result<String, AuthError> {
    let (code_tx, code_rx) = oneshot::channel();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let state = Arc::new(CallbackState {
        expected_state: expected_state.to_string(),
        sender: Mutex::new(Some(code_tx)),
    });
    let app = Router::new()
        .route("/", get(handle_callback))
        .with_state(state);

    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
    });

    let result = code_rx
        .await
        .unwrap_or_else(|_| Err(AuthError::Callback("callback server stopped".to_string())));

    let _ = shutdown_tx.send(());
    match tokio::time::timeout(SHUTDOWN_GRACE, server).await {
        Ok(Ok(Ok(()))) => log::debug!("Authorization callback server stopped"),
        Ok(Ok(Err(e))) => log::warn!("Authorization callback server failed: {}", e),
        Ok(Err(e)) => log::warn!("Authorization callback server panicked: {}", e),
        Err(_) => log::warn!("Authorization callback server did not stop in time"),
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pkce_challenge_matches_verifier() {
        let (verifier, challenge) = pkce_pair();
        assert_eq!(verifier.len(), 64);
        let expected = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
        assert_eq!(challenge, expected);
        assert!(!challenge.contains('='));
    }

    #[test]
    fn test_authorize_url_carries_pkce_params() {
        let url = authorize_url(&redirect_uri(8080), "abc", "xyz").unwrap();
        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["client_id"], CLIENT_ID);
        assert_eq!(pairs["redirect_uri"], "http://127.0.0.1:8080");
        assert_eq!(pairs["code_challenge_method"], "S256");
        assert_eq!(pairs["code_challenge"], "abc");
        assert_eq!(pairs["state"], "xyz");
    }

    fn params(code: Option<&str>, state: Option<&str>, error: Option<&str>) -> CallbackParams {
        CallbackParams {
            code: code.map(str::to_string),
            state: state.map(str::to_string),
            error: error.map(str::to_string),
        }
    }

    #[test]
    fn test_callback_result() {
        let ok = params(Some("the-code"), Some("s1"), None);
        assert_eq!(callback_result(&ok, "s1").unwrap().unwrap(), "the-code");
        assert!(callback_result(&ok, "other").is_none());
        assert!(callback_result(&params(Some("the-code"), None, None), "s1").is_none());
        assert!(callback_result(&params(None, Some("s1"), None), "s1").is_none());

        let denied = params(None, Some("s1"), Some("access_denied"));
        assert!(matches!(
            callback_result(&denied, "s1"),
            Some(Err(AuthError::Callback(_)))
        ));
    }

    #[tokio::test]
    async fn test_redirect_listener_waits_for_matching_request() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let waiting = tokio::spawn(async move { wait_for_code(listener, "s1").await });

        // Browsers open connections speculatively and may close them unused
        let preconnect = tokio::net::TcpStream::connect(addr).await.unwrap();
        drop(preconnect);

        let favicon = reqwest::get(format!("http://{}/favicon.ico", addr)).await.unwrap();
        assert_eq!(favicon.status(), reqwest::StatusCode::NOT_FOUND);
        let foreign = reqwest::get(format!("http://{}/?code=bad&state=other", addr))
            .await
            .unwrap();
        assert_eq!(foreign.status(), reqwest::StatusCode::BAD_REQUEST);
        assert!(!waiting.is_finished());

        let redirect = reqwest::get(format!("http://{}/?code=good&state=s1", addr))
            .await
            .unwrap();
        assert_eq!(redirect.status(), reqwest::StatusCode::OK);

        let code = tokio::time::timeout(std::time::Duration::from_secs(10), waiting)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(code, "good");
    }

    #[tokio::test]
    async fn test_redirect_listener_reports_denial() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let waiting = tokio::spawn(async move { wait_for_code(listener, "s1").await });

        reqwest::get(format!("http://{}/?error=access_denied&state=s1", addr))
            .await
            .unwrap();
        let result = tokio::time::timeout(std::time::Duration::from_secs(10), waiting)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(AuthError::Callback(_))));
    }

    #[test]
    fn test_token_usable_with_refresh_or_time_left() {
        let now = Utc::now();
        let mut token = Token {
            access_token: "a".into(),
            refresh_token: None,
            scope: String::new(),
            expires_at: now + Duration::hours(1),
        };
        assert!(token.is_usable(now));

        token.expires_at = now - Duration::hours(1);
        assert!(!token.is_usable(now));

        token.refresh_token = Some("r".into());
        assert!(token.is_usable(now));
    }

    #[test]
    fn test_token_cache_clear() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TokenCache::new(dir.path().join("token.json"));
        cache.clear().unwrap();

        cache
            .save(&Token {
                access_token: "a".into(),
                refresh_token: None,
                scope: String::new(),
                expires_at: Utc::now(),
            })
            .unwrap();
        let auth = PkceAuth::new(reqwest::Client::new(), cache.clone());
        assert!(auth.cached_token().is_some());
        assert!(!auth.has_usable_token());

        cache.clear().unwrap();
        assert!(cache.load().is_none());
        assert!(!cache.path().exists());
    }

    #[test]
    fn test_token_cache_round_trip_and_expiry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TokenCache::new(dir.path().join("nested").join("token.json"));
        assert!(cache.load().is_none());

        let token = Token {
            access_token: "a".into(),
            refresh_token: Some("r".into()),
            scope: SCOPES.into(),
            expires_at: Utc::now() + Duration::seconds(30),
        };
        cache.save(&token).unwrap();
        let loaded = cache.load().unwrap();
        assert_eq!(loaded, token);
        // Inside the safety margin counts as expired
        assert!(loaded.is_expired(Utc::now()));

        std::fs::write(cache.path(), "not json").unwrap();
        assert!(cache.load().is_none());
    }
}
