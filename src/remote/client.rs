use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{
    Album, Artist, Device, Playback, PlayRequest, Playlist, RecommendationSeed, Remote,
    RemoteError, RepeatState, SearchKind, SearchResults, Track,
};
use crate::auth::{AuthError, PkceAuth, TokenCache};

const API_BASE: &str = "https://api.spotify.com/v1";

/// Spotify error body: `{"error": {"status": 404, "message": "..."}}`
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    items: Vec<Option<T>>,
}

impl<T> Page<T> {
    // Playlist pages may contain nulls for items the user cannot see
    fn into_items(self) -> Vec<T> {
        self.items.into_iter().flatten().collect()
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    albums: Option<Page<Album>>,
    tracks: Option<Page<Track>>,
    artists: Option<Page<Artist>>,
    playlists: Option<Page<Playlist>>,
}

#[derive(Debug, Deserialize)]
struct DevicesResponse {
    #[serde(default)]
    devices: Vec<Device>,
}

#[derive(Debug, Deserialize)]
struct PlayHistory {
    track: Track,
}

#[derive(Debug, Deserialize)]
struct RecommendationsResponse {
    #[serde(default)]
    tracks: Vec<Track>,
}

/// Spotify Web API client
pub struct SpotifyClient {
    http: reqwest::Client,
    auth: PkceAuth,
}

impl SpotifyClient {
    pub fn new(cache: TokenCache) -> Result<Self, Box<dyn std::error::Error>> {
        let http = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let auth = PkceAuth::new(http.clone(), cache);
        Ok(SpotifyClient { http, auth })
    }

    /// Send one request, returning the JSON body (`None` for empty responses)
    async fn call(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<Value>,
    ) -> Result<Option<Value>, RemoteError> {
        let token = self.auth.access_token().await?;
        let url = format!("{}{}", API_BASE, path);
        log::debug!("{} {} {:?}", method, path, query);

        let mut request = self
            .http
            .request(method, &url)
            .bearer_auth(token)
            .query(query);
        request = match body {
            Some(body) => request.json(&body),
            // Player endpoints reject bodiless PUT/POST without a length
            None => request.header(reqwest::header::CONTENT_LENGTH, "0"),
        };

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<ErrorBody>(&text) {
                Ok(body) => match body.error.reason {
                    Some(reason) => format!("{} ({})", body.error.message, reason),
                    None => body.error.message,
                },
                Err(_) => text,
            };
            log::debug!("{} failed with {}: {}", path, status, message);
            return Err(RemoteError::new(status.as_u16(), -1, message));
        }

        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(None);
        }
        // Some player endpoints answer 200 with a non-JSON snapshot id
        Ok(serde_json::from_slice(&bytes).ok())
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>, RemoteError> {
        match self.call(Method::GET, path, query, None).await? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| RemoteError::new(0, -1, format!("unexpected response from {}: {}", path, e))),
            None => Ok(None),
        }
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<Value>,
    ) -> Result<(), RemoteError> {
        self.call(method, path, query, body).await.map(|_| ())
    }
}

/// `spotify:track:abc` -> `abc`
fn id_from_uri(uri: &str) -> &str {
    uri.rsplit(':').next().unwrap_or(uri)
}

#[async_trait]
impl Remote for SpotifyClient {
    fn has_credential(&self) -> bool {
        self.auth.has_usable_token()
    }

    async fn authorize(&self, redirect_port: u16) -> Result<(), AuthError> {
        self.auth.authorize(redirect_port).await.map(|_| ())
    }

    async fn current_playback(&self) -> Result<Option<Playback>, RemoteError> {
        self.get("/me/player", &[("additional_types", "track,episode".to_string())])
            .await
    }

    async fn devices(&self) -> Result<Vec<Device>, RemoteError> {
        let response: Option<DevicesResponse> = self.get("/me/player/devices", &[]).await?;
        Ok(response.map(|r| r.devices).unwrap_or_default())
    }

    async fn search(
        &self,
        query: &str,
        kinds: &[SearchKind],
        limit: u32,
    ) -> Result<SearchResults, RemoteError> {
        let types = kinds
            .iter()
            .map(SearchKind::as_str)
            .collect::<Vec<_>>()
            .join(",");
        let params = [
            ("q", query.to_string()),
            ("type", types),
            ("limit", limit.to_string()),
        ];
        let response: Option<SearchResponse> = self.get("/search", &params).await?;
        let Some(response) = response else {
            return Ok(SearchResults::default());
        };
        Ok(SearchResults {
            albums: response.albums.map(Page::into_items).unwrap_or_default(),
            tracks: response.tracks.map(Page::into_items).unwrap_or_default(),
            artists: response.artists.map(Page::into_items).unwrap_or_default(),
            playlists: response.playlists.map(Page::into_items).unwrap_or_default(),
        })
    }

    async fn recently_played(&self, limit: u32) -> Result<Vec<Track>, RemoteError> {
        let response: Option<Page<PlayHistory>> = self
            .get("/me/player/recently-played", &[("limit", limit.to_string())])
            .await?;
        Ok(response
            .map(|page| page.into_items().into_iter().map(|h| h.track).collect())
            .unwrap_or_default())
    }

    async fn pause(&self) -> Result<(), RemoteError> {
        self.send(Method::PUT, "/me/player/pause", &[], None).await
    }

    async fn play(&self, request: &PlayRequest) -> Result<(), RemoteError> {
        let query: Vec<(&str, String)> = request
            .device_id
            .iter()
            .map(|id| ("device_id", id.clone()))
            .collect();
        let body = if !request.uris.is_empty() {
            Some(json!({ "uris": request.uris }))
        } else {
            request
                .context_uri
                .as_ref()
                .map(|uri| json!({ "context_uri": uri }))
        };
        self.send(Method::PUT, "/me/player/play", &query, body).await
    }

    async fn enqueue(&self, uri: &str) -> Result<(), RemoteError> {
        self.send(Method::POST, "/me/player/queue", &[("uri", uri.to_string())], None)
            .await
    }

    async fn next(&self) -> Result<(), RemoteError> {
        self.send(Method::POST, "/me/player/next", &[], None).await
    }

    async fn previous(&self) -> Result<(), RemoteError> {
        self.send(Method::POST, "/me/player/previous", &[], None).await
    }

    async fn transfer(&self, device_id: &str) -> Result<(), RemoteError> {
        let body = json!({ "device_ids": [device_id] });
        self.send(Method::PUT, "/me/player", &[], Some(body)).await
    }

    async fn set_shuffle(&self, state: bool) -> Result<(), RemoteError> {
        self.send(Method::PUT, "/me/player/shuffle", &[("state", state.to_string())], None)
            .await
    }

    async fn set_repeat(&self, state: RepeatState) -> Result<(), RemoteError> {
        self.send(Method::PUT, "/me/player/repeat", &[("state", state.to_string())], None)
            .await
    }

    async fn set_volume(&self, percent: u8) -> Result<(), RemoteError> {
        let query = [("volume_percent", percent.min(100).to_string())];
        self.send(Method::PUT, "/me/player/volume", &query, None).await
    }

    async fn save_tracks(&self, uris: &[String]) -> Result<(), RemoteError> {
        let ids = uris
            .iter()
            .map(|uri| id_from_uri(uri))
            .collect::<Vec<_>>()
            .join(",");
        self.send(Method::PUT, "/me/tracks", &[("ids", ids)], None).await
    }

    async fn recommendations(
        &self,
        seed: &RecommendationSeed,
        limit: u8,
    ) -> Result<Vec<Track>, RemoteError> {
        let mut query = vec![
            ("seed_tracks", id_from_uri(&seed.track).to_string()),
            ("limit", limit.to_string()),
        ];
        if !seed.artists.is_empty() {
            query.push(("seed_artists", seed.artists.join(",")));
        }
        if !seed.genres.is_empty() {
            query.push(("seed_genres", seed.genres.join(",")));
        }
        let response: Option<RecommendationsResponse> =
            self.get("/recommendations", &query).await?;
        Ok(response.map(|r| r.tracks).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_from_uri() {
        assert_eq!(id_from_uri("spotify:track:abc123"), "abc123");
        assert_eq!(id_from_uri("abc123"), "abc123");
    }

    #[test]
    fn test_search_page_skips_null_items() {
        let json = r#"{
            "playlists": {"items": [null, {
                "uri": "spotify:playlist:p1",
                "name": "Brain Food",
                "description": "",
                "owner": {"display_name": "Spotify"},
                "tracks": {"total": 50},
                "images": null
            }]}
        }"#;
        let response: SearchResponse = serde_json::from_str(json).unwrap();
        let playlists = response.playlists.map(Page::into_items).unwrap();
        assert_eq!(playlists.len(), 1);
        assert_eq!(playlists[0].name, "Brain Food");
        assert!(response.tracks.is_none());
    }

    #[test]
    fn test_error_body_decodes_reason() {
        let json = r#"{"error": {"status": 404, "message": "Player command failed", "reason": "NO_ACTIVE_DEVICE"}}"#;
        let body: ErrorBody = serde_json::from_str(json).unwrap();
        assert_eq!(body.error.message, "Player command failed");
        assert_eq!(body.error.reason.as_deref(), Some("NO_ACTIVE_DEVICE"));
    }
}
