mod client;
#[cfg(any(test, feature = "fake"))]
pub mod fake;

pub use client::SpotifyClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::auth::AuthError;

/// Status codes Spotify documents as "try again later"
pub const RETRY_LATER_CODES: [u16; 5] = [429, 500, 502, 503, 504];

/// Upper bound the Web API accepts for `limit` on search and history requests
pub const MAX_PAGE_LIMIT: u32 = 50;

/// Failure reported by the remote playback API
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("remote call failed with status {status} (code {code}): {message}")]
pub struct RemoteError {
    pub status: u16,
    pub code: i32,
    pub message: String,
}

/// Coarse classification of a `RemoteError`, keyed on the HTTP status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorKind {
    Forbidden,
    Unauthorized,
    NotFound,
    RetryLater,
    Other,
}

impl RemoteError {
    pub fn new(status: u16, code: i32, message: impl Into<String>) -> Self {
        RemoteError {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> RemoteErrorKind {
        match self.status {
            403 => RemoteErrorKind::Forbidden,
            401 => RemoteErrorKind::Unauthorized,
            404 => RemoteErrorKind::NotFound,
            s if RETRY_LATER_CODES.contains(&s) => RemoteErrorKind::RetryLater,
            _ => RemoteErrorKind::Other,
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        // Transport and decode failures carry no HTTP status
        let status = e.status().map(|s| s.as_u16()).unwrap_or(0);
        RemoteError::new(status, -1, e.to_string())
    }
}

impl From<AuthError> for RemoteError {
    fn from(e: AuthError) -> Self {
        RemoteError::new(401, -1, e.to_string())
    }
}

/// Artwork variant as returned by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub url: String,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub width: Option<u32>,
}

/// Pick the smallest artwork variant by height.
/// Variants without a height sort last.
pub fn smallest_image(images: &[Image]) -> Option<&Image> {
    images
        .iter()
        .min_by_key(|image| image.height.unwrap_or(u32::MAX))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtistRef {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlbumRef {
    pub name: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub images: Vec<Image>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    #[serde(default)]
    pub id: Option<String>,
    pub uri: String,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<ArtistRef>,
    pub album: AlbumRef,
    pub duration_ms: u64,
    #[serde(default)]
    pub popularity: Option<u32>,
}

impl Track {
    /// All contributing artists joined for display
    pub fn artist_names(&self) -> String {
        join_names(&self.artists)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Show {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub uri: String,
    pub name: String,
    pub duration_ms: u64,
    pub show: Show,
    #[serde(default)]
    pub images: Vec<Image>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Album {
    pub uri: String,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<ArtistRef>,
    #[serde(default)]
    pub total_tracks: u32,
    #[serde(default)]
    pub release_date: String,
    #[serde(default)]
    pub images: Vec<Image>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artist {
    pub uri: String,
    pub name: String,
    #[serde(default)]
    pub popularity: u32,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub images: Vec<Image>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistOwner {
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistTracks {
    pub total: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub uri: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub owner: PlaylistOwner,
    pub tracks: PlaylistTracks,
    #[serde(default)]
    pub images: Option<Vec<Image>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub volume_percent: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatState {
    Off,
    Context,
    Track,
}

impl RepeatState {
    /// Fixed cycling order used by the repeat menu
    pub const ALL: [RepeatState; 3] = [RepeatState::Off, RepeatState::Context, RepeatState::Track];

    pub fn as_str(&self) -> &'static str {
        match self {
            RepeatState::Off => "off",
            RepeatState::Context => "context",
            RepeatState::Track => "track",
        }
    }
}

impl fmt::Display for RepeatState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whatever is loaded on the active device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PlayingItem {
    Track(Track),
    Episode(Episode),
}

impl PlayingItem {
    pub fn duration_ms(&self) -> u64 {
        match self {
            PlayingItem::Track(track) => track.duration_ms,
            PlayingItem::Episode(episode) => episode.duration_ms,
        }
    }
}

/// Fresh read of the remote playback state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playback {
    pub device: Device,
    #[serde(default)]
    pub is_playing: bool,
    #[serde(default)]
    pub progress_ms: Option<u64>,
    #[serde(default)]
    pub shuffle_state: bool,
    #[serde(default = "default_repeat")]
    pub repeat_state: RepeatState,
    #[serde(default)]
    pub item: Option<PlayingItem>,
}

fn default_repeat() -> RepeatState {
    RepeatState::Off
}

impl Playback {
    /// A session counts as active only when an item is loaded
    pub fn is_active(&self) -> bool {
        self.item.is_some()
    }

    pub fn track(&self) -> Option<&Track> {
        match &self.item {
            Some(PlayingItem::Track(track)) => Some(track),
            _ => None,
        }
    }
}

/// Catalog categories understood by search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchKind {
    Album,
    Artist,
    Track,
    Playlist,
}

impl SearchKind {
    pub const ALL: [SearchKind; 4] = [
        SearchKind::Album,
        SearchKind::Track,
        SearchKind::Artist,
        SearchKind::Playlist,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchKind::Album => "album",
            SearchKind::Artist => "artist",
            SearchKind::Track => "track",
            SearchKind::Playlist => "playlist",
        }
    }
}

/// One result of a catalog search
#[derive(Debug, Clone, PartialEq)]
pub enum SearchHit {
    Album(Album),
    Artist(Artist),
    Track(Track),
    Playlist(Playlist),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResults {
    pub albums: Vec<Album>,
    pub tracks: Vec<Track>,
    pub artists: Vec<Artist>,
    pub playlists: Vec<Playlist>,
}

impl SearchResults {
    pub fn is_empty(&self) -> bool {
        self.albums.is_empty()
            && self.tracks.is_empty()
            && self.artists.is_empty()
            && self.playlists.is_empty()
    }

    /// Flatten into one list, grouped by category in search order
    pub fn into_hits(self) -> Vec<SearchHit> {
        let mut hits = Vec::new();
        hits.extend(self.albums.into_iter().map(SearchHit::Album));
        hits.extend(self.tracks.into_iter().map(SearchHit::Track));
        hits.extend(self.artists.into_iter().map(SearchHit::Artist));
        hits.extend(self.playlists.into_iter().map(SearchHit::Playlist));
        hits
    }
}

/// What to start playing. `uris` wins over `context_uri`; both are optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayRequest {
    pub device_id: Option<String>,
    pub context_uri: Option<String>,
    pub uris: Vec<String>,
}

/// Seeds for a recommendation request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationSeed {
    #[serde(default)]
    pub artists: Vec<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    pub track: String,
}

/// Remote playback control surface.
///
/// Every call goes to the network; implementations must not cache reads.
#[async_trait]
pub trait Remote: Send + Sync {
    /// True when a stored credential exists (it may still need a refresh)
    fn has_credential(&self) -> bool;

    /// Run the authorization flow, redirecting to the given local port
    async fn authorize(&self, redirect_port: u16) -> Result<(), AuthError>;

    /// Current playback, `None` when no device has a session
    async fn current_playback(&self) -> Result<Option<Playback>, RemoteError>;
    async fn devices(&self) -> Result<Vec<Device>, RemoteError>;
    async fn search(
        &self,
        query: &str,
        kinds: &[SearchKind],
        limit: u32,
    ) -> Result<SearchResults, RemoteError>;
    async fn recently_played(&self, limit: u32) -> Result<Vec<Track>, RemoteError>;

    async fn pause(&self) -> Result<(), RemoteError>;
    async fn play(&self, request: &PlayRequest) -> Result<(), RemoteError>;
    async fn enqueue(&self, uri: &str) -> Result<(), RemoteError>;
    async fn next(&self) -> Result<(), RemoteError>;
    async fn previous(&self) -> Result<(), RemoteError>;
    async fn transfer(&self, device_id: &str) -> Result<(), RemoteError>;
    async fn set_shuffle(&self, state: bool) -> Result<(), RemoteError>;
    async fn set_repeat(&self, state: RepeatState) -> Result<(), RemoteError>;
    async fn set_volume(&self, percent: u8) -> Result<(), RemoteError>;
    async fn save_tracks(&self, uris: &[String]) -> Result<(), RemoteError>;
    async fn recommendations(
        &self,
        seed: &RecommendationSeed,
        limit: u8,
    ) -> Result<Vec<Track>, RemoteError>;
}

/// Join artist names the way entries display them
pub fn join_names(artists: &[ArtistRef]) -> String {
    artists
        .iter()
        .map(|a| a.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_by_status() {
        assert_eq!(RemoteError::new(403, -1, "x").kind(), RemoteErrorKind::Forbidden);
        assert_eq!(RemoteError::new(401, -1, "x").kind(), RemoteErrorKind::Unauthorized);
        assert_eq!(RemoteError::new(404, -1, "x").kind(), RemoteErrorKind::NotFound);
        for status in RETRY_LATER_CODES {
            assert_eq!(RemoteError::new(status, -1, "x").kind(), RemoteErrorKind::RetryLater);
        }
        assert_eq!(RemoteError::new(418, -1, "x").kind(), RemoteErrorKind::Other);
        assert_eq!(RemoteError::new(0, -1, "x").kind(), RemoteErrorKind::Other);
    }

    #[test]
    fn test_smallest_image_by_height() {
        let images = vec![
            Image { url: "big".into(), height: Some(640), width: Some(640) },
            Image { url: "small".into(), height: Some(64), width: Some(64) },
            Image { url: "mid".into(), height: Some(300), width: Some(300) },
        ];
        assert_eq!(smallest_image(&images).map(|i| i.url.as_str()), Some("small"));
        assert!(smallest_image(&[]).is_none());
    }

    #[test]
    fn test_playback_decodes_track_and_episode() {
        let json = r#"{
            "device": {"id": "d1", "name": "Desk", "type": "Computer", "is_active": true, "volume_percent": 40},
            "is_playing": true,
            "progress_ms": 1000,
            "shuffle_state": false,
            "repeat_state": "context",
            "item": {
                "type": "track",
                "uri": "spotify:track:1",
                "name": "No Quarter",
                "artists": [{"id": "a1", "name": "Led Zeppelin", "uri": "spotify:artist:a1"}],
                "album": {"name": "Houses of the Holy", "images": []},
                "duration_ms": 420000,
                "popularity": 60
            }
        }"#;
        let playback: Playback = serde_json::from_str(json).unwrap();
        assert_eq!(playback.repeat_state, RepeatState::Context);
        assert_eq!(playback.track().map(|t| t.name.as_str()), Some("No Quarter"));

        let json = r#"{
            "device": {"id": null, "name": "Phone", "type": "Smartphone"},
            "is_playing": false,
            "item": {
                "type": "episode",
                "uri": "spotify:episode:9",
                "name": "Pilot",
                "duration_ms": 3600000,
                "show": {"name": "Some Show", "publisher": "Someone"}
            }
        }"#;
        let playback: Playback = serde_json::from_str(json).unwrap();
        assert!(playback.is_active());
        assert!(playback.track().is_none());
        assert!(matches!(playback.item, Some(PlayingItem::Episode(_))));
    }
}
