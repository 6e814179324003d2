//! In-memory `Remote` that records every call, for unit and integration tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use super::{
    AlbumRef, ArtistRef, Device, Episode, Playback, PlayingItem, PlayRequest,
    RecommendationSeed, Remote, RemoteError, RepeatState, SearchKind, SearchResults, Show, Track,
};
use crate::auth::AuthError;

/// One recorded remote call
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Authorize(u16),
    CurrentPlayback,
    Devices,
    Search {
        query: String,
        kinds: Vec<SearchKind>,
        limit: u32,
    },
    RecentlyPlayed(u32),
    Pause,
    Play(PlayRequest),
    Enqueue(String),
    Next,
    Previous,
    Transfer(String),
    Shuffle(bool),
    Repeat(RepeatState),
    Volume(u8),
    SaveTracks(Vec<String>),
    Recommendations(RecommendationSeed, u8),
}

impl Call {
    /// Name used to script failures with `FakeRemote::fail`
    pub fn name(&self) -> &'static str {
        match self {
            Call::Authorize(_) => "authorize",
            Call::CurrentPlayback => "current_playback",
            Call::Devices => "devices",
            Call::Search { .. } => "search",
            Call::RecentlyPlayed(_) => "recently_played",
            Call::Pause => "pause",
            Call::Play(_) => "play",
            Call::Enqueue(_) => "enqueue",
            Call::Next => "next",
            Call::Previous => "previous",
            Call::Transfer(_) => "transfer",
            Call::Shuffle(_) => "shuffle",
            Call::Repeat(_) => "repeat",
            Call::Volume(_) => "volume",
            Call::SaveTracks(_) => "save_tracks",
            Call::Recommendations(..) => "recommendations",
        }
    }
}

#[derive(Debug, Default)]
struct FakeState {
    authorized: bool,
    playback: Option<Playback>,
    devices: Vec<Device>,
    search: SearchResults,
    history: Vec<Track>,
    recommendations: Vec<Track>,
    failures: HashMap<&'static str, RemoteError>,
    revoke_on: Option<&'static str>,
    calls: Vec<Call>,
}

/// Scriptable stand-in for the Spotify Web API
#[derive(Debug, Default)]
pub struct FakeRemote {
    state: Mutex<FakeState>,
}

impl FakeRemote {
    /// An authorized remote with nothing playing and no devices
    pub fn new() -> Self {
        let fake = FakeRemote::default();
        fake.lock().authorized = true;
        fake
    }

    pub fn unauthorized() -> Self {
        FakeRemote::default()
    }

    pub fn with_playback(self, playback: Playback) -> Self {
        self.lock().playback = Some(playback);
        self
    }

    pub fn with_devices(self, devices: Vec<Device>) -> Self {
        self.lock().devices = devices;
        self
    }

    pub fn with_search(self, results: SearchResults) -> Self {
        self.lock().search = results;
        self
    }

    pub fn with_history(self, tracks: Vec<Track>) -> Self {
        self.lock().history = tracks;
        self
    }

    pub fn with_recommendations(self, tracks: Vec<Track>) -> Self {
        self.lock().recommendations = tracks;
        self
    }

    /// Make every call with the given name (see `Call::name`) fail
    pub fn fail(self, call: &'static str, error: RemoteError) -> Self {
        self.lock().failures.insert(call, error);
        self
    }

    /// The named call fails with 401 and drops the credential, like a rejected refresh
    pub fn revoke_on(self, call: &'static str) -> Self {
        self.lock().revoke_on = Some(call);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        // A panicking test thread poisons the lock; the data is still usable
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, call: Call) -> Result<(), RemoteError> {
        let mut state = self.lock();
        let name = call.name();
        state.calls.push(call);
        if state.revoke_on == Some(name) {
            state.authorized = false;
            return Err(RemoteError::new(401, -1, "refresh token revoked"));
        }
        match state.failures.get(name) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Remote for FakeRemote {
    fn has_credential(&self) -> bool {
        self.lock().authorized
    }

    async fn authorize(&self, redirect_port: u16) -> Result<(), AuthError> {
        self.record(Call::Authorize(redirect_port))
            .map_err(|e| AuthError::Callback(e.message))?;
        self.lock().authorized = true;
        Ok(())
    }

    async fn current_playback(&self) -> Result<Option<Playback>, RemoteError> {
        self.record(Call::CurrentPlayback)?;
        Ok(self.lock().playback.clone())
    }

    async fn devices(&self) -> Result<Vec<Device>, RemoteError> {
        self.record(Call::Devices)?;
        Ok(self.lock().devices.clone())
    }

    async fn search(
        &self,
        query: &str,
        kinds: &[SearchKind],
        limit: u32,
    ) -> Result<SearchResults, RemoteError> {
        self.record(Call::Search {
            query: query.to_string(),
            kinds: kinds.to_vec(),
            limit,
        })?;
        let results = self.lock().search.clone();
        let take = limit as usize;
        let keep = |kind| kinds.contains(&kind);
        Ok(SearchResults {
            albums: filter_take(results.albums, keep(SearchKind::Album), take),
            tracks: filter_take(results.tracks, keep(SearchKind::Track), take),
            artists: filter_take(results.artists, keep(SearchKind::Artist), take),
            playlists: filter_take(results.playlists, keep(SearchKind::Playlist), take),
        })
    }

    async fn recently_played(&self, limit: u32) -> Result<Vec<Track>, RemoteError> {
        self.record(Call::RecentlyPlayed(limit))?;
        Ok(filter_take(self.lock().history.clone(), true, limit as usize))
    }

    async fn pause(&self) -> Result<(), RemoteError> {
        self.record(Call::Pause)
    }

    async fn play(&self, request: &PlayRequest) -> Result<(), RemoteError> {
        self.record(Call::Play(request.clone()))
    }

    async fn enqueue(&self, uri: &str) -> Result<(), RemoteError> {
        self.record(Call::Enqueue(uri.to_string()))
    }

    async fn next(&self) -> Result<(), RemoteError> {
        self.record(Call::Next)
    }

    async fn previous(&self) -> Result<(), RemoteError> {
        self.record(Call::Previous)
    }

    async fn transfer(&self, device_id: &str) -> Result<(), RemoteError> {
        self.record(Call::Transfer(device_id.to_string()))
    }

    async fn set_shuffle(&self, state: bool) -> Result<(), RemoteError> {
        self.record(Call::Shuffle(state))
    }

    async fn set_repeat(&self, state: RepeatState) -> Result<(), RemoteError> {
        self.record(Call::Repeat(state))
    }

    async fn set_volume(&self, percent: u8) -> Result<(), RemoteError> {
        self.record(Call::Volume(percent))
    }

    async fn save_tracks(&self, uris: &[String]) -> Result<(), RemoteError> {
        self.record(Call::SaveTracks(uris.to_vec()))
    }

    async fn recommendations(
        &self,
        seed: &RecommendationSeed,
        limit: u8,
    ) -> Result<Vec<Track>, RemoteError> {
        self.record(Call::Recommendations(seed.clone(), limit))?;
        Ok(filter_take(self.lock().recommendations.clone(), true, limit as usize))
    }
}

fn filter_take<T>(items: Vec<T>, keep: bool, limit: usize) -> Vec<T> {
    if keep {
        items.into_iter().take(limit).collect()
    } else {
        Vec::new()
    }
}

/// A track with one artist and no artwork
pub fn track(id: &str, artist: &str, name: &str) -> Track {
    Track {
        id: Some(id.to_string()),
        uri: format!("spotify:track:{}", id),
        name: name.to_string(),
        artists: vec![ArtistRef {
            id: Some(format!("{}-artist", id)),
            name: artist.to_string(),
            uri: format!("spotify:artist:{}-artist", id),
        }],
        album: AlbumRef {
            name: format!("{} album", name),
            uri: format!("spotify:album:{}-album", id),
            images: Vec::new(),
        },
        duration_ms: 185_000,
        popularity: Some(50),
    }
}

pub fn device(id: &str, name: &str, kind: &str, is_active: bool) -> Device {
    Device {
        id: Some(id.to_string()),
        name: name.to_string(),
        kind: kind.to_string(),
        is_active,
        volume_percent: Some(42),
    }
}

/// Playback of `track` on an active computer named "Desk"
pub fn playing(track: Track, is_playing: bool) -> Playback {
    Playback {
        device: device("desk", "Desk", "Computer", true),
        is_playing,
        progress_ms: Some(65_000),
        shuffle_state: false,
        repeat_state: RepeatState::Off,
        item: Some(PlayingItem::Track(track)),
    }
}

/// Playback of a podcast episode
pub fn playing_episode(name: &str, show: &str) -> Playback {
    Playback {
        item: Some(PlayingItem::Episode(Episode {
            uri: "spotify:episode:e1".to_string(),
            name: name.to_string(),
            duration_ms: 3_725_000,
            show: Show {
                name: show.to_string(),
            },
            images: Vec::new(),
        })),
        ..playing(track("t0", "Nobody", "Nothing"), true)
    }
}
