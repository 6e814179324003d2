//! Commands that act on whatever track is playing right now.

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use super::{active_playback, nothing_playing_entry, Context, HandlerResult};
use crate::menu::{Action, EntryAction, Icon, MenuEntry};
use crate::remote::{Playback, PlayingItem, RecommendationSeed, RemoteError, Track};

/// The recommendations endpoint takes at most five seeds in total
const MAX_SEEDS: usize = 5;
const DEFAULT_RECOMMENDATIONS: u8 = 10;

/// The playing track, or the entry to show instead
async fn playing_track(
    ctx: &Context<'_>,
    episode_title: &str,
    episode_description: &str,
) -> Result<Result<Track, MenuEntry>, RemoteError> {
    let Some(playback) = active_playback(ctx).await? else {
        return Ok(Err(nothing_playing_entry()));
    };
    Ok(into_track(playback).ok_or_else(|| MenuEntry::notice(episode_title, episode_description)))
}

fn into_track(playback: Playback) -> Option<Track> {
    match playback.item {
        Some(PlayingItem::Track(track)) => Some(track),
        _ => None,
    }
}

pub(super) fn save<'a>(ctx: &'a Context<'a>, _args: &'a [String]) -> BoxFuture<'a, HandlerResult> {
    async move {
        let track = match playing_track(
            ctx,
            "Episodes cannot be saved",
            "Only tracks can be added to your library",
        )
        .await?
        {
            Ok(track) => track,
            Err(entry) => return Ok(vec![entry]),
        };

        Ok(vec![MenuEntry::new(
            "Save to library",
            format!("Add {} -- {} to your Liked Songs", track.artist_names(), track.name),
        )
        .icon(Icon::artwork(&track.album.images))
        .on_enter(Action::Save { uri: track.uri }.once())])
    }
    .boxed()
}

pub(super) fn lyrics<'a>(ctx: &'a Context<'a>, _args: &'a [String]) -> BoxFuture<'a, HandlerResult> {
    async move {
        let track = match playing_track(
            ctx,
            "No lyrics for episodes",
            "Lyrics lookup only works for tracks",
        )
        .await?
        {
            Ok(track) => track,
            Err(entry) => return Ok(vec![entry]),
        };

        Ok(lyrics_entries(&track))
    }
    .boxed()
}

fn lyrics_entries(track: &Track) -> Vec<MenuEntry> {
    let artist = track.artists.first().map(|a| a.name.as_str()).unwrap_or_default();
    let query = format!("{} - {}", artist, track.name);
    let encoded = urlencoding::encode(&query);

    vec![
        MenuEntry::new(format!("Lyrics for {}", query), "Search on Genius")
            .on_enter(EntryAction::OpenUrl(format!("https://genius.com/search?q={}", encoded))),
        MenuEntry::new(format!("Lyrics for {}", query), "Search on Musixmatch").on_enter(
            EntryAction::OpenUrl(format!("https://www.musixmatch.com/search/{}", encoded)),
        ),
    ]
}

/// Count from the first argument, clamped to 1..=10
fn recommendation_count(args: &[String]) -> u8 {
    args.first()
        .and_then(|arg| arg.parse::<u64>().ok())
        .map(|n| n.clamp(1, DEFAULT_RECOMMENDATIONS as u64) as u8)
        .unwrap_or(DEFAULT_RECOMMENDATIONS)
}

fn seed_for(track: &Track) -> RecommendationSeed {
    RecommendationSeed {
        // One seed slot is taken by the track itself
        artists: track
            .artists
            .iter()
            .filter_map(|a| a.id.clone())
            .take(MAX_SEEDS - 1)
            .collect(),
        genres: Vec::new(),
        track: track.uri.clone(),
    }
}

pub(super) fn recommend<'a>(
    ctx: &'a Context<'a>,
    args: &'a [String],
) -> BoxFuture<'a, HandlerResult> {
    async move {
        let track = match playing_track(
            ctx,
            "Recommendations need a track",
            "Podcast episodes cannot seed recommendations",
        )
        .await?
        {
            Ok(track) => track,
            Err(entry) => return Ok(vec![entry]),
        };

        let limit = recommendation_count(args);
        Ok(vec![MenuEntry::new(
            format!("Queue {} recommended tracks", limit),
            format!("Based on {} -- {}", track.artist_names(), track.name),
        )
        .icon(Icon::artwork(&track.album.images))
        .on_enter(
            Action::Recommend {
                seed: seed_for(&track),
                limit,
            }
            .once(),
        )])
    }
    .boxed()
}
