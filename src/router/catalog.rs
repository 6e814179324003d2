use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use rand::seq::SliceRandom;

use super::{Context, HandlerResult};
use crate::menu::{format_duration, Action, Icon, MenuEntry};
use crate::remote::{join_names, Album, Artist, Playlist, SearchHit, SearchKind, Track};

/// Sample queries shown when a search command has no arguments
const EXAMPLES: &[(&str, &[&str])] = &[
    ("album", &["mick gordon doom", "beach house bloom", "foals holy fire"]),
    ("artist", &["spice girls", "britney spears", "jakey"]),
    ("track", &["led zep no quarter", "post malone congratulations", "post malone wow"]),
    ("playlist", &["brain food", "russian hardbass", "spanish flamenco"]),
    ("search", &["bad guy", "gojira", "bonobo"]),
];

/// Example queries for a search category, empty for anything else
pub fn examples(category: &str) -> &'static [&'static str] {
    EXAMPLES
        .iter()
        .find(|(name, _)| *name == category)
        .map(|(_, list)| *list)
        .unwrap_or(&[])
}

pub(super) fn album<'a>(ctx: &'a Context<'a>, args: &'a [String]) -> BoxFuture<'a, HandlerResult> {
    lookup(ctx, args, "album", &[SearchKind::Album]).boxed()
}

pub(super) fn track<'a>(ctx: &'a Context<'a>, args: &'a [String]) -> BoxFuture<'a, HandlerResult> {
    lookup(ctx, args, "track", &[SearchKind::Track]).boxed()
}

pub(super) fn artist<'a>(ctx: &'a Context<'a>, args: &'a [String]) -> BoxFuture<'a, HandlerResult> {
    lookup(ctx, args, "artist", &[SearchKind::Artist]).boxed()
}

pub(super) fn playlist<'a>(
    ctx: &'a Context<'a>,
    args: &'a [String],
) -> BoxFuture<'a, HandlerResult> {
    lookup(ctx, args, "playlist", &[SearchKind::Playlist]).boxed()
}

pub(super) fn search<'a>(ctx: &'a Context<'a>, args: &'a [String]) -> BoxFuture<'a, HandlerResult> {
    lookup(ctx, args, "search", &SearchKind::ALL).boxed()
}

async fn lookup(
    ctx: &Context<'_>,
    args: &[String],
    category: &'static str,
    kinds: &'static [SearchKind],
) -> HandlerResult {
    if args.is_empty() {
        return Ok(vec![example_entry(category, ctx.prefs.keyword())]);
    }

    let query = args.join(" ");
    // The limit applies per category, so a general search splits it
    let limit = ctx.prefs.result_limit().div_ceil(kinds.len() as u32);
    log::debug!("Searching {:?} for '{}' (limit {})", kinds, query, limit);

    let results = ctx.remote.search(&query, kinds, limit).await?;
    if results.is_empty() {
        return Ok(vec![MenuEntry::new(
            format!("Nothing found for {}", query),
            "Try again with a different query?",
        )]);
    }

    Ok(results.into_hits().iter().map(hit_entry).collect())
}

fn example_entry(category: &str, keyword: &str) -> MenuEntry {
    let title = if category == "search" {
        "Enter your search query".to_string()
    } else {
        format!("Search for {}s", category)
    };
    let example = examples(category)
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or_default();
    MenuEntry::new(title, format!("For example: {} {} {}", keyword, category, example))
}

pub fn hit_entry(hit: &SearchHit) -> MenuEntry {
    match hit {
        SearchHit::Album(album) => album_entry(album),
        SearchHit::Artist(artist) => artist_entry(artist),
        SearchHit::Track(track) => track_entry(track),
        SearchHit::Playlist(playlist) => playlist_entry(playlist),
    }
}

/// Enter plays the track right away, alt-enter queues it
pub(crate) fn track_entry(track: &Track) -> MenuEntry {
    let mut description = format!("Track | {}", format_duration(track.duration_ms));
    if let Some(popularity) = track.popularity {
        description.push_str(&format!(" | Popularity {}%", popularity));
    }
    description.push_str(&format!(" | {}", track.album.name));

    let artist = track.artists.first().map(|a| a.name.as_str()).unwrap_or_default();
    MenuEntry::new(format!("{} -- {}", artist, track.name), description)
        .icon(Icon::artwork(&track.album.images))
        .on_enter(Action::play_uris(vec![track.uri.clone()]).once())
        .on_alt_enter(Action::Queue { uri: track.uri.clone() }.once())
}

fn album_entry(album: &Album) -> MenuEntry {
    let mut description = format!("Album | {} tracks", album.total_tracks);
    if !album.release_date.is_empty() {
        description.push_str(&format!(" | Released {}", album.release_date));
    }

    MenuEntry::new(format!("{} -- {}", join_names(&album.artists), album.name), description)
        .icon(Icon::artwork(&album.images))
        .on_enter(Action::play_context(album.uri.clone()).once())
}

fn artist_entry(artist: &Artist) -> MenuEntry {
    let mut description = "Artist".to_string();
    if !artist.genres.is_empty() {
        description.push_str(&format!(" | {}", capitalize(&artist.genres.join(", "))));
    }
    description.push_str(&format!(" | Popularity {}%", artist.popularity));

    MenuEntry::new(artist.name.clone(), description)
        .icon(Icon::artwork(&artist.images))
        .on_enter(Action::play_context(artist.uri.clone()).once())
}

fn playlist_entry(playlist: &Playlist) -> MenuEntry {
    let owner = playlist.owner.display_name.as_deref().unwrap_or("unknown");
    let mut description = format!("Playlist by {} | {} tracks", owner, playlist.tracks.total);
    if let Some(text) = playlist.description.as_deref().filter(|d| !d.is_empty()) {
        description.push_str(&format!(" | {}", text));
    }

    let images = playlist.images.as_deref().unwrap_or(&[]);
    MenuEntry::new(playlist.name.clone(), description)
        .icon(Icon::artwork(images))
        .on_enter(Action::play_context(playlist.uri.clone()).once())
}

/// First letter upper case, the rest lower case
fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Preferences, Settings};
    use crate::menu::EntryAction;
    use crate::remote::fake::{track as fake_track, Call, FakeRemote};
    use crate::remote::{ArtistRef, Image, PlaylistOwner, PlaylistTracks, SearchResults};
    use crate::router::route;

    fn results() -> SearchResults {
        SearchResults {
            albums: vec![Album {
                uri: "spotify:album:a".into(),
                name: "Bloom".into(),
                artists: vec![ArtistRef {
                    id: None,
                    name: "Beach House".into(),
                    uri: String::new(),
                }],
                total_tracks: 10,
                release_date: "2012-05-15".into(),
                images: vec![],
            }],
            tracks: vec![fake_track("1", "Led Zeppelin", "No Quarter")],
            artists: vec![Artist {
                uri: "spotify:artist:g".into(),
                name: "Gojira".into(),
                popularity: 70,
                genres: vec!["metal".into(), "french death metal".into()],
                images: vec![],
            }],
            playlists: vec![Playlist {
                uri: "spotify:playlist:p".into(),
                name: "Brain Food".into(),
                description: Some(String::new()),
                owner: PlaylistOwner { display_name: Some("Spotify".into()) },
                tracks: PlaylistTracks { total: 50 },
                images: None,
            }],
        }
    }

    #[tokio::test]
    async fn test_single_category_uses_full_limit() {
        let remote = FakeRemote::new().with_search(results());
        let entries = route(&remote, &Preferences::default(), "track no quarter").await;

        assert_eq!(
            remote.calls(),
            vec![Call::Search {
                query: "no quarter".into(),
                kinds: vec![SearchKind::Track],
                limit: 7,
            }]
        );
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Led Zeppelin -- No Quarter");
        assert_eq!(
            entries[0].description,
            "Track | 3m 5s | Popularity 50% | No Quarter album"
        );
        assert_eq!(
            entries[0].payload().unwrap().action,
            Action::play_uris(vec!["spotify:track:1".into()])
        );
        assert_eq!(
            entries[0].alt_payload().unwrap().action,
            Action::Queue { uri: "spotify:track:1".into() }
        );
    }

    #[tokio::test]
    async fn test_general_search_splits_limit_and_orders_categories() {
        let prefs = Preferences::from_settings(Settings {
            result_limit: 10,
            ..Settings::default()
        })
        .unwrap();
        let remote = FakeRemote::new().with_search(results());
        let entries = route(&remote, &prefs, "search foo").await;

        assert_eq!(
            remote.calls(),
            vec![Call::Search {
                query: "foo".into(),
                kinds: SearchKind::ALL.to_vec(),
                limit: 3,
            }]
        );
        let titles: Vec<&str> = entries.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["Beach House -- Bloom", "Led Zeppelin -- No Quarter", "Gojira", "Brain Food"]
        );
        assert_eq!(entries[2].description, "Artist | Metal, french death metal | Popularity 70%");
        assert_eq!(entries[3].description, "Playlist by Spotify | 50 tracks");
        assert_eq!(
            entries[3].payload().unwrap().action,
            Action::play_context("spotify:playlist:p".into())
        );
    }

    #[tokio::test]
    async fn test_nothing_found() {
        let remote = FakeRemote::new();
        let entries = route(&remote, &Preferences::default(), "album zzzz qqq").await;

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Nothing found for zzzz qqq");
        assert_eq!(entries[0].primary_action, EntryAction::Nothing);
    }

    #[tokio::test]
    async fn test_no_query_shows_an_example() {
        let remote = FakeRemote::new();
        for category in ["album", "artist", "track", "playlist", "search"] {
            let entries = route(&remote, &Preferences::default(), category).await;
            assert_eq!(entries.len(), 1);
            assert!(
                examples(category)
                    .iter()
                    .any(|example| entries[0].description.contains(example)),
                "{} has no example in '{}'",
                category,
                entries[0].description
            );
        }
        assert!(remote.calls().is_empty());

        let entries = route(&remote, &Preferences::default(), "album").await;
        assert_eq!(entries[0].title, "Search for albums");
        assert!(entries[0].description.starts_with("For example: sp album "));
    }

    #[test]
    fn test_playlist_artwork_falls_back_to_first_unsized_image() {
        let mut playlist = match &results().into_hits()[3] {
            SearchHit::Playlist(p) => p.clone(),
            _ => unreachable!(),
        };
        playlist.images = Some(vec![
            Image { url: "first".into(), height: None, width: None },
            Image { url: "second".into(), height: None, width: None },
        ]);
        assert_eq!(playlist_entry(&playlist).icon, Icon::Artwork("first".into()));
    }

    #[test]
    fn test_album_entry() {
        let album = Album {
            uri: "spotify:album:x".into(),
            name: "Holy Fire".into(),
            artists: vec![ArtistRef {
                id: None,
                name: "Foals".into(),
                uri: String::new(),
            }],
            total_tracks: 11,
            release_date: "2013".into(),
            images: vec![Image { url: "64".into(), height: Some(64), width: Some(64) }],
        };
        let entry = album_entry(&album);
        assert_eq!(entry.title, "Foals -- Holy Fire");
        assert_eq!(entry.description, "Album | 11 tracks | Released 2013");
        assert_eq!(entry.icon, Icon::Artwork("64".into()));
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("metal"), "Metal");
        assert_eq!(capitalize("metal, French Death metal"), "Metal, french death metal");
        assert_eq!(capitalize(""), "");
    }
}
