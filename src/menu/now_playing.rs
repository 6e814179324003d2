use super::{format_clock, Action, EntryAction, Icon, MenuEntry};
use crate::config::Preferences;
use crate::remote::{Playback, PlayingItem};

/// Build the "now playing" menu from a fresh playback read.
///
/// Returns nothing when no track or episode is loaded.
pub fn now_playing_entries(playback: &Playback, prefs: &Preferences) -> Vec<MenuEntry> {
    let Some(item) = &playback.item else {
        return Vec::new();
    };

    let (title, context) = match item {
        PlayingItem::Track(track) => (
            format!("{} -- {}", track.artist_names(), track.name),
            format!("Album: {}", track.album.name),
        ),
        PlayingItem::Episode(episode) => (
            format!("{} -- {}", episode.name, episode.show.name),
            format!("Podcast: {}", episode.show.name),
        ),
    };

    let status = if playback.is_playing { "Playing" } else { "Paused" };
    let progress = format_clock(playback.progress_ms.unwrap_or(0));
    let duration = format_clock(item.duration_ms());
    let description = format!(
        "{} | {} on: {} {} | {}/{}",
        context,
        status,
        playback.device.kind.to_lowercase(),
        playback.device.name,
        progress,
        duration
    );

    // Pausing closes the launcher; resuming keeps it open to show the new state
    let (icon, toggle) = if playback.is_playing {
        (Icon::Pause, Action::Pause.once())
    } else {
        (Icon::Play, Action::resume().keep_displayed())
    };

    let mut entries = vec![
        MenuEntry::new(title, description).icon(icon).on_enter(toggle),
        MenuEntry::new("Next track", "Skip playback to next track")
            .icon(Icon::Next)
            .on_enter(Action::Next.keep_displayed()),
        MenuEntry::new("Previous track", "Skip playback to previous track")
            .icon(Icon::Previous)
            .on_enter(Action::Prev.keep_displayed()),
    ];

    if prefs.show_help() {
        entries.push(
            MenuEntry::new("Help", "Show all available commands")
                .on_enter(EntryAction::SetQuery(format!("{} help", prefs.keyword()))),
        );
    }

    entries
}
