use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use super::catalog::track_entry;
use super::{active_playback, no_devices_entry, nothing_playing_entry, Context, HandlerResult};
use crate::menu::{Action, EntryAction, Icon, MenuEntry};
use crate::remote::{RepeatState, MAX_PAGE_LIMIT};

pub(super) fn switch<'a>(ctx: &'a Context<'a>, _args: &'a [String]) -> BoxFuture<'a, HandlerResult> {
    async move {
        let entries: Vec<MenuEntry> = ctx
            .remote
            .devices()
            .await?
            .into_iter()
            .filter_map(|device| {
                let id = device.id?;
                let mut description = format!("Device id: {}", id);
                if device.is_active {
                    description = format!("Current device | {}", description);
                }
                Some(
                    MenuEntry::new(
                        format!("Switch playback to {} {}", device.kind.to_lowercase(), device.name),
                        description,
                    )
                    .on_enter(Action::Switch { device_id: id }.once()),
                )
            })
            .collect();

        if entries.is_empty() {
            return Ok(vec![no_devices_entry()]);
        }
        Ok(entries)
    }
    .boxed()
}

fn repeat_label(state: RepeatState) -> &'static str {
    match state {
        RepeatState::Off => "do not repeat",
        RepeatState::Context => "repeat context",
        RepeatState::Track => "repeat track",
    }
}

fn shuffle_label(state: bool) -> &'static str {
    if state {
        "shuffle"
    } else {
        "do not shuffle"
    }
}

pub(super) fn repeat<'a>(ctx: &'a Context<'a>, _args: &'a [String]) -> BoxFuture<'a, HandlerResult> {
    async move {
        let Some(playback) = active_playback(ctx).await? else {
            return Ok(vec![nothing_playing_entry()]);
        };
        let current = playback.repeat_state;

        let mut entries = vec![MenuEntry::new(
            format!("Current state: {}", repeat_label(current)),
            "Select one of the options below to change it",
        )
        .icon(Icon::for_repeat(current))
        .compact()];

        entries.extend(RepeatState::ALL.into_iter().filter(|s| *s != current).map(|state| {
            MenuEntry::new(format!("Set to {}", repeat_label(state)), "")
                .icon(Icon::for_repeat(state))
                .on_enter(Action::Repeat { state }.once())
                .compact()
        }));
        Ok(entries)
    }
    .boxed()
}

pub(super) fn shuffle<'a>(ctx: &'a Context<'a>, _args: &'a [String]) -> BoxFuture<'a, HandlerResult> {
    async move {
        let Some(playback) = active_playback(ctx).await? else {
            return Ok(vec![nothing_playing_entry()]);
        };
        let current = playback.shuffle_state;

        Ok(vec![
            MenuEntry::new(
                format!("Current state: {}", shuffle_label(current)),
                "Select the option below to change it",
            )
            .icon(Icon::for_shuffle(current))
            .compact(),
            MenuEntry::new(format!("Set to {}", shuffle_label(!current)), "")
                .icon(Icon::for_shuffle(!current))
                .on_enter(Action::Shuffle { state: !current }.once())
                .compact(),
        ])
    }
    .boxed()
}

pub(super) fn history<'a>(ctx: &'a Context<'a>, _args: &'a [String]) -> BoxFuture<'a, HandlerResult> {
    async move {
        let limit = ctx.prefs.result_limit().min(MAX_PAGE_LIMIT);
        let tracks = ctx.remote.recently_played(limit).await?;
        if tracks.is_empty() {
            return Ok(vec![MenuEntry::notice(
                "No recently played tracks",
                "Play something first and it will show up here",
            )]);
        }
        Ok(tracks.iter().map(track_entry).collect())
    }
    .boxed()
}

/// Accepts integers 0..=100 only
fn parse_volume(arg: &str) -> Option<u8> {
    arg.parse::<u8>().ok().filter(|v| *v <= 100)
}

pub(super) fn volume<'a>(ctx: &'a Context<'a>, args: &'a [String]) -> BoxFuture<'a, HandlerResult> {
    async move {
        let Some(playback) = active_playback(ctx).await? else {
            return Ok(vec![nothing_playing_entry()]);
        };

        let Some(arg) = args.first() else {
            let current = playback
                .device
                .volume_percent
                .map(|v| format!("{}%", v))
                .unwrap_or_else(|| "unknown".to_string());
            return Ok(vec![
                MenuEntry::new(
                    format!("Volume: {}", current),
                    format!("Type '{} volume <0-100>' to set it", ctx.prefs.keyword()),
                ),
                MenuEntry::new("Mute", "Set volume to 0%")
                    .on_enter(Action::Volume { state: 0 }.once()),
                MenuEntry::new("Full volume", "Set volume to 100%")
                    .on_enter(Action::Volume { state: 100 }.once()),
            ]);
        };

        match parse_volume(arg) {
            Some(state) => Ok(vec![MenuEntry::new(
                format!("Set volume to {}%", state),
                format!("Currently on {}", playback.device.name),
            )
            .on_enter(Action::Volume { state }.once())]),
            None => {
                log::debug!("Rejecting volume argument '{}'", arg);
                Ok(vec![MenuEntry::new(
                    "Volume must be a whole number between 0 and 100",
                    format!("'{}' is not a valid volume, try again", arg),
                )
                .on_enter(EntryAction::SetQuery(format!("{} volume ", ctx.prefs.keyword())))])
            }
        }
    }
    .boxed()
}
