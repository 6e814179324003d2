//! Selection phase: run the one mutation a payload describes.

use serde_json::Value;

use crate::config::Preferences;
use crate::menu::{failure_entry, now_playing_entries, Action, ActionPayload, MenuEntry};
use crate::remote::{PlayRequest, Remote, RemoteError};

/// What the host should do once a payload has run
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Close the launcher
    Hide,
    /// Show these entries instead
    Render(Vec<MenuEntry>),
}

pub fn unknown_payload_entry() -> MenuEntry {
    MenuEntry::notice(
        "Empty or unknown command",
        "The selected entry carries no action this version understands",
    )
}

/// Decode a payload handed back by the host and run it
pub async fn execute_value(remote: &dyn Remote, prefs: &Preferences, value: Value) -> Outcome {
    match serde_json::from_value::<ActionPayload>(value) {
        Ok(payload) => execute(remote, prefs, &payload).await,
        Err(e) => {
            log::warn!("Discarding undecodable payload: {}", e);
            Outcome::Render(vec![unknown_payload_entry()])
        }
    }
}

/// Run one payload.
///
/// On success with `keep_displayed` set this waits for the consistency delay
/// once, reads playback again and returns the fresh now-playing menu.
pub async fn execute(remote: &dyn Remote, prefs: &Preferences, payload: &ActionPayload) -> Outcome {
    log::debug!(
        "Executing '{}' (keep displayed: {})",
        payload.action.command(),
        payload.keep_displayed
    );

    if payload.action == Action::Auth {
        if let Err(e) = remote.authorize(prefs.auth_port()).await {
            log::error!("Authorization failed: {}", e);
        }
        return Outcome::Hide;
    }

    if let Err(e) = perform(remote, &payload.action).await {
        return Outcome::Render(vec![failure_entry(&e)]);
    }

    if !payload.keep_displayed {
        return Outcome::Hide;
    }

    let delay = prefs.consistency_delay();
    log::debug!("Waiting {:?} before refreshing playback", delay);
    tokio::time::sleep(delay).await;

    match remote.current_playback().await {
        Ok(Some(playback)) => {
            let entries = now_playing_entries(&playback, prefs);
            if entries.is_empty() {
                Outcome::Hide
            } else {
                Outcome::Render(entries)
            }
        }
        Ok(None) => Outcome::Hide,
        Err(e) => Outcome::Render(vec![failure_entry(&e)]),
    }
}

async fn perform(remote: &dyn Remote, action: &Action) -> Result<(), RemoteError> {
    match action {
        Action::Auth => Ok(()),
        Action::Pause => remote.pause().await,
        Action::Play {
            device_id,
            context_uri,
            uris,
        } => {
            // Explicit uris win over a context
            let request = PlayRequest {
                device_id: device_id.clone(),
                context_uri: if uris.is_empty() { context_uri.clone() } else { None },
                uris: uris.clone(),
            };
            remote.play(&request).await
        }
        Action::Queue { uri } => remote.enqueue(uri).await,
        Action::Next => remote.next().await,
        Action::Prev => remote.previous().await,
        Action::Switch { device_id } => remote.transfer(device_id).await,
        Action::Shuffle { state } => remote.set_shuffle(*state).await,
        Action::Repeat { state } => remote.set_repeat(*state).await,
        Action::Volume { state } => remote.set_volume((*state).min(100)).await,
        Action::Save { uri } => remote.save_tracks(std::slice::from_ref(uri)).await,
        Action::Recommend { seed, limit } => {
            let tracks = remote.recommendations(seed, *limit).await?;
            log::debug!("Queueing {} recommended tracks", tracks.len());
            for track in tracks {
                remote.enqueue(&track.uri).await?;
            }
            Ok(())
        }
    }
}
