use super::MenuEntry;
use crate::remote::{RemoteError, RemoteErrorKind};

/// Turn a failed remote call into the single entry shown in its place.
/// Nothing is retried here; the user can simply select again.
pub fn failure_entry(error: &RemoteError) -> MenuEntry {
    log::debug!("Remote call failed: {}", error);

    match error.kind() {
        RemoteErrorKind::Forbidden => MenuEntry::notice(
            "Spotify: 403 Forbidden",
            "Forbidden to access this endpoint or the playback state has changed",
        ),
        RemoteErrorKind::Unauthorized => MenuEntry::notice(
            "Spotify: 401 Unauthorized",
            "The scope of the request is probably not authorized",
        ),
        RemoteErrorKind::NotFound => MenuEntry::notice(
            "Spotify: 404 Not Found",
            "The request is probably incomplete or the resource is missing",
        ),
        RemoteErrorKind::RetryLater => MenuEntry::notice(
            format!("Spotify: {}", error.status),
            "Spotify asks to try again later",
        ),
        RemoteErrorKind::Other => {
            log::warn!("Unexpected remote failure: {}", error);
            MenuEntry::notice(
                format!("Spotify exception: {}", error.status),
                format!("Code: {}, msg: {}", error.code, error.message),
            )
        }
    }
}
