//! Menu entries and the deferred actions they carry.
//!
//! Entries are built at query time and never touch the remote. Everything a
//! selection needs later travels inside the entry's `ActionPayload`, which the
//! host hands back verbatim as JSON.

mod failure;
mod now_playing;

pub use failure::failure_entry;
pub use now_playing::now_playing_entries;

use serde::{Deserialize, Serialize};

use crate::remote::{smallest_image, Image, RecommendationSeed, RepeatState};

/// Icon reference; resolved to a file by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "url", rename_all = "snake_case")]
pub enum Icon {
    App,
    Play,
    Pause,
    Next,
    Previous,
    RepeatOff,
    RepeatContext,
    RepeatTrack,
    ShuffleOn,
    ShuffleOff,
    /// Remote artwork, fetched through the artwork cache
    Artwork(String),
}

impl Icon {
    /// Bundled image for the built-in icons
    pub fn file_name(&self) -> Option<&'static str> {
        let name = match self {
            Icon::App => "icon.png",
            Icon::Play => "play.png",
            Icon::Pause => "pause.png",
            Icon::Next => "next.png",
            Icon::Previous => "prev.png",
            Icon::RepeatOff => "repeat_off.png",
            Icon::RepeatContext => "repeat_context.png",
            Icon::RepeatTrack => "repeat_track.png",
            Icon::ShuffleOn => "shuffle_on.png",
            Icon::ShuffleOff => "shuffle_off.png",
            Icon::Artwork(_) => return None,
        };
        Some(name)
    }

    pub fn for_repeat(state: RepeatState) -> Icon {
        match state {
            RepeatState::Off => Icon::RepeatOff,
            RepeatState::Context => Icon::RepeatContext,
            RepeatState::Track => Icon::RepeatTrack,
        }
    }

    pub fn for_shuffle(state: bool) -> Icon {
        if state {
            Icon::ShuffleOn
        } else {
            Icon::ShuffleOff
        }
    }

    /// Smallest artwork variant, or the app icon when there is none
    pub fn artwork(images: &[Image]) -> Icon {
        smallest_image(images)
            .map(|image| Icon::Artwork(image.url.clone()))
            .unwrap_or(Icon::App)
    }
}

/// A remote mutation, tagged by its canonical command name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Action {
    Auth,
    Pause,
    Play {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        device_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        context_uri: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        uris: Vec<String>,
    },
    Queue {
        uri: String,
    },
    Next,
    Prev,
    Switch {
        device_id: String,
    },
    Shuffle {
        state: bool,
    },
    Repeat {
        state: RepeatState,
    },
    Volume {
        state: u8,
    },
    Save {
        uri: String,
    },
    Recommend {
        seed: RecommendationSeed,
        limit: u8,
    },
}

impl Action {
    pub fn command(&self) -> &'static str {
        match self {
            Action::Auth => "auth",
            Action::Pause => "pause",
            Action::Play { .. } => "play",
            Action::Queue { .. } => "queue",
            Action::Next => "next",
            Action::Prev => "prev",
            Action::Switch { .. } => "switch",
            Action::Shuffle { .. } => "shuffle",
            Action::Repeat { .. } => "repeat",
            Action::Volume { .. } => "volume",
            Action::Save { .. } => "save",
            Action::Recommend { .. } => "recommend",
        }
    }

    /// Resume whatever is loaded on the active device
    pub fn resume() -> Action {
        Action::Play {
            device_id: None,
            context_uri: None,
            uris: Vec::new(),
        }
    }

    pub fn play_uris(uris: Vec<String>) -> Action {
        Action::Play {
            device_id: None,
            context_uri: None,
            uris,
        }
    }

    pub fn play_context(context_uri: String) -> Action {
        Action::Play {
            device_id: None,
            context_uri: Some(context_uri),
            uris: Vec::new(),
        }
    }

    pub fn play_on(device_id: String) -> Action {
        Action::Play {
            device_id: Some(device_id),
            context_uri: None,
            uris: Vec::new(),
        }
    }

    /// Payload that closes the launcher after running
    pub fn once(self) -> ActionPayload {
        ActionPayload {
            action: self,
            keep_displayed: false,
        }
    }

    /// Payload that re-shows the now-playing menu after running
    pub fn keep_displayed(self) -> ActionPayload {
        ActionPayload {
            action: self,
            keep_displayed: true,
        }
    }
}

/// Serializable, self-describing deferred action.
///
/// `{"command": "play", "uris": ["spotify:track:x"], "keep_displayed": false}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionPayload {
    #[serde(flatten)]
    pub action: Action,
    #[serde(default)]
    pub keep_displayed: bool,
}

/// What happens when an entry is chosen
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum EntryAction {
    /// Nothing; the entry is informational
    #[default]
    Nothing,
    /// Close the launcher
    Hide,
    /// Replace the query text, keeping the launcher open
    SetQuery(String),
    /// Open a link in the browser
    OpenUrl(String),
    /// Hand the payload back for execution
    Custom(ActionPayload),
}

impl From<ActionPayload> for EntryAction {
    fn from(payload: ActionPayload) -> Self {
        EntryAction::Custom(payload)
    }
}

/// One displayable, selectable row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuEntry {
    pub title: String,
    pub description: String,
    pub icon: Icon,
    pub primary_action: EntryAction,
    pub secondary_action: EntryAction,
    pub compact: bool,
}

impl MenuEntry {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        MenuEntry {
            title: title.into(),
            description: description.into(),
            icon: Icon::App,
            primary_action: EntryAction::Nothing,
            secondary_action: EntryAction::Nothing,
            compact: false,
        }
    }

    /// Informational entry that just closes the launcher
    pub fn notice(title: impl Into<String>, description: impl Into<String>) -> Self {
        MenuEntry::new(title, description).on_enter(EntryAction::Hide)
    }

    pub fn icon(mut self, icon: Icon) -> Self {
        self.icon = icon;
        self
    }

    pub fn on_enter(mut self, action: impl Into<EntryAction>) -> Self {
        self.primary_action = action.into();
        self
    }

    pub fn on_alt_enter(mut self, action: impl Into<EntryAction>) -> Self {
        self.secondary_action = action.into();
        self
    }

    pub fn compact(mut self) -> Self {
        self.compact = true;
        self
    }

    /// The payload run on enter, if any
    pub fn payload(&self) -> Option<&ActionPayload> {
        match &self.primary_action {
            EntryAction::Custom(payload) => Some(payload),
            _ => None,
        }
    }

    /// The payload run on alt-enter, if any
    pub fn alt_payload(&self) -> Option<&ActionPayload> {
        match &self.secondary_action {
            EntryAction::Custom(payload) => Some(payload),
            _ => None,
        }
    }
}

/// Clock style: `H:MM:SS` when there are hours, `M:SS` otherwise
pub fn format_clock(ms: u64) -> String {
    let total = ms / 1000;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

/// Spelled-out style used in result descriptions: `1h 2m 3s`, `3m 5s`
pub fn format_duration(ms: u64) -> String {
    let total = ms / 1000;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    let mut parts = Vec::new();
    if hours > 0 {
        parts.push(format!("{}h", hours));
    }
    if minutes > 0 {
        parts.push(format!("{}m", minutes));
    }
    if seconds > 0 || parts.is_empty() {
        parts.push(format!("{}s", seconds));
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(0), "0:00");
        assert_eq!(format_clock(65_000), "1:05");
        assert_eq!(format_clock(599_999), "9:59");
        assert_eq!(format_clock(3_725_000), "1:02:05");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(185_000), "3m 5s");
        assert_eq!(format_duration(3_600_000), "1h");
        assert_eq!(format_duration(3_725_000), "1h 2m 5s");
        assert_eq!(format_duration(400), "0s");
    }

    #[test]
    fn test_payload_wire_shape() {
        let payload = Action::play_uris(vec!["spotify:track:1".into()]).once();
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({"command": "play", "uris": ["spotify:track:1"], "keep_displayed": false})
        );

        let payload = Action::Recommend {
            seed: RecommendationSeed {
                artists: vec!["a1".into()],
                genres: vec![],
                track: "spotify:track:1".into(),
            },
            limit: 5,
        }
        .once();
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["command"], "recommend");
        assert_eq!(value["seed"]["artists"], json!(["a1"]));
        assert_eq!(value["limit"], 5);
    }

    #[test]
    fn test_payload_accepts_host_json() {
        // keep_displayed is optional on the way back in
        let payload: ActionPayload =
            serde_json::from_value(json!({"command": "volume", "state": 55})).unwrap();
        assert_eq!(payload.action, Action::Volume { state: 55 });
        assert!(!payload.keep_displayed);

        let payload: ActionPayload =
            serde_json::from_value(json!({"command": "repeat", "state": "track", "keep_displayed": true}))
                .unwrap();
        assert_eq!(payload.action, Action::Repeat { state: RepeatState::Track });
        assert!(payload.keep_displayed);

        assert!(serde_json::from_value::<ActionPayload>(json!({"command": "dance"})).is_err());
    }

    #[test]
    fn test_artwork_icon_picks_smallest() {
        let images = vec![
            Image { url: "640".into(), height: Some(640), width: None },
            Image { url: "64".into(), height: Some(64), width: None },
        ];
        assert_eq!(Icon::artwork(&images), Icon::Artwork("64".into()));
        assert_eq!(Icon::artwork(&[]), Icon::App);
    }
}
