//! Query phase: raw launcher text in, menu entries out.
//!
//! Routing never mutates remote state. Each handler reads what it needs from a
//! fresh remote call and describes possible mutations as action payloads.

mod catalog;
mod current;
mod playback;

pub use catalog::examples;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use crate::config::Preferences;
use crate::menu::{
    failure_entry, now_playing_entries, Action, EntryAction, Icon, MenuEntry,
};
use crate::remote::{Device, Playback, Remote, RemoteError};

pub type HandlerResult = Result<Vec<MenuEntry>, RemoteError>;

/// Query-phase handler: reads remote state, returns entries
pub type Handler = for<'a> fn(&'a Context<'a>, &'a [String]) -> BoxFuture<'a, HandlerResult>;

/// What a handler gets to work with
pub struct Context<'a> {
    pub remote: &'a dyn Remote,
    pub prefs: &'a Preferences,
}

/// How many arguments a command expects after its name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    None,
    Optional(&'static str),
    Required(&'static str),
}

pub struct CommandDescriptor {
    pub name: &'static str,
    pub arity: Arity,
    pub description: &'static str,
    pub handler: Handler,
}

impl CommandDescriptor {
    /// `volume [0-100]`, `track <query>`
    pub fn usage(&self) -> String {
        match self.arity {
            Arity::None => self.name.to_string(),
            Arity::Optional(hint) => format!("{} [{}]", self.name, hint),
            Arity::Required(hint) => format!("{} <{}>", self.name, hint),
        }
    }
}

/// Dispatch table, keyed by canonical command name
pub static COMMANDS: &[CommandDescriptor] = &[
    CommandDescriptor {
        name: "switch",
        arity: Arity::None,
        description: "Transfer playback to another device",
        handler: playback::switch,
    },
    CommandDescriptor {
        name: "album",
        arity: Arity::Required("query"),
        description: "Search for albums",
        handler: catalog::album,
    },
    CommandDescriptor {
        name: "track",
        arity: Arity::Required("query"),
        description: "Search for tracks",
        handler: catalog::track,
    },
    CommandDescriptor {
        name: "artist",
        arity: Arity::Required("query"),
        description: "Search for artists",
        handler: catalog::artist,
    },
    CommandDescriptor {
        name: "playlist",
        arity: Arity::Required("query"),
        description: "Search for playlists",
        handler: catalog::playlist,
    },
    CommandDescriptor {
        name: "search",
        arity: Arity::Required("query"),
        description: "Search albums, tracks, artists and playlists at once",
        handler: catalog::search,
    },
    CommandDescriptor {
        name: "repeat",
        arity: Arity::None,
        description: "Show or change the repeat mode",
        handler: playback::repeat,
    },
    CommandDescriptor {
        name: "shuffle",
        arity: Arity::None,
        description: "Show or change shuffle",
        handler: playback::shuffle,
    },
    CommandDescriptor {
        name: "history",
        arity: Arity::None,
        description: "Recently played tracks",
        handler: playback::history,
    },
    CommandDescriptor {
        name: "volume",
        arity: Arity::Optional("0-100"),
        description: "Show or set the playback volume",
        handler: playback::volume,
    },
    CommandDescriptor {
        name: "save",
        arity: Arity::None,
        description: "Save the current track to your library",
        handler: current::save,
    },
    CommandDescriptor {
        name: "lyrics",
        arity: Arity::None,
        description: "Look up lyrics for the current track",
        handler: current::lyrics,
    },
    CommandDescriptor {
        name: "recommend",
        arity: Arity::Optional("count"),
        description: "Queue tracks similar to the current one",
        handler: current::recommend,
    },
    CommandDescriptor {
        name: "help",
        arity: Arity::None,
        description: "List available commands",
        handler: help,
    },
];

pub fn lookup(name: &str) -> Option<&'static CommandDescriptor> {
    COMMANDS.iter().find(|descriptor| descriptor.name == name)
}

/// Raw input split into a command token and its arguments
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Query {
    pub command: Option<String>,
    pub args: Vec<String>,
}

pub fn tokenize(input: &str) -> Query {
    let mut tokens = input.split_whitespace().map(str::to_string);
    Query {
        command: tokens.next(),
        args: tokens.collect(),
    }
}

/// Resolve a launcher query into menu entries.
///
/// Every failure ends up as a displayable entry.
pub async fn route(remote: &dyn Remote, prefs: &Preferences, input: &str) -> Vec<MenuEntry> {
    if !remote.has_credential() {
        log::debug!("No cached credential, offering authorization");
        return vec![auth_entry()];
    }

    let query = tokenize(input);
    let ctx = Context { remote, prefs };

    let result = match &query.command {
        None => no_argument(&ctx).await,
        Some(token) => {
            let name = prefs.aliases().resolve(token);
            if name != token.as_str() {
                log::debug!("Command '{}' is an alias for '{}'", token, name);
            }
            match lookup(name) {
                Some(descriptor) => {
                    log::debug!("Routing '{}' with arguments {:?}", name, query.args);
                    if descriptor.arity == Arity::None && !query.args.is_empty() {
                        log::debug!("'{}' takes no arguments, ignoring {:?}", name, query.args);
                    }
                    (descriptor.handler)(&ctx, &query.args).await
                }
                None => {
                    log::debug!("Unknown command '{}'", token);
                    Ok(vec![unknown_command_entry(token, prefs)])
                }
            }
        }
    };

    result.unwrap_or_else(|e| {
        // A rejected refresh drops the credential mid-query
        if !remote.has_credential() {
            log::debug!("Credential lost during '{}': {}", input.trim(), e);
            return vec![auth_entry()];
        }
        vec![failure_entry(&e)]
    })
}

pub fn auth_entry() -> MenuEntry {
    MenuEntry::new(
        "Authorization",
        "Authorize the extension with your Spotify account",
    )
    .on_enter(Action::Auth.once())
}

pub fn unknown_command_entry(command: &str, prefs: &Preferences) -> MenuEntry {
    MenuEntry::notice(
        format!("Unknown command: {}", command),
        format!("Type '{} help' to see the available commands", prefs.keyword()),
    )
}

pub(crate) fn nothing_playing_entry() -> MenuEntry {
    MenuEntry::notice("Nothing is playing at this moment", "Start playing first")
}

pub(crate) fn no_devices_entry() -> MenuEntry {
    MenuEntry::notice(
        "No active devices running Spotify found",
        "Open Spotify on one of your devices first",
    )
}

/// Current playback, but only when something is loaded
pub(crate) async fn active_playback(ctx: &Context<'_>) -> Result<Option<Playback>, RemoteError> {
    let playback = ctx.remote.current_playback().await?;
    Ok(playback.filter(Playback::is_active))
}

async fn no_argument(ctx: &Context<'_>) -> HandlerResult {
    if let Some(playback) = ctx.remote.current_playback().await? {
        let entries = now_playing_entries(&playback, ctx.prefs);
        if !entries.is_empty() {
            return Ok(entries);
        }
    }

    let entries: Vec<MenuEntry> = ctx
        .remote
        .devices()
        .await?
        .iter()
        .filter_map(start_playback_entry)
        .collect();

    if entries.is_empty() {
        return Ok(vec![no_devices_entry()]);
    }
    Ok(entries)
}

fn start_playback_entry(device: &Device) -> Option<MenuEntry> {
    let id = device.id.clone()?;
    Some(
        MenuEntry::new(
            format!("Start playback on {} {}", device.kind.to_lowercase(), device.name),
            format!("Device id: {}", id),
        )
        .icon(Icon::Play)
        .on_enter(Action::play_on(id).keep_displayed()),
    )
}

fn help<'a>(ctx: &'a Context<'a>, _args: &'a [String]) -> BoxFuture<'a, HandlerResult> {
    async move {
        let keyword = ctx.prefs.keyword();
        let mut entries = vec![MenuEntry::new(
            "Spotify launcher commands",
            format!("Type '{} <command>' or select one below", keyword),
        )];
        entries.extend(
            COMMANDS
                .iter()
                .filter(|descriptor| descriptor.name != "help")
                .map(|descriptor| {
                    MenuEntry::new(
                        format!("{} {}", keyword, descriptor.usage()),
                        descriptor.description,
                    )
                    .on_enter(EntryAction::SetQuery(format!("{} {} ", keyword, descriptor.name)))
                }),
        );
        Ok(entries)
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Token, TokenCache};
    use crate::remote::SpotifyClient;
    use crate::remote::fake::{device, playing, track, Call, FakeRemote};
    use chrono::{Duration, Utc};

    #[test]
    fn test_tokenize() {
        assert_eq!(tokenize(""), Query::default());
        assert_eq!(tokenize("   "), Query::default());

        let query = tokenize("  track  led zep   no quarter ");
        assert_eq!(query.command.as_deref(), Some("track"));
        assert_eq!(query.args, vec!["led", "zep", "no", "quarter"]);
    }

    #[test]
    fn test_every_command_is_unique() {
        for (i, descriptor) in COMMANDS.iter().enumerate() {
            assert!(
                COMMANDS[i + 1..].iter().all(|other| other.name != descriptor.name),
                "duplicate command {}",
                descriptor.name
            );
            assert!(std::ptr::eq(lookup(descriptor.name).unwrap(), descriptor));
        }
        assert!(lookup("dance").is_none());
    }

    #[tokio::test]
    async fn test_unauthenticated_short_circuits() {
        let remote = FakeRemote::unauthorized();
        let entries = route(&remote, &Preferences::default(), "track no quarter").await;

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].payload().unwrap().action, Action::Auth);
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn test_expired_token_without_refresh_asks_for_authorization() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TokenCache::new(dir.path().join("token.json"));
        cache
            .save(&Token {
                access_token: "stale".into(),
                refresh_token: None,
                scope: String::new(),
                expires_at: Utc::now() - Duration::hours(1),
            })
            .unwrap();
        let client = SpotifyClient::new(cache).unwrap();

        for input in ["", "track no quarter", "help"] {
            let entries = route(&client, &Preferences::default(), input).await;
            assert_eq!(entries.len(), 1, "'{}'", input);
            assert_eq!(entries[0].payload().unwrap().action, Action::Auth, "'{}'", input);
        }
    }

    #[tokio::test]
    async fn test_credential_lost_mid_query_asks_for_authorization() {
        let remote = FakeRemote::new().revoke_on("current_playback");
        let entries = route(&remote, &Preferences::default(), "").await;

        assert_eq!(entries, vec![auth_entry()]);
        assert_eq!(remote.calls(), vec![Call::CurrentPlayback]);

        // A plain 401 with the credential intact is still a failure entry
        let remote = FakeRemote::new().fail("current_playback", RemoteError::new(401, -1, "scope"));
        let entries = route(&remote, &Preferences::default(), "").await;
        assert_ne!(entries, vec![auth_entry()]);
    }

    #[tokio::test]
    async fn test_no_argument_shows_now_playing() {
        let remote = FakeRemote::new().with_playback(playing(track("1", "Foals", "Inhaler"), true));
        let entries = route(&remote, &Preferences::default(), "").await;

        assert_eq!(entries[0].title, "Foals -- Inhaler");
        assert_eq!(remote.calls(), vec![Call::CurrentPlayback]);
    }

    #[tokio::test]
    async fn test_no_argument_offers_devices() {
        let remote = FakeRemote::new().with_devices(vec![
            device("d1", "Kitchen", "Speaker", false),
            device("d2", "Phone", "Smartphone", false),
        ]);
        let entries = route(&remote, &Preferences::default(), "").await;

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].title, "Start playback on speaker Kitchen");
        let payload = entries[1].payload().unwrap();
        assert_eq!(payload.action, Action::play_on("d2".to_string()));
        assert!(payload.keep_displayed);
    }

    #[tokio::test]
    async fn test_no_argument_without_devices() {
        let remote = FakeRemote::new();
        let entries = route(&remote, &Preferences::default(), "").await;

        assert_eq!(entries, vec![no_devices_entry()]);
        assert_eq!(remote.calls(), vec![Call::CurrentPlayback, Call::Devices]);
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let remote = FakeRemote::new();
        let entries = route(&remote, &Preferences::default(), "dance now").await;

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Unknown command: dance");
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn test_alias_routes_like_canonical() {
        let prefs = Preferences::default();
        let aliased = FakeRemote::new();
        let canonical = FakeRemote::new();

        let a = route(&aliased, &prefs, "s foo").await;
        let b = route(&canonical, &prefs, "search foo").await;

        assert_eq!(a, b);
        assert_eq!(aliased.calls(), canonical.calls());
    }

    #[tokio::test]
    async fn test_remote_failure_becomes_entry() {
        let remote = FakeRemote::new().fail("current_playback", RemoteError::new(503, -1, "down"));
        let entries = route(&remote, &Preferences::default(), "").await;

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Spotify: 503");
    }

    #[tokio::test]
    async fn test_help_lists_every_other_command() {
        let remote = FakeRemote::new();
        let entries = route(&remote, &Preferences::default(), "help").await;

        assert_eq!(entries.len(), COMMANDS.len());
        assert_eq!(entries[0].primary_action, EntryAction::Nothing);
        assert!(entries
            .iter()
            .skip(1)
            .all(|e| matches!(&e.primary_action, EntryAction::SetQuery(q) if q.starts_with("sp "))));
        assert!(entries.iter().any(|e| e.title == "sp volume [0-100]"
            && e.primary_action == EntryAction::SetQuery("sp volume ".to_string())));
        assert!(!entries.iter().any(|e| e.title.starts_with("sp help")));
    }
}
