use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;

use spotify_launcher::artwork::ArtworkCache;
use spotify_launcher::executor::Outcome;
use spotify_launcher::launcher::Launcher;
use spotify_launcher::menu::{EntryAction, Icon, MenuEntry};
use spotify_launcher::remote::Remote;

/// Get the path to the history file
fn get_history_file_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".spotify-launcher_history"))
}

fn describe_action(action: &EntryAction) -> Option<String> {
    match action {
        EntryAction::Nothing => None,
        EntryAction::Hide => Some("close".to_string()),
        EntryAction::SetQuery(text) => Some(format!("query '{}'", text)),
        EntryAction::OpenUrl(url) => Some(format!("open {}", url)),
        EntryAction::Custom(payload) => Some(payload.action.command().to_string()),
    }
}

/// Bundled icon name, or the cached artwork file for remote images
async fn icon_label(artwork: &ArtworkCache, icon: &Icon) -> String {
    match icon {
        Icon::Artwork(url) => match artwork.fetch(url).await {
            Ok(path) => path.display().to_string(),
            Err(e) => {
                log::debug!("Artwork unavailable: {}", e);
                Icon::App.file_name().unwrap_or_default().to_string()
            }
        },
        other => other.file_name().unwrap_or_default().to_string(),
    }
}

/// Print numbered entries the way a launcher would list them
async fn render(entries: &[MenuEntry], artwork: &ArtworkCache) {
    println!();
    if entries.is_empty() {
        println!("  {}", "(no entries)".dimmed());
        println!();
        return;
    }

    for (i, entry) in entries.iter().enumerate() {
        let icon = icon_label(artwork, &entry.icon).await;
        println!(
            "  {} {}  {}",
            format!("{:>2}.", i + 1).cyan(),
            entry.title.bold(),
            format!("[{}]", icon).dimmed()
        );
        if !entry.description.is_empty() && !entry.compact {
            println!("      {}", entry.description);
        }

        let mut actions = Vec::new();
        if let Some(primary) = describe_action(&entry.primary_action) {
            actions.push(format!("enter: {}", primary));
        }
        if let Some(secondary) = describe_action(&entry.secondary_action) {
            actions.push(format!("alt: {}", secondary));
        }
        if !actions.is_empty() {
            println!("      {}", actions.join(" | ").green());
        }
    }
    println!();
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Handle a one-shot query
pub async fn handle_query<R: Remote>(
    launcher: &Launcher<R>,
    artwork: &ArtworkCache,
    text: &str,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let entries = launcher.on_query(text).await;
    if json {
        print_json(&entries)
    } else {
        render(&entries, artwork).await;
        Ok(())
    }
}

/// Handle a one-shot selection of a JSON payload
pub async fn handle_select<R: Remote>(
    launcher: &Launcher<R>,
    artwork: &ArtworkCache,
    payload: &str,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let value: serde_json::Value = serde_json::from_str(payload)?;
    match launcher.on_select(value).await {
        Outcome::Hide => {
            if json {
                print_json(&Vec::<MenuEntry>::new())?;
            }
        }
        Outcome::Render(entries) => {
            if json {
                print_json(&entries)?;
            } else {
                render(&entries, artwork).await;
            }
        }
    }
    Ok(())
}

/// What the user typed at the interactive prompt
#[derive(Debug, PartialEq)]
enum Input<'a> {
    Quit,
    Help,
    Select { index: usize, alt: bool },
    Set { key: &'a str, value: &'a str },
    Query(&'a str),
}

fn parse_input(line: &str) -> Result<Input<'_>, String> {
    if line == "quit" || line == "exit" {
        return Ok(Input::Quit);
    }
    if line == ":help" {
        return Ok(Input::Help);
    }

    if let Some(selection) = line.strip_prefix(':') {
        let mut parts = selection.split_whitespace();
        let index = parts
            .next()
            .and_then(|n| n.parse::<usize>().ok())
            .filter(|n| *n > 0)
            .ok_or_else(|| format!("Not an entry number: {}", line))?;
        let alt = match parts.next() {
            None => false,
            Some("alt") => true,
            Some(other) => return Err(format!("Expected ':{} alt', got '{}'", index, other)),
        };
        return Ok(Input::Select { index, alt });
    }

    if let Some(rest) = line.strip_prefix("set ") {
        let rest = rest.trim_start();
        return match rest.split_once(char::is_whitespace) {
            Some((key, value)) => Ok(Input::Set {
                key,
                value: value.trim(),
            }),
            None => Err("Usage: set <key> <value>".to_string()),
        };
    }

    Ok(Input::Query(line))
}

fn print_help() {
    println!();
    println!("  Type a query the way you would in the launcher, e.g. 'sp track no quarter'.");
    println!("    :N                 - Run entry N");
    println!("    :N alt             - Run entry N's alternative action");
    println!("    set <key> <value>  - Change a preference");
    println!("    :help              - Show this help message");
    println!("    quit               - Exit interactive mode");
    println!();
}

/// Handle interactive mode - a launcher session with history support
pub async fn handle_interactive<R: Remote>(
    launcher: &Launcher<R>,
    artwork: &ArtworkCache,
) -> Result<(), Box<dyn std::error::Error>> {
    println!();
    println!("Spotify Launcher - Interactive Mode");
    println!("Type ':help' for usage, 'quit' to exit.");
    println!("Use arrow keys or Ctrl-P/Ctrl-N to navigate command history.");
    println!();

    let mut rl = DefaultEditor::new()?;
    let history_path = get_history_file_path();
    if let Some(path) = &history_path {
        if path.exists() {
            if let Err(e) = rl.load_history(path) {
                log::warn!("Could not load history from {}: {}", path.display(), e);
            }
        }
    }

    // Entries currently on screen, addressed by :N
    let mut entries: Vec<MenuEntry> = Vec::new();

    loop {
        let prompt = format!("{}> ", launcher.preferences().keyword());
        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);

                match parse_input(line) {
                    Ok(Input::Quit) => break,
                    Ok(Input::Help) => print_help(),
                    Ok(Input::Query(text)) => {
                        entries = launcher.on_query(text).await;
                        render(&entries, artwork).await;
                    }
                    Ok(Input::Set { key, value }) => {
                        let old = launcher
                            .preferences()
                            .settings()
                            .get(key)
                            .unwrap_or_default();
                        match launcher.on_preference_change(key, &old, value) {
                            Ok(()) => println!("  {} = {}", key, value),
                            Err(e) => println!("  {} {}", "Error:".red(), e),
                        }
                        println!();
                    }
                    Ok(Input::Select { index, alt }) => {
                        let Some(entry) = entries.get(index - 1) else {
                            println!("  {} no entry {}", "Error:".red(), index);
                            println!();
                            continue;
                        };
                        let action = if alt {
                            entry.secondary_action.clone()
                        } else {
                            entry.primary_action.clone()
                        };
                        entries = run_action(launcher, artwork, action).await?;
                    }
                    Err(e) => {
                        println!("  {} {}", "Error:".red(), e);
                        println!();
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl-C - just print newline and continue
                println!();
            }
            Err(ReadlineError::Eof) => {
                println!();
                break;
            }
            Err(err) => {
                println!("  Error: {:?}", err);
                break;
            }
        }
    }

    if let Some(path) = &history_path {
        if let Err(e) = rl.save_history(path) {
            log::warn!("Could not save history to {}: {}", path.display(), e);
        }
    }
    if let Err(e) = artwork.clear() {
        log::warn!("{}", e);
    }

    Ok(())
}

/// Carry out a selected entry action, returning what is now on screen
async fn run_action<R: Remote>(
    launcher: &Launcher<R>,
    artwork: &ArtworkCache,
    action: EntryAction,
) -> Result<Vec<MenuEntry>, Box<dyn std::error::Error>> {
    match action {
        EntryAction::Nothing => {
            println!("  {}", "Nothing to do".dimmed());
            println!();
            Ok(Vec::new())
        }
        EntryAction::Hide => {
            println!("  {}", "(closed)".dimmed());
            println!();
            Ok(Vec::new())
        }
        EntryAction::SetQuery(text) => {
            println!("  {} {}", "Query:".dimmed(), text);
            let entries = launcher.on_query(&text).await;
            render(&entries, artwork).await;
            Ok(entries)
        }
        EntryAction::OpenUrl(url) => {
            println!("  {} {}", "Open:".dimmed(), url.underline());
            println!();
            Ok(Vec::new())
        }
        EntryAction::Custom(payload) => {
            match launcher.on_select(serde_json::to_value(&payload)?).await {
                Outcome::Hide => {
                    println!("  {} {}", "Done:".green(), payload.action.command());
                    println!();
                    Ok(Vec::new())
                }
                Outcome::Render(entries) => {
                    render(&entries, artwork).await;
                    Ok(entries)
                }
            }
        }
    }
}
