use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

use panedeck_core::persist::LayoutSnapshot;
use panedeck_core::{Config, FileStore, HistoryStore, KvStore, LinkDetector, PaneManager};

#[derive(Debug, Parser)]
#[command(name = "panedeck-cli", about = "Inspect panedeck's saved layout and session history")]
struct Cli {
    /// Override data directory (default: platform data dir)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Override the client id selecting the layout record
    #[arg(long)]
    client_id: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Layout {
        #[command(subcommand)]
        action: LayoutAction,
    },
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
    /// Scan text for links the terminal would make clickable
    Links { text: String },
}

#[derive(Debug, Subcommand)]
enum LayoutAction {
    /// Print the saved layout; with a container size, also the pane rectangles
    Show {
        #[arg(long)]
        width: Option<f32>,
        #[arg(long)]
        height: Option<f32>,
    },
    /// Forget the saved layout
    Reset,
}

#[derive(Debug, Subcommand)]
enum HistoryAction {
    List,
    Show {
        session: String,
        /// Print the reconstructed terminal buffer instead of entries
        #[arg(long)]
        raw: bool,
    },
    Clear { session: String },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = Config::load().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config: {}, using defaults", e);
        Config::default()
    });
    if let Some(dir) = cli.data_dir {
        config.general.data_dir = dir.to_string_lossy().into_owned();
    }
    if let Some(client_id) = cli.client_id {
        config.general.client_id = client_id;
    }

    let data_dir = config.data_dir();
    let store: Arc<dyn KvStore> = Arc::new(
        FileStore::open(&data_dir)
            .with_context(|| format!("failed to open data dir {}", data_dir.display()))?,
    );

    let result = match cli.command {
        Command::Layout { action } => match action {
            LayoutAction::Show { width, height } => {
                let container = width.zip(height);
                layout_show(&config, store.as_ref(), container)
            }
            LayoutAction::Reset => layout_reset(&config, store.as_ref())?,
        },
        Command::History { action } => {
            let history = HistoryStore::new(store, config.history.clone());
            match action {
                HistoryAction::List => history_list(&history),
                HistoryAction::Show { session, raw: true } => {
                    if let Some(buffer) = history.reconstruct_buffer(&session) {
                        print!("{buffer}");
                    }
                    return Ok(());
                }
                HistoryAction::Show { session, raw: false } => {
                    serde_json::to_value(history.load(&session))?
                }
                HistoryAction::Clear { session } => {
                    history.clear(&session);
                    json!({ "cleared": session })
                }
            }
        }
        Command::Links { text } => links(&text),
    };

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn layout_show(config: &Config, store: &dyn KvStore, container: Option<(f32, f32)>) -> Value {
    let key = config.layout_key();
    let mut panes = PaneManager::new(config.layout.clone());
    if !panes.load_layout(store, &key) {
        return json!({ "key": key, "saved": false });
    }
    let mut report = json!({
        "key": key,
        "saved": true,
        "snapshot": LayoutSnapshot::capture(&panes),
    });
    if let Some((width, height)) = container {
        let rects = panes.calculate_pane_dimensions(width, height);
        let rects: serde_json::Map<String, Value> = rects
            .into_iter()
            .map(|(id, rect)| (id.to_string(), json!(rect)))
            .collect();
        report["dimensions"] = Value::Object(rects);
    }
    report
}

fn layout_reset(config: &Config, store: &dyn KvStore) -> Result<Value> {
    let key = config.layout_key();
    store
        .remove(&key)
        .with_context(|| format!("failed to remove {key}"))?;
    Ok(json!({ "removed": key }))
}

fn history_list(history: &HistoryStore) -> Value {
    let sessions: Vec<Value> = history
        .sessions()
        .into_iter()
        .map(|session| {
            let entries = history.load(&session);
            let chars: usize = entries.iter().map(|e| e.content.chars().count()).sum();
            json!({
                "session": session,
                "entries": entries.len(),
                "chars": chars,
                "last": entries.last().map(|e| e.timestamp),
            })
        })
        .collect();
    Value::Array(sessions)
}

fn links(text: &str) -> Value {
    let detector = LinkDetector::with_defaults();
    let found: serde_json::Map<String, Value> = detector
        .test_string(text)
        .into_iter()
        .map(|(kind, matches)| (kind, json!(matches)))
        .collect();
    Value::Object(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use panedeck_core::{HistoryKind, PaneOptions, SplitDirection};

    fn setup() -> (tempfile::TempDir, Config, Arc<dyn KvStore>) {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = Config::default();
        config.general.data_dir = dir.path().to_string_lossy().into_owned();
        let store: Arc<dyn KvStore> = Arc::new(FileStore::open(dir.path()).expect("store"));
        (dir, config, store)
    }

    #[test]
    fn layout_show_reports_missing_layout() {
        let (_dir, config, store) = setup();
        let report = layout_show(&config, store.as_ref(), None);
        assert_eq!(report, json!({ "key": "pane_layout_default", "saved": false }));
    }

    #[test]
    fn layout_show_includes_dimensions() {
        let (_dir, config, store) = setup();
        let mut panes = PaneManager::default();
        let a = panes.create_pane(PaneOptions::default()).id;
        let b = panes
            .split_pane(a, SplitDirection::Vertical)
            .expect("split")
            .id;
        assert!(panes.save_layout(store.as_ref(), &config.layout_key()));

        let report = layout_show(&config, store.as_ref(), Some((800.0, 600.0)));
        assert_eq!(report["saved"], true);
        assert_eq!(report["snapshot"]["layout"]["type"], "split");
        assert_eq!(report["dimensions"][a.to_string()]["width"], 400.0);
        assert_eq!(report["dimensions"][b.to_string()]["x"], 400.0);

        layout_reset(&config, store.as_ref()).expect("reset");
        assert_eq!(layout_show(&config, store.as_ref(), None)["saved"], false);
    }

    #[test]
    fn history_list_counts_entries() {
        let (_dir, config, store) = setup();
        let history = HistoryStore::new(store, config.history.clone());
        history.append("s1", HistoryKind::Output, "abc");
        history.append("s1", HistoryKind::Input, "ls");
        history.append("s1", HistoryKind::Output, "né");
        let list = history_list(&history);
        assert_eq!(list[0]["session"], "s1");
        assert_eq!(list[0]["entries"], 3);
        assert_eq!(list[0]["chars"], 7);
    }

    #[test]
    fn links_groups_matches_by_kind() {
        let found = links("see https://example.com/docs and 10.0.0.1:8080");
        assert_eq!(found["url"][0]["text"], "https://example.com/docs");
        assert_eq!(found["ipv4"][0]["text"], "10.0.0.1:8080");
        assert!(found.get("email").is_none());
    }
}
