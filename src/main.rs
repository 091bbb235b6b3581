use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use panedeck_core::session::InitOptions;
use panedeck_core::{
    Config, FileStore, HistoryStore, KvStore, LinkDetector, PaneManager, PaneOptions,
    SessionObserver, SessionState, TerminalSessionViewModel, TerminalWidget,
};
use panedeck_ipc::SocketChannel;

const SCROLLBACK_LINES: usize = 10_000;

#[derive(Debug, Parser)]
#[command(name = "panedeck", about = "Attach a terminal session to stdin/stdout")]
struct Cli {
    /// Attach to an existing session instead of creating one
    #[arg(long)]
    session: Option<String>,

    /// Override socket path (default: ~/.config/panedeck/panedeck.sock)
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Session mode sent with `create`
    #[arg(long)]
    mode: Option<String>,
}

/// Writes session output straight to stdout and keeps a plain-text copy of
/// the scrollback for snapshots.
#[derive(Default)]
struct StdoutWidget {
    lines: Vec<String>,
}

impl TerminalWidget for StdoutWidget {
    fn write(&mut self, text: &str) {
        let mut out = std::io::stdout().lock();
        if let Err(e) = out.write_all(text.as_bytes()).and_then(|_| out.flush()) {
            warn!("stdout write failed: {e}");
        }

        let mut parts = text.split('\n');
        if let Some(first) = parts.next() {
            match self.lines.last_mut() {
                Some(last) => last.push_str(first),
                None => self.lines.push(first.to_string()),
            }
        }
        self.lines.extend(parts.map(str::to_string));
        if self.lines.len() > SCROLLBACK_LINES {
            let excess = self.lines.len() - SCROLLBACK_LINES;
            self.lines.drain(..excess);
        }
    }

    fn resize(&mut self, cols: u16, rows: u16) {
        debug!(cols, rows, "terminal resized");
    }

    fn focus(&mut self) {}

    fn clear(&mut self) {
        self.lines.clear();
    }

    fn buffer_len(&self) -> usize {
        self.lines.len()
    }

    fn line(&self, index: usize) -> Option<String> {
        self.lines
            .get(index)
            .map(|l| l.replace('\r', "").trim_end().to_string())
    }
}

struct HeadlessObserver {
    links: LinkDetector,
    redirected: bool,
}

impl SessionObserver for HeadlessObserver {
    fn state_changed(&mut self, state: SessionState) {
        debug!(?state, "session state changed");
    }

    fn output_line(&mut self, line: &str) {
        for link in self.links.provide_links_for_line(line) {
            debug!(kind = %link.kind, text = %link.text, "link detected");
        }
    }

    fn error(&mut self, message: &str) {
        warn!("{message}");
    }

    fn session_bound(&mut self, session_id: &str) {
        info!("attached to session {session_id}");
    }

    fn redirect(&mut self) {
        self.redirected = true;
    }
}

fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the terminal.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("panedeck v{}", env!("CARGO_PKG_VERSION"));
    let cli = Cli::parse();

    let config = Config::load().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config: {}, using defaults", e);
        Config::default()
    });

    let data_dir = config.data_dir();
    let store: Arc<dyn KvStore> = Arc::new(
        FileStore::open(&data_dir)
            .with_context(|| format!("failed to open data dir {}", data_dir.display()))?,
    );

    let layout_key = config.layout_key();
    let mut panes = PaneManager::new(config.layout.clone());
    if !panes.load_layout(store.as_ref(), &layout_key) {
        panes.create_pane(PaneOptions::titled("terminal"));
    }
    let pane_id = panes
        .focused_pane_id()
        .context("layout has no focused pane")?;
    let session = cli
        .session
        .or_else(|| panes.pane(pane_id).and_then(|p| p.session_id.clone()));

    let socket_path = cli.socket.unwrap_or_else(|| config.socket_path());
    let channel = SocketChannel::connect(&socket_path)?;
    let history = HistoryStore::new(store.clone(), config.history.clone());
    let observer = HeadlessObserver {
        links: LinkDetector::with_defaults(),
        redirected: false,
    };
    let mut vm = TerminalSessionViewModel::new(
        channel,
        StdoutWidget::default(),
        observer,
        history,
        config.session.clone(),
    );
    vm.bind_pane(pane_id);
    vm.widget_ready();
    vm.initialize(InitOptions {
        session_id: session,
        mode: cli.mode,
        ..InitOptions::default()
    });

    let mut stdin = spawn_stdin_reader()?;
    let result = run(&mut vm, &mut stdin);

    if let Some(session_id) = vm.session_id() {
        panes.bind_session(pane_id, session_id);
    }
    if vm.state() != SessionState::Ended {
        vm.detach();
    }
    if !panes.save_layout(store.as_ref(), &layout_key) {
        warn!("layout was not saved");
    }
    result
}

type HeadlessViewModel = TerminalSessionViewModel<SocketChannel, StdoutWidget, HeadlessObserver>;

fn run(vm: &mut HeadlessViewModel, stdin: &mut mpsc::UnboundedReceiver<String>) -> Result<()> {
    loop {
        for (subscription, event) in vm.channel_mut().drain() {
            if let Err(e) = vm.handle_event(subscription, event) {
                bail!("{e}");
            }
        }

        loop {
            match stdin.try_recv() {
                Ok(line) => {
                    if let Err(e) = vm.send_input(&format!("{line}\r")) {
                        warn!("input dropped: {e}");
                    }
                }
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    debug!("stdin closed");
                    return Ok(());
                }
            }
        }

        vm.tick(Instant::now());
        if vm.observer().redirected {
            return Ok(());
        }
        std::thread::sleep(Duration::from_millis(10));
    }
}

fn spawn_stdin_reader() -> Result<mpsc::UnboundedReceiver<String>> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::Builder::new()
        .name("panedeck-stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("stdin read failed: {e}");
                        break;
                    }
                }
            }
        })
        .context("failed to spawn stdin reader")?;
    Ok(rx)
}
