use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use panedeck_core::session::{
    InboundEvent, OutboundEvent, RequestId, SessionChannel, SubscriptionId,
};
#[cfg(unix)]
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
#[cfg(unix)]
use tokio::net::UnixStream;
use tokio::sync::{mpsc, oneshot};
#[cfg(unix)]
use tokio::time::timeout;
use tracing::{debug, error, warn};

use crate::protocol::ClientFrame;
#[cfg(unix)]
use crate::protocol::parse_server_line;

/// [`SessionChannel`] over the backend's Unix socket.
///
/// The socket is driven by a current-thread tokio runtime on its own thread.
/// Outbound frames are queued without blocking; inbound events are buffered
/// until the owner calls [`SocketChannel::drain`], which fans each event out
/// to every live subscription.
pub struct SocketChannel {
    socket_path: PathBuf,
    outbound: mpsc::UnboundedSender<ClientFrame>,
    inbound: mpsc::UnboundedReceiver<InboundEvent>,
    subscriptions: Vec<SubscriptionId>,
    next_subscription: SubscriptionId,
    next_request: RequestId,
    shutdown_tx: Option<oneshot::Sender<()>>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl SocketChannel {
    pub fn connect(socket_path: impl AsRef<Path>) -> Result<Self> {
        Self::connect_with_timeout(socket_path, Duration::from_secs(3))
    }

    /// Starts the connection thread. A backend that cannot be reached is not
    /// an error here: it is reported as a `connect_error` event.
    pub fn connect_with_timeout(socket_path: impl AsRef<Path>, connect_timeout: Duration) -> Result<Self> {
        let socket_path = socket_path.as_ref().to_path_buf();
        let (outbound, outbound_rx) = mpsc::unbounded_channel::<ClientFrame>();
        let (inbound_tx, inbound) = mpsc::unbounded_channel::<InboundEvent>();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        #[cfg(not(unix))]
        {
            let _ = (outbound_rx, shutdown_rx, connect_timeout);
            let _ = inbound_tx.send(InboundEvent::ConnectError {
                message: "session socket is only implemented for unix in this build".into(),
            });
            return Ok(Self::from_parts(socket_path, outbound, inbound, shutdown_tx, None));
        }

        #[cfg(unix)]
        {
            let path_for_thread = socket_path.clone();
            let thread = std::thread::Builder::new()
                .name("panedeck-session-socket".to_string())
                .spawn(move || {
                    let rt = match tokio::runtime::Builder::new_current_thread()
                        .enable_io()
                        .enable_time()
                        .build()
                    {
                        Ok(rt) => rt,
                        Err(e) => {
                            error!("failed to build tokio runtime for session socket: {e}");
                            let _ = inbound_tx.send(InboundEvent::ConnectError {
                                message: e.to_string(),
                            });
                            return;
                        }
                    };
                    rt.block_on(run_connection(
                        path_for_thread,
                        connect_timeout,
                        outbound_rx,
                        inbound_tx,
                        shutdown_rx,
                    ));
                })?;
            Ok(Self::from_parts(socket_path, outbound, inbound, shutdown_tx, Some(thread)))
        }
    }

    fn from_parts(
        socket_path: PathBuf,
        outbound: mpsc::UnboundedSender<ClientFrame>,
        inbound: mpsc::UnboundedReceiver<InboundEvent>,
        shutdown_tx: oneshot::Sender<()>,
        thread: Option<std::thread::JoinHandle<()>>,
    ) -> Self {
        Self {
            socket_path,
            outbound,
            inbound,
            subscriptions: Vec::new(),
            next_subscription: 0,
            next_request: 0,
            shutdown_tx: Some(shutdown_tx),
            thread,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn live_subscriptions(&self) -> &[SubscriptionId] {
        &self.subscriptions
    }

    /// Everything received since the last call, one copy per live
    /// subscription. Never blocks. Events that arrive while nobody is
    /// subscribed are dropped.
    pub fn drain(&mut self) -> Vec<(SubscriptionId, InboundEvent)> {
        let mut delivered = Vec::new();
        while let Ok(event) = self.inbound.try_recv() {
            if self.subscriptions.is_empty() {
                debug!(?event, "dropping event with no subscribers");
                continue;
            }
            for &subscription in &self.subscriptions {
                delivered.push((subscription, event.clone()));
            }
        }
        delivered
    }
}

impl SessionChannel for SocketChannel {
    fn subscribe(&mut self) -> SubscriptionId {
        self.next_subscription += 1;
        self.subscriptions.push(self.next_subscription);
        self.next_subscription
    }

    fn unsubscribe(&mut self, id: SubscriptionId) {
        self.subscriptions.retain(|s| *s != id);
    }

    fn emit(&mut self, event: OutboundEvent) -> RequestId {
        self.next_request += 1;
        let name = event.name();
        if self.outbound.send(ClientFrame::new(self.next_request, event)).is_err() {
            warn!(event = name, "session socket closed; dropping event");
        }
        self.next_request
    }
}

impl Drop for SocketChannel {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

#[cfg(unix)]
async fn run_connection(
    socket_path: PathBuf,
    connect_timeout: Duration,
    mut outbound_rx: mpsc::UnboundedReceiver<ClientFrame>,
    inbound_tx: mpsc::UnboundedSender<InboundEvent>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let stream = match timeout(connect_timeout, UnixStream::connect(&socket_path)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            warn!("failed to connect to session socket {}: {e}", socket_path.display());
            let _ = inbound_tx.send(InboundEvent::ConnectError {
                message: e.to_string(),
            });
            return;
        }
        Err(_) => {
            warn!("session socket connect timeout: {}", socket_path.display());
            let _ = inbound_tx.send(InboundEvent::ConnectError {
                message: "connect timeout".to_string(),
            });
            return;
        }
    };
    debug!("connected to {}", socket_path.display());

    let (reader_half, mut writer_half) = stream.into_split();
    let mut lines = BufReader::new(reader_half).lines();

    loop {
        tokio::select! {
            _ = &mut shutdown_rx => break,
            frame = outbound_rx.recv() => {
                let Some(frame) = frame else { break };
                let mut payload = match serde_json::to_vec(&frame) {
                    Ok(data) => data,
                    Err(e) => {
                        warn!("failed to encode frame: {e}");
                        continue;
                    }
                };
                payload.push(b'\n');
                if let Err(e) = writer_half.write_all(&payload).await {
                    warn!("session socket write failed: {e}");
                    let _ = inbound_tx.send(InboundEvent::ConnectError { message: e.to_string() });
                    break;
                }
            }
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => match parse_server_line(&line) {
                        Some(Ok(frame)) => {
                            if inbound_tx.send(frame.into()).is_err() {
                                break;
                            }
                        }
                        Some(Err(e)) => warn!("ignoring malformed frame: {e}"),
                        None => {}
                    },
                    Ok(None) => {
                        let _ = inbound_tx.send(InboundEvent::ConnectError {
                            message: "connection closed by backend".to_string(),
                        });
                        break;
                    }
                    Err(e) => {
                        warn!("session socket read failed: {e}");
                        let _ = inbound_tx.send(InboundEvent::ConnectError { message: e.to_string() });
                        break;
                    }
                }
            }
        }
    }
}
