//! Socket plumbing under the channel manager.
//!
//! A `Connector` opens one `Transport` per binding and reports everything
//! the socket does through the `EventSender` it was handed. The websocket
//! implementation runs the socket on a spawned task, so `open`, `send_text`
//! and `close` never block the caller.

use crate::error::ChannelError;
use futures::{SinkExt, StreamExt};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened,
    Text(String),
    Closed,
    Error(String),
}

pub type EventSender = mpsc::UnboundedSender<TransportEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<TransportEvent>;

pub trait Transport {
    /// True only while the socket is connected and accepting frames.
    fn is_open(&self) -> bool;

    fn send_text(&self, text: String) -> Result<(), ChannelError>;

    /// Starts a graceful close. Frames already handed to `send_text` are
    /// still written before the close frame. Closing twice is an error the
    /// caller may ignore.
    fn close(&mut self) -> Result<(), ChannelError>;

    /// Resolves once the socket has stopped, after `close` or a server close.
    fn finished(&mut self) -> impl Future<Output = ()> {
        async {}
    }
}

pub trait Connector {
    type Transport: Transport;

    fn open(&self, poll_id: &str, events: EventSender) -> Result<Self::Transport, ChannelError>;
}

#[derive(Debug, Clone)]
pub struct WsConnector {
    base_url: Url,
}

impl WsConnector {
    pub fn new(base_url: Url) -> Self {
        Self { base_url }
    }

    /// `<base>/votes/<poll_id>`, with the poll id as a single path segment.
    pub fn channel_url(&self, poll_id: &str) -> Result<Url, ChannelError> {
        let mut channel_url = self.base_url.clone();
        {
            let mut segments = channel_url
                .path_segments_mut()
                .map_err(|_| ChannelError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?;
            segments.pop_if_empty().push("votes").push(poll_id);
        }
        Ok(channel_url)
    }
}

impl Connector for WsConnector {
    type Transport = WsTransport;

    fn open(&self, poll_id: &str, events: EventSender) -> Result<WsTransport, ChannelError> {
        let channel_url = self.channel_url(poll_id)?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| ChannelError::NoRuntime)?;

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(false));
        let shutdown = CancellationToken::new();

        let task = runtime.spawn(run_socket(
            channel_url,
            outbound_rx,
            events,
            open.clone(),
            shutdown.clone(),
        ));

        Ok(WsTransport {
            outbound: outbound_tx,
            open,
            shutdown,
            task: Some(task),
        })
    }
}

pub struct WsTransport {
    outbound: mpsc::UnboundedSender<String>,
    open: Arc<AtomicBool>,
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Transport for WsTransport {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire) && !self.shutdown.is_cancelled()
    }

    fn send_text(&self, text: String) -> Result<(), ChannelError> {
        self.outbound.send(text).map_err(|_| ChannelError::Closed)
    }

    fn close(&mut self) -> Result<(), ChannelError> {
        if self.shutdown.is_cancelled() {
            return Err(ChannelError::Closed);
        }
        self.shutdown.cancel();
        Ok(())
    }

    fn finished(&mut self) -> impl Future<Output = ()> {
        let task = self.task.take();
        async move {
            if let Some(task) = task {
                if let Err(e) = task.await {
                    debug!("realtime socket task ended abnormally: {}", e);
                }
            }
        }
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn run_socket(
    channel_url: Url,
    mut outbound: mpsc::UnboundedReceiver<String>,
    events: EventSender,
    open: Arc<AtomicBool>,
    shutdown: CancellationToken,
) {
    let connected = tokio::select! {
        _ = shutdown.cancelled() => return,
        result = connect_async(channel_url.as_str()) => result,
    };

    let stream = match connected {
        Ok((stream, _response)) => stream,
        Err(e) => {
            warn!("realtime channel {} failed to connect: {}", channel_url, e);
            let _ = events.send(TransportEvent::Error(e.to_string()));
            return;
        }
    };

    let (mut write, mut read) = stream.split();
    open.store(true, Ordering::Release);
    info!("realtime channel connected: {}", channel_url);
    let _ = events.send(TransportEvent::Opened);

    let ended = loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                open.store(false, Ordering::Release);
                while let Ok(text) = outbound.try_recv() {
                    if let Err(e) = write.send(Message::text(text)).await {
                        warn!("queued frame not delivered to {}: {}", channel_url, e);
                        break;
                    }
                }
                if let Err(e) = write.send(Message::Close(None)).await {
                    debug!("close frame not delivered to {}: {}", channel_url, e);
                }
                break None;
            }

            Some(text) = outbound.recv() => {
                if let Err(e) = write.send(Message::text(text)).await {
                    warn!("realtime channel {} send failed: {}", channel_url, e);
                    break Some(TransportEvent::Error(e.to_string()));
                }
            }

            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let _ = events.send(TransportEvent::Text(text.as_str().to_owned()));
                }
                Some(Ok(Message::Close(_))) | None => {
                    info!("realtime channel {} closed by server", channel_url);
                    break Some(TransportEvent::Closed);
                }
                // binary, ping and pong frames carry nothing for listeners
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("realtime channel {} error: {}", channel_url, e);
                    break Some(TransportEvent::Error(e.to_string()));
                }
            }
        }
    };

    open.store(false, Ordering::Release);
    if let Some(event) = ended {
        let _ = events.send(event);
    }
}
