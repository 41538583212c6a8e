use crate::guards;
use crate::realtime::listeners::{Listener, ListenerRegistry, Subscription};
use crate::realtime::models::{
    InboundMessage, OutboundMessage, SubmitOutcome, VoteAckMessage, VotesUpdateMessage,
};
use crate::realtime::transport::{Connector, EventReceiver, Transport, TransportEvent};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// What happened to one transport event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Connected,
    Dispatched,
    Dropped,
    Closed,
}

struct OpenChannel<T> {
    transport: T,
    events: EventReceiver,
}

/// Owns the single live-update connection and the two listener registries.
///
/// Rebinding closes the previous transport and drops its event queue, so
/// nothing the old socket still delivers can reach a listener.
pub struct ChannelManager<C: Connector> {
    connector: C,
    channel: Option<OpenChannel<C::Transport>>,
    bound_poll_id: Option<String>,
    updates: ListenerRegistry<VotesUpdateMessage>,
    acks: ListenerRegistry<VoteAckMessage>,
}

impl<C: Connector> ChannelManager<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            channel: None,
            bound_poll_id: None,
            updates: ListenerRegistry::new(),
            acks: ListenerRegistry::new(),
        }
    }

    /// Returns false when the transport could not even be started; the
    /// poll id is still recorded so `submit` reports "not connected".
    pub fn bind(&mut self, poll_id: &str) -> bool {
        self.close_channel();

        info!("binding realtime channel to poll {}", poll_id);
        self.bound_poll_id = Some(poll_id.to_string());

        let (tx, rx) = mpsc::unbounded_channel();
        match self.connector.open(poll_id, tx) {
            Ok(transport) => {
                self.channel = Some(OpenChannel {
                    transport,
                    events: rx,
                });
                true
            }
            Err(e) => {
                warn!("could not open realtime channel for poll {}: {}", poll_id, e);
                false
            }
        }
    }

    /// Safe to call repeatedly. Listener registrations survive.
    pub fn unbind(&mut self) {
        self.close_channel();
        if let Some(poll_id) = self.bound_poll_id.take() {
            info!("unbound realtime channel from poll {}", poll_id);
        }
    }

    /// Like `unbind`, but waits until frames already accepted by `submit`
    /// have been written and the socket has closed.
    pub async fn unbind_flushed(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            if let Err(e) = channel.transport.close() {
                debug!("ignoring realtime close error: {}", e);
            }
            channel.transport.finished().await;
        }
        self.unbind();
    }

    fn close_channel(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            if let Err(e) = channel.transport.close() {
                debug!("ignoring realtime close error: {}", e);
            }
        }
    }

    pub fn bound_poll_id(&self) -> Option<&str> {
        self.bound_poll_id.as_deref()
    }

    pub fn is_connected(&self) -> bool {
        self.channel
            .as_ref()
            .is_some_and(|channel| channel.transport.is_open())
    }

    pub fn subscribe_updates(&self, listener: Listener<VotesUpdateMessage>) -> Subscription {
        self.updates.subscribe(listener)
    }

    pub fn subscribe_acks(&self, listener: Listener<VoteAckMessage>) -> Subscription {
        self.acks.subscribe(listener)
    }

    /// Dispatches a vote attempt. Never waits for the server; the outcome
    /// of the vote itself arrives later as a `vote_ack`.
    ///
    /// `bind` records the poll id before storing a channel, so the
    /// `MISSING_POLL_ID` rejection is unreachable while that holds; it is
    /// kept as a precondition check rather than a tested path.
    pub fn submit(&self, option_id: &str, user_id: Option<&str>) -> SubmitOutcome {
        let Some(channel) = self
            .channel
            .as_ref()
            .filter(|channel| channel.transport.is_open())
        else {
            return SubmitOutcome::rejected(SubmitOutcome::NOT_CONNECTED);
        };
        let Some(poll_id) = self.bound_poll_id.as_deref() else {
            return SubmitOutcome::rejected(SubmitOutcome::MISSING_POLL_ID);
        };

        let message = OutboundMessage::VoteCast {
            poll_id: poll_id.to_string(),
            option_id: option_id.to_string(),
            user_id: user_id.map(str::to_string),
        };
        let payload = match serde_json::to_string(&message) {
            Ok(payload) => payload,
            Err(e) => return SubmitOutcome::rejected(&e.to_string()),
        };

        match channel.transport.send_text(payload) {
            Ok(()) => {
                debug!("vote_cast sent for poll {} option {}", poll_id, option_id);
                SubmitOutcome::accepted()
            }
            Err(e) => {
                warn!("vote_cast for poll {} not sent: {}", poll_id, e);
                SubmitOutcome::rejected(SubmitOutcome::NOT_CONNECTED)
            }
        }
    }

    /// Waits for the next event on the current binding and dispatches it.
    /// `None` when nothing is bound.
    pub async fn next_event(&mut self) -> Option<ChannelEvent> {
        let channel = self.channel.as_mut()?;

        let event = match channel.events.recv().await {
            Some(TransportEvent::Opened) => ChannelEvent::Connected,
            Some(TransportEvent::Text(text)) => self.dispatch_frame(&text),
            Some(TransportEvent::Error(e)) => {
                warn!("realtime channel error: {}", e);
                ChannelEvent::Closed
            }
            Some(TransportEvent::Closed) | None => ChannelEvent::Closed,
        };
        Some(event)
    }

    /// Parses one text frame and fans it out. Anything that is not JSON or
    /// not a known message shape is dropped.
    pub fn dispatch_frame(&self, text: &str) -> ChannelEvent {
        let value: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(_) => {
                debug!("dropping non-JSON realtime frame");
                return ChannelEvent::Dropped;
            }
        };

        match guards::to_inbound_message(value) {
            Some(InboundMessage::VotesUpdate(update)) => {
                debug!(
                    "votes_update poll {} option {} -> {}",
                    update.poll_id, update.option_id, update.vote_count
                );
                self.updates.emit(&update);
                ChannelEvent::Dispatched
            }
            Some(InboundMessage::VoteAck(ack)) => {
                debug!("vote_ack poll {} success={}", ack.poll_id, ack.success);
                self.acks.emit(&ack);
                ChannelEvent::Dispatched
            }
            None => {
                debug!("dropping unrecognised realtime frame");
                ChannelEvent::Dropped
            }
        }
    }
}
