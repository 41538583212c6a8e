use crate::api::client::PollsClient;
use crate::api::models::Poll;
use crate::error::LoadError;
use crate::realtime::{
    ChannelEvent, ChannelManager, Connector, SubmitOutcome, Subscription, VoteAckMessage,
    VotesUpdateMessage,
};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, info, warn};

pub const VOTE_FAILED: &str = "Vote failed";

/// The poll currently on screen plus the separately shown vote error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollView {
    poll: Option<Poll>,
    vote_error: Option<String>,
}

impl PollView {
    pub fn seed(&mut self, poll: Poll) {
        self.poll = Some(poll);
    }

    pub fn clear(&mut self) {
        self.poll = None;
        self.vote_error = None;
    }

    pub fn poll(&self) -> Option<&Poll> {
        self.poll.as_ref()
    }

    pub fn vote_error(&self) -> Option<&str> {
        self.vote_error.as_deref()
    }

    pub fn set_vote_error(&mut self, message: impl Into<String>) {
        self.vote_error = Some(message.into());
    }

    /// Overwrites one option's count. Updates for another poll or an
    /// unknown option change nothing. Returns whether a count was replaced.
    pub fn apply_update(&mut self, update: &VotesUpdateMessage) -> bool {
        let Some(poll) = self.poll.as_mut() else {
            return false;
        };
        if poll.id != update.poll_id {
            debug!(
                "ignoring votes_update for poll {} while showing {}",
                update.poll_id, poll.id
            );
            return false;
        }

        match poll.options.iter_mut().find(|opt| opt.id == update.option_id) {
            Some(option) => {
                option.vote_count = update.vote_count;
                true
            }
            None => false,
        }
    }

    pub fn apply_ack(&mut self, ack: &VoteAckMessage) {
        if ack.success {
            self.vote_error = None;
        } else {
            let message = ack
                .error
                .as_ref()
                .map(|e| e.message.as_str())
                .filter(|m| !m.is_empty())
                .unwrap_or(VOTE_FAILED);
            self.vote_error = Some(message.to_string());
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
    Loaded,
    LoadFailed(String),
    ChannelBound,
}

/// Identifies one load attempt. A ticket from an older attempt is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
}

/// Page-level lifecycle for a single poll: snapshot load, realtime binding,
/// vote actions and teardown.
pub struct PollPage<C: Connector> {
    channel: ChannelManager<C>,
    view: Rc<RefCell<PollView>>,
    state: LoadState,
    generation: u64,
    user_id: Option<String>,
    subscriptions: Vec<Subscription>,
}

impl<C: Connector> PollPage<C> {
    pub fn new(channel: ChannelManager<C>, user_id: Option<String>) -> Self {
        let view = Rc::new(RefCell::new(PollView::default()));
        let subscriptions = subscribe_view(&channel, &view);

        Self {
            channel,
            view,
            state: LoadState::Idle,
            generation: 0,
            user_id,
            subscriptions,
        }
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn view(&self) -> PollView {
        self.view.borrow().clone()
    }

    pub fn channel(&self) -> &ChannelManager<C> {
        &self.channel
    }

    /// Navigates to `poll_id`: supersedes any in-flight load, drops the
    /// previous binding and clears both error messages. A page reused after
    /// `teardown` subscribes its view again.
    pub fn begin_load(&mut self, poll_id: &str) -> LoadTicket {
        self.generation += 1;
        self.channel.unbind();
        if self.subscriptions.is_empty() {
            self.subscriptions = subscribe_view(&self.channel, &self.view);
        }
        self.view.borrow_mut().clear();
        self.state = LoadState::Loading;
        debug!("loading poll {} (generation {})", poll_id, self.generation);

        LoadTicket {
            generation: self.generation,
        }
    }

    /// Applies a finished load. Returns false, touching nothing, when the
    /// ticket was superseded by a later navigation or a teardown. A good
    /// snapshot leaves the page `Loaded`; it becomes `ChannelBound` when
    /// `next_event` sees the socket connect.
    pub fn finish_load(&mut self, ticket: LoadTicket, result: Result<Poll, LoadError>) -> bool {
        if ticket.generation != self.generation {
            debug!("discarding stale poll load (generation {})", ticket.generation);
            return false;
        }

        match result {
            Ok(poll) => {
                let poll_id = poll.id.clone();
                self.view.borrow_mut().seed(poll);
                self.state = LoadState::Loaded;
                self.channel.bind(&poll_id);
            }
            Err(e) => {
                warn!("poll load failed: {}", e);
                self.view.borrow_mut().clear();
                self.state = LoadState::LoadFailed(e.to_string());
            }
        }
        true
    }

    pub async fn load(&mut self, client: &PollsClient, poll_id: &str) -> bool {
        let ticket = self.begin_load(poll_id);
        let result = client.get_poll(poll_id).await;
        self.finish_load(ticket, result)
    }

    /// A rejected attempt is shown as the vote error right away.
    pub fn vote(&mut self, option_id: &str) -> SubmitOutcome {
        let outcome = self.channel.submit(option_id, self.user_id.as_deref());
        if !outcome.accepted {
            let reason = outcome.reason.as_deref().unwrap_or(VOTE_FAILED);
            self.view.borrow_mut().set_vote_error(reason);
        }
        outcome
    }

    /// Also moves the page between `Loaded` and `ChannelBound` as the
    /// socket connects and closes.
    pub async fn next_event(&mut self) -> Option<ChannelEvent> {
        let event = self.channel.next_event().await?;
        match event {
            ChannelEvent::Connected if self.state == LoadState::Loaded => {
                self.state = LoadState::ChannelBound;
            }
            ChannelEvent::Closed if self.state == LoadState::ChannelBound => {
                self.state = LoadState::Loaded;
            }
            _ => {}
        }
        Some(event)
    }

    /// Unsubscribes, unbinds and cancels any in-flight load. Idempotent.
    pub fn teardown(&mut self) {
        self.release();
        self.channel.unbind();
    }

    /// `teardown` that first lets queued votes reach the server.
    pub async fn shutdown(&mut self) {
        self.release();
        self.channel.unbind_flushed().await;
    }

    fn release(&mut self) {
        self.generation += 1;
        for mut subscription in self.subscriptions.drain(..) {
            subscription.unsubscribe();
        }
        self.view.borrow_mut().clear();
        self.state = LoadState::Idle;
    }
}

fn subscribe_view<C: Connector>(
    channel: &ChannelManager<C>,
    view: &Rc<RefCell<PollView>>,
) -> Vec<Subscription> {
    let on_update = view.clone();
    let updates = channel.subscribe_updates(Rc::new(move |update: &VotesUpdateMessage| {
        on_update.borrow_mut().apply_update(update);
    }));

    let on_ack = view.clone();
    let acks = channel.subscribe_acks(Rc::new(move |ack: &VoteAckMessage| {
        let mut view = on_ack.borrow_mut();
        if view.poll().is_some_and(|poll| poll.id == ack.poll_id) {
            view.apply_ack(ack);
        } else {
            debug!("ignoring vote_ack for poll {} not in view", ack.poll_id);
        }
    }));

    vec![updates, acks]
}

impl<C: Connector> Drop for PollPage<C> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ListState {
    Idle,
    Loading,
    Loaded(Vec<Poll>),
    LoadFailed(String),
}

/// The poll index: one snapshot of `GET /polls`.
#[derive(Debug)]
pub struct PollListPage {
    state: ListState,
    generation: u64,
}

impl Default for PollListPage {
    fn default() -> Self {
        Self {
            state: ListState::Idle,
            generation: 0,
        }
    }
}

impl PollListPage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ListState {
        &self.state
    }

    pub fn polls(&self) -> &[Poll] {
        match &self.state {
            ListState::Loaded(polls) => polls,
            _ => &[],
        }
    }

    pub fn begin_load(&mut self) -> LoadTicket {
        self.generation += 1;
        self.state = ListState::Loading;
        LoadTicket {
            generation: self.generation,
        }
    }

    pub fn finish_load(&mut self, ticket: LoadTicket, result: Result<Vec<Poll>, LoadError>) -> bool {
        if ticket.generation != self.generation {
            return false;
        }

        self.state = match result {
            Ok(polls) => {
                info!("poll index shows {} polls", polls.len());
                ListState::Loaded(polls)
            }
            Err(e) => {
                warn!("poll index load failed: {}", e);
                ListState::LoadFailed(e.to_string())
            }
        };
        true
    }

    pub async fn load(&mut self, client: &PollsClient) -> bool {
        let ticket = self.begin_load();
        let result = client.list_polls().await;
        self.finish_load(ticket, result)
    }

    /// Cancels an in-flight load.
    pub fn teardown(&mut self) {
        self.generation += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::fixtures::{option, poll};
    use crate::realtime::VoteAckError;

    fn update(poll_id: &str, option_id: &str, vote_count: u64) -> VotesUpdateMessage {
        VotesUpdateMessage {
            poll_id: poll_id.to_string(),
            option_id: option_id.to_string(),
            vote_count,
        }
    }

    fn ack(poll_id: &str, success: bool, error: Option<&str>) -> VoteAckMessage {
        VoteAckMessage {
            poll_id: poll_id.to_string(),
            option_id: "a".to_string(),
            success,
            error: error.map(|message| VoteAckError {
                code: "CONFLICT".to_string(),
                message: message.to_string(),
            }),
        }
    }

    fn seeded() -> PollView {
        let mut view = PollView::default();
        view.seed(poll("P", vec![option("P", "a", 0, 3), option("P", "b", 1, 0)]));
        view
    }

    #[test]
    fn update_replaces_only_the_matching_count() {
        let mut view = seeded();
        let before = view.poll().unwrap().clone();

        assert!(view.apply_update(&update("P", "b", 5)));

        let after = view.poll().unwrap();
        let counts: Vec<(&str, u64)> = after
            .options
            .iter()
            .map(|o| (o.id.as_str(), o.vote_count))
            .collect();
        assert_eq!(counts, vec![("a", 3), ("b", 5)]);

        let mut expected = before;
        expected.options[1].vote_count = 5;
        assert_eq!(after, &expected);
    }

    #[test]
    fn update_for_other_poll_changes_nothing() {
        let mut view = seeded();
        let before = view.clone();

        assert!(!view.apply_update(&update("Q", "b", 99)));
        assert_eq!(view, before);
    }

    #[test]
    fn update_for_unknown_option_creates_nothing() {
        let mut view = seeded();
        let before = view.clone();

        assert!(!view.apply_update(&update("P", "zzz", 1)));
        assert_eq!(view, before);
    }

    #[test]
    fn update_without_seed_is_ignored() {
        let mut view = PollView::default();
        assert!(!view.apply_update(&update("P", "a", 1)));
        assert_eq!(view, PollView::default());
    }

    #[test]
    fn later_update_wins_by_arrival() {
        let mut view = seeded();
        view.apply_update(&update("P", "a", 10));
        view.apply_update(&update("P", "a", 7));
        assert_eq!(view.poll().unwrap().options[0].vote_count, 7);
    }

    #[test]
    fn failed_ack_without_error_uses_fallback() {
        let mut view = seeded();
        view.apply_ack(&ack("P", false, None));
        assert_eq!(view.vote_error(), Some(VOTE_FAILED));
    }

    #[test]
    fn failed_ack_surfaces_server_message_and_success_clears_it() {
        let mut view = seeded();
        let poll_before = view.poll().cloned();

        view.apply_ack(&ack("P", false, Some("already voted")));
        assert_eq!(view.vote_error(), Some("already voted"));

        view.apply_ack(&ack("P", true, None));
        assert_eq!(view.vote_error(), None);
        assert_eq!(view.poll().cloned(), poll_before);
    }

    #[test]
    fn list_page_discards_stale_results() {
        let mut page = PollListPage::new();
        let first = page.begin_load();
        let second = page.begin_load();

        assert!(!page.finish_load(first, Ok(vec![poll("old", vec![])])));
        assert_eq!(page.state(), &ListState::Loading);

        assert!(page.finish_load(second, Ok(vec![poll("new", vec![])])));
        assert_eq!(page.polls()[0].id, "new");
    }

    #[test]
    fn list_page_records_failure_message() {
        let mut page = PollListPage::new();
        let ticket = page.begin_load();
        page.finish_load(
            ticket,
            Err(LoadError::Http {
                status: 503,
                reason: "Service Unavailable".to_string(),
            }),
        );

        assert_eq!(
            page.state(),
            &ListState::LoadFailed("HTTP 503 Service Unavailable".to_string())
        );
        assert!(page.polls().is_empty());
    }

    #[test]
    fn list_page_teardown_cancels_in_flight_load() {
        let mut page = PollListPage::new();
        let ticket = page.begin_load();
        page.teardown();
        assert!(!page.finish_load(ticket, Ok(vec![])));
    }
}
