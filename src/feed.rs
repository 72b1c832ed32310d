use std::sync::Arc;
use std::thread;

use anyhow::Result;
use crossbeam_channel::Sender;

use crate::api::{Comment, CommentLikeUpdate, FeedItem, LikeUpdate};
use crate::comments::{AddOutcome, CommentLikeOutcome, CommentThreadManager, LoadOutcome};
use crate::data::InteractionService;
use crate::gesture::Swipe;
use crate::player::Playback;
use crate::realtime::{EventBridge, PushEvent};
use crate::social::{RemoteLike, SocialState, SocialStateStore};
use crate::views::ViewRecorder;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

impl From<Swipe> for Direction {
    fn from(swipe: Swipe) -> Self {
        match swipe {
            Swipe::Next => Direction::Next,
            Swipe::Previous => Direction::Previous,
        }
    }
}

/// Completions posted back from worker threads and the push channel. The
/// event loop drains these and feeds them to the controller's commit
/// methods; each commit re-checks identity against current state, since
/// resolution order is not navigation order.
#[derive(Debug)]
pub enum FeedResponse {
    CommentsLoaded {
        request_id: u64,
        item_id: String,
        result: Result<Vec<Comment>>,
    },
    CommentAdded {
        item_id: String,
        parent_id: Option<String>,
        result: Result<Comment>,
    },
    CommentLikeUpdated {
        comment_id: String,
        result: Result<CommentLikeUpdate>,
    },
    LikeConfirmed {
        item_id: String,
        result: Result<LikeUpdate>,
    },
    BookmarkConfirmed {
        item_id: String,
        on: bool,
        error: Option<String>,
    },
    PlaybackFinished {
        item_id: String,
    },
    Push(PushEvent),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    LikeApplied,
    CommentsReloading,
    Ignored,
}

/// Owns the ordered item list, the current index, and the playback handle,
/// and sequences every transition: pause+rewind the outgoing item, activate
/// the incoming one, record the impression, reset and reload comments, and
/// re-scope the push subscription. Side effects are fire-and-forget; their
/// failure never blocks or reverts the index.
pub struct FeedController {
    items: Vec<FeedItem>,
    current: usize,
    activation: u64,
    player: Box<dyn Playback>,
    views: ViewRecorder,
    social: SocialStateStore,
    comments: CommentThreadManager,
    bridge: EventBridge,
    interactions: Arc<dyn InteractionService>,
    tx: Sender<FeedResponse>,
}

impl FeedController {
    pub fn new(
        player: Box<dyn Playback>,
        views: ViewRecorder,
        comments: CommentThreadManager,
        bridge: EventBridge,
        interactions: Arc<dyn InteractionService>,
        tx: Sender<FeedResponse>,
    ) -> Self {
        Self {
            items: Vec::new(),
            current: 0,
            activation: 0,
            player,
            views,
            social: SocialStateStore::new(),
            comments,
            bridge,
            interactions,
            tx,
        }
    }

    /// Hand over the feed, once. The list is never paginated or refetched
    /// from here.
    pub fn set_items(&mut self, items: Vec<FeedItem>, initial_index: usize) {
        self.social.seed(&items);
        self.items = items;
        if self.items.is_empty() {
            self.current = 0;
            return;
        }
        self.current = initial_index.min(self.items.len() - 1);
        self.activate();
    }

    pub fn items(&self) -> &[FeedItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn active_item(&self) -> Option<&FeedItem> {
        self.items.get(self.current)
    }

    pub fn social_state(&self, item_id: &str) -> SocialState {
        self.social.state(item_id)
    }

    pub fn active_state(&self) -> Option<SocialState> {
        self.active_item().map(|item| self.social.state(&item.id))
    }

    pub fn comments(&self) -> &CommentThreadManager {
        &self.comments
    }

    pub fn comments_mut(&mut self) -> &mut CommentThreadManager {
        &mut self.comments
    }

    /// Move one step through the feed. Clamped, not wrapped: `Next` at the
    /// last item and `Previous` at the first are no-ops. Returns whether the
    /// index moved.
    pub fn transition(&mut self, direction: Direction) -> bool {
        if self.items.is_empty() {
            return false;
        }
        let target = match direction {
            Direction::Next if self.current + 1 < self.items.len() => self.current + 1,
            Direction::Previous if self.current > 0 => self.current - 1,
            _ => return false,
        };

        if let Err(err) = self.player.pause_and_rewind() {
            log::warn!("failed to pause outgoing item: {err:#}");
        }
        self.current = target;
        self.activate();
        true
    }

    fn activate(&mut self) {
        let Some(item) = self.items.get(self.current).cloned() else {
            return;
        };
        self.activation += 1;
        self.social.set_active(Some(&item.id));
        self.bridge.watch(&item.id);
        self.views.record(self.activation, &item.id);
        self.comments.reset();
        self.comments.begin_load(&item.id);
        if let Err(err) = self.player.activate(&item) {
            log::warn!("failed to start playback for {}: {err:#}", item.id);
        }
    }

    /// Natural end of media is an implicit `Next`; at the end of the feed
    /// playback simply stops (no loop).
    pub fn playback_finished(&mut self, item_id: &str) -> bool {
        if self.active_item().map(|item| item.id.as_str()) != Some(item_id) {
            return false;
        }
        if self.transition(Direction::Next) {
            true
        } else {
            if let Err(err) = self.player.stop() {
                log::warn!("failed to stop playback at end of feed: {err:#}");
            }
            false
        }
    }

    pub fn toggle_pause(&mut self) {
        if let Err(err) = self.player.toggle_pause() {
            log::warn!("failed to toggle pause: {err:#}");
        }
    }

    pub fn shutdown(&mut self) {
        self.bridge.release();
        self.player.shutdown();
    }

    /// Optimistic like: state flips immediately, the confirming call runs on
    /// a worker thread. Nothing is rolled back if the call fails.
    pub fn toggle_like(&mut self) -> Option<SocialState> {
        let item_id = self.active_item()?.id.clone();
        let state = self.social.toggle_like(&item_id);

        let interactions = self.interactions.clone();
        let tx = self.tx.clone();
        thread::spawn(move || {
            let result = interactions.toggle_like(&item_id);
            let _ = tx.send(FeedResponse::LikeConfirmed { item_id, result });
        });
        Some(state)
    }

    pub fn toggle_bookmark(&mut self) -> Option<SocialState> {
        let item_id = self.active_item()?.id.clone();
        let state = self.social.toggle_bookmark(&item_id);
        let on = state.is_bookmarked;

        let interactions = self.interactions.clone();
        let tx = self.tx.clone();
        thread::spawn(move || {
            let error = interactions
                .set_bookmark(&item_id, on)
                .err()
                .map(|err| format!("{err:#}"));
            let _ = tx.send(FeedResponse::BookmarkConfirmed { item_id, on, error });
        });
        Some(state)
    }

    pub fn submit_comment(&mut self, text: &str) -> Result<()> {
        self.comments.begin_add_top_level(text)
    }

    pub fn submit_reply(&mut self, parent_id: &str, text: &str) -> Result<()> {
        self.comments.begin_add_reply(parent_id, text)
    }

    pub fn toggle_comment_like(&mut self, comment_id: &str) -> Result<()> {
        self.comments.begin_toggle_like(comment_id)
    }

    pub fn commit_comments(
        &mut self,
        request_id: u64,
        item_id: &str,
        result: Result<Vec<Comment>>,
    ) -> LoadOutcome {
        self.comments.commit_load(request_id, item_id, result)
    }

    pub fn commit_comment_add(
        &mut self,
        item_id: &str,
        parent_id: Option<&str>,
        result: Result<Comment>,
    ) -> AddOutcome {
        self.comments.commit_add(item_id, parent_id, result)
    }

    pub fn commit_comment_like(
        &mut self,
        comment_id: &str,
        result: Result<CommentLikeUpdate>,
    ) -> CommentLikeOutcome {
        self.comments.commit_like(comment_id, result)
    }

    /// A successful confirmation carries the canonical entity; it re-enters
    /// through the same active-item gate as push events, so a confirmation
    /// landing after the user moved on is dropped rather than resurrected.
    pub fn confirm_like(&mut self, item_id: &str, update: &LikeUpdate) -> bool {
        self.social.apply_remote(
            item_id,
            RemoteLike {
                is_liked: update.is_liked,
                likes_count: update.likes_count,
            },
        )
    }

    /// Route one push event. Only the active item's events do anything;
    /// `new_comment` triggers a wholesale reload, and only while the panel
    /// is open.
    pub fn handle_push(&mut self, event: &PushEvent) -> PushOutcome {
        if !self.bridge.accepts(event.item_id()) {
            return PushOutcome::Ignored;
        }
        match event {
            PushEvent::ItemLiked {
                item_id,
                is_liked,
                likes_count,
            } => {
                if self.social.apply_remote(
                    item_id,
                    RemoteLike {
                        is_liked: *is_liked,
                        likes_count: *likes_count,
                    },
                ) {
                    PushOutcome::LikeApplied
                } else {
                    PushOutcome::Ignored
                }
            }
            PushEvent::NewComment { item_id } => {
                if !self.comments.is_panel_open() {
                    return PushOutcome::Ignored;
                }
                self.comments.begin_load(item_id);
                PushOutcome::CommentsReloading
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Author, WatchMetrics};
    use crate::data::{CommentService, MockCommentService, ViewService};
    use crossbeam_channel::{unbounded, Receiver};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Clone, Debug, PartialEq, Eq)]
    enum PlayerCall {
        Activate(String),
        PauseAndRewind,
        Stop,
    }

    #[derive(Clone, Default)]
    struct RecordingPlayer {
        calls: Arc<Mutex<Vec<PlayerCall>>>,
    }

    impl RecordingPlayer {
        fn calls(&self) -> Vec<PlayerCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Playback for RecordingPlayer {
        fn activate(&mut self, item: &FeedItem) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(PlayerCall::Activate(item.id.clone()));
            Ok(())
        }

        fn pause_and_rewind(&mut self) -> Result<()> {
            self.calls.lock().unwrap().push(PlayerCall::PauseAndRewind);
            Ok(())
        }

        fn toggle_pause(&mut self) -> Result<()> {
            Ok(())
        }

        fn stop(&mut self) -> Result<()> {
            self.calls.lock().unwrap().push(PlayerCall::Stop);
            Ok(())
        }

        fn shutdown(&mut self) {}
    }

    struct CountingViewService {
        views: Arc<Mutex<Vec<String>>>,
    }

    impl ViewService for CountingViewService {
        fn record_view(&self, item_id: &str, _metrics: &WatchMetrics) -> Result<()> {
            self.views.lock().unwrap().push(item_id.to_string());
            Ok(())
        }
    }

    struct FailingInteractions;

    impl InteractionService for FailingInteractions {
        fn toggle_like(&self, _item_id: &str) -> Result<LikeUpdate> {
            anyhow::bail!("network down")
        }

        fn set_bookmark(&self, _item_id: &str, _on: bool) -> Result<()> {
            anyhow::bail!("network down")
        }
    }

    fn item(id: &str, likes: i64) -> FeedItem {
        FeedItem {
            id: id.into(),
            title: format!("item {id}"),
            description: String::new(),
            video_url: format!("https://cdn.test/{id}.mp4"),
            thumbnail_url: String::new(),
            tags: Vec::new(),
            duration_secs: 10.0,
            created_at: None,
            allow_comments: true,
            author: Author::default(),
            likes_count: likes,
            comments_count: 0,
            is_liked: false,
            is_bookmarked: false,
        }
    }

    struct Harness {
        controller: FeedController,
        player: RecordingPlayer,
        views: Arc<Mutex<Vec<String>>>,
        rx: Receiver<FeedResponse>,
    }

    fn harness(items: Vec<FeedItem>, initial: usize) -> Harness {
        let (tx, rx) = unbounded();
        let player = RecordingPlayer::default();
        let views = Arc::new(Mutex::new(Vec::new()));
        let view_service = Arc::new(CountingViewService {
            views: views.clone(),
        });
        let comment_service: Arc<dyn CommentService> = Arc::new(MockCommentService::default());
        let mut controller = FeedController::new(
            Box::new(player.clone()),
            ViewRecorder::new(view_service),
            CommentThreadManager::new(comment_service, tx.clone()),
            EventBridge::detached(),
            Arc::new(FailingInteractions),
            tx,
        );
        controller.set_items(items, initial);
        Harness {
            controller,
            player,
            views,
            rx,
        }
    }

    fn drain_responses(rx: &Receiver<FeedResponse>) {
        while rx.recv_timeout(Duration::from_millis(200)).is_ok() {}
    }

    fn wait_for_views(views: &Arc<Mutex<Vec<String>>>, count: usize) {
        for _ in 0..50 {
            if views.lock().unwrap().len() >= count {
                return;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        panic!(
            "expected {count} recorded views, saw {:?}",
            views.lock().unwrap()
        );
    }

    #[test]
    fn transitions_clamp_at_both_ends() {
        let mut h = harness(vec![item("a", 0), item("b", 0), item("c", 0)], 0);
        assert!(!h.controller.transition(Direction::Previous));
        assert_eq!(h.controller.current_index(), 0);

        assert!(h.controller.transition(Direction::Next));
        assert!(h.controller.transition(Direction::Next));
        assert!(!h.controller.transition(Direction::Next));
        assert_eq!(h.controller.current_index(), 2);
    }

    #[test]
    fn repeated_next_lands_on_min_of_start_plus_k() {
        let mut h = harness((0..5).map(|i| item(&format!("i{i}"), 0)).collect(), 1);
        for _ in 0..10 {
            h.controller.transition(Direction::Next);
        }
        assert_eq!(h.controller.current_index(), 4);
    }

    #[test]
    fn transition_pauses_old_and_activates_new() {
        let mut h = harness(vec![item("a", 0), item("b", 0)], 0);
        assert!(h.controller.transition(Direction::Next));
        assert_eq!(
            h.player.calls(),
            vec![
                PlayerCall::Activate("a".into()),
                PlayerCall::PauseAndRewind,
                PlayerCall::Activate("b".into()),
            ]
        );
        assert_eq!(h.controller.active_item().unwrap().id, "b");
    }

    #[test]
    fn mount_records_a_view_for_the_initial_item() {
        let h = harness(vec![item("a", 0), item("b", 0)], 1);
        wait_for_views(&h.views, 1);
        assert_eq!(h.views.lock().unwrap()[0], "b");
    }

    #[test]
    fn each_transition_records_exactly_one_view() {
        let mut h = harness(vec![item("a", 0), item("b", 0), item("c", 0)], 0);
        h.controller.transition(Direction::Next);
        h.controller.transition(Direction::Previous);
        wait_for_views(&h.views, 3);
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(h.views.lock().unwrap().len(), 3);
    }

    #[test]
    fn clamped_transition_records_nothing() {
        let mut h = harness(vec![item("a", 0)], 0);
        wait_for_views(&h.views, 1);
        assert!(!h.controller.transition(Direction::Next));
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(h.views.lock().unwrap().len(), 1);
    }

    #[test]
    fn end_of_media_advances_then_stops_at_the_last_item() {
        let mut h = harness(vec![item("a", 0), item("b", 0)], 0);
        assert!(h.controller.playback_finished("a"));
        assert_eq!(h.controller.current_index(), 1);

        assert!(!h.controller.playback_finished("b"));
        assert_eq!(h.controller.current_index(), 1);
        assert!(h.player.calls().contains(&PlayerCall::Stop));
    }

    #[test]
    fn end_of_media_for_inactive_item_is_ignored() {
        let mut h = harness(vec![item("a", 0), item("b", 0)], 1);
        assert!(!h.controller.playback_finished("a"));
        assert_eq!(h.controller.current_index(), 1);
    }

    #[test]
    fn optimistic_like_applies_before_confirmation() {
        let mut h = harness(vec![item("a", 10)], 0);
        drain_responses(&h.rx);
        let state = h.controller.toggle_like().unwrap();
        assert!(state.is_liked);
        assert_eq!(state.likes_count, 11);
    }

    #[test]
    fn failed_confirmation_leaves_optimistic_value_standing() {
        let mut h = harness(vec![item("a", 10)], 0);
        h.controller.toggle_like();

        // Wait for the (failing) confirmation to come back.
        let mut failed = None;
        for _ in 0..50 {
            match h.rx.recv_timeout(Duration::from_millis(100)) {
                Ok(FeedResponse::LikeConfirmed { item_id, result }) => {
                    failed = Some((item_id, result));
                    break;
                }
                Ok(_) => {}
                Err(_) => {}
            }
        }
        let (item_id, result) = failed.expect("like confirmation");
        assert!(result.is_err());
        // No rollback: the caller only surfaces the message.
        let state = h.controller.social_state(&item_id);
        assert!(state.is_liked);
        assert_eq!(state.likes_count, 11);
    }

    #[test]
    fn push_like_for_active_item_applies() {
        let mut h = harness(vec![item("a", 10), item("b", 3)], 0);
        let outcome = h.controller.handle_push(&PushEvent::ItemLiked {
            item_id: "a".into(),
            is_liked: true,
            likes_count: 12,
        });
        assert_eq!(outcome, PushOutcome::LikeApplied);
        assert_eq!(h.controller.social_state("a").likes_count, 12);
    }

    #[test]
    fn push_like_for_item_ahead_is_invisible_until_activation() {
        let mut h = harness(vec![item("a", 10), item("b", 3), item("c", 5)], 0);
        let outcome = h.controller.handle_push(&PushEvent::ItemLiked {
            item_id: "c".into(),
            is_liked: true,
            likes_count: 99,
        });
        assert_eq!(outcome, PushOutcome::Ignored);

        // Navigating there later still shows the feed-load snapshot.
        h.controller.transition(Direction::Next);
        h.controller.transition(Direction::Next);
        assert_eq!(h.controller.social_state("c").likes_count, 5);
        assert!(!h.controller.social_state("c").is_liked);
    }

    #[test]
    fn new_comment_push_reloads_only_with_panel_open() {
        let mut h = harness(vec![item("a", 0)], 0);
        drain_responses(&h.rx);

        let closed = h
            .controller
            .handle_push(&PushEvent::NewComment { item_id: "a".into() });
        assert_eq!(closed, PushOutcome::Ignored);

        h.controller.comments_mut().set_panel_open(true);
        let open = h
            .controller
            .handle_push(&PushEvent::NewComment { item_id: "a".into() });
        assert_eq!(open, PushOutcome::CommentsReloading);
    }

    #[test]
    fn late_comment_load_for_previous_item_never_commits() {
        let mut h = harness(vec![item("a", 0), item("b", 0)], 0);

        // Grab the load request that activation of "a" kicked off.
        let (request_a, item_a) = loop {
            match h.rx.recv_timeout(Duration::from_secs(2)).unwrap() {
                FeedResponse::CommentsLoaded {
                    request_id,
                    item_id,
                    ..
                } if item_id == "a" => break (request_id, item_id),
                _ => {}
            }
        };

        h.controller.transition(Direction::Next);

        // The slow response for "a" arrives after we moved to "b".
        let outcome = h.controller.commit_comments(
            request_a,
            &item_a,
            Ok(vec![]),
        );
        assert_eq!(outcome, LoadOutcome::Stale);
        assert_eq!(h.controller.comments().item_id(), Some("b"));
    }
}
