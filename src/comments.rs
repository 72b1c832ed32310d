use std::sync::Arc;
use std::thread;

use anyhow::{bail, Result};
use crossbeam_channel::Sender;

use crate::api::{Comment, CommentLikeUpdate};
use crate::data::CommentService;
use crate::feed::FeedResponse;

#[derive(Debug, PartialEq, Eq)]
pub enum LoadOutcome {
    Applied { count: usize },
    Stale,
    Failed(String),
}

#[derive(Debug, PartialEq, Eq)]
pub enum AddOutcome {
    Added { reply: bool },
    Stale,
    Failed(String),
}

#[derive(Debug, PartialEq, Eq)]
pub enum CommentLikeOutcome {
    Applied,
    Unknown,
    Failed(String),
}

struct PendingLoad {
    request_id: u64,
    item_id: String,
}

/// Comment state for the active item only. The list is discarded on every
/// transition and reloaded from scratch; nothing is cached across
/// activations. Loads resolve on worker threads and are committed only when
/// the pending (request id, item id) pair still matches, so a slow response
/// for a previous item can never overwrite the current panel.
///
/// Adds are pessimistic: the canonical server comment is inserted once the
/// call returns, with no placeholder shown while pending.
pub struct CommentThreadManager {
    service: Arc<dyn CommentService>,
    tx: Sender<FeedResponse>,
    item_id: Option<String>,
    comments: Vec<Comment>,
    pending: Option<PendingLoad>,
    next_request_id: u64,
    panel_open: bool,
    permitted: bool,
    submitting: bool,
}

impl CommentThreadManager {
    pub fn new(service: Arc<dyn CommentService>, tx: Sender<FeedResponse>) -> Self {
        Self {
            service,
            tx,
            item_id: None,
            comments: Vec::new(),
            pending: None,
            next_request_id: 1,
            panel_open: false,
            permitted: false,
            submitting: false,
        }
    }

    /// Clears everything unconditionally. Called on every feed transition so
    /// comments are never carried between items.
    pub fn reset(&mut self) {
        self.item_id = None;
        self.comments.clear();
        self.pending = None;
        self.submitting = false;
    }

    pub fn begin_load(&mut self, item_id: &str) {
        let request_id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);

        self.item_id = Some(item_id.to_string());
        self.comments.clear();
        self.pending = Some(PendingLoad {
            request_id,
            item_id: item_id.to_string(),
        });

        let service = self.service.clone();
        let tx = self.tx.clone();
        let item = item_id.to_string();
        thread::spawn(move || {
            let result = service.load_comments(&item);
            let _ = tx.send(FeedResponse::CommentsLoaded {
                request_id,
                item_id: item,
                result,
            });
        });
    }

    pub fn commit_load(
        &mut self,
        request_id: u64,
        item_id: &str,
        result: Result<Vec<Comment>>,
    ) -> LoadOutcome {
        let Some(pending) = &self.pending else {
            return LoadOutcome::Stale;
        };
        if pending.request_id != request_id || pending.item_id != item_id {
            return LoadOutcome::Stale;
        }
        if self.item_id.as_deref() != Some(item_id) {
            return LoadOutcome::Stale;
        }
        self.pending = None;

        match result {
            Ok(mut comments) => {
                // Depth is bounded at one: replies never nest further.
                for comment in &mut comments {
                    for reply in &mut comment.replies {
                        reply.replies.clear();
                    }
                }
                let count = comments.len();
                self.comments = comments;
                LoadOutcome::Applied { count }
            }
            Err(err) => {
                self.comments.clear();
                LoadOutcome::Failed(format!("{err:#}"))
            }
        }
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    pub fn begin_add_top_level(&mut self, text: &str) -> Result<()> {
        self.begin_add(text, None)
    }

    pub fn begin_add_reply(&mut self, parent_id: &str, text: &str) -> Result<()> {
        // Replying to a reply is not supported: the parent must be a
        // currently-loaded top-level comment.
        if !self.comments.iter().any(|c| c.id == parent_id) {
            bail!("reply parent is not a top-level comment in this thread");
        }
        self.begin_add(text, Some(parent_id.to_string()))
    }

    fn begin_add(&mut self, text: &str, parent_id: Option<String>) -> Result<()> {
        if !self.permitted {
            bail!("commenting is not available on this video");
        }
        let Some(item_id) = self.item_id.clone() else {
            bail!("no active video to comment on");
        };
        let text = text.trim().to_string();
        if text.is_empty() {
            bail!("comment text is required");
        }

        self.submitting = true;
        let service = self.service.clone();
        let tx = self.tx.clone();
        let parent = parent_id.clone();
        thread::spawn(move || {
            let result = service.add_comment(&item_id, &text, parent.as_deref());
            let _ = tx.send(FeedResponse::CommentAdded {
                item_id,
                parent_id: parent,
                result,
            });
        });
        Ok(())
    }

    pub fn commit_add(
        &mut self,
        item_id: &str,
        parent_id: Option<&str>,
        result: Result<Comment>,
    ) -> AddOutcome {
        self.submitting = false;
        if self.item_id.as_deref() != Some(item_id) {
            return AddOutcome::Stale;
        }
        match result {
            Ok(mut comment) => {
                comment.replies.clear();
                match parent_id {
                    Some(parent) => {
                        let Some(parent) = self.comments.iter_mut().find(|c| c.id == parent) else {
                            return AddOutcome::Stale;
                        };
                        parent.replies.push(comment);
                        AddOutcome::Added { reply: true }
                    }
                    None => {
                        self.comments.insert(0, comment);
                        AddOutcome::Added { reply: false }
                    }
                }
            }
            Err(err) => AddOutcome::Failed(format!("{err:#}")),
        }
    }

    pub fn begin_toggle_like(&mut self, comment_id: &str) -> Result<()> {
        if self.find(comment_id).is_none() {
            bail!("comment is not in the loaded thread");
        }
        let service = self.service.clone();
        let tx = self.tx.clone();
        let comment = comment_id.to_string();
        thread::spawn(move || {
            let result = service.toggle_like(&comment);
            let _ = tx.send(FeedResponse::CommentLikeUpdated {
                comment_id: comment,
                result,
            });
        });
        Ok(())
    }

    pub fn commit_like(
        &mut self,
        comment_id: &str,
        result: Result<CommentLikeUpdate>,
    ) -> CommentLikeOutcome {
        match result {
            Ok(update) => match self.find_mut(comment_id) {
                Some(comment) => {
                    comment.is_liked = update.is_liked;
                    comment.like_count = update.likes_count;
                    CommentLikeOutcome::Applied
                }
                None => CommentLikeOutcome::Unknown,
            },
            Err(err) => CommentLikeOutcome::Failed(format!("{err:#}")),
        }
    }

    /// Scans both levels; comment likes are bookkept separately from item
    /// likes.
    fn find(&self, comment_id: &str) -> Option<&Comment> {
        for comment in &self.comments {
            if comment.id == comment_id {
                return Some(comment);
            }
            for reply in &comment.replies {
                if reply.id == comment_id {
                    return Some(reply);
                }
            }
        }
        None
    }

    fn find_mut(&mut self, comment_id: &str) -> Option<&mut Comment> {
        for comment in &mut self.comments {
            if comment.id == comment_id {
                return Some(comment);
            }
            for reply in &mut comment.replies {
                if reply.id == comment_id {
                    return Some(reply);
                }
            }
        }
        None
    }

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn item_id(&self) -> Option<&str> {
        self.item_id.as_deref()
    }

    /// Top-level comments plus replies, the number the panel header shows.
    pub fn total_count(&self) -> usize {
        self.comments
            .iter()
            .map(|comment| 1 + comment.replies.len())
            .sum()
    }

    pub fn set_panel_open(&mut self, open: bool) {
        self.panel_open = open;
    }

    pub fn is_panel_open(&self) -> bool {
        self.panel_open
    }

    /// Set from outside per active item; the manager exposes the flag but
    /// never decides the rule.
    pub fn set_permitted(&mut self, permitted: bool) {
        self.permitted = permitted;
    }

    pub fn is_permitted(&self) -> bool {
        self.permitted
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Author;
    use crate::data::MockCommentService;
    use crossbeam_channel::unbounded;
    use std::time::Duration;

    fn manager() -> (CommentThreadManager, crossbeam_channel::Receiver<FeedResponse>) {
        let (tx, rx) = unbounded();
        let manager = CommentThreadManager::new(Arc::new(MockCommentService::default()), tx);
        (manager, rx)
    }

    fn comment(id: &str, replies: Vec<Comment>) -> Comment {
        Comment {
            id: id.into(),
            content: format!("comment {id}"),
            author: Author::default(),
            like_count: 0,
            is_liked: false,
            created_at: None,
            replies,
        }
    }

    fn loaded_manager() -> (CommentThreadManager, crossbeam_channel::Receiver<FeedResponse>) {
        let (mut manager, rx) = manager();
        manager.set_permitted(true);
        manager.begin_load("v-1");
        let (request_id, item_id, _) = recv_load(&rx);
        let outcome = manager.commit_load(
            request_id,
            &item_id,
            Ok(vec![comment("top-1", vec![comment("reply-1", Vec::new())])]),
        );
        assert_eq!(outcome, LoadOutcome::Applied { count: 1 });
        (manager, rx)
    }

    fn recv_load(
        rx: &crossbeam_channel::Receiver<FeedResponse>,
    ) -> (u64, String, Result<Vec<Comment>>) {
        match rx.recv_timeout(Duration::from_secs(2)).expect("response") {
            FeedResponse::CommentsLoaded {
                request_id,
                item_id,
                result,
            } => (request_id, item_id, result),
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn reset_clears_everything() {
        let (mut manager, _rx) = loaded_manager();
        manager.set_panel_open(true);
        manager.reset();
        assert!(manager.comments().is_empty());
        assert!(manager.item_id().is_none());
        assert!(!manager.is_loading());
        // Panel visibility is UI state and survives the reset.
        assert!(manager.is_panel_open());
    }

    #[test]
    fn stale_load_never_commits() {
        let (mut manager, rx) = manager();
        manager.begin_load("v-1");
        let (first_request, first_item, _) = recv_load(&rx);

        // User moves on before the first load lands.
        manager.reset();
        manager.begin_load("v-2");
        let (second_request, second_item, _) = recv_load(&rx);

        let outcome = manager.commit_load(first_request, &first_item, Ok(vec![comment("old", Vec::new())]));
        assert_eq!(outcome, LoadOutcome::Stale);
        assert!(manager.comments().is_empty());

        let outcome = manager.commit_load(second_request, &second_item, Ok(vec![comment("new", Vec::new())]));
        assert_eq!(outcome, LoadOutcome::Applied { count: 1 });
        assert_eq!(manager.comments()[0].id, "new");
    }

    #[test]
    fn load_flattens_nested_replies() {
        let (mut manager, rx) = manager();
        manager.begin_load("v-1");
        let (request_id, item_id, _) = recv_load(&rx);
        let nested = comment(
            "top",
            vec![comment("reply", vec![comment("grandchild", Vec::new())])],
        );
        manager.commit_load(request_id, &item_id, Ok(vec![nested]));
        assert!(manager.comments()[0].replies[0].replies.is_empty());
    }

    #[test]
    fn failed_load_leaves_list_empty() {
        let (mut manager, rx) = manager();
        manager.begin_load("v-1");
        let (request_id, item_id, _) = recv_load(&rx);
        let outcome = manager.commit_load(request_id, &item_id, Err(anyhow::anyhow!("boom")));
        assert!(matches!(outcome, LoadOutcome::Failed(_)));
        assert!(manager.comments().is_empty());
    }

    #[test]
    fn reply_lands_under_its_parent_only() {
        let (mut manager, _rx) = loaded_manager();
        let outcome = manager.commit_add("v-1", Some("top-1"), Ok(comment("reply-2", Vec::new())));
        assert_eq!(outcome, AddOutcome::Added { reply: true });
        assert_eq!(manager.comments().len(), 1);
        assert_eq!(manager.comments()[0].replies.len(), 2);
        assert_eq!(manager.comments()[0].replies[1].id, "reply-2");
        assert!(manager.comments()[0].replies[1].replies.is_empty());
    }

    #[test]
    fn reply_to_reply_is_rejected() {
        let (mut manager, _rx) = loaded_manager();
        let err = manager.begin_add_reply("reply-1", "nested").unwrap_err();
        assert!(err.to_string().contains("top-level"));
    }

    #[test]
    fn add_requires_permission() {
        let (mut manager, _rx) = loaded_manager();
        manager.set_permitted(false);
        assert!(manager.begin_add_top_level("hello").is_err());
    }

    #[test]
    fn top_level_add_prepends() {
        let (mut manager, _rx) = loaded_manager();
        let outcome = manager.commit_add("v-1", None, Ok(comment("top-2", Vec::new())));
        assert_eq!(outcome, AddOutcome::Added { reply: false });
        assert_eq!(manager.comments()[0].id, "top-2");
        assert_eq!(manager.total_count(), 3);
    }

    #[test]
    fn add_for_departed_item_is_stale() {
        let (mut manager, _rx) = loaded_manager();
        manager.reset();
        manager.begin_load("v-2");
        let outcome = manager.commit_add("v-1", None, Ok(comment("late", Vec::new())));
        assert_eq!(outcome, AddOutcome::Stale);
    }

    #[test]
    fn comment_like_updates_either_level() {
        let (mut manager, _rx) = loaded_manager();
        let update = CommentLikeUpdate {
            comment_id: "reply-1".into(),
            likes_count: 5,
            is_liked: true,
        };
        let outcome = manager.commit_like("reply-1", Ok(update));
        assert_eq!(outcome, CommentLikeOutcome::Applied);
        assert_eq!(manager.comments()[0].replies[0].like_count, 5);
        assert!(manager.comments()[0].replies[0].is_liked);
    }

    #[test]
    fn like_for_unknown_comment_reports_unknown() {
        let (mut manager, _rx) = loaded_manager();
        assert!(manager.begin_toggle_like("missing").is_err());
        let update = CommentLikeUpdate {
            comment_id: "missing".into(),
            likes_count: 1,
            is_liked: true,
        };
        assert_eq!(
            manager.commit_like("missing", Ok(update)),
            CommentLikeOutcome::Unknown
        );
    }
}
