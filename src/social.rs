use std::collections::HashMap;

use crate::api::FeedItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SocialState {
    pub is_liked: bool,
    pub likes_count: i64,
    pub is_bookmarked: bool,
}

/// Authoritative like state pushed from the server for one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteLike {
    pub is_liked: bool,
    pub likes_count: i64,
}

/// Per-item social state: the immutable snapshot taken at feed load, plus a
/// lazily-created overlay holding whatever has diverged since. Overlays are
/// superseded field-by-field and never deleted during the session.
///
/// Optimistic toggles apply synchronously before the confirming network call
/// resolves; there is deliberately no rollback path on a failed confirmation
/// (the failure is surfaced to the UI and the optimistic value stands). A
/// stricter strategy would store the pre-image here, in `toggle_like` /
/// `toggle_bookmark`, without touching any call site.
#[derive(Debug, Default)]
pub struct SocialStateStore {
    snapshots: HashMap<String, SocialState>,
    overlays: HashMap<String, SocialState>,
    active: Option<String>,
}

impl SocialStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed snapshots from the feed load. Existing overlays survive: the
    /// feed list is handed in once, so this runs once per session.
    pub fn seed(&mut self, items: &[FeedItem]) {
        for item in items {
            self.snapshots.insert(
                item.id.clone(),
                SocialState {
                    is_liked: item.is_liked,
                    likes_count: item.likes_count,
                    is_bookmarked: item.is_bookmarked,
                },
            );
        }
    }

    pub fn set_active(&mut self, item_id: Option<&str>) {
        self.active = item_id.map(str::to_string);
    }

    pub fn state(&self, item_id: &str) -> SocialState {
        self.overlays
            .get(item_id)
            .or_else(|| self.snapshots.get(item_id))
            .copied()
            .unwrap_or_default()
    }

    /// Optimistic like toggle: flips `is_liked` and moves the count by one
    /// from the pre-toggle value, creating the overlay on first use.
    pub fn toggle_like(&mut self, item_id: &str) -> SocialState {
        let mut state = self.state(item_id);
        if state.is_liked {
            state.is_liked = false;
            state.likes_count -= 1;
        } else {
            state.is_liked = true;
            state.likes_count += 1;
        }
        self.overlays.insert(item_id.to_string(), state);
        state
    }

    /// Optimistic bookmark toggle; like counts are untouched.
    pub fn toggle_bookmark(&mut self, item_id: &str) -> SocialState {
        let mut state = self.state(item_id);
        state.is_bookmarked = !state.is_bookmarked;
        self.overlays.insert(item_id.to_string(), state);
        state
    }

    /// Apply an authoritative update. Accepted only for the currently active
    /// item; anything else is dropped, so inactive items keep showing their
    /// feed-load snapshot until (re)activated. Returns whether the update was
    /// applied. Repeated identical events are harmless: each apply overwrites.
    pub fn apply_remote(&mut self, item_id: &str, patch: RemoteLike) -> bool {
        if self.active.as_deref() != Some(item_id) {
            return false;
        }
        let mut state = self.state(item_id);
        state.is_liked = patch.is_liked;
        state.likes_count = patch.likes_count;
        self.overlays.insert(item_id.to_string(), state);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Author, FeedItem};

    fn item(id: &str, likes: i64, is_liked: bool) -> FeedItem {
        FeedItem {
            id: id.into(),
            title: String::new(),
            description: String::new(),
            video_url: String::new(),
            thumbnail_url: String::new(),
            tags: Vec::new(),
            duration_secs: 0.0,
            created_at: None,
            allow_comments: true,
            author: Author::default(),
            likes_count: likes,
            comments_count: 0,
            is_liked,
            is_bookmarked: false,
        }
    }

    fn store_with(items: &[FeedItem], active: &str) -> SocialStateStore {
        let mut store = SocialStateStore::new();
        store.seed(items);
        store.set_active(Some(active));
        store
    }

    #[test]
    fn optimistic_like_adjusts_count_from_snapshot() {
        let mut store = store_with(&[item("a", 10, false)], "a");
        let state = store.toggle_like("a");
        assert!(state.is_liked);
        assert_eq!(state.likes_count, 11);
        // A second toggle works from the overlay, not the snapshot.
        let state = store.toggle_like("a");
        assert!(!state.is_liked);
        assert_eq!(state.likes_count, 10);
    }

    #[test]
    fn bookmark_toggle_leaves_likes_alone() {
        let mut store = store_with(&[item("a", 7, true)], "a");
        let state = store.toggle_bookmark("a");
        assert!(state.is_bookmarked);
        assert!(state.is_liked);
        assert_eq!(state.likes_count, 7);
    }

    #[test]
    fn remote_update_for_inactive_item_is_dropped() {
        let mut store = store_with(&[item("a", 10, false), item("b", 3, false)], "a");
        let applied = store.apply_remote(
            "b",
            RemoteLike {
                is_liked: true,
                likes_count: 4,
            },
        );
        assert!(!applied);
        // Stale by design: "b" still reads its snapshot.
        assert_eq!(store.state("b").likes_count, 3);
        assert!(!store.state("b").is_liked);
    }

    #[test]
    fn remote_update_for_active_item_overwrites() {
        let mut store = store_with(&[item("a", 10, false)], "a");
        store.toggle_like("a");
        let applied = store.apply_remote(
            "a",
            RemoteLike {
                is_liked: true,
                likes_count: 14,
            },
        );
        assert!(applied);
        let state = store.state("a");
        assert_eq!(state.likes_count, 14);
        assert!(state.is_liked);
    }

    #[test]
    fn remote_update_preserves_bookmark_field() {
        let mut store = store_with(&[item("a", 1, false)], "a");
        store.toggle_bookmark("a");
        store.apply_remote(
            "a",
            RemoteLike {
                is_liked: true,
                likes_count: 2,
            },
        );
        assert!(store.state("a").is_bookmarked);
    }

    #[test]
    fn unknown_item_reads_default_state() {
        let store = SocialStateStore::new();
        assert_eq!(store.state("missing"), SocialState::default());
    }
}
