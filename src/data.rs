use anyhow::{Context, Result};
use rand::seq::SliceRandom;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::api::{
    self, Author, Comment, CommentLikeUpdate, FeedItem, FeedQuery, LikeUpdate, WatchMetrics,
};

pub trait FeedService: Send + Sync {
    fn load_feed(&self, query: FeedQuery) -> Result<Vec<FeedItem>>;
}

pub trait InteractionService: Send + Sync {
    fn toggle_like(&self, item_id: &str) -> Result<LikeUpdate>;
    fn set_bookmark(&self, item_id: &str, on: bool) -> Result<()>;
}

pub trait CommentService: Send + Sync {
    fn load_comments(&self, item_id: &str) -> Result<Vec<Comment>>;
    fn add_comment(&self, item_id: &str, content: &str, parent_id: Option<&str>)
        -> Result<Comment>;
    fn toggle_like(&self, comment_id: &str) -> Result<CommentLikeUpdate>;
}

pub trait ViewService: Send + Sync {
    fn record_view(&self, item_id: &str, metrics: &WatchMetrics) -> Result<()>;
}

pub struct ApiFeedService {
    client: Arc<api::Client>,
}

impl ApiFeedService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl FeedService for ApiFeedService {
    fn load_feed(&self, query: FeedQuery) -> Result<Vec<FeedItem>> {
        self.client.feed(query).context("fetch video feed")
    }
}

pub struct ApiInteractionService {
    client: Arc<api::Client>,
}

impl ApiInteractionService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl InteractionService for ApiInteractionService {
    fn toggle_like(&self, item_id: &str) -> Result<LikeUpdate> {
        self.client.toggle_like(item_id)
    }

    fn set_bookmark(&self, item_id: &str, on: bool) -> Result<()> {
        self.client.set_bookmark(item_id, on)
    }
}

pub struct ApiCommentService {
    client: Arc<api::Client>,
}

impl ApiCommentService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl CommentService for ApiCommentService {
    fn load_comments(&self, item_id: &str) -> Result<Vec<Comment>> {
        self.client.comments(item_id).context("fetch comments")
    }

    fn add_comment(
        &self,
        item_id: &str,
        content: &str,
        parent_id: Option<&str>,
    ) -> Result<Comment> {
        self.client.add_comment(item_id, content, parent_id)
    }

    fn toggle_like(&self, comment_id: &str) -> Result<CommentLikeUpdate> {
        self.client.toggle_comment_like(comment_id)
    }
}

pub struct ApiViewService {
    client: Arc<api::Client>,
}

impl ApiViewService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl ViewService for ApiViewService {
    fn record_view(&self, item_id: &str, metrics: &WatchMetrics) -> Result<()> {
        self.client.record_view(item_id, metrics)
    }
}

#[derive(Default)]
pub struct MockFeedService;

impl FeedService for MockFeedService {
    fn load_feed(&self, _query: FeedQuery) -> Result<Vec<FeedItem>> {
        Ok(demo_items())
    }
}

#[derive(Default)]
pub struct MockInteractionService;

impl InteractionService for MockInteractionService {
    fn toggle_like(&self, item_id: &str) -> Result<LikeUpdate> {
        Ok(LikeUpdate {
            item_id: item_id.to_string(),
            likes_count: 1,
            is_liked: true,
        })
    }

    fn set_bookmark(&self, _item_id: &str, _on: bool) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct MockCommentService {
    next_id: AtomicU64,
}

impl CommentService for MockCommentService {
    fn load_comments(&self, _item_id: &str) -> Result<Vec<Comment>> {
        Ok(vec![Comment {
            id: "demo-comment".into(),
            content: "Comments are unavailable in offline mode.".into(),
            author: demo_author("vitrine", "Vitrine"),
            like_count: 0,
            is_liked: false,
            created_at: None,
            replies: Vec::new(),
        }])
    }

    fn add_comment(
        &self,
        _item_id: &str,
        content: &str,
        _parent_id: Option<&str>,
    ) -> Result<Comment> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        Ok(Comment {
            id: format!("local-{id}"),
            content: content.to_string(),
            author: demo_author("you", ""),
            like_count: 0,
            is_liked: false,
            created_at: None,
            replies: Vec::new(),
        })
    }

    fn toggle_like(&self, comment_id: &str) -> Result<CommentLikeUpdate> {
        Ok(CommentLikeUpdate {
            comment_id: comment_id.to_string(),
            likes_count: 1,
            is_liked: true,
        })
    }
}

#[derive(Default)]
pub struct MockViewService;

impl ViewService for MockViewService {
    fn record_view(&self, _item_id: &str, _metrics: &WatchMetrics) -> Result<()> {
        Ok(())
    }
}

fn demo_author(username: &str, company: &str) -> Author {
    Author {
        id: format!("demo-{username}"),
        username: username.to_string(),
        company_name: company.to_string(),
        avatar: String::new(),
        role: "master".to_string(),
    }
}

fn demo_items() -> Vec<FeedItem> {
    let mut items = vec![
        demo_item(
            "demo-oak-table",
            "Solid oak dining table",
            "Hand-finished oak, seats six. Sample clip for offline browsing.",
            &["oak", "dining", "handmade"],
            demo_author("oak_works", "Oak & Co."),
        ),
        demo_item(
            "demo-walnut-wardrobe",
            "Walnut wardrobe build",
            "Three-door wardrobe with brass fittings, built to order.",
            &["walnut", "wardrobe"],
            demo_author("grain_studio", "Grain Studio"),
        ),
        demo_item(
            "demo-linen-sofa",
            "Linen sofa restoration",
            "Full reupholstery of a 1970s frame in washed linen.",
            &["sofa", "restoration"],
            demo_author("softline", "Softline Upholstery"),
        ),
    ];

    let mut rng = rand::thread_rng();
    items.shuffle(&mut rng);
    items
}

fn demo_item(id: &str, title: &str, description: &str, tags: &[&str], author: Author) -> FeedItem {
    FeedItem {
        id: id.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        video_url: String::new(),
        thumbnail_url: String::new(),
        tags: tags.iter().map(|tag| tag.to_string()).collect(),
        duration_secs: 0.0,
        created_at: None,
        allow_comments: true,
        author,
        likes_count: 0,
        comments_count: 0,
        is_liked: false,
        is_bookmarked: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_feed_provides_demo_items() {
        let items = MockFeedService.load_feed(FeedQuery::default()).unwrap();
        assert_eq!(items.len(), 3);
        assert!(items.iter().all(|item| item.allow_comments));
    }

    #[test]
    fn mock_comment_service_assigns_local_ids() {
        let service = MockCommentService::default();
        let first = service.add_comment("demo", "first", None).unwrap();
        let second = service.add_comment("demo", "second", None).unwrap();
        assert_ne!(first.id, second.id);
    }
}
