use serde::{Deserialize, Serialize};

use crate::api::FeedItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Guest,
    Buyer,
    Master,
    Admin,
}

impl Default for Role {
    fn default() -> Self {
        Role::Guest
    }
}

impl Role {
    pub fn parse(raw: &str) -> Role {
        match raw.trim().to_ascii_lowercase().as_str() {
            "buyer" | "client" | "user" => Role::Buyer,
            "master" => Role::Master,
            "admin" => Role::Admin,
            _ => Role::Guest,
        }
    }
}

/// Who is driving the feed. Authentication happens elsewhere; the viewer is
/// resolved once at startup and handed in.
#[derive(Debug, Clone, Default)]
pub struct Viewer {
    pub id: String,
    pub name: String,
    pub role: Role,
}

impl Viewer {
    pub fn is_signed_in(&self) -> bool {
        self.role != Role::Guest && !self.id.trim().is_empty()
    }
}

/// Whether `viewer` may comment on `item`. Masters may only comment under
/// their own items; guests never comment; the item itself can switch
/// commenting off. The comment panel receives the answer as a flag and never
/// re-derives it.
pub fn can_comment(viewer: &Viewer, item: &FeedItem) -> bool {
    if !viewer.is_signed_in() {
        return false;
    }
    if viewer.role == Role::Master && item.author.id != viewer.id {
        return false;
    }
    item.allow_comments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Author;

    fn item_by(author_id: &str, allow_comments: bool) -> FeedItem {
        FeedItem {
            id: "v-1".into(),
            title: "Oak table".into(),
            description: String::new(),
            video_url: String::new(),
            thumbnail_url: String::new(),
            tags: Vec::new(),
            duration_secs: 0.0,
            created_at: None,
            allow_comments,
            author: Author {
                id: author_id.into(),
                ..Author::default()
            },
            likes_count: 0,
            comments_count: 0,
            is_liked: false,
            is_bookmarked: false,
        }
    }

    fn viewer(id: &str, role: Role) -> Viewer {
        Viewer {
            id: id.into(),
            name: String::new(),
            role,
        }
    }

    #[test]
    fn guests_never_comment() {
        assert!(!can_comment(&viewer("", Role::Guest), &item_by("m-1", true)));
    }

    #[test]
    fn buyers_comment_anywhere_comments_allowed() {
        assert!(can_comment(&viewer("u-1", Role::Buyer), &item_by("m-1", true)));
        assert!(!can_comment(
            &viewer("u-1", Role::Buyer),
            &item_by("m-1", false)
        ));
    }

    #[test]
    fn masters_comment_only_under_own_items() {
        assert!(can_comment(
            &viewer("m-1", Role::Master),
            &item_by("m-1", true)
        ));
        assert!(!can_comment(
            &viewer("m-1", Role::Master),
            &item_by("m-2", true)
        ));
    }

    #[test]
    fn role_parses_wire_spellings() {
        assert_eq!(Role::parse("client"), Role::Buyer);
        assert_eq!(Role::parse("MASTER"), Role::Master);
        assert_eq!(Role::parse("unknown"), Role::Guest);
    }
}
