use serde::{Deserialize, Serialize};

/// One blog post, as stored inside the posts collection document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    /// Store-assigned monotonically increasing decimal string.
    pub id: String,
    /// URL-safe identifier. Uniqueness is the caller's responsibility.
    pub slug: String,
    pub title: String,
    pub excerpt: String,
    /// Markdown body; may embed image references into the image container.
    pub content: String,
    pub date: String,
    pub author: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_time: Option<String>,
    #[serde(default)]
    pub is_draft: bool,
}

/// Payload for creating a post; the store assigns the id.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPost {
    pub slug: String,
    pub title: String,
    pub excerpt: String,
    pub content: String,
    pub date: String,
    pub author: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub cover_image: Option<String>,
    #[serde(default)]
    pub read_time: Option<String>,
    #[serde(default)]
    pub is_draft: bool,
}

impl NewPost {
    pub fn into_post(self, id: String) -> Post {
        Post {
            id,
            slug: self.slug,
            title: self.title,
            excerpt: self.excerpt,
            content: self.content,
            date: self.date,
            author: self.author,
            tags: self.tags,
            cover_image: self.cover_image,
            read_time: self.read_time,
            is_draft: self.is_draft,
        }
    }
}

/// Partial update; absent fields stay unchanged, the id never changes.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PostPatch {
    pub slug: Option<String>,
    pub title: Option<String>,
    pub excerpt: Option<String>,
    pub content: Option<String>,
    pub date: Option<String>,
    pub author: Option<String>,
    pub tags: Option<Vec<String>>,
    pub cover_image: Option<String>,
    pub read_time: Option<String>,
    pub is_draft: Option<bool>,
}

impl PostPatch {
    pub fn apply(self, post: &mut Post) {
        if let Some(slug) = self.slug {
            post.slug = slug;
        }
        if let Some(title) = self.title {
            post.title = title;
        }
        if let Some(excerpt) = self.excerpt {
            post.excerpt = excerpt;
        }
        if let Some(content) = self.content {
            post.content = content;
        }
        if let Some(date) = self.date {
            post.date = date;
        }
        if let Some(author) = self.author {
            post.author = author;
        }
        if let Some(tags) = self.tags {
            post.tags = tags;
        }
        if let Some(cover_image) = self.cover_image {
            post.cover_image = Some(cover_image);
        }
        if let Some(read_time) = self.read_time {
            post.read_time = Some(read_time);
        }
        if let Some(is_draft) = self.is_draft {
            post.is_draft = is_draft;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_serializes_camel_case() {
        let post = Post {
            id: "1".to_string(),
            slug: "s".to_string(),
            title: "t".to_string(),
            excerpt: "e".to_string(),
            content: "c".to_string(),
            date: "2026-01-01".to_string(),
            author: "a".to_string(),
            tags: vec![],
            cover_image: Some("https://x/c.jpg".to_string()),
            read_time: None,
            is_draft: false,
        };
        let json = serde_json::to_string(&post).unwrap();
        assert!(json.contains("\"coverImage\""));
        assert!(json.contains("\"isDraft\""));
        assert!(!json.contains("readTime"));
    }

    #[test]
    fn test_patch_keeps_id_and_unset_fields() {
        let mut post = Post {
            id: "7".to_string(),
            slug: "old".to_string(),
            title: "old title".to_string(),
            excerpt: "e".to_string(),
            content: "c".to_string(),
            date: "2026-01-01".to_string(),
            author: "a".to_string(),
            tags: vec!["x".to_string()],
            cover_image: None,
            read_time: None,
            is_draft: true,
        };

        let patch: PostPatch =
            serde_json::from_str(r#"{"title":"new title","isDraft":false}"#).unwrap();
        patch.apply(&mut post);

        assert_eq!(post.id, "7");
        assert_eq!(post.title, "new title");
        assert_eq!(post.slug, "old");
        assert!(!post.is_draft);
        assert_eq!(post.tags, vec!["x".to_string()]);
    }
}
