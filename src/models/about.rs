use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Singleton about-page content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AboutContent {
    pub content: String,
    pub updated_at: String,
}

impl AboutContent {
    pub fn new(content: String) -> Self {
        Self {
            content,
            updated_at: Utc::now().to_rfc3339(),
        }
    }
}

/// Served (and persisted) on first access, before anything was written.
pub fn default_about() -> AboutContent {
    AboutContent::new(
        "## Welcome\n\n\
         This is a place for technical notes, learnings and the occasional\n\
         photo. Edit this page from the admin area to make it yours.\n\n\
         ## Get in touch\n\n\
         - GitHub: github.com/your-username\n\
         - Email: your.email@example.com"
            .to_string(),
    )
}

#[derive(Debug, Deserialize)]
pub struct UpdateAboutRequest {
    pub content: String,
}
