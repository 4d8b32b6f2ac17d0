use serde::{Deserialize, Serialize};

/// One image inside a gallery folder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GalleryImage {
    /// `img-{millis}-{random}`, unique within its folder.
    pub id: String,
    pub thumbnail_url: String,
    pub original_url: String,
    pub file_name: String,
    pub timestamp: i64,
}

/// A gallery folder owning an ordered sequence of images.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryFolder {
    pub id: String,
    pub name: String,
    /// Id of the cover image; when present it references an entry of
    /// `images`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,
    #[serde(default)]
    pub images: Vec<GalleryImage>,
    pub created_at: String,
    pub updated_at: String,
}

impl GalleryFolder {
    /// The image the folder presents as its cover, falling back to the
    /// first image when no explicit cover is set.
    pub fn cover_image(&self) -> Option<&GalleryImage> {
        match &self.cover {
            Some(cover_id) => self.images.iter().find(|img| &img.id == cover_id),
            None => self.images.first(),
        }
    }
}

/// The whole gallery collection document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GalleryData {
    #[serde(default)]
    pub folders: Vec<GalleryFolder>,
}

/// Folder listing entry with its cover resolved for display.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderSummary {
    #[serde(flatten)]
    pub folder: GalleryFolder,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<GalleryImage>,
}

#[derive(Debug, Deserialize)]
pub struct CreateFolderRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteFolderRequest {
    pub folder_id: String,
}

/// `PUT /api/gallery/:folderId` body: one of rename / setCover / reorder.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderActionRequest {
    pub action: String,
    #[serde(default)]
    pub image_id: Option<String>,
    #[serde(default)]
    pub image_ids: Option<Vec<String>>,
    #[serde(default)]
    pub new_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteImageRequest {
    pub image_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(id: &str) -> GalleryImage {
        GalleryImage {
            id: id.to_string(),
            thumbnail_url: format!("https://x/{}-thumb.jpg", id),
            original_url: format!("https://x/{}.jpg", id),
            file_name: format!("{}.jpg", id),
            timestamp: 0,
        }
    }

    #[test]
    fn test_cover_image_resolution() {
        let mut folder = GalleryFolder {
            id: "folder-1".to_string(),
            name: "Trip".to_string(),
            cover: Some("b".to_string()),
            images: vec![image("a"), image("b")],
            created_at: String::new(),
            updated_at: String::new(),
        };
        assert_eq!(folder.cover_image().unwrap().id, "b");

        folder.cover = None;
        assert_eq!(folder.cover_image().unwrap().id, "a");

        folder.images.clear();
        assert!(folder.cover_image().is_none());
    }

    #[test]
    fn test_gallery_document_deserializes_with_missing_fields() {
        let data: GalleryData = serde_json::from_str(r#"{"folders":[]}"#).unwrap();
        assert!(data.folders.is_empty());

        let folder: GalleryFolder = serde_json::from_str(
            r#"{"id":"folder-1","name":"n","createdAt":"t","updatedAt":"t"}"#,
        )
        .unwrap();
        assert!(folder.cover.is_none());
        assert!(folder.images.is_empty());
    }
}
