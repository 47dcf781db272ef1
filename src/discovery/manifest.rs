//! Manifest-backed discovery.
//!
//! A course manifest is a JSON export of the course tree with direct
//! download URLs already resolved, produced by whatever front-end handled
//! the platform session. [`ManifestDiscovery`] serves that file through the
//! [`CourseDiscovery`] trait, which keeps the downloader itself free of any
//! site glue and makes full end-to-end runs testable offline.

use super::{
    CourseDiscovery, CourseInfo, DiscoveredItem, DiscoveryError, LessonHandle, PrimarySource,
    ResolveTarget,
};
use crate::MaterialKind;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use url::Url;

/// Manifest loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// Could not read the manifest file
    #[error("failed to read manifest: {0}")]
    Io(#[from] std::io::Error),

    /// The manifest is not valid JSON of the expected shape
    #[error("failed to parse manifest: {0}")]
    Parse(#[from] serde_json::Error),
}

/// One course entry in a manifest file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseManifest {
    /// Course URL as it appears in the queue
    pub url: Url,
    /// Full course title
    pub title: String,
    /// Lessons in course order
    pub lessons: Vec<LessonManifest>,
}

/// One lesson entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonManifest {
    /// Platform-stable lesson id
    pub id: String,
    /// Lesson title
    pub title: String,
    /// Items in lesson order
    pub items: Vec<ItemManifest>,
}

/// One item entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "type")]
pub enum ItemManifest {
    /// A lecture video with per-resolution source URLs
    #[serde(rename = "video")]
    Video {
        /// Item title
        title: String,
        /// Download URL per resolution label (e.g. `"720p"`)
        sources: HashMap<String, Url>,
        /// Companion material URL per material label (e.g. `"slides"`)
        #[serde(default)]
        companions: HashMap<String, Url>,
    },
    /// A document with per-rendition URLs
    #[serde(rename = "document")]
    Document {
        /// Item title
        title: String,
        /// Platform file name
        file_name: String,
        /// Download URL per rendition label (e.g. `"original"`)
        variants: HashMap<String, Url>,
        /// Companion material URL per material label
        #[serde(default)]
        companions: HashMap<String, Url>,
    },
}

impl ItemManifest {
    fn title(&self) -> &str {
        match self {
            ItemManifest::Video { title, .. } | ItemManifest::Document { title, .. } => title,
        }
    }

    fn companions(&self) -> &HashMap<String, Url> {
        match self {
            ItemManifest::Video { companions, .. }
            | ItemManifest::Document { companions, .. } => companions,
        }
    }
}

/// Discovery adapter over a set of course manifests.
#[derive(Debug)]
pub struct ManifestDiscovery {
    courses: Vec<CourseManifest>,
}

impl ManifestDiscovery {
    /// Build from already-parsed manifests.
    pub fn new(courses: Vec<CourseManifest>) -> Self {
        Self { courses }
    }

    /// Load a manifest file holding a JSON array of courses.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let courses = serde_json::from_str(&contents)?;
        Ok(Self::new(courses))
    }

    fn course(&self, url: &Url) -> Result<&CourseManifest, DiscoveryError> {
        self.courses
            .iter()
            .find(|c| &c.url == url)
            .ok_or_else(|| DiscoveryError::NotFound(format!("course not in manifest: {url}")))
    }

    fn lesson(&self, id: &str) -> Result<&LessonManifest, DiscoveryError> {
        self.courses
            .iter()
            .flat_map(|c| c.lessons.iter())
            .find(|l| l.id == id)
            .ok_or_else(|| DiscoveryError::NotFound(format!("lesson not in manifest: {id}")))
    }

    fn item(&self, discovered: &DiscoveredItem) -> Result<&ItemManifest, DiscoveryError> {
        let lesson = self.lesson(&discovered.lesson_id)?;
        lesson.items.get(discovered.index).ok_or_else(|| {
            DiscoveryError::NotFound(format!(
                "item {} not in lesson {}",
                discovered.index, discovered.lesson_id
            ))
        })
    }
}

#[async_trait]
impl CourseDiscovery for ManifestDiscovery {
    async fn open_course(&self, url: &Url) -> Result<CourseInfo, DiscoveryError> {
        let course = self.course(url)?;
        Ok(CourseInfo {
            url: course.url.clone(),
            title: course.title.clone(),
        })
    }

    async fn lessons(&self, course: &CourseInfo) -> Result<Vec<LessonHandle>, DiscoveryError> {
        let course = self.course(&course.url)?;
        Ok(course
            .lessons
            .iter()
            .map(|l| LessonHandle {
                id: l.id.clone(),
                title: l.title.clone(),
            })
            .collect())
    }

    async fn activate_lesson(&self, lesson: &LessonHandle) -> Result<(), DiscoveryError> {
        self.lesson(&lesson.id).map(|_| ())
    }

    async fn items(&self, lesson: &LessonHandle) -> Result<Vec<DiscoveredItem>, DiscoveryError> {
        let lesson = self.lesson(&lesson.id)?;
        Ok(lesson
            .items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let mut companions: Vec<MaterialKind> = item
                    .companions()
                    .keys()
                    .filter_map(|k| match k.as_str() {
                        "mindmap" => Some(MaterialKind::MindMap),
                        "summary" => Some(MaterialKind::Summary),
                        "slides" => Some(MaterialKind::Slides),
                        _ => None,
                    })
                    .collect();
                companions.sort_by_key(|m| m.id_suffix());
                DiscoveredItem {
                    lesson_id: lesson.id.clone(),
                    title: item.title().to_string(),
                    index,
                    source: match item {
                        ItemManifest::Video { .. } => PrimarySource::Video,
                        ItemManifest::Document { file_name, .. } => PrimarySource::Document {
                            file_name: file_name.clone(),
                        },
                    },
                    companions,
                }
            })
            .collect())
    }

    async fn resolve(
        &self,
        item: &DiscoveredItem,
        target: ResolveTarget,
    ) -> Result<Url, DiscoveryError> {
        let manifest_item = self.item(item)?;
        let unavailable = |what: String| DiscoveryError::Unavailable(what);

        match (manifest_item, target) {
            (ItemManifest::Video { sources, .. }, ResolveTarget::Video { resolution }) => sources
                .get(&resolution.to_string())
                .cloned()
                .ok_or_else(|| unavailable(format!("{resolution} for {}", item.title))),
            (ItemManifest::Document { variants, .. }, ResolveTarget::Document { variant }) => {
                variants
                    .get(&variant.to_string())
                    .cloned()
                    .ok_or_else(|| unavailable(format!("{variant} rendition of {}", item.title)))
            }
            (manifest_item, ResolveTarget::Companion { material }) => manifest_item
                .companions()
                .get(material.id_suffix())
                .cloned()
                .ok_or_else(|| unavailable(format!("{material} for {}", item.title))),
            _ => Err(DiscoveryError::Protocol(format!(
                "target does not match item type for {}",
                item.title
            ))),
        }
    }
}
