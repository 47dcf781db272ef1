//! Content discovery adapter.
//!
//! The orchestrator never talks to the platform directly; it walks the
//! course tree through [`CourseDiscovery`]. Site-specific glue (session
//! handling, page scraping, API calls) lives behind this trait so the
//! traversal, retry and resume logic stay testable against a stub.

use crate::{DocumentVariant, MaterialKind, Resolution};
use async_trait::async_trait;
use url::Url;

mod manifest;

pub use manifest::{CourseManifest, ManifestDiscovery, ManifestError};

/// Discovery failures.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// The course, lesson or item does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// The requested rendition or resolution is not offered for this item
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// Transport failure talking to the platform
    #[error("network error: {0}")]
    Network(String),

    /// The platform answered with something the adapter cannot interpret
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// A course opened for traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseInfo {
    /// Course URL as queued
    pub url: Url,
    /// Full course title as shown on the platform
    pub title: String,
}

/// One lesson within a course.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonHandle {
    /// Platform-stable lesson id
    pub id: String,
    /// Lesson title
    pub title: String,
}

/// What the primary artifact of a discovered item is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimarySource {
    /// A lecture video
    Video,
    /// A lesson document with its platform file name
    Document {
        /// File name as listed by the platform
        file_name: String,
    },
}

/// One downloadable unit found inside a lesson.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredItem {
    /// Id of the lesson this item belongs to
    pub lesson_id: String,
    /// Item title
    pub title: String,
    /// Position within the lesson, part of the stable id
    pub index: usize,
    /// Primary artifact
    pub source: PrimarySource,
    /// Companion materials the platform offers for this item
    pub companions: Vec<MaterialKind>,
}

/// What [`CourseDiscovery::resolve`] should produce a URL for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveTarget {
    /// The item's video at a specific resolution
    Video {
        /// Requested resolution
        resolution: Resolution,
    },
    /// The item's document in a specific rendition
    Document {
        /// Requested rendition
        variant: DocumentVariant,
    },
    /// A companion material of the item
    Companion {
        /// Requested material
        material: MaterialKind,
    },
}

/// Site adapter walked by the orchestrator.
///
/// Implementations may be stateful (an authenticated session, an open page);
/// `activate_lesson` gives them a hook to prepare lesson content before
/// `items` is called.
#[async_trait]
pub trait CourseDiscovery: Send + Sync {
    /// Open a queued course URL and return its identity.
    ///
    /// Transient navigation hiccups (a redirect back to the dashboard, a
    /// slow page) are the adapter's concern; callers only see the final
    /// result.
    async fn open_course(&self, url: &Url) -> Result<CourseInfo, DiscoveryError>;

    /// List the lessons of an opened course, in course order.
    async fn lessons(&self, course: &CourseInfo) -> Result<Vec<LessonHandle>, DiscoveryError>;

    /// Prepare a lesson so its items can be listed.
    async fn activate_lesson(&self, lesson: &LessonHandle) -> Result<(), DiscoveryError>;

    /// List the downloadable items of an activated lesson, in lesson order.
    async fn items(&self, lesson: &LessonHandle) -> Result<Vec<DiscoveredItem>, DiscoveryError>;

    /// Resolve a direct download URL for one target of an item.
    ///
    /// Returns [`DiscoveryError::Unavailable`] when the platform does not
    /// offer that target, which the caller may treat as a fallback cue.
    async fn resolve(
        &self,
        item: &DiscoveredItem,
        target: ResolveTarget,
    ) -> Result<Url, DiscoveryError>;
}
