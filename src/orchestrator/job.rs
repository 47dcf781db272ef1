//! Job planning.
//!
//! A [`DiscoveredItem`] expands into one job per artifact the run wants:
//! the primary video or the selected document renditions, plus any enabled
//! companion materials. Each job carries its own stable ledger id and final
//! destination path, so jobs succeed and resume independently.

use crate::config::DownloadConfig;
use crate::discovery::{DiscoveredItem, PrimarySource, ResolveTarget};
use crate::{naming, ItemKind};
use std::path::{Path, PathBuf};

/// One planned artifact download.
#[derive(Debug, Clone)]
pub struct DownloadJob {
    /// The item this job was planned from
    pub item: DiscoveredItem,
    /// What to ask discovery to resolve
    pub target: ResolveTarget,
    /// Stable ledger id
    pub item_id: String,
    /// Display name for progress UIs
    pub display_name: String,
    /// Final artifact path
    pub dest: PathBuf,
    /// Artifact kind, drives verification and naming
    pub kind: ItemKind,
}

/// Expand one discovered item into jobs according to the run configuration.
///
/// `document_dir` and `video_dir` are the lesson-level directories artifacts
/// land in (`{dest}/{subject}/{lesson}`). Companion materials sit next to
/// their primary artifact.
pub fn plan_jobs(
    item: &DiscoveredItem,
    config: &DownloadConfig,
    document_dir: &Path,
    video_dir: &Path,
) -> Vec<DownloadJob> {
    let mut jobs = Vec::new();
    let primary_id = naming::primary_item_id(&item.lesson_id, &item.title, item.index);
    let clean_title = naming::sanitize_component(&item.title);
    let stem = format!("{:02} - {}", item.index + 1, clean_title);

    let extras_enabled = match item.source {
        PrimarySource::Video => {
            let kind = ItemKind::Video {
                resolution: config.resolution,
            };
            jobs.push(DownloadJob {
                item: item.clone(),
                target: ResolveTarget::Video {
                    resolution: config.resolution,
                },
                item_id: primary_id.clone(),
                display_name: item.title.clone(),
                dest: video_dir.join(format!("{stem}.{}", kind.extension())),
                kind,
            });
            config.extras_with_videos
        }
        PrimarySource::Document { ref file_name } => {
            for variant in config.document_variants.variants() {
                // The rendition is part of the key so each resumes on its own
                let base = naming::document_item_id(&item.lesson_id, file_name);
                jobs.push(DownloadJob {
                    item: item.clone(),
                    target: ResolveTarget::Document { variant },
                    item_id: format!("{base}-{variant}"),
                    display_name: format!("{} ({})", item.title, variant.label()),
                    dest: document_dir.join(format!("{stem} ({}).pdf", variant.label())),
                    kind: ItemKind::Document { variant },
                });
            }
            config.extras_with_documents
        }
    };

    if extras_enabled {
        let companion_dir = match item.source {
            PrimarySource::Video => video_dir,
            PrimarySource::Document { .. } => document_dir,
        };
        for material in &item.companions {
            jobs.push(DownloadJob {
                item: item.clone(),
                target: ResolveTarget::Companion {
                    material: *material,
                },
                item_id: naming::companion_item_id(&primary_id, *material),
                display_name: format!("{} ({})", item.title, material.label()),
                dest: companion_dir.join(format!("{stem} ({}).pdf", material.label())),
                kind: ItemKind::Companion {
                    material: *material,
                },
            });
        }
    }

    jobs
}
