use std::fmt;

use crate::MediaDescriptor;

const IMAGE_ESTIMATE_MB: f64 = 0.5;
const VIDEO_ESTIMATE_MB: f64 = 2.0;

/// Rough archive size guess shown before a job starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArchiveEstimate {
    pub images: usize,
    pub videos: usize,
}

impl ArchiveEstimate {
    pub fn for_items(items: &[MediaDescriptor]) -> Self {
        let videos = items.iter().filter(|item| item.is_video).count();
        Self {
            images: items.len() - videos,
            videos,
        }
    }

    pub fn megabytes(&self) -> f64 {
        self.images as f64 * IMAGE_ESTIMATE_MB + self.videos as f64 * VIDEO_ESTIMATE_MB
    }
}

impl fmt::Display for ArchiveEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mb = self.megabytes();
        if mb < 1.0 {
            write!(f, "~{} KB", (mb * 1000.0).round())
        } else {
            let tenths = (mb * 10.0).round() / 10.0;
            if tenths.fract() == 0.0 {
                write!(f, "~{tenths:.0} MB")
            } else {
                write!(f, "~{tenths:.1} MB")
            }
        }
    }
}

/// An archive is only worth offering for two or more items.
pub fn should_offer_archive(items: &[MediaDescriptor]) -> bool {
    items.len() >= 2
}

/// Image-heavy jobs are the ones most often refused by media hosts.
pub fn cors_risk(items: &[MediaDescriptor]) -> bool {
    let estimate = ArchiveEstimate::for_items(items);
    estimate.images > estimate.videos && estimate.images > 2
}
