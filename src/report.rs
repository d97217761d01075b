use rand::Rng;
use rand::seq::SliceRandom;
use tracing::debug;

use crate::render::{SiteLinks, summary_line};
use crate::review::ReviewStatus;
use crate::timestamp::Timestamp;

pub const DEFAULT_MAX_STALE_RESULTS: usize = 20;
pub const DEFAULT_MAX_UNREVIEWED_RESULTS: usize = 5;

/// Caps on how many pages a report lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportLimits {
    pub max_stale_results: usize,
    pub max_unreviewed_results: usize,
}

impl Default for ReportLimits {
    fn default() -> Self {
        Self {
            max_stale_results: DEFAULT_MAX_STALE_RESULTS,
            max_unreviewed_results: DEFAULT_MAX_UNREVIEWED_RESULTS,
        }
    }
}

/// Where a single page lands in the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageClass {
    Unreviewed,
    Reviewed,
    /// Pending review since the cutoff or later.
    Stale,
    /// Pending since before the cutoff; an earlier report already covered it.
    Suppressed,
}

pub fn classify(status: &ReviewStatus, cutoff: &Timestamp) -> PageClass {
    match status {
        ReviewStatus::Unreviewed => PageClass::Unreviewed,
        ReviewStatus::ReviewedCurrent => PageClass::Reviewed,
        ReviewStatus::PendingReview { since, .. } if since < cutoff => PageClass::Suppressed,
        ReviewStatus::PendingReview { .. } => PageClass::Stale,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedPage {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StalePage {
    pub pending_since: Timestamp,
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportResult {
    pub total_count: usize,
    pub unreviewed_count: usize,
    pub reviewed_count: usize,
    pub stale_count: usize,
    pub suppressed_count: usize,
    pub summary_text: String,
    /// Oldest first. When `stale_truncated` is set only the newest entries remain.
    pub ranked_stale: Vec<StalePage>,
    pub stale_truncated: bool,
    /// Only filled when there are no stale pages.
    pub sampled_unreviewed: Vec<LinkedPage>,
}

/// Classify every page and build the bounded report lists.
///
/// `total_count` is the size of the page list that was queried; the backend
/// may have returned fewer statuses than that.
pub fn aggregate<I, R>(
    total_count: usize,
    statuses: I,
    cutoff: &Timestamp,
    limits: &ReportLimits,
    links: &SiteLinks,
    rng: &mut R,
) -> ReportResult
where
    I: IntoIterator<Item = (String, ReviewStatus)>,
    R: Rng + ?Sized,
{
    let mut reviewed_count = 0;
    let mut suppressed_count = 0;
    let mut unreviewed = Vec::new();
    let mut stale = Vec::new();

    for (title, status) in statuses {
        match classify(&status, cutoff) {
            PageClass::Unreviewed => unreviewed.push(LinkedPage {
                url: links.page_url(&title),
                title,
            }),
            PageClass::Reviewed => reviewed_count += 1,
            PageClass::Suppressed => suppressed_count += 1,
            PageClass::Stale => {
                if let ReviewStatus::PendingReview {
                    since,
                    stable_revision_id,
                } = status
                {
                    stale.push(StalePage {
                        pending_since: since,
                        url: links.diff_url(&stable_revision_id),
                        title,
                    });
                }
            }
        }
    }

    let unreviewed_count = unreviewed.len();
    let stale_count = stale.len();

    stale.sort_by(|a, b| {
        a.pending_since
            .cmp(&b.pending_since)
            .then_with(|| a.title.cmp(&b.title))
    });
    let stale_truncated = stale_count > limits.max_stale_results;
    if stale_truncated {
        let keep = limits.max_stale_results.saturating_sub(1);
        stale.drain(..stale_count - keep);
    }

    let sampled_unreviewed = if stale_count == 0 {
        unreviewed.shuffle(rng);
        unreviewed.truncate(limits.max_unreviewed_results);
        unreviewed
    } else {
        Vec::new()
    };

    debug!(
        total_count,
        unreviewed_count,
        reviewed_count,
        stale_count,
        suppressed_count,
        "pages classified"
    );

    ReportResult {
        total_count,
        unreviewed_count,
        reviewed_count,
        stale_count,
        suppressed_count,
        summary_text: summary_line(total_count, unreviewed_count, stale_count),
        ranked_stale: stale,
        stale_truncated,
        sampled_unreviewed,
    }
}
