use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::timestamp::Timestamp;
use crate::wiki::{Method, WikiClient, params};

pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Separator for multi-value API parameters. No escape exists for it, so a
/// title containing it cannot be queried in a batch.
pub const TITLE_SEPARATOR: &str = "|";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewStatus {
    /// No revision of the page has ever been reviewed.
    Unreviewed,
    /// The latest revision is the reviewed one.
    ReviewedCurrent,
    /// Edits after the stable revision are waiting for review.
    PendingReview {
        since: Timestamp,
        stable_revision_id: String,
    },
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FlaggedQuery {
    #[serde(default)]
    pages: Pages,
}

/// `formatversion=1` keys pages by id; `formatversion=2` returns a list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Pages {
    ById(BTreeMap<String, PageNode>),
    List(Vec<PageNode>),
}

impl Default for Pages {
    fn default() -> Self {
        Pages::List(Vec::new())
    }
}

impl Pages {
    fn into_nodes(self) -> Vec<PageNode> {
        match self {
            Pages::ById(map) => map.into_values().collect(),
            Pages::List(list) => list,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PageNode {
    title: String,
    flagged: Option<FlaggedNode>,
}

#[derive(Debug, Deserialize)]
struct FlaggedNode {
    stable_revid: Option<serde_json::Value>,
    pending_since: Option<String>,
}

fn status_of(page: &PageNode) -> Result<ReviewStatus> {
    let Some(flagged) = &page.flagged else {
        return Ok(ReviewStatus::Unreviewed);
    };
    let Some(pending_since) = &flagged.pending_since else {
        return Ok(ReviewStatus::ReviewedCurrent);
    };

    let since = Timestamp::parse(pending_since).ok_or_else(|| {
        Error::BackendQuery(format!(
            "malformed pending_since for {}: {pending_since}",
            page.title
        ))
    })?;
    let stable_revision_id = match &flagged.stable_revid {
        Some(serde_json::Value::Number(n)) => n.to_string(),
        Some(serde_json::Value::String(s)) if !s.is_empty() => s.clone(),
        _ => {
            return Err(Error::BackendQuery(format!(
                "pending page {} has no stable_revid",
                page.title
            )));
        }
    };

    Ok(ReviewStatus::PendingReview {
        since,
        stable_revision_id,
    })
}

/// Turn one `prop=flagged` reply into per-page statuses.
pub fn parse_status_reply(reply: &serde_json::Value) -> Result<Vec<(String, ReviewStatus)>> {
    let Some(query) = reply.get("query") else {
        return Ok(Vec::new());
    };
    let parsed: FlaggedQuery = serde_json::from_value(query.clone())
        .map_err(|e| Error::BackendQuery(format!("failed to parse flagged status: {e}")))?;

    parsed
        .pages
        .into_nodes()
        .into_iter()
        .map(|page| {
            let status = status_of(&page)?;
            Ok((page.title, status))
        })
        .collect()
}

/// Query review status for `pages`, `batch_size` titles per request.
///
/// The backend may answer with fewer pages than asked (normalisation,
/// duplicates); that is not an error. Any failed batch aborts the fetch.
pub fn fetch_review_statuses<W: WikiClient>(
    client: &W,
    pages: &[String],
    batch_size: usize,
) -> Result<Vec<(String, ReviewStatus)>> {
    if let Some(bad) = pages.iter().find(|t| t.contains(TITLE_SEPARATOR)) {
        return Err(Error::BackendQuery(format!(
            "title contains the `{TITLE_SEPARATOR}` separator and cannot be batched: {bad}"
        )));
    }

    let mut statuses = Vec::with_capacity(pages.len());
    for (index, batch) in pages.chunks(batch_size.max(1)).enumerate() {
        let titles = batch.join(TITLE_SEPARATOR);
        let reply = client.query(
            &params([("prop", "flagged"), ("titles", titles.as_str())]),
            Method::Post,
        )?;
        let parsed = parse_status_reply(&reply)?;
        debug!(
            batch = index,
            requested = batch.len(),
            received = parsed.len(),
            "fetched review status batch"
        );
        statuses.extend(parsed);
    }
    Ok(statuses)
}
