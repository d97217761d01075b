use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::wiki::{Method, Params, WikiClient, params};

use super::PageSource;
use super::talk::detalkify;

const CANONICAL_PREFIX: &str = "Category:";

/// Category namespace names the wiki accepts, localized and abbreviated.
static CATEGORY_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:category|категория|к)\s*:").unwrap());

/// Prepend the category namespace unless the title already carries one.
pub fn normalize_category_title(title: &str) -> String {
    let title = title.trim();
    if CATEGORY_PREFIX.is_match(title) {
        title.to_string()
    } else {
        format!("{CANONICAL_PREFIX}{title}")
    }
}

// ---------------------------------------------------------------------------
// Continuation
// ---------------------------------------------------------------------------

/// How a listing response says whether more results follow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Continuation {
    NoMore,
    /// Pre-1.21 `query-continue.<module>` block.
    Legacy(Params),
    /// Current top-level `continue` block.
    Modern(Params),
}

impl Continuation {
    pub fn from_reply(reply: &serde_json::Value, module: &str) -> Result<Self> {
        if let Some(legacy) = reply.get("query-continue") {
            return match legacy.get(module) {
                Some(block) => Ok(Self::Legacy(block_to_params(block)?)),
                None => Ok(Self::NoMore),
            };
        }
        if let Some(modern) = reply.get("continue") {
            return Ok(Self::Modern(block_to_params(modern)?));
        }
        Ok(Self::NoMore)
    }
}

fn block_to_params(block: &serde_json::Value) -> Result<Params> {
    let object = block.as_object().ok_or_else(|| {
        Error::BackendQuery(format!("continuation block is not an object: {block}"))
    })?;
    object
        .iter()
        .map(|(key, value)| {
            let value = match value {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Number(n) => n.to_string(),
                other => {
                    return Err(Error::BackendQuery(format!(
                        "unexpected continuation value for {key}: {other}"
                    )));
                }
            };
            Ok((key.clone(), value))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct ListingQuery {
    #[serde(default)]
    categorymembers: Vec<MemberNode>,
}

#[derive(Debug, Deserialize)]
struct MemberNode {
    title: String,
}

// ---------------------------------------------------------------------------
// CategorySource
// ---------------------------------------------------------------------------

/// Members of one category, restricted to a set of namespaces.
pub struct CategorySource<W> {
    title: String,
    namespaces: BTreeSet<i32>,
    detalkify: bool,
    client: W,
}

impl<W: WikiClient> CategorySource<W> {
    pub fn new(title: &str, namespaces: BTreeSet<i32>, detalkify: bool, client: W) -> Self {
        Self {
            title: normalize_category_title(title),
            namespaces,
            detalkify,
            client,
        }
    }

    fn base_params(&self) -> Params {
        let namespaces = self
            .namespaces
            .iter()
            .map(i32::to_string)
            .collect::<Vec<_>>()
            .join("|");
        params([
            ("list", "categorymembers"),
            ("cmtitle", self.title.as_str()),
            ("cmnamespace", namespaces.as_str()),
            ("cmprop", "title"),
            ("cmlimit", "max"),
        ])
    }
}

impl<W: WikiClient> PageSource for CategorySource<W> {
    fn resolve(&self) -> Result<Vec<String>> {
        let mut request = self.base_params();
        let mut titles = Vec::new();
        let mut round_trips = 0u32;

        loop {
            let reply = self.client.query(&request, Method::Get)?;
            round_trips += 1;

            if let Some(query) = reply.get("query") {
                let listing: ListingQuery = serde_json::from_value(query.clone()).map_err(|e| {
                    Error::BackendQuery(format!("failed to parse category members: {e}"))
                })?;
                titles.extend(listing.categorymembers.into_iter().map(|m| m.title));
            }

            let next = match Continuation::from_reply(&reply, "categorymembers")? {
                Continuation::NoMore => break,
                Continuation::Legacy(next) | Continuation::Modern(next) => next,
            };
            if next.iter().all(|(k, v)| request.get(k) == Some(v)) {
                return Err(Error::BackendQuery(format!(
                    "continuation for {} did not advance",
                    self.title
                )));
            }
            request.extend(next);
        }

        debug!(
            category = %self.title,
            count = titles.len(),
            round_trips,
            "resolved category members"
        );

        if self.detalkify {
            Ok(titles.iter().map(|t| detalkify(t)).collect())
        } else {
            Ok(titles)
        }
    }
}
