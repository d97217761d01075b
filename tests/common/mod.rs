#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::{Value, json};

use patrold::config::{Config, ReportConfig, ReportJob};
use patrold::delivery::{Delivery, Message, TypingGuard};
use patrold::error::{Error, Result};
use patrold::sources::SourceSpec;
use patrold::wiki::{Method, Params, WikiClient};

/// In-memory wiki: category members by category title, `flagged` blobs by
/// page title. Records every request it sees.
#[derive(Default)]
pub struct FakeWiki {
    pub members: HashMap<String, Vec<(i32, String)>>,
    pub flagged: HashMap<String, Value>,
    pub requests: RefCell<Vec<(Params, Method)>>,
}

impl FakeWiki {
    pub fn category(mut self, title: &str, members: &[(i32, &str)]) -> Self {
        self.members.insert(
            format!("Category:{title}"),
            members.iter().map(|(ns, t)| (*ns, t.to_string())).collect(),
        );
        self
    }

    pub fn reviewed(mut self, title: &str, stable_revid: u64) -> Self {
        self.flagged
            .insert(title.to_string(), json!({ "stable_revid": stable_revid }));
        self
    }

    pub fn pending(mut self, title: &str, stable_revid: u64, since: &str) -> Self {
        self.flagged.insert(
            title.to_string(),
            json!({ "stable_revid": stable_revid, "pending_since": since }),
        );
        self
    }

    pub fn flagged_requests(&self) -> usize {
        self.requests
            .borrow()
            .iter()
            .filter(|(p, _)| p.get("prop").map(String::as_str) == Some("flagged"))
            .count()
    }
}

impl WikiClient for FakeWiki {
    fn query(&self, params: &Params, method: Method) -> Result<Value> {
        self.requests.borrow_mut().push((params.clone(), method));

        if let Some(category) = params.get("cmtitle") {
            let namespaces: Vec<i32> = params
                .get("cmnamespace")
                .map(|ns| ns.split('|').filter_map(|n| n.parse().ok()).collect())
                .unwrap_or_default();
            let members = self
                .members
                .get(category)
                .ok_or_else(|| Error::BackendQuery(format!("unknown category {category}")))?;
            let members: Vec<Value> = members
                .iter()
                .filter(|(ns, _)| namespaces.is_empty() || namespaces.contains(ns))
                .map(|(ns, title)| json!({ "ns": ns, "title": title }))
                .collect();
            return Ok(json!({ "query": { "categorymembers": members } }));
        }

        let titles = params
            .get("titles")
            .ok_or_else(|| Error::BackendQuery("missing titles".to_string()))?;
        let mut pages = serde_json::Map::new();
        for (i, title) in titles.split('|').enumerate() {
            let mut page = json!({ "ns": 0, "title": title });
            if let Some(flagged) = self.flagged.get(title) {
                page["flagged"] = flagged.clone();
            }
            pages.insert((i + 1).to_string(), page);
        }
        Ok(json!({ "query": { "pages": pages } }))
    }
}

/// Delivery that keeps sent messages and counts typing scopes.
#[derive(Default)]
pub struct RecordingDelivery {
    pub sent: RefCell<Vec<(String, Message)>>,
    pub failing_channels: Vec<String>,
    pub typing_started: AtomicUsize,
    pub typing_released: Arc<AtomicUsize>,
}

impl RecordingDelivery {
    pub fn failing_on(channel: &str) -> Self {
        Self {
            failing_channels: vec![channel.to_string()],
            ..Default::default()
        }
    }

    pub fn released(&self) -> usize {
        self.typing_released.load(Ordering::SeqCst)
    }
}

impl Delivery for RecordingDelivery {
    fn send(&self, channel: &str, message: &Message) -> Result<()> {
        if self.failing_channels.iter().any(|c| c == channel) {
            return Err(Error::Delivery(format!("channel {channel} unavailable")));
        }
        self.sent
            .borrow_mut()
            .push((channel.to_string(), message.clone()));
        Ok(())
    }

    fn start_typing(&self, _channel: &str) -> TypingGuard {
        self.typing_started.fetch_add(1, Ordering::SeqCst);
        let released = Arc::clone(&self.typing_released);
        TypingGuard::new(move || {
            released.fetch_add(1, Ordering::SeqCst);
        })
    }
}

pub fn category_job(channel: &str, category: &str) -> ReportJob {
    ReportJob {
        channel: channel.to_string(),
        name: None,
        sources: vec![SourceSpec::category(category)],
    }
}

/// Sensible default `Config` for tests. Callers can override fields via struct update syntax.
pub fn test_config(jobs: Vec<ReportJob>) -> Config {
    Config {
        wiki: Default::default(),
        discord: Default::default(),
        report: ReportConfig::default(),
        jobs,
        dry_run: true,
        continuous: false,
    }
}
