pub mod category;
pub mod talk;

use std::collections::BTreeSet;
use std::fmt;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::wiki::WikiClient;

use category::CategorySource;

/// Namespace queried when a source does not name any.
pub const DEFAULT_NAMESPACE: i32 = 0;

/// A page source as written in the config file. Fields are checked when the
/// source is resolved, so one bad entry only costs that entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SourceSpec {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub title: Option<String>,
    pub namespaces: Option<Vec<i32>>,
    pub detalkify: Option<bool>,
}

impl SourceSpec {
    pub fn category(title: &str) -> Self {
        Self {
            kind: Some("category".to_string()),
            title: Some(title.to_string()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Category,
}

impl SourceKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "category" => Some(Self::Category),
            _ => None,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Category => f.write_str("category"),
        }
    }
}

/// A validated page source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    pub kind: SourceKind,
    pub title: String,
    pub namespaces: BTreeSet<i32>,
    pub detalkify: bool,
}

impl TryFrom<&SourceSpec> for SourceDescriptor {
    type Error = Error;

    fn try_from(spec: &SourceSpec) -> Result<Self> {
        let kind_name = spec
            .kind
            .as_deref()
            .ok_or_else(|| Error::InvalidSource("source is missing `type`".to_string()))?;
        let kind = SourceKind::from_name(kind_name).ok_or_else(|| {
            Error::InvalidSource(format!(
                "unsupported source type: {kind_name} (expected: category)"
            ))
        })?;

        let title = spec
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::InvalidSource(format!("{kind} source is missing `title`")))?;

        let namespaces: BTreeSet<i32> = match spec.namespaces.as_deref() {
            None => BTreeSet::from([DEFAULT_NAMESPACE]),
            Some([]) => {
                return Err(Error::InvalidSource(format!(
                    "{kind} source {title}: `namespaces` must not be empty"
                )));
            }
            Some(list) => {
                if let Some(bad) = list.iter().find(|ns| **ns < 0) {
                    return Err(Error::InvalidSource(format!(
                        "{kind} source {title}: namespace {bad} cannot hold pages"
                    )));
                }
                list.iter().copied().collect()
            }
        };

        Ok(Self {
            kind,
            title: title.to_string(),
            namespaces,
            detalkify: spec.detalkify.unwrap_or(false),
        })
    }
}

pub trait PageSource {
    /// List the titles this source denotes, in backend order.
    fn resolve(&self) -> Result<Vec<String>>;
}

pub enum AnySource<W> {
    Category(CategorySource<W>),
}

impl<W: WikiClient> AnySource<W> {
    pub fn from_descriptor(descriptor: &SourceDescriptor, client: W) -> Self {
        match descriptor.kind {
            SourceKind::Category => AnySource::Category(CategorySource::new(
                &descriptor.title,
                descriptor.namespaces.clone(),
                descriptor.detalkify,
                client,
            )),
        }
    }
}

impl<W: WikiClient> PageSource for AnySource<W> {
    fn resolve(&self) -> Result<Vec<String>> {
        match self {
            AnySource::Category(s) => s.resolve(),
        }
    }
}

/// Resolve every source of a job and merge the results into a set of titles.
///
/// Invalid sources are logged and skipped. Backend failures abort the whole
/// call. The returned list is sorted and free of duplicates.
pub fn collect_pages<W: WikiClient>(specs: &[SourceSpec], client: &W) -> Result<Vec<String>> {
    let mut pages = BTreeSet::new();
    let mut skipped = 0usize;

    for (index, spec) in specs.iter().enumerate() {
        let resolved = SourceDescriptor::try_from(spec)
            .and_then(|descriptor| AnySource::from_descriptor(&descriptor, client).resolve());
        match resolved {
            Ok(titles) => {
                debug!(index, count = titles.len(), "source resolved");
                pages.extend(titles);
            }
            Err(Error::InvalidSource(reason)) => {
                warn!(index, %reason, "skipping invalid source");
                skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }

    info!(
        sources = specs.len(),
        skipped,
        pages = pages.len(),
        "page list built"
    );
    Ok(pages.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wiki::{Method, Params};
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// Serves category listings keyed by `cmtitle`.
    struct CategoryWiki {
        categories: HashMap<String, Vec<&'static str>>,
        calls: RefCell<Vec<String>>,
        fail_on: Option<&'static str>,
    }

    impl CategoryWiki {
        fn new(categories: &[(&str, Vec<&'static str>)]) -> Self {
            Self {
                categories: categories
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect(),
                calls: RefCell::new(Vec::new()),
                fail_on: None,
            }
        }
    }

    impl WikiClient for CategoryWiki {
        fn query(&self, params: &Params, _method: Method) -> Result<serde_json::Value> {
            let title = params["cmtitle"].clone();
            self.calls.borrow_mut().push(title.clone());
            if self.fail_on == Some(title.as_str()) {
                return Err(Error::BackendQuery("timed out".to_string()));
            }
            let members: Vec<_> = self
                .categories
                .get(&title)
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .map(|t| serde_json::json!({ "title": t }))
                .collect();
            Ok(serde_json::json!({ "query": { "categorymembers": members } }))
        }
    }

    #[test]
    fn test_descriptor_defaults() {
        let d = SourceDescriptor::try_from(&SourceSpec::category("Physics")).unwrap();
        assert_eq!(d.kind, SourceKind::Category);
        assert_eq!(d.title, "Physics");
        assert_eq!(d.namespaces, BTreeSet::from([0]));
        assert!(!d.detalkify);
    }

    #[test]
    fn test_descriptor_missing_type() {
        let spec = SourceSpec {
            title: Some("Physics".to_string()),
            ..Default::default()
        };
        let err = SourceDescriptor::try_from(&spec).unwrap_err();
        assert!(matches!(err, Error::InvalidSource(_)));
        assert!(err.to_string().contains("missing `type`"));
    }

    #[test]
    fn test_descriptor_unknown_type() {
        let spec = SourceSpec {
            kind: Some("template".to_string()),
            title: Some("Infobox".to_string()),
            ..Default::default()
        };
        let err = SourceDescriptor::try_from(&spec).unwrap_err();
        assert!(err.to_string().contains("unsupported source type: template"));
    }

    #[test]
    fn test_descriptor_blank_title() {
        let spec = SourceSpec {
            kind: Some("category".to_string()),
            title: Some("   ".to_string()),
            ..Default::default()
        };
        let err = SourceDescriptor::try_from(&spec).unwrap_err();
        assert!(err.to_string().contains("missing `title`"));
    }

    #[test]
    fn test_descriptor_bad_namespaces() {
        let mut spec = SourceSpec::category("Physics");
        spec.namespaces = Some(vec![]);
        assert!(SourceDescriptor::try_from(&spec).is_err());
        spec.namespaces = Some(vec![0, -1]);
        assert!(SourceDescriptor::try_from(&spec).is_err());
        spec.namespaces = Some(vec![1, 1, 4]);
        let d = SourceDescriptor::try_from(&spec).unwrap();
        assert_eq!(d.namespaces, BTreeSet::from([1, 4]));
    }

    #[test]
    fn test_collect_pages_deduplicates_across_sources() {
        let wiki = CategoryWiki::new(&[
            ("Category:A", vec!["X", "Y", "Z"]),
            ("Category:B", vec!["Z", "W", "X", "X"]),
        ]);
        let specs = vec![SourceSpec::category("A"), SourceSpec::category("B")];
        let pages = collect_pages(&specs, &wiki).unwrap();
        assert_eq!(pages, vec!["W", "X", "Y", "Z"]);
    }

    #[test]
    fn test_collect_pages_order_independent() {
        let wiki = CategoryWiki::new(&[
            ("Category:A", vec!["X", "Y"]),
            ("Category:B", vec!["Y", "Z"]),
        ]);
        let forward = collect_pages(
            &[SourceSpec::category("A"), SourceSpec::category("B")],
            &wiki,
        )
        .unwrap();
        let backward = collect_pages(
            &[SourceSpec::category("B"), SourceSpec::category("A")],
            &wiki,
        )
        .unwrap();
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_collect_pages_skips_invalid_sources() {
        let wiki = CategoryWiki::new(&[("Category:A", vec!["X"]), ("Category:B", vec!["Y"])]);
        let specs = vec![
            SourceSpec::category("A"),
            SourceSpec {
                kind: Some("template".to_string()),
                title: Some("Infobox".to_string()),
                ..Default::default()
            },
            SourceSpec::default(),
            SourceSpec::category("B"),
        ];
        let pages = collect_pages(&specs, &wiki).unwrap();
        assert_eq!(pages, vec!["X", "Y"]);
        // Invalid sources never reach the backend.
        assert_eq!(
            *wiki.calls.borrow(),
            vec!["Category:A".to_string(), "Category:B".to_string()]
        );
    }

    #[test]
    fn test_collect_pages_empty_is_ok() {
        let wiki = CategoryWiki::new(&[]);
        assert!(collect_pages(&[], &wiki).unwrap().is_empty());
        let pages = collect_pages(&[SourceSpec::category("Nothing")], &wiki).unwrap();
        assert!(pages.is_empty());
    }

    #[test]
    fn test_collect_pages_backend_failure_aborts() {
        let mut wiki = CategoryWiki::new(&[("Category:A", vec!["X"])]);
        wiki.fail_on = Some("Category:B");
        let specs = vec![
            SourceSpec::category("A"),
            SourceSpec::category("B"),
            SourceSpec::category("C"),
        ];
        let err = collect_pages(&specs, &wiki).unwrap_err();
        assert!(matches!(err, Error::BackendQuery(_)));
        assert_eq!(wiki.calls.borrow().len(), 2);
    }
}
