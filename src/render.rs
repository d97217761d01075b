use crate::report::ReportResult;

/// Embed accent colour (Discord blue).
pub const ACCENT_COLOR: u32 = 3447003;

/// First list item when older stale pages were cut from the list.
pub const ELISION_MARKER: &str = "…";

/// Builds page and diff links for one wiki.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteLinks {
    site_url: String,
}

impl SiteLinks {
    pub fn new(site_url: &str) -> Self {
        Self {
            site_url: site_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn page_url(&self, title: &str) -> String {
        format!("{}/wiki/{}", self.site_url, encode_title(title))
    }

    /// Diff from the last reviewed revision to the current one.
    pub fn diff_url(&self, stable_revision_id: &str) -> String {
        format!(
            "{}/w/index.php?diff=cur&oldid={stable_revision_id}",
            self.site_url
        )
    }
}

/// Wiki-style path segment: spaces become underscores; characters that would
/// end the path or a Markdown link target are percent-encoded.
fn encode_title(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    for c in title.chars() {
        match c {
            ' ' => out.push('_'),
            '%' => out.push_str("%25"),
            '?' => out.push_str("%3F"),
            '(' => out.push_str("%28"),
            ')' => out.push_str("%29"),
            c => out.push(c),
        }
    }
    out
}

/// `100 * count / total` with two significant figures; `0` when `total` is zero.
pub fn format_percent(count: usize, total: usize) -> String {
    if total == 0 || count == 0 {
        return "0".to_string();
    }
    let value = 100.0 * count as f64 / total as f64;
    let magnitude = value.log10().floor() as i32;
    let decimals = (1 - magnitude).max(0) as usize;
    let formatted = format!("{value:.decimals$}");
    if formatted.contains('.') {
        formatted
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    } else {
        formatted
    }
}

pub fn summary_line(total: usize, unreviewed: usize, stale: usize) -> String {
    format!(
        "Checked {total} pages: {unreviewed} unreviewed ({}%), {stale} with pending changes ({}%).",
        format_percent(unreviewed, total),
        format_percent(stale, total),
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedReport {
    pub summary_line: String,
    pub body: String,
    pub color: u32,
}

pub fn render(result: &ReportResult) -> RenderedReport {
    let mut body = String::new();

    if result.stale_count > 0 {
        body.push_str(&format!(
            "**Pending review since the last report ({}):**",
            result.stale_count
        ));
        if result.stale_truncated {
            body.push_str(&format!("\n- {ELISION_MARKER}"));
        }
        for page in &result.ranked_stale {
            body.push_str(&format!("\n- [{}]({})", page.title, page.url));
        }
    } else {
        body.push_str("**Nothing new is waiting for review!**");
        if !result.sampled_unreviewed.is_empty() {
            body.push_str("\n\nA good moment to clear some of the backlog:");
            for page in &result.sampled_unreviewed {
                body.push_str(&format!("\n- [{}]({})", page.title, page.url));
            }
        }
    }

    RenderedReport {
        summary_line: result.summary_text.clone(),
        body,
        color: ACCENT_COLOR,
    }
}
