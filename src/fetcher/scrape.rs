use std::borrow::Cow;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use once_cell::sync::Lazy;
use quick_xml::escape::{resolve_html5_entity, resolve_predefined_entity, unescape_with};
use regex::{Captures, Regex};
use url::Url;

use crate::{
    config::ScrapeSettings,
    error::ExportError,
    fetcher::{
        Page, PageSource,
        http::{HttpClient, Response},
    },
    record::{FieldMap, RawRecord},
};

const NAME: &str = "Google Scholar";

/// Keys are the labels of the citation detail table, plus `title`, `link` and `citation_id`,
/// which are filled in from the page heading and the request itself.
static FIELDS: FieldMap = FieldMap {
    title: &["title"],
    authors: &["Authors", "Inventors"],
    journal: &["Journal"],
    date: &["Publication date"],
    link: &["link"],
    citation_id: &["citation_id"],
};

/// Scrapes an author's profile pages on scholar.google.com directly.
///
/// Each page of the profile's publication list costs one request, plus one request per
/// publication for its detail view. The continuation token is the `cstart` offset of the next
/// list page.
pub struct Scholar {
    http: HttpClient,
    settings: ScrapeSettings,
    progress: MultiProgress,
}

impl Scholar {
    pub fn new(settings: ScrapeSettings, progress: MultiProgress) -> Self {
        let http = HttpClient::new(settings.delay, &settings.user_agent);
        Scholar {
            http,
            settings,
            progress,
        }
    }

    fn citations_url(&self) -> anyhow::Result<Url> {
        let mut url = self.settings.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("base URL {} cannot take a path", self.settings.base_url))?
            .pop_if_empty()
            .push("citations");
        Ok(url)
    }

    fn list_url(&self, author_id: &str, cstart: usize) -> anyhow::Result<Url> {
        let mut url = self.citations_url()?;
        url.query_pairs_mut()
            .append_pair("user", author_id)
            .append_pair("hl", "en")
            .append_pair("cstart", &cstart.to_string())
            .append_pair("pagesize", &self.settings.page_size.to_string());
        Ok(url)
    }

    fn detail_url(&self, author_id: &str, citation_id: &str) -> anyhow::Result<Url> {
        let mut url = self.citations_url()?;
        url.query_pairs_mut()
            .append_pair("view_op", "view_citation")
            .append_pair("hl", "en")
            .append_pair("user", author_id)
            .append_pair("citation_for_view", citation_id);
        Ok(url)
    }

    fn get(&self, url: &Url) -> anyhow::Result<Response> {
        let res = self.http.get(url)?;
        if !res.is_success() {
            return Err(ExportError::Http {
                source_name: NAME,
                status: res.status,
                url: url.to_string(),
            }
            .into());
        }
        Ok(res)
    }
}

impl PageSource for Scholar {
    fn name(&self) -> &'static str {
        NAME
    }

    fn fields(&self) -> &'static FieldMap {
        &FIELDS
    }

    fn fetch_page(&self, author_id: &str, token: Option<&str>) -> anyhow::Result<Page> {
        let cstart = match token.map(str::parse::<usize>) {
            None => 0,
            Some(Ok(n)) => n,
            Some(Err(_)) => {
                log::warn!("{NAME}: unusable offset token {token:?}, stopping");
                return Ok(Page::empty());
            }
        };
        let list = self.get(&self.list_url(author_id, cstart)?)?;
        let ids = collect_citation_ids(&list.body);
        if ids.is_empty() {
            return Ok(Page::empty());
        }
        log::debug!("{NAME}: {} citations listed from offset {cstart}", ids.len());

        let bar = ClearOnDrop(self.progress.add(ProgressBar::new(ids.len() as u64)));
        if let Ok(style) = ProgressStyle::with_template("{spinner} [{pos}/{len}] {msg}") {
            bar.0.set_style(style);
        }
        let mut records = Vec::with_capacity(ids.len());
        for id in &ids {
            bar.0.set_message(id.clone());
            let detail = self.get(&self.detail_url(author_id, id)?)?;
            let record = parse_citation(&detail.body, id);
            if record.is_empty() {
                log::debug!("{NAME}: no citation table for {id}, skipping");
            } else {
                records.push(record);
            }
            bar.0.inc(1);
        }
        drop(bar);

        let next = (ids.len() >= self.settings.page_size).then(|| (cstart + ids.len()).to_string());
        Ok(Page { records, next })
    }
}

/// Clears the detail progress bar however the page fetch ends.
struct ClearOnDrop(ProgressBar);

impl Drop for ClearOnDrop {
    fn drop(&mut self) {
        self.0.finish_and_clear();
    }
}

static ATTR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)([a-zA-Z_:\-]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap());
static ANCHOR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(?is)<a\b[^>]*>"#).unwrap());
static CITATION_FOR_VIEW_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"citation_for_view=([^&"'#\s]+)"#).unwrap());
static TITLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<div\b[^>]*\bid\s*=\s*["']gsc_oci_title["'][^>]*>(.*?)</div>"#).unwrap()
});
static TABLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?is)<div\b[^>]*\bid\s*=\s*["']gsc_oci_table["']"#).unwrap());
static ROW_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?is)<div\b[^>]*class\s*=\s*["']gsc_oci_field["'][^>]*>(.*?)</div>\s*<div\b[^>]*class\s*=\s*["']gsc_oci_value["'][^>]*>(.*?)</div>"#,
    )
    .unwrap()
});
static ENTITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(?:#[0-9]+|#[xX][0-9a-fA-F]+|[A-Za-z][A-Za-z0-9]*);").unwrap());
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(?s)<[^>]*>"#).unwrap());

/// Attributes of a single opening tag, lower-cased names, entity-decoded values.
fn attrs(tag: &str) -> Vec<(String, String)> {
    ATTR_RE
        .captures_iter(tag)
        .filter_map(|cap| {
            let val = cap.get(2).or_else(|| cap.get(3))?;
            Some((cap[1].to_ascii_lowercase(), unescape(val.as_str()).into_owned()))
        })
        .collect()
}

fn attr<'a>(attrs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attrs.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
}

/// Citation ids linked from a profile's publication list, in page order.
fn collect_citation_ids(html: &str) -> Vec<String> {
    ANCHOR_RE
        .find_iter(html)
        .map(|m| attrs(m.as_str()))
        .filter(|a| attr(a, "class").is_some_and(|c| c.split_whitespace().any(|c| c == "gsc_a_at")))
        .filter_map(|a| {
            let href = attr(&a, "href")?;
            let caps = CITATION_FOR_VIEW_RE.captures(href)?;
            Some(caps[1].to_string())
        })
        .collect()
}

/// Fields of a citation detail page. Empty when the page has no citation table.
fn parse_citation(html: &str, citation_id: &str) -> RawRecord {
    let mut record = RawRecord::default();
    if !TABLE_RE.is_match(html) {
        return record;
    }
    if let Some(heading) = TITLE_RE.captures(html).and_then(|c| c.get(1)) {
        let heading = heading.as_str();
        record.insert("title", inner_text(heading));
        if let Some(href) = ANCHOR_RE
            .find(heading)
            .map(|m| attrs(m.as_str()))
            .and_then(|a| attr(&a, "href").map(str::to_string))
        {
            record.insert("link", href);
        }
    }
    for cap in ROW_RE.captures_iter(html) {
        let key = inner_text(&cap[1]);
        let value = inner_text(&cap[2]);
        if !key.is_empty() {
            record.insert(key, value);
        }
    }
    record.insert("citation_id", citation_id);
    record
}

/// Visible text of an HTML fragment, whitespace collapsed.
fn inner_text(fragment: &str) -> String {
    let stripped = TAG_RE.replace_all(fragment, " ");
    normalize_ws(&unescape(&stripped))
}

/// Resolve character references one by one; unknown ones and bare `&` stay as written.
fn unescape(s: &str) -> Cow<'_, str> {
    ENTITY_RE.replace_all(s, |caps: &Captures| {
        let entity = &caps[0];
        unescape_with(entity, |name| {
            resolve_predefined_entity(name).or_else(|| resolve_html5_entity(name))
        })
        .map(Cow::into_owned)
        .unwrap_or_else(|_| entity.to_string())
    })
}

fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
