use serde_json::Value;
use url::Url;

use crate::{
    config::SerpApiSettings,
    error::ExportError,
    fetcher::{
        Continuation, Page, PageSource,
        http::{HttpClient, redact},
    },
    record::{FieldMap, RawRecord},
};

const NAME: &str = "SerpAPI";

static FIELDS: FieldMap = FieldMap {
    title: &["title"],
    authors: &["authors"],
    journal: &["publication"],
    date: &["year"],
    link: &["link"],
    citation_id: &["citation_id"],
};

/// The next page is announced as a full URL carrying an `after_author` token.
const CONTINUATION: Continuation = Continuation::EmbeddedUrlParam {
    pointer: "/serpapi_pagination/next",
    param: "after_author",
};

/// Google Scholar author profiles through SerpAPI's `google_scholar_author` engine.
pub struct SerpApi {
    http: HttpClient,
    settings: SerpApiSettings,
}

impl SerpApi {
    pub fn new(settings: SerpApiSettings) -> Self {
        let http = HttpClient::new(settings.delay, concat!("scholar-export/", env!("CARGO_PKG_VERSION")));
        SerpApi { http, settings }
    }

    fn page_url(&self, author_id: &str, token: Option<&str>) -> Url {
        let mut url = self.settings.base_url.clone();
        {
            let mut q = url.query_pairs_mut();
            q.append_pair("engine", "google_scholar_author")
                .append_pair("author_id", author_id)
                .append_pair("api_key", &self.settings.api_key)
                .append_pair("hl", &self.settings.language)
                .append_pair("num", &self.settings.page_size.to_string());
            if let Some(token) = token {
                q.append_pair("after_author", token);
            }
        }
        url
    }
}

impl PageSource for SerpApi {
    fn name(&self) -> &'static str {
        NAME
    }

    fn fields(&self) -> &'static FieldMap {
        &FIELDS
    }

    fn fetch_page(&self, author_id: &str, token: Option<&str>) -> anyhow::Result<Page> {
        let url = self.page_url(author_id, token);
        let res = self.http.get(&url)?;
        if !res.is_success() {
            let err = error_message(&res.body)
                .map(|message| ExportError::Collaborator {
                    source_name: NAME,
                    message,
                })
                .unwrap_or_else(|| ExportError::Http {
                    source_name: NAME,
                    status: res.status,
                    url: redact(&url),
                });
            return Err(err.into());
        }
        parse_page(&res.body)
    }
}

/// The `error` message of a response body, if it has one.
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("error")? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn parse_page(body: &str) -> anyhow::Result<Page> {
    let value: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(e) => {
            log::warn!("{NAME}: response is not JSON ({e}), treating as the last page");
            return Ok(Page::empty());
        }
    };
    if let Some(message) = error_message(body) {
        return Err(ExportError::Collaborator {
            source_name: NAME,
            message,
        }
        .into());
    }
    let Some(articles) = value.get("articles").and_then(Value::as_array) else {
        log::debug!("{NAME}: no `articles` array in response");
        return Ok(Page::empty());
    };
    let records = articles
        .iter()
        .filter_map(|a| a.as_object().cloned().map(RawRecord::from))
        .collect();
    Ok(Page {
        records,
        next: CONTINUATION.extract(&value),
    })
}
