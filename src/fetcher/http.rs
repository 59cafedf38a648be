use std::{thread, time::Duration};

use anyhow::Context;
use url::Url;

/// Query parameters whose values never show up in logs or error messages.
const SECRET_PARAMS: &[&str] = &["api_key"];

/// Blocking HTTP client that waits a fixed delay before every request.
pub struct HttpClient {
    agent: ureq::Agent,
    delay: Duration,
    user_agent: String,
}

/// Status and body of a finished request, whatever the status was.
pub struct Response {
    pub status: u16,
    pub body: String,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl HttpClient {
    pub fn new(delay: Duration, user_agent: &str) -> Self {
        let cfg = ureq::Agent::config_builder()
            .timeout_connect(Some(Duration::from_secs(10)))
            .timeout_global(Some(Duration::from_secs(60)))
            .http_status_as_error(false)
            .build();
        HttpClient {
            agent: ureq::Agent::new_with_config(cfg),
            delay,
            user_agent: user_agent.to_string(),
        }
    }

    pub fn get(&self, url: &Url) -> anyhow::Result<Response> {
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        log::debug!("GET {}", redact(url));
        let mut res = self
            .agent
            .get(url.as_str())
            .header("User-Agent", &self.user_agent)
            .call()
            .with_context(|| format!("failed request for URL {}", redact(url)))?;
        let status = res.status().as_u16();
        let body = res.body_mut().read_to_string().context("read body")?;
        log::debug!("HTTP {status}, {} bytes", body.len());
        Ok(Response { status, body })
    }
}

/// Render `url` with secret query values masked.
pub fn redact(url: &Url) -> String {
    if !url.query_pairs().any(|(k, _)| SECRET_PARAMS.contains(&k.as_ref())) {
        return url.to_string();
    }
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if SECRET_PARAMS.contains(&k.as_ref()) {
                "***".to_string()
            } else {
                v.into_owned()
            };
            (k.into_owned(), v)
        })
        .collect();
    let mut out = url.clone();
    out.query_pairs_mut().clear().extend_pairs(pairs);
    out.to_string()
}
