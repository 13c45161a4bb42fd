use reqwest::{redirect::Policy, Client, StatusCode};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use super::{Resource, UrlValidity};
use crate::error::{AppError, AppResult};
use crate::progress::progress_line;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/102.0.0.0 Safari/537.36";

/// Markers the model writes instead of a website.
const PLACEHOLDERS: &[&str] = &["N/A", "n/a", "TBD", "Varies"];

/// HEAD-request liveness checker with a memo of answers.
pub struct UrlChecker {
    client: Client,
    /// url -> working url, or `None` when it failed.
    memo: HashMap<String, Option<String>>,
}

impl UrlChecker {
    pub fn new(timeout: Duration) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(Policy::limited(10))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AppError::Config {
                message: format!("Failed to build HTTP client: {}", e),
            })?;
        Ok(Self {
            client,
            memo: HashMap::new(),
        })
    }

    async fn head_ok(&self, url: &str) -> bool {
        match self.client.head(url).send().await {
            Ok(response) => response.status() == StatusCode::OK,
            Err(e) => {
                debug!(url = %url, error = %e, "HEAD request failed");
                false
            }
        }
    }

    /// Working URL for `url`: the URL itself, its site root, or `None`.
    pub async fn check_website(&self, url: &str) -> Option<String> {
        if self.head_ok(url).await {
            info!(url = %url, "200 original");
            return Some(url.to_string());
        }

        let root = root_url(url)?;
        if let Some(Some(known)) = self.memo.get(&root) {
            if *known == root {
                info!(root = %root, url = %url, "previously good base");
                return Some(root);
            }
        }
        if self.head_ok(&root).await {
            info!(root = %root, url = %url, "200 base");
            Some(root)
        } else {
            info!(url = %url, "invalid retry");
            None
        }
    }

    /// Memoized answer for `url`, if it was checked before.
    pub fn memo(&self, url: &str) -> Option<&Option<String>> {
        self.memo.get(url)
    }

    fn remember(&mut self, url: &str, answer: Option<String>) {
        if let Some(good) = &answer {
            self.memo.insert(good.clone(), Some(good.clone()));
        }
        self.memo.insert(url.to_string(), answer);
    }
}

fn validity(url: &str, answer: Option<String>) -> UrlValidity {
    match answer {
        Some(good) if good == url => UrlValidity::Flag(true),
        Some(base) => UrlValidity::Rebased(base),
        None => UrlValidity::Flag(false),
    }
}

/// `scheme://host[:port]/` of a URL.
pub fn root_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(match parsed.port() {
        Some(port) => format!("{}://{}:{}/", parsed.scheme(), host, port),
        None => format!("{}://{}/", parsed.scheme(), host),
    })
}

/// Whether a website value is a placeholder rather than a URL.
pub fn is_placeholder(url: &str) -> bool {
    url.trim().is_empty() || url.contains(' ') || PLACEHOLDERS.iter().any(|p| url.contains(p))
}

/// First pass: check every resource not already known to be valid.
pub async fn check_urls(resources: &mut [Resource], checker: &mut UrlChecker) {
    let total = resources.len();
    for (i, resource) in resources.iter_mut().enumerate() {
        info!("{}", progress_line(i + 1, total));
        if resource.url_valid == Some(UrlValidity::Flag(true)) {
            debug!(url = %resource.website, "Skipping valid");
            continue;
        }
        if is_placeholder(&resource.website) {
            resource.url_valid = Some(UrlValidity::Flag(false));
            continue;
        }

        let url = resource.website.clone();
        match checker.memo(&url).cloned() {
            Some(Some(good)) if good == url => {
                resource.url_valid = Some(UrlValidity::Flag(true));
            }
            Some(Some(base)) => {
                info!(base = %base, url = %url, "previously good base");
                resource.url_valid = Some(UrlValidity::Rebased(base));
            }
            Some(None) => {
                info!(url = %url, "previously bad");
                resource.url_valid = Some(UrlValidity::Flag(false));
            }
            None => {
                let answer = checker.check_website(&url).await;
                checker.remember(&url, answer.clone());
                resource.url_valid = Some(validity(&url, answer));
            }
        }
    }
}

/// Second pass: retry resources previously marked invalid.
///
/// Placeholders lose their flag instead of being retried; other URLs are
/// retried over plain http. Returns how many became valid.
pub async fn recheck_urls(resources: &mut [Resource], checker: &mut UrlChecker) -> usize {
    let total = resources.len();
    let mut recovered = 0;

    for (i, resource) in resources.iter_mut().enumerate() {
        if resource.url_valid != Some(UrlValidity::Flag(false)) {
            continue;
        }
        if is_placeholder(&resource.website) {
            info!(url = %resource.website, "del");
            resource.url_valid = None;
            continue;
        }

        let url = resource.website.replace("https", "http");
        if let Some(None) = checker.memo(&url) {
            info!("{} skipping bad {}", progress_line(i + 1, total), url);
            continue;
        }
        info!("{} retrying {}", progress_line(i + 1, total), url);

        let answer = checker.check_website(&url).await;
        checker.remember(&url, answer.clone());
        if let Some(good) = &answer {
            info!("{} 200 {}", progress_line(i + 1, total), good);
            if *good == url {
                resource.website = url.clone();
            }
            recovered += 1;
        }
        resource.url_valid = Some(validity(&url, answer));
    }

    recovered
}
