//! Response metadata attached to every service call: rate limits and
//! pagination.

use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};
use reqwest::header::{HeaderMap, LINK};
use sbg_protocol::{Link, ListOptions};

pub(crate) const HEADER_RATE_LIMIT: &str = "X-RateLimit-Limit";
pub(crate) const HEADER_RATE_REMAINING: &str = "X-RateLimit-Remaining";
pub(crate) const HEADER_RATE_RESET: &str = "X-RateLimit-Reset";
pub(crate) const HEADER_TOTAL_MATCHING_QUERY: &str = "X-Total-Matching-Query";

/// Request budget reported by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rate {
    pub limit: u32,
    pub remaining: u32,
    /// When the budget resets; `None` if the server did not say.
    pub reset: Option<DateTime<Utc>>,
}

impl Rate {
    /// Reads the rate headers. Missing or malformed values are left at
    /// their defaults.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let reset = header_int::<i64>(headers, HEADER_RATE_RESET)
            .filter(|secs| *secs != 0)
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single());
        Self {
            limit: header_int(headers, HEADER_RATE_LIMIT).unwrap_or(0),
            remaining: header_int(headers, HEADER_RATE_REMAINING).unwrap_or(0),
            reset,
        }
    }
}

/// Pagination state of a list response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    pub total_matching_query: u64,
    /// Navigation links keyed by relation (`next`, `prev`).
    pub links: HashMap<String, Link>,
}

impl Page {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut links = HashMap::new();
        for value in headers.get_all(LINK) {
            let Ok(value) = value.to_str() else {
                continue;
            };
            for link in parse_link_header(value) {
                links.insert(link.rel.clone(), link);
            }
        }
        Self {
            total_matching_query: header_int(headers, HEADER_TOTAL_MATCHING_QUERY).unwrap_or(0),
            links,
        }
    }

    /// Options selecting the next page; zero-valued when there is none.
    pub fn next_page(&self) -> ListOptions {
        self.list_options("next")
    }

    /// Options selecting the previous page; zero-valued when there is none.
    pub fn prev_page(&self) -> ListOptions {
        self.list_options("prev")
    }

    pub fn has_next_page(&self) -> bool {
        !self.next_page().is_zero()
    }

    pub fn has_prev_page(&self) -> bool {
        !self.prev_page().is_zero()
    }

    fn list_options(&self, rel: &str) -> ListOptions {
        self.links
            .get(rel)
            .map(|link| ListOptions {
                limit: link.limit(),
                offset: link.offset(),
                fields: Vec::new(),
            })
            .unwrap_or_default()
    }
}

/// Metadata returned alongside every decoded value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub rate: Rate,
    pub page: Page,
}

impl Response {
    pub fn from_parts(status: u16, headers: &HeaderMap) -> Self {
        Self {
            status,
            rate: Rate::from_headers(headers),
            page: Page::from_headers(headers),
        }
    }
}

fn header_int<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Parses an RFC 5988 `Link` header value into one [`Link`] per relation.
///
/// URIs may themselves contain commas (a `fields=a,b` query), so entries
/// are delimited by the `<...>` brackets rather than by splitting on `,`.
pub(crate) fn parse_link_header(value: &str) -> Vec<Link> {
    let mut links = Vec::new();
    let mut rest = value;
    while let Some(open) = rest.find('<') {
        let after_open = &rest[open + 1..];
        let Some(close) = after_open.find('>') else {
            break;
        };
        let href = &after_open[..close];
        let tail = &after_open[close + 1..];
        let params_end = tail.find('<').unwrap_or(tail.len());
        let params = &tail[..params_end];

        for param in params.split(';') {
            let param = param.trim().trim_end_matches(',').trim();
            let Some((key, val)) = param.split_once('=') else {
                continue;
            };
            if !key.trim().eq_ignore_ascii_case("rel") {
                continue;
            }
            let val = val.trim().trim_matches('"');
            for rel in val.split_whitespace() {
                links.push(Link {
                    href: href.to_string(),
                    rel: rel.to_ascii_lowercase(),
                });
            }
        }
        rest = &tail[params_end..];
    }
    links
}
