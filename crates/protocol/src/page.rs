//! Pagination types shared by every list endpoint.

use serde::{Deserialize, Serialize};

/// Navigation link to an adjacent page (`rel` is `next` or `prev`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub href: String,
    pub rel: String,
}

impl Link {
    /// `limit` query parameter of `href`, or 0 if absent or malformed.
    pub fn limit(&self) -> u32 {
        self.int_query_field("limit")
    }

    /// `offset` query parameter of `href`, or 0 if absent or malformed.
    pub fn offset(&self) -> u32 {
        self.int_query_field("offset")
    }

    fn int_query_field(&self, field: &str) -> u32 {
        let Some((_, query)) = self.href.split_once('?') else {
            return 0;
        };
        let query = query.split('#').next().unwrap_or_default();
        query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == field)
            .and_then(|(_, value)| value.parse().ok())
            .unwrap_or(0)
    }
}

/// Paging parameters accepted by list endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    pub limit: u32,
    pub offset: u32,
    pub fields: Vec<String>,
}

impl ListOptions {
    /// Returns `true` if these options select nothing beyond the defaults.
    pub fn is_zero(&self) -> bool {
        self.limit == 0 && self.offset == 0
    }

    /// Query parameters for these options; zero values are omitted.
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        if self.limit > 0 {
            query.push(("limit".to_string(), self.limit.to_string()));
        }
        if self.offset > 0 {
            query.push(("offset".to_string(), self.offset.to_string()));
        }
        if !self.fields.is_empty() {
            query.push(("fields".to_string(), self.fields.join(",")));
        }
        query
    }
}

/// Body of a paginated list response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageEnvelope<T> {
    #[serde(default)]
    pub href: String,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}
