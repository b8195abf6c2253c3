use std::collections::HashSet;
use std::time::Duration;

use anyhow::{Context, Result};
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ListingsConfig;

const EXCERPT_MAX_CHARS: usize = 100;

/// A listing projected out of the repository's duck-typed records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRecord {
    pub id: Option<i64>,
    pub title: String,
    pub url: String,
    pub phone: Option<String>,
    pub excerpt: Option<String>,
}

impl ListingRecord {
    /// Deduplication key: repository id, or the url when id is missing.
    pub fn identity(&self) -> String {
        match self.id {
            Some(id) => id.to_string(),
            None => self.url.clone(),
        }
    }
}

/// Client for the WordPress-style listings repository. Queries the listing
/// and category facets by term, merges and dedups the results, and applies
/// the permissive location filter. Transport failures degrade to empty per
/// facet call, so one broken facet never hides the other.
pub struct ListingsClient {
    client: reqwest::Client,
    config: ListingsConfig,
    tag_pattern: Regex,
}

impl ListingsClient {
    pub fn new(config: ListingsConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            config,
            tag_pattern: Regex::new(r"</?[^>]+(?:>|$)").expect("tag pattern is valid"),
        }
    }

    /// Fetch raw records from one facet endpoint; failures come back as an
    /// empty page after logging.
    pub async fn fetch_by_term(&self, facet: &str, params: &[(&str, String)]) -> Vec<Value> {
        match self.fetch(facet, params).await {
            Ok(records) => records,
            Err(e) => {
                warn!("Error fetching {}: {:#}", facet, e);
                Vec::new()
            }
        }
    }

    async fn fetch(&self, facet: &str, params: &[(&str, String)]) -> Result<Vec<Value>> {
        let url = format!("{}/wp-json/wp/v2/{}", self.config.base_url, facet);

        let response = self
            .client
            .get(&url)
            .query(params)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Listings API error ({}) from {}", status, url);
        }

        let body: Value = response
            .json()
            .await
            .with_context(|| format!("Non-JSON body from {}", url))?;

        match body {
            Value::Array(records) => Ok(records),
            other => anyhow::bail!("Expected an array from {}, got {}", url, other),
        }
    }

    /// Query both facets for `service`, follow matched categories to their
    /// member listings, dedup, filter by location, and project at most
    /// `limit` records.
    pub async fn query_listings(
        &self,
        service: &str,
        location: Option<&str>,
        limit: usize,
    ) -> Vec<ListingRecord> {
        if service.trim().is_empty() {
            return Vec::new();
        }

        let per_page = self.config.page_size.to_string();

        let main_results = self
            .fetch_by_term(
                "listing",
                &[("search", service.to_string()), ("per_page", per_page.clone())],
            )
            .await;

        let cat_results = self
            .fetch_by_term(
                "listing-category",
                &[("search", service.to_string()), ("per_page", per_page.clone())],
            )
            .await;

        let category_ids: Vec<String> = cat_results
            .iter()
            .filter_map(|c| c.get("id").and_then(Value::as_i64))
            .map(|id| id.to_string())
            .collect();

        // One batched follow-up call with all matched category ids.
        let taxonomy_listings = if category_ids.is_empty() {
            Vec::new()
        } else {
            self.fetch_by_term(
                "listing",
                &[
                    ("listing-category", category_ids.join(",")),
                    ("per_page", per_page),
                ],
            )
            .await
        };

        let mut combined = main_results;
        combined.extend(taxonomy_listings);

        let unique = dedup_records(combined);
        let filtered = filter_by_location(unique, location);

        debug!(
            "Listings query term=\"{}\" location={:?} -> {} unique record(s)",
            service,
            location,
            filtered.len()
        );

        filtered
            .iter()
            .take(limit)
            .map(|record| self.project(record))
            .collect()
    }

    fn project(&self, record: &Value) -> ListingRecord {
        let id = record.get("id").and_then(Value::as_i64);

        let title = record
            .pointer("/title/rendered")
            .and_then(Value::as_str)
            .unwrap_or("Unknown")
            .to_string();

        let url = record
            .get("link")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| {
                format!(
                    "{}/?p={}",
                    self.config.base_url,
                    id.unwrap_or_default()
                )
            });

        let phone = record
            .pointer("/meta/phone")
            .or_else(|| record.get("phone"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);

        let excerpt = record
            .pointer("/excerpt/rendered")
            .and_then(Value::as_str)
            .map(|raw| self.clean_excerpt(raw))
            .filter(|e| !e.is_empty());

        ListingRecord {
            id,
            title,
            url,
            phone,
            excerpt,
        }
    }

    fn clean_excerpt(&self, raw: &str) -> String {
        let stripped = self.tag_pattern.replace_all(raw, "");
        let trimmed = stripped.trim();
        match trimmed.char_indices().nth(EXCERPT_MAX_CHARS) {
            Some((idx, _)) => trimmed[..idx].to_string(),
            None => trimmed.to_string(),
        }
    }
}

/// First occurrence wins; identity is the record id, or its link when the
/// id is missing. Records with neither are dropped.
fn dedup_records(records: Vec<Value>) -> Vec<Value> {
    let mut seen = HashSet::new();
    let mut unique = Vec::new();

    for record in records {
        let key = match record.get("id").and_then(Value::as_i64) {
            Some(id) => id.to_string(),
            None => match record.get("link").and_then(Value::as_str) {
                Some(link) => link.to_string(),
                None => continue,
            },
        };
        if seen.insert(key) {
            unique.push(record);
        }
    }

    unique
}

/// Permissive location match: keep records whose title plus full JSON
/// serialization contains the lowercased location as a substring. Not
/// geocoded, by contract.
fn filter_by_location(records: Vec<Value>, location: Option<&str>) -> Vec<Value> {
    let Some(location) = location else {
        return records;
    };
    let needle = location.to_lowercase();

    records
        .into_iter()
        .filter(|record| {
            let title = record
                .pointer("/title/rendered")
                .and_then(Value::as_str)
                .unwrap_or("");
            let searchable = format!("{}{}", title, record).to_lowercase();
            searchable.contains(&needle)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: i64, title: &str) -> Value {
        json!({
            "id": id,
            "title": { "rendered": title },
            "link": format!("https://example.com/listing/{}", id),
        })
    }

    #[test]
    fn dedup_keeps_first_occurrence_by_id() {
        let records = vec![
            record(42, "Delhi Plumbing Co"),
            record(7, "Other"),
            record(42, "Delhi Plumbing Co (duplicate)"),
        ];
        let unique = dedup_records(records);
        assert_eq!(unique.len(), 2);
        assert_eq!(
            unique[0].pointer("/title/rendered").and_then(Value::as_str),
            Some("Delhi Plumbing Co")
        );
    }

    #[test]
    fn dedup_falls_back_to_link_when_id_is_missing() {
        let records = vec![
            json!({ "link": "https://example.com/a" }),
            json!({ "link": "https://example.com/a" }),
            json!({ "title": { "rendered": "no identity" } }),
        ];
        assert_eq!(dedup_records(records).len(), 1);
    }

    #[test]
    fn location_filter_is_case_insensitive_substring_match() {
        let records = vec![record(1, "Delhi Plumbing Co"), record(2, "Mumbai Wiring")];
        let filtered = filter_by_location(records, Some("delhi"));
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].get("id").unwrap(), 1);
    }

    #[test]
    fn location_filter_searches_the_whole_serialized_record() {
        let records = vec![json!({
            "id": 3,
            "title": { "rendered": "Acme Services" },
            "meta": { "address": "Connaught Place, Delhi" },
        })];
        assert_eq!(filter_by_location(records, Some("delhi")).len(), 1);
    }

    #[test]
    fn no_location_keeps_everything() {
        let records = vec![record(1, "A"), record(2, "B")];
        assert_eq!(filter_by_location(records, None).len(), 2);
    }

    #[test]
    fn projection_strips_tags_and_bounds_the_excerpt() {
        let client = ListingsClient::new(ListingsConfig::default());
        let long = "x".repeat(150);
        let projected = client.project(&json!({
            "id": 9,
            "title": { "rendered": "Acme" },
            "link": "https://example.com/acme",
            "excerpt": { "rendered": format!("<p>{}</p>", long) },
        }));
        assert_eq!(projected.excerpt.as_ref().unwrap().len(), EXCERPT_MAX_CHARS);
    }

    #[test]
    fn projection_synthesizes_url_from_id_when_link_is_missing() {
        let client = ListingsClient::new(ListingsConfig::default());
        let projected = client.project(&json!({
            "id": 11,
            "title": { "rendered": "Acme" },
        }));
        assert!(projected.url.ends_with("/?p=11"));
        assert_eq!(projected.title, "Acme");
        assert_eq!(projected.phone, None);
        assert_eq!(projected.excerpt, None);
    }

    #[test]
    fn projection_picks_up_meta_phone() {
        let client = ListingsClient::new(ListingsConfig::default());
        let projected = client.project(&json!({
            "id": 12,
            "title": { "rendered": "Acme" },
            "link": "https://example.com/acme",
            "meta": { "phone": "+91 11 2345 6789" },
        }));
        assert_eq!(projected.phone.as_deref(), Some("+91 11 2345 6789"));
    }

    #[test]
    fn identity_prefers_id_over_url() {
        let with_id = ListingRecord {
            id: Some(42),
            title: "A".into(),
            url: "https://example.com/a".into(),
            phone: None,
            excerpt: None,
        };
        assert_eq!(with_id.identity(), "42");

        let without_id = ListingRecord { id: None, ..with_id };
        assert_eq!(without_id.identity(), "https://example.com/a");
    }
}
