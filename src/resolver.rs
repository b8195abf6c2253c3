use std::collections::HashSet;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::intent::Intent;
use crate::listings::{ListingRecord, ListingsClient};

const EXACT_LIMIT: usize = 3;
const KEYWORD_LIMIT: usize = 2;
const SIMPLIFIED_LIMIT: usize = 3;

/// Seam between the resolver and the listings repository.
#[async_trait]
pub trait ListingSearch: Send + Sync {
    async fn query_listings(
        &self,
        term: &str,
        location: Option<&str>,
        limit: usize,
    ) -> Vec<ListingRecord>;
}

#[async_trait]
impl ListingSearch for ListingsClient {
    async fn query_listings(
        &self,
        term: &str,
        location: Option<&str>,
        limit: usize,
    ) -> Vec<ListingRecord> {
        ListingsClient::query_listings(self, term, location, limit).await
    }
}

/// One fallback attempt: a term, an optional location, and a result cap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTier {
    pub term: String,
    pub location: Option<String>,
    pub limit: usize,
}

impl SearchTier {
    fn new(term: &str, location: Option<&str>, limit: usize) -> Self {
        Self {
            term: term.to_string(),
            location: location.map(str::to_string),
            limit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStatus {
    Found,
    Empty,
}

/// The service/location pair the results were resolved for, echoed back so
/// the formatter can name it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryEcho {
    pub service: String,
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionResult {
    pub status: SearchStatus,
    pub listings: Vec<ListingRecord>,
    pub query: QueryEcho,
}

/// Escalating search over the listings repository: exact service+location,
/// then per-keyword expansion, then the first word of a multi-word service.
/// The first tier to yield anything wins; tiers are never merged.
pub struct Resolver<S> {
    search: S,
}

impl<S: ListingSearch> Resolver<S> {
    pub fn new(search: S) -> Self {
        Self { search }
    }

    pub async fn resolve(&self, intent: &Intent) -> ResolutionResult {
        let location = intent.location.as_deref();

        // Tier 1: the full service term.
        let tier = SearchTier::new(&intent.service, location, EXACT_LIMIT);
        let listings = self.run_tier(&tier).await;
        if !listings.is_empty() {
            return self.found(intent, listings);
        }

        // Tier 2: per-keyword expansion, deduplicated across keywords by url.
        if intent.keywords.len() > 1 {
            debug!(
                "No direct results, trying partial matches for [{}]",
                intent.keywords.join(", ")
            );
            let mut accumulated = Vec::new();
            for keyword in &intent.keywords {
                let tier = SearchTier::new(keyword, location, KEYWORD_LIMIT);
                accumulated.extend(self.run_tier(&tier).await);
            }
            let deduped = dedup_by_url(accumulated);
            if !deduped.is_empty() {
                return self.found(intent, deduped);
            }
        }

        // Tier 3: broaden a multi-word service to its first word.
        if intent.service.contains(' ') {
            if let Some(first) = intent.service.split_whitespace().next() {
                debug!("Trying broader search for \"{}\"", first);
                let tier = SearchTier::new(first, location, SIMPLIFIED_LIMIT);
                let listings = self.run_tier(&tier).await;
                if !listings.is_empty() {
                    return self.found(intent, listings);
                }
            }
        }

        info!(
            "All tiers exhausted for service=\"{}\" location={:?}",
            intent.service, intent.location
        );
        ResolutionResult {
            status: SearchStatus::Empty,
            listings: Vec::new(),
            query: echo(intent),
        }
    }

    async fn run_tier(&self, tier: &SearchTier) -> Vec<ListingRecord> {
        self.search
            .query_listings(&tier.term, tier.location.as_deref(), tier.limit)
            .await
    }

    fn found(&self, intent: &Intent, listings: Vec<ListingRecord>) -> ResolutionResult {
        ResolutionResult {
            status: SearchStatus::Found,
            listings,
            query: echo(intent),
        }
    }
}

fn echo(intent: &Intent) -> QueryEcho {
    QueryEcho {
        service: intent.service.clone(),
        location: intent.location.clone(),
    }
}

/// First occurrence wins.
fn dedup_by_url(listings: Vec<ListingRecord>) -> Vec<ListingRecord> {
    let mut seen = HashSet::new();
    listings
        .into_iter()
        .filter(|l| seen.insert(l.url.clone()))
        .collect()
}
