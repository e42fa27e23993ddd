//! Candidate enumeration over (region × category)
//!
//! Each pair is a lazy stream that follows the places service's pagination
//! cursor. A failed page ends that pair's stream; every other pair carries
//! on. Pairs run with bounded concurrency and merge in deterministic order.

use super::api::{NearbyQuery, PlacesApi, ServiceError};
use crate::models::{DiscoveredPlace, PlaceSummary};
use async_stream::stream;
use futures::stream::{self, Stream, StreamExt};
use leadscout_common::models::Region;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Result of enumerating every (region, category) pair
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    /// New places in discovery order, deduplicated by place id
    pub places: Vec<DiscoveredPlace>,
    /// Unique places seen, including ones already in the ledger
    pub unique_seen: usize,
    /// Unique places dropped because the ledger already holds them
    pub previously_processed: usize,
    /// Pairs whose enumeration was abandoned on a request failure
    pub failed_pairs: usize,
}

pub struct CandidateEnumerator {
    places: Arc<dyn PlacesApi>,
    default_radius_meters: u32,
    page_delay: Duration,
    workers: usize,
}

impl CandidateEnumerator {
    pub fn new(
        places: Arc<dyn PlacesApi>,
        default_radius_meters: u32,
        page_delay: Duration,
        workers: usize,
    ) -> Self {
        Self {
            places,
            default_radius_meters,
            page_delay,
            workers: workers.max(1),
        }
    }

    /// Lazy page-following stream for one (region, category) pair
    ///
    /// Yields summaries as pages arrive. A request failure is yielded once as
    /// `Err` and ends the stream. Calling again restarts from the first page.
    pub fn enumerate(
        &self,
        region: &Region,
        category: &str,
    ) -> impl Stream<Item = Result<PlaceSummary, ServiceError>> + Send + 'static {
        let places = Arc::clone(&self.places);
        let page_delay = self.page_delay;
        let region_name = region.name.clone();
        let category = category.to_string();
        let mut query = NearbyQuery::Search {
            location: region.center(),
            radius_meters: region.radius_meters.unwrap_or(self.default_radius_meters),
            category: category.clone(),
        };

        stream! {
            let mut page_number = 1usize;
            loop {
                match places.nearby_search(&query).await {
                    Ok(page) => {
                        tracing::debug!(
                            region = %region_name,
                            category = %category,
                            page = page_number,
                            results = page.results.len(),
                            "Places page received"
                        );
                        for summary in page.results {
                            yield Ok(summary);
                        }
                        match page.next_page_token {
                            Some(token) => {
                                // Page tokens are not valid until shortly after issue
                                tokio::time::sleep(page_delay).await;
                                query = NearbyQuery::NextPage { token };
                                page_number += 1;
                            }
                            None => break,
                        }
                    }
                    Err(e) => {
                        tracing::warn!(
                            region = %region_name,
                            category = %category,
                            page = page_number,
                            error = %e,
                            "Search failed; abandoning this category"
                        );
                        yield Err(e);
                        break;
                    }
                }
            }
        }
    }

    /// Enumerate every pair and merge into one deduplicated candidate list
    ///
    /// Order is region order, then category order, then page order; the first
    /// occurrence of a place id wins (and keeps its region). Ids in
    /// `already_processed` are dropped and counted.
    pub async fn discover(
        &self,
        regions: &[Region],
        categories: &[String],
        already_processed: &HashSet<String>,
    ) -> Discovery {
        let pairs: Vec<(Region, String)> = regions
            .iter()
            .flat_map(|region| categories.iter().map(move |c| (region.clone(), c.clone())))
            .collect();

        tracing::info!(
            regions = regions.len(),
            categories = categories.len(),
            workers = self.workers,
            "Enumerating {} region/category combinations",
            pairs.len()
        );

        let per_pair: Vec<(String, Vec<Result<PlaceSummary, ServiceError>>)> = stream::iter(pairs)
            .map(|(region, category)| {
                let items = self.enumerate(&region, &category);
                async move { (region.name, items.collect::<Vec<_>>().await) }
            })
            .buffered(self.workers)
            .collect()
            .await;

        let mut discovery = Discovery::default();
        let mut seen: HashSet<String> = HashSet::new();

        for (region, items) in per_pair {
            for item in items {
                match item {
                    Ok(summary) => {
                        if !seen.insert(summary.place_id.clone()) {
                            continue;
                        }
                        discovery.unique_seen += 1;
                        if already_processed.contains(&summary.place_id) {
                            tracing::debug!(
                                place_id = %summary.place_id,
                                name = %summary.display_name(),
                                "Skipping already processed place"
                            );
                            discovery.previously_processed += 1;
                            continue;
                        }
                        discovery.places.push(DiscoveredPlace {
                            summary,
                            region: region.clone(),
                        });
                    }
                    Err(_) => discovery.failed_pairs += 1,
                }
            }
        }

        tracing::info!(
            unique = discovery.unique_seen,
            new = discovery.places.len(),
            previously_processed = discovery.previously_processed,
            failed_pairs = discovery.failed_pairs,
            "Discovery complete"
        );

        discovery
    }
}
