//! Tauri commands for the hoster resolver
//!
//! This module contains all Tauri command implementations.

use hosterkit_core::{ResolvedStream, ResolverRegistry};
use tauri::State;

use crate::{HosterInfo, ResolverState};

/// Default number of links resolved in parallel by `resolve_urls`
const DEFAULT_CONCURRENCY: usize = 4;

/// Resolve a hoster link to a playable stream
///
/// # Arguments
/// * `state` - Managed ResolverState from Tauri
/// * `url` - Embed or file page URL
///
/// # Returns
/// The stream, or null if no hoster handles the link or resolution failed
#[tauri::command]
pub async fn resolve_url(
    state: State<'_, ResolverState>,
    url: String,
) -> Result<Option<ResolvedStream>, String> {
    Ok(state.registry.resolve(&url).await)
}

/// Resolve several links concurrently
///
/// # Arguments
/// * `state` - Managed ResolverState from Tauri
/// * `urls` - Links to resolve
/// * `concurrency` - Parallel resolutions (default 4)
///
/// # Returns
/// One entry per input link, in input order; null where unresolvable
#[tauri::command]
pub async fn resolve_urls(
    state: State<'_, ResolverState>,
    urls: Vec<String>,
    concurrency: Option<usize>,
) -> Result<Vec<Option<ResolvedStream>>, String> {
    let results = state
        .registry
        .resolve_batch(urls.as_slice(), concurrency.unwrap_or(DEFAULT_CONCURRENCY))
        .await;
    Ok(results.into_iter().map(|(_, stream)| stream).collect())
}

/// Name of the hoster that handles a link, if any
#[tauri::command]
pub fn find_hoster(state: State<'_, ResolverState>, url: String) -> Option<String> {
    hoster_for(&state.registry, &url)
}

/// All registered hosters with their domains
#[tauri::command]
pub fn list_hosters(state: State<'_, ResolverState>) -> Vec<HosterInfo> {
    hoster_infos(&state.registry)
}

fn hoster_for(registry: &ResolverRegistry, url: &str) -> Option<String> {
    registry.find(url).map(|resolver| resolver.name().to_string())
}

fn hoster_infos(registry: &ResolverRegistry) -> Vec<HosterInfo> {
    registry
        .resolvers()
        .iter()
        .map(|resolver| HosterInfo {
            name: resolver.name().to_string(),
            domains: resolver.supported_domains().iter().cloned().collect(),
        })
        .collect()
}
