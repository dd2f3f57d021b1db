//! Hoster resolvers
//!
//! Every hoster is reached through [`HosterResolver`]: static introspection
//! (`name`, `supported_domains`) for routing, plus one async `resolve`.
//!
//! - [`XfsResolver`]: one data-driven implementation for all
//!   XFileSharingPro clones, parameterized by [`XfsConfig`]
//! - [`FilemoonResolver`]: Byse attested API with legacy page fallbacks

pub mod byse;
pub mod filemoon;
pub mod xfs;

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::types::ResolvedStream;
use crate::url::{host_in, normalized_host};

pub use filemoon::FilemoonResolver;
pub use xfs::{XfsConfig, XfsConfigDef, XfsResolver, extract_file_id};

/// Resolver for one hoster
///
/// Implementations hold no per-call mutable state and may be called
/// concurrently for different URLs.
#[async_trait]
pub trait HosterResolver: Send + Sync {
    /// Hoster name (e.g., "katfile", "filemoon")
    fn name(&self) -> &str;

    /// Domain entries this resolver answers for
    ///
    /// Entries with a dot are exact hosts; dot-less entries match the host
    /// under any TLD.
    fn supported_domains(&self) -> &BTreeSet<String>;

    /// Check if this resolver handles the given URL. Performs no I/O.
    fn matches(&self, url: &str) -> bool {
        normalized_host(url)
            .map(|host| host_in(&host, self.supported_domains()))
            .unwrap_or(false)
    }

    /// Resolve an embed/file URL to a playable stream
    ///
    /// Returns `None` when the URL is not addressable, the file is gone, or
    /// anything on the way fails. Failures are logged, never returned.
    async fn resolve(&self, url: &str) -> Option<ResolvedStream>;
}
