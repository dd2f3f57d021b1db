//! Resolver registry
//!
//! Routes an arbitrary hoster URL to the resolver responsible for it. The
//! registry is built once and is read-only afterwards, so it can be shared
//! behind an `Arc` without locking.

use std::collections::HashMap;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use crate::client::HosterClient;
use crate::error::Result;
use crate::resolver::byse::entropy::{EntropySource, OsEntropy};
use crate::resolver::{FilemoonResolver, HosterResolver, XfsConfig, XfsConfigDef, XfsResolver};
use crate::types::ResolvedStream;
use crate::url::{host_without_tld, normalized_host};

const BUILTIN_XFS_HOSTERS: &str = include_str!("../data/xfs_hosters.json");

/// Parses the built-in XFS hoster table
///
/// # Errors
/// Returns `Json` if the embedded table is malformed
pub fn builtin_xfs_defs() -> Result<Vec<XfsConfigDef>> {
    Ok(serde_json::from_str(BUILTIN_XFS_HOSTERS)?)
}

/// Immutable domain → resolver lookup
pub struct ResolverRegistry {
    resolvers: Vec<Arc<dyn HosterResolver>>,
    /// Domain entry (as declared by the resolver) → index into `resolvers`
    index: HashMap<String, usize>,
}

impl std::fmt::Debug for ResolverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolverRegistry")
            .field("resolvers", &self.names())
            .finish()
    }
}

impl ResolverRegistry {
    /// Registry with the built-in XFS table and Filemoon
    pub fn new(client: HosterClient) -> Result<Self> {
        Self::builder(client).build()
    }

    pub fn builder(client: HosterClient) -> RegistryBuilder {
        RegistryBuilder::new(client)
    }

    /// Finds the resolver for a URL without any I/O
    ///
    /// The normalized host is looked up as-is first, then without its TLD
    /// (so a dot-less entry like `katfile` covers `katfile.com`).
    pub fn find(&self, url: &str) -> Option<&Arc<dyn HosterResolver>> {
        let host = normalized_host(url)?;

        let exact = self.index.get(host.as_str());
        let bare = host_without_tld(&host).and_then(|name| self.index.get(name));

        [exact, bare]
            .into_iter()
            .flatten()
            .map(|&i| &self.resolvers[i])
            .find(|resolver| resolver.matches(url))
    }

    /// Resolves a URL with whichever resolver owns its host
    pub async fn resolve(&self, url: &str) -> Option<ResolvedStream> {
        let Some(resolver) = self.find(url) else {
            debug!(url, "no resolver for host");
            return None;
        };
        resolver.resolve(url).await
    }

    /// Resolves many URLs with at most `concurrency` in flight
    ///
    /// # Returns
    /// One `(url, result)` pair per input, in input order
    pub async fn resolve_batch<S>(
        &self,
        urls: &[S],
        concurrency: usize,
    ) -> Vec<(String, Option<ResolvedStream>)>
    where
        S: AsRef<str>,
    {
        let mut results: Vec<(usize, String, Option<ResolvedStream>)> =
            stream::iter(urls.iter().enumerate().map(|(i, url)| async move {
                let url = url.as_ref();
                (i, url.to_string(), self.resolve(url).await)
            }))
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        results.sort_by_key(|(i, _, _)| *i);
        results
            .into_iter()
            .map(|(_, url, stream)| (url, stream))
            .collect()
    }

    /// Resolver names in registration order
    pub fn names(&self) -> Vec<&str> {
        self.resolvers.iter().map(|r| r.name()).collect()
    }

    pub fn resolvers(&self) -> &[Arc<dyn HosterResolver>] {
        &self.resolvers
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}

/// Builder for [`ResolverRegistry`]
///
/// Registration order is priority order: custom resolvers, then added XFS
/// definitions, then Filemoon, then the built-in table. A domain entry
/// already claimed by an earlier resolver is skipped with a warning.
pub struct RegistryBuilder {
    client: HosterClient,
    custom: Vec<Arc<dyn HosterResolver>>,
    xfs_defs: Vec<XfsConfigDef>,
    entropy: Arc<dyn EntropySource>,
    builtin: bool,
    filemoon: bool,
}

impl RegistryBuilder {
    pub fn new(client: HosterClient) -> Self {
        Self {
            client,
            custom: Vec::new(),
            xfs_defs: Vec::new(),
            entropy: Arc::new(OsEntropy),
            builtin: true,
            filemoon: true,
        }
    }

    /// Leave out the built-in XFS table
    pub fn without_builtin(mut self) -> Self {
        self.builtin = false;
        self
    }

    /// Leave out the Filemoon resolver
    pub fn without_filemoon(mut self) -> Self {
        self.filemoon = false;
        self
    }

    /// Add an XFS hoster definition (e.g. a new rebrand)
    pub fn with_xfs(mut self, def: XfsConfigDef) -> Self {
        self.xfs_defs.push(def);
        self
    }

    /// Add a hand-written resolver
    pub fn with_resolver(mut self, resolver: Arc<dyn HosterResolver>) -> Self {
        self.custom.push(resolver);
        self
    }

    /// Randomness source for the Filemoon handshake
    pub fn with_entropy(mut self, entropy: Arc<dyn EntropySource>) -> Self {
        self.entropy = entropy;
        self
    }

    /// Builds the registry
    ///
    /// # Errors
    /// Returns `Config` for an invalid definition and `Json` if the built-in
    /// table cannot be parsed
    pub fn build(self) -> Result<ResolverRegistry> {
        let Self {
            client,
            custom,
            xfs_defs,
            entropy,
            builtin,
            filemoon,
        } = self;

        let builtin = if builtin {
            builtin_xfs_defs()?
        } else {
            Vec::new()
        };

        let mut resolvers = custom;
        for def in xfs_defs {
            resolvers.push(xfs_resolver(def, &client)?);
        }
        if filemoon {
            resolvers.push(Arc::new(FilemoonResolver::with_entropy(
                client.clone(),
                entropy,
            )));
        }
        for def in builtin {
            resolvers.push(xfs_resolver(def, &client)?);
        }

        let mut index: HashMap<String, usize> = HashMap::new();
        let mut kept: Vec<Arc<dyn HosterResolver>> = Vec::with_capacity(resolvers.len());
        for resolver in resolvers {
            let position = kept.len();
            let mut claimed = false;
            for domain in resolver.supported_domains() {
                if let Some(&owner) = index.get(domain.as_str()) {
                    warn!(
                        domain = %domain,
                        hoster = resolver.name(),
                        owner = kept[owner].name(),
                        "domain already registered, skipping"
                    );
                    continue;
                }
                index.insert(domain.clone(), position);
                claimed = true;
            }
            if claimed {
                kept.push(resolver);
            } else {
                warn!(hoster = resolver.name(), "no unclaimed domains, resolver dropped");
            }
        }

        debug!(resolvers = kept.len(), domains = index.len(), "registry built");
        Ok(ResolverRegistry {
            resolvers: kept,
            index,
        })
    }
}

fn xfs_resolver(def: XfsConfigDef, client: &HosterClient) -> Result<Arc<dyn HosterResolver>> {
    let config = XfsConfig::try_from(def)?;
    Ok(Arc::new(XfsResolver::new(Arc::new(config), client.clone())))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use async_trait::async_trait;

    use super::*;
    use crate::error::ResolveError;
    use crate::resolver::byse::entropy::FixedEntropy;

    fn client() -> HosterClient {
        HosterClient::new().expect("client")
    }

    #[derive(Debug)]
    struct StaticResolver {
        name: &'static str,
        domains: BTreeSet<String>,
    }

    impl StaticResolver {
        fn new(name: &'static str, domains: &[&str]) -> Self {
            Self {
                name,
                domains: domains.iter().map(|d| d.to_string()).collect(),
            }
        }
    }

    #[async_trait]
    impl HosterResolver for StaticResolver {
        fn name(&self) -> &str {
            self.name
        }

        fn supported_domains(&self) -> &BTreeSet<String> {
            &self.domains
        }

        async fn resolve(&self, url: &str) -> Option<ResolvedStream> {
            ResolvedStream::new(format!("{url}/video.mp4")).ok()
        }
    }

    #[test]
    fn test_builtin_table_parses_and_builds() {
        let defs = builtin_xfs_defs().unwrap();
        assert!(defs.len() >= 25);
        for def in defs {
            let name = def.name.clone();
            assert!(XfsConfig::try_from(def).is_ok(), "{name}");
        }

        let registry = ResolverRegistry::new(client()).unwrap();
        assert!(registry.names().contains(&"katfile"));
        assert!(registry.names().contains(&"filemoon"));
        assert!(registry.len() >= 26);
    }

    #[test]
    fn test_builtin_katfile_is_ddl() {
        let katfile = builtin_xfs_defs()
            .unwrap()
            .into_iter()
            .find(|d| d.name == "katfile")
            .unwrap();
        assert!(!katfile.is_video_hoster);
        assert!(!katfile.needs_captcha);
    }

    #[test]
    fn test_find_routes_by_host() {
        let registry = ResolverRegistry::new(client()).unwrap();

        let find = |url: &str| registry.find(url).map(|r| r.name().to_string());
        assert_eq!(find("https://katfile.com/abc123def456"), Some("katfile".into()));
        assert_eq!(find("https://www.katfile.cloud/abc123def456"), Some("katfile".into()));
        assert_eq!(find("https://filemoon.sx/e/abc123"), Some("filemoon".into()));
        assert_eq!(find("https://kerapoxy.cc/e/abc123"), Some("filemoon".into()));
        assert_eq!(find("https://vidhide.com/e/abc123def456"), Some("filelions".into()));
        assert_eq!(find("https://unknown.example/abc"), None);
        assert_eq!(find("not a url"), None);
    }

    #[test]
    fn test_find_does_not_match_subdomains_of_bare_entries() {
        let registry = ResolverRegistry::new(client()).unwrap();
        assert!(registry.find("https://cdn.katfile.com/abc123def456").is_none());
    }

    #[test]
    fn test_custom_resolver_takes_priority() {
        let registry = ResolverRegistry::builder(client())
            .with_resolver(Arc::new(StaticResolver::new("mine", &["katfile.com"])))
            .build()
            .unwrap();

        let find = |url: &str| registry.find(url).map(|r| r.name().to_string());
        assert_eq!(find("https://katfile.com/abc123def456"), Some("mine".into()));
        // the bare entry still belongs to the built-in resolver
        assert_eq!(find("https://katfile.cloud/abc123def456"), Some("katfile".into()));
    }

    #[test]
    fn test_builder_rejects_invalid_definition() {
        let result = ResolverRegistry::builder(client())
            .with_xfs(XfsConfigDef {
                name: "broken".to_string(),
                domains: vec![],
                ..Default::default()
            })
            .build();
        assert!(matches!(result, Err(ResolveError::Config(_))));
    }

    #[test]
    fn test_builder_without_defaults() {
        let registry = ResolverRegistry::builder(client())
            .without_builtin()
            .without_filemoon()
            .with_entropy(Arc::new(FixedEntropy(1)))
            .build()
            .unwrap();
        assert!(registry.is_empty());
        assert!(registry.find("https://katfile.com/abc123def456").is_none());
    }

    #[test]
    fn test_fully_shadowed_resolver_is_dropped() {
        let registry = ResolverRegistry::builder(client())
            .without_builtin()
            .without_filemoon()
            .with_resolver(Arc::new(StaticResolver::new("first", &["a.example"])))
            .with_resolver(Arc::new(StaticResolver::new("second", &["a.example"])))
            .build()
            .unwrap();
        assert_eq!(registry.names(), vec!["first"]);
    }

    #[tokio::test]
    async fn test_resolve_batch_keeps_input_order() {
        let registry = ResolverRegistry::builder(client())
            .without_builtin()
            .without_filemoon()
            .with_resolver(Arc::new(StaticResolver::new("static", &["a.example", "b"])))
            .build()
            .unwrap();

        let urls = [
            "https://a.example/1",
            "https://unknown.example/2",
            "https://b.net/3",
        ];
        let results = registry.resolve_batch(&urls, 2).await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].0, "https://a.example/1");
        assert_eq!(
            results[0].1.as_ref().map(|s| s.video_url.as_str()),
            Some("https://a.example/1/video.mp4")
        );
        assert!(results[1].1.is_none());
        assert_eq!(
            results[2].1.as_ref().map(|s| s.video_url.as_str()),
            Some("https://b.net/3/video.mp4")
        );
    }
}
