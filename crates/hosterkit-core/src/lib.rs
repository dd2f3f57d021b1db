//! Hosterkit Core Library
//!
//! Turns file-hoster embed/download links into directly playable stream URLs.
//!
//! # Overview
//!
//! - One data-driven resolver for the XFileSharingPro clone family, configured
//!   from a hoster table (`data/xfs_hosters.json`)
//! - A Filemoon resolver that speaks the attested Byse API and falls back to
//!   packed-JS and bare HLS extraction on the embed page
//! - A registry that routes any hoster URL to its resolver
//! - Pure JavaScript unpacking and player-config parsing in [`parser`]
//!
//! Resolution never returns an error: a stream comes back complete or not at
//! all, and every failure is reported through `tracing`.
//!
//! # Example
//!
//! ```no_run
//! use hosterkit_core::{HosterClient, ResolverRegistry, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let registry = ResolverRegistry::new(HosterClient::new()?)?;
//!
//!     if let Some(stream) = registry.resolve("https://filemoon.sx/e/abc123xyz").await {
//!         println!("{} (hls: {})", stream.video_url, stream.is_hls);
//!         for (name, value) in &stream.headers {
//!             println!("  {name}: {value}");
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Stream headers
//!
//! Most hoster CDNs check the `Referer` of media requests. Send every header
//! in [`ResolvedStream::headers`] when fetching `video_url`. URLs carry
//! short-lived tokens; do not cache them.

mod client;
mod error;
pub mod parser;
mod registry;
pub mod resolver;
mod types;
pub mod url;

// Re-export client types
pub use client::{ClientConfig, HosterClient, Page};

// Re-export error types
pub use error::{ResolveError, Result};

// Re-export data types
pub use types::{Quality, ResolvedStream};

// Re-export registry and resolvers
pub use registry::{RegistryBuilder, ResolverRegistry, builtin_xfs_defs};
pub use resolver::byse::{EntropySource, FixedEntropy, OsEntropy};
pub use resolver::{
    FilemoonResolver, HosterResolver, XfsConfig, XfsConfigDef, XfsResolver, extract_file_id,
};

// Re-export parser functions
pub use parser::{extract_video_url, find_direct_hls, unpack_packed_js};
