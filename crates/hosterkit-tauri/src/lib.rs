//! Hosterkit Tauri Integration
//!
//! Provides a Tauri plugin that exposes the hoster resolver registry to the
//! frontend.
//!
//! # Usage
//!
//! Register the plugin in your Tauri application:
//!
//! ```ignore
//! fn main() {
//!     tauri::Builder::default()
//!         .plugin(hosterkit_tauri::init())
//!         .run(tauri::generate_context!())
//!         .expect("error while running tauri application");
//! }
//! ```
//!
//! Then invoke commands from the frontend:
//!
//! ```javascript
//! import { invoke } from '@tauri-apps/api/core';
//!
//! // Resolve an embed link to a playable stream (null if unresolvable)
//! const stream = await invoke('plugin:hosterkit|resolve_url', {
//!   url: 'https://filemoon.sx/e/abc123xyz'
//! });
//!
//! // Which hoster handles a link
//! const hoster = await invoke('plugin:hosterkit|find_hoster', { url });
//! ```

use std::sync::Arc;

use hosterkit_core::{HosterClient, ResolverRegistry};
use serde::Serialize;
use tauri::{
    Manager, Runtime,
    plugin::{Builder, TauriPlugin},
};

mod commands;

/// Registry shared by all commands
///
/// The registry is immutable after construction, so commands share it
/// through an `Arc` without locking.
pub struct ResolverState {
    pub(crate) registry: Arc<ResolverRegistry>,
}

impl ResolverState {
    /// Create a new ResolverState with the built-in hosters
    ///
    /// # Errors
    /// Returns error string if the client or the hoster table fails to load
    pub fn new() -> Result<Self, String> {
        let client = HosterClient::new().map_err(|e| e.to_string())?;
        let registry = ResolverRegistry::new(client).map_err(|e| e.to_string())?;
        Ok(Self::from_registry(registry))
    }

    /// Wrap a registry built by the application (custom hosters, client)
    pub fn from_registry(registry: ResolverRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }
}

/// Hoster summary for frontend listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HosterInfo {
    pub name: String,
    pub domains: Vec<String>,
}

/// Initialize the hosterkit plugin
///
/// # Example
/// ```ignore
/// tauri::Builder::default()
///     .plugin(hosterkit_tauri::init())
///     .run(tauri::generate_context!())
///     .expect("error while running tauri application");
/// ```
pub fn init<R: Runtime>() -> TauriPlugin<R> {
    Builder::new("hosterkit")
        .invoke_handler(tauri::generate_handler![
            commands::resolve_url,
            commands::resolve_urls,
            commands::find_hoster,
            commands::list_hosters
        ])
        .setup(|app, _api| {
            let state = ResolverState::new().map_err(Box::<dyn std::error::Error>::from)?;
            app.manage(state);
            Ok(())
        })
        .build()
}

// Re-export types for convenience
pub use hosterkit_core::{Quality, ResolvedStream};
