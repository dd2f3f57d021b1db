//! Shared setup for the HTTP integration tests
//!
//! Hoster host names are pinned to one local mock server, so resolvers see
//! their real domains while every request lands on wiremock.

#![allow(dead_code)]

use hosterkit_core::{ClientConfig, HosterClient};
use wiremock::MockServer;

pub struct Harness {
    pub server: MockServer,
    pub client: HosterClient,
}

impl Harness {
    pub async fn start(hosts: &[&str]) -> Self {
        let server = MockServer::start().await;
        let mut builder = reqwest::Client::builder();
        for host in hosts {
            builder = builder.resolve(host, *server.address());
        }
        let client = builder.build().expect("reqwest client");
        Self {
            server,
            client: HosterClient::from_client(client, &ClientConfig::default()),
        }
    }

    /// Absolute URL on `host` that reaches the mock server
    pub fn url(&self, host: &str, path: &str) -> String {
        format!("http://{host}:{}{path}", self.server.address().port())
    }

    pub async fn request_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|requests| requests.len())
            .unwrap_or_default()
    }
}
