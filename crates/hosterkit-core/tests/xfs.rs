//! XFS resolver against a mock hoster

mod common;

use std::sync::Arc;

use common::Harness;
use hosterkit_core::{HosterResolver, ResolverRegistry, XfsConfig, XfsConfigDef, XfsResolver};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, ResponseTemplate};

const FILE_ID: &str = "abc123def456";

fn vidhost(harness: &Harness) -> XfsResolver {
    let config = XfsConfig::try_from(XfsConfigDef {
        name: "vidhost".to_string(),
        domains: vec!["vidhost.com".to_string()],
        is_video_hoster: true,
        ..Default::default()
    })
    .expect("valid config");
    XfsResolver::new(Arc::new(config), harness.client.clone())
}

fn splash_page() -> &'static str {
    r#"<html><body>
        <form id="F1" method="POST" action="/dl">
            <input type="hidden" name="op" value="embed">
            <input type="submit" value="Continue to video">
        </form>
    </body></html>"#
}

#[tokio::test]
async fn test_katfile_ddl_returns_original_url() {
    let harness = Harness::start(&["katfile.com"]).await;
    Mock::given(method("GET"))
        .and(path(format!("/{FILE_ID}/Some.Movie.2023.mkv.html")))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("<html><h2>Some.Movie.2023.mkv</h2></html>"),
        )
        .expect(1)
        .mount(&harness.server)
        .await;

    let registry = ResolverRegistry::new(harness.client.clone()).unwrap();
    let url = harness.url("katfile.com", &format!("/{FILE_ID}/Some.Movie.2023.mkv.html"));
    let stream = registry.resolve(&url).await.expect("katfile should resolve");

    assert_eq!(stream.video_url, url);
    assert!(!stream.is_hls);
}

#[tokio::test]
async fn test_katfile_offline_marker() {
    let harness = Harness::start(&["katfile.com"]).await;
    Mock::given(method("GET"))
        .and(path(format!("/{FILE_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<div class=\"err\">File Not Found</div><p>The file was removed by administrator</p>",
        ))
        .mount(&harness.server)
        .await;

    let registry = ResolverRegistry::new(harness.client.clone()).unwrap();
    let url = harness.url("katfile.com", &format!("/{FILE_ID}"));
    assert!(registry.resolve(&url).await.is_none());
}

#[tokio::test]
async fn test_error_redirect_is_offline() {
    let harness = Harness::start(&["katfile.com"]).await;
    let target = harness.url("katfile.com", "/404");
    Mock::given(method("GET"))
        .and(path(format!("/{FILE_ID}")))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", target.as_str()))
        .mount(&harness.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/404"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>Oops</html>"))
        .mount(&harness.server)
        .await;

    let registry = ResolverRegistry::new(harness.client.clone()).unwrap();
    let url = harness.url("katfile.com", &format!("/{FILE_ID}"));
    assert!(registry.resolve(&url).await.is_none());
}

#[tokio::test]
async fn test_two_step_form_then_verified_hls() {
    let harness = Harness::start(&["vidhost.com"]).await;
    let manifest = harness.url("vidhost.com", "/hls/master.m3u8?t=token");
    let dl_url = harness.url("vidhost.com", "/dl");

    Mock::given(method("GET"))
        .and(path(format!("/e/{FILE_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_string(splash_page()))
        .expect(1)
        .mount(&harness.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/dl"))
        .and(body_string_contains(format!("op=embed&file_code={FILE_ID}&auto=1")))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"<script>jwplayer("vplayer").setup({{sources:[{{file:"{manifest}"}}],width:"100%"}});</script>"#
        )))
        .expect(1)
        .mount(&harness.server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/hls/master.m3u8"))
        .and(header("Referer", dl_url.as_str()))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&harness.server)
        .await;

    let resolver = vidhost(&harness);
    let stream = resolver
        .resolve(&harness.url("vidhost.com", &format!("/{FILE_ID}")))
        .await
        .expect("two-step flow should resolve");

    assert_eq!(stream.video_url, manifest);
    assert!(stream.is_hls);
    assert_eq!(stream.referer(), Some(dl_url.as_str()));
}

#[tokio::test]
async fn test_video_hoster_offline_marker() {
    let harness = Harness::start(&["vidhost.com"]).await;
    Mock::given(method("GET"))
        .and(path(format!("/e/{FILE_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_string("<h1>File Not Found</h1>"))
        .mount(&harness.server)
        .await;

    let resolver = vidhost(&harness);
    let url = harness.url("vidhost.com", &format!("/{FILE_ID}"));
    assert!(resolver.resolve(&url).await.is_none());
    assert_eq!(harness.request_count().await, 1);
}

#[tokio::test]
async fn test_unreachable_media_is_rejected() {
    let harness = Harness::start(&["vidhost.com"]).await;
    let video = harness.url("vidhost.com", "/media/video.mp4");
    Mock::given(method("GET"))
        .and(path(format!("/e/{FILE_ID}")))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(format!(r#"player.setup({{file:"{video}"}})"#)),
        )
        .mount(&harness.server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/media/video.mp4"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&harness.server)
        .await;

    let resolver = vidhost(&harness);
    let url = harness.url("vidhost.com", &format!("/{FILE_ID}"));
    assert!(resolver.resolve(&url).await.is_none());
}

#[tokio::test]
async fn test_head_refused_falls_back_to_ranged_get() {
    let harness = Harness::start(&["vidhost.com"]).await;
    Mock::given(method("GET"))
        .and(path(format!("/e/{FILE_ID}")))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(r#"player.setup({file:"/media/video.mp4"})"#),
        )
        .mount(&harness.server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/media/video.mp4"))
        .respond_with(ResponseTemplate::new(405))
        .mount(&harness.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/media/video.mp4"))
        .and(header("Range", "bytes=0-0"))
        .respond_with(ResponseTemplate::new(206).set_body_bytes(vec![0u8]))
        .expect(1)
        .mount(&harness.server)
        .await;

    let resolver = vidhost(&harness);
    let stream = resolver
        .resolve(&harness.url("vidhost.com", &format!("/{FILE_ID}")))
        .await
        .expect("ranged GET should verify");

    assert_eq!(stream.video_url, harness.url("vidhost.com", "/media/video.mp4"));
    assert!(!stream.is_hls);
}

#[tokio::test]
async fn test_server_error_resolves_to_none() {
    let harness = Harness::start(&["vidhost.com"]).await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&harness.server)
        .await;

    let resolver = vidhost(&harness);
    let url = harness.url("vidhost.com", &format!("/{FILE_ID}"));
    assert!(resolver.resolve(&url).await.is_none());
}

#[tokio::test]
async fn test_offline_marker_after_splash_form() {
    let harness = Harness::start(&["vidhost.com"]).await;
    Mock::given(method("GET"))
        .and(path(format!("/e/{FILE_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_string(splash_page()))
        .mount(&harness.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/dl"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<h2>File Not Found</h2><script>player.setup({file:"https://cdn.example/v.mp4"})</script>"#,
        ))
        .expect(1)
        .mount(&harness.server)
        .await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&harness.server)
        .await;

    let resolver = vidhost(&harness);
    let url = harness.url("vidhost.com", &format!("/{FILE_ID}"));
    assert!(resolver.resolve(&url).await.is_none());
    assert_eq!(harness.request_count().await, 2);
}

#[tokio::test]
async fn test_katfile_error_status_resolves_to_none() {
    for status in [404u16, 503] {
        let harness = Harness::start(&["katfile.com"]).await;
        Mock::given(method("GET"))
            .and(path(format!("/{FILE_ID}")))
            .respond_with(ResponseTemplate::new(status).set_body_string("<html>nothing here</html>"))
            .expect(1)
            .mount(&harness.server)
            .await;

        let registry = ResolverRegistry::new(harness.client.clone()).unwrap();
        let url = harness.url("katfile.com", &format!("/{FILE_ID}"));
        assert!(registry.resolve(&url).await.is_none(), "HTTP {status}");
    }
}
