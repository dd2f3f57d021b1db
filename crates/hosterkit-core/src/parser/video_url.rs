//! Player configuration parsing
//!
//! Pulls the media URL out of JWPlayer/VideoJS style setup code, either raw
//! page text or the output of [`super::unpack_packed_js`].

use regex::Regex;

/// Player patterns in priority order: `sources:[{file:..}]`, `file:`, `source:`
const VIDEO_URL_PATTERNS: [&str; 3] = [
    r#"["']?\bsources["']?\s*:\s*\[\s*\{[^}]*?["']?\bfile["']?\s*:\s*["']([^"']+)["']"#,
    r#"["']?\bfile["']?\s*:\s*["']([^"']+)["']"#,
    r#"["']?\bsource["']?\s*:\s*["']([^"']+)["']"#,
];

/// Extracts the media URL from player configuration text
///
/// A `sources:[{file:"URL"}]` array wins over a bare `file:"URL"`, which
/// wins over a bare `source:"URL"`. Quotes may be single or double.
///
/// # Returns
/// The first URL found, with JSON `\/` escapes removed, or `None`.
pub fn extract_video_url(js: &str) -> Option<String> {
    for pattern in VIDEO_URL_PATTERNS {
        let Ok(re) = Regex::new(pattern) else {
            continue;
        };
        if let Some(caps) = re.captures(js)
            && let Some(m) = caps.get(1)
        {
            let url = unescape_slashes(m.as_str());
            if !url.trim().is_empty() {
                return Some(url);
            }
        }
    }
    None
}

/// Finds a quoted HLS manifest URL anywhere in a page
///
/// Thumbnail and subtitle-track manifests are skipped; they sit next to the
/// main stream in many players.
pub fn find_direct_hls(html: &str) -> Option<String> {
    let re = Regex::new(r#"["'](https?:(?:\\?/){2}[^"'\s<>]+?\.m3u8[^"'\s<>]*)["']"#).ok()?;

    re.captures_iter(html)
        .filter_map(|caps| caps.get(1).map(|m| unescape_slashes(m.as_str())))
        .find(|url| {
            let lower = url.to_ascii_lowercase();
            !lower.contains("thumbnail") && !lower.contains("track")
        })
}

fn unescape_slashes(url: &str) -> String {
    url.replace("\\/", "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_sources_array() {
        let js = r#"jwplayer("vplayer").setup({sources:[{file:"https://cdn.example/hls/master.m3u8"}],image:"x.jpg"});"#;
        assert_eq!(
            extract_video_url(js),
            Some("https://cdn.example/hls/master.m3u8".to_string())
        );
    }

    #[test]
    fn test_sources_array_preferred_over_bare_file() {
        let js = r#"
            tracks: [{ file: "https://cdn.example/thumbs.vtt", kind: "thumbnails" }],
            sources: [ { file: 'https://cdn.example/main.m3u8', label: "HD" } ]
        "#;
        assert_eq!(
            extract_video_url(js),
            Some("https://cdn.example/main.m3u8".to_string())
        );
    }

    #[test]
    fn test_extract_bare_file() {
        let js = r#"player.setup({ file : 'https://cdn.example/video.mp4', width: "100%" })"#;
        assert_eq!(
            extract_video_url(js),
            Some("https://cdn.example/video.mp4".to_string())
        );
    }

    #[test]
    fn test_extract_bare_source() {
        let js = r#"var player = new Clappr.Player({source: "https://cdn.example/v.m3u8", parentId: 'p'});"#;
        assert_eq!(
            extract_video_url(js),
            Some("https://cdn.example/v.m3u8".to_string())
        );
    }

    #[test]
    fn test_extract_json_style_keys() {
        let js = r#"{"sources":[{"file":"https:\/\/cdn.example\/v.mp4","label":"720p"}]}"#;
        assert_eq!(
            extract_video_url(js),
            Some("https://cdn.example/v.mp4".to_string())
        );
    }

    #[test]
    fn test_ignores_words_ending_in_file() {
        let js = r#"profile: "https://example.com/me", resource: "x""#;
        assert_eq!(extract_video_url(js), None);
    }

    #[test]
    fn test_extract_nothing() {
        assert_eq!(extract_video_url("<html><body>Hello</body></html>"), None);
    }

    #[test]
    fn test_find_direct_hls_skips_auxiliary_manifests() {
        let html = r#"
            <script>
            var thumbs = "https://cdn.example/thumbnails/index.m3u8";
            var subs = 'https://cdn.example/track_en.m3u8';
            var hls = "https://cdn.example/hls2/01/master.m3u8?t=abc&s=1";
            </script>
        "#;
        assert_eq!(
            find_direct_hls(html),
            Some("https://cdn.example/hls2/01/master.m3u8?t=abc&s=1".to_string())
        );
    }

    #[test]
    fn test_find_direct_hls_none() {
        let html = r#"<video src="https://cdn.example/v.mp4"></video>"#;
        assert_eq!(find_direct_hls(html), None);
    }
}
