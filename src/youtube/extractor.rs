// YouTube locator parsing
// Pulls the video id and the start offset out of a watch URL. Never fails:
// a locator we cannot make sense of yields a best-effort id and offset 0.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoLocator {
    pub video_id: String,
    pub start_offset: Duration,
}

pub fn parse_video_url(raw: &str) -> VideoLocator {
    let normalized = normalize(raw.trim());

    match Url::parse(&normalized) {
        Ok(url) => {
            let video_id = video_id_from_url(&url).unwrap_or_else(|| split_video_id(&normalized));
            let start_offset = ["t", "start"]
                .iter()
                .find_map(|key| query_value(&url, key))
                .and_then(|value| parse_start_offset(&value))
                .unwrap_or(0);
            VideoLocator {
                video_id,
                start_offset: Duration::from_secs(start_offset),
            }
        }
        Err(e) => {
            tracing::debug!("Unparsable video locator {:?}: {}", raw, e);
            VideoLocator {
                video_id: split_video_id(raw),
                start_offset: Duration::from_secs(split_offset(raw).unwrap_or(0)),
            }
        }
    }
}

// Offset parameter forms: "45", "45s", "1h2m3s" (any subset of h/m/s)
pub fn parse_start_offset(value: &str) -> Option<u64> {
    let value = value.trim();

    if let Ok(seconds) = value.parse::<u64>() {
        return Some(seconds);
    }

    if let Some(seconds) = value.strip_suffix('s').and_then(|v| v.parse::<u64>().ok()) {
        return Some(seconds);
    }

    let captures = compound_offset_pattern().captures(value)?;
    let component = |index: usize| -> Option<u64> {
        captures.get(index).map_or(Some(0), |m| m.as_str().parse().ok())
    };
    if captures.get(1).is_none() && captures.get(2).is_none() && captures.get(3).is_none() {
        return None;
    }
    let hours = component(1)?;
    let minutes = component(2)?;
    let seconds = component(3)?;
    hours
        .checked_mul(3600)?
        .checked_add(minutes.checked_mul(60)?)?
        .checked_add(seconds)
}

fn compound_offset_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?:(\d+)h)?(?:(\d+)m)?(?:(\d+)s)?$").expect("offset pattern is valid")
    })
}

fn normalize(raw: &str) -> String {
    if raw.starts_with("//") {
        format!("https:{raw}")
    } else if raw.contains("://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    }
}

fn query_value(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.into_owned())
}

fn video_id_from_url(url: &Url) -> Option<String> {
    if let Some(id) = query_value(url, "v").filter(|id| !id.is_empty()) {
        return Some(id);
    }

    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());
    let host = url.host_str().unwrap_or_default();
    if host.ends_with("youtu.be") {
        return segments.next().map(str::to_string);
    }
    match segments.next() {
        Some("embed") | Some("shorts") | Some("live") => segments.next().map(str::to_string),
        _ => None,
    }
}

// Permissive fallback: whatever sits between "v=" and the next '&' or '#'
fn split_video_id(raw: &str) -> String {
    let id = raw
        .split_once("v=")
        .map(|(_, rest)| rest.split(['&', '#']).next().unwrap_or_default())
        .unwrap_or_default()
        .to_string();
    if id.is_empty() {
        tracing::warn!("Could not extract a video id from {:?}", raw);
    }
    id
}

// Only whole `t=` / `start=` pairs count, never the tail of another key
fn split_offset(raw: &str) -> Option<u64> {
    let query = raw.split_once('?').map_or(raw, |(_, query)| query);
    let query = query.split('#').next().unwrap_or_default();
    query.split('&').find_map(|pair| match pair.split_once('=') {
        Some(("t", value)) | Some(("start", value)) => parse_start_offset(value),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_forms() {
        assert_eq!(parse_start_offset("45"), Some(45));
        assert_eq!(parse_start_offset("45s"), Some(45));
        assert_eq!(parse_start_offset("1m30s"), Some(90));
        assert_eq!(parse_start_offset("1h"), Some(3600));
        assert_eq!(parse_start_offset("1h2m3s"), Some(3723));
        assert_eq!(parse_start_offset("2m"), Some(120));
    }

    #[test]
    fn malformed_offsets_do_not_parse() {
        assert_eq!(parse_start_offset(""), None);
        assert_eq!(parse_start_offset("s"), None);
        assert_eq!(parse_start_offset("abc"), None);
        assert_eq!(parse_start_offset("3s1m"), None);
        assert_eq!(parse_start_offset("-5"), None);
    }

    #[test]
    fn watch_url_with_offset() {
        let locator = parse_video_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=1m30s");
        assert_eq!(locator.video_id, "dQw4w9WgXcQ");
        assert_eq!(locator.start_offset, Duration::from_secs(90));
    }

    #[test]
    fn missing_offset_defaults_to_zero() {
        let locator = parse_video_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ");
        assert_eq!(locator.start_offset, Duration::ZERO);
    }

    #[test]
    fn garbage_offset_defaults_to_zero() {
        let locator = parse_video_url("https://www.youtube.com/watch?v=abc&t=soon");
        assert_eq!(locator.video_id, "abc");
        assert_eq!(locator.start_offset, Duration::ZERO);
    }

    #[test]
    fn scheme_less_and_protocol_relative_urls() {
        assert_eq!(parse_video_url("www.youtube.com/watch?v=abc&t=45").video_id, "abc");
        assert_eq!(
            parse_video_url("//www.youtube.com/watch?v=abc&t=45s").start_offset,
            Duration::from_secs(45)
        );
    }

    #[test]
    fn short_and_embed_links() {
        let short = parse_video_url("https://youtu.be/xyz987?t=12");
        assert_eq!(short.video_id, "xyz987");
        assert_eq!(short.start_offset, Duration::from_secs(12));

        let embed = parse_video_url("https://www.youtube.com/embed/emb123?start=30");
        assert_eq!(embed.video_id, "emb123");
        assert_eq!(embed.start_offset, Duration::from_secs(30));
    }

    #[test]
    fn malformed_url_falls_back_to_split() {
        let locator = parse_video_url("http://[bad host/watch?v=abc123&t=20");
        assert_eq!(locator.video_id, "abc123");
        assert_eq!(locator.start_offset, Duration::from_secs(20));
    }

    #[test]
    fn malformed_url_ignores_keys_ending_in_t() {
        let locator = parse_video_url("http://[bad/watch?v=abc&list=PL1&t=20");
        assert_eq!(locator.video_id, "abc");
        assert_eq!(locator.start_offset, Duration::from_secs(20));

        let locator = parse_video_url("http://[bad/watch?v=abc&list=PL1");
        assert_eq!(locator.start_offset, Duration::ZERO);
    }
}
