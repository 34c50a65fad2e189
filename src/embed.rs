//! Video page URL to embeddable player URL
//!
//! YouTube and Twitch links become autoplaying, muted player URLs. Anything
//! else, including input that does not parse as a URL, comes back unchanged.

use url::Url;

/// Map a YouTube/Twitch page URL to its embed form
///
/// `parent` is the host the Twitch player is embedded under; Twitch refuses
/// to play without it.
pub fn to_embed_url(raw: &str, parent: &str) -> String {
    let trimmed = raw.trim();
    let parsed = if trimmed.contains("://") {
        Url::parse(trimmed)
    } else {
        Url::parse(&format!("https://{trimmed}"))
    };

    match parsed {
        Ok(url) => embed_for(&url, parent).unwrap_or_else(|| raw.to_string()),
        Err(_) => raw.to_string(),
    }
}

fn embed_for(url: &Url, parent: &str) -> Option<String> {
    let host = url.host_str()?;
    let host = host.strip_prefix("www.").unwrap_or(host);
    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|p| !p.is_empty()).collect())
        .unwrap_or_default();

    match host {
        "youtube.com" | "m.youtube.com" => {
            let from_query = url
                .query_pairs()
                .find(|(k, _)| k == "v")
                .map(|(_, v)| v.into_owned())
                .filter(|v| !v.is_empty());
            let from_path = match segments.as_slice() {
                ["shorts" | "live" | "embed", id, ..] => Some(id.to_string()),
                _ => None,
            };
            from_query.or(from_path).map(|id| youtube(&id))
        }
        "youtu.be" => segments.first().map(|id| youtube(id)),
        "twitch.tv" | "m.twitch.tv" => match segments.as_slice() {
            ["videos", id, ..] => Some(twitch_player("video", id, parent)),
            [_, "clip", slug, ..] => Some(twitch_clip(slug, parent)),
            [channel] => Some(twitch_player("channel", channel, parent)),
            _ => None,
        },
        "clips.twitch.tv" => segments.first().map(|slug| twitch_clip(slug, parent)),
        _ => None,
    }
}

fn youtube(id: &str) -> String {
    format!("https://www.youtube.com/embed/{id}?autoplay=1&mute=1")
}

fn twitch_player(kind: &str, value: &str, parent: &str) -> String {
    format!("https://player.twitch.tv/?{kind}={value}&parent={parent}&autoplay=true&muted=true")
}

fn twitch_clip(slug: &str, parent: &str) -> String {
    format!("https://clips.twitch.tv/embed?clip={slug}&parent={parent}&autoplay=true&muted=true")
}
