//! Provider resolution for the media embed node.
//!
//! [`resolve_media`] is pure and deterministic. It runs when a media node is
//! inserted (the result is cached on the node's attributes) and again as a
//! fallback at render time, so classification can never drift between the
//! two.

use smol_str::SmolStr;

use crate::Attrs;

/// A video provider we know how to embed in an iframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    YouTube,
    Vimeo,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::YouTube => "youtube",
            Provider::Vimeo => "vimeo",
        }
    }

    pub fn from_str(name: &str) -> Option<Self> {
        match name {
            "youtube" => Some(Provider::YouTube),
            "vimeo" => Some(Provider::Vimeo),
            _ => None,
        }
    }

    /// Canonical embed URL for a video id.
    pub fn embed_url(&self, video_id: &str) -> String {
        match self {
            Provider::YouTube => format!("https://www.youtube.com/embed/{video_id}"),
            Provider::Vimeo => format!("https://player.vimeo.com/video/{video_id}"),
        }
    }
}

/// How a media source should be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaStrategy {
    /// Third-party player wrapped in an iframe.
    ProviderEmbed { provider: Provider, video_id: SmolStr },
    /// Direct file played through a native `<video>` element.
    NativePlayer,
}

impl MediaStrategy {
    pub fn embed_url(&self) -> Option<String> {
        match self {
            MediaStrategy::ProviderEmbed { provider, video_id } => {
                Some(provider.embed_url(video_id))
            }
            MediaStrategy::NativePlayer => None,
        }
    }
}

/// Hosts whose short links carry the video id as the path tail.
const SHORT_LINK_HOSTS: &[(&str, Provider)] =
    &[("youtu.be/", Provider::YouTube), ("vimeo.com/", Provider::Vimeo)];

/// Hosts whose long-form URLs carry the video id in a `v=` query parameter.
const WATCH_HOSTS: &[(&str, Provider)] = &[("youtube.com/", Provider::YouTube)];

/// Classify a media source URL.
///
/// Short-link hosts are checked before long-form hosts: a short link has no
/// `v=` parameter and would otherwise fall through to the file case.
/// Anything that matches no provider is a direct file.
pub fn resolve_media(src: &str) -> MediaStrategy {
    for (host, provider) in SHORT_LINK_HOSTS {
        if let Some(rest) = substring_after(src, host) {
            let id = path_tail(rest);
            if !id.is_empty() {
                return MediaStrategy::ProviderEmbed {
                    provider: *provider,
                    video_id: id.into(),
                };
            }
        }
    }

    for (host, provider) in WATCH_HOSTS {
        if src.contains(host)
            && let Some(rest) = substring_after(src, "v=")
        {
            let id = query_value(rest);
            if !id.is_empty() {
                return MediaStrategy::ProviderEmbed {
                    provider: *provider,
                    video_id: id.into(),
                };
            }
        }
    }

    MediaStrategy::NativePlayer
}

fn substring_after<'a>(haystack: &'a str, needle: &str) -> Option<&'a str> {
    haystack
        .find(needle)
        .map(|idx| &haystack[idx + needle.len()..])
}

/// Path tail: everything up to the next `/`, `?`, or `#`.
fn path_tail(rest: &str) -> &str {
    rest.split(['/', '?', '#']).next().unwrap_or("")
}

/// Query value: everything up to the next `&` or `#`.
fn query_value(rest: &str) -> &str {
    rest.split(['&', '#']).next().unwrap_or("")
}

/// Build the full attribute set for a media node with the resolved strategy
/// cached in. Used at insert time and when ingesting markup.
pub fn media_attrs(src: &str) -> Attrs {
    let mut attrs = Attrs::new();
    attrs.insert("src".into(), src.into());
    attrs.insert("controls".into(), "true".into());
    attrs.insert("width".into(), "100%".into());
    attrs.insert("height".into(), "auto".into());

    match resolve_media(src) {
        MediaStrategy::ProviderEmbed { provider, video_id } => {
            attrs.insert("strategy".into(), "provider-embed".into());
            attrs.insert("provider".into(), provider.as_str().into());
            attrs.insert("video-id".into(), video_id);
        }
        MediaStrategy::NativePlayer => {
            attrs.insert("strategy".into(), "native-player".into());
        }
    }
    attrs
}

/// Read the cached strategy off a media node's attributes, re-resolving from
/// `src` when the cache is missing (e.g. nodes built by hand in tests).
pub fn cached_strategy(attrs: &Attrs) -> MediaStrategy {
    match attrs.get("strategy").map(SmolStr::as_str) {
        Some("provider-embed") => {
            let provider = attrs
                .get("provider")
                .and_then(|p| Provider::from_str(p));
            let video_id = attrs.get("video-id").cloned();
            if let (Some(provider), Some(video_id)) = (provider, video_id) {
                return MediaStrategy::ProviderEmbed { provider, video_id };
            }
            resolve_media(attrs.get("src").map(SmolStr::as_str).unwrap_or(""))
        }
        Some("native-player") => MediaStrategy::NativePlayer,
        _ => resolve_media(attrs.get("src").map(SmolStr::as_str).unwrap_or("")),
    }
}

/// Parse-rule attribute extraction for the media node.
///
/// The embed wrapper carries the original source in `data-src`; a bare
/// `<video>` element carries it in `src`. Either way the strategy is
/// re-resolved from the source, so insert-time and ingest-time attributes
/// agree exactly.
pub fn parse_media_attrs(tag: &str, html_attrs: &[(SmolStr, SmolStr)]) -> Attrs {
    let find = |name: &str| {
        html_attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    };

    let src = if tag == "video" {
        find("src").unwrap_or("")
    } else {
        find("data-src").unwrap_or("")
    };

    let mut attrs = media_attrs(src);
    if tag == "video" && find("controls").is_none() {
        attrs.insert("controls".into(), "false".into());
    }
    let width = if tag == "video" { find("width") } else { find("data-width") };
    let height = if tag == "video" { find("height") } else { find("data-height") };
    if let Some(width) = width {
        attrs.insert("width".into(), width.into());
    }
    if let Some(height) = height {
        attrs.insert("height".into(), height.into());
    }
    attrs
}
