//! Link-preview HTML rendering.
//!
//! One document: OpenGraph metadata for link unfurlers plus a minimal
//! human-visible page with the cover and an audio element. Chat clients
//! mostly honor the `og:video` family, which is why an audio file is
//! presented as a video with the cover's geometry.

use crate::config::SiteConfig;
use crate::resolver::ResolutionState;

/// Render the preview document for a resolved (possibly partial) state.
pub fn preview_page(
    site: &SiteConfig,
    meta: &ResolutionState,
    content_url: &str,
    cover_url: &str,
    generated_at: &str,
) -> String {
    let song_info = if meta.tags.artist.is_empty() {
        meta.tags.title.clone()
    } else {
        format!("{} - {}", meta.tags.artist, meta.tags.title)
    };

    let song_info = escape(&song_info);
    let artist = escape(&meta.tags.artist);
    let site_name = escape(&site.name);
    let page_title = escape(&site.page_title);
    let theme_color = escape(&site.theme_color);
    let content_url = escape(content_url);
    let cover_url = escape(cover_url);
    let generated_at = escape(generated_at);

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">

  <meta property="og:site_name" content="{site_name}">
  <meta property="og:title" content="{song_info}">
  <meta property="og:description" content="{artist}">
  <meta property="og:image" content="{cover_url}">
  <meta name="theme-color" content="{theme_color}" />
  <meta property="og:type" content="video.other">

  <meta property="og:video" content="{content_url}">
  <meta property="og:video:secure_url" content="{content_url}">
  <meta property="og:video:type" content="video/mp4">
  <meta property="og:video:width" content="{width}">
  <meta property="og:video:height" content="{height}">
  <title>{song_info} | {page_title}</title>
</head>
<body>
  <h1>{page_title}</h1>
  <h2>{song_info}</h2>
  <img src="{cover_url}" width="300" height="300" style="object-fit: contain;" />
  <br/>
  <audio controls src="{content_url}"></audio>
  <br/>
  <span>
    <a href="{content_url}">Link</a>
    <span>|</span>
    <a href="{content_url}" download>Download</a>
  </span>
  <hr/>
  <p>Generated at: {generated_at}</p>
</body>
</html>
"#,
        width = meta.cover_width,
        height = meta.cover_height,
    )
}

/// Minimal HTML escaping for interpolated values.
fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
