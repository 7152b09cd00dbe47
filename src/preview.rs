//! HTML markup for the host's item detail pane.

use crate::feed::FeedItem;

/// Render a standalone HTML document previewing one item.
///
/// The item description is the article body as published by the feed and
/// is embedded as-is; title and date are escaped since they are
/// interpolated into our own markup.
pub fn render_preview(item: &FeedItem) -> String {
    let title = escape_html(item.title.as_deref().unwrap_or("(untitled)"));
    let date = item.pub_date.format("%d/%m/%y %H:%M:%S");
    let body = item.description.as_deref().unwrap_or("<p>No content.</p>");

    format!(
        r#"<html>
<head><meta charset="utf-8"></head>
<body style="overflow-x: hidden; font-size: 14px; font-family: sans-serif;">
    <h2>{title}</h2>
    <p style="color: #999; font-size: 0.8em;">{date}</p>
    {body}
</body>
</html>"#
    )
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
