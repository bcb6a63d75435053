//! HTML rendering for the dashboard pages
//!
//! Pages are plain strings assembled from the cached payloads. Everything that
//! comes from upstream goes through [`escape`].

mod feeds;
mod market;
mod weather;

pub use feeds::render_feed_shell;
pub use market::render_market;
pub use weather::render_weather;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};

const STYLE: &str = r#"
body { margin: 0; font-family: system-ui, sans-serif; background: #10141c; color: #e8ecf2; }
nav { display: flex; gap: 1.5rem; padding: 0.75rem 1.5rem; background: #1a2130; }
nav a { color: #9fc3ff; text-decoration: none; font-weight: 600; }
main { padding: 1.5rem; }
table { border-collapse: collapse; width: 100%; margin-bottom: 1.5rem; }
th, td { padding: 0.4rem 0.6rem; border-bottom: 1px solid #2a3346; text-align: left; }
.up { color: #3ecf6e; }
.down { color: #ff5c5c; }
.muted { color: #8a93a6; font-size: 0.85rem; }
.spinner { width: 2rem; height: 2rem; border: 4px solid #2a3346; border-top-color: #9fc3ff;
           border-radius: 50%; animation: spin 1s linear infinite; }
@keyframes spin { to { transform: rotate(360deg); } }
"#;

/// Wraps `body` in the shared document skeleton
pub fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"vi\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{title}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n{nav}\n<main>\n{body}\n</main>\n</body>\n</html>\n",
        title = escape(title),
        nav = nav(),
    )
}

fn nav() -> &'static str {
    r#"<nav><a href="/">Dashboard</a><a href="/weather">Thời tiết</a><a href="/news">Tin tức</a><a href="/market">Thị trường</a><a href="/finance">Tài chính</a></nav>"#
}

/// The landing page: the four panels side by side
pub fn render_layout() -> String {
    let body = r#"<div style="display:grid;grid-template-columns:1fr 1fr;gap:1rem;height:85vh">
<iframe src="/weather" title="weather" style="border:0;width:100%;height:100%"></iframe>
<iframe src="/market" title="market" style="border:0;width:100%;height:100%"></iframe>
<iframe src="/news" title="news" style="border:0;width:100%;height:100%"></iframe>
<iframe src="/finance" title="finance" style="border:0;width:100%;height:100%"></iframe>
</div>"#;
    page("Kiosk Dashboard", body)
}

/// Page shown when a panel's data could not be loaded
pub fn render_error(title: &str, message: &str) -> String {
    let body = format!(
        "<h1>{}</h1>\n<p>Không thể tải dữ liệu.</p>\n<p class=\"muted\">{}</p>",
        escape(title),
        escape(message)
    );
    page(title, &body)
}

/// Footer line telling how old the data is
fn freshness(fetched_at: DateTime<Utc>, stale: bool) -> String {
    let label = if stale { "Dữ liệu cũ, cập nhật lúc" } else { "Cập nhật lúc" };
    format!(
        "<p class=\"muted\">{} {} UTC</p>",
        label,
        fetched_at.format("%Y-%m-%d %H:%M")
    )
}

/// Escapes text for use in HTML element content and attribute values
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// `HH:MM` of a Unix timestamp in the given UTC offset
pub fn format_clock(timestamp: i64, utc_offset_secs: i32) -> String {
    match (DateTime::from_timestamp(timestamp, 0), FixedOffset::east_opt(utc_offset_secs)) {
        (Some(time), Some(offset)) => time.with_timezone(&offset).format("%H:%M").to_string(),
        _ => "--:--".to_string(),
    }
}

/// Abbreviated weekday (`Mon`) of a `YYYY-MM-DD` date
pub fn format_weekday(date: &str) -> String {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map(|d| d.format("%a").to_string())
        .unwrap_or_else(|_| date.to_string())
}
