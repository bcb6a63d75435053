use super::{escape, page};

/// Shell page for a headline feed
///
/// The page loads immediately with a spinner and pulls the headlines from
/// `json_route` in the browser, so a slow upstream never blocks the kiosk.
pub fn render_feed_shell(title: &str, json_route: &str) -> String {
    let body = format!(
        r#"<h1>{title}</h1>
<div id="feed"><div class="spinner"></div></div>
<script>
const escapeHtml = (s) => String(s ?? "").replace(/[&<>"']/g, (c) => ({{"&": "&amp;", "<": "&lt;", ">": "&gt;", '"': "&quot;", "'": "&#39;"}}[c]));
fetch("{route}")
  .then((r) => r.ok ? r.json() : Promise.reject(r.status))
  .then((items) => {{
    document.getElementById("feed").innerHTML = "<ul>" + items.map((item) =>
      "<li><a href=\"" + escapeHtml(item.link) + "\" target=\"_blank\">" + escapeHtml(item.title) +
      "</a> <span class=\"muted\">" + escapeHtml(item.pubDate) + "</span></li>").join("") + "</ul>";
  }})
  .catch(() => {{
    document.getElementById("feed").innerHTML = "<p>Không thể tải dữ liệu.</p>";
  }});
</script>"#,
        title = escape(title),
        route = escape(json_route),
    );
    page(title, &body)
}
