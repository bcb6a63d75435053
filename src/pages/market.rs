use serde_json::Value;

use super::{escape, freshness, page};
use crate::cache::{Cached, Origin};
use crate::data::{MarketBundle, QuoteTable, Trend};

fn quote_table(title: &str, quotes: &QuoteTable) -> String {
    let mut html = format!(
        "<h2>{}</h2>\n<table>\n<tr><th>Mã</th><th>Giá</th><th>Thay đổi</th></tr>\n",
        escape(title)
    );
    if quotes.is_empty() {
        html.push_str("<tr><td colspan=\"3\" class=\"muted\">Không có dữ liệu</td></tr>\n");
    }
    for (name, quote) in quotes {
        let class = match quote.change {
            Trend::Up => "up",
            Trend::Down => "down",
        };
        html.push_str(&format!(
            "<tr><td>{}</td><td>{:.2}</td><td class=\"{}\">{} {:.2}%</td></tr>\n",
            escape(name),
            quote.price,
            class,
            quote.change.symbol(),
            quote.percent,
        ));
    }
    html.push_str("</table>\n");
    html
}

/// Symbols from the trading-signals service may be plain strings or objects
fn symbol_label(symbol: &Value) -> String {
    match symbol {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("symbol")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| symbol.to_string()),
        other => other.to_string(),
    }
}

pub fn render_market(cached: &Cached<MarketBundle>) -> String {
    let bundle = &cached.data;
    let mut body = String::from("<h1>Thị trường</h1>\n");
    body.push_str(&quote_table("Chỉ số chứng khoán", &bundle.stock));
    body.push_str(&quote_table("Ngoại hối", &bundle.forex));
    body.push_str(&quote_table("Hàng hóa", &bundle.commodity));
    body.push_str(&quote_table("Tiền mã hóa", &bundle.crypto));

    if !bundle.symbols.is_empty() {
        let symbols: Vec<String> = bundle
            .symbols
            .iter()
            .map(|s| escape(&symbol_label(s)))
            .collect();
        body.push_str(&format!(
            "<h2>Cổ phiếu tiềm năng</h2>\n<p>{}</p>\n<p class=\"muted\">Cập nhật: {}</p>\n",
            symbols.join(", "),
            escape(&bundle.updated)
        ));
    }
    body.push_str(&freshness(cached.fetched_at, cached.origin == Origin::Stale));

    page("Thị trường", &body)
}
