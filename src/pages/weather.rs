use serde_json::Value;

use super::{escape, format_clock, format_weekday, freshness, page};
use crate::cache::{Cached, Origin};
use crate::data::WeatherBundle;

/// Label for an OpenWeather air-quality index (1..=5)
fn aqi_label(aqi: i64) -> &'static str {
    match aqi {
        1 => "Tốt",
        2 => "Khá",
        3 => "Trung bình",
        4 => "Kém",
        5 => "Rất kém",
        _ => "Không rõ",
    }
}

fn icon_url(icon: &str) -> String {
    format!("https://openweathermap.org/img/wn/{}@2x.png", escape(icon))
}

fn number(value: &Value, pointer: &str) -> Option<f64> {
    value.pointer(pointer).and_then(Value::as_f64)
}

fn text<'a>(value: &'a Value, pointer: &str) -> &'a str {
    value.pointer(pointer).and_then(Value::as_str).unwrap_or_default()
}

pub fn render_weather(cached: &Cached<WeatherBundle>) -> String {
    let bundle = &cached.data;
    let current = &bundle.current;
    let offset = current
        .get("timezone")
        .and_then(Value::as_i64)
        .and_then(|secs| i32::try_from(secs).ok())
        .unwrap_or(0);

    let temp = number(current, "/main/temp")
        .map(|t| format!("{:.0}°C", t))
        .unwrap_or_else(|| "--".to_string());
    let feels_like = number(current, "/main/feels_like")
        .map(|t| format!("{:.0}°C", t))
        .unwrap_or_else(|| "--".to_string());
    let humidity = number(current, "/main/humidity")
        .map(|h| format!("{:.0}%", h))
        .unwrap_or_else(|| "--".to_string());
    let wind = number(current, "/wind/speed")
        .map(|w| format!("{:.1} m/s", w))
        .unwrap_or_else(|| "--".to_string());
    let clock = |pointer: &str| {
        current
            .pointer(pointer)
            .and_then(Value::as_i64)
            .map(|ts| format_clock(ts, offset))
            .unwrap_or_else(|| "--:--".to_string())
    };
    let aqi = bundle
        .air
        .pointer("/list/0/main/aqi")
        .and_then(Value::as_i64)
        .unwrap_or(0);

    let mut body = format!(
        "<h1>{city}</h1>\n\
         <div class=\"current\">\n\
         <img src=\"{icon}\" alt=\"{desc}\">\n\
         <p class=\"temp\">{temp}</p>\n\
         <p>{desc}</p>\n\
         <p>Cảm giác như {feels_like} · Độ ẩm {humidity} · Gió {wind}</p>\n\
         <p>Mặt trời mọc {sunrise} · Mặt trời lặn {sunset}</p>\n\
         <p>Chất lượng không khí: {aqi_label} (AQI {aqi})</p>\n\
         </div>\n",
        city = escape(&bundle.city),
        icon = icon_url(text(current, "/weather/0/icon")),
        desc = escape(text(current, "/weather/0/description")),
        sunrise = clock("/sys/sunrise"),
        sunset = clock("/sys/sunset"),
        aqi_label = aqi_label(aqi),
    );

    body.push_str("<table>\n<tr><th>Ngày</th><th></th><th>Thời tiết</th><th>Cao</th><th>Thấp</th></tr>\n");
    for day in &bundle.forecast {
        body.push_str(&format!(
            "<tr><td>{}</td><td><img src=\"{}\" alt=\"\" width=\"40\"></td><td>{}</td><td>{:.0}°</td><td>{:.0}°</td></tr>\n",
            format_weekday(&day.date),
            icon_url(&day.icon),
            escape(&day.description),
            day.temp_max,
            day.temp_min,
        ));
    }
    body.push_str("</table>\n");
    body.push_str(&freshness(cached.fetched_at, cached.origin == Origin::Stale));

    page("Thời tiết", &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DailyForecast;
    use chrono::DateTime;
    use serde_json::json;

    fn sample() -> Cached<WeatherBundle> {
        Cached {
            data: WeatherBundle {
                city: "Thành phố Hồ Chí Minh".to_string(),
                current: json!({
                    "timezone": 25200,
                    "main": {"temp": 31.6, "feels_like": 38.2, "humidity": 70},
                    "wind": {"speed": 3.6},
                    "weather": [{"icon": "04d", "description": "mây cụm"}],
                    "sys": {"sunrise": 1_720_997_000, "sunset": 1_721_042_000}
                }),
                forecast: vec![DailyForecast {
                    date: "2024-07-15".to_string(),
                    icon: "10d".to_string(),
                    description: "mưa nhẹ".to_string(),
                    temp_max: 33.2,
                    temp_min: 26.0,
                }],
                air: json!({"list": [{"main": {"aqi": 2}}]}),
            },
            fetched_at: DateTime::from_timestamp(1_721_001_600, 0).unwrap(),
            origin: Origin::Hit,
        }
    }

    #[test]
    fn test_renders_current_conditions() {
        let html = render_weather(&sample());

        assert!(html.contains("Thành phố Hồ Chí Minh"));
        assert!(html.contains("32°C"));
        assert!(html.contains("mây cụm"));
        assert!(html.contains("Độ ẩm 70%"));
        assert!(html.contains("Khá (AQI 2)"));
    }

    #[test]
    fn test_sun_times_use_city_offset() {
        let html = render_weather(&sample());

        // 1_720_997_000 is 22:43 UTC, 05:43 in UTC+7
        assert!(html.contains("Mặt trời mọc 05:43"));
    }

    #[test]
    fn test_forecast_rows() {
        let html = render_weather(&sample());

        assert!(html.contains("<td>Mon</td>"));
        assert!(html.contains("10d@2x.png"));
        assert!(html.contains("<td>33°</td><td>26°</td>"));
    }

    #[test]
    fn test_missing_fields_render_placeholders() {
        let mut cached = sample();
        cached.data.current = json!({});
        cached.data.air = json!({});

        let html = render_weather(&cached);

        assert!(html.contains("<p class=\"temp\">--</p>"));
        assert!(html.contains("Mặt trời mọc --:--"));
        assert!(html.contains("Không rõ"));
    }

    #[test]
    fn test_stale_payload_is_flagged() {
        let mut cached = sample();
        cached.origin = Origin::Stale;

        assert!(render_weather(&cached).contains("Dữ liệu cũ"));
    }
}
