use crate::api_client::AirQualityReport;
use crate::error::LookupError;

/// Форматирует отчёт о качестве воздуха для Telegram (HTML)
pub fn format_report(report: &AirQualityReport) -> String {
    let mut result = String::new();
    let location = &report.location;
    let reading = &report.reading;

    let place = match &location.country {
        Some(country) => format!("{}, {}", location.name, country),
        None => location.name.clone(),
    };
    result.push_str(&format!("📍 <b>{}</b>\n", escape_html(&place)));
    result.push_str(&format!(
        "Latitude: {:.4}\nLongitude: {:.4}\n\n",
        location.latitude, location.longitude
    ));

    result.push_str("🌤 <b>Current air quality</b>");
    if let Some(observed_at) = reading.observed_at {
        result.push_str(&format!(" ({})", observed_at.format("%Y-%m-%d %H:%M")));
    }
    result.push('\n');

    if reading.is_empty() {
        result.push_str("📭 No readings are available for this location right now.");
        return result;
    }

    if let Some(aqi) = reading.european_aqi {
        result.push_str(&format!("• European AQI: {:.0} ({})\n", aqi, aqi_category(aqi)));
    }

    for (pollutant, value) in reading.pollutants() {
        result.push_str(&format!(
            "• {}: {:.1} {}\n",
            pollutant.label(),
            value,
            escape_html(reading.unit(pollutant))
        ));
    }

    result.trim_end().to_string()
}

/// European AQI band
pub fn aqi_category(aqi: f64) -> &'static str {
    if aqi <= 20.0 {
        "Good"
    } else if aqi <= 40.0 {
        "Fair"
    } else if aqi <= 60.0 {
        "Moderate"
    } else if aqi <= 80.0 {
        "Poor"
    } else if aqi <= 100.0 {
        "Very poor"
    } else {
        "Extremely poor"
    }
}

pub fn format_lookup_error(error: &LookupError) -> String {
    match error {
        LookupError::Usage => format_usage(),
        _ => format_error(&error.user_message()),
    }
}

pub fn format_error(error: &str) -> String {
    format!("❌ <b>Error:</b>\n{}", escape_html(error))
}

pub fn format_usage() -> String {
    r#"ℹ️ Please tell me which place to check.

Usage: <code>/air &lt;city&gt;</code> or <code>/air &lt;latitude&gt;, &lt;longitude&gt;</code>
Example: <code>/air Berlin</code>"#
        .to_string()
}

pub fn format_unknown_command(command: &str) -> String {
    format!(
        "🤔 I don't know the command <code>{}</code>. Use /help to see what I can do.",
        escape_html(command)
    )
}

pub fn format_unsupported_message() -> String {
    "🤔 I can only read text messages. Send me a city name or use /help.".to_string()
}

pub fn format_welcome() -> String {
    r#"👋 <b>Welcome!</b>

I can check the current air quality for any place you send me (in English).

Just type a city name, or use <code>/air Berlin</code>, and I'll fetch the latest readings.

Use /help to see full usage instructions."#
        .to_string()
}

pub fn format_help() -> String {
    r#"📖 <b>What can this bot do?</b>

Send me a city name in English and I'll look up its coordinates, then fetch current air quality from Open-Meteo.
You can also send coordinates directly, e.g. <code>52.52, 13.41</code>.

🧪 <b>Reported values:</b>
• European AQI - overall air quality index
• PM10 - particles smaller than 10 µm
• PM2.5 - particles smaller than 2.5 µm
• CO - carbon monoxide
• NO₂ - nitrogen dioxide

🤖 <b>Commands:</b>
/air &lt;place&gt; - air quality for a place
/start - welcome message
/help - show this help"#
        .to_string()
}

pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
