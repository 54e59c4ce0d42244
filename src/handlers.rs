use crate::api_client::{AirQualityReport, AirQualitySource, LocationQuery};
use crate::error::LookupError;
use crate::utils::{
    format_help, format_lookup_error, format_report, format_unknown_command,
    format_unsupported_message, format_welcome,
};
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, Message, ParseMode};
use tracing::{error, info, warn};

/// Что пользователь попросил в сообщении
#[derive(Debug, PartialEq)]
pub enum Request<'a> {
    Start,
    Help,
    AirQuality(Option<&'a str>),
    Unknown(&'a str),
}

/// Plain text is treated as a location, the same as `/air <text>`.
pub fn parse_request(text: &str) -> Request<'_> {
    let text = text.trim();

    if !text.starts_with('/') {
        return Request::AirQuality(Some(text).filter(|t| !t.is_empty()));
    }

    let (command, argument) = match text.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, Some(rest.trim()).filter(|r| !r.is_empty())),
        None => (text, None),
    };
    // "/air@SomeBot" in group chats
    let name = command.split('@').next().unwrap_or(command);

    match name.to_lowercase().as_str() {
        "/start" => Request::Start,
        "/help" => Request::Help,
        "/air" => Request::AirQuality(argument),
        _ => Request::Unknown(command),
    }
}

/// Builds the reply for one inbound text. Never fails: lookup errors become reply text.
pub async fn handle(text: &str, source: &dyn AirQualitySource) -> String {
    match parse_request(text) {
        Request::Start => format_welcome(),
        Request::Help => format_help(),
        Request::Unknown(command) => format_unknown_command(command),
        Request::AirQuality(argument) => match lookup(argument, source).await {
            Ok(report) => {
                info!(
                    "Air quality for {} ({:.4}, {:.4}): {:?}",
                    report.location.name,
                    report.location.latitude,
                    report.location.longitude,
                    report.reading
                );
                format_report(&report)
            }
            Err(e) => {
                match &e {
                    LookupError::Upstream(_) => error!("Error fetching air quality: {}", e),
                    _ => warn!("Air quality request rejected: {}", e),
                }
                format_lookup_error(&e)
            }
        },
    }
}

async fn lookup(
    argument: Option<&str>,
    source: &dyn AirQualitySource,
) -> Result<AirQualityReport, LookupError> {
    let query = argument
        .and_then(LocationQuery::parse)
        .ok_or(LookupError::Usage)?;
    source.fetch(&query).await
}

pub async fn handle_message(
    bot: Bot,
    msg: Message,
    source: Arc<dyn AirQualitySource>,
) -> ResponseResult<()> {
    let reply = match msg.text() {
        Some(text) => {
            info!("Received message from chat {}: {}", msg.chat.id, text);

            if matches!(parse_request(text), Request::AirQuality(Some(_))) {
                let _ = bot.send_chat_action(msg.chat.id, ChatAction::Typing).await;
            }

            handle(text, source.as_ref()).await
        }
        None => {
            info!("Received non-text message from chat {}", msg.chat.id);
            format_unsupported_message()
        }
    };

    bot.send_message(msg.chat.id, reply)
        .parse_mode(ParseMode::Html)
        .reply_to_message_id(msg.id)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_client::{AirQualityClient, Location, Reading};
    use crate::error::UpstreamError;
    use crate::utils::format_usage;
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    enum Outcome {
        Report(Reading),
        NotFound,
        Status(StatusCode),
        Malformed,
    }

    struct FakeSource {
        outcome: Outcome,
        calls: AtomicUsize,
        queries: Mutex<Vec<LocationQuery>>,
    }

    impl FakeSource {
        fn new(outcome: Outcome) -> Self {
            Self {
                outcome,
                calls: AtomicUsize::new(0),
                queries: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AirQualitySource for FakeSource {
        async fn fetch(&self, query: &LocationQuery) -> Result<AirQualityReport, LookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.queries.lock().unwrap().push(query.clone());

            match &self.outcome {
                Outcome::Report(reading) => Ok(AirQualityReport {
                    location: Location {
                        name: "Berlin".to_string(),
                        country: Some("Germany".to_string()),
                        latitude: 52.52,
                        longitude: 13.41,
                    },
                    reading: reading.clone(),
                }),
                Outcome::NotFound => Err(LookupError::LocationNotFound(match query {
                    LocationQuery::Name(name) => name.clone(),
                    LocationQuery::Coordinates { .. } => String::new(),
                })),
                Outcome::Status(status) => Err(UpstreamError::Status {
                    status: *status,
                    reason: "boom".to_string(),
                }
                .into()),
                Outcome::Malformed => {
                    Err(UpstreamError::Malformed("expected value at line 1 column 1".to_string()).into())
                }
            }
        }
    }

    fn berlin_reading() -> Reading {
        Reading {
            pm10: Some(12.3),
            pm2_5: Some(5.1),
            carbon_monoxide: Some(210.0),
            nitrogen_dioxide: None,
            ..Reading::default()
        }
    }

    #[test]
    fn test_parse_request() {
        assert_eq!(parse_request("/start"), Request::Start);
        assert_eq!(parse_request("/HELP"), Request::Help);
        assert_eq!(parse_request("/air"), Request::AirQuality(None));
        assert_eq!(parse_request("/air   "), Request::AirQuality(None));
        assert_eq!(
            parse_request("/air  New York "),
            Request::AirQuality(Some("New York"))
        );
        assert_eq!(
            parse_request("/air@AirBot Paris"),
            Request::AirQuality(Some("Paris"))
        );
        assert_eq!(parse_request("Tokyo"), Request::AirQuality(Some("Tokyo")));
        assert_eq!(parse_request("/weather now"), Request::Unknown("/weather"));
    }

    #[tokio::test]
    async fn test_air_command_reports_present_values() {
        let source = FakeSource::new(Outcome::Report(berlin_reading()));

        let reply = handle("/air Berlin", &source).await;

        assert!(reply.contains("PM10: 12.3"));
        assert!(reply.contains("PM2.5: 5.1"));
        assert!(reply.contains("CO: 210.0"));
        assert!(!reply.contains("NO₂"));
        assert_eq!(
            *source.queries.lock().unwrap(),
            vec![LocationQuery::Name("Berlin".to_string())]
        );
    }

    #[tokio::test]
    async fn test_missing_location_makes_no_call() {
        let source = FakeSource::new(Outcome::Report(berlin_reading()));

        assert_eq!(handle("/air", &source).await, format_usage());
        assert_eq!(handle("/air    ", &source).await, format_usage());
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_plain_text_is_a_location() {
        let source = FakeSource::new(Outcome::Report(berlin_reading()));

        let reply = handle("52.52, 13.41", &source).await;

        assert!(reply.contains("PM10: 12.3"));
        assert_eq!(
            *source.queries.lock().unwrap(),
            vec![LocationQuery::Coordinates {
                latitude: 52.52,
                longitude: 13.41
            }]
        );
    }

    #[tokio::test]
    async fn test_upstream_failure_becomes_generic_reply() {
        let source = FakeSource::new(Outcome::Status(StatusCode::BAD_GATEWAY));

        let reply = handle("/air Berlin", &source).await;

        assert!(reply.contains("couldn't fetch air quality data"));
        assert!(!reply.contains("boom"));
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_malformed_body_becomes_generic_reply() {
        let source = FakeSource::new(Outcome::Malformed);
        let reply = handle("/air Berlin", &source).await;
        assert!(reply.contains("couldn't fetch air quality data"));
    }

    #[tokio::test]
    async fn test_unknown_location_reply() {
        let source = FakeSource::new(Outcome::NotFound);

        let reply = handle("/air Atlantis", &source).await;

        assert!(reply.contains("couldn't find a place called"));
        assert!(reply.contains("Atlantis"));
    }

    #[tokio::test]
    async fn test_other_commands_do_not_fetch() {
        let source = FakeSource::new(Outcome::Report(berlin_reading()));

        assert_eq!(handle("/start", &source).await, format_welcome());
        assert_eq!(handle("/help", &source).await, format_help());
        assert!(handle("/weather", &source).await.contains("/help"));
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_end_to_end_against_open_meteo_mock() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .and(query_param("name", "Berlin"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{
                    "name": "Berlin",
                    "latitude": 52.52437,
                    "longitude": 13.41053,
                    "country": "Germany"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v1/air-quality"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "current_units": { "pm10": "μg/m³", "pm2_5": "μg/m³", "carbon_monoxide": "μg/m³" },
                "current": {
                    "time": "2024-05-01T12:00",
                    "pm10": 12.3,
                    "pm2_5": 5.1,
                    "carbon_monoxide": 210.0,
                    "nitrogen_dioxide": null
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = AirQualityClient::with_client(reqwest::Client::new(), server.uri(), server.uri());
        let reply = handle("/air Berlin", &client).await;

        assert!(reply.contains("Berlin, Germany"));
        assert!(reply.contains("PM10: 12.3"));
        assert!(reply.contains("PM2.5: 5.1"));
        assert!(reply.contains("CO: 210.0"));
        assert!(!reply.contains("NO₂"));
    }

    #[tokio::test]
    async fn test_end_to_end_upstream_error_status() {
        let server = MockServer::start().await;

        Mock::given(path("/v1/air-quality"))
            .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
            .expect(1)
            .mount(&server)
            .await;

        let client = AirQualityClient::with_client(reqwest::Client::new(), server.uri(), server.uri());
        let reply = handle("/air 10, 20", &client).await;

        assert!(reply.contains("couldn't fetch air quality data"));
    }
}
