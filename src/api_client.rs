use crate::config::Config;
use crate::error::{LookupError, UpstreamError};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use tracing::debug;

pub const DEFAULT_UNIT: &str = "μg/m³";

const CURRENT_VARIABLES: &str = "european_aqi,pm10,pm2_5,carbon_monoxide,nitrogen_dioxide";
const MAX_REASON_LEN: usize = 200;

/// What the user asked about: a place name or a raw coordinate pair.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationQuery {
    Name(String),
    Coordinates { latitude: f64, longitude: f64 },
}

impl LocationQuery {
    /// Returns `None` for blank input.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }

        Some(Self::parse_coordinates(input).unwrap_or_else(|| Self::Name(input.to_string())))
    }

    fn parse_coordinates(input: &str) -> Option<Self> {
        let parts: Vec<&str> = input
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .collect();

        if parts.len() != 2 {
            return None;
        }

        let latitude: f64 = parts[0].parse().ok()?;
        let longitude: f64 = parts[1].parse().ok()?;

        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return None;
        }

        Some(Self::Coordinates { latitude, longitude })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub name: String,
    pub country: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn from_coordinates(latitude: f64, longitude: f64) -> Self {
        Self {
            name: format!("{latitude:.4}, {longitude:.4}"),
            country: None,
            latitude,
            longitude,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pollutant {
    Pm10,
    Pm2_5,
    CarbonMonoxide,
    NitrogenDioxide,
}

impl Pollutant {
    pub const ALL: [Pollutant; 4] = [
        Pollutant::Pm10,
        Pollutant::Pm2_5,
        Pollutant::CarbonMonoxide,
        Pollutant::NitrogenDioxide,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Pollutant::Pm10 => "PM10",
            Pollutant::Pm2_5 => "PM2.5",
            Pollutant::CarbonMonoxide => "CO",
            Pollutant::NitrogenDioxide => "NO₂",
        }
    }

    /// Variable name used by Open-Meteo.
    pub fn field(self) -> &'static str {
        match self {
            Pollutant::Pm10 => "pm10",
            Pollutant::Pm2_5 => "pm2_5",
            Pollutant::CarbonMonoxide => "carbon_monoxide",
            Pollutant::NitrogenDioxide => "nitrogen_dioxide",
        }
    }
}

/// Current pollutant concentrations for one location. Missing values stay `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reading {
    pub european_aqi: Option<f64>,
    pub pm10: Option<f64>,
    pub pm2_5: Option<f64>,
    pub carbon_monoxide: Option<f64>,
    pub nitrogen_dioxide: Option<f64>,
    pub observed_at: Option<NaiveDateTime>,
    pub units: HashMap<String, String>,
}

impl Reading {
    pub fn value(&self, pollutant: Pollutant) -> Option<f64> {
        match pollutant {
            Pollutant::Pm10 => self.pm10,
            Pollutant::Pm2_5 => self.pm2_5,
            Pollutant::CarbonMonoxide => self.carbon_monoxide,
            Pollutant::NitrogenDioxide => self.nitrogen_dioxide,
        }
    }

    /// Present pollutant values in display order.
    pub fn pollutants(&self) -> Vec<(Pollutant, f64)> {
        Pollutant::ALL
            .iter()
            .filter_map(|&p| self.value(p).map(|v| (p, v)))
            .collect()
    }

    pub fn unit(&self, pollutant: Pollutant) -> &str {
        self.units
            .get(pollutant.field())
            .map(String::as_str)
            .unwrap_or(DEFAULT_UNIT)
    }

    pub fn is_empty(&self) -> bool {
        self.european_aqi.is_none() && self.pollutants().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AirQualityReport {
    pub location: Location,
    pub reading: Reading,
}

/// Anything that can turn a location query into a report.
#[async_trait]
pub trait AirQualitySource: Send + Sync {
    async fn fetch(&self, query: &LocationQuery) -> Result<AirQualityReport, LookupError>;
}

/// Stateless Open-Meteo client; safe to share between concurrent handlers.
pub struct AirQualityClient {
    geocoding_url: String,
    air_quality_url: String,
    client: reqwest::Client,
}

impl AirQualityClient {
    pub fn with_client(client: reqwest::Client, geocoding_url: String, air_quality_url: String) -> Self {
        Self {
            geocoding_url: geocoding_url.trim_end_matches('/').to_string(),
            air_quality_url: air_quality_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("Failed to build HTTP client")?;

        Ok(Self::with_client(
            client,
            config.geocoding_url.clone(),
            config.air_quality_url.clone(),
        ))
    }

    pub async fn resolve(&self, query: &LocationQuery) -> Result<Location, LookupError> {
        match query {
            LocationQuery::Coordinates { latitude, longitude } => {
                Ok(Location::from_coordinates(*latitude, *longitude))
            }
            LocationQuery::Name(name) => self
                .geocode(name)
                .await?
                .ok_or_else(|| LookupError::LocationNotFound(name.clone())),
        }
    }

    /// Best geocoding match for `name`, if any.
    pub async fn geocode(&self, name: &str) -> Result<Option<Location>, UpstreamError> {
        debug!("Geocoding location name: {}", name);

        let url = format!("{}/v1/search", self.geocoding_url);
        let request = self.client.get(&url).query(&[
            ("name", name),
            ("count", "1"),
            ("language", "en"),
            ("format", "json"),
        ]);

        let response: openmeteo::GeocodingResponse = self.get_json(request).await?;

        Ok(response
            .results
            .unwrap_or_default()
            .into_iter()
            .next()
            .map(|result| Location {
                name: result.name,
                country: result.country,
                latitude: result.latitude,
                longitude: result.longitude,
            }))
    }

    pub async fn current_reading(&self, latitude: f64, longitude: f64) -> Result<Reading, UpstreamError> {
        debug!("Requesting air quality for ({}, {})", latitude, longitude);

        let url = format!("{}/v1/air-quality", self.air_quality_url);
        let request = self.client.get(&url).query(&[
            ("latitude", latitude.to_string()),
            ("longitude", longitude.to_string()),
            ("current", CURRENT_VARIABLES.to_string()),
            ("timezone", "auto".to_string()),
        ]);

        let response: openmeteo::AirQualityResponse = self.get_json(request).await?;
        Ok(response.into_reading())
    }

    async fn get_json<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T, UpstreamError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let reason = serde_json::from_str::<openmeteo::ErrorResponse>(&body)
                .map(|e| e.reason)
                .unwrap_or_else(|_| body.chars().take(MAX_REASON_LEN).collect());
            return Err(UpstreamError::Status { status, reason });
        }

        serde_json::from_str(&body).map_err(|e| UpstreamError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl AirQualitySource for AirQualityClient {
    async fn fetch(&self, query: &LocationQuery) -> Result<AirQualityReport, LookupError> {
        let location = self.resolve(query).await?;
        let reading = self
            .current_reading(location.latitude, location.longitude)
            .await?;

        Ok(AirQualityReport { location, reading })
    }
}

/// Open-Meteo wire formats
mod openmeteo {
    use super::Reading;
    use chrono::NaiveDateTime;
    use serde::Deserialize;
    use std::collections::HashMap;
    use tracing::{debug, warn};

    const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M";

    #[derive(Debug, Deserialize)]
    pub struct GeocodingResponse {
        pub results: Option<Vec<GeocodingResult>>,
    }

    #[derive(Debug, Deserialize)]
    pub struct GeocodingResult {
        pub name: String,
        pub latitude: f64,
        pub longitude: f64,
        pub country: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    pub struct AirQualityResponse {
        #[serde(default)]
        pub current_units: HashMap<String, String>,
        pub current: Option<CurrentAirQuality>,
    }

    #[derive(Debug, Deserialize)]
    pub struct CurrentAirQuality {
        pub time: Option<String>,
        pub european_aqi: Option<f64>,
        pub pm10: Option<f64>,
        pub pm2_5: Option<f64>,
        pub carbon_monoxide: Option<f64>,
        pub nitrogen_dioxide: Option<f64>,
    }

    /// Body Open-Meteo sends alongside 4xx responses.
    #[derive(Debug, Deserialize)]
    pub struct ErrorResponse {
        pub reason: String,
    }

    impl AirQualityResponse {
        pub fn into_reading(self) -> Reading {
            let Some(current) = self.current else {
                debug!("Air quality response has no current block");
                return Reading {
                    units: self.current_units,
                    ..Reading::default()
                };
            };

            let observed_at = current.time.as_deref().and_then(|t| {
                NaiveDateTime::parse_from_str(t, TIME_FORMAT)
                    .map_err(|e| debug!("Unparsable observation time {:?}: {}", t, e))
                    .ok()
            });

            Reading {
                european_aqi: concentration("european_aqi", current.european_aqi),
                pm10: concentration("pm10", current.pm10),
                pm2_5: concentration("pm2_5", current.pm2_5),
                carbon_monoxide: concentration("carbon_monoxide", current.carbon_monoxide),
                nitrogen_dioxide: concentration("nitrogen_dioxide", current.nitrogen_dioxide),
                observed_at,
                units: self.current_units,
            }
        }
    }

    /// Concentrations are non-negative; anything else is treated as missing.
    fn concentration(field: &str, value: Option<f64>) -> Option<f64> {
        match value {
            Some(v) if v.is_finite() && v >= 0.0 => Some(v),
            Some(v) => {
                warn!("Dropping invalid {} value from upstream: {}", field, v);
                None
            }
            None => None,
        }
    }
}
