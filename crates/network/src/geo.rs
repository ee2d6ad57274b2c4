//! Location from nearby access points, and coordinates to a city name.

use {
    async_trait::async_trait,
    secrecy::{ExposeSecret, Secret},
    tracing::{debug, info},
};

use crate::{Error, Result, error::Context, wpa::ScannedNetwork};

const GEOLOCATE_URL: &str = "https://www.googleapis.com/geolocation/v1/geolocate";
const GEOCODE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Place {
    pub city: Option<String>,
    pub state: Option<String>,
}

#[async_trait]
pub trait Geolocator: Send + Sync {
    /// Estimate the device position from scanned access points.
    async fn locate(&self, networks: &[ScannedNetwork]) -> Result<Coordinates>;

    async fn reverse_geocode(&self, at: Coordinates) -> Result<Place>;
}

/// [`Geolocator`] backed by the Google Geolocation and Geocoding APIs.
pub struct GoogleGeolocator {
    client: reqwest::Client,
    api_key: Option<Secret<String>>,
    geolocate_url: String,
    geocode_url: String,
}

impl GoogleGeolocator {
    pub fn new(api_key: Option<Secret<String>>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            geolocate_url: GEOLOCATE_URL.into(),
            geocode_url: GEOCODE_URL.into(),
        }
    }

    /// Point both endpoints at `base` (used by tests).
    pub fn with_base_url(mut self, base: &str) -> Self {
        self.geolocate_url = format!("{base}/geolocation/v1/geolocate");
        self.geocode_url = format!("{base}/maps/api/geocode/json");
        self
    }

    fn key(&self) -> Result<&str> {
        self.api_key
            .as_ref()
            .map(|k| k.expose_secret().as_str())
            .filter(|k| !k.is_empty())
            .context("no location API key configured")
    }
}

#[async_trait]
impl Geolocator for GoogleGeolocator {
    async fn locate(&self, networks: &[ScannedNetwork]) -> Result<Coordinates> {
        let body = serde_json::json!({ "wifiAccessPoints": networks });
        let resp: serde_json::Value = self
            .client
            .post(&self.geolocate_url)
            .query(&[("key", self.key()?)])
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let location = &resp["location"];
        let coordinates = match (location["lat"].as_f64(), location["lng"].as_f64()) {
            (Some(latitude), Some(longitude)) => Coordinates {
                latitude,
                longitude,
            },
            _ => return Err(Error::message("geolocation response has no location")),
        };
        info!(
            access_points = networks.len(),
            accuracy = resp["accuracy"].as_f64().unwrap_or_default(),
            "device located"
        );
        Ok(coordinates)
    }

    async fn reverse_geocode(&self, at: Coordinates) -> Result<Place> {
        let latlng = format!("{},{}", at.latitude, at.longitude);
        let resp: serde_json::Value = self
            .client
            .get(&self.geocode_url)
            .query(&[("latlng", latlng.as_str()), ("key", self.key()?)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let place = parse_geocode(&resp);
        debug!(city = ?place.city, state = ?place.state, "reverse geocoded");
        Ok(place)
    }
}

/// City and state from the first geocoding result.
///
/// `locality` names the city; `sublocality_level_1` is used where no
/// locality is given (for example New York boroughs).
fn parse_geocode(resp: &serde_json::Value) -> Place {
    let Some(components) = resp["results"]
        .as_array()
        .and_then(|r| r.first())
        .and_then(|r| r["address_components"].as_array())
    else {
        return Place::default();
    };

    let find = |kind: &str| {
        components
            .iter()
            .find(|c| {
                c["types"]
                    .as_array()
                    .is_some_and(|types| types.iter().any(|t| t.as_str() == Some(kind)))
            })
            .and_then(|c| c["long_name"].as_str())
            .map(ToString::to_string)
    };

    Place {
        city: find("locality").or_else(|| find("sublocality_level_1")),
        state: find("administrative_area_level_1"),
    }
}
