use async_trait::async_trait;
use reqwest::{header, Client};
use serde::Deserialize;
use url::Url;

use super::{Coordinates, GeoError};

/// Free-text address search. `Ok(None)` means the service answered but found
/// nothing; errors are transport or protocol failures and may be retried.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn search(&self, query: &str) -> Result<Option<Coordinates>, GeoError>;
}

#[derive(Clone)]
pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
    user_agent: String,
}

#[derive(Debug, Deserialize)]
struct Place {
    lat: String,
    lon: String,
}

impl NominatimGeocoder {
    pub fn new(client: Client, base_url: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            user_agent: user_agent.into(),
        }
    }

    fn search_url(&self, query: &str) -> Result<Url, GeoError> {
        let endpoint = format!("{}/search", self.base_url.trim_end_matches('/'));
        Ok(Url::parse_with_params(
            &endpoint,
            &[
                ("format", "json"),
                ("q", query),
                ("limit", "1"),
                ("countrycodes", "ca"),
            ],
        )?)
    }
}

fn parse_places(places: Vec<Place>) -> Result<Option<Coordinates>, GeoError> {
    let Some(place) = places.into_iter().next() else {
        return Ok(None);
    };
    let lat = place
        .lat
        .parse::<f64>()
        .map_err(|_| GeoError::InvalidResponse(format!("latitude {:?}", place.lat)))?;
    let lng = place
        .lon
        .parse::<f64>()
        .map_err(|_| GeoError::InvalidResponse(format!("longitude {:?}", place.lon)))?;
    Ok(Some(Coordinates::new(lat, lng)))
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn search(&self, query: &str) -> Result<Option<Coordinates>, GeoError> {
        let url = self.search_url(query)?;
        let response = self
            .client
            .get(url)
            .header(header::USER_AGENT, &self.user_agent)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GeoError::Status(response.status().as_u16()));
        }

        let places: Vec<Place> = response
            .json()
            .await
            .map_err(|err| GeoError::InvalidResponse(err.to_string()))?;
        parse_places(places)
    }
}
