use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use super::{Coordinates, GeoError};

#[async_trait]
pub trait RouteService: Send + Sync {
    async fn driving_distance_km(
        &self,
        from: Coordinates,
        to: Coordinates,
    ) -> Result<Option<f64>, GeoError>;
}

#[derive(Clone)]
pub struct OsrmRouter {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct RouteResponse {
    code: String,
    #[serde(default)]
    routes: Vec<Route>,
}

#[derive(Debug, Deserialize)]
struct Route {
    distance: f64,
}

impl OsrmRouter {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn route_url(&self, from: Coordinates, to: Coordinates) -> Result<Url, GeoError> {
        let raw = format!(
            "{}/route/v1/driving/{},{};{},{}?overview=false",
            self.base_url.trim_end_matches('/'),
            from.lng,
            from.lat,
            to.lng,
            to.lat
        );
        Ok(Url::parse(&raw)?)
    }
}

fn distance_from(response: RouteResponse) -> Option<f64> {
    if response.code != "Ok" {
        return None;
    }
    response
        .routes
        .first()
        .map(|route| route.distance / 1000.0)
}

#[async_trait]
impl RouteService for OsrmRouter {
    async fn driving_distance_km(
        &self,
        from: Coordinates,
        to: Coordinates,
    ) -> Result<Option<f64>, GeoError> {
        let url = self.route_url(from, to)?;
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(GeoError::Status(response.status().as_u16()));
        }
        let body: RouteResponse = response
            .json()
            .await
            .map_err(|err| GeoError::InvalidResponse(err.to_string()))?;
        Ok(distance_from(body))
    }
}
