use crate::config::GeolocationConfig;
use crate::error::AppError;
use crate::models::LocationRecord;
use crate::services::{ensure_success, http_client, Geolocator};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{info, instrument};
use url::Url;

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Two-step lookup: discover the public IP, then geolocate it.
pub struct IpGeolocator {
    client: reqwest::Client,
    api_key: Option<String>,
    ip_lookup_url: String,
    lookup_url: String,
}

impl IpGeolocator {
    pub fn new(config: &GeolocationConfig) -> Self {
        Self {
            client: http_client(LOOKUP_TIMEOUT),
            api_key: config.api_key.clone(),
            ip_lookup_url: config.ip_lookup_url.clone(),
            lookup_url: config.lookup_url.clone(),
        }
    }

    async fn public_ip(&self) -> Result<String, AppError> {
        let response = self.client.get(&self.ip_lookup_url).send().await?;
        let ip = ensure_success(response, "IP lookup").await?.text().await?;
        let ip = ip.trim().to_string();
        if ip.is_empty() {
            return Err(AppError::Validation("IP lookup returned an empty body".to_string()));
        }
        Ok(ip)
    }
}

#[async_trait]
impl Geolocator for IpGeolocator {
    #[instrument(skip(self))]
    async fn locate(&self) -> Result<LocationRecord, AppError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::Config("GEOLOCATION_API_KEY is not set".to_string()))?;

        let ip = self.public_ip().await?;
        let url = Url::parse_with_params(
            &self.lookup_url,
            &[("accessKey", api_key), ("ip", ip.as_str())],
        )?;

        let response = self.client.get(url).send().await?;
        let location: LocationRecord = ensure_success(response, "Geolocation")
            .await?
            .json()
            .await?;
        info!("Geolocation fetched for {}", location.ip);
        Ok(location)
    }
}
