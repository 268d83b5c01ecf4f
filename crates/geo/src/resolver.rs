//! Commune lookup against geo.api.gouv.fr.

use patriflora_model::AdministrativeContext;
use serde::Deserialize;
use thiserror::Error;

/// Errors from the administrative lookup.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("administrative lookup request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("administrative lookup returned HTTP {0}")]
    Status(u16),

    #[error("no administrative unit found at {latitude}, {longitude}")]
    NoAdministrativeUnit { latitude: f64, longitude: f64 },
}

/// geo.api.gouv.fr client configuration.
#[derive(Debug, Clone)]
pub struct GeoApiConfig {
    /// Base URL for the geographic API
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for GeoApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://geo.api.gouv.fr".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Commune {
    departement: Option<AdminUnit>,
    region: Option<AdminUnit>,
}

#[derive(Debug, Deserialize)]
struct AdminUnit {
    code: String,
    #[serde(default)]
    #[allow(dead_code)]
    nom: String,
}

/// Resolves a coordinate to its department and region codes.
pub struct AdminResolver {
    config: GeoApiConfig,
    client: reqwest::Client,
}

impl AdminResolver {
    pub fn new(config: GeoApiConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    /// Resolve the enclosing department and region for one point.
    ///
    /// Offshore points and points outside France return
    /// `LookupError::NoAdministrativeUnit`.
    pub async fn resolve(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<AdministrativeContext, LookupError> {
        tracing::debug!(latitude, longitude, "Resolving administrative context");

        let response = self
            .client
            .get(format!("{}/communes", self.config.base_url))
            .query(&[
                ("lat", latitude.to_string()),
                ("lon", longitude.to_string()),
                ("fields", "departement,region".to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(LookupError::Status(response.status().as_u16()));
        }

        let communes: Vec<Commune> = response.json().await?;
        let commune = communes
            .into_iter()
            .next()
            .ok_or(LookupError::NoAdministrativeUnit {
                latitude,
                longitude,
            })?;

        match (commune.departement, commune.region) {
            (Some(departement), Some(region)) => Ok(AdministrativeContext {
                department_code: departement.code,
                region_code: region.code,
            }),
            _ => Err(LookupError::NoAdministrativeUnit {
                latitude,
                longitude,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commune_deserialization() {
        let json = r#"[{
            "nom": "Strasbourg",
            "code": "67482",
            "departement": {"code": "67", "nom": "Bas-Rhin"},
            "region": {"code": "44", "nom": "Grand Est"}
        }]"#;
        let communes: Vec<Commune> = serde_json::from_str(json).unwrap();
        let commune = &communes[0];
        assert_eq!(commune.departement.as_ref().unwrap().code, "67");
        assert_eq!(commune.region.as_ref().unwrap().code, "44");
    }

    #[test]
    fn test_empty_lookup_is_not_a_context() {
        let communes: Vec<Commune> = serde_json::from_str("[]").unwrap();
        assert!(communes.is_empty());
    }
}
