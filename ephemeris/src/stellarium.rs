//! Stellarium remote-control provider.
//!
//! Talks to a running Stellarium instance through its remote-control plugin.
//! `GET /api/objects/info?name=<obj>&format=json` answers with a JSON blob
//! whose `altitude` and `azimuth` fields are the apparent position, in
//! degrees, for the location Stellarium itself is configured with.

use serde::Deserialize;
use tracing::debug;

use crate::{
    EphemerisError, EphemerisProvider, HorizontalCoordinates, ObserverLocation, Result,
    DEFAULT_SITE,
};

/// Default address of the Stellarium remote-control plugin.
pub const DEFAULT_STELLARIUM_URL: &str = "http://localhost:8090";

/// The two fields of Stellarium's object-info response we care about.
#[derive(Debug, Deserialize)]
struct ObjectInfo {
    altitude: f64,
    azimuth: f64,
}

/// Position provider backed by Stellarium's remote-control API.
pub struct StellariumProvider {
    base_url: String,
    site: ObserverLocation,
}

impl StellariumProvider {
    /// Provider for the instance at `base_url`, e.g. `http://localhost:8090`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            site: DEFAULT_SITE,
        }
    }

    /// Provider for a Stellarium instance on this machine.
    pub fn local() -> Self {
        Self::new(DEFAULT_STELLARIUM_URL)
    }

    /// Site Stellarium is expected to be configured for.
    pub fn site(&self) -> ObserverLocation {
        self.site
    }
}

impl EphemerisProvider for StellariumProvider {
    fn apparent_position(&self, name: &str) -> Result<HorizontalCoordinates> {
        let url = format!(
            "{}/api/objects/info?name={}&format=json",
            self.base_url,
            name.replace(' ', "%20")
        );
        debug!("querying {url}");

        let response = match ureq::get(&url).call() {
            Ok(response) => response,
            // Stellarium answers 404 with "object name not found".
            Err(ureq::Error::StatusCode(404)) => {
                return Err(EphemerisError::ObjectNotFound {
                    name: name.to_string(),
                })
            }
            Err(ureq::Error::StatusCode(code)) => {
                return Err(EphemerisError::ServiceUnreachable(format!(
                    "HTTP {code} from {url}"
                )))
            }
            Err(err) => return Err(EphemerisError::ServiceUnreachable(err.to_string())),
        };

        let info: ObjectInfo = response
            .into_body()
            .read_json()
            .map_err(|e| EphemerisError::MalformedResponse(e.to_string()))?;

        debug!(
            "{name}: altitude {:.4}°, azimuth {:.4}°",
            info.altitude, info.azimuth
        );
        Ok(HorizontalCoordinates::new(info.altitude, info.azimuth))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_info_parses_the_fields_we_need() {
        // Stellarium sends dozens of fields; everything else is ignored.
        let raw = r#"{
            "above-horizon": true,
            "altitude": 42.576,
            "azimuth": 211.103,
            "name": "Jupiter",
            "vmag": -2.1
        }"#;
        let info: ObjectInfo = serde_json::from_str(raw).unwrap();
        assert_eq!(info.altitude, 42.576);
        assert_eq!(info.azimuth, 211.103);
    }

    #[test]
    fn provider_defaults_to_the_observatory_site() {
        let provider = StellariumProvider::local();
        assert_eq!(provider.site().latitude_deg, DEFAULT_SITE.latitude_deg);
    }
}
