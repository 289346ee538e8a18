//! Cube Connection Module
//!
//! Handles connecting, GATT service discovery and the baseline read of
//! the cube state characteristic.

use crate::domain::settings::Settings;
use crate::infrastructure::bluetooth::protocol;
use crate::infrastructure::bluetooth::session::SessionError;
use crate::infrastructure::bluetooth::transport::{CharacteristicId, GattService, Transport};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// Configuration for connection behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Service holding the state characteristic
    pub state_service: Uuid,
    /// Service holding the info characteristics
    pub info_service: Uuid,
    /// State characteristic (read + notify)
    pub state_response: Uuid,
    /// Info response characteristic (notify)
    pub info_response: Uuid,
    /// Info request characteristic (write)
    pub info_request: Uuid,
    /// Optional bound on battery / move count requests
    pub info_request_timeout: Option<Duration>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            state_service: protocol::CUBE_STATE_SERVICE,
            info_service: protocol::CUBE_INFO_SERVICE,
            state_response: protocol::CUBE_STATE_RESPONSE,
            info_response: protocol::CUBE_INFO_RESPONSE,
            info_request: protocol::CUBE_INFO_REQUEST,
            info_request_timeout: None,
        }
    }
}

impl ConnectionConfig {
    /// Build the connection configuration from persisted settings
    pub fn from_settings(settings: &Settings) -> Result<Self, SessionError> {
        Ok(Self {
            state_service: parse_uuid(&settings.state_service_uuid)?,
            info_service: parse_uuid(&settings.info_service_uuid)?,
            state_response: parse_uuid(&settings.state_response_uuid)?,
            info_response: parse_uuid(&settings.info_response_uuid)?,
            info_request: parse_uuid(&settings.info_request_uuid)?,
            info_request_timeout: settings.info_request_timeout_ms.map(Duration::from_millis),
        })
    }
}

fn parse_uuid(value: &str) -> Result<Uuid, SessionError> {
    Uuid::parse_str(value).map_err(|_| SessionError::InvalidIdentifier(value.to_string()))
}

/// Characteristics the session talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CubeChannels {
    pub state_response: CharacteristicId,
    pub info_response: CharacteristicId,
    pub info_request: CharacteristicId,
}

/// Result of a successful connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionResult {
    pub channels: CubeChannels,
    /// Raw value of the state characteristic read right after discovery
    pub baseline: Vec<u8>,
}

/// Connection handler
pub struct CubeConnection<'a> {
    config: &'a ConnectionConfig,
}

impl<'a> CubeConnection<'a> {
    /// Create a new connection handler
    pub fn new(config: &'a ConnectionConfig) -> Self {
        Self { config }
    }

    /// Open the link to the cube
    pub async fn open<T: Transport>(&self, transport: &mut T) -> Result<(), SessionError> {
        info!("Connecting to cube...");
        transport.connect().await?;
        Ok(())
    }

    /// Locate the cube's characteristics and read the baseline state
    pub async fn discover<T: Transport>(
        &self,
        transport: &mut T,
    ) -> Result<ConnectionResult, SessionError> {
        // Step 1: Get GATT services and characteristics
        let services = transport.discover_services().await?;
        info!("Found {} services", services.len());
        let channels = self.locate_channels(&services)?;

        // Step 2: Read the current state before any notification arrives
        let baseline = transport.read(channels.state_response).await?;
        debug!("Baseline state read ({} bytes)", baseline.len());

        Ok(ConnectionResult { channels, baseline })
    }

    /// Find the three required characteristics within the discovered services
    pub fn locate_channels(&self, services: &[GattService]) -> Result<CubeChannels, SessionError> {
        let state_service = find_service(services, self.config.state_service)?;
        let info_service = find_service(services, self.config.info_service)?;

        Ok(CubeChannels {
            state_response: find_characteristic(state_service, self.config.state_response)?,
            info_response: find_characteristic(info_service, self.config.info_response)?,
            info_request: find_characteristic(info_service, self.config.info_request)?,
        })
    }
}

fn find_service(services: &[GattService], uuid: Uuid) -> Result<&GattService, SessionError> {
    services
        .iter()
        .find(|s| s.uuid == uuid)
        .ok_or(SessionError::ServiceNotFound(uuid))
}

fn find_characteristic(
    service: &GattService,
    uuid: Uuid,
) -> Result<CharacteristicId, SessionError> {
    if service.characteristics.contains(&uuid) {
        Ok(CharacteristicId {
            service: service.uuid,
            characteristic: uuid,
        })
    } else {
        Err(SessionError::CharacteristicNotFound(uuid))
    }
}

/// Services as exposed by a Giiker cube
pub fn cube_services(config: &ConnectionConfig) -> Vec<GattService> {
    vec![
        GattService {
            uuid: config.state_service,
            characteristics: vec![config.state_response],
        },
        GattService {
            uuid: config.info_service,
            characteristics: vec![config.info_response, config.info_request],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_protocol_constants() {
        let config = ConnectionConfig::from_settings(&Settings::default()).unwrap();
        assert_eq!(config, ConnectionConfig::default());
        assert_eq!(config.state_response, protocol::CUBE_STATE_RESPONSE);
        assert_eq!(
            Settings::default().info_request_uuid,
            "0000aaac-0000-1000-8000-00805f9b34fb"
        );
    }

    #[test]
    fn test_timeout_from_settings() {
        let settings = Settings {
            info_request_timeout_ms: Some(1500),
            ..Settings::default()
        };
        let config = ConnectionConfig::from_settings(&settings).unwrap();
        assert_eq!(config.info_request_timeout, Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_invalid_identifier() {
        let settings = Settings {
            info_request_uuid: "not-a-uuid".to_string(),
            ..Settings::default()
        };
        assert!(matches!(
            ConnectionConfig::from_settings(&settings),
            Err(SessionError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_locate_channels() {
        let config = ConnectionConfig::default();
        let channels = CubeConnection::new(&config)
            .locate_channels(&cube_services(&config))
            .unwrap();
        assert_eq!(channels.state_response.service, config.state_service);
        assert_eq!(channels.info_request.service, config.info_service);
        assert_eq!(channels.info_response.characteristic, config.info_response);
    }

    #[test]
    fn test_missing_service_and_characteristic() {
        let config = ConnectionConfig::default();
        let connection = CubeConnection::new(&config);

        let mut services = cube_services(&config);
        services.remove(1);
        assert_eq!(
            connection.locate_channels(&services),
            Err(SessionError::ServiceNotFound(config.info_service))
        );

        let mut services = cube_services(&config);
        services[1].characteristics.retain(|c| *c != config.info_request);
        assert_eq!(
            connection.locate_channels(&services),
            Err(SessionError::CharacteristicNotFound(config.info_request))
        );
    }
}
