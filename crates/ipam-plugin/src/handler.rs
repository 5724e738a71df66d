//! IpamHandler: transport-agnostic dispatch from plugin routes to a [`Driver`].
//!
//! The handler owns no mutable state. Each call decodes its body, invokes one
//! driver operation and encodes the result. Transports (HTTP over TCP or a
//! UNIX socket) only move bytes in and out.

use std::sync::Arc;

use serde::Serialize;

use crate::api::{
    AddressReleaseRequest, AddressRequest, ErrorResponse, PoolReleaseRequest, PoolRequest,
    WireRequest, decode_request,
};
use crate::codec::{JsonLines, PluginReply};
use crate::driver::{Driver, DriverResult};
use crate::protocol::IpamRoute;

/// How a driver error is written on routes that return a value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorEncoding {
    /// Write only `{"Err":...}`.
    #[default]
    ShortCircuit,
    /// Write `{"Err":...}` followed by `null` on GetCapabilities, RequestPool,
    /// RequestAddress and GetDefaultAddressSpaces, for peers that expect the
    /// historical double-written body. Release routes are unaffected.
    Legacy,
}

pub struct IpamHandler {
    driver: Arc<dyn Driver>,
    error_encoding: ErrorEncoding,
}

impl IpamHandler {
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self {
            driver,
            error_encoding: ErrorEncoding::default(),
        }
    }

    pub fn with_error_encoding(mut self, error_encoding: ErrorEncoding) -> Self {
        self.error_encoding = error_encoding;
        self
    }

    pub fn error_encoding(&self) -> ErrorEncoding {
        self.error_encoding
    }

    /// Discovery reply; does not touch the driver.
    pub fn activate(&self) -> PluginReply {
        PluginReply::manifest()
    }

    /// Run one IPAM route against the driver.
    ///
    /// `body` is ignored by GetCapabilities and GetDefaultAddressSpaces.
    pub async fn handle(&self, route: IpamRoute, body: &[u8]) -> PluginReply {
        tracing::debug!(route = %route, body_len = body.len(), "Dispatching IPAM call");

        match route {
            IpamRoute::GetCapabilities => {
                let result = self.driver.get_capabilities().await;
                self.reply(route, result)
            }
            IpamRoute::RequestPool => {
                let Some(req) = decode::<PoolRequest>(route, body) else {
                    return PluginReply::Malformed;
                };
                let result = self.driver.request_pool(req).await;
                self.reply(route, result)
            }
            IpamRoute::ReleasePool => {
                let Some(req) = decode::<PoolReleaseRequest>(route, body) else {
                    return PluginReply::Malformed;
                };
                let result = self.driver.release_pool(req).await;
                self.reply(route, result.map(|()| serde_json::Map::new()))
            }
            IpamRoute::RequestAddress => {
                let Some(req) = decode::<AddressRequest>(route, body) else {
                    return PluginReply::Malformed;
                };
                let result = self.driver.request_address(req).await;
                self.reply(route, result)
            }
            IpamRoute::ReleaseAddress => {
                let Some(req) = decode::<AddressReleaseRequest>(route, body) else {
                    return PluginReply::Malformed;
                };
                let result = self.driver.release_address(req).await;
                self.reply(route, result.map(|()| serde_json::Map::new()))
            }
            IpamRoute::GetDefaultAddressSpaces => {
                let result = self.driver.get_default_address_spaces().await;
                self.reply(route, result)
            }
        }
    }

    fn reply<T: Serialize>(&self, route: IpamRoute, result: DriverResult<T>) -> PluginReply {
        let mut lines = JsonLines::new();
        let written = match result {
            Ok(value) => lines.push(&value),
            Err(err) => {
                tracing::info!(route = %route, error = %err, "Driver returned error");
                lines.push(&ErrorResponse::new(err.message())).and_then(|()| {
                    if self.error_encoding == ErrorEncoding::Legacy && !route.is_release() {
                        lines.push(&Option::<T>::None)
                    } else {
                        Ok(())
                    }
                })
            }
        };

        match written {
            Ok(()) => lines.finish(),
            Err(e) => {
                tracing::error!(route = %route, error = %e, "Failed to encode driver response");
                PluginReply::EncodeFailed
            }
        }
    }
}

fn decode<T: WireRequest>(route: IpamRoute, body: &[u8]) -> Option<T> {
    match decode_request(body) {
        Ok(req) => Some(req),
        Err(e) => {
            tracing::warn!(route = %route, error = %e, "Dropping malformed request body");
            None
        }
    }
}
