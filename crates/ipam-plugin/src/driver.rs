//! The backend seam: everything that actually allocates lives behind [`Driver`].

use std::sync::Arc;

use async_trait::async_trait;

use crate::api::{
    AddressReleaseRequest, AddressRequest, AddressResponse, AddressSpacesResponse,
    CapabilitiesResponse, PoolReleaseRequest, PoolRequest, PoolResponse,
};

/// Failure reported by a driver. Only the message reaches the daemon.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct DriverError {
    message: String,
}

impl DriverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for DriverError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for DriverError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<std::io::Error> for DriverError {
    fn from(err: std::io::Error) -> Self {
        Self::new(err.to_string())
    }
}

impl From<anyhow::Error> for DriverError {
    fn from(err: anyhow::Error) -> Self {
        // Alternate form keeps the context chain: "outer: inner".
        Self::new(format!("{err:#}"))
    }
}

pub type DriverResult<T> = Result<T, DriverError>;

/// IPAM backend supplied by the integrator.
///
/// Calls may arrive concurrently; the handler does no locking, so any
/// consistency guarantee (e.g. never handing out an address twice) is the
/// driver's job.
#[async_trait]
pub trait Driver: Send + Sync {
    async fn get_capabilities(&self) -> DriverResult<CapabilitiesResponse>;

    async fn request_pool(&self, req: PoolRequest) -> DriverResult<PoolResponse>;

    async fn release_pool(&self, req: PoolReleaseRequest) -> DriverResult<()>;

    async fn request_address(&self, req: AddressRequest) -> DriverResult<AddressResponse>;

    async fn release_address(&self, req: AddressReleaseRequest) -> DriverResult<()>;

    async fn get_default_address_spaces(&self) -> DriverResult<AddressSpacesResponse>;
}

macro_rules! forward_driver {
    ($ty:ty) => {
        #[async_trait]
        impl<D: Driver + ?Sized> Driver for $ty {
            async fn get_capabilities(&self) -> DriverResult<CapabilitiesResponse> {
                (**self).get_capabilities().await
            }

            async fn request_pool(&self, req: PoolRequest) -> DriverResult<PoolResponse> {
                (**self).request_pool(req).await
            }

            async fn release_pool(&self, req: PoolReleaseRequest) -> DriverResult<()> {
                (**self).release_pool(req).await
            }

            async fn request_address(&self, req: AddressRequest) -> DriverResult<AddressResponse> {
                (**self).request_address(req).await
            }

            async fn release_address(&self, req: AddressReleaseRequest) -> DriverResult<()> {
                (**self).release_address(req).await
            }

            async fn get_default_address_spaces(&self) -> DriverResult<AddressSpacesResponse> {
                (**self).get_default_address_spaces().await
            }
        }
    };
}

forward_driver!(Arc<D>);
forward_driver!(Box<D>);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingDriver {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Driver for CountingDriver {
        async fn get_capabilities(&self) -> DriverResult<CapabilitiesResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(CapabilitiesResponse {
                requires_mac_address: true,
            })
        }

        async fn request_pool(&self, req: PoolRequest) -> DriverResult<PoolResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(PoolResponse {
                pool_id: format!("{}/{}", req.address_space, req.pool),
                pool: req.pool,
                data: None,
            })
        }

        async fn release_pool(&self, _req: PoolReleaseRequest) -> DriverResult<()> {
            Err("pool in use".into())
        }

        async fn request_address(&self, _req: AddressRequest) -> DriverResult<AddressResponse> {
            Err(DriverError::new("pool exhausted"))
        }

        async fn release_address(&self, _req: AddressReleaseRequest) -> DriverResult<()> {
            Ok(())
        }

        async fn get_default_address_spaces(&self) -> DriverResult<AddressSpacesResponse> {
            Ok(AddressSpacesResponse::default())
        }
    }

    #[test]
    fn driver_error_display_is_message() {
        let err = DriverError::new("I CAN HAZ ERRORZ");
        assert_eq!(err.to_string(), "I CAN HAZ ERRORZ");
        assert_eq!(err.message(), "I CAN HAZ ERRORZ");
    }

    #[test]
    fn driver_error_from_anyhow_keeps_context() {
        let inner = std::io::Error::new(std::io::ErrorKind::NotFound, "state file missing");
        let err: DriverError = anyhow::Error::new(inner).context("loading pools").into();
        assert_eq!(err.message(), "loading pools: state file missing");
    }

    #[test]
    fn driver_error_from_io() {
        let err: DriverError =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into();
        assert_eq!(err.message(), "denied");
    }

    #[tokio::test]
    async fn arc_and_box_forward_to_inner_driver() {
        let inner = Arc::new(CountingDriver::default());

        let shared: Arc<dyn Driver> = Arc::new(Arc::clone(&inner));
        let caps = shared.get_capabilities().await.unwrap();
        assert!(caps.requires_mac_address);

        let boxed: Box<dyn Driver> = Box::new(Arc::clone(&inner));
        let pool = boxed
            .request_pool(PoolRequest {
                address_space: "local".to_string(),
                pool: "10.0.0.0/24".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(pool.pool_id, "local/10.0.0.0/24");
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);

        let err = boxed
            .release_pool(PoolReleaseRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.message(), "pool in use");
        assert!(boxed.release_address(AddressReleaseRequest::default()).await.is_ok());
        assert!(boxed.request_address(AddressRequest::default()).await.is_err());
        assert_eq!(
            boxed.get_default_address_spaces().await.unwrap(),
            AddressSpacesResponse::default()
        );
    }
}
