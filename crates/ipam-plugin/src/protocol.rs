//! Fixed protocol surface: discovery manifest, content type and route table.

/// Content type of every plugin response (plugin protocol v1.1).
pub const PLUGIN_CONTENT_TYPE: &str = "application/vnd.docker.plugins.v1.1+json";

/// Discovery endpoint queried by the daemon before any IPAM call.
pub const ACTIVATE_PATH: &str = "/Plugin.Activate";

/// Literal body of the discovery endpoint.
pub const MANIFEST: &str = r#"{"Implements": ["IpamDriver"]}"#;

/// The six IPAM operations and their URL paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpamRoute {
    GetCapabilities,
    RequestPool,
    ReleasePool,
    RequestAddress,
    ReleaseAddress,
    GetDefaultAddressSpaces,
}

impl IpamRoute {
    pub const ALL: [IpamRoute; 6] = [
        IpamRoute::GetCapabilities,
        IpamRoute::RequestPool,
        IpamRoute::ReleasePool,
        IpamRoute::RequestAddress,
        IpamRoute::ReleaseAddress,
        IpamRoute::GetDefaultAddressSpaces,
    ];

    pub const fn path(self) -> &'static str {
        match self {
            IpamRoute::GetCapabilities => "/IpamDriver.GetCapabilities",
            IpamRoute::RequestPool => "/IpamDriver.RequestPool",
            IpamRoute::ReleasePool => "/IpamDriver.ReleasePool",
            IpamRoute::RequestAddress => "/IpamDriver.RequestAddress",
            IpamRoute::ReleaseAddress => "/IpamDriver.ReleaseAddress",
            IpamRoute::GetDefaultAddressSpaces => "/IpamDriver.GetDefaultAddressSpaces",
        }
    }

    /// Operation name as it appears in the path, used in logs.
    pub fn name(self) -> &'static str {
        &self.path()["/IpamDriver.".len()..]
    }

    pub fn from_path(path: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|route| route.path() == path)
    }

    /// Release routes answer `{}` on success and never double-write on error.
    pub const fn is_release(self) -> bool {
        matches!(self, IpamRoute::ReleasePool | IpamRoute::ReleaseAddress)
    }
}

impl std::fmt::Display for IpamRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
