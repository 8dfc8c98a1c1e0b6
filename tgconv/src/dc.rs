//! Production datacenter table.

use std::fmt;

/// Port every production DC listens on.
pub const DEFAULT_PORT: u16 = 443;

/// A DC's network endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Endpoint {
    pub host: &'static str,
    pub port: u16,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

const DATACENTERS: [(i64, Endpoint); 5] = [
    (1, Endpoint { host: "149.154.175.53",  port: DEFAULT_PORT }),
    (2, Endpoint { host: "149.154.167.51",  port: DEFAULT_PORT }),
    (3, Endpoint { host: "149.154.175.100", port: DEFAULT_PORT }),
    (4, Endpoint { host: "149.154.167.91",  port: DEFAULT_PORT }),
    (5, Endpoint { host: "91.108.56.130",   port: DEFAULT_PORT }),
];

/// The DC id is not one of the five production datacenters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown datacenter {0} (expected 1-5)")]
pub struct UnknownDatacenter(pub i64);

/// Look up the endpoint of a production DC.
pub fn endpoint_for(dc_id: i64) -> Result<Endpoint, UnknownDatacenter> {
    DATACENTERS
        .iter()
        .find(|(id, _)| *id == dc_id)
        .map(|(_, ep)| *ep)
        .ok_or(UnknownDatacenter(dc_id))
}

/// `true` for DC ids 1 through 5.
pub fn is_known(dc_id: i64) -> bool {
    endpoint_for(dc_id).is_ok()
}

/// All production DCs in id order.
pub fn all() -> impl Iterator<Item = (i64, Endpoint)> {
    DATACENTERS.into_iter()
}
