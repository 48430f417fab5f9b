//! Gateways resolve a content address to a fetchable URL.

use veridian_core::{SourceAddress, SourceOrigin};

use crate::error::{Error, Result};

/// Default IPFS gateway prefix (the hash is appended verbatim).
pub const DEFAULT_IPFS_URL: &str = "https://ipfs.infura.io:5001/api/v0/cat?arg=";
/// Default Swarm gateway prefix, serving both `bzzr0` and `bzzr1`.
pub const DEFAULT_SWARM_URL: &str = "https://swarm-gateways.net/bzz-raw:/";

pub trait Gateway: Send + Sync {
    /// Does this gateway serve the given origin?
    fn works_with(&self, origin: SourceOrigin) -> bool;

    /// Deterministic URL for a hash of an origin this gateway serves.
    fn create_url(&self, id: &str) -> String;
}

/// A gateway defined by a set of accepted origins and a URL prefix.
pub struct SimpleGateway {
    origins: Vec<SourceOrigin>,
    base_url: String,
}

impl SimpleGateway {
    pub fn new(origins: Vec<SourceOrigin>, base_url: impl Into<String>) -> Self {
        Self {
            origins,
            base_url: base_url.into(),
        }
    }
}

impl Gateway for SimpleGateway {
    fn works_with(&self, origin: SourceOrigin) -> bool {
        self.origins.contains(&origin)
    }

    fn create_url(&self, id: &str) -> String {
        format!("{}{}", self.base_url, id)
    }
}

/// Ordered gateway registry; the first gateway accepting an origin wins.
pub struct GatewaySet {
    gateways: Vec<Box<dyn Gateway>>,
}

impl GatewaySet {
    pub fn new(gateways: Vec<Box<dyn Gateway>>) -> Self {
        Self { gateways }
    }

    /// The standard registry: IPFS first, then one Swarm gateway for both
    /// `bzzr0` and `bzzr1`.
    pub fn with_defaults(ipfs_url: impl Into<String>, swarm_url: impl Into<String>) -> Self {
        Self::new(vec![
            Box::new(SimpleGateway::new(vec![SourceOrigin::Ipfs], ipfs_url)),
            Box::new(SimpleGateway::new(
                vec![SourceOrigin::Bzzr0, SourceOrigin::Bzzr1],
                swarm_url,
            )),
        ])
    }

    /// Resolve an address to its fetch URL.
    pub fn resolve(&self, address: &SourceAddress) -> Result<String> {
        self.gateways
            .iter()
            .find(|g| g.works_with(address.origin))
            .map(|g| g.create_url(&address.id))
            .ok_or(Error::NoGateway(address.origin))
    }
}

impl Default for GatewaySet {
    fn default() -> Self {
        Self::with_defaults(DEFAULT_IPFS_URL, DEFAULT_SWARM_URL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_gateway() {
        let gateway = SimpleGateway::new(vec![SourceOrigin::Ipfs], "https://gw.example/cat?arg=");
        assert!(gateway.works_with(SourceOrigin::Ipfs));
        assert!(!gateway.works_with(SourceOrigin::Bzzr0));
        assert_eq!(gateway.create_url("QmHash"), "https://gw.example/cat?arg=QmHash");
    }

    #[test]
    fn test_default_set_resolves_all_origins() {
        let set = GatewaySet::default();
        for origin in [SourceOrigin::Ipfs, SourceOrigin::Bzzr0, SourceOrigin::Bzzr1] {
            set.resolve(&SourceAddress::new(origin, "aa")).unwrap();
        }
    }

    #[test]
    fn test_first_match_wins() {
        let set = GatewaySet::new(vec![
            Box::new(SimpleGateway::new(vec![SourceOrigin::Ipfs], "https://first/")),
            Box::new(SimpleGateway::new(vec![SourceOrigin::Ipfs], "https://second/")),
        ]);
        let url = set
            .resolve(&SourceAddress::new(SourceOrigin::Ipfs, "Qm"))
            .unwrap();
        assert_eq!(url, "https://first/Qm");
    }

    #[test]
    fn test_missing_gateway_is_an_error() {
        let set = GatewaySet::new(vec![Box::new(SimpleGateway::new(
            vec![SourceOrigin::Ipfs],
            "https://gw/",
        ))]);
        assert!(matches!(
            set.resolve(&SourceAddress::new(SourceOrigin::Bzzr0, "aa")),
            Err(Error::NoGateway(SourceOrigin::Bzzr0))
        ));
    }
}
