//! Node configuration.
//!
//! The core itself takes no tuning knobs; what a node must configure is the
//! profile it advertises to its peers: display name, the address joiners
//! connect to for snapshot transfers, and the protocol version range it can
//! speak. Everything else (timeouts, transport addresses) belongs to the
//! layers around the core.
//!
//! # Environment Variables
//!
//! - `QUORATE_NODE_NAME`: display name (default: empty)
//! - `QUORATE_NODE_ADDRESS`: incoming address for state transfers
//! - `QUORATE_PROTO_MIN` / `QUORATE_PROTO_MAX`: protocol version range

use serde::Deserialize;

use crate::constants::{MEMBER_ADDR_MAX, MEMBER_NAME_MAX};
use crate::error::{Error, Result};
use crate::types::ProtoVersion;

/// The profile a node advertises in its state descriptors.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NodeConfig {
    /// Human-readable node name, shown in logs and membership actions.
    pub name: String,
    /// Address peers use to push a state snapshot to this node.
    pub incoming_address: String,
    /// Lowest group protocol version this node can speak.
    pub proto_min: i16,
    /// Highest group protocol version this node can speak.
    pub proto_max: i16,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            name: String::new(),
            incoming_address: String::new(),
            proto_min: 0,
            proto_max: 0,
        }
    }
}

impl NodeConfig {
    /// Build a configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        let mut config = NodeConfig::default();

        if let Ok(name) = std::env::var("QUORATE_NODE_NAME") {
            config.name = name;
        }
        if let Ok(addr) = std::env::var("QUORATE_NODE_ADDRESS") {
            config.incoming_address = addr;
        }
        if let Ok(raw) = std::env::var("QUORATE_PROTO_MIN") {
            config.proto_min = raw
                .parse()
                .map_err(|_| Error::Config(format!("invalid QUORATE_PROTO_MIN: {raw}")))?;
        }
        if let Ok(raw) = std::env::var("QUORATE_PROTO_MAX") {
            config.proto_max = raw
                .parse()
                .map_err(|_| Error::Config(format!("invalid QUORATE_PROTO_MAX: {raw}")))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the profile against the wire limits.
    pub fn validate(&self) -> Result<()> {
        if self.name.len() >= MEMBER_NAME_MAX || self.name.as_bytes().contains(&0) {
            return Err(Error::Config(format!(
                "node name exceeds {} bytes or contains NUL",
                MEMBER_NAME_MAX - 1
            )));
        }
        if self.incoming_address.len() >= MEMBER_ADDR_MAX
            || self.incoming_address.as_bytes().contains(&0)
        {
            return Err(Error::Config(format!(
                "incoming address exceeds {} bytes or contains NUL",
                MEMBER_ADDR_MAX - 1
            )));
        }
        if self.proto_min > self.proto_max {
            return Err(Error::Config(format!(
                "proto_min {} exceeds proto_max {}",
                self.proto_min, self.proto_max
            )));
        }
        Ok(())
    }

    #[inline]
    pub fn proto_min(&self) -> ProtoVersion {
        ProtoVersion::new(self.proto_min)
    }

    #[inline]
    pub fn proto_max(&self) -> ProtoVersion {
        ProtoVersion::new(self.proto_max)
    }
}
