//! # Quorate
//! Group-membership and state-exchange core for synchronously replicated
//! clusters.
//!
//! This crate implements the coordination heart of a multi-master
//! replication engine: the deterministic state machine that, on every node,
//! consumes the totally ordered event stream of a group-communication
//! transport and maintains an identical view of group state on every
//! member — who is in the primary component, which sequence numbers are
//! committed and applied, and which nodes may serve or require a full-state
//! snapshot transfer.
//!
//! # Goals
//! - Deterministic: identical inputs produce bitwise-identical decisions on
//!   every member
//! - Non-blocking: every event handler is a short, run-to-completion step
//! - Easy to embed: one owned [`GroupState`](group::GroupState) aggregate,
//!   no process-wide singletons, no I/O
//!
//! # What it is not
//!
//! The transport (total ordering, failure detection), the commit pipeline
//! downstream of the emitted configuration changes, and the bulk snapshot
//! transfer between donor and joiner are external collaborators. The core
//! only orchestrates their handshake.
//!
//! ## Driving the machine
//!
//! ```rust
//! use quorate::prelude::*;
//!
//! fn main() -> quorate::error::Result<()> {
//!     let config = NodeConfig::default();
//!     let mut group = GroupState::new(config)?;
//!
//!     // the transport delivers a primary component containing only us:
//!     // the group bootstraps and is immediately primary
//!     let comp = ComponentView::new(
//!         true,
//!         0,
//!         vec![MemberId::try_from("node-1")?],
//!     )?;
//!     let phase = group.handle_component(&comp)?;
//!     assert_eq!(phase, Phase::Primary);
//!
//!     // hand the configuration change to the downstream pipeline
//!     let conf = group.conf_change();
//!     assert_eq!(conf.memb_num, 1);
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]

mod encode;
mod parser;

pub mod config;
pub mod constants;
pub mod descriptor;
pub mod donor;
pub mod error;
pub mod group;
pub mod member;
pub mod message;
pub mod quorum;
pub mod telemetry;
pub mod types;

pub mod prelude {
    //! Main exports for embedding the group core.
    pub use crate::config::NodeConfig;
    pub use crate::descriptor::StateDescriptor;
    pub use crate::error::{Error, Result};
    pub use crate::group::{GroupState, Handled, Phase};
    pub use crate::member::{Member, MemberId, MemberStatus};
    pub use crate::message::{
        ComponentView, ConfChange, ConfMember, MessageKind, RecvMessage, RequestOutcome,
        StateRequest,
    };
    pub use crate::quorum::QuorumDecision;
    pub use crate::types::{ProtoVersion, Seqno};

    pub use bytes;
    pub use uuid::Uuid;
}
