//! Core identifier types shared by the gateway, the processor and the
//! metrics sink.

pub mod ids;

pub use ids::{DeliveryId, InvalidSha, RepoId, Sha};
