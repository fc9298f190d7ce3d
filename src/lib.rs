//! CI latency exporter - derives continuous-integration latency metrics from
//! GitHub webhooks.
//!
//! Pull request, push and status deliveries are decoded into updates and fed,
//! in order, to a single event processor that tracks "live" commit SHAs and
//! reports how long CI takes to notice, validate and build them.

pub mod config;
pub mod events;
pub mod matcher;
pub mod metrics;
pub mod processor;
pub mod server;
pub mod types;
pub mod webhooks;

#[cfg(test)]
pub mod test_utils;
