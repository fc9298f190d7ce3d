//! The event processor.
//!
//! A sequential state machine over a table of "live" commit SHAs. Pull
//! request and branch updates decide which SHAs are live; commit statuses on
//! live SHAs produce latency observations:
//!
//! ```text
//!   PR opened / branch pushed          first pending          terminal status
//!   ───────────●───────────────────────────●──────────────────────●──────────►
//!              │◄──── ci_noticed ─────────►│                      │
//!              │◄────────────────── validation ──────────────────►│
//!                                          │◄──── build_done ────►│
//! ```
//!
//! [`EventProcessor`] is synchronous and owns its table outright.
//! [`spawn_processor`] moves it onto a tokio task behind a bounded queue so
//! that concurrent producers are serialized in submission order.

mod engine;
mod live;
mod worker;


pub use engine::EventProcessor;
pub use live::{LiveCommitState, LiveShaTable};
pub use worker::{DEFAULT_QUEUE_CAPACITY, ProcessorHandle, SubmitError, spawn_processor};
