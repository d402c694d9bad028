//! Pull-request review assignment backend.
//!
//! The crate is organised as ports and adapters: `domain` holds the
//! pull-request engine, its entities and the ports it drives; `outbound`
//! holds the in-memory and PostgreSQL adapters implementing those ports.

pub mod config;
pub mod domain;
pub mod outbound;
pub mod telemetry;
pub mod wiring;

pub use config::ServiceSettings;
pub use domain::{Error, ErrorCode, PullRequestService, RequestContext};
