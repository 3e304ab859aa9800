//! HTTP client for the tracker API that keeps token pairs per session and
//! refreshes them at most once at a time per session.

mod session;
pub mod single_flight;

pub use session::{ClientError, SessionClient, SessionTokens};
pub use single_flight::SingleFlight;
