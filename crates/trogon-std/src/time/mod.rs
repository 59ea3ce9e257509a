//! Wall-clock access behind a trait.
//!
//! # Examples
//!
//! ```
//! use trogon_std::time::{GetNow, SystemClock};
//!
//! fn stamp<C: GetNow>(clock: &C) -> C::Instant {
//!     clock.now()
//! }
//!
//! let when = stamp(&SystemClock);
//! ```
//!
//! ```ignore
//! use trogon_std::time::{GetNow, MockClock};
//! use chrono::{TimeZone, Utc};
//!
//! let clock = MockClock::at(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
//! assert_eq!(clock.now(), clock.now()); // time only moves when told to
//! ```

mod get_now;
mod mock;
mod system;

pub use get_now::GetNow;
#[cfg(any(test, feature = "test-support"))]
pub use mock::MockClock;
pub use system::SystemClock;
