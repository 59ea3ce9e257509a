//! Zero-cost abstractions over `std` for TrogonStack projects.
//!
//! # Quick Start
//!
//! | Concern | Trait(s) | Production | Test |
//! |---------|----------|------------|------|
//! | Env vars | [`ReadEnv`] | [`SystemEnv`] | [`InMemoryEnv`]* |
//! | Wall clock | [`GetNow`] | [`SystemClock`] | [`MockClock`]* |
//!
//! *Available with `#[cfg(test)]` or the `"test-support"` feature.
//!
//! # Thread Safety
//!
//! [`SystemEnv`] and [`SystemClock`] are zero-sized and trivially
//! `Send + Sync`. [`MockClock`] is `Arc<Mutex<…>>` backed and `Send + Sync`;
//! [`InMemoryEnv`] is `RefCell` backed and is not.

pub mod env;
pub mod time;

pub use env::{ReadEnv, SystemEnv, read_list};
#[cfg(any(test, feature = "test-support"))]
pub use env::InMemoryEnv;
pub use time::{GetNow, SystemClock};
#[cfg(any(test, feature = "test-support"))]
pub use time::MockClock;
