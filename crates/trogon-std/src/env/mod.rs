//! Environment variable access behind a trait, so configuration can be
//! resolved from a map in tests instead of the process environment.
//!
//! # Examples
//!
//! ```
//! use trogon_std::env::{ReadEnv, SystemEnv};
//!
//! fn listen_port<E: ReadEnv>(env: &E) -> u16 {
//!     env.var("PORT")
//!         .ok()
//!         .and_then(|p| p.parse().ok())
//!         .unwrap_or(8080)
//! }
//!
//! let port = listen_port(&SystemEnv);
//! ```
//!
//! ```ignore
//! use trogon_std::env::{ReadEnv, InMemoryEnv};
//!
//! let env = InMemoryEnv::new();
//! env.set("PORT", "9090"); // &self, no `mut` needed
//!
//! assert_eq!(listen_port(&env), 9090);
//! ```

mod in_memory;
mod read_env;
mod system;

#[cfg(any(test, feature = "test-support"))]
pub use in_memory::InMemoryEnv;
pub use read_env::{ReadEnv, read_list};
pub use system::SystemEnv;
