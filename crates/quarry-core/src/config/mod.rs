//! Configuration for the serving endpoint, query defaults and parser policy.

pub mod loader;
pub mod types;


pub use loader::ConfigLoader;
pub use types::*;
