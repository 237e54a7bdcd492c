//! Helpers shared by the integration tests. Not every test binary uses all
//! of them.
#![allow(dead_code, unused_imports)]

pub mod shared_buffer;

pub mod fixtures;

pub use fixtures::{Collector, collector};
pub use shared_buffer::{SharedBuf, read_output};
