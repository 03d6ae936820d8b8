#![forbid(unsafe_code)]

pub mod model;
pub mod time;

pub use time::{Clock, FIXED_TEST_TIMESTAMP, fixed_clock, fixed_now};
