//! Pool module - concurrent processing of several input files.

mod worker;

pub use worker::*;
