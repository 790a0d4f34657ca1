//! Run control: admission, failure monitoring and cancellation.

mod circuit_breaker;
mod rate_limiter;
mod shutdown;

pub use circuit_breaker::*;
pub use rate_limiter::*;
pub use shutdown::*;
