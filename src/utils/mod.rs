pub mod checksum;
pub mod rate_limiter;

pub use checksum::payload_digest;
pub use rate_limiter::RateLimiter;
