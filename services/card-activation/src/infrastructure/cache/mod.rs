//! 失败计数存储

mod cache_attempt_throttle;
mod in_memory_attempt_throttle;

pub use cache_attempt_throttle::*;
pub use in_memory_attempt_throttle::*;
