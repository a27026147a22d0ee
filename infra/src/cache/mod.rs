//! Cache module for Redis-backed attempt counters
//!
//! This module provides the Redis client (connection and operation retry) and
//! the `CounterStore` implementation the security services persist through.

pub mod redis_client;
pub mod redis_counter_store;

#[cfg(test)]
mod tests;

pub use redis_client::RedisClient;
pub use redis_counter_store::RedisCounterStore;

// Re-export commonly used types
pub use tm_shared::config::CacheConfig;
