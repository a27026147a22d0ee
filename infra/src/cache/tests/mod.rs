//! Tests for the Redis cache layer
