//! Tests for counter store implementations
