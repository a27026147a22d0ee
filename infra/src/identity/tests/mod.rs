//! Tests for identity provider clients
