//! Tests for the login flow

mod service_tests;
