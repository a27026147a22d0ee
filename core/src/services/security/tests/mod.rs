//! Tests for the security services

mod lockout_tests;
