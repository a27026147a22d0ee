//! Identifier utilities for attempt tracking
//!
//! Attempt counters are keyed by identifiers derived from user input. Emails
//! are normalized so that case and surrounding whitespace never split one
//! account across several counters; client fingerprints (IP addresses) are
//! bucketed through a cheap rolling hash so raw addresses are never stored.

/// Normalize an email address for use as a tracking key.
///
/// No validation is performed: an empty or malformed string simply becomes
/// its own identifier.
///
/// # Example
/// ```
/// use tm_shared::utils::identifier::normalize_email;
///
/// assert_eq!(normalize_email("  Abuser@Test.COM "), "abuser@test.com");
/// ```
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Deterministic, non-cryptographic rolling hash of a client fingerprint.
///
/// Computes `hash = hash * 31 + unit` over the UTF-16 code units of the input
/// with 32-bit wrapping arithmetic, takes the absolute value and renders it as
/// lowercase hex. Collisions are acceptable: the result is an abuse-deterrence
/// bucket, not a security boundary.
///
/// # Example
/// ```
/// use tm_shared::utils::identifier::generate_simple_hash;
///
/// assert_eq!(generate_simple_hash("hello"), "5e918d2");
/// ```
pub fn generate_simple_hash(input: &str) -> String {
    let hash = input
        .encode_utf16()
        .fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(i32::from(unit)));

    // i32::MIN has no positive i32 counterpart
    format!("{:x}", i64::from(hash).unsigned_abs())
}

/// Build the composite key used by the rate limiter: `category_identifier`
pub fn rate_limit_key(category: &str, identifier: &str) -> String {
    format!("{}_{}", category, identifier)
}
