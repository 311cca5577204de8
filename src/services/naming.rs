//! Bucket-name validation, checked before any registry or provider I/O.
//!
//! Amazon uses DNS-style rules. Google also allows underscores, and dotted
//! names up to 222 characters as long as every dot-separated part fits in
//! 63. Azure container names are stricter: no dots and no consecutive
//! hyphens.

use crate::{errors::ObjectStoreError, models::Provider};

const BUCKET_NAME_MIN_LEN: usize = 3;
const BUCKET_NAME_MAX_LEN: usize = 63;
const GOOGLE_DOTTED_NAME_MAX_LEN: usize = 222;

fn invalid(name: &str, reason: &str) -> ObjectStoreError {
    ObjectStoreError::InvalidBucketName {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

/// Validate a bucket name for `provider`.
///
/// - 3–63 characters (Google: up to 222 when dotted)
/// - lowercase letters, digits, hyphens, dots (not on Azure), underscores
///   (Google only)
/// - must start and end with a letter or digit
/// - no consecutive dots or dot-hyphen combinations
/// - must not look like an IPv4 address
pub fn validate_bucket_name(provider: Provider, name: &str) -> Result<(), ObjectStoreError> {
    let len = name.len();
    let dotted_google = provider == Provider::Google && name.contains('.');
    let max_len = if dotted_google {
        GOOGLE_DOTTED_NAME_MAX_LEN
    } else {
        BUCKET_NAME_MAX_LEN
    };
    if !(BUCKET_NAME_MIN_LEN..=max_len).contains(&len) {
        return Err(invalid(
            name,
            &format!("must be between {BUCKET_NAME_MIN_LEN} and {max_len} characters"),
        ));
    }
    if dotted_google && name.split('.').any(|part| part.len() > BUCKET_NAME_MAX_LEN) {
        return Err(invalid(name, "each dot-separated part must be at most 63 characters"));
    }

    let (dots, underscores, allowed) = match provider {
        Provider::Amazon => (
            true,
            false,
            "allowed characters are lowercase letters, digits, dots, and hyphens",
        ),
        Provider::Google => (
            true,
            true,
            "allowed characters are lowercase letters, digits, dots, hyphens, and underscores",
        ),
        Provider::Azure => (
            false,
            false,
            "allowed characters are lowercase letters, digits, and hyphens",
        ),
    };
    if !name.chars().all(|c| {
        matches!(c, 'a'..='z' | '0'..='9' | '-') || (dots && c == '.') || (underscores && c == '_')
    }) {
        return Err(invalid(name, allowed));
    }

    if name.starts_with(['.', '-', '_']) || name.ends_with(['.', '-', '_']) {
        return Err(invalid(name, "must start and end with a lowercase letter or digit"));
    }

    if name.contains("..") || name.contains("-.") || name.contains(".-") {
        return Err(invalid(
            name,
            "cannot contain consecutive dots or dot-hyphen combinations",
        ));
    }

    if provider == Provider::Azure && name.contains("--") {
        return Err(invalid(name, "cannot contain consecutive hyphens"));
    }

    if is_ipv4_like(name) {
        return Err(invalid(name, "must not be formatted like an IP address"));
    }

    Ok(())
}

/// Check if a string matches IPv4-like dotted decimal form.
fn is_ipv4_like(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() == 4
        && parts.iter().all(|segment| {
            !segment.is_empty()
                && segment.len() <= 3
                && segment.chars().all(|c| c.is_ascii_digit())
                && segment.parse::<u8>().is_ok()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_typical_names() {
        for name in ["test-bucket-1", "logs.example.com", "abc"] {
            validate_bucket_name(Provider::Amazon, name).unwrap();
        }
        validate_bucket_name(Provider::Azure, "invoices-2024").unwrap();
    }

    #[test]
    fn rejects_malformed_names() {
        for name in ["ab", "Upper", "-lead", "trail.", "a..b", "a.-b", "192.168.0.1", "under_score"] {
            assert!(
                matches!(
                    validate_bucket_name(Provider::Amazon, name),
                    Err(ObjectStoreError::InvalidBucketName { .. })
                ),
                "{name} should be rejected"
            );
        }
    }

    #[test]
    fn google_allows_underscores_and_long_dotted_names() {
        validate_bucket_name(Provider::Google, "under_score").unwrap();

        let dotted = ["a".repeat(63), "b".repeat(63), "c".repeat(63)].join(".");
        assert_eq!(dotted.len(), 191);
        validate_bucket_name(Provider::Google, &dotted).unwrap();
        assert!(validate_bucket_name(Provider::Amazon, &dotted).is_err());

        let long_part = format!("{}.example", "a".repeat(64));
        assert!(validate_bucket_name(Provider::Google, &long_part).is_err());
        assert!(validate_bucket_name(Provider::Google, &"a".repeat(64)).is_err());
        assert!(validate_bucket_name(Provider::Google, "_leading").is_err());
    }

    #[test]
    fn azure_forbids_dots_and_double_hyphens() {
        assert!(validate_bucket_name(Provider::Azure, "logs.example").is_err());
        assert!(validate_bucket_name(Provider::Azure, "logs--2024").is_err());
        assert!(validate_bucket_name(Provider::Amazon, "logs--2024").is_ok());
    }
}
