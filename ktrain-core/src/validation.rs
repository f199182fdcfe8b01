//! Input validation
//!
//! Everything here runs before the dispatcher talks to the cluster, so a
//! malformed request is rejected synchronously and never produces an object.

use std::path::{Component, Path};

use thiserror::Error;

/// Maximum length of a Kubernetes label value.
pub const MAX_LABEL_VALUE_LENGTH: usize = 63;

/// Maximum length of a DNS-1123 subdomain (Secret and ConfigMap names).
pub const MAX_SUBDOMAIN_LENGTH: usize = 253;

/// Maximum length of a data reference URI.
pub const MAX_REFERENCE_LENGTH: usize = 1024;

/// Limits on per-request runtime arguments.
pub const MAX_EXTRA_ARGS: usize = 32;
pub const MAX_EXTRA_ARG_LENGTH: usize = 1024;

/// Rejections for malformed requests or out-of-bounds values
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("field '{0}' cannot be empty")]
    EmptyField(String),

    #[error("field '{field}' exceeds maximum length of {max}")]
    MaxLengthExceeded { field: String, max: usize },

    #[error("invalid project id '{0}': must be a valid label value")]
    InvalidProjectId(String),

    #[error("resource '{resource}' must be positive")]
    NonPositiveResource { resource: String },

    #[error("resource '{resource}' value {value} exceeds ceiling {ceiling}")]
    ResourceCeilingExceeded {
        resource: String,
        value: u32,
        ceiling: u32,
    },

    #[error("invalid image reference: {0}")]
    InvalidImage(String),

    #[error("invalid runtime argument {index}: {reason}")]
    InvalidArgument { index: usize, reason: String },
}

/// Malformed references to external data or credentials
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceError {
    #[error("data reference is empty")]
    EmptyDataReference,

    #[error("malformed data reference '{reference}': {reason}")]
    MalformedDataReference { reference: String, reason: String },

    #[error("malformed credential reference '{reference}': {reason}")]
    MalformedCredential { reference: String, reason: String },
}

/// Validate a project id.
///
/// Project ids are attached as label values, so they follow the label value
/// grammar: alphanumerics, `-`, `_`, `.`, starting and ending alphanumeric.
pub fn validate_project_id(project_id: &str) -> Result<(), ValidationError> {
    if project_id.is_empty() {
        return Err(ValidationError::EmptyField("project_id".to_string()));
    }

    if project_id.len() > MAX_LABEL_VALUE_LENGTH {
        return Err(ValidationError::MaxLengthExceeded {
            field: "project_id".to_string(),
            max: MAX_LABEL_VALUE_LENGTH,
        });
    }

    if !is_label_value(project_id) {
        return Err(ValidationError::InvalidProjectId(project_id.to_string()));
    }

    Ok(())
}

/// Check the label value grammar (length is checked by callers).
pub fn is_label_value(value: &str) -> bool {
    let bytes = value.as_bytes();
    let (Some(first), Some(last)) = (bytes.first(), bytes.last()) else {
        return false;
    };

    first.is_ascii_alphanumeric()
        && last.is_ascii_alphanumeric()
        && bytes
            .iter()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
}

/// Check the DNS-1123 label grammar: lowercase alphanumerics and `-`,
/// starting and ending alphanumeric, at most 63 characters.
pub fn is_dns_label(value: &str) -> bool {
    let bytes = value.as_bytes();
    if bytes.is_empty() || bytes.len() > MAX_LABEL_VALUE_LENGTH {
        return false;
    }

    let edge_ok = |b: &u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    edge_ok(&bytes[0])
        && edge_ok(&bytes[bytes.len() - 1])
        && bytes
            .iter()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
}

/// Check the DNS-1123 subdomain grammar used for Secret names.
pub fn is_dns_subdomain(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= MAX_SUBDOMAIN_LENGTH
        && value.split('.').all(is_dns_label)
}

/// Validate a data reference such as `s3://bucket/dataset/v1`.
///
/// The reference must carry a scheme and a non-empty location, and may not
/// contain whitespace, control characters or `..` path segments.
pub fn validate_data_reference(reference: &str) -> Result<(), ReferenceError> {
    if reference.is_empty() {
        return Err(ReferenceError::EmptyDataReference);
    }

    let malformed = |reason: &str| ReferenceError::MalformedDataReference {
        reference: reference.to_string(),
        reason: reason.to_string(),
    };

    if reference.len() > MAX_REFERENCE_LENGTH {
        return Err(malformed("too long"));
    }

    if reference
        .chars()
        .any(|c| c.is_whitespace() || c.is_control())
    {
        return Err(malformed("contains whitespace or control characters"));
    }

    let Some((scheme, location)) = reference.split_once("://") else {
        return Err(malformed("missing scheme"));
    };

    let scheme_ok = scheme
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    if !scheme_ok {
        return Err(malformed("invalid scheme"));
    }

    if location.is_empty() {
        return Err(malformed("missing location"));
    }

    if Path::new(location)
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(malformed("contains '..' segment"));
    }

    Ok(())
}

/// Validate extra runtime arguments.
///
/// They are passed to the container as an argv list, never through a
/// shell, so only size and control characters are restricted.
pub fn validate_extra_args(args: &[String]) -> Result<(), ValidationError> {
    if args.len() > MAX_EXTRA_ARGS {
        return Err(ValidationError::MaxLengthExceeded {
            field: "extra_args".to_string(),
            max: MAX_EXTRA_ARGS,
        });
    }

    for (index, arg) in args.iter().enumerate() {
        let invalid = |reason: &str| ValidationError::InvalidArgument {
            index,
            reason: reason.to_string(),
        };
        if arg.is_empty() {
            return Err(invalid("empty"));
        }
        if arg.len() > MAX_EXTRA_ARG_LENGTH {
            return Err(invalid("too long"));
        }
        if arg.chars().any(char::is_control) {
            return Err(invalid("contains control characters"));
        }
    }

    Ok(())
}

/// Validate a container image reference.
pub fn validate_image(image: &str) -> Result<(), ValidationError> {
    if image.is_empty() {
        return Err(ValidationError::EmptyField("image".to_string()));
    }

    if image.len() > MAX_SUBDOMAIN_LENGTH {
        return Err(ValidationError::MaxLengthExceeded {
            field: "image".to_string(),
            max: MAX_SUBDOMAIN_LENGTH,
        });
    }

    if let Some(ch) = image
        .chars()
        .find(|c| c.is_whitespace() || c.is_control() || ";&|`$(){}<>".contains(*c))
    {
        return Err(ValidationError::InvalidImage(format!(
            "contains forbidden character {:?}",
            ch
        )));
    }

    if image.starts_with(['-', '.', '/']) {
        return Err(ValidationError::InvalidImage(
            "must start with an alphanumeric character".to_string(),
        ));
    }

    Ok(())
}
