//! # Package Name Validation
//!
//! npm package name rules as applied to packages that may have been published
//! before the modern naming rules existed. Names that only produce warnings
//! under those rules (uppercase letters, names longer than 214 characters,
//! names of Node core modules) are accepted; anything that would be an error
//! is rejected.
//!
//! ```rust
//! use vm_registry_gateway::validation::validate_package_name;
//!
//! assert!(validate_package_name("left-pad").is_ok());
//! assert!(validate_package_name("@babel/core").is_ok());
//! assert!(validate_package_name(".hidden").is_err());
//! ```

use once_cell::sync::Lazy;
use regex::Regex;

/// Names npm refuses outright, compared case-insensitively.
const BLACKLISTED_NAMES: &[&str] = &["node_modules", "favicon.ico"];

/// Characters left untouched by `encodeURIComponent`.
static URL_FRIENDLY_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9\-_.!~*'()]+$")
        .expect("URL-friendly name regex should compile - this is a static pattern")
});

/// Scoped names: `@scope/name`.
static SCOPED_NAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^@([^/]+)/([^/]+)$")
        .expect("Scoped name regex should compile - this is a static pattern")
});

/// Error types for validation failures
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Package name cannot be empty")]
    Empty,

    #[error("Package name cannot start with '{0}'")]
    LeadingCharacter(char),

    #[error("Package name cannot contain leading or trailing spaces")]
    SurroundingWhitespace,

    #[error("Package name is blacklisted: {name}")]
    Blacklisted { name: String },

    #[error("Package name can only contain URL-friendly characters: {name}")]
    NotUrlFriendly { name: String },
}

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validate a decoded package name.
pub fn validate_package_name(name: &str) -> ValidationResult<()> {
    if name.is_empty() {
        return Err(ValidationError::Empty);
    }

    if let Some(first @ ('.' | '_')) = name.chars().next() {
        return Err(ValidationError::LeadingCharacter(first));
    }

    if name.trim() != name {
        return Err(ValidationError::SurroundingWhitespace);
    }

    let lowered = name.to_lowercase();
    if BLACKLISTED_NAMES.contains(&lowered.as_str()) {
        return Err(ValidationError::Blacklisted {
            name: name.to_string(),
        });
    }

    if is_url_friendly(name) {
        return Ok(());
    }

    // `@scope/name` is fine as long as each half is URL-friendly on its own.
    if let Some(captures) = SCOPED_NAME_REGEX.captures(name) {
        if is_url_friendly(&captures[1]) && is_url_friendly(&captures[2]) {
            return Ok(());
        }
    }

    Err(ValidationError::NotUrlFriendly {
        name: name.to_string(),
    })
}

fn is_url_friendly(segment: &str) -> bool {
    URL_FRIENDLY_REGEX.is_match(segment)
}
