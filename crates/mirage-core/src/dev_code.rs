//! Developer status codes.
//!
//! A dev code is the internal diagnostic code carried by every response
//! envelope. Its full form is `<class><digits>-<http status>`, for example
//! `f00103-404`. The first character classifies the code:
//!
//! | Prefix | Meaning |
//! |--------|---------|
//! | `f` | failure |
//! | `s` | success |
//! | `m` | informational message |
//!
//! The part after the `-` is the HTTP status sent to the client. Parsing
//! rejects codes without a separator or with a non-numeric status, so a
//! malformed code fails where it is constructed rather than when the
//! response is written.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Errors raised while parsing a dev code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DevCodeError {
    /// The code has no `-` separating the code part from the HTTP status.
    #[error("Dev code error: '{code}' has no '-' separator")]
    MissingSeparator {
        /// The raw code.
        code: String,
    },

    /// The code part before the separator is empty.
    #[error("Dev code error: '{code}' has an empty code segment")]
    EmptyCode {
        /// The raw code.
        code: String,
    },

    /// The HTTP status segment is not a number in `100..=999`.
    #[error("Dev code error: '{code}' has an invalid http status '{status}'")]
    InvalidStatus {
        /// The raw code.
        code: String,
        /// The offending status segment.
        status: String,
    },
}

/// Classification of a dev code by its first character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DevCodeKind {
    /// `f` prefixed codes.
    Failure,
    /// `s` prefixed codes.
    Success,
    /// `m` prefixed codes.
    Message,
    /// Anything else.
    Other,
}

/// A parsed dev code.
///
/// # Example
///
/// ```
/// use mirage_core::DevCode;
///
/// let code: DevCode = "f00103-404".parse().unwrap();
/// assert_eq!(code.code(), "f00103");
/// assert_eq!(code.http_code(), 404);
/// assert!(code.is_failure());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DevCode {
    code: String,
    http_code: u16,
}

impl DevCode {
    /// Parses a full dev code such as `s00000-200`.
    pub fn parse(raw: &str) -> Result<Self, DevCodeError> {
        let Some((code, status)) = raw.split_once('-') else {
            return Err(DevCodeError::MissingSeparator {
                code: raw.to_string(),
            });
        };

        if code.is_empty() {
            return Err(DevCodeError::EmptyCode {
                code: raw.to_string(),
            });
        }

        let http_code = status
            .parse::<u16>()
            .ok()
            .filter(|c| (100..=999).contains(c))
            .ok_or_else(|| DevCodeError::InvalidStatus {
                code: raw.to_string(),
                status: status.to_string(),
            })?;

        Ok(Self {
            code: code.to_string(),
            http_code,
        })
    }

    /// The `s00000-200` success code.
    #[must_use]
    pub fn success() -> Self {
        Self::known("s00000", 200)
    }

    // Builds a code from parts already known to be valid.
    pub(crate) fn known(code: &str, http_code: u16) -> Self {
        Self {
            code: code.to_string(),
            http_code,
        }
    }

    /// Returns the code part, without the HTTP status suffix.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Returns the HTTP status derived from the suffix.
    #[must_use]
    pub const fn http_code(&self) -> u16 {
        self.http_code
    }

    /// Returns the classification of this code.
    #[must_use]
    pub fn kind(&self) -> DevCodeKind {
        match self.code.as_bytes().first() {
            Some(b'f') => DevCodeKind::Failure,
            Some(b's') => DevCodeKind::Success,
            Some(b'm') => DevCodeKind::Message,
            _ => DevCodeKind::Other,
        }
    }

    /// Returns `true` if the code starts with `f`.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.kind() == DevCodeKind::Failure
    }
}

impl FromStr for DevCode {
    type Err = DevCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for DevCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.code, self.http_code)
    }
}

/// Well-known dev codes used by the framework.
pub mod codes {
    /// Success.
    pub const SUCCESS: &str = "s00000-200";
    /// Informational message.
    pub const MESSAGE: &str = "m00000-200";

    /// Unclassified server failure.
    pub const GENERAL_ERROR: &str = "f00000-500";
    /// A named service could not be resolved.
    pub const SERVICE_UNAVAILABLE: &str = "f00001-500";

    /// Unclassified request failure.
    pub const REQUEST_ERROR: &str = "f00100-400";
    /// The request is malformed.
    pub const REQUEST_INVALID: &str = "f00101-400";
    /// A required parameter is missing.
    pub const REQUEST_MISS_PARAM: &str = "f00102-400";
    /// No route matches the request.
    pub const REQUEST_NOT_FOUND: &str = "f00103-404";
    /// Request integrity headers are missing.
    pub const REQUEST_HASH_MISSING: &str = "f00104-400";
    /// Request integrity hash does not match.
    pub const REQUEST_HASH_INVALID: &str = "f00105-400";
    /// Request integrity timestamp is outside the allowed skew.
    pub const REQUEST_HASH_EXPIRED: &str = "f00106-400";

    /// Unclassified response failure.
    pub const RESPONSE_ERROR: &str = "f00200-500";
    /// A response could not be built.
    pub const RESPONSE_INVALID: &str = "f00201-500";

    /// Unknown database failure.
    pub const DB_UNKNOWN: &str = "f00300-500";
    /// Database save failure.
    pub const DB_SAVE: &str = "f00301-500";

    /// Unknown authentication failure.
    pub const AUTH_UNKNOWN: &str = "f00400-401";
    /// Wrong username or password.
    pub const AUTH_INVALID_CREDENTIALS: &str = "f00401-401";
    /// The account type may not log in.
    pub const AUTH_INVALID_ACCOUNT_TYPE: &str = "f00402-401";
    /// Login failed.
    pub const AUTH_LOGIN_FAILED: &str = "f00403-401";
    /// No auth token was found.
    pub const AUTH_TOKEN_NOT_FOUND: &str = "f00404-401";
    /// The token could not be decoded.
    pub const AUTH_JWT_INVALID: &str = "f00405-401";
    /// The token has expired.
    pub const AUTH_JWT_EXPIRED: &str = "f00406-401";
    /// The token signature does not verify.
    pub const AUTH_JWT_SIGNATURE_INVALID: &str = "f00407-401";
    /// The token is not valid yet.
    pub const AUTH_JWT_BEFORE_VALID: &str = "f00408-401";
    /// The auth header is present but blank.
    pub const AUTH_HEADER_EMPTY: &str = "f00409-401";
    /// The auth header is absent.
    pub const AUTH_HEADER_NOT_FOUND: &str = "f00410-401";
    /// The token failed a post-decode validation.
    pub const AUTH_JWT_AFTER_VALID: &str = "f00411-401";
    /// The token payload is not a claims object.
    pub const AUTH_JWT_INVALID_PAYLOAD: &str = "f00412-401";
    /// No signing key is configured.
    pub const AUTH_JWT_HASH_KEY_NOT_EXIST: &str = "f00415-500";

    /// The caller's role may not access this route.
    pub const ACL_ACCESS_DENIED: &str = "f00500-403";
    /// The caller's claims carry no role.
    pub const ACL_ROLE_NOT_FOUND: &str = "f00501-403";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_not_found() {
        let code = DevCode::parse(codes::REQUEST_NOT_FOUND).unwrap();
        assert_eq!(code.code(), "f00103");
        assert_eq!(code.http_code(), 404);
        assert_eq!(code.kind(), DevCodeKind::Failure);
        assert_eq!(code.to_string(), "f00103-404");
    }

    #[test]
    fn test_parse_success() {
        let code: DevCode = "s00000-200".parse().unwrap();
        assert!(!code.is_failure());
        assert_eq!(code.kind(), DevCodeKind::Success);
    }

    #[test]
    fn test_message_kind() {
        let code = DevCode::parse(codes::MESSAGE).unwrap();
        assert_eq!(code.kind(), DevCodeKind::Message);
    }

    #[test]
    fn test_missing_separator() {
        let err = DevCode::parse("f00103").unwrap_err();
        assert!(matches!(err, DevCodeError::MissingSeparator { .. }));
    }

    #[test]
    fn test_non_numeric_status() {
        let err = DevCode::parse("f00103-abc").unwrap_err();
        assert!(matches!(err, DevCodeError::InvalidStatus { ref status, .. } if status == "abc"));
    }

    #[test]
    fn test_status_out_of_range() {
        assert!(DevCode::parse("f00103-42").is_err());
        assert!(DevCode::parse("f00103-1000").is_err());
    }

    #[test]
    fn test_empty_code_segment() {
        assert!(matches!(
            DevCode::parse("-404"),
            Err(DevCodeError::EmptyCode { .. })
        ));
    }

    #[test]
    fn test_all_catalogue_codes_parse() {
        for raw in [
            codes::SUCCESS,
            codes::GENERAL_ERROR,
            codes::SERVICE_UNAVAILABLE,
            codes::REQUEST_MISS_PARAM,
            codes::REQUEST_HASH_EXPIRED,
            codes::RESPONSE_INVALID,
            codes::AUTH_INVALID_CREDENTIALS,
            codes::AUTH_JWT_HASH_KEY_NOT_EXIST,
            codes::ACL_ROLE_NOT_FOUND,
        ] {
            assert!(DevCode::parse(raw).is_ok(), "{raw} should parse");
        }
    }
}
