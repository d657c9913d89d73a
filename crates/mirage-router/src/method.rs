//! HTTP method vocabulary.
//!
//! Routes declare their methods as text. A declaration may name several
//! methods joined by commas (`"get,post"`), and tokens are case-insensitive.
//! Besides the standard methods the vocabulary includes `PURGE`, which
//! `http::Method` only knows as an extension method.

use http::Method;

use crate::error::{RouterError, RouterResult};

/// Every supported method token, upper case.
pub const KNOWN_METHODS: [&str; 10] = [
    "GET", "POST", "PUT", "DELETE", "PATCH", "OPTIONS", "HEAD", "CONNECT", "PURGE", "TRACE",
];

/// Parses a single method token.
///
/// # Errors
///
/// Returns [`RouterError::UnknownMethod`] for tokens outside
/// [`KNOWN_METHODS`].
///
/// # Example
///
/// ```rust
/// use mirage_router::parse_method;
/// use http::Method;
///
/// assert_eq!(parse_method("get").unwrap(), Method::GET);
/// assert_eq!(parse_method("Purge").unwrap().as_str(), "PURGE");
/// assert!(parse_method("FETCH").is_err());
/// ```
pub fn parse_method(token: &str) -> RouterResult<Method> {
    let upper = token.trim().to_ascii_uppercase();
    if !KNOWN_METHODS.contains(&upper.as_str()) {
        return Err(RouterError::UnknownMethod {
            token: token.trim().to_string(),
        });
    }
    Method::from_bytes(upper.as_bytes()).map_err(|_| RouterError::UnknownMethod {
        token: token.trim().to_string(),
    })
}

/// Parses a comma-joined method list such as `"get, post"`.
///
/// Duplicate tokens are collapsed, first occurrence wins the position.
///
/// # Errors
///
/// Returns [`RouterError::EmptyMethod`] when no token is present and
/// [`RouterError::UnknownMethod`] for the first unknown token.
pub fn parse_methods(list: &str) -> RouterResult<Vec<Method>> {
    let mut methods: Vec<Method> = Vec::new();
    for token in list.split(',').filter(|t| !t.trim().is_empty()) {
        let method = parse_method(token)?;
        if !methods.contains(&method) {
            methods.push(method);
        }
    }
    if methods.is_empty() {
        return Err(RouterError::EmptyMethod);
    }
    Ok(methods)
}

/// Returns `true` if `token` is a supported method, in any case.
#[must_use]
pub fn is_known_method(token: &str) -> bool {
    parse_method(token).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_standard_methods() {
        assert_eq!(parse_method("GET").unwrap(), Method::GET);
        assert_eq!(parse_method("post").unwrap(), Method::POST);
        assert_eq!(parse_method(" Delete ").unwrap(), Method::DELETE);
        assert_eq!(parse_method("options").unwrap(), Method::OPTIONS);
    }

    #[test]
    fn test_parse_purge() {
        let purge = parse_method("purge").unwrap();
        assert_eq!(purge.as_str(), "PURGE");
        assert_eq!(purge, Method::from_bytes(b"PURGE").unwrap());
    }

    #[test]
    fn test_unknown_method() {
        assert_eq!(
            parse_method("FETCH"),
            Err(RouterError::UnknownMethod {
                token: "FETCH".into()
            })
        );
    }

    #[test]
    fn test_parse_methods_list() {
        let methods = parse_methods("get,POST, put").unwrap();
        assert_eq!(methods, vec![Method::GET, Method::POST, Method::PUT]);
    }

    #[test]
    fn test_parse_methods_collapses_duplicates() {
        let methods = parse_methods("get,GET").unwrap();
        assert_eq!(methods, vec![Method::GET]);
    }

    #[test]
    fn test_parse_methods_errors() {
        assert_eq!(parse_methods(""), Err(RouterError::EmptyMethod));
        assert_eq!(parse_methods(" , "), Err(RouterError::EmptyMethod));
        assert!(matches!(
            parse_methods("get,bogus"),
            Err(RouterError::UnknownMethod { token }) if token == "bogus"
        ));
    }

    #[test]
    fn test_every_known_method_parses() {
        for token in KNOWN_METHODS {
            assert!(is_known_method(token), "{token}");
            assert!(is_known_method(&token.to_lowercase()), "{token}");
        }
    }
}
