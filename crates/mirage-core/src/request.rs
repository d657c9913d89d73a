//! Request input helpers.
//!
//! Handlers rarely read the body and query separately. [`RequestContext::data`]
//! merges the JSON (or form) body with the query string, and
//! [`RequestContext::get_data`] picks named inputs from it, enforcing the
//! required ones.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use http::header::CONTENT_TYPE;
use http::HeaderMap;
use serde_json::{Map, Value};

use crate::context::RequestContext;
use crate::dev_code::codes;
use crate::error::{ApiError, ApiResult};

/// Prefix marking an input as required in [`RequestContext::get_data`].
pub const REQUIRED_MARKER: char = '*';

/// Returned by [`client_ip`] when no address is known.
pub const UNKNOWN_IP: &str = "UNKNOWN";

// Checked in order by `client_ip`.
const FORWARDING_HEADERS: [&str; 4] = [
    "x-forwarded",
    "x-cluster-client-ip",
    "forwarded-for",
    "forwarded",
];

impl RequestContext {
    /// Returns the merged request inputs.
    ///
    /// The body is read as a JSON object, or as form fields when the
    /// content type is `application/x-www-form-urlencoded`. Query string
    /// values are layered on top and win on conflicts. A body that is not
    /// an object contributes nothing.
    #[must_use]
    pub fn data(&self) -> Map<String, Value> {
        let mut data = self.body_fields();
        if let Some(query) = self.query() {
            for (k, v) in form_urlencoded::parse(query.as_bytes()) {
                data.insert(k.into_owned(), Value::String(v.into_owned()));
            }
        }
        tracing::debug!(fields = data.len(), "request data merged");
        data
    }

    /// Picks inputs by name.
    ///
    /// Each entry is a name and a default. Names starting with `*` are
    /// required: a missing or empty value fails the request. Optional
    /// entries fall back to their default. Values are returned in the order
    /// of `params`.
    ///
    /// # Errors
    ///
    /// Returns a `f00102-400` rejection naming the first missing required
    /// input.
    ///
    /// # Example
    ///
    /// ```
    /// use mirage_core::RequestContext;
    /// use serde_json::{json, Value};
    ///
    /// let ctx = RequestContext::mock();
    /// let values = ctx.get_data(&[("page", json!(1))]).unwrap();
    /// assert_eq!(values, vec![json!(1)]);
    ///
    /// assert!(ctx.get_data(&[("*id", Value::Null)]).is_err());
    /// ```
    pub fn get_data(&self, params: &[(&str, Value)]) -> ApiResult<Vec<Value>> {
        let data = self.data();
        params
            .iter()
            .map(|(param, default)| {
                let (name, required) = match param.strip_prefix(REQUIRED_MARKER) {
                    Some(name) => (name, true),
                    None => (*param, false),
                };
                match data.get(name).filter(|v| !is_blank(v)) {
                    Some(value) => Ok(value.clone()),
                    None if required => Err(ApiError::reject(
                        codes::REQUEST_MISS_PARAM,
                        format!("param {name} should be specified"),
                    )),
                    None => Ok(default.clone()),
                }
            })
            .collect()
    }

    /// Returns the client address, honouring proxy headers.
    #[must_use]
    pub fn client_ip(&self) -> String {
        client_ip(self.headers(), self.remote_addr())
    }

    fn body_fields(&self) -> Map<String, Value> {
        if self.body().is_empty() {
            return Map::new();
        }

        let is_form = self
            .header(CONTENT_TYPE.as_str())
            .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));
        if is_form {
            return form_urlencoded::parse(self.body())
                .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
                .collect();
        }

        match serde_json::from_slice::<Value>(self.body()) {
            Ok(Value::Object(map)) => map,
            Ok(_) => Map::new(),
            Err(e) => {
                tracing::debug!(error = %e, "request body is not json");
                Map::new()
            }
        }
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Resolves the client address from proxy headers.
///
/// `client-ip` is tried first, then every entry of `x-forwarded-for`, then
/// the remaining forwarding headers. Private or reserved addresses are
/// skipped. When nothing qualifies the peer address is returned, or
/// [`UNKNOWN_IP`].
#[must_use]
pub fn client_ip(headers: &HeaderMap, remote: Option<SocketAddr>) -> String {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    let forwarded_for = header("x-forwarded-for")
        .into_iter()
        .flat_map(|list| list.split(','))
        .map(str::trim);

    let candidates = header("client-ip")
        .into_iter()
        .chain(forwarded_for)
        .chain(FORWARDING_HEADERS.iter().filter_map(|name| header(name)));

    for candidate in candidates {
        if !candidate.is_empty() && is_public_ip(candidate) {
            return candidate.to_string();
        }
    }

    remote.map_or_else(|| UNKNOWN_IP.to_string(), |addr| addr.ip().to_string())
}

/// Returns `false` for `unknown` and for private or reserved IPv4 ranges.
///
/// Rejected ranges are `0.0.0.0` to `2.255.255.255`, `10.0.0.0/8`, `127.0.0.0/8`,
/// `169.254.0.0/16`, `172.16.0.0/12`, `192.0.2.0/24`, `192.168.0.0/16` and
/// everything from `255.255.255.0`. Strings that are not IPv4 addresses
/// pass, so IPv6 and host names are left to the caller.
#[must_use]
pub fn is_public_ip(ip: &str) -> bool {
    if ip.eq_ignore_ascii_case("unknown") {
        return false;
    }

    let Ok(IpAddr::V4(v4)) = ip.parse::<IpAddr>() else {
        return true;
    };

    let n = u32::from(v4);
    let reserved: [(Ipv4Addr, Ipv4Addr); 7] = [
        (Ipv4Addr::new(0, 0, 0, 0), Ipv4Addr::new(2, 255, 255, 255)),
        (Ipv4Addr::new(10, 0, 0, 0), Ipv4Addr::new(10, 255, 255, 255)),
        (Ipv4Addr::new(127, 0, 0, 0), Ipv4Addr::new(127, 255, 255, 255)),
        (Ipv4Addr::new(169, 254, 0, 0), Ipv4Addr::new(169, 254, 255, 255)),
        (Ipv4Addr::new(172, 16, 0, 0), Ipv4Addr::new(172, 31, 255, 255)),
        (Ipv4Addr::new(192, 0, 2, 0), Ipv4Addr::new(192, 0, 2, 255)),
        (Ipv4Addr::new(192, 168, 0, 0), Ipv4Addr::new(192, 168, 255, 255)),
    ];

    if n >= u32::from(Ipv4Addr::new(255, 255, 255, 0)) {
        return false;
    }
    !reserved
        .iter()
        .any(|(lo, hi)| (u32::from(*lo)..=u32::from(*hi)).contains(&n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::services::ServiceRegistry;
    use bytes::Bytes;
    use serde_json::json;
    use std::sync::Arc;

    fn ctx(uri: &str, content_type: &str, body: &'static str) -> RequestContext {
        let request = http::Request::builder()
            .uri(uri)
            .header(CONTENT_TYPE, content_type)
            .body(Bytes::from_static(body.as_bytes()))
            .unwrap();
        RequestContext::new(request, Arc::new(ServiceRegistry::new()))
    }

    #[test]
    fn test_data_merges_body_and_query() {
        let ctx = ctx(
            "/x?name=query&page=2",
            "application/json",
            r#"{"name": "body", "email": "a@b.c"}"#,
        );
        let data = ctx.data();
        assert_eq!(data["name"], "query");
        assert_eq!(data["page"], "2");
        assert_eq!(data["email"], "a@b.c");
    }

    #[test]
    fn test_data_reads_form_bodies() {
        let ctx = ctx("/x", "application/x-www-form-urlencoded", "a=1&b=hello+world");
        let data = ctx.data();
        assert_eq!(data["a"], "1");
        assert_eq!(data["b"], "hello world");
    }

    #[test]
    fn test_data_ignores_invalid_json() {
        let ctx = ctx("/x?k=v", "application/json", "{not json");
        let data = ctx.data();
        assert_eq!(data.len(), 1);
    }

    #[test]
    fn test_get_data_required_and_defaults() {
        let ctx = ctx("/x?id=7", "application/json", r#"{"name": ""}"#);
        let values = ctx
            .get_data(&[("*id", Value::Null), ("name", json!("anon")), ("limit", json!(10))])
            .unwrap();
        assert_eq!(values, vec![json!("7"), json!("anon"), json!(10)]);
    }

    #[test]
    fn test_get_data_missing_required() {
        let ctx = ctx("/x", "application/json", r#"{"name": ""}"#);
        let err = ctx.get_data(&[("*name", Value::Null)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Rejected);
        assert_eq!(err.dev_code().code(), "f00102");
        assert_eq!(err.dev_message(), "param name should be specified");
    }

    #[test]
    fn test_public_ip_ranges() {
        assert!(is_public_ip("8.8.8.8"));
        assert!(is_public_ip("172.32.0.1"));
        assert!(!is_public_ip("10.1.2.3"));
        assert!(!is_public_ip("127.0.0.1"));
        assert!(!is_public_ip("172.20.0.1"));
        assert!(!is_public_ip("192.168.1.1"));
        assert!(!is_public_ip("169.254.3.4"));
        assert!(!is_public_ip("192.0.2.10"));
        assert!(!is_public_ip("255.255.255.255"));
        assert!(!is_public_ip("Unknown"));
    }

    #[test]
    fn test_client_ip_prefers_public_forwarded_entry() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "10.0.0.1, 203.0.113.9".parse().unwrap());
        assert_eq!(client_ip(&headers, None), "203.0.113.9");
    }

    #[test]
    fn test_client_ip_header_order() {
        let mut headers = HeaderMap::new();
        headers.insert("client-ip", "198.51.100.7".parse().unwrap());
        headers.insert("x-forwarded-for", "203.0.113.9".parse().unwrap());
        assert_eq!(client_ip(&headers, None), "198.51.100.7");
    }

    #[test]
    fn test_client_ip_falls_back_to_remote() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded", "192.168.0.2".parse().unwrap());
        let remote: SocketAddr = "192.168.0.9:5000".parse().unwrap();
        assert_eq!(client_ip(&headers, Some(remote)), "192.168.0.9");
        assert_eq!(client_ip(&HeaderMap::new(), None), UNKNOWN_IP);
    }
}
