//! Stable identifiers for routes and collections.

use std::fmt;
use std::str::FromStr;

/// Separator between the collection id and the route id in a route name.
pub const ROUTE_NAME_SEPARATOR: &str = "-_-";

/// Computes the CRC-32 fingerprint of `parts`.
///
/// Parts are joined with `:` and the characters `{}[]` are removed before
/// hashing, so `/users/{id}` and `/users/id` share a fingerprint.
///
/// ```
/// use mirage_core::fingerprint;
///
/// assert_eq!(fingerprint(&["/users"]), fingerprint(&["/users"]));
/// assert_ne!(fingerprint(&["/users"]), fingerprint(&["/posts"]));
/// ```
#[must_use]
pub fn fingerprint(parts: &[&str]) -> u32 {
    let joined = parts.join(":");
    let cleaned: String = joined
        .chars()
        .filter(|c| !matches!(c, '{' | '}' | '[' | ']'))
        .collect();
    crc32fast::hash(cleaned.as_bytes())
}

/// Name under which a route is registered with the router.
///
/// It encodes the owning collection and the route itself as
/// `"{collection_id}-_-{route_id}"`, so the dispatcher can find both from
/// the matched name alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RouteName {
    /// Collection fingerprint.
    pub collection_id: u32,
    /// Route fingerprint.
    pub route_id: u32,
}

impl RouteName {
    /// Creates a route name.
    #[must_use]
    pub const fn new(collection_id: u32, route_id: u32) -> Self {
        Self {
            collection_id,
            route_id,
        }
    }

    /// Encodes the name.
    #[must_use]
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Decodes a name produced by [`RouteName::encode`].
    #[must_use]
    pub fn decode(name: &str) -> Option<Self> {
        let (collection, route) = name.split_once(ROUTE_NAME_SEPARATOR)?;
        Some(Self {
            collection_id: collection.parse().ok()?,
            route_id: route.parse().ok()?,
        })
    }
}

impl fmt::Display for RouteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{ROUTE_NAME_SEPARATOR}{}",
            self.collection_id, self.route_id
        )
    }
}

impl FromStr for RouteName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s).ok_or_else(|| format!("invalid route name '{s}'"))
    }
}
