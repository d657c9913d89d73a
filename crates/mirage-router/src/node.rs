//! Radix tree node.
//!
//! Each node stands for one path segment. Lookups try static children
//! first, then the parameter child, then the catch-all, and backtrack when a
//! branch dead-ends.

use http::Method;

use crate::error::{RouterError, RouterResult};
use crate::method_router::MethodRouter;
use crate::params::Params;

/// Kind of a pattern segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentKind {
    /// Literal text such as `users`.
    Static,
    /// Named parameter written `{id}` or `:id`.
    Param(String),
    /// Catch-all written `*rest`. Only valid as the last segment.
    Wildcard(String),
}

/// A node in the radix tree.
#[derive(Debug, Clone)]
pub struct Node {
    segment: String,
    kind: SegmentKind,
    methods: Option<MethodRouter>,
    // Sorted by segment for binary search.
    static_children: Vec<Node>,
    param_child: Option<Box<Node>>,
    wildcard_child: Option<Box<Node>>,
}

impl Node {
    fn with_kind(segment: impl Into<String>, kind: SegmentKind) -> Self {
        Self {
            segment: segment.into(),
            kind,
            methods: None,
            static_children: Vec::new(),
            param_child: None,
            wildcard_child: None,
        }
    }

    /// Creates the root node.
    #[must_use]
    pub fn root() -> Self {
        Self::with_kind("", SegmentKind::Static)
    }

    /// Returns the segment text this node was created from.
    #[must_use]
    pub fn segment(&self) -> &str {
        &self.segment
    }

    /// Returns the segment kind.
    #[must_use]
    pub const fn kind(&self) -> &SegmentKind {
        &self.kind
    }

    /// Registers `name` for `method` on `path`.
    ///
    /// # Errors
    ///
    /// Fails on malformed patterns, on a parameter name that differs from
    /// one already at the same position and on a duplicate method.
    pub fn insert(&mut self, path: &str, method: Method, name: &str) -> RouterResult<()> {
        let segments = parse_pattern(path)?;
        self.insert_segments(path, &segments, method, name)
    }

    fn insert_segments(
        &mut self,
        path: &str,
        segments: &[(String, SegmentKind)],
        method: Method,
        name: &str,
    ) -> RouterResult<()> {
        let Some(((segment, kind), rest)) = segments.split_first() else {
            return self
                .methods
                .get_or_insert_with(MethodRouter::new)
                .insert(method, name, path);
        };

        let child = match kind {
            SegmentKind::Static => {
                match self
                    .static_children
                    .binary_search_by(|c| c.segment.as_str().cmp(segment))
                {
                    Ok(i) => &mut self.static_children[i],
                    Err(i) => {
                        self.static_children
                            .insert(i, Node::with_kind(segment.clone(), kind.clone()));
                        &mut self.static_children[i]
                    }
                }
            }
            SegmentKind::Param(param) => {
                let child = self
                    .param_child
                    .get_or_insert_with(|| Box::new(Node::with_kind(segment.clone(), kind.clone())));
                ensure_same_name(path, &child.kind, param)?;
                child.as_mut()
            }
            SegmentKind::Wildcard(param) => {
                let child = self
                    .wildcard_child
                    .get_or_insert_with(|| Box::new(Node::with_kind(segment.clone(), kind.clone())));
                ensure_same_name(path, &child.kind, param)?;
                child.as_mut()
            }
        };
        child.insert_segments(path, rest, method, name)
    }

    /// Finds the method table for `path` and the captured parameters.
    #[must_use]
    pub fn match_path(&self, path: &str) -> Option<(&MethodRouter, Params)> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut params = Params::new();
        let methods = self.match_segments(&segments, &mut params)?;
        Some((methods, params))
    }

    fn match_segments<'a>(&'a self, segments: &[&str], params: &mut Params) -> Option<&'a MethodRouter> {
        let Some((segment, rest)) = segments.split_first() else {
            return self.methods.as_ref();
        };

        if let Ok(i) = self
            .static_children
            .binary_search_by(|c| c.segment.as_str().cmp(segment))
        {
            if let Some(found) = self.static_children[i].match_segments(rest, params) {
                return Some(found);
            }
        }

        if let Some(child) = &self.param_child {
            if let SegmentKind::Param(name) = &child.kind {
                let mark = params.len();
                params.push(name.clone(), *segment);
                if let Some(found) = child.match_segments(rest, params) {
                    return Some(found);
                }
                params.truncate(mark);
            }
        }

        if let Some(child) = &self.wildcard_child {
            if let (SegmentKind::Wildcard(name), Some(methods)) = (&child.kind, &child.methods) {
                params.push(name.clone(), segments.join("/"));
                return Some(methods);
            }
        }

        None
    }
}

fn ensure_same_name(path: &str, existing: &SegmentKind, new: &str) -> RouterResult<()> {
    let existing = match existing {
        SegmentKind::Param(n) | SegmentKind::Wildcard(n) => n,
        SegmentKind::Static => return Ok(()),
    };
    if existing == new {
        Ok(())
    } else {
        Err(RouterError::ParamConflict {
            path: path.to_string(),
            existing: existing.clone(),
            new: new.to_string(),
        })
    }
}

/// Splits a pattern into typed segments.
///
/// Empty segments are ignored, so `/users/` and `/users` are the same
/// pattern.
pub(crate) fn parse_pattern(path: &str) -> RouterResult<Vec<(String, SegmentKind)>> {
    let raw: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let last = raw.len().saturating_sub(1);
    let invalid = |segment: &str| RouterError::InvalidSegment {
        path: path.to_string(),
        segment: segment.to_string(),
    };

    raw.iter()
        .enumerate()
        .map(|(i, &s)| {
            let kind = if let Some(name) = s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                SegmentKind::Param(valid_name(name).ok_or_else(|| invalid(s))?)
            } else if let Some(name) = s.strip_prefix(':') {
                SegmentKind::Param(valid_name(name).ok_or_else(|| invalid(s))?)
            } else if let Some(name) = s.strip_prefix('*') {
                if i != last {
                    return Err(RouterError::WildcardNotLast {
                        path: path.to_string(),
                    });
                }
                SegmentKind::Wildcard(valid_name(name).ok_or_else(|| invalid(s))?)
            } else if s.contains(['{', '}']) {
                return Err(invalid(s));
            } else {
                SegmentKind::Static
            };
            Ok((s.to_string(), kind))
        })
        .collect()
}

fn valid_name(name: &str) -> Option<String> {
    let ok = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    ok.then(|| name.to_string())
}
