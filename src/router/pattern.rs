use smallvec::SmallVec;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// Maximum number of path parameters before heap allocation.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Captured `name -> value` pairs, in pattern order.
///
/// Param names are `Arc<str>` shared with the compiled pattern, so a match
/// only allocates for the captured values.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(Box<str>),
    Param(Arc<str>),
}

/// A compiled route pattern such as `/users/:id/posts`.
///
/// Literal segments must match exactly; a `:name` segment matches any single
/// non-empty segment and captures it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    raw: Arc<str>,
    segments: Vec<Segment>,
    param_count: usize,
}

impl RoutePattern {
    #[must_use]
    pub fn parse(pattern: &str) -> Self {
        let segments: Vec<Segment> = split_path(pattern)
            .map(|segment| match segment.strip_prefix(':') {
                Some(name) if !name.is_empty() => Segment::Param(Arc::from(name)),
                _ => Segment::Literal(segment.into()),
            })
            .collect();
        let param_count = segments
            .iter()
            .filter(|s| matches!(s, Segment::Param(_)))
            .count();
        Self {
            raw: Arc::from(pattern),
            segments,
            param_count,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub(crate) fn raw(&self) -> &Arc<str> {
        &self.raw
    }

    /// Number of `:name` segments; fewer means more specific.
    #[must_use]
    pub fn param_count(&self) -> usize {
        self.param_count
    }

    #[must_use]
    pub fn param_names(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Param(name) => Some(name.as_ref()),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    /// Match pre-split path segments, returning the captured parameters.
    #[must_use]
    pub fn matches(&self, path: &[&str]) -> Option<ParamVec> {
        if path.len() != self.segments.len() {
            return None;
        }
        let mut params = ParamVec::new();
        for (segment, actual) in self.segments.iter().zip(path) {
            match segment {
                Segment::Literal(literal) => {
                    if literal.as_ref() != *actual {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    if actual.is_empty() {
                        return None;
                    }
                    params.push((Arc::clone(name), decode_segment(actual).into_owned()));
                }
            }
        }
        Some(params)
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Split a path into its non-empty segments, ignoring any query string.
pub(crate) fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split(['?', '#'])
        .next()
        .unwrap_or_default()
        .split('/')
        .filter(|s| !s.is_empty())
}

fn decode_segment(raw: &str) -> Cow<'_, str> {
    urlencoding::decode(raw).unwrap_or(Cow::Borrowed(raw))
}
