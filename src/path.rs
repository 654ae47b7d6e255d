//! # Path Utilities
//!
//! Canonical route path handling: normalization, prefix joining, the
//! priority tie-break specificity index, conversion of `:name` parameter
//! tokens to the matchit pattern syntax, and wildcard matching of
//! authentication exclusion patterns.

/// Normalize a route path: leading slash, no trailing slash
///
/// Idempotent: `normalize(normalize(p)) == normalize(p)`.
///
/// ```
/// use waypost::path::normalize;
///
/// assert_eq!(normalize("user"), "/user");
/// assert_eq!(normalize("user/"), "/user");
/// assert_eq!(normalize("/"), "/");
/// ```
#[must_use]
pub fn normalize(path: &str) -> String {
    let mut normalized = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };
    while normalized.len() > 1 && normalized.ends_with('/') {
        normalized.pop();
    }
    normalized
}

/// Join a controller prefix and a route path into the final mount path
///
/// Both sides are normalized first; an empty result collapses to `/`.
#[must_use]
pub fn join(prefix: &str, path: &str) -> String {
    let prefix = normalize(prefix);
    let path = normalize(path);
    if prefix == "/" {
        return path;
    }
    if path == "/" {
        return prefix;
    }
    format!("{prefix}{path}")
}

/// Specificity index used as the priority tie-break during mounting
///
/// Returns the byte index of the first `:` parameter token, or `-1` for a
/// fully static path. Static paths therefore sort ahead of parameterized
/// ones when compared ascending.
#[must_use]
pub fn specificity(path: &str) -> i64 {
    path.find(':').map_or(-1, |i| i64::try_from(i).unwrap_or(i64::MAX))
}

/// Convert a `:name` / `*` route path to the matchit pattern syntax
///
/// `/user/:id` becomes `/user/{id}`; a trailing `*` segment becomes the
/// matchit catch-all `{*rest}`.
#[must_use]
pub fn to_matchit(path: &str) -> String {
    let path = normalize(path);
    let segments: Vec<String> = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|segment| {
            if let Some(name) = segment.strip_prefix(':') {
                format!("{{{name}}}")
            } else if segment == "*" {
                "{*rest}".to_string()
            } else if let Some(name) = segment.strip_prefix('*') {
                format!("{{*{name}}}")
            } else {
                segment.to_string()
            }
        })
        .collect();

    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

/// One matched unit of an exclusion pattern
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// `:name` token, matches any single non-empty segment
    Param,
    /// `*`, matches the remainder of the path
    CatchAll,
}

/// Compiled exclusion pattern for the authentication gate
///
/// Path parameter tokens (`:name`) become wildcard segments, so the pattern
/// `/user/:id` excludes `/user/42` but not `/user/42/follow`.
#[derive(Debug, Clone)]
pub struct PathPattern {
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Compile a path pattern
    #[must_use]
    pub fn parse(pattern: &str) -> Self {
        let segments = normalize(pattern)
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|segment| {
                if segment.starts_with(':') {
                    Segment::Param
                } else if segment.starts_with('*') {
                    Segment::CatchAll
                } else {
                    Segment::Literal(segment.to_string())
                }
            })
            .collect();
        Self { segments }
    }

    /// Test a concrete request path against the pattern
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        let path = normalize(path);
        let mut parts = path.split('/').filter(|s| !s.is_empty());

        for segment in &self.segments {
            match segment {
                Segment::CatchAll => return true,
                Segment::Param => {
                    if parts.next().is_none() {
                        return false;
                    }
                }
                Segment::Literal(expected) => {
                    if parts.next() != Some(expected.as_str()) {
                        return false;
                    }
                }
            }
        }
        parts.next().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_adds_leading_slash() {
        assert_eq!(normalize("user"), "/user");
        assert_eq!(normalize("/user"), "/user");
    }

    #[test]
    fn test_normalize_strips_trailing_slash() {
        assert_eq!(normalize("user/"), "/user");
        assert_eq!(normalize("/user/"), "/user");
    }

    #[test]
    fn test_normalize_idempotent() {
        for p in ["user", "user/", "/a/b/", "", "/"] {
            assert_eq!(normalize(&normalize(p)), normalize(p));
        }
    }

    #[test]
    fn test_normalize_empty_and_root() {
        assert_eq!(normalize(""), "/");
        assert_eq!(normalize("/"), "/");
    }

    #[test]
    fn test_join() {
        assert_eq!(join("/user", "/login"), "/user/login");
        assert_eq!(join("user", "login"), "/user/login");
        assert_eq!(join("", "/login"), "/login");
        assert_eq!(join("/user", "/"), "/user");
        assert_eq!(join("", ""), "/");
    }

    #[test]
    fn test_specificity_static_first() {
        assert_eq!(specificity("/a/static"), -1);
        assert_eq!(specificity("/a/:id"), 3);
        assert!(specificity("/a/static") < specificity("/a/:id"));
    }

    #[test]
    fn test_to_matchit() {
        assert_eq!(to_matchit("/user/:id"), "/user/{id}");
        assert_eq!(to_matchit("/user/:id/posts/:post"), "/user/{id}/posts/{post}");
        assert_eq!(to_matchit("*"), "/{*rest}");
        assert_eq!(to_matchit("/files/*path"), "/files/{*path}");
        assert_eq!(to_matchit("/"), "/");
    }

    #[test]
    fn test_pattern_literal() {
        let p = PathPattern::parse("/graphql");
        assert!(p.matches("/graphql"));
        assert!(!p.matches("/graphql/extra"));
        assert!(!p.matches("/user"));
    }

    #[test]
    fn test_pattern_param_token() {
        let p = PathPattern::parse("/user/:id");
        assert!(p.matches("/user/42"));
        assert!(p.matches("/user/abc"));
        assert!(!p.matches("/user"));
        assert!(!p.matches("/user/42/follow"));
    }

    #[test]
    fn test_pattern_catch_all() {
        let p = PathPattern::parse("/public/*");
        assert!(p.matches("/public/css/site.css"));
        assert!(p.matches("/public"));
    }
}
