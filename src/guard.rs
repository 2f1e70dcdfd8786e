//! Route guard: decides whether a navigation may proceed.
//!
//! The decision is a pure function of the request path and the logged-in
//! signal. It never sees the token; the axum adapter in `routes` feeds it
//! the result of `session::has_signal` on the request's `Cookie` header.

use url::form_urlencoded;

/// Query parameter carrying the originally requested path to the login page.
pub const FROM_PARAM: &str = "from";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathClass {
    /// Requires a logged-in session.
    Protected,
    /// Login/register pages; hidden from logged-in users.
    GuestOnly,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    Allow,
    RedirectTo { path: String, query: Vec<(String, String)> },
}

impl RouteDecision {
    /// Redirect target for this decision, or `None` for [`RouteDecision::Allow`].
    ///
    /// Parameters of the original query string are kept, except those the
    /// decision sets itself.
    #[must_use]
    pub fn location(&self, original_query: Option<&str>) -> Option<String> {
        let Self::RedirectTo { path, query } = self else {
            return None;
        };

        let mut serializer = form_urlencoded::Serializer::new(String::new());
        let mut any = false;
        for (key, value) in form_urlencoded::parse(original_query.unwrap_or("").as_bytes()) {
            if query.iter().any(|(k, _)| *k == key) {
                continue;
            }
            serializer.append_pair(&key, &value);
            any = true;
        }
        for (key, value) in query {
            serializer.append_pair(key, value);
            any = true;
        }

        if any {
            Some(format!("{path}?{}", serializer.finish()))
        } else {
            Some(path.clone())
        }
    }
}

/// Which paths the guard covers and where it sends people.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardConfig {
    /// Prefixes that require login.
    pub protected: Vec<String>,
    /// Prefixes hidden from logged-in users.
    pub guest_only: Vec<String>,
    /// Where logged-in users land when they hit a guest-only page.
    pub home: String,
    /// Where anonymous users land when they hit a protected page.
    pub login: String,
    /// Navigation patterns the guard runs for (`:name`, `:name*`, `:name+`).
    pub matcher: Vec<String>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            protected: vec!["/properties".into()],
            guest_only: vec!["/login".into(), "/register".into()],
            home: "/properties".into(),
            login: "/login".into(),
            matcher: vec![
                "/".into(),
                "/login".into(),
                "/register".into(),
                "/properties".into(),
                "/properties/new".into(),
                "/properties/:path*".into(),
            ],
        }
    }
}

impl GuardConfig {
    #[must_use]
    pub fn classify(&self, path: &str) -> PathClass {
        if self.guest_only.iter().any(|p| prefix_match(path, p)) {
            PathClass::GuestOnly
        } else if self.protected.iter().any(|p| prefix_match(path, p)) {
            PathClass::Protected
        } else {
            PathClass::Neutral
        }
    }

    #[must_use]
    pub fn decide(&self, path: &str, logged_in: bool) -> RouteDecision {
        match (logged_in, self.classify(path)) {
            (true, PathClass::GuestOnly) => RouteDecision::RedirectTo { path: self.home.clone(), query: Vec::new() },
            (false, PathClass::Protected) => RouteDecision::RedirectTo {
                path: self.login.clone(),
                query: vec![(FROM_PARAM.to_owned(), path.to_owned())],
            },
            _ => RouteDecision::Allow,
        }
    }

    /// Whether the guard runs for this navigation path at all.
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        self.matcher.iter().any(|pattern| pattern_match(pattern, path))
    }
}

/// Exact match, or `prefix` followed by `/`. `/loginish` does not match `/login`.
fn prefix_match(path: &str, prefix: &str) -> bool {
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

fn pattern_match(pattern: &str, path: &str) -> bool {
    let pattern: Vec<&str> = segments(pattern).collect();
    let path: Vec<&str> = segments(path).collect();
    match_segments(&pattern, &path)
}

fn segments(raw: &str) -> impl Iterator<Item = &str> {
    raw.split('/').filter(|s| !s.is_empty())
}

fn match_segments(pattern: &[&str], path: &[&str]) -> bool {
    let Some((head, rest)) = pattern.split_first() else {
        return path.is_empty();
    };
    if let Some(name) = head.strip_prefix(':') {
        if name.ends_with('*') {
            return (0..=path.len()).any(|n| match_segments(rest, &path[n..]));
        }
        if name.ends_with('+') {
            return (1..=path.len()).any(|n| match_segments(rest, &path[n..]));
        }
        return !path.is_empty() && match_segments(rest, &path[1..]);
    }
    path.first() == Some(head) && match_segments(rest, &path[1..])
}

#[cfg(test)]
#[path = "guard_test.rs"]
mod tests;
