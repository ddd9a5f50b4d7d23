//! Path classification for the session gate.
//!
//! # Purpose
//! Decides, from the request path alone, whether the gate must verify a
//! session, attempt silent authentication (home page), or pass the request
//! through untouched.
//!
//! # Key invariants
//! - Public prefixes win over protected prefixes.
//! - Prefix matching is segment-aware: `/admin` covers `/admin` and
//!   `/admin/users`, never `/administrator`.
//! - Paths are classified in canonical form ([`CanonicalPath`]): decoded
//!   once, with empty, `.` and `..` segments resolved. `/%61dmin`,
//!   `//admin` and `/_next/../admin` all classify as `/admin`.
use crate::config::RouteConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathClass {
    /// Explicit allow-list (assets, auth and health APIs).
    Public,
    /// Login page; authenticated admins are sent on to the dashboard.
    Home,
    /// Requires a valid ADMIN session.
    Protected,
    /// Outside the protected matcher entirely.
    Unguarded,
}

impl PathClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            PathClass::Public => "public",
            PathClass::Home => "home",
            PathClass::Protected => "protected",
            PathClass::Unguarded => "unguarded",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RouteMatcher {
    home_path: String,
    dashboard_path: String,
    protected_prefixes: Vec<String>,
    public_prefixes: Vec<String>,
}

impl RouteMatcher {
    pub fn new(config: &RouteConfig) -> Self {
        Self {
            home_path: normalize(&config.home_path),
            dashboard_path: normalize(&config.dashboard_path),
            protected_prefixes: config.protected_prefixes.iter().map(|p| normalize(p)).collect(),
            public_prefixes: config.public_prefixes.iter().map(|p| normalize(p)).collect(),
        }
    }

    pub fn home_path(&self) -> &str {
        &self.home_path
    }

    pub fn dashboard_path(&self) -> &str {
        &self.dashboard_path
    }

    pub fn classify(&self, path: &str) -> PathClass {
        self.classify_canonical(&CanonicalPath::parse(path).decoded())
    }

    fn classify_canonical(&self, path: &str) -> PathClass {
        if self
            .public_prefixes
            .iter()
            .any(|prefix| matches_prefix(path, prefix))
        {
            return PathClass::Public;
        }
        if path == self.home_path {
            return PathClass::Home;
        }
        if self
            .protected_prefixes
            .iter()
            .any(|prefix| matches_prefix(path, prefix))
        {
            return PathClass::Protected;
        }
        PathClass::Unguarded
    }
}

impl Default for RouteMatcher {
    fn default() -> Self {
        Self::new(&RouteConfig::default())
    }
}

/// Request path reduced to the segments an upstream would resolve it to.
///
/// The path is percent-decoded once before splitting, so an encoded `/` or
/// `.` cannot hide a segment boundary. Backslashes count as separators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalPath {
    segments: Vec<String>,
    trailing_slash: bool,
}

impl CanonicalPath {
    pub fn parse(raw: &str) -> Self {
        let bytes = urlencoding::decode_binary(raw.as_bytes());
        let decoded = String::from_utf8_lossy(&bytes);
        let mut segments: Vec<String> = Vec::new();
        for segment in decoded.split(['/', '\\']) {
            match segment {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                other => segments.push(other.to_string()),
            }
        }
        let trailing_slash = !segments.is_empty() && decoded.ends_with(['/', '\\']);
        Self {
            segments,
            trailing_slash,
        }
    }

    /// Decoded form used for classification, without a trailing slash.
    pub fn decoded(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }

    /// Re-encoded form forwarded upstream. Parsing it again yields the same
    /// segments.
    pub fn encoded(&self) -> String {
        let mut out = String::from("/");
        let encoded: Vec<_> = self
            .segments
            .iter()
            .map(|segment| urlencoding::encode(segment))
            .collect();
        out.push_str(&encoded.join("/"));
        if self.trailing_slash {
            out.push('/');
        }
        out
    }
}

fn normalize(path: &str) -> String {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

fn matches_prefix(path: &str, prefix: &str) -> bool {
    if prefix == "/" {
        return path.starts_with('/');
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_public_paths() {
        let matcher = RouteMatcher::default();
        for path in [
            "/_next/static/chunk.js",
            "/favicon.ico",
            "/api/auth/login",
            "/api/auth",
            "/api/health",
        ] {
            assert_eq!(matcher.classify(path), PathClass::Public, "{path}");
        }
    }

    #[test]
    fn default_protected_paths() {
        let matcher = RouteMatcher::default();
        for path in [
            "/admin",
            "/admin/users/42",
            "/dashboard",
            "/dashboard/",
            "/settings/profile",
        ] {
            assert_eq!(matcher.classify(path), PathClass::Protected, "{path}");
        }
    }

    #[test]
    fn home_is_its_own_class() {
        let matcher = RouteMatcher::default();
        assert_eq!(matcher.classify("/"), PathClass::Home);
        assert_eq!(matcher.home_path(), "/");
        assert_eq!(matcher.dashboard_path(), "/dashboard");
    }

    #[test]
    fn prefixes_match_whole_segments() {
        let matcher = RouteMatcher::default();
        assert_eq!(matcher.classify("/administrator"), PathClass::Unguarded);
        assert_eq!(matcher.classify("/settingsx"), PathClass::Unguarded);
        assert_eq!(matcher.classify("/api/authx"), PathClass::Unguarded);
        assert_eq!(matcher.classify("/api/trpc/users.list"), PathClass::Unguarded);
    }

    #[test]
    fn public_wins_over_protected() {
        let matcher = RouteMatcher::new(&RouteConfig {
            protected_prefixes: vec!["/admin".to_string()],
            public_prefixes: vec!["/admin/public".to_string()],
            ..RouteConfig::default()
        });
        assert_eq!(matcher.classify("/admin/public/logo.png"), PathClass::Public);
        assert_eq!(matcher.classify("/admin/users"), PathClass::Protected);
    }

    #[test]
    fn encoded_prefixes_classify_as_decoded() {
        let matcher = RouteMatcher::default();
        assert_eq!(matcher.classify("/%61dmin/users"), PathClass::Protected);
        assert_eq!(matcher.classify("/%64ashboard"), PathClass::Protected);
        assert_eq!(matcher.classify("/admin%2Fusers"), PathClass::Protected);
        assert_eq!(matcher.classify("/%2F"), PathClass::Home);
    }

    #[test]
    fn repeated_slashes_collapse() {
        let matcher = RouteMatcher::default();
        assert_eq!(matcher.classify("//admin/users"), PathClass::Protected);
        assert_eq!(matcher.classify("/settings//profile"), PathClass::Protected);
        assert_eq!(matcher.classify("\\admin"), PathClass::Protected);
        assert_eq!(matcher.classify("//"), PathClass::Home);
    }

    #[test]
    fn dot_segments_cannot_escape_public_prefixes() {
        let matcher = RouteMatcher::default();
        assert_eq!(matcher.classify("/_next/../admin"), PathClass::Protected);
        assert_eq!(
            matcher.classify("/api/health/../../settings"),
            PathClass::Protected
        );
        assert_eq!(matcher.classify("/_next%2F..%2Fadmin"), PathClass::Protected);
        assert_eq!(matcher.classify("/_next/%2e%2e/dashboard"), PathClass::Protected);
        assert_eq!(matcher.classify("/../../admin"), PathClass::Protected);
        assert_eq!(matcher.classify("/_next/./static/a.js"), PathClass::Public);
    }

    #[test]
    fn canonical_path_forms() {
        let path = CanonicalPath::parse("//_next/./static/../chunks/%5Bslug%5D.js");
        assert_eq!(path.decoded(), "/_next/chunks/[slug].js");
        assert_eq!(path.encoded(), "/_next/chunks/%5Bslug%5D.js");

        let path = CanonicalPath::parse("/dashboard/");
        assert_eq!(path.decoded(), "/dashboard");
        assert_eq!(path.encoded(), "/dashboard/");

        assert_eq!(CanonicalPath::parse("/").encoded(), "/");
        assert_eq!(CanonicalPath::parse("/a/..").encoded(), "/");
    }

    #[test]
    fn encoded_form_is_stable() {
        for raw in [
            "/%2561dmin",
            "/admin%2F..%2F_next",
            "/reports/q1%20draft",
            "/_next/static/../../settings/",
        ] {
            let once = CanonicalPath::parse(raw);
            let twice = CanonicalPath::parse(&once.encoded());
            assert_eq!(once, twice, "{raw}");
        }
        assert_eq!(CanonicalPath::parse("/%2561dmin").decoded(), "/%61dmin");
    }

    #[test]
    fn configured_prefixes_are_normalized() {
        let matcher = RouteMatcher::new(&RouteConfig {
            protected_prefixes: vec!["reports/".to_string()],
            ..RouteConfig::default()
        });
        assert_eq!(matcher.classify("/reports/q1"), PathClass::Protected);
        assert_eq!(matcher.classify("/admin"), PathClass::Unguarded);
    }
}
