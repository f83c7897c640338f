//! Ordered route access rules, first match wins.

use axum::http::Method;

/// Access level a route requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// No authentication required.
    Public,
    /// Any verified bearer token.
    Authenticated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPattern {
    Exact(String),
    /// `/prefix/**`: the prefix itself and everything below it.
    Prefix(String),
    Any,
}

impl PathPattern {
    /// Parse `/a/b`, `/a/**` or `/**`.
    pub fn parse(pattern: &str) -> Self {
        match pattern.strip_suffix("/**") {
            Some("") => PathPattern::Any,
            Some(prefix) => PathPattern::Prefix(prefix.to_string()),
            None => PathPattern::Exact(pattern.to_string()),
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            PathPattern::Exact(exact) => path == exact,
            PathPattern::Prefix(prefix) => path
                .strip_prefix(prefix.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/')),
            PathPattern::Any => true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AccessRule {
    /// `None` matches every method.
    pub method: Option<Method>,
    pub paths: Vec<PathPattern>,
    pub access: Access,
}

impl AccessRule {
    pub fn new(method: Option<Method>, paths: &[&str], access: Access) -> Self {
        Self {
            method,
            paths: paths.iter().map(|p| PathPattern::parse(p)).collect(),
            access,
        }
    }

    fn matches(&self, method: &Method, path: &str) -> bool {
        self.method.as_ref().map_or(true, |m| m == method)
            && self.paths.iter().any(|p| p.matches(path))
    }
}

/// Evaluated top to bottom; unmatched requests require authentication.
#[derive(Debug, Clone)]
pub struct AccessRules {
    rules: Vec<AccessRule>,
}

impl AccessRules {
    pub fn new(rules: Vec<AccessRule>) -> Self {
        Self { rules }
    }

    /// The application's rule table.
    pub fn standard(profile_setup_path: &str) -> Self {
        Self::new(vec![
            AccessRule::new(Some(Method::POST), &[profile_setup_path], Access::Authenticated),
            AccessRule::new(None, &["/public/**", "/actuator/health"], Access::Public),
            AccessRule::new(None, &["/**"], Access::Authenticated),
        ])
    }

    pub fn evaluate(&self, method: &Method, path: &str) -> Access {
        self.rules
            .iter()
            .find(|rule| rule.matches(method, path))
            .map_or(Access::Authenticated, |rule| rule.access)
    }
}
