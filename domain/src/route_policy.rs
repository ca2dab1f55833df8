//! Route access policy: classifies request paths and decides whether a request
//! proceeds or is redirected.
//!
//! Rules are matched on whole path segments. A rule for `/profile` covers
//! `/profile` and `/profile/settings` but never `/profile-editor`. When several
//! rules match, the longest prefix wins; equal-length matches go to the rule
//! declared first. Paths no rule covers are `Public`.

use crate::error::Error;
use crate::session::Session;
use log::*;
use service::config::Config;
use std::fmt;
use std::str::FromStr;

/// Where unauthenticated visitors of protected areas are sent.
pub const LOGIN_PATH: &str = "/login";
/// Where authenticated visitors of auth-only areas are sent.
pub const FEED_PATH: &str = "/feed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// Requires an authenticated session.
    ProtectedArea,
    /// Only makes sense signed out (login, signup).
    AuthOnlyArea,
    Public,
}

impl FromStr for RouteClass {
    type Err = Error;

    fn from_str(class: &str) -> Result<Self, Self::Err> {
        match class.trim().to_lowercase().replace('-', "_").as_str() {
            "protected" => Ok(RouteClass::ProtectedArea),
            "auth_only" => Ok(RouteClass::AuthOnlyArea),
            "public" => Ok(RouteClass::Public),
            other => Err(Error::config(&format!("Unknown route class: {other}"))),
        }
    }
}

impl fmt::Display for RouteClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RouteClass::ProtectedArea => write!(f, "protected"),
            RouteClass::AuthOnlyArea => write!(f, "auth_only"),
            RouteClass::Public => write!(f, "public"),
        }
    }
}

/// Result of evaluating a request against the policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectDecision {
    Allow,
    RedirectTo(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRule {
    prefix: String,
    class: RouteClass,
}

impl RouteRule {
    pub fn new(prefix: &str, class: RouteClass) -> Result<Self, Error> {
        let prefix = prefix.trim();
        if !prefix.starts_with('/') {
            return Err(Error::config(&format!(
                "Route prefix must start with '/': {prefix}"
            )));
        }

        // "/feed/" and "/feed" describe the same area; "/" stays as is.
        let trimmed = prefix.trim_end_matches('/');
        let prefix = if trimmed.is_empty() { "/" } else { trimmed };

        Ok(Self {
            prefix: prefix.to_string(),
            class,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn class(&self) -> RouteClass {
        self.class
    }

    fn matches(&self, path: &str) -> bool {
        if self.prefix == "/" {
            return path.starts_with('/');
        }

        match path.strip_prefix(self.prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }
}

impl FromStr for RouteRule {
    type Err = Error;

    /// Parses `prefix=class`, e.g. `/feed=protected`.
    fn from_str(rule: &str) -> Result<Self, Self::Err> {
        let (prefix, class) = rule
            .split_once('=')
            .ok_or_else(|| Error::config(&format!("Route rule is not prefix=class: {rule}")))?;
        RouteRule::new(prefix, class.parse()?)
    }
}

/// Ordered route classification table, loaded once at process start.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutePolicy {
    rules: Vec<RouteRule>,
}

impl RoutePolicy {
    pub fn new(rules: Vec<RouteRule>) -> Self {
        Self { rules }
    }

    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let rules = config
            .route_rules
            .iter()
            .filter(|rule| !rule.trim().is_empty())
            .map(|rule| rule.parse())
            .collect::<Result<Vec<RouteRule>, Error>>()?;

        info!("Loaded {} route rule(s)", rules.len());
        for rule in &rules {
            debug!("Route rule: {} => {}", rule.prefix, rule.class);
        }

        Ok(Self::new(rules))
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    pub fn classify(&self, path: &str) -> RouteClass {
        let mut best: Option<&RouteRule> = None;
        for rule in self.rules.iter().filter(|rule| rule.matches(path)) {
            // Strictly longer only, so the first declared rule keeps a tie.
            if best.map_or(true, |b| rule.prefix.len() > b.prefix.len()) {
                best = Some(rule);
            }
        }
        best.map_or(RouteClass::Public, |rule| rule.class)
    }

    pub fn decide(&self, path: &str, session: &Session) -> RedirectDecision {
        decide(self.classify(path), session)
    }
}

/// Pure access decision for an already classified path.
pub fn decide(class: RouteClass, session: &Session) -> RedirectDecision {
    match class {
        RouteClass::ProtectedArea if !session.is_authenticated() => {
            RedirectDecision::RedirectTo(LOGIN_PATH)
        }
        RouteClass::AuthOnlyArea if session.is_authenticated() => {
            RedirectDecision::RedirectTo(FEED_PATH)
        }
        _ => RedirectDecision::Allow,
    }
}
