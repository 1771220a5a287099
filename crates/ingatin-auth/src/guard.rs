// SPDX-FileCopyrightText: 2026 Ingat-In Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Route guard driven by the authentication state.
//!
//! States: `Unknown -> Authenticated | Unauthenticated`. While the state is
//! `Unknown` the guard never redirects. Once resolved:
//! - a protected route without a session goes to the login route
//! - the login route with a session goes to the home route
//!
//! Each (state, route) pair yields at most one redirect, so re-rendering the
//! same view does not bounce the user twice.

use ingatin_config::model::DashboardConfig;
use tracing::debug;

/// Whether a session exists, as far as the dashboard knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthState {
    /// The initial session check has not completed.
    Unknown,
    Authenticated,
    Unauthenticated,
}

impl AuthState {
    pub fn is_resolved(self) -> bool {
        self != AuthState::Unknown
    }

    pub fn is_authenticated(self) -> bool {
        self == AuthState::Authenticated
    }
}

impl std::fmt::Display for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthState::Unknown => write!(f, "unknown"),
            AuthState::Authenticated => write!(f, "authenticated"),
            AuthState::Unauthenticated => write!(f, "unauthenticated"),
        }
    }
}

/// Navigation the guard asks the view layer to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub from: String,
    pub to: String,
}

/// Applies the redirect rules to the current route.
#[derive(Debug, Clone)]
pub struct AuthGuard {
    protected_prefixes: Vec<String>,
    login_route: String,
    home_route: String,
    last_seen: Option<(AuthState, String)>,
}

impl AuthGuard {
    pub fn new(
        protected_prefixes: Vec<String>,
        login_route: impl Into<String>,
        home_route: impl Into<String>,
    ) -> Self {
        Self {
            protected_prefixes: protected_prefixes
                .iter()
                .map(|p| normalize(p).to_string())
                .collect(),
            login_route: normalize(&login_route.into()).to_string(),
            home_route: normalize(&home_route.into()).to_string(),
            last_seen: None,
        }
    }

    pub fn from_config(config: &DashboardConfig) -> Self {
        Self::new(
            config.protected_prefixes.clone(),
            config.login_route.as_str(),
            config.home_route.as_str(),
        )
    }

    pub fn login_route(&self) -> &str {
        &self.login_route
    }

    pub fn home_route(&self) -> &str {
        &self.home_route
    }

    /// `true` if `route` is a protected prefix or lies below one.
    /// `/users/7` is under `/users`; `/usersettings` is not.
    pub fn is_protected(&self, route: &str) -> bool {
        let route = normalize(route);
        self.protected_prefixes.iter().any(|prefix| {
            route == prefix
                || route
                    .strip_prefix(prefix.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }

    /// Where `route` must go in `state`, without deduplication.
    pub fn target(&self, state: AuthState, route: &str) -> Option<&str> {
        let route = normalize(route);
        match state {
            AuthState::Unknown => None,
            AuthState::Unauthenticated if self.is_protected(route) => Some(self.login_route.as_str()),
            AuthState::Authenticated if route == self.login_route => Some(self.home_route.as_str()),
            _ => None,
        }
    }

    /// Evaluates the rules for the current (state, route).
    ///
    /// Returns a redirect only the first time a given pair needs one.
    pub fn check(&mut self, state: AuthState, route: &str) -> Option<Redirect> {
        if !state.is_resolved() {
            return None;
        }
        let route = normalize(route).to_string();
        let seen = (state, route);
        if self.last_seen.as_ref() == Some(&seen) {
            return None;
        }
        let redirect = self.target(state, &seen.1).map(|to| Redirect {
            from: seen.1.clone(),
            to: to.to_string(),
        });
        if let Some(r) = &redirect {
            debug!(state = %state, from = %r.from, to = %r.to, "guard redirect");
        }
        self.last_seen = Some(seen);
        redirect
    }
}

/// Drops a query string and trailing slashes (the root stays `/`).
fn normalize(route: &str) -> &str {
    let path = route.split(['?', '#']).next().unwrap_or(route);
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() { "/" } else { trimmed }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard() -> AuthGuard {
        AuthGuard::from_config(&DashboardConfig::default())
    }

    #[test]
    fn unknown_state_never_redirects() {
        let mut g = guard();
        assert_eq!(g.check(AuthState::Unknown, "/dashboard"), None);
        assert_eq!(g.check(AuthState::Unknown, "/login"), None);
    }

    #[test]
    fn protected_route_without_session_redirects_once() {
        let mut g = guard();
        let first = g.check(AuthState::Unauthenticated, "/dashboard");
        assert_eq!(
            first,
            Some(Redirect {
                from: "/dashboard".into(),
                to: "/login".into()
            })
        );
        assert_eq!(g.check(AuthState::Unauthenticated, "/dashboard"), None);
        assert_eq!(g.check(AuthState::Unauthenticated, "/dashboard/"), None);
    }

    #[test]
    fn login_with_session_redirects_once() {
        let mut g = guard();
        assert_eq!(g.check(AuthState::Unauthenticated, "/login"), None);
        let redirect = g.check(AuthState::Authenticated, "/login").unwrap();
        assert_eq!(redirect.to, "/dashboard");
        assert_eq!(g.check(AuthState::Authenticated, "/login"), None);
    }

    #[test]
    fn revisiting_after_navigation_redirects_again() {
        let mut g = guard();
        assert!(g.check(AuthState::Unauthenticated, "/users").is_some());
        assert!(g.check(AuthState::Unauthenticated, "/login").is_none());
        assert!(g.check(AuthState::Unauthenticated, "/users/42").is_some());
    }

    #[test]
    fn prefix_matching_respects_segments() {
        let g = guard();
        assert!(g.is_protected("/users"));
        assert!(g.is_protected("/users/7?tab=history"));
        assert!(!g.is_protected("/usersettings"));
        assert!(!g.is_protected("/"));
        assert!(!g.is_protected("/login"));
    }

    #[test]
    fn public_routes_pass_in_every_state() {
        let g = guard();
        for state in [AuthState::Authenticated, AuthState::Unauthenticated] {
            assert_eq!(g.target(state, "/"), None);
        }
        assert_eq!(g.target(AuthState::Authenticated, "/dashboard"), None);
    }

    #[test]
    fn custom_routes() {
        let g = AuthGuard::new(vec!["/admin/".into()], "/masuk", "/admin");
        assert_eq!(g.target(AuthState::Unauthenticated, "/admin/users"), Some("/masuk"));
        assert_eq!(g.target(AuthState::Authenticated, "/masuk"), Some("/admin"));
        assert_eq!(g.login_route(), "/masuk");
    }
}
