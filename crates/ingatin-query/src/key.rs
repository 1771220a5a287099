// SPDX-FileCopyrightText: 2026 Ingat-In Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hierarchical cache keys.

use std::fmt;

use ingatin_core::UserId;

/// Ordered tuple of string segments identifying a cache entry.
///
/// Invalidation and cancellation match by prefix: `["users"]` covers
/// `["users"]` and every `["users", <id>]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Same key with one more segment.
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    /// `true` if `prefix` is a leading run of this key's segments.
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}

impl<const N: usize> From<[&str; N]> for QueryKey {
    fn from(segments: [&str; N]) -> Self {
        Self::new(segments)
    }
}

/// Keys of the `users` queries.
pub mod user_keys {
    use super::*;

    const ROOT: &str = "users";

    /// `["users"]`: the list, and the prefix of every user query.
    pub fn all() -> QueryKey {
        QueryKey::new([ROOT])
    }

    /// `["users", id]`
    pub fn detail(id: &UserId) -> QueryKey {
        all().child(id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_matching() {
        let list = user_keys::all();
        let detail = user_keys::detail(&UserId::from("42"));
        assert!(detail.starts_with(&list));
        assert!(list.starts_with(&list));
        assert!(!list.starts_with(&detail));
        assert!(!QueryKey::from(["usersX"]).starts_with(&list));
    }

    #[test]
    fn display_lists_segments() {
        assert_eq!(user_keys::detail(&UserId::from("7")).to_string(), "[users, 7]");
    }
}
