//! Cache key schema
//!
//! Three key families exist: `discovery:{userId}`, `active:{userId}` and
//! `detail:{workspaceId}`. Ids are canonicalised before formatting so the same entity always
//! maps to the same key, whether it arrives as a [`Uuid`] or as a raw string.

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter, Result as FmtResult};
use uuid::Uuid;

/// Canonical string form of an identifier.
pub trait CanonicalId {
    fn canonical_id(&self) -> String;
}

impl CanonicalId for Uuid {
    fn canonical_id(&self) -> String {
        self.hyphenated().to_string()
    }
}

impl CanonicalId for str {
    fn canonical_id(&self) -> String {
        let trimmed = self.trim();
        match Uuid::parse_str(trimmed) {
            Ok(id) => id.canonical_id(),
            Err(_) => trimmed.to_string(),
        }
    }
}

impl CanonicalId for String {
    fn canonical_id(&self) -> String {
        self.as_str().canonical_id()
    }
}

impl<T: CanonicalId + ?Sized> CanonicalId for &T {
    fn canonical_id(&self) -> String {
        (**self).canonical_id()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CacheKey {
    /// Workspaces the user may discover (non-member)
    Discovery(String),
    /// Workspaces the user belongs to
    Active(String),
    /// Full workspace document
    Detail(String),
}

impl CacheKey {
    pub fn discovery(user_id: impl CanonicalId) -> Self {
        CacheKey::Discovery(user_id.canonical_id())
    }

    pub fn active(user_id: impl CanonicalId) -> Self {
        CacheKey::Active(user_id.canonical_id())
    }

    pub fn detail(workspace_id: impl CanonicalId) -> Self {
        CacheKey::Detail(workspace_id.canonical_id())
    }

    /// Both per-user keys for `user_id`.
    pub fn user_keys(user_id: impl CanonicalId) -> [CacheKey; 2] {
        let id = user_id.canonical_id();
        [CacheKey::Active(id.clone()), CacheKey::Discovery(id)]
    }

    /// Keys a mutation on `workspace_id` must invalidate: the workspace detail plus the
    /// active/discovery views of the requester and of every user whose membership changed.
    pub fn invalidation_set<I>(workspace_id: Uuid, requester: Uuid, affected: I) -> Vec<CacheKey>
    where
        I: IntoIterator<Item = Uuid>,
    {
        let mut keys = BTreeSet::new();
        keys.insert(CacheKey::detail(workspace_id));
        keys.extend(CacheKey::user_keys(requester));
        for user in affected {
            keys.extend(CacheKey::user_keys(user));
        }
        keys.into_iter().collect()
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            CacheKey::Discovery(id) => write!(f, "discovery:{}", id),
            CacheKey::Active(id) => write!(f, "active:{}", id),
            CacheKey::Detail(id) => write!(f, "detail:{}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_format() {
        let id = Uuid::parse_str("6f9619ff-8b86-d011-b42d-00cf4fc964ff").unwrap();
        assert_eq!(
            CacheKey::detail(id).to_string(),
            "detail:6f9619ff-8b86-d011-b42d-00cf4fc964ff"
        );
        assert_eq!(
            CacheKey::active(id).to_string(),
            "active:6f9619ff-8b86-d011-b42d-00cf4fc964ff"
        );
        assert_eq!(
            CacheKey::discovery(id).to_string(),
            "discovery:6f9619ff-8b86-d011-b42d-00cf4fc964ff"
        );
    }

    #[test]
    fn test_string_and_uuid_forms_agree() {
        let id = Uuid::new_v4();
        let upper = id.hyphenated().to_string().to_uppercase();
        let braced = format!("{{{}}}", id);
        let simple = id.simple().to_string();

        assert_eq!(CacheKey::detail(id), CacheKey::detail(upper.as_str()));
        assert_eq!(CacheKey::detail(id), CacheKey::detail(braced));
        assert_eq!(CacheKey::detail(id), CacheKey::detail(&simple));
    }

    #[test]
    fn test_non_uuid_ids_are_trimmed() {
        assert_eq!(
            CacheKey::active(" user-42 ").to_string(),
            "active:user-42"
        );
    }

    #[test]
    fn test_invalidation_set_covers_requester_and_affected() {
        let ws = Uuid::new_v4();
        let requester = Uuid::new_v4();
        let affected = Uuid::new_v4();

        let keys = CacheKey::invalidation_set(ws, requester, [affected, requester]);
        assert_eq!(keys.len(), 5);
        assert!(keys.contains(&CacheKey::detail(ws)));
        assert!(keys.contains(&CacheKey::active(requester)));
        assert!(keys.contains(&CacheKey::discovery(requester)));
        assert!(keys.contains(&CacheKey::active(affected)));
        assert!(keys.contains(&CacheKey::discovery(affected)));
    }
}
