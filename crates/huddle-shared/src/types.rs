use serde::{Deserialize, Serialize};

use crate::constants::{CONVERSATION_KEY_PREFIX, FRIENDS_KEY_SUFFIX, PROFILE_KEY_PREFIX};

// User identity = the session token presented at connect time
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Store key of this user's friend set.
    pub fn friends_key(&self) -> String {
        format!("{PROFILE_KEY_PREFIX}{}{FRIENDS_KEY_SUFFIX}", self.0)
    }

    /// Store key of this user's serialized profile.
    pub fn profile_key(&self) -> String {
        format!("{PROFILE_KEY_PREFIX}{}", self.0)
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Order-independent identifier of a two-party conversation.
///
/// Built from `(max(a, b), min(a, b))`, so the key for `(a, b)` and `(b, a)`
/// is always the same. Ids are ordered by UTF-16 code units rather than UTF-8
/// bytes; the two disagree for non-ASCII ids and stored keys use the former.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversationKey {
    larger: UserId,
    lower: UserId,
}

impl ConversationKey {
    pub fn new(a: &UserId, b: &UserId) -> Self {
        if a.as_str().encode_utf16().ge(b.as_str().encode_utf16()) {
            Self {
                larger: a.clone(),
                lower: b.clone(),
            }
        } else {
            Self {
                larger: b.clone(),
                lower: a.clone(),
            }
        }
    }

    pub fn larger(&self) -> &UserId {
        &self.larger
    }

    pub fn lower(&self) -> &UserId {
        &self.lower
    }

    /// Store key of the conversation's sorted set (history + unread counter).
    pub fn store_key(&self) -> String {
        format!("{CONVERSATION_KEY_PREFIX}{}--{}", self.larger, self.lower)
    }
}

impl std::fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}--{}", self.larger, self.lower)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_key_is_order_independent() {
        let pairs = [("alice", "bob"), ("b", "a"), ("same", "same"), ("", "x"), ("10", "9")];
        for (a, b) in pairs {
            let a = UserId::from(a);
            let b = UserId::from(b);
            assert_eq!(ConversationKey::new(&a, &b), ConversationKey::new(&b, &a));
        }
    }

    #[test]
    fn test_conversation_key_uses_string_order() {
        // "9" > "10" lexicographically
        let key = ConversationKey::new(&UserId::from("10"), &UserId::from("9"));
        assert_eq!(key.larger().as_str(), "9");
        assert_eq!(key.lower().as_str(), "10");
        assert_eq!(key.store_key(), "user:messages:9--10");
    }

    #[test]
    fn test_conversation_key_orders_by_utf16_units() {
        // U+1F600 encodes as a surrogate pair (0xD83D ..), below U+FF01 in
        // UTF-16 but above it in UTF-8.
        let emoji = UserId::from("\u{1F600}");
        let fullwidth = UserId::from("\u{FF01}");
        assert!(emoji > fullwidth);

        let key = ConversationKey::new(&emoji, &fullwidth);
        assert_eq!(key.larger(), &fullwidth);
        assert_eq!(key.lower(), &emoji);
        assert_eq!(key, ConversationKey::new(&fullwidth, &emoji));
    }

    #[test]
    fn test_user_keys() {
        let user = UserId::from("u42");
        assert_eq!(user.friends_key(), "user:u42:Friends");
        assert_eq!(user.profile_key(), "user:u42");
    }
}
