//! Deterministic cache keys built from identity tuples.
//!
//! A key is the family prefix followed by each identity component, joined with
//! [`SEPARATOR`]. Concrete components are percent-encoded, so an encoded value
//! never contains the separator, the [`WILDCARD`] or the [`ABSENT`] marker.
//! Two consequences follow:
//!
//! - rendering is injective: distinct tuples always render distinct keys
//! - a pattern can only match keys of its own family and, when scoped, of the
//!   same concrete scope value

use shopfront_core::{CacheError, EntityFamily, KeyShape};
use std::borrow::Cow;
use std::fmt;

/// Separator between the prefix and each component.
pub const SEPARATOR: &str = "::";

/// Marker for an unset component in an enumeration pattern.
pub const WILDCARD: &str = "*";

/// Marker for a component that is concretely empty (a cart line without a
/// variant). Distinct from [`WILDCARD`], which matches anything.
pub const ABSENT: &str = "!";

/// One component of an identity tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyPart {
    /// Concrete scalar value.
    Value(String),
    /// Concretely absent value.
    Absent,
    /// Unset; renders as [`WILDCARD`].
    Unset,
}

impl KeyPart {
    pub fn value(value: impl ToString) -> Self {
        KeyPart::Value(value.to_string())
    }

    /// `None` becomes [`KeyPart::Absent`], not a wildcard.
    pub fn optional<T: ToString>(value: Option<T>) -> Self {
        match value {
            Some(v) => KeyPart::value(v),
            None => KeyPart::Absent,
        }
    }

    fn render(&self) -> Cow<'_, str> {
        match self {
            KeyPart::Value(v) => urlencoding::encode(v),
            KeyPart::Absent => Cow::Borrowed(ABSENT),
            KeyPart::Unset => Cow::Borrowed(WILDCARD),
        }
    }
}

/// A rendered cache key or enumeration pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Render `parts` under `family`'s prefix.
    ///
    /// Parts beyond the family's arity are ignored and missing trailing parts
    /// render as wildcards, so a short tuple always produces a pattern rather
    /// than a key that collides with a concrete one.
    pub fn new(family: EntityFamily, parts: &[KeyPart]) -> Self {
        let arity = family.key_shape().arity();
        let mut key = String::from(family.prefix());
        for i in 0..arity {
            key.push_str(SEPARATOR);
            match parts.get(i) {
                Some(part) => key.push_str(&part.render()),
                None => key.push_str(WILDCARD),
            }
        }
        Self(key)
    }

    /// `prefix::id` for single-key families.
    pub fn simple(family: EntityFamily, id: impl ToString) -> Self {
        debug_assert_eq!(family.key_shape(), KeyShape::Simple);
        Self::new(family, &[KeyPart::value(id)])
    }

    /// `prefix::comp1::comp2::...` for tuple-keyed families.
    pub fn composite(family: EntityFamily, parts: &[KeyPart]) -> Self {
        Self::new(family, parts)
    }

    /// Pattern matching every key of `family`.
    pub fn family_pattern(family: EntityFamily) -> Self {
        Self::new(family, &[])
    }

    /// Wrap a raw key returned by the store, checking it belongs to `family`.
    pub fn from_raw(family: EntityFamily, raw: impl Into<String>) -> Result<Self, CacheError> {
        let raw = raw.into();
        let expected = family.key_shape().arity() + 1;
        let mut components = raw.split(SEPARATOR);
        let prefix_ok = components.next() == Some(family.prefix());
        if !prefix_ok || raw.split(SEPARATOR).count() != expected {
            return Err(CacheError::ForeignKey { key: raw, family });
        }
        Ok(Self(raw))
    }

    /// Wrap a key the store already matched against a family pattern.
    pub(crate) fn from_raw_unchecked(raw: String) -> Self {
        Self(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Whether any component is a wildcard.
    pub fn is_pattern(&self) -> bool {
        self.0.split(SEPARATOR).skip(1).any(|c| c == WILDCARD)
    }

    /// Whether this key matches `pattern`, with `*` matching any run of
    /// characters (Redis `MATCH` semantics restricted to `*`).
    pub fn matches(&self, pattern: &CacheKey) -> bool {
        glob_match(pattern.as_str(), self.as_str())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// `*`-only glob match with single-point backtracking.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let p = pattern.as_bytes();
    let t = text.as_bytes();
    let (mut pi, mut ti) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && p[pi] == b'*' {
            star = Some((pi, ti));
            pi += 1;
        } else if pi < p.len() && p[pi] == t[ti] {
            pi += 1;
            ti += 1;
        } else if let Some((star_pi, star_ti)) = star {
            pi = star_pi + 1;
            ti = star_ti + 1;
            star = Some((star_pi, star_ti + 1));
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == b'*' {
        pi += 1;
    }
    pi == p.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_key_shape() {
        let key = CacheKey::simple(EntityFamily::Category, "abc");
        assert_eq!(key.as_str(), "category::abc");
        assert!(!key.is_pattern());
    }

    #[test]
    fn test_composite_key_with_absent_variant() {
        let key = CacheKey::composite(
            EntityFamily::Cart,
            &[KeyPart::value("u1"), KeyPart::value("p1"), KeyPart::Absent],
        );
        assert_eq!(key.as_str(), "cart::u1::p1::!");
        assert!(!key.is_pattern());
    }

    #[test]
    fn test_scope_pattern() {
        let pattern = CacheKey::composite(EntityFamily::Cart, &[KeyPart::value("u1")]);
        assert_eq!(pattern.as_str(), "cart::u1::*::*");
        assert!(pattern.is_pattern());
        assert_eq!(CacheKey::family_pattern(EntityFamily::MediaItem).as_str(), "media::*");
    }

    #[test]
    fn test_reserved_characters_are_encoded() {
        let key = CacheKey::simple(EntityFamily::User, "a::b*!");
        assert_eq!(key.as_str(), "user::a%3A%3Ab%2A%21");
        assert!(!key.is_pattern());
    }

    #[test]
    fn test_absent_is_not_wildcard() {
        let absent = CacheKey::composite(
            EntityFamily::Cart,
            &[KeyPart::value("u"), KeyPart::value("p"), KeyPart::Absent],
        );
        let concrete = CacheKey::composite(
            EntityFamily::Cart,
            &[KeyPart::value("u"), KeyPart::value("p"), KeyPart::value("v")],
        );
        assert_ne!(absent, concrete);
        assert!(!concrete.matches(&absent));
    }

    #[test]
    fn test_pattern_does_not_cross_users() {
        let pattern = CacheKey::composite(EntityFamily::Cart, &[KeyPart::value("u1")]);
        let other = CacheKey::composite(
            EntityFamily::Cart,
            &[KeyPart::value("u10"), KeyPart::value("p"), KeyPart::Absent],
        );
        let own = CacheKey::composite(
            EntityFamily::Cart,
            &[KeyPart::value("u1"), KeyPart::value("p"), KeyPart::Absent],
        );
        assert!(own.matches(&pattern));
        assert!(!other.matches(&pattern));
    }

    #[test]
    fn test_pattern_does_not_cross_families() {
        let pattern = CacheKey::family_pattern(EntityFamily::Category);
        let sub = CacheKey::simple(EntityFamily::Subcategory, "x");
        assert!(!sub.matches(&pattern));
    }

    #[test]
    fn test_from_raw_checks_family() {
        assert!(CacheKey::from_raw(EntityFamily::Category, "category::x").is_ok());
        assert!(CacheKey::from_raw(EntityFamily::Category, "subcategory::x").is_err());
        assert!(CacheKey::from_raw(EntityFamily::Wishlist, "wishlist::u").is_err());
    }

    #[test]
    fn test_glob_match() {
        assert!(glob_match("*", ""));
        assert!(glob_match("a*c", "abbbc"));
        assert!(glob_match("a::*::*", "a::x::y"));
        assert!(!glob_match("a::*::*", "a::x"));
        assert!(!glob_match("abc", "abcd"));
    }
}
