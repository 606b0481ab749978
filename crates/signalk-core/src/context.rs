//! Self vessel resolution.
//!
//! Consumers address their own vessel as `self.navigation.headingTrue`; the
//! store keeps the concrete form `vessels.<urn>.navigation.headingTrue`.
//! [`SelfContext`] holds the identity learned from the first snapshot and
//! rewrites paths in both directions.

use crate::path::{join, strip_segment_prefix};

const SELF_ALIAS: &str = "self";
const VESSELS_SELF: &str = "vessels.self";

/// Top-level groups of the SignalK full model that hold contexts.
pub const TOP_LEVEL_GROUPS: &[&str] = &["vessels", "aircraft", "aton", "sar", "shore"];

/// The self vessel identity of the current session.
#[derive(Debug, Clone, Default)]
pub struct SelfContext {
    /// Identity as declared, e.g. "urn:mrn:signalk:uuid:..."
    identity: Option<String>,
    /// Concrete tree prefix, e.g. "vessels.urn:mrn:signalk:uuid:..."
    prefix: Option<String>,
}

impl SelfContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the self identity.
    ///
    /// Accepts both `urn:...` and `vessels.urn:...`. Calling this again
    /// overwrites the identity; the session treats a different identity as
    /// a reset signal before getting here.
    pub fn set_self(&mut self, identity: &str) {
        self.prefix = Some(Self::vessel_prefix(identity));
        self.identity = Some(identity.to_string());
    }

    /// The identity as it was declared.
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// The concrete tree prefix for self paths.
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn is_set(&self) -> bool {
        self.prefix.is_some()
    }

    pub fn clear(&mut self) {
        self.identity = None;
        self.prefix = None;
    }

    /// Rewrite a leading `self` or `vessels.self` to the concrete prefix.
    ///
    /// Other paths, and every path while no identity is known, pass through.
    pub fn resolve(&self, path: &str) -> String {
        let Some(prefix) = &self.prefix else {
            return path.to_string();
        };
        let rest = strip_segment_prefix(path, VESSELS_SELF)
            .or_else(|| strip_segment_prefix(path, SELF_ALIAS));
        match rest {
            Some(rest) => join(prefix, rest),
            None => path.to_string(),
        }
    }

    /// Rewrite the concrete prefix back to the `self` alias.
    pub fn unresolve(&self, path: &str) -> String {
        let rest = self
            .prefix
            .as_deref()
            .and_then(|prefix| strip_segment_prefix(path, prefix));
        match rest {
            Some(rest) => join(SELF_ALIAS, rest),
            None => path.to_string(),
        }
    }

    /// Whether a delta context names the self vessel.
    ///
    /// `vessels.self` always does once an identity is known; otherwise both
    /// identity forms are compared after normalization.
    pub fn is_self(&self, context: &str) -> bool {
        let Some(prefix) = &self.prefix else {
            return false;
        };
        context == VESSELS_SELF || context == SELF_ALIAS || Self::vessel_prefix(context) == *prefix
    }

    /// Normalize an identity or context to its tree prefix.
    ///
    /// Bare identifiers (`urn:...`) are vessels; contexts that already name
    /// a top-level group are kept as they are.
    pub fn vessel_prefix(identity: &str) -> String {
        let grouped = TOP_LEVEL_GROUPS
            .iter()
            .any(|group| strip_segment_prefix(identity, group).is_some_and(|rest| !rest.is_empty()));
        if grouped {
            identity.to_string()
        } else {
            format!("vessels.{identity}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> SelfContext {
        let mut ctx = SelfContext::new();
        ctx.set_self("urn:mrn:signalk:uuid:test-vessel");
        ctx
    }

    #[test]
    fn test_resolve_self_alias() {
        let ctx = context();
        assert_eq!(
            ctx.resolve("self.navigation.headingTrue"),
            "vessels.urn:mrn:signalk:uuid:test-vessel.navigation.headingTrue"
        );
        assert_eq!(
            ctx.resolve("vessels.self.navigation.headingTrue"),
            "vessels.urn:mrn:signalk:uuid:test-vessel.navigation.headingTrue"
        );
        assert_eq!(ctx.resolve("self"), "vessels.urn:mrn:signalk:uuid:test-vessel");
    }

    #[test]
    fn test_resolve_passthrough() {
        let ctx = context();
        assert_eq!(
            ctx.resolve("vessels.urn:mrn:imo:mmsi:230099999.navigation.position"),
            "vessels.urn:mrn:imo:mmsi:230099999.navigation.position"
        );
        assert_eq!(ctx.resolve("selfSteering.mode"), "selfSteering.mode");

        let unset = SelfContext::new();
        assert_eq!(unset.resolve("self.navigation.headingTrue"), "self.navigation.headingTrue");
    }

    #[test]
    fn test_unresolve() {
        let ctx = context();
        assert_eq!(
            ctx.unresolve("vessels.urn:mrn:signalk:uuid:test-vessel.environment.wind.speedTrue"),
            "self.environment.wind.speedTrue"
        );
        assert_eq!(
            ctx.unresolve("vessels.urn:mrn:imo:mmsi:1.navigation.position"),
            "vessels.urn:mrn:imo:mmsi:1.navigation.position"
        );
    }

    #[test]
    fn test_identity_forms_are_equivalent() {
        let mut prefixed = SelfContext::new();
        prefixed.set_self("vessels.urn:mrn:signalk:uuid:test-vessel");
        assert_eq!(prefixed.prefix(), context().prefix());
        assert_eq!(prefixed.identity(), Some("vessels.urn:mrn:signalk:uuid:test-vessel"));
    }

    #[test]
    fn test_is_self() {
        let ctx = context();
        assert!(ctx.is_self("urn:mrn:signalk:uuid:test-vessel"));
        assert!(ctx.is_self("vessels.urn:mrn:signalk:uuid:test-vessel"));
        assert!(ctx.is_self("vessels.self"));
        assert!(!ctx.is_self("vessels.urn:mrn:imo:mmsi:230099999"));

        assert!(!SelfContext::new().is_self("vessels.self"));
    }

    #[test]
    fn test_vessel_prefix() {
        assert_eq!(SelfContext::vessel_prefix("urn:mrn:imo:mmsi:1"), "vessels.urn:mrn:imo:mmsi:1");
        assert_eq!(SelfContext::vessel_prefix("vessels.urn:mrn:imo:mmsi:1"), "vessels.urn:mrn:imo:mmsi:1");
        assert_eq!(SelfContext::vessel_prefix("aton.urn:mrn:imo:mmsi:99"), "aton.urn:mrn:imo:mmsi:99");
    }

    #[test]
    fn test_clear() {
        let mut ctx = context();
        ctx.clear();
        assert!(!ctx.is_set());
        assert_eq!(ctx.identity(), None);
    }
}
