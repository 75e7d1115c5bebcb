//! Scheduling rules: the conflict and containment contract that jobs and
//! synchronous callers declare.
//!
//! A rule answers two questions about another rule:
//!
//! - [`SchedulingRule::is_conflicting`]: may the two never be held at the same
//!   time? Must be reflexive, symmetric and consistent.
//! - [`SchedulingRule::contains`]: does this rule guard a superset of the other
//!   rule's resources? Must be reflexive, antisymmetric and transitive.
//!
//! Both predicates must answer `false` for rule types they do not recognize.
//! The scheduler calls them once per candidate/holder pair on every admission
//! pass, so implementations must not scan global state.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use super::multi_rule::MultiRule;
use super::SchedulerError;

/// A rule describing which other rules it conflicts with and which it subsumes.
///
/// # Example
///
/// ```
/// use std::any::Any;
/// use prometheus_rule_scheduler::core::SchedulingRule;
///
/// #[derive(Debug)]
/// struct Printer(u8);
///
/// impl SchedulingRule for Printer {
///     fn contains(&self, other: &dyn SchedulingRule) -> bool {
///         other.as_any().downcast_ref::<Self>().is_some_and(|o| o.0 == self.0)
///     }
///     fn is_conflicting(&self, other: &dyn SchedulingRule) -> bool {
///         self.contains(other)
///     }
///     fn as_any(&self) -> &dyn Any {
///         self
///     }
/// }
///
/// assert!(Printer(1).is_conflicting(&Printer(1)));
/// assert!(!Printer(1).is_conflicting(&Printer(2)));
/// ```
pub trait SchedulingRule: fmt::Debug + Send + Sync + 'static {
    /// Returns whether this rule guards every resource `other` guards.
    fn contains(&self, other: &dyn SchedulingRule) -> bool;

    /// Returns whether holders of this rule and `other` must never run concurrently.
    fn is_conflicting(&self, other: &dyn SchedulingRule) -> bool;

    /// Type recognition hook; implementations return `self`.
    fn as_any(&self) -> &dyn Any;
}

/// Shared handle to a rule.
pub type RuleRef = Arc<dyn SchedulingRule>;

fn as_multi(rule: &dyn SchedulingRule) -> Option<&MultiRule> {
    rule.as_any().downcast_ref::<MultiRule>()
}

/// Conflict test used by the scheduler.
///
/// When either side is a [`MultiRule`] the composite is asked, so a custom
/// atomic rule that does not recognize composites still yields a symmetric
/// answer.
#[must_use]
pub fn rules_conflict(a: &dyn SchedulingRule, b: &dyn SchedulingRule) -> bool {
    if as_multi(a).is_some() {
        return a.is_conflicting(b);
    }
    b.is_conflicting(a)
}

/// Containment test used for nesting validation.
///
/// An atomic `outer` asked about a composite `inner` contains it when it
/// contains every child, and the composite is not empty.
#[must_use]
pub fn rules_contain(outer: &dyn SchedulingRule, inner: &dyn SchedulingRule) -> bool {
    if as_multi(outer).is_none() {
        if let Some(multi) = as_multi(inner) {
            return multi.is_contained_by(outer);
        }
    }
    outer.contains(inner)
}

/// Returns whether two rules are the same rule: identical, or mutually containing.
#[must_use]
pub fn same_rule(a: &dyn SchedulingRule, b: &dyn SchedulingRule) -> bool {
    std::ptr::addr_eq(a as *const dyn SchedulingRule, b as *const dyn SchedulingRule)
        || (rules_contain(a, b) && rules_contain(b, a))
}

/// A rule no other rule recognizes; equal only to itself.
#[derive(Debug)]
struct ProbeRule {
    _tag: u8,
}

impl SchedulingRule for ProbeRule {
    fn contains(&self, other: &dyn SchedulingRule) -> bool {
        std::ptr::addr_eq(self as *const Self, other as *const dyn SchedulingRule)
    }

    fn is_conflicting(&self, other: &dyn SchedulingRule) -> bool {
        self.contains(other)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Check a rule against the contract the scheduler relies on.
///
/// # Errors
///
/// Returns [`SchedulerError::InvalidRule`] if `contains` or `is_conflicting` is
/// not reflexive, or if either answers `true` for an unknown rule type. The
/// empty [`MultiRule`] guards nothing and is exempt from conflict reflexivity.
pub fn validate_rule(rule: &dyn SchedulingRule) -> Result<(), SchedulerError> {
    let probe = ProbeRule { _tag: 0 };
    if !rule.contains(rule) {
        return Err(SchedulerError::InvalidRule(format!(
            "{rule:?}: contains is not reflexive"
        )));
    }
    if rule.contains(&probe) {
        return Err(SchedulerError::InvalidRule(format!(
            "{rule:?}: contains must be false for unknown rules"
        )));
    }
    if rule.is_conflicting(&probe) {
        return Err(SchedulerError::InvalidRule(format!(
            "{rule:?}: is_conflicting must be false for unknown rules"
        )));
    }
    let guards_nothing = as_multi(rule).is_some_and(MultiRule::is_empty);
    if !guards_nothing && !rule.is_conflicting(rule) {
        return Err(SchedulerError::InvalidRule(format!(
            "{rule:?}: is_conflicting is not reflexive"
        )));
    }
    Ok(())
}

/// Exclusive access to a named resource.
///
/// Conflicts with, and contains, exactly the resource rules of the same name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceRule {
    name: String,
}

impl ResourceRule {
    /// Create a rule guarding the resource `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Create a shared handle to a rule guarding the resource `name`.
    pub fn shared(name: impl Into<String>) -> RuleRef {
        Arc::new(Self::new(name))
    }

    /// Name of the guarded resource.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn matches(&self, other: &dyn SchedulingRule) -> bool {
        other
            .as_any()
            .downcast_ref::<Self>()
            .is_some_and(|o| o.name == self.name)
    }
}

impl SchedulingRule for ResourceRule {
    fn contains(&self, other: &dyn SchedulingRule) -> bool {
        if let Some(multi) = as_multi(other) {
            return multi.is_contained_by(self);
        }
        self.matches(other)
    }

    fn is_conflicting(&self, other: &dyn SchedulingRule) -> bool {
        if let Some(multi) = as_multi(other) {
            return multi.is_conflicting(self);
        }
        self.matches(other)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Hierarchical rule over a `/`-separated path.
///
/// A path contains itself and everything below it; two paths conflict when
/// either contains the other.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathRule {
    segments: Vec<String>,
}

impl PathRule {
    /// Create a rule for `path`. Empty segments are ignored, so `"/a//b/"` equals `"/a/b"`.
    #[must_use]
    pub fn new(path: &str) -> Self {
        Self {
            segments: path
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect(),
        }
    }

    /// Create a shared handle to a rule for `path`.
    #[must_use]
    pub fn shared(path: &str) -> RuleRef {
        Arc::new(Self::new(path))
    }

    /// Normalized path, always starting with `/`.
    #[must_use]
    pub fn path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }

    fn is_prefix_of(&self, other: &Self) -> bool {
        other.segments.starts_with(&self.segments)
    }
}

impl SchedulingRule for PathRule {
    fn contains(&self, other: &dyn SchedulingRule) -> bool {
        if let Some(multi) = as_multi(other) {
            return multi.is_contained_by(self);
        }
        other
            .as_any()
            .downcast_ref::<Self>()
            .is_some_and(|o| self.is_prefix_of(o))
    }

    fn is_conflicting(&self, other: &dyn SchedulingRule) -> bool {
        if let Some(multi) = as_multi(other) {
            return multi.is_conflicting(self);
        }
        other
            .as_any()
            .downcast_ref::<Self>()
            .is_some_and(|o| self.is_prefix_of(o) || o.is_prefix_of(self))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
