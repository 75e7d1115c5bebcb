//! Composite rule over a fixed set of child rules.

use std::any::Any;
use std::sync::Arc;

use super::rule::{rules_conflict, rules_contain, RuleRef, SchedulingRule};

/// A rule representing the union of several child rules.
///
/// Built once and immutable afterward. Composite arguments are flattened at
/// construction, so no direct child is ever a `MultiRule`.
#[derive(Debug, Clone, Default)]
pub struct MultiRule {
    rules: Vec<RuleRef>,
}

impl MultiRule {
    /// Build a composite of `rules`, splicing in the children of any composite argument.
    pub fn new<I>(rules: I) -> Self
    where
        I: IntoIterator<Item = RuleRef>,
    {
        let mut flat = Vec::new();
        for rule in rules {
            match rule.as_any().downcast_ref::<Self>() {
                Some(multi) => flat.extend(multi.rules.iter().cloned()),
                None => flat.push(rule),
            }
        }
        Self { rules: flat }
    }

    /// The "no resource" rule: conflicts with nothing.
    #[must_use]
    pub const fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Flattened children.
    #[must_use]
    pub fn children(&self) -> &[RuleRef] {
        &self.rules
    }

    /// Number of flattened children.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether this composite has no children.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Smallest rule covering both arguments.
    ///
    /// A missing rule combined with `x` is `x`; when one rule contains the
    /// other the container is returned as is.
    #[must_use]
    pub fn combine(a: Option<RuleRef>, b: Option<RuleRef>) -> Option<RuleRef> {
        match (a, b) {
            (None, b) => b,
            (a, None) => a,
            (Some(a), Some(b)) => {
                if rules_contain(a.as_ref(), b.as_ref()) {
                    Some(a)
                } else if rules_contain(b.as_ref(), a.as_ref()) {
                    Some(b)
                } else {
                    Some(Arc::new(Self::new([a, b])))
                }
            }
        }
    }

    /// Whether an atomic `outer` covers every child. Empty composites are covered only by composites.
    pub(crate) fn is_contained_by(&self, outer: &dyn SchedulingRule) -> bool {
        !self.rules.is_empty() && self.rules.iter().all(|r| outer.contains(r.as_ref()))
    }
}

impl SchedulingRule for MultiRule {
    fn contains(&self, other: &dyn SchedulingRule) -> bool {
        if std::ptr::addr_eq(self as *const Self, other as *const dyn SchedulingRule) {
            return true;
        }
        if let Some(multi) = other.as_any().downcast_ref::<Self>() {
            // The empty composite sits under no rule but another empty one.
            if multi.rules.is_empty() {
                return self.rules.is_empty();
            }
            return multi
                .rules
                .iter()
                .all(|o| self.rules.iter().any(|r| r.contains(o.as_ref())));
        }
        self.rules.iter().any(|r| r.contains(other))
    }

    fn is_conflicting(&self, other: &dyn SchedulingRule) -> bool {
        if let Some(multi) = other.as_any().downcast_ref::<Self>() {
            return self.rules.iter().any(|r| {
                multi
                    .rules
                    .iter()
                    .any(|o| rules_conflict(r.as_ref(), o.as_ref()))
            });
        }
        self.rules.iter().any(|r| r.is_conflicting(other))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
