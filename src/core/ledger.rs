//! Registry of the rule each running job or synchronous rule holder holds.

use std::collections::HashMap;
use std::fmt;
use std::thread::ThreadId;

use uuid::Uuid;

use super::job::JobId;
use super::rule::{rules_conflict, RuleRef, SchedulingRule};

/// Identity of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleHolder {
    /// A running job.
    Job(JobId),
    /// A thread using the thread-keyed `begin_rule`/`end_rule` calls.
    Thread(ThreadId),
    /// An explicit acquisition context.
    Context(Uuid),
}

impl fmt::Display for RuleHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Job(id) => write!(f, "job:{id}"),
            Self::Thread(id) => write!(f, "thread:{id:?}"),
            Self::Context(id) => write!(f, "context:{id}"),
        }
    }
}

/// Mapping from holder to held rule. Owned by the scheduler and mutated only
/// under its global lock.
#[derive(Debug, Default)]
pub struct RuleLedger {
    held: HashMap<RuleHolder, RuleRef>,
}

impl RuleLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `rule` as held by `holder`, returning any rule it replaced.
    pub fn insert(&mut self, holder: RuleHolder, rule: RuleRef) -> Option<RuleRef> {
        self.held.insert(holder, rule)
    }

    /// Drop the entry for `holder`.
    pub fn remove(&mut self, holder: &RuleHolder) -> Option<RuleRef> {
        self.held.remove(holder)
    }

    /// Rule held by `holder`.
    #[must_use]
    pub fn get(&self, holder: &RuleHolder) -> Option<&RuleRef> {
        self.held.get(holder)
    }

    /// First holder whose rule conflicts with `rule`.
    #[must_use]
    pub fn find_conflict(&self, rule: &dyn SchedulingRule) -> Option<RuleHolder> {
        self.held
            .iter()
            .find(|(_, held)| rules_conflict(rule, held.as_ref()))
            .map(|(holder, _)| *holder)
    }

    /// Whether `rule` conflicts with nothing currently held.
    #[must_use]
    pub fn is_free(&self, rule: &dyn SchedulingRule) -> bool {
        self.find_conflict(rule).is_none()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.held.len()
    }

    /// Whether nothing is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }

    /// Copy of every entry.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(RuleHolder, RuleRef)> {
        self.held
            .iter()
            .map(|(holder, rule)| (*holder, RuleRef::clone(rule)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{MultiRule, ResourceRule};
    use std::sync::Arc;

    #[test]
    fn test_find_conflict() {
        let mut ledger = RuleLedger::new();
        let holder = RuleHolder::Job(JobId::new());
        ledger.insert(holder, ResourceRule::shared("db"));

        assert_eq!(ledger.find_conflict(&ResourceRule::new("db")), Some(holder));
        assert!(ledger.is_free(&ResourceRule::new("cache")));
    }

    #[test]
    fn test_composite_holder_blocks_children() {
        let mut ledger = RuleLedger::new();
        let holder = RuleHolder::Thread(std::thread::current().id());
        let multi: RuleRef = Arc::new(MultiRule::new([
            ResourceRule::shared("a"),
            ResourceRule::shared("b"),
        ]));
        ledger.insert(holder, multi);

        assert!(!ledger.is_free(&ResourceRule::new("b")));
        assert!(ledger.is_free(&ResourceRule::new("c")));
        assert!(ledger.is_free(&MultiRule::empty()));
    }

    #[test]
    fn test_remove_frees_rule() {
        let mut ledger = RuleLedger::new();
        let holder = RuleHolder::Context(Uuid::new_v4());
        ledger.insert(holder, ResourceRule::shared("db"));
        assert_eq!(ledger.len(), 1);
        assert!(ledger.remove(&holder).is_some());
        assert!(ledger.is_empty());
        assert!(ledger.is_free(&ResourceRule::new("db")));
    }
}
