//! Tests for the built-in rules and the rule contract checks

use std::any::Any;
use std::sync::Arc;

use prometheus_rule_scheduler::core::{
    rules_conflict, rules_contain, same_rule, validate_rule, Job, JobResult, MultiRule, PathRule,
    ResourceRule, RuleRef, SchedulerError, SchedulingRule,
};

/// Claims to contain everything, which breaks the contract.
#[derive(Debug)]
struct Greedy;

impl SchedulingRule for Greedy {
    fn contains(&self, _other: &dyn SchedulingRule) -> bool {
        true
    }

    fn is_conflicting(&self, _other: &dyn SchedulingRule) -> bool {
        true
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Never conflicts, not even with itself.
#[derive(Debug)]
struct Shy;

impl SchedulingRule for Shy {
    fn contains(&self, other: &dyn SchedulingRule) -> bool {
        other.as_any().is::<Self>()
    }

    fn is_conflicting(&self, _other: &dyn SchedulingRule) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[test]
fn test_builtin_rules_are_valid() {
    assert!(validate_rule(&ResourceRule::new("db")).is_ok());
    assert!(validate_rule(&PathRule::new("/a/b")).is_ok());
    assert!(validate_rule(&MultiRule::new([ResourceRule::shared("a"), PathRule::shared("/x")])).is_ok());
    assert!(validate_rule(&MultiRule::empty()).is_ok());
}

#[test]
fn test_contract_violations_rejected() {
    assert!(matches!(validate_rule(&Greedy), Err(SchedulerError::InvalidRule(_))));
    assert!(matches!(validate_rule(&Shy), Err(SchedulerError::InvalidRule(_))));

    let job = Job::from_fn("bad", |_| JobResult::Ok);
    let rule: RuleRef = Arc::new(Greedy);
    assert!(job.set_rule(Some(rule)).is_err());
    assert!(job.rule().is_none());
}

#[test]
fn test_path_rule_hierarchy() {
    let root = PathRule::new("/project");
    let file = PathRule::new("/project/src/main.rs");
    let sibling = PathRule::new("/projects");

    assert!(rules_contain(&root, &file));
    assert!(!rules_contain(&file, &root));
    assert!(rules_conflict(&root, &file));
    assert!(rules_conflict(&file, &root));
    assert!(!rules_conflict(&root, &sibling));
    assert_eq!(PathRule::new("/a//b/").path(), "/a/b");
}

#[test]
fn test_resource_and_path_rules_never_interact() {
    let resource = ResourceRule::new("/a");
    let path = PathRule::new("/a");
    assert!(!rules_conflict(&resource, &path));
    assert!(!rules_contain(&resource, &path));
    assert!(!rules_contain(&path, &resource));
}

#[test]
fn test_multi_rule_flattening_and_conflict() {
    let inner = MultiRule::new([ResourceRule::shared("a"), ResourceRule::shared("b")]);
    let outer = MultiRule::new([Arc::new(inner) as RuleRef, ResourceRule::shared("c")]);
    assert_eq!(outer.len(), 3);
    assert!(outer
        .children()
        .iter()
        .all(|child| child.as_any().downcast_ref::<MultiRule>().is_none()));

    assert!(rules_conflict(&outer, &ResourceRule::new("b")));
    assert!(rules_conflict(&ResourceRule::new("b"), &outer));
    assert!(!rules_conflict(&outer, &ResourceRule::new("d")));
}

#[test]
fn test_multi_rule_containment() {
    let ab = MultiRule::new([ResourceRule::shared("a"), ResourceRule::shared("b")]);
    let a_only = MultiRule::new([ResourceRule::shared("a")]);

    assert!(rules_contain(&ab, &ResourceRule::new("a")));
    assert!(rules_contain(&ab, &a_only));
    assert!(!rules_contain(&a_only, &ab));
    assert!(rules_contain(&ResourceRule::new("a"), &a_only));
    assert!(!rules_contain(&ResourceRule::new("a"), &MultiRule::empty()));
}

#[test]
fn test_multi_rule_combine() {
    let a = ResourceRule::shared("a");
    let b = ResourceRule::shared("b");

    assert!(MultiRule::combine(None, None).is_none());
    let only = MultiRule::combine(Some(a.clone()), None).expect("one side");
    assert!(same_rule(only.as_ref(), a.as_ref()));

    let both = MultiRule::combine(Some(a), Some(b)).expect("both sides");
    assert!(rules_conflict(both.as_ref(), &ResourceRule::new("a")));
    assert!(rules_conflict(both.as_ref(), &ResourceRule::new("b")));
}

#[test]
fn test_same_rule_identity_and_equivalence() {
    let a = ResourceRule::shared("a");
    assert!(same_rule(a.as_ref(), a.as_ref()));
    assert!(same_rule(a.as_ref(), &ResourceRule::new("a")));
    assert!(!same_rule(a.as_ref(), &ResourceRule::new("b")));
    assert!(same_rule(&PathRule::new("/x/y"), &PathRule::new("x/y/")));
}
