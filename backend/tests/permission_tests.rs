//! Permission tests for the Dairy ERP platform
//!
//! Covers the typed capability model:
//! - Capability keys use the `module.area:action` format and round-trip
//! - Keys naming an action the module does not offer are rejected
//! - Unknown keys in a token are reported, not silently granted
//! - The seeded role matrix

use proptest::prelude::*;
use shared::{Action, Capability, CapabilitySet, Module, SystemRole};

fn capability_strategy() -> impl Strategy<Value = Capability> {
    let all = Capability::all();
    (0..all.len()).prop_map(move |i| all[i])
}

fn action_strategy() -> impl Strategy<Value = Action> {
    prop_oneof![
        Just(Action::View),
        Just(Action::Create),
        Just(Action::Edit),
        Just(Action::Delete),
        Just(Action::Finalize),
        Just(Action::Import),
    ]
}

fn module_strategy() -> impl Strategy<Value = Module> {
    (0..Module::ALL.len()).prop_map(|i| Module::ALL[i])
}

// ============================================================================
// Capability keys
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Every known capability parses back from its key
    #[test]
    fn capability_key_round_trip(capability in capability_strategy()) {
        let key = capability.key();
        prop_assert_eq!(Capability::parse(&key), Some(capability));
        prop_assert_eq!(key, capability.to_string());
    }

    /// A module/action pair parses only when the module offers the action
    #[test]
    fn parse_respects_module_actions(module in module_strategy(), action in action_strategy()) {
        let key = format!("{}:{}", module.key(), action.as_str());
        let parsed = Capability::parse(&key);
        prop_assert_eq!(parsed.is_some(), module.actions().contains(&action));
    }

    /// Arbitrary strings never parse into a capability outside the known set
    #[test]
    fn arbitrary_keys_are_safe(key in "[a-z._:]{0,40}") {
        if let Some(c) = Capability::parse(&key) {
            prop_assert!(Capability::all().contains(&c));
        }
    }
}

#[test]
fn test_key_format() {
    let c = Capability::new(Module::SUMMARIES, Action::Finalize);
    assert_eq!(c.key(), "procurement.summaries:finalize");
    assert_eq!(
        Capability::new(Module::LAB_TESTS, Action::View).key(),
        "quality.lab_tests:view"
    );
}

#[test]
fn test_malformed_keys_are_rejected() {
    for key in [
        "",
        "procurement.summaries",
        "procurement.summaries:",
        ":view",
        "procurement.summaries:FINALIZE",
        "inventory.stock:view",
        "procurement.summaries:finalize:extra",
    ] {
        assert_eq!(Capability::parse(key), None, "{} should be rejected", key);
    }
}

#[test]
fn test_capability_keys_are_unique() {
    let all = Capability::all();
    let keys: std::collections::HashSet<String> = all.iter().map(Capability::key).collect();
    assert_eq!(keys.len(), all.len());
}

// ============================================================================
// Capability sets
// ============================================================================

#[test]
fn test_unknown_keys_are_reported() {
    let (set, unknown) = CapabilitySet::from_keys([
        "quality.lab_tests:view",
        "quality.lab_tests:approve",
        "legacy.admin",
    ]);
    assert_eq!(set.len(), 1);
    assert!(set.allows(Capability::new(Module::LAB_TESTS, Action::View)));
    assert_eq!(unknown, vec!["quality.lab_tests:approve", "legacy.admin"]);
}

#[test]
fn test_empty_set_allows_nothing() {
    let set = CapabilitySet::default();
    assert!(set.is_empty());
    for c in Capability::all() {
        assert!(!set.allows(c));
    }
}

// ============================================================================
// Role matrix
// ============================================================================

fn role_allows(role: SystemRole, module: Module, action: Action) -> bool {
    role.capabilities()
        .into_iter()
        .collect::<CapabilitySet>()
        .allows(Capability::new(module, action))
}

#[test]
fn test_admin_has_every_capability() {
    for c in Capability::all() {
        assert!(role_allows(SystemRole::Admin, c.module, c.action), "{}", c);
    }
}

#[test]
fn test_only_accountant_and_admin_finalize() {
    for role in SystemRole::ALL {
        let expected = matches!(role, SystemRole::Admin | SystemRole::Accountant);
        assert_eq!(
            role_allows(role, Module::SUMMARIES, Action::Finalize),
            expected,
            "{:?}",
            role
        );
    }
}

#[test]
fn test_collection_clerk_prepares_but_does_not_finalize() {
    let role = SystemRole::CollectionClerk;
    assert!(role_allows(role, Module::COLLECTIONS, Action::Create));
    assert!(role_allows(role, Module::SUMMARIES, Action::Edit));
    assert!(!role_allows(role, Module::SUMMARIES, Action::Finalize));
    assert!(!role_allows(role, Module::PARTNERS, Action::Import));
}

#[test]
fn test_quality_inspector_cannot_run_batches() {
    let role = SystemRole::QualityInspector;
    assert!(role_allows(role, Module::LAB_TESTS, Action::Delete));
    assert!(role_allows(role, Module::BATCHES, Action::View));
    assert!(!role_allows(role, Module::BATCHES, Action::Edit));
}

#[test]
fn test_role_capabilities_are_valid() {
    for role in SystemRole::ALL {
        for c in role.capabilities() {
            assert!(c.module.actions().contains(&c.action), "{:?} has {}", role, c);
        }
        assert!(!role.description().is_empty());
    }
}

#[test]
fn test_role_keys_match_wire_format() {
    for role in SystemRole::ALL {
        let json = serde_json::to_string(&role).unwrap();
        assert_eq!(json, format!("\"{}\"", role.key()));
    }
}
