//! Typed capabilities and the default role matrix
//!
//! A capability is a `(module, action)` pair. Modules are a closed set of
//! areas and sub-modules, so a permission check can only name something that
//! exists. Capabilities travel as string keys (`procurement.summaries:finalize`)
//! in tokens and in the `permissions` table.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityArea {
    LabTests,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductionArea {
    Batches,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcurementArea {
    Collections,
    Summaries,
    Partners,
    Vehicles,
    Contracts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdministrationArea {
    Roles,
}

/// Application module with its sub-module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Module {
    Quality(QualityArea),
    Production(ProductionArea),
    Procurement(ProcurementArea),
    Administration(AdministrationArea),
}

impl Module {
    pub const LAB_TESTS: Module = Module::Quality(QualityArea::LabTests);
    pub const BATCHES: Module = Module::Production(ProductionArea::Batches);
    pub const COLLECTIONS: Module = Module::Procurement(ProcurementArea::Collections);
    pub const SUMMARIES: Module = Module::Procurement(ProcurementArea::Summaries);
    pub const PARTNERS: Module = Module::Procurement(ProcurementArea::Partners);
    pub const VEHICLES: Module = Module::Procurement(ProcurementArea::Vehicles);
    pub const CONTRACTS: Module = Module::Procurement(ProcurementArea::Contracts);
    pub const ROLES: Module = Module::Administration(AdministrationArea::Roles);

    pub const ALL: [Module; 8] = [
        Module::LAB_TESTS,
        Module::BATCHES,
        Module::COLLECTIONS,
        Module::SUMMARIES,
        Module::PARTNERS,
        Module::VEHICLES,
        Module::CONTRACTS,
        Module::ROLES,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Module::Quality(QualityArea::LabTests) => "quality.lab_tests",
            Module::Production(ProductionArea::Batches) => "production.batches",
            Module::Procurement(ProcurementArea::Collections) => "procurement.collections",
            Module::Procurement(ProcurementArea::Summaries) => "procurement.summaries",
            Module::Procurement(ProcurementArea::Partners) => "procurement.partners",
            Module::Procurement(ProcurementArea::Vehicles) => "procurement.vehicles",
            Module::Procurement(ProcurementArea::Contracts) => "procurement.contracts",
            Module::Administration(AdministrationArea::Roles) => "administration.roles",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Module::ALL.into_iter().find(|m| m.key() == key)
    }

    /// Actions that make sense for this module
    pub fn actions(&self) -> &'static [Action] {
        use Action::*;
        match self {
            Module::Quality(_) => &[View, Create, Edit, Delete],
            Module::Production(_) => &[View, Create, Edit],
            Module::Procurement(ProcurementArea::Collections) => &[View, Create, Edit, Delete],
            Module::Procurement(ProcurementArea::Summaries) => &[View, Edit, Finalize],
            Module::Procurement(ProcurementArea::Partners) => &[View, Create, Edit, Import],
            Module::Procurement(ProcurementArea::Vehicles) => &[View, Create],
            Module::Procurement(ProcurementArea::Contracts) => &[View],
            Module::Administration(_) => &[View],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    View,
    Create,
    Edit,
    Delete,
    Finalize,
    Import,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::View => "view",
            Action::Create => "create",
            Action::Edit => "edit",
            Action::Delete => "delete",
            Action::Finalize => "finalize",
            Action::Import => "import",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "view" => Some(Action::View),
            "create" => Some(Action::Create),
            "edit" => Some(Action::Edit),
            "delete" => Some(Action::Delete),
            "finalize" => Some(Action::Finalize),
            "import" => Some(Action::Import),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Capability {
    pub module: Module,
    pub action: Action,
}

impl Capability {
    pub const fn new(module: Module, action: Action) -> Self {
        Self { module, action }
    }

    pub fn key(&self) -> String {
        format!("{}:{}", self.module.key(), self.action.as_str())
    }

    /// Parse a `module.sub:action` key. Pairs outside the module's action
    /// list are rejected.
    pub fn parse(key: &str) -> Option<Self> {
        let (module, action) = key.split_once(':')?;
        let module = Module::from_key(module)?;
        let action = Action::from_str(action)?;
        module
            .actions()
            .contains(&action)
            .then_some(Capability::new(module, action))
    }

    /// Every capability the system knows about
    pub fn all() -> Vec<Capability> {
        Module::ALL
            .iter()
            .flat_map(|m| m.actions().iter().map(|a| Capability::new(*m, *a)))
            .collect()
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.module.key(), self.action.as_str())
    }
}

/// Capabilities held by an authenticated user
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet(HashSet<Capability>);

impl CapabilitySet {
    /// Build from string keys, returning the keys that did not parse
    pub fn from_keys<I, S>(keys: I) -> (Self, Vec<String>)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = HashSet::new();
        let mut unknown = Vec::new();
        for key in keys {
            match Capability::parse(key.as_ref()) {
                Some(c) => {
                    set.insert(c);
                }
                None => unknown.push(key.as_ref().to_string()),
            }
        }
        (CapabilitySet(set), unknown)
    }

    pub fn allows(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<T: IntoIterator<Item = Capability>>(iter: T) -> Self {
        CapabilitySet(iter.into_iter().collect())
    }
}

/// Roles seeded at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SystemRole {
    Admin,
    QualityInspector,
    ProductionOperator,
    CollectionClerk,
    Accountant,
}

impl SystemRole {
    pub const ALL: [SystemRole; 5] = [
        SystemRole::Admin,
        SystemRole::QualityInspector,
        SystemRole::ProductionOperator,
        SystemRole::CollectionClerk,
        SystemRole::Accountant,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            SystemRole::Admin => "ADMIN",
            SystemRole::QualityInspector => "QUALITY_INSPECTOR",
            SystemRole::ProductionOperator => "PRODUCTION_OPERATOR",
            SystemRole::CollectionClerk => "COLLECTION_CLERK",
            SystemRole::Accountant => "ACCOUNTANT",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            SystemRole::Admin => "Full access to every module",
            SystemRole::QualityInspector => "Records and reviews laboratory tests",
            SystemRole::ProductionOperator => "Runs production batches",
            SystemRole::CollectionClerk => "Records milk deliveries and prepares monthly drafts",
            SystemRole::Accountant => "Reviews and finalizes monthly settlements",
        }
    }

    pub fn capabilities(&self) -> Vec<Capability> {
        use Action::*;
        let grant = |module: Module, actions: &[Action]| {
            actions
                .iter()
                .map(move |a| Capability::new(module, *a))
                .collect::<Vec<_>>()
        };

        match self {
            SystemRole::Admin => Capability::all(),
            SystemRole::QualityInspector => [
                grant(Module::LAB_TESTS, &[View, Create, Edit, Delete]),
                grant(Module::COLLECTIONS, &[View, Edit]),
                grant(Module::BATCHES, &[View]),
            ]
            .concat(),
            SystemRole::ProductionOperator => [
                grant(Module::BATCHES, &[View, Create, Edit]),
                grant(Module::LAB_TESTS, &[View, Create]),
            ]
            .concat(),
            SystemRole::CollectionClerk => [
                grant(Module::COLLECTIONS, &[View, Create, Edit, Delete]),
                grant(Module::SUMMARIES, &[View, Edit]),
                grant(Module::PARTNERS, &[View]),
                grant(Module::VEHICLES, &[View, Create]),
            ]
            .concat(),
            SystemRole::Accountant => [
                grant(Module::SUMMARIES, &[View, Edit, Finalize]),
                grant(Module::COLLECTIONS, &[View]),
                grant(Module::PARTNERS, &[View, Create, Edit, Import]),
                grant(Module::CONTRACTS, &[View]),
            ]
            .concat(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_round_trip() {
        for c in Capability::all() {
            assert_eq!(Capability::parse(&c.key()), Some(c));
        }
    }

    #[test]
    fn action_outside_module_is_rejected() {
        assert_eq!(Capability::parse("procurement.contracts:delete"), None);
        assert_eq!(Capability::parse("quality.lab_tests:finalize"), None);
    }
}
