//! State resolver: latest event + incoming record -> scenario.
//!
//! The priority order lives in [`CLASSIFICATION_RULES`]. Rules are evaluated
//! top to bottom and the first one returning `Some` decides the cycle's single
//! scenario for that key. A record whose symbol and name both changed
//! therefore yields one `SymbolChange`; the event still carries the new name.

use crate::{Event, Scenario, SnapshotRecord};

/// Inputs of one classification.
#[derive(Clone, Copy, Debug)]
pub struct Transition<'a> {
    pub latest: Option<&'a Event>,
    pub incoming: &'a SnapshotRecord,
    /// Log was empty when the cycle started.
    pub first_cycle: bool,
}

/// A named predicate/action pair.
#[derive(Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub apply: fn(&Transition<'_>) -> Option<Scenario>,
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule").field("name", &self.name).finish()
    }
}

/// Classification policy, highest priority first. No match => no event.
pub const CLASSIFICATION_RULES: &[Rule] = &[
    Rule {
        name: "first_sighting",
        apply: first_sighting,
    },
    Rule {
        name: "symbol_change",
        apply: symbol_change,
    },
    Rule {
        name: "name_change",
        apply: name_change,
    },
    Rule {
        name: "reinstated",
        apply: reinstated,
    },
];

/// Classify one key. `None` means the record matches an active latest state.
pub fn classify(
    latest: Option<&Event>,
    incoming: &SnapshotRecord,
    first_cycle: bool,
) -> Option<Scenario> {
    let t = Transition {
        latest,
        incoming,
        first_cycle,
    };
    CLASSIFICATION_RULES.iter().find_map(|r| (r.apply)(&t))
}

fn first_sighting(t: &Transition<'_>) -> Option<Scenario> {
    match t.latest {
        None if t.first_cycle => Some(Scenario::Baseline),
        None => Some(Scenario::NewEntry),
        Some(_) => None,
    }
}

fn symbol_change(t: &Transition<'_>) -> Option<Scenario> {
    let prev = t.latest?;
    (prev.symbol != t.incoming.symbol).then(|| Scenario::SymbolChange {
        from: prev.symbol.clone(),
        to: t.incoming.symbol.clone(),
    })
}

fn name_change(t: &Transition<'_>) -> Option<Scenario> {
    let prev = t.latest?;
    (prev.display_name != t.incoming.display_name).then(|| Scenario::NameChange {
        from: prev.display_name.clone(),
        to: t.incoming.display_name.clone(),
    })
}

fn reinstated(t: &Transition<'_>) -> Option<Scenario> {
    let prev = t.latest?;
    (!prev.is_active).then_some(Scenario::Reinstated)
}
