use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::Arc;
use wand_core::units::filter_by_tags;
use wand_core::{
    allowed_transitions, validate_transition, Communication, CommunicationRegistry, SessionPhase,
    UnitKind, UnitTag, UnitsConfig,
};
use wand_test_utils::{
    test_config, test_session, FakeCritic, FakeGeneration, ProbeBehavior, ProbeUnit,
    ScriptedTransport,
};

fn session() -> wand_core::Session {
    test_session(
        &test_config(3),
        FakeGeneration::new(),
        FakeCritic::new(),
        ScriptedTransport::new(Vec::<String>::new()),
    )
}

#[test]
fn available_units_are_sorted_by_description() {
    let units: Vec<Arc<dyn Communication>> = vec![
        ProbeUnit::new("Zeta.", ProbeBehavior::Act),
        ProbeUnit::interrupting("Hidden.", ProbeBehavior::Act),
        ProbeUnit::new("Alpha.", ProbeBehavior::Act),
        ProbeUnit::new("Mu.", ProbeBehavior::Act),
    ];
    let registry = CommunicationRegistry::new(units);
    let session = session();

    let names: Vec<String> = registry
        .available(&session)
        .iter()
        .map(|u| u.description().to_string())
        .collect();
    assert_eq!(names, vec!["Alpha.", "Mu.", "Zeta."]);
}

#[test]
fn custom_sort_key_is_stable() {
    fn by_length(unit: &dyn Communication) -> String {
        format!("{:04}", unit.description().len())
    }
    let units: Vec<Arc<dyn Communication>> = vec![
        ProbeUnit::new("Bb.", ProbeBehavior::Act),
        ProbeUnit::new("Longest.", ProbeBehavior::Act),
        ProbeUnit::new("Aa.", ProbeBehavior::Act),
    ];
    let registry = CommunicationRegistry::new(units).with_sort_key(by_length);

    let names: Vec<String> = registry
        .available(&session())
        .iter()
        .map(|u| u.description().to_string())
        .collect();
    assert_eq!(names, vec!["Bb.", "Aa.", "Longest."]);
}

#[test]
fn interrupt_preference_keeps_registration_order() {
    let units: Vec<Arc<dyn Communication>> = vec![
        ProbeUnit::new("Plain.", ProbeBehavior::Act),
        ProbeUnit::interrupting("Second.", ProbeBehavior::Act),
        ProbeUnit::interrupting("First.", ProbeBehavior::Act),
    ];
    let registry = CommunicationRegistry::new(units);

    let names: Vec<String> = registry
        .interrupt_preferred(&session())
        .iter()
        .map(|u| u.description().to_string())
        .collect();
    assert_eq!(names, vec!["Second.", "First."]);
}

#[test]
fn fresh_session_offers_opening_and_basic_units() {
    let registry = CommunicationRegistry::from_config(&UnitsConfig::default()).unwrap();
    assert_eq!(registry.len(), UnitKind::ALL.len());
    let session = session();

    let preferred = registry.interrupt_preferred(&session);
    assert_eq!(preferred.len(), 1);
    assert_eq!(preferred[0].description(), "Let the Wand introduce themself.");

    let available: Vec<String> = registry
        .available(&session)
        .iter()
        .map(|u| u.description().to_string())
        .collect();
    assert!(available.contains(&"Apply topic control.".to_string()));
    assert!(!available.contains(&"Undo.".to_string()));
    assert!(!available.contains(&"Replace a sentence.".to_string()));
}

#[test]
fn tag_filtered_config() {
    let config = UnitsConfig {
        preset: "full".into(),
        filtering_tags: Some(vec![UnitTag::Reflection]),
    };
    let registry = CommunicationRegistry::from_config(&config).unwrap();
    assert_eq!(registry.len(), 4);
    assert!(registry
        .units()
        .iter()
        .all(|u| u.tags().contains(&UnitTag::Reflection)));

    let none = filter_by_tags(registry.units().to_vec(), &[]);
    assert!(none.is_empty());
}

#[test]
fn unknown_preset_is_rejected() {
    let config = UnitsConfig {
        preset: "s9".into(),
        filtering_tags: None,
    };
    assert!(CommunicationRegistry::from_config(&config).is_err());
}

fn phase() -> impl Strategy<Value = SessionPhase> {
    prop_oneof![
        Just(SessionPhase::Idle),
        Just(SessionPhase::Running),
        Just(SessionPhase::InterruptPending),
        Just(SessionPhase::Choosing),
        Just(SessionPhase::Executing),
        Just(SessionPhase::Terminated),
    ]
}

proptest! {
    #[test]
    fn prop_validation_matches_allowed(from in phase(), to in phase()) {
        let allowed = allowed_transitions(from);
        prop_assert_eq!(validate_transition(from, to).is_ok(), allowed.contains(&to));
    }

    #[test]
    fn prop_every_live_phase_can_terminate(from in phase()) {
        if from != SessionPhase::Idle && !from.is_terminal() {
            prop_assert!(validate_transition(from, SessionPhase::Terminated).is_ok());
        }
    }

    #[test]
    fn prop_nothing_returns_to_idle(from in phase()) {
        prop_assert!(validate_transition(from, SessionPhase::Idle).is_err());
    }
}
