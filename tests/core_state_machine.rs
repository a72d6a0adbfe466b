// tests/core_state_machine.rs

mod common;
use crate::common::{bf2, names, pr, summary};

use std::collections::HashSet;
use std::time::Duration;

use proptest::prelude::*;

use artifacts_mover::engine::{AggregatorCommand, AggregatorStep, CloseReason, CompletedRound, RoundCore};
use artifacts_mover::types::ArtifactType;

const TIMEOUT: Duration = Duration::from_millis(100);

fn submitted(step: &AggregatorStep) -> Vec<CompletedRound> {
    step.submitted().cloned().collect()
}

fn arms_timer(step: &AggregatorStep) -> bool {
    step.commands
        .iter()
        .any(|c| matches!(c, AggregatorCommand::ArmTimer { .. }))
}

#[test]
fn full_round_is_submitted_on_last_type() {
    let mut core = RoundCore::new(3, false, Some(TIMEOUT));

    let step = core.on_artifact(bf2("/d/b1"));
    assert!(submitted(&step).is_empty());
    assert!(arms_timer(&step));

    let step = core.on_artifact(pr("/p/p1"));
    assert!(submitted(&step).is_empty());
    assert!(!arms_timer(&step), "timer is only armed on the first artifact");

    let step = core.on_artifact(summary("/s/s1"));
    let rounds = submitted(&step);
    assert_eq!(rounds.len(), 1);
    assert_eq!(rounds[0].reason, CloseReason::Complete);
    assert_eq!(names(&rounds[0].round), vec!["b1", "p1", "s1"]);
    assert!(step.commands.contains(&AggregatorCommand::CancelTimer));

    assert!(core.current_round().is_empty());
    assert!(!core.timer_armed());
}

#[test]
fn duplicate_type_closes_incomplete_round_first() {
    let mut core = RoundCore::new(3, false, Some(TIMEOUT));
    core.on_artifact(bf2("/d/b1"));
    core.on_artifact(pr("/p/p1"));

    let step = core.on_artifact(bf2("/d/b2"));
    let rounds = submitted(&step);
    assert_eq!(rounds.len(), 1);
    assert_eq!(rounds[0].reason, CloseReason::Overlap);
    assert_eq!(names(&rounds[0].round), vec!["b1", "p1"]);

    assert_eq!(names(core.current_round()), vec!["b2"]);
    // The new round gets its own timer.
    assert!(arms_timer(&step));
    assert!(core.timer_armed());
}

#[test]
fn bf2demo_only_submits_every_arrival() {
    let mut core = RoundCore::new(1, true, Some(TIMEOUT));

    for name in ["b1", "b2"] {
        let step = core.on_artifact(bf2(format!("/d/{name}")));
        let rounds = submitted(&step);
        assert_eq!(rounds.len(), 1);
        assert_eq!(names(&rounds[0].round), vec![name]);
        assert_eq!(rounds[0].reason, CloseReason::Complete);
        assert!(!arms_timer(&step));
    }
    assert!(core.current_round().is_empty());
}

#[test]
fn single_non_bf2demo_type_completes_on_arrival() {
    let mut core = RoundCore::new(1, false, Some(TIMEOUT));
    let step = core.on_artifact(summary("/s/s1"));
    assert_eq!(submitted(&step).len(), 1);
    assert!(!arms_timer(&step));
}

#[test]
fn timer_closes_non_empty_round() {
    let mut core = RoundCore::new(2, false, Some(TIMEOUT));
    let step = core.on_artifact(bf2("/d/b1"));

    let epoch = match step.commands.as_slice() {
        [AggregatorCommand::ArmTimer { epoch, after }] => {
            assert_eq!(*after, TIMEOUT);
            *epoch
        }
        other => panic!("unexpected commands: {other:?}"),
    };

    let step = core.on_timer(epoch);
    let rounds = submitted(&step);
    assert_eq!(rounds.len(), 1);
    assert_eq!(rounds[0].reason, CloseReason::Timeout);
    assert_eq!(names(&rounds[0].round), vec!["b1"]);
}

#[test]
fn stale_timer_is_ignored() {
    let mut core = RoundCore::new(2, false, Some(TIMEOUT));
    core.on_artifact(bf2("/d/b1"));
    let old_epoch = core.epoch();

    // Round completes; the next one starts with a fresh timer.
    core.on_artifact(pr("/p/p1"));
    core.on_artifact(bf2("/d/b2"));
    assert_ne!(core.epoch(), old_epoch);

    let step = core.on_timer(old_epoch);
    assert!(step.commands.is_empty());
    assert_eq!(names(core.current_round()), vec!["b2"]);
    assert!(core.timer_armed());
}

#[test]
fn no_timer_when_timeout_disabled() {
    let mut core = RoundCore::new(3, false, None);
    let step = core.on_artifact(bf2("/d/b1"));
    assert!(step.commands.is_empty());
    assert!(!core.timer_armed());

    let zero = RoundCore::new(3, false, Some(Duration::ZERO));
    assert!(!zero.timer_armed());
}

#[test]
fn closing_empty_round_is_a_noop() {
    let mut core = RoundCore::new(3, false, Some(TIMEOUT));
    let epoch = core.epoch();

    assert!(core.close(CloseReason::Timeout).commands.is_empty());
    assert!(core.close(CloseReason::Timeout).commands.is_empty());
    assert_eq!(core.epoch(), epoch);
}

#[test]
fn shutdown_cancels_timer_but_keeps_round() {
    let mut core = RoundCore::new(3, false, Some(TIMEOUT));
    core.on_artifact(bf2("/d/b1"));

    let step = core.shutdown();
    assert_eq!(step.commands, vec![AggregatorCommand::CancelTimer]);
    assert_eq!(names(core.current_round()), vec!["b1"]);
    assert!(!core.timer_armed());
}

fn artifact_type() -> impl Strategy<Value = ArtifactType> {
    prop_oneof![
        Just(ArtifactType::Bf2Demo),
        Just(ArtifactType::PrDemo),
        Just(ArtifactType::Summary),
    ]
}

proptest! {
    #[test]
    fn submitted_rounds_never_repeat_a_type(
        types_count in 1usize..=3,
        arrivals in proptest::collection::vec(artifact_type(), 0..40),
    ) {
        let mut core = RoundCore::new(types_count, false, Some(TIMEOUT));
        let mut total = 0usize;

        for (i, typ) in arrivals.iter().enumerate() {
            let before = core.current_round().clone();
            let step = core.on_artifact(artifact_for(*typ, i));

            for completed in step.submitted() {
                let seen: HashSet<ArtifactType> = completed.round.types().collect();
                prop_assert_eq!(seen.len(), completed.round.len());
                prop_assert!(!completed.round.is_empty());
                prop_assert!(completed.round.len() <= types_count.max(1));
                total += completed.round.len();
            }

            // Exact submission rule.
            let overlap = before.contains(*typ);
            let expected = usize::from(overlap)
                + usize::from(if overlap { 1 >= types_count } else { before.len() + 1 >= types_count });
            prop_assert_eq!(step.submitted().count(), expected);
        }

        // Nothing is lost or duplicated.
        prop_assert_eq!(total + core.current_round().len(), arrivals.len());
    }
}

fn artifact_for(typ: ArtifactType, i: usize) -> artifacts_mover::engine::Artifact {
    artifacts_mover::engine::Artifact::new(format!("/{typ}/{i:04}"), typ)
}
