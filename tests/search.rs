//! Encapsulated search built from clone and commit.

use ozspace::test_utils::{init_test_logging, BindTwice, ChooseBind, TwoDigit};
use ozspace::{
    AskOutcome, Reg, SpaceEngine, SpaceError, SpaceId, Step, ThreadBody, ThreadCx, UsageError,
};

fn read_int(engine: &SpaceEngine, space: SpaceId, var: ozspace::VarId) -> Option<i64> {
    engine.read_value(space, var).and_then(|v| v.as_int())
}

/// Depth-first all-solutions search: clone before every commit so the
/// original space stays available for the remaining alternatives.
fn explore(engine: &mut SpaceEngine, space: SpaceId, solutions: &mut Vec<i64>) {
    match engine.ask(space).unwrap() {
        AskOutcome::Failed => {
            engine.kill(space).unwrap();
        }
        AskOutcome::Succeeded => {
            let root = engine.root_var(space).unwrap();
            engine.merge(space).unwrap();
            if let Some(value) = read_int(engine, engine.top(), root) {
                solutions.push(value);
            }
        }
        AskOutcome::Alternatives(n) => {
            for selector in 1..=n {
                let branch = engine.clone_space(space).unwrap();
                engine.commit(branch, selector).unwrap();
                explore(engine, branch, solutions);
            }
            engine.kill(space).unwrap();
        }
    }
}

#[test]
fn cloned_space_is_isolated_from_the_original() {
    init_test_logging();
    let mut engine = SpaceEngine::new();
    let top = engine.top();

    let original = engine.new_space(top, Box::new(ChooseBind::new(2))).unwrap();
    assert_eq!(engine.ask(original), Ok(AskOutcome::Alternatives(2)));

    let copy = engine.clone_space(original).unwrap();
    assert_eq!(engine.ask(copy), Ok(AskOutcome::Alternatives(2)));
    assert_ne!(engine.root_var(original), engine.root_var(copy));

    engine.commit(original, 1).unwrap();
    engine.commit(copy, 2).unwrap();
    assert_eq!(engine.ask(original), Ok(AskOutcome::Succeeded));
    assert_eq!(engine.ask(copy), Ok(AskOutcome::Succeeded));

    let original_root = engine.root_var(original).unwrap();
    let copy_root = engine.root_var(copy).unwrap();
    assert_eq!(read_int(&engine, original, original_root), Some(1));
    assert_eq!(read_int(&engine, copy, copy_root), Some(2));

    // Neither commit leaked into the sibling.
    assert_eq!(read_int(&engine, original, copy_root), None);
    assert_eq!(read_int(&engine, copy, original_root), None);
}

#[test]
fn clone_requires_a_stable_consistent_space() {
    init_test_logging();
    let mut engine = SpaceEngine::new();
    let top = engine.top();

    let failed = engine.new_space(top, Box::new(BindTwice(1, 2))).unwrap();
    assert_eq!(engine.ask(failed), Ok(AskOutcome::Failed));
    assert_eq!(
        engine.clone_space(failed),
        Err(SpaceError::Usage(UsageError::NotStable))
    );

    let merged = engine
        .new_space(top, Box::new(ChooseBind::new(2)))
        .unwrap();
    engine.commit(merged, 1).unwrap();
    engine.merge(merged).unwrap();
    assert_eq!(
        engine.clone_space(merged),
        Err(SpaceError::Usage(UsageError::Disposed))
    );
}

#[test]
fn exhaustive_search_enumerates_every_solution() {
    init_test_logging();
    let mut engine = SpaceEngine::new();
    let top = engine.top();

    let space = engine.new_space(top, Box::new(TwoDigit::default())).unwrap();
    let mut solutions = Vec::new();
    explore(&mut engine, space, &mut solutions);

    solutions.sort_unstable();
    assert_eq!(solutions, vec![11, 12, 21, 22]);
}

/// Binds 1 for the first alternative and fails on the second, so search
/// over it yields exactly one solution.
#[derive(Debug, Clone, Default)]
struct PickyDigit {
    decision: Option<Reg>,
}

impl ThreadBody for PickyDigit {
    fn resume(&mut self, cx: &mut ThreadCx<'_>) -> Step {
        match self.decision {
            None => match cx.choose(2) {
                Ok(reg) => {
                    self.decision = Some(reg);
                    Step::Wait(reg)
                }
                Err(_) => Step::Done,
            },
            Some(reg) => {
                match cx.read_int(reg) {
                    Some(1) => {
                        cx.bind_int(0, 1);
                    }
                    _ => {
                        // Contradiction on purpose.
                        cx.bind_int(0, 1);
                        cx.bind_int(0, 2);
                    }
                }
                Step::Done
            }
        }
    }

    fn clone_box(&self) -> Box<dyn ThreadBody> {
        Box::new(self.clone())
    }
}

#[test]
fn search_prunes_failed_branches() {
    init_test_logging();
    let mut engine = SpaceEngine::new();
    let top = engine.top();

    let space = engine
        .new_space(top, Box::new(PickyDigit::default()))
        .unwrap();
    let mut solutions = Vec::new();
    explore(&mut engine, space, &mut solutions);

    assert_eq!(solutions, vec![1]);
}
