use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};

use crate::model::Candidate;

/// Session exit register. `Unset` at commit time is a valid "no
/// decision" state and resolves like a cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Unset,
    Success,
    UserCanceled,
    UnknownError,
}

impl ExitCode {
    /// Mapping documented by the CLI surface: 0 selection made,
    /// 1 unknown/internal error, 2 user canceled.
    pub fn process_code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::UnknownError => 1,
            Self::UserCanceled | Self::Unset => 2,
        }
    }
}

#[derive(Debug)]
pub enum SelectionError {
    /// A second, different exit code was offered; the first assignment
    /// stands.
    ExitCodeConflict {
        current: ExitCode,
        attempted: ExitCode,
    },
    /// The user committed text that matches no candidate while custom
    /// entries are disabled.
    UnmatchedEntry(String),
    Canceled,
    Failed,
}

impl std::fmt::Display for SelectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExitCodeConflict { current, attempted } => write!(
                f,
                "exit code already set to {current:?}; refusing {attempted:?}"
            ),
            Self::UnmatchedEntry(query) => write!(f, "no candidate matches '{query}'"),
            Self::Canceled => write!(f, "selection canceled"),
            Self::Failed => write!(f, "selection failed"),
        }
    }
}

impl std::error::Error for SelectionError {}

#[derive(Debug, Clone)]
pub struct SelectionOutcome {
    pub exit_code: ExitCode,
    pub chosen: Option<Candidate>,
    pub raw_query: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Candidate(Candidate),
    CustomEntry(String),
}

/// One-shot latch. The compare-and-swap decides the single winner; the
/// mutex/condvar pair releases waiters only after the winner has
/// finished publishing, so observers of Broken always see a complete
/// outcome.
pub struct Fuse {
    armed: AtomicBool,
    published: AtomicBool,
    broken: Mutex<bool>,
    cond: Condvar,
}

impl Default for Fuse {
    fn default() -> Self {
        Self {
            armed: AtomicBool::new(false),
            published: AtomicBool::new(false),
            broken: Mutex::new(false),
            cond: Condvar::new(),
        }
    }
}

impl Fuse {
    pub fn new() -> Self {
        Self::default()
    }

    /// First phase of breaking the fuse. Returns true for exactly one
    /// caller per fuse, false for everyone else.
    pub fn arm(&self) -> bool {
        self.armed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Second phase: unblocks waiters. Only the caller that won `arm`
    /// may call this, after publishing whatever waiters will read.
    pub fn release(&self) {
        let mut broken = self.broken.lock().unwrap_or_else(PoisonError::into_inner);
        *broken = true;
        self.published.store(true, Ordering::Release);
        self.cond.notify_all();
    }

    /// True only once `release` has run. An armed-but-unreleased fuse
    /// still reads as intact, so observers of Broken always find a
    /// fully-published outcome.
    pub fn is_broken(&self) -> bool {
        self.published.load(Ordering::Acquire)
    }

    /// Parks the caller until the fuse breaks. No spinning, no polling.
    pub fn wait(&self) {
        let mut broken = self.broken.lock().unwrap_or_else(PoisonError::into_inner);
        while !*broken {
            broken = self
                .cond
                .wait(broken)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Exactly-once completion protocol for one menu generation: an exit
/// code register with first-assignment-wins semantics and the fuse that
/// publishes the final outcome. This is the only object in the system
/// mutated from arbitrary thread contexts.
pub struct SelectionController {
    register: Mutex<ExitCode>,
    outcome: Mutex<Option<SelectionOutcome>>,
    fuse: Fuse,
}

impl Default for SelectionController {
    fn default() -> Self {
        Self {
            register: Mutex::new(ExitCode::Unset),
            outcome: Mutex::new(None),
            fuse: Fuse::new(),
        }
    }
}

impl SelectionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exit_code(&self) -> ExitCode {
        *self
            .register
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// First assignment wins. Re-asserting the same code succeeds
    /// idempotently; a different code is rejected without touching the
    /// register.
    pub fn set_exit_code(&self, code: ExitCode) -> Result<(), SelectionError> {
        let mut register = self
            .register
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if *register == ExitCode::Unset || *register == code {
            *register = code;
            return Ok(());
        }
        Err(SelectionError::ExitCodeConflict {
            current: *register,
            attempted: code,
        })
    }

    /// Breaks the fuse exactly once. The single winning caller
    /// publishes the outcome before waiters are released and gets
    /// `true` back; every later caller is a side-effect-free no-op.
    pub fn commit(&self, chosen: Option<Candidate>, raw_query: &str) -> bool {
        if !self.fuse.arm() {
            return false;
        }

        let exit_code = self.exit_code();
        {
            let mut slot = self.outcome.lock().unwrap_or_else(PoisonError::into_inner);
            *slot = Some(SelectionOutcome {
                exit_code,
                chosen,
                raw_query: raw_query.to_string(),
            });
        }
        self.fuse.release();
        true
    }

    pub fn is_committed(&self) -> bool {
        self.fuse.is_broken()
    }

    /// Blocks the calling thread until `commit` has run. Intended for
    /// one primary waiter per generation; it is not a broadcast
    /// primitive, though extra waiters are still unblocked safely.
    pub fn wait_for_outcome(&self) -> SelectionOutcome {
        self.fuse.wait();
        self.outcome
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .unwrap_or(SelectionOutcome {
                exit_code: ExitCode::Unset,
                chosen: None,
                raw_query: String::new(),
            })
    }

    /// Snapshot of the published outcome, if the fuse has broken.
    pub fn outcome(&self) -> Option<SelectionOutcome> {
        self.outcome
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Maps a committed outcome to its terminal result: the chosen
/// candidate, a free-form custom entry, or a terminal error.
pub fn resolve(
    outcome: &SelectionOutcome,
    custom_entry_enabled: bool,
) -> Result<Resolution, SelectionError> {
    match outcome.exit_code {
        ExitCode::Success => {
            if let Some(candidate) = &outcome.chosen {
                return Ok(Resolution::Candidate(candidate.clone()));
            }
            if custom_entry_enabled && !outcome.raw_query.is_empty() {
                return Ok(Resolution::CustomEntry(outcome.raw_query.clone()));
            }
            Err(SelectionError::UnmatchedEntry(outcome.raw_query.clone()))
        }
        // Broken fuse with no recorded decision counts as cancellation.
        ExitCode::UserCanceled | ExitCode::Unset => Err(SelectionError::Canceled),
        ExitCode::UnknownError => Err(SelectionError::Failed),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    use super::{resolve, ExitCode, Fuse, Resolution, SelectionController, SelectionError};
    use crate::model::Candidate;

    #[test]
    fn armed_fuse_is_not_broken_until_released() {
        let fuse = Fuse::new();
        assert!(!fuse.is_broken());
        assert!(fuse.arm());
        assert!(!fuse.is_broken());
        fuse.release();
        assert!(fuse.is_broken());
    }

    #[test]
    fn committed_state_implies_published_outcome() {
        let controller = Arc::new(SelectionController::new());
        let committer = {
            let controller = Arc::clone(&controller);
            thread::spawn(move || {
                controller.commit(Some(Candidate::new("apple")), "ap");
            })
        };

        // any observation of the broken fuse must find the outcome
        loop {
            if controller.is_committed() {
                assert!(controller.outcome().is_some());
                break;
            }
            thread::yield_now();
        }
        committer.join().expect("committer should not panic");
    }

    #[test]
    fn exit_code_first_assignment_wins() {
        let controller = SelectionController::new();
        controller
            .set_exit_code(ExitCode::Success)
            .expect("first assignment should succeed");
        controller
            .set_exit_code(ExitCode::Success)
            .expect("same code should be idempotent");

        let err = controller
            .set_exit_code(ExitCode::UserCanceled)
            .expect_err("different code should conflict");
        match err {
            SelectionError::ExitCodeConflict { current, attempted } => {
                assert_eq!(current, ExitCode::Success);
                assert_eq!(attempted, ExitCode::UserCanceled);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(controller.exit_code(), ExitCode::Success);
    }

    #[test]
    fn concurrent_commits_break_fuse_exactly_once() {
        let controller = Arc::new(SelectionController::new());
        let wins = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let controller = Arc::clone(&controller);
            let wins = Arc::clone(&wins);
            handles.push(thread::spawn(move || {
                if controller.commit(Some(Candidate::new("apple")), "ap") {
                    wins.fetch_add(1, Ordering::SeqCst);
                }
            }));
        }
        for handle in handles {
            handle.join().expect("committer should not panic");
        }

        assert_eq!(wins.load(Ordering::SeqCst), 1);
        assert!(controller.is_committed());
        let outcome = controller.wait_for_outcome();
        assert_eq!(
            outcome.chosen.map(|c| c.computed_title().to_string()),
            Some("apple".to_string())
        );
    }

    #[test]
    fn waiter_unblocks_after_commit_from_another_thread() {
        let controller = Arc::new(SelectionController::new());
        let waiter = {
            let controller = Arc::clone(&controller);
            thread::spawn(move || controller.wait_for_outcome())
        };

        controller
            .set_exit_code(ExitCode::Success)
            .expect("exit code should set");
        controller.commit(Some(Candidate::new("banana")), "ban");

        let outcome = waiter.join().expect("waiter should not panic");
        assert_eq!(outcome.exit_code, ExitCode::Success);
        assert_eq!(outcome.raw_query, "ban");
    }

    #[test]
    fn resolve_prefers_chosen_candidate() {
        let controller = SelectionController::new();
        controller
            .set_exit_code(ExitCode::Success)
            .expect("exit code should set");
        controller.commit(Some(Candidate::new("apple")), "ap");

        let outcome = controller.wait_for_outcome();
        let resolution = resolve(&outcome, false).expect("selection should resolve");
        assert_eq!(resolution, Resolution::Candidate(Candidate::new("apple")));
    }

    #[test]
    fn resolve_falls_back_to_custom_entry() {
        let controller = SelectionController::new();
        controller
            .set_exit_code(ExitCode::Success)
            .expect("exit code should set");
        controller.commit(None, "zzz");

        let outcome = controller.wait_for_outcome();
        assert_eq!(
            resolve(&outcome, true).expect("custom entry should resolve"),
            Resolution::CustomEntry("zzz".to_string())
        );
        match resolve(&outcome, false) {
            Err(SelectionError::UnmatchedEntry(query)) => assert_eq!(query, "zzz"),
            other => panic!("unexpected resolution: {other:?}"),
        }
    }

    #[test]
    fn commit_before_any_exit_code_resolves_as_cancellation() {
        let controller = SelectionController::new();
        controller.commit(None, "");

        let outcome = controller.wait_for_outcome();
        assert_eq!(outcome.exit_code, ExitCode::Unset);
        match resolve(&outcome, true) {
            Err(SelectionError::Canceled) => {}
            other => panic!("unexpected resolution: {other:?}"),
        }
        assert_eq!(outcome.exit_code.process_code(), 2);
    }

    #[test]
    fn cancellation_resolves_to_error_not_candidate() {
        let controller = SelectionController::new();
        controller
            .set_exit_code(ExitCode::UserCanceled)
            .expect("exit code should set");
        controller.commit(Some(Candidate::new("apple")), "ap");

        let outcome = controller.wait_for_outcome();
        match resolve(&outcome, true) {
            Err(SelectionError::Canceled) => {}
            other => panic!("unexpected resolution: {other:?}"),
        }
    }
}
