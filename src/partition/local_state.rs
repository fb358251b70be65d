use std::fmt;

/// Term is the leadership epoch a role was handed. Every log entry carries the term of the leader
/// that appended it.
#[derive(Copy, Clone, Hash, PartialOrd, PartialEq, Ord, Eq)]
pub(crate) struct Term(u64);

impl Term {
    pub(crate) fn new(term: u64) -> Self {
        Term(term)
    }

    pub(crate) fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// PersistentLocalState holds the state that must survive a restart for role transitions to stay
/// safe. Only the current term lives here; elections are decided elsewhere.
///
/// Store methods are CAS-like and return true if they mutated state.
pub(crate) trait PersistentLocalState {
    /// Set current term to `new_term` atomically, iff it is larger than current term.
    fn store_term_if_increased(&mut self, new_term: Term) -> bool;

    fn current_term(&self) -> Term;
}

// Not persistent. It's just in memory.
pub(crate) struct VolatileLocalState {
    current_term: Term,
}

impl VolatileLocalState {
    pub(crate) fn new() -> Self {
        VolatileLocalState {
            current_term: Term::new(0),
        }
    }
}

impl PersistentLocalState for VolatileLocalState {
    fn store_term_if_increased(&mut self, new_term: Term) -> bool {
        if new_term <= self.current_term {
            false
        } else {
            self.current_term = new_term;
            true
        }
    }

    fn current_term(&self) -> Term {
        self.current_term
    }
}
