use std::convert::TryFrom;
use std::{fmt, io};

#[derive(Copy, Clone, Hash, PartialOrd, PartialEq, Ord, Eq)]
struct U64NonZero(u64);

impl U64NonZero {
    fn new(val: u64) -> Self {
        assert_ne!(val, 0);
        U64NonZero(val)
    }
}

/// Index is an index of an entry in the log; i.e. a log entry's index.
#[derive(Copy, Clone, Hash, PartialOrd, PartialEq, Ord, Eq)]
pub(crate) struct Index(U64NonZero);

impl Index {
    pub(crate) fn new(index: u64) -> Self {
        Index(U64NonZero::new(index))
    }

    pub(crate) fn new_usize(index: usize) -> Self {
        Self::new(index as u64)
    }

    /// Wire formats use 0 for "no index".
    pub(crate) fn from_wire(index: u64) -> Option<Self> {
        match index {
            0 => None,
            index => Some(Index::new(index)),
        }
    }

    pub(crate) fn start_index() -> Self {
        Self::new(1)
    }

    pub(crate) fn as_u64(&self) -> u64 {
        self.0 .0
    }

    pub(crate) fn plus(&self, delta: u64) -> Index {
        Index::new(self.as_u64() + delta)
    }

    pub(crate) fn checked_minus(&self, delta: u64) -> Option<Index> {
        let new_value = self.as_u64().saturating_sub(delta);
        if new_value > 0 {
            Some(Index::new(new_value))
        } else {
            None
        }
    }
}

impl fmt::Debug for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0 .0)
    }
}

/// Log is an append only log intended for use as a replicated commit log.
///
/// Log indexes entries starting from 1. There will be no entry existing at index 0. The first
/// entry is written at index 1. Indexes are gapless and never reused, even after the head of the
/// log has been compacted away.
pub(crate) trait Log<E: Entry> {
    /// append() appends a log entry to the log at the next log entry index, then returns
    /// the log entry index that was just used to append the entry.
    fn append(&mut self, entry: E) -> Result<Index, io::Error>;

    /// Read log entry at specified index. Returns `None` for indexes that were never written,
    /// were truncated, or were compacted away.
    fn read(&self, index: Index) -> Result<Option<E>, io::Error>;

    /// Soft-deletes anything starting at `index` and later. Soft-deletion makes this infallible.
    /// If hard-deletion is required, add a new method.
    fn truncate(&mut self, index: Index);

    /// Discards every entry before `index`. After this call, `first_index()` is at most `index`.
    fn compact(&mut self, index: Index);

    /// first_index returns the oldest index still retained by the log. For an empty log that was
    /// never compacted, this is the start index.
    fn first_index(&self) -> Index;

    /// next_index returns the next index that will be used to append an entry.
    fn next_index(&self) -> Index;
}

// Choice of Vec<u8> vs Bytes will depend on whats easier for disk to use.
pub(crate) trait Entry: Clone + TryFrom<Vec<u8>, Error = io::Error> + Into<Vec<u8>> {}
