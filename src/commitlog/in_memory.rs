use crate::commitlog::{Entry, Index, Log};
use std::collections::VecDeque;
use std::convert::TryFrom;
use std::io;
use std::marker::PhantomData;

// Storage internals are not what this library is about. This models a commit log in memory, but
// still round-trips every entry through its byte representation.
pub(crate) struct InMemoryLog<E: Entry> {
    logger: slog::Logger,
    // Entry at `log[0]` lives at `first_index`.
    log: VecDeque<Vec<u8>>,
    first_index: Index,
    _pd: PhantomData<E>,
}

impl<E: Entry> InMemoryLog<E> {
    pub(crate) fn create(logger: slog::Logger) -> Result<Self, io::Error> {
        Ok(InMemoryLog {
            logger,
            log: VecDeque::new(),
            first_index: Index::start_index(),
            _pd: PhantomData::default(),
        })
    }

    fn vec_index(&self, index: Index) -> Option<usize> {
        if index < self.first_index {
            return None;
        }

        Some((index.as_u64() - self.first_index.as_u64()) as usize)
    }
}

impl<E: Entry> Log<E> for InMemoryLog<E> {
    fn append(&mut self, entry: E) -> Result<Index, io::Error> {
        let appended_index = self.next_index();
        self.log.push_back(entry.into());

        Ok(appended_index)
    }

    fn read(&self, index: Index) -> Result<Option<E>, io::Error> {
        let bytes = match self.vec_index(index).and_then(|i| self.log.get(i)) {
            Some(bytes) => bytes.clone(),
            None => return Ok(None),
        };

        E::try_from(bytes).map(Some)
    }

    fn truncate(&mut self, index: Index) {
        match self.vec_index(index) {
            Some(vec_index) => self.log.truncate(vec_index),
            None => {
                slog::warn!(
                    self.logger,
                    "Truncating at {:?} which is before the first retained index {:?}. Dropping everything.",
                    index,
                    self.first_index
                );
                self.log.clear();
            }
        }
    }

    fn compact(&mut self, index: Index) {
        let next_index = self.next_index();
        let new_first_index = std::cmp::min(index, next_index);
        while self.first_index < new_first_index {
            self.log.pop_front();
            self.first_index = self.first_index.plus(1);
        }
    }

    fn first_index(&self) -> Index {
        self.first_index
    }

    fn next_index(&self) -> Index {
        self.first_index.plus(self.log.len() as u64)
    }
}
