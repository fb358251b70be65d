mod in_memory;
mod log;

pub(crate) use in_memory::InMemoryLog;
pub(crate) use log::Entry;
pub(crate) use log::Index;
pub(crate) use log::Log;
