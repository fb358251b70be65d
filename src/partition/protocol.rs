/// Protocol is the replication protocol a partition runs. It decides which roles a partition may
/// be handed.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Protocol {
    /// Follower, Candidate and Leader roles.
    Consensus,
    /// Backup and Leader roles.
    PrimaryBackup,
}
