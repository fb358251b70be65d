use crate::partition::{AckPolicy, PartitionSettings, ReplicationStrategy};
use std::convert::TryFrom;
use tokio::time::Duration;

#[derive(Clone, Debug, Default)]
pub struct PartitionOptions {
    pub replication_strategy: Option<ReplicationStrategy>,
    /// Only used by the synchronous strategy.
    pub ack_policy: Option<AckPolicy>,
    pub backup_heartbeat_interval: Option<Duration>,
    pub backup_rpc_timeout: Option<Duration>,
    pub max_backup_batch_size: Option<usize>,
    /// How many records a consumer is sent before it yields to other partition work.
    pub max_records_per_drain: Option<usize>,
    pub session_check_interval: Option<Duration>,
    pub actor_queue_size: Option<usize>,
}

pub(super) struct PartitionOptionsValidated {
    pub replication_strategy: ReplicationStrategy,
    pub ack_policy: AckPolicy,
    pub backup_heartbeat_interval: Duration,
    pub backup_rpc_timeout: Duration,
    pub max_backup_batch_size: usize,
    pub max_records_per_drain: usize,
    pub session_check_interval: Duration,
    pub actor_queue_size: usize,
}

impl PartitionOptionsValidated {
    fn validate(&self) -> Result<(), &'static str> {
        if self.backup_heartbeat_interval == Duration::from_millis(0) {
            return Err("Backup heartbeat interval must be positive");
        }
        if self.session_check_interval == Duration::from_millis(0) {
            return Err("Session check interval must be positive");
        }
        if self.backup_rpc_timeout < self.backup_heartbeat_interval {
            return Err("Backup RPC timeout must not be shorter than the backup heartbeat interval");
        }
        if self.max_backup_batch_size == 0 {
            return Err("Backup batch size must be positive");
        }
        if self.max_records_per_drain == 0 {
            return Err("Records per drain must be positive");
        }
        if self.actor_queue_size == 0 {
            return Err("Actor queue size must be positive");
        }

        Ok(())
    }

    pub(super) fn partition_settings(&self) -> PartitionSettings {
        PartitionSettings {
            replication_strategy: self.replication_strategy,
            ack_policy: self.ack_policy,
            backup_heartbeat_interval: self.backup_heartbeat_interval,
            backup_rpc_timeout: self.backup_rpc_timeout,
            max_backup_batch_size: self.max_backup_batch_size,
            max_records_per_drain: self.max_records_per_drain,
            session_check_interval: self.session_check_interval,
        }
    }
}

impl TryFrom<PartitionOptions> for PartitionOptionsValidated {
    type Error = &'static str;

    fn try_from(options: PartitionOptions) -> Result<Self, Self::Error> {
        let values = PartitionOptionsValidated {
            replication_strategy: options
                .replication_strategy
                .unwrap_or(ReplicationStrategy::Synchronous),
            ack_policy: options.ack_policy.unwrap_or(AckPolicy::Majority),
            backup_heartbeat_interval: options
                .backup_heartbeat_interval
                .unwrap_or(Duration::from_millis(50)),
            backup_rpc_timeout: options.backup_rpc_timeout.unwrap_or(Duration::from_secs(1)),
            max_backup_batch_size: options.max_backup_batch_size.unwrap_or(100),
            max_records_per_drain: options.max_records_per_drain.unwrap_or(64),
            session_check_interval: options.session_check_interval.unwrap_or(Duration::from_millis(250)),
            actor_queue_size: options.actor_queue_size.unwrap_or(64),
        };

        values.validate()?;
        Ok(values)
    }
}
