//! Linux scheduling attributes carried by `ProcSetSchedAction`.
//!
//! Inspectors apply these with `sched_setattr(2)`; the orchestrator only
//! decides them. Durations are nanoseconds, matching the syscall ABI.

use serde::{Deserialize, Serialize};

/// `sched_setattr` flag: children revert to the default policy.
pub const SCHED_FLAG_RESET_ON_FORK: u64 = 0x01;

/// Scheduling class.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedPolicy {
    /// `SCHED_OTHER`
    #[default]
    Normal,
    /// `SCHED_FIFO`
    Fifo,
    /// `SCHED_RR`
    #[serde(rename = "rr")]
    RoundRobin,
    /// `SCHED_BATCH`
    Batch,
    /// `SCHED_IDLE`
    Idle,
    /// `SCHED_DEADLINE`
    Deadline,
}

/// Per-process scheduling attributes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedAttr {
    /// Scheduling class.
    pub policy: SchedPolicy,
    /// `SCHED_FLAG_*` bits.
    pub flags: u64,
    /// Nice value for `Normal`/`Batch`.
    pub nice: i32,
    /// Static priority for `Fifo`/`RoundRobin`.
    pub priority: u32,
    /// `Deadline` runtime.
    pub runtime_ns: u64,
    /// `Deadline` relative deadline.
    pub deadline_ns: u64,
    /// `Deadline` period.
    pub period_ns: u64,
}

impl SchedAttr {
    /// Attributes resetting a process to the default class.
    pub fn normal() -> Self {
        Self::default()
    }

    /// Plain class/nice attributes.
    pub fn with_nice(policy: SchedPolicy, nice: i32) -> Self {
        Self {
            policy,
            nice,
            ..Self::default()
        }
    }
}
