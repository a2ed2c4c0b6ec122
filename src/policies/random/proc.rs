//! Process scheduling sub-policies for `ProcSetEvent`.
//!
//! | name        | effect                                                         |
//! |-------------|----------------------------------------------------------------|
//! | `mild`      | every PID: `Batch` (or `Normal`), random nice in `[-20, 20)`   |
//! | `extreme`   | `prioritized` random PIDs: `RoundRobin` prio `[0, 10)`, rest `Batch` |
//! | `dirichlet` | `Deadline` with runtime `1ms * r_i * ncpu`, `r ~ Dir(1..1)`; each PID reset to `Normal` with `resetProbability` |

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use crate::error::{ConfigError, SignalError};
use crate::policies::PolicyParams;
use crate::signal::{Action, Event, SCHED_FLAG_RESET_ON_FORK, SchedAttr, SchedPolicy};

const DEADLINE_BASE: Duration = Duration::from_millis(1);

/// Which scheduling attributes the random policy hands out.
#[derive(Clone, Debug, PartialEq)]
pub enum ProcPolicy {
    /// Gentle nice-level shuffling.
    Mild {
        /// Use `Batch` instead of `Normal`.
        use_batch: bool,
    },
    /// A few real-time processes, everyone else batch.
    Extreme {
        /// How many PIDs get `RoundRobin`.
        prioritized: usize,
    },
    /// Random CPU shares through `Deadline`.
    Dirichlet {
        /// Chance of resetting a PID to `Normal`.
        reset_probability: f64,
    },
}

impl Default for ProcPolicy {
    fn default() -> Self {
        ProcPolicy::Mild { use_batch: true }
    }
}

impl ProcPolicy {
    /// Parses `procPolicy` and `procPolicyParam`.
    pub fn from_params(params: &PolicyParams) -> Result<Self, ConfigError> {
        let name = params.string("procPolicy")?.unwrap_or_else(|| "mild".into());
        let sub = params.nested("procPolicyParam")?.unwrap_or_default();
        match name.as_str() {
            "mild" => Ok(ProcPolicy::Mild {
                use_batch: sub.bool("useBatch")?.unwrap_or(true),
            }),
            "extreme" => Ok(ProcPolicy::Extreme {
                prioritized: sub.u64("prioritized")?.unwrap_or(3) as usize,
            }),
            "dirichlet" => {
                let p = sub.f64("resetProbability")?.unwrap_or(0.1);
                if !(0.0..=1.0).contains(&p) {
                    return Err(ConfigError::InvalidProbability {
                        param: "procPolicyParam.resetProbability".into(),
                        value: p,
                    });
                }
                Ok(ProcPolicy::Dirichlet {
                    reset_probability: p,
                })
            }
            _ => Err(ConfigError::UnknownProcPolicy { name }),
        }
    }

    /// Registry-style name.
    pub fn name(&self) -> &'static str {
        match self {
            ProcPolicy::Mild { .. } => "mild",
            ProcPolicy::Extreme { .. } => "extreme",
            ProcPolicy::Dirichlet { .. } => "dirichlet",
        }
    }

    /// Builds the `ProcSetSchedAction` for `event`.
    pub fn action(&self, event: Arc<Event>) -> Result<Action, SignalError> {
        let procs = event.procs()?;
        let attrs = self.attrs(&procs);
        Action::proc_set_sched(event, &attrs)
    }

    fn attrs(&self, procs: &[String]) -> BTreeMap<String, SchedAttr> {
        match *self {
            ProcPolicy::Mild { use_batch } => mild(procs, use_batch),
            ProcPolicy::Extreme { prioritized } => extreme(procs, prioritized),
            ProcPolicy::Dirichlet { reset_probability } => dirichlet(procs, reset_probability),
        }
    }
}

fn mild(procs: &[String], use_batch: bool) -> BTreeMap<String, SchedAttr> {
    let mut rng = rand::rng();
    let policy = if use_batch {
        SchedPolicy::Batch
    } else {
        SchedPolicy::Normal
    };
    procs
        .iter()
        .map(|pid| {
            let nice = -20 + rng.random_range(0..40);
            (pid.clone(), SchedAttr::with_nice(policy, nice))
        })
        .collect()
}

fn extreme(procs: &[String], prioritized: usize) -> BTreeMap<String, SchedAttr> {
    let mut rng = rand::rng();
    let mut chosen = vec![false; procs.len()];
    if !procs.is_empty() {
        for _ in 0..prioritized {
            chosen[rng.random_range(0..procs.len())] = true;
        }
    }
    procs
        .iter()
        .zip(chosen)
        .map(|(pid, rt)| {
            let attr = if rt {
                SchedAttr {
                    policy: SchedPolicy::RoundRobin,
                    priority: rng.random_range(0..10),
                    ..SchedAttr::default()
                }
            } else {
                SchedAttr::with_nice(SchedPolicy::Batch, 0)
            };
            (pid.clone(), attr)
        })
        .collect()
}

fn dirichlet(procs: &[String], reset_probability: f64) -> BTreeMap<String, SchedAttr> {
    let mut rng = rand::rng();
    let ratios = flat_dirichlet(&mut rng, procs.len());
    let ncpu = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1) as f64;
    let base = DEADLINE_BASE.as_nanos() as f64;

    procs
        .iter()
        .zip(ratios)
        .map(|(pid, r)| {
            let attr = if rng.random_bool(reset_probability) {
                SchedAttr::normal()
            } else {
                SchedAttr {
                    policy: SchedPolicy::Deadline,
                    flags: SCHED_FLAG_RESET_ON_FORK,
                    runtime_ns: (base * r * ncpu) as u64,
                    deadline_ns: base as u64,
                    period_ns: base as u64,
                    ..SchedAttr::default()
                }
            };
            (pid.clone(), attr)
        })
        .collect()
}

/// Samples `Dir(1, ..., 1)` by normalizing unit exponentials.
fn flat_dirichlet<R: Rng>(rng: &mut R, n: usize) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }
    let draws: Vec<f64> = (0..n)
        .map(|_| -(1.0 - rng.random::<f64>()).ln())
        .collect();
    let sum: f64 = draws.iter().sum();
    if sum <= 0.0 {
        return vec![1.0 / n as f64; n];
    }
    draws.into_iter().map(|d| d / sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::{ActionClass, OptionMap};
    use serde_json::json;

    fn params(v: serde_json::Value) -> PolicyParams {
        serde_json::from_value(v).unwrap()
    }

    fn pids(n: usize) -> Vec<String> {
        (0..n).map(|i| i.to_string()).collect()
    }

    #[test]
    fn test_defaults_to_mild_batch() {
        let p = ProcPolicy::from_params(&PolicyParams::new()).unwrap();
        assert_eq!(p, ProcPolicy::Mild { use_batch: true });
    }

    #[test]
    fn test_unknown_proc_policy() {
        let err = ProcPolicy::from_params(&params(json!({"procPolicy": "chaotic"}))).unwrap_err();
        assert_eq!(err.as_label(), "config_unknown_proc_policy");
    }

    #[test]
    fn test_bad_reset_probability() {
        let err = ProcPolicy::from_params(&params(json!({
            "procPolicy": "dirichlet",
            "procPolicyParam": {"resetProbability": 1.5}
        })))
        .unwrap_err();
        assert_eq!(err.as_label(), "config_invalid_probability");
    }

    #[test]
    fn test_mild_nice_range() {
        let attrs = mild(&pids(200), false);
        assert_eq!(attrs.len(), 200);
        for a in attrs.values() {
            assert_eq!(a.policy, SchedPolicy::Normal);
            assert!((-20..20).contains(&a.nice));
        }
    }

    #[test]
    fn test_extreme_prioritizes_at_most_n() {
        let attrs = extreme(&pids(50), 3);
        let rr = attrs
            .values()
            .filter(|a| a.policy == SchedPolicy::RoundRobin)
            .count();
        assert!((1..=3).contains(&rr));
        assert!(attrs.values().all(|a| a.priority < 10));
        assert!(extreme(&[], 3).is_empty());
    }

    #[test]
    fn test_dirichlet_mixes_normal_and_deadline() {
        let attrs = dirichlet(&pids(100), 0.5);
        let normal = attrs.values().filter(|a| a.policy == SchedPolicy::Normal).count();
        let deadline = attrs
            .values()
            .filter(|a| a.policy == SchedPolicy::Deadline)
            .count();
        assert!(normal > 0);
        assert!(deadline > 0);
        assert_eq!(normal + deadline, 100);
        for a in attrs.values().filter(|a| a.policy == SchedPolicy::Deadline) {
            assert_eq!(a.deadline_ns, 1_000_000);
            assert_eq!(a.period_ns, a.deadline_ns);
        }
    }

    #[test]
    fn test_flat_dirichlet_sums_to_one() {
        let mut rng = rand::rng();
        let r = flat_dirichlet(&mut rng, 10);
        let sum: f64 = r.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
        assert!(r.iter().all(|x| *x >= 0.0));
    }

    #[test]
    fn test_action_from_event() {
        let ev = Arc::new(Event::proc_set("p", ["1", "2"], OptionMap::new()));
        let act = ProcPolicy::default().action(ev).unwrap();
        assert_eq!(act.class(), ActionClass::ProcSetSched);
        let attrs = act.sched_attrs().unwrap();
        assert_eq!(attrs.keys().collect::<Vec<_>>(), vec!["1", "2"]);
    }
}
