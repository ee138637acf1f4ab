//! Stale-case sweep.
//!
//! Periodic batch scan: for each configured assignment group, query open
//! cases older than the group's age threshold and post capped follow-up
//! notes. The cap is a hard per-group, per-run limit so a backlog can
//! never turn into a notification storm. Runs to completion once started;
//! the caller holds the single active-sweep lock.

use chrono::{Duration, Utc};
use tracing::{info, warn};
use triage_common::{SweepGroupSummary, SweepSummary};

use crate::config::GroupPolicy;
use crate::ticketing::{CaseRecord, CaseStore};

/// Upper bound on records fetched per group, independent of the follow-up
/// cap, so the total count stays meaningful.
const STALE_QUERY_LIMIT: usize = 100;

pub async fn sweep(store: &dyn CaseStore, groups: &[GroupPolicy]) -> SweepSummary {
    let mut summary = SweepSummary::default();
    let now = Utc::now();

    for policy in groups {
        let cutoff = now - Duration::hours(policy.max_age_hours as i64);

        let stale = match store
            .query_stale(&policy.name, cutoff, STALE_QUERY_LIMIT)
            .await
        {
            Ok(cases) => cases,
            Err(e) => {
                warn!("stale query failed for group {}: {}", policy.name, e);
                summary
                    .errors
                    .push(format!("group {}: {}", policy.name, e));
                continue;
            }
        };

        let mut posted = 0usize;
        for case in stale.iter().take(policy.followup_limit) {
            match store
                .add_work_note(&case.sys_id, &followup_note(case, policy))
                .await
            {
                Ok(()) => posted += 1,
                Err(e) => {
                    warn!("follow-up failed for {}: {}", case.number, e);
                    summary.errors.push(format!("case {}: {}", case.number, e));
                }
            }
        }

        info!(
            "group {}: {} stale, {} follow-ups posted (cap {})",
            policy.name,
            stale.len(),
            posted,
            policy.followup_limit
        );

        summary.total_stale += stale.len();
        summary.followups_posted += posted;
        summary.groups.push(SweepGroupSummary {
            assignment_group: policy.name.clone(),
            total_stale: stale.len(),
            followups_posted: posted,
            age_threshold_hours: policy.max_age_hours,
            channel: policy.channel.clone(),
        });
    }

    summary
}

/// The date marker makes repeated runs in one day recognizable in the work
/// notes; follow-up idempotency across runs stays best-effort.
fn followup_note(case: &CaseRecord, policy: &GroupPolicy) -> String {
    format!(
        "[stale-followup {}] Case {} has been open past the {}h threshold for group {}. Please review.",
        Utc::now().format("%Y-%m-%d"),
        case.number,
        policy.max_age_hours,
        policy.name,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ticketing::StoreError;
    use async_trait::async_trait;
    use chrono::DateTime;
    use serde_json::Map;
    use std::sync::Mutex;
    use triage_common::ClassificationResult;

    struct FakeStore {
        stale: Vec<CaseRecord>,
        notes: Mutex<Vec<String>>,
        fail_notes: bool,
    }

    fn record(n: usize) -> CaseRecord {
        CaseRecord {
            sys_id: format!("sys{}", n),
            number: format!("CASE{:03}", n),
            short_description: "old case".to_string(),
            description: None,
            assignment_group: Some("Network".to_string()),
            state: Some("open".to_string()),
            opened_at: None,
            extra: Map::new(),
        }
    }

    #[async_trait]
    impl CaseStore for FakeStore {
        async fn fetch_case(&self, sys_id: &str) -> Result<CaseRecord, StoreError> {
            Err(StoreError::NotFound(sys_id.to_string()))
        }

        async fn query_stale(
            &self,
            _group: &str,
            _cutoff: DateTime<Utc>,
            limit: usize,
        ) -> Result<Vec<CaseRecord>, StoreError> {
            Ok(self.stale.iter().take(limit).cloned().collect())
        }

        async fn add_work_note(&self, sys_id: &str, note: &str) -> Result<(), StoreError> {
            if self.fail_notes {
                return Err(StoreError::Api {
                    status: 503,
                    body: "unavailable".to_string(),
                });
            }
            self.notes
                .lock()
                .unwrap()
                .push(format!("{}: {}", sys_id, note));
            Ok(())
        }

        async fn update_classification(
            &self,
            _sys_id: &str,
            _result: &ClassificationResult,
        ) -> Result<(), StoreError> {
            Ok(())
        }
    }

    fn policy(limit: usize) -> GroupPolicy {
        GroupPolicy {
            name: "Network".to_string(),
            max_age_hours: 72,
            followup_limit: limit,
            channel: None,
        }
    }

    #[tokio::test]
    async fn test_followups_capped_per_group() {
        let store = FakeStore {
            stale: (0..10).map(record).collect(),
            notes: Mutex::new(vec![]),
            fail_notes: false,
        };

        let summary = sweep(&store, &[policy(3)]).await;

        assert_eq!(summary.total_stale, 10);
        assert_eq!(summary.followups_posted, 3);
        assert_eq!(store.notes.lock().unwrap().len(), 3);
        assert_eq!(summary.groups[0].followups_posted, 3);
        assert!(summary.errors.is_empty());
    }

    #[tokio::test]
    async fn test_fewer_stale_than_cap() {
        let store = FakeStore {
            stale: (0..2).map(record).collect(),
            notes: Mutex::new(vec![]),
            fail_notes: false,
        };

        let summary = sweep(&store, &[policy(5)]).await;
        assert_eq!(summary.total_stale, 2);
        assert_eq!(summary.followups_posted, 2);
    }

    #[tokio::test]
    async fn test_note_failures_recorded_not_fatal() {
        let store = FakeStore {
            stale: (0..4).map(record).collect(),
            notes: Mutex::new(vec![]),
            fail_notes: true,
        };

        let summary = sweep(&store, &[policy(2)]).await;
        assert_eq!(summary.followups_posted, 0);
        assert_eq!(summary.errors.len(), 2);
        // The sweep still reports the stale total.
        assert_eq!(summary.total_stale, 4);
    }

    #[tokio::test]
    async fn test_group_summary_carries_channel_binding() {
        let store = FakeStore {
            stale: vec![record(1)],
            notes: Mutex::new(vec![]),
            fail_notes: false,
        };
        let with_channel = GroupPolicy {
            name: "Network".to_string(),
            max_age_hours: 72,
            followup_limit: 1,
            channel: Some("#network-oncall".to_string()),
        };

        let summary = sweep(&store, &[with_channel, policy(1)]).await;
        assert_eq!(
            summary.groups[0].channel.as_deref(),
            Some("#network-oncall")
        );
        assert!(summary.groups[1].channel.is_none());
    }

    #[tokio::test]
    async fn test_note_carries_run_marker() {
        let store = FakeStore {
            stale: vec![record(1)],
            notes: Mutex::new(vec![]),
            fail_notes: false,
        };
        sweep(&store, &[policy(1)]).await;
        let notes = store.notes.lock().unwrap();
        assert!(notes[0].contains("[stale-followup"));
        assert!(notes[0].contains("72h threshold"));
    }
}
