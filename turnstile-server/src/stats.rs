//! Per-client outcome statistics

use std::collections::HashMap;
use tokio::sync::RwLock;
use turnstile_common::{ClientCounters, Outcome, Polarity, StatsSnapshot, TotalCounters};

/// Read-path condition: the client identity has never been recorded.
///
/// Distinct from a present client with zero counts, which cannot occur (an
/// entry is only created by a recorded outcome).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("client '{0}' has no recorded requests")]
pub struct ClientNotFound(pub String);

#[derive(Debug, Default)]
struct StatsInner {
    clients: HashMap<String, ClientCounters>,
    totals: TotalCounters,
}

/// Concurrency-safe aggregate of outcome counts keyed by client identity.
///
/// One lock guards both the per-client map and the polarity totals; they are
/// logically coupled and must never move independently, or a reader could
/// observe totals that disagree with the per-client sums.
#[derive(Debug, Default)]
pub struct StatsStore {
    inner: RwLock<StatsInner>,
}

impl StatsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one outcome for one client.
    ///
    /// Creates the client's counter map on first record, increments the
    /// outcome count and the matching polarity total in a single critical
    /// section. Once the guard is held the update runs to completion.
    pub async fn record(&self, client_id: &str, outcome: Outcome) {
        let mut inner = self.inner.write().await;

        let counters = inner.clients.entry(client_id.to_string()).or_default();
        *counters.entry(outcome.code()).or_insert(0) += 1;

        match outcome.polarity() {
            Polarity::Positive => inner.totals.total_positive += 1,
            Polarity::Negative => inner.totals.total_negative += 1,
        }
    }

    /// Consistent point-in-time copy of every client's counters.
    ///
    /// A deep copy, not a live view: taken under the same exclusion `record`
    /// uses, so no partially-updated entry is ever observable.
    pub async fn snapshot_all(&self) -> StatsSnapshot {
        let inner = self.inner.read().await;
        inner
            .clients
            .iter()
            .map(|(id, counters)| (id.clone(), counters.clone()))
            .collect()
    }

    /// Consistent copy of one client's counters, or `ClientNotFound` if the
    /// identity has never been written.
    pub async fn snapshot_one(&self, client_id: &str) -> Result<ClientCounters, ClientNotFound> {
        let inner = self.inner.read().await;
        inner
            .clients
            .get(client_id)
            .cloned()
            .ok_or_else(|| ClientNotFound(client_id.to_string()))
    }

    /// Per-client snapshot and polarity totals taken under one guard, so the
    /// two halves cannot disagree.
    pub async fn snapshot_with_totals(&self) -> (StatsSnapshot, TotalCounters) {
        let inner = self.inner.read().await;
        let snapshot = inner
            .clients
            .iter()
            .map(|(id, counters)| (id.clone(), counters.clone()))
            .collect();
        (snapshot, inner.totals.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn polarity_sums(snapshot: &StatsSnapshot) -> (u64, u64) {
        let mut positive = 0;
        let mut negative = 0;
        for counters in snapshot.values() {
            for (code, count) in counters {
                match Outcome::try_from(*code).expect("store only holds outcome codes") {
                    o if o.polarity() == Polarity::Positive => positive += count,
                    _ => negative += count,
                }
            }
        }
        (positive, negative)
    }

    #[tokio::test]
    async fn test_lazy_client_creation() {
        let store = StatsStore::new();

        assert_eq!(
            store.snapshot_one("X").await,
            Err(ClientNotFound("X".to_string()))
        );

        store.record("X", Outcome::Accepted).await;

        let counters = store.snapshot_one("X").await.unwrap();
        assert_eq!(counters.len(), 1);
        assert_eq!(counters[&202], 1);
    }

    #[tokio::test]
    async fn test_unknown_client_is_not_found() {
        let store = StatsStore::new();
        store.record("known", Outcome::Ok).await;
        assert!(store.snapshot_one("unknown").await.is_err());
    }

    #[tokio::test]
    async fn test_empty_identity_is_its_own_bucket() {
        let store = StatsStore::new();
        store.record("", Outcome::Ok).await;
        store.record("named", Outcome::Ok).await;

        assert_eq!(store.snapshot_one("").await.unwrap()[&200], 1);
        let snapshot = store.snapshot_all().await;
        assert_eq!(snapshot.len(), 2);
    }

    #[tokio::test]
    async fn test_mixed_outcomes_for_one_client() {
        let store = StatsStore::new();
        for outcome in [
            Outcome::Ok,
            Outcome::Ok,
            Outcome::Accepted,
            Outcome::BadRequest,
            Outcome::ServerError,
        ] {
            store.record("B", outcome).await;
        }

        let counters = store.snapshot_one("B").await.unwrap();
        assert_eq!(counters[&200], 2);
        assert_eq!(counters[&202], 1);
        assert_eq!(counters[&400], 1);
        assert_eq!(counters[&500], 1);

        let (_, totals) = store.snapshot_with_totals().await;
        assert_eq!(totals.total_positive, 3);
        assert_eq!(totals.total_negative, 2);
    }

    /// Exactly-once recording: N concurrent records, any mix of clients and
    /// outcomes, end up as exactly N counts.
    #[tokio::test]
    async fn test_concurrent_records_count_exactly_once() {
        let store = Arc::new(StatsStore::new());
        let clients = ["A", "B", "C", ""];
        let outcomes = [
            Outcome::Ok,
            Outcome::Accepted,
            Outcome::BadRequest,
            Outcome::ServerError,
        ];

        let mut handles = Vec::new();
        for i in 0..400 {
            let store = store.clone();
            let client = clients[i % clients.len()].to_string();
            let outcome = outcomes[i % outcomes.len()];
            handles.push(tokio::spawn(async move {
                store.record(&client, outcome).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let (snapshot, totals) = store.snapshot_with_totals().await;
        let recorded: u64 = snapshot
            .values()
            .flat_map(|counters| counters.values())
            .sum();
        assert_eq!(recorded, 400);
        assert_eq!(totals.total_positive + totals.total_negative, 400);

        let (positive, negative) = polarity_sums(&snapshot);
        assert_eq!(positive, totals.total_positive);
        assert_eq!(negative, totals.total_negative);
    }

    /// Snapshots taken while writers are in flight must be internally
    /// consistent: per-client polarity sums always equal the totals captured
    /// in the same snapshot.
    #[tokio::test]
    async fn test_snapshot_never_tears_under_concurrent_writers() {
        let store = Arc::new(StatsStore::new());

        let mut writers = Vec::new();
        for w in 0..4 {
            let store = store.clone();
            writers.push(tokio::spawn(async move {
                let client = format!("writer-{}", w);
                for i in 0..200 {
                    let outcome = if i % 3 == 0 {
                        Outcome::ServerError
                    } else {
                        Outcome::Ok
                    };
                    store.record(&client, outcome).await;
                }
            }));
        }

        for _ in 0..100 {
            let (snapshot, totals) = store.snapshot_with_totals().await;
            let (positive, negative) = polarity_sums(&snapshot);
            assert_eq!(positive, totals.total_positive);
            assert_eq!(negative, totals.total_negative);
            tokio::task::yield_now().await;
        }

        for writer in writers {
            writer.await.unwrap();
        }

        let (snapshot, totals) = store.snapshot_with_totals().await;
        let recorded: u64 = snapshot
            .values()
            .flat_map(|counters| counters.values())
            .sum();
        assert_eq!(recorded, 800);
        assert_eq!(totals.total_positive + totals.total_negative, 800);
    }

    #[tokio::test]
    async fn test_snapshot_is_a_copy_not_a_view() {
        let store = StatsStore::new();
        store.record("A", Outcome::Ok).await;

        let before = store.snapshot_all().await;
        store.record("A", Outcome::Ok).await;

        assert_eq!(before["A"][&200], 1);
        assert_eq!(store.snapshot_one("A").await.unwrap()[&200], 2);
    }
}
