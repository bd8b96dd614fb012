//! Chained policy storage transactions.

use super::{blocking, BenchError, BenchTarget, DurationCategory};
use crate::benchmarks::{BenchmarkResult, LatencyStats};
use crate::fixtures::sample_policies;
use async_trait::async_trait;
use pdp_engine::storage::{PolicyStorage, PolicyUpdate, UpdateOp};
use pdp_engine::{AttributeAssignment, AttributeValue, Effect, Error, ErrorKind, Rule};
use serde_json::json;
use uuid::Uuid;

const ITERATIONS: usize = 2_000;
const USERS: usize = 32;

/// Measures opening a transaction, applying an update which adds a rule to
/// one of the user policies, and committing it. Every commit is the base of
/// the next transaction.
pub struct StorageUpdateAdapter {
    iterations: usize,
}

impl StorageUpdateAdapter {
    /// Create an adapter with the default iteration count.
    pub fn new() -> Self {
        Self {
            iterations: ITERATIONS,
        }
    }

    /// Adapter with a custom iteration count.
    pub fn with_iterations(iterations: usize) -> Self {
        Self { iterations }
    }
}

impl Default for StorageUpdateAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn update(base: Uuid, i: usize) -> Result<PolicyUpdate, Error> {
    let rule = Rule::builder(format!("audit-{i}"))
        .effect(Effect::Deny)
        .obligation(AttributeAssignment::with_value(
            "reason",
            AttributeValue::String("audit".into()),
        ))
        .build()?;

    let mut u = PolicyUpdate::new(base, Uuid::new_v4());
    u.append(
        UpdateOp::Add,
        vec!["root".to_string(), format!("user-{}", i % USERS)],
        Some(rule.into()),
    );
    Ok(u)
}

fn apply_chain(
    mut storage: PolicyStorage,
    iterations: usize,
) -> Result<(PolicyStorage, LatencyStats), Error> {
    let stats = LatencyStats::measure(iterations, |i| {
        let base = storage
            .tag()
            .ok_or_else(|| Error::new(ErrorKind::UntaggedPolicyModification))?;
        let mut tx = storage.new_transaction(Some(base))?;
        tx.apply(&update(base, i)?)?;
        storage = tx.commit()?;
        Ok::<_, Error>(())
    })?;
    Ok((storage, stats))
}

#[async_trait]
impl BenchTarget for StorageUpdateAdapter {
    fn id(&self) -> &str {
        "storage_update"
    }

    fn description(&self) -> &str {
        "Applies and commits chained policy storage transactions"
    }

    fn duration_category(&self) -> DurationCategory {
        DurationCategory::Medium
    }

    async fn run(&self) -> Result<BenchmarkResult, BenchError> {
        let iterations = self.iterations;
        let id = self.id().to_string();

        blocking(move || {
            let storage = sample_policies(USERS, Some(Uuid::new_v4()))?;
            let (_, stats) = apply_chain(storage, iterations)?;

            Ok(BenchmarkResult::new(
                id,
                stats.to_metrics("transaction_commit", json!({ "users": USERS })),
            ))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdp_engine::storage::PolicyNode;

    #[test]
    fn test_chain_adds_rules() {
        let t0 = Uuid::new_v4();
        let (storage, stats) = apply_chain(sample_policies(USERS, Some(t0)).unwrap(), 3).unwrap();

        assert_eq!(stats.iterations, 3);
        assert_ne!(storage.tag(), Some(t0));

        let path = ["root", "user-1", "audit-1"].map(String::from);
        match storage.get_path(&path).unwrap() {
            PolicyNode::Rule(r) => assert_eq!(r.id(), "audit-1"),
            PolicyNode::Evaluable(_) => panic!("expected rule"),
        }
    }

    #[tokio::test]
    async fn test_run_benchmark() {
        let result = StorageUpdateAdapter::with_iterations(5).run().await.unwrap();
        assert!(result.is_success());
        assert_eq!(result.metrics["iterations"], 5);
    }
}
