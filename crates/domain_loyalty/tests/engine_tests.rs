//! End-to-end engine tests against the in-memory store

use std::sync::Arc;

use core_kernel::{LedgerEntryId, Points, RequestId, UserId};
use domain_loyalty::{
    EarnRequest, EngineConfig, LoyaltyEngine, LoyaltyError, MemoryLedgerStore, SpendRequest,
    TierTable, TransactionType,
};
use test_utils::{
    assert_aggregate_consistent, assert_balance, assert_lifetime, assert_tier_level, init_tracing,
    seed_ledger, FailingNotifier, RecordingNotifier, TemporalFixtures, TestEntryBuilder,
};

fn engine_with(
    store: &MemoryLedgerStore,
    notifier: &RecordingNotifier,
) -> LoyaltyEngine {
    init_tracing();
    LoyaltyEngine::new(
        Arc::new(store.clone()),
        Arc::new(notifier.clone()),
        TierTable::standard(),
    )
}

async fn earn(engine: &LoyaltyEngine, user_id: UserId, points: i64) -> LedgerEntryId {
    engine
        .earn_points(EarnRequest::new(
            user_id,
            Points::new(points),
            TransactionType::BookingCompleted,
        ))
        .await
        .unwrap()
        .id
}

// ============================================================================
// Earn Tests
// ============================================================================
mod earn_tests {
    use super::*;

    #[tokio::test]
    async fn test_first_earn_creates_ledger() {
        let store = MemoryLedgerStore::new();
        let notifier = RecordingNotifier::new();
        let engine = engine_with(&store, &notifier);
        let user_id = UserId::new();

        let entry = engine
            .earn_points(
                EarnRequest::new(user_id, Points::new(500), TransactionType::BookingCompleted)
                    .with_description("welcome booking"),
            )
            .await
            .unwrap();

        assert_eq!(entry.points, Points::new(500));
        assert_eq!(entry.balance_after, Points::new(500));
        assert!(entry.expires_at.is_some());
        assert!(entry.is_active());

        let aggregate = engine.get_aggregate(user_id).await.unwrap();
        assert_balance(&aggregate, 500);
        assert_lifetime(&aggregate, 500);
        assert_tier_level(&aggregate, Some(1));
        assert_eq!(aggregate.version, 1);

        let history = engine.history(user_id).await.unwrap();
        assert_aggregate_consistent(&aggregate, &history);

        // a brand-new user lands in the bottom tier, which counts as an upgrade
        assert_eq!(
            notifier.event_types().await,
            vec!["PointsEarned", "TierUpgraded"]
        );
    }

    #[tokio::test]
    async fn test_earn_rejects_non_positive_amounts() {
        let store = MemoryLedgerStore::new();
        let notifier = RecordingNotifier::new();
        let engine = engine_with(&store, &notifier);
        let user_id = UserId::new();

        for amount in [0, -100] {
            let result = engine
                .earn_points(EarnRequest::new(
                    user_id,
                    Points::new(amount),
                    TransactionType::Referral,
                ))
                .await;
            assert!(matches!(result, Err(LoyaltyError::InvalidPointsAmount(_))));
        }

        assert!(notifier.events().await.is_empty());
    }

    #[tokio::test]
    async fn test_earn_crossing_tier_boundary_upgrades() {
        let store = MemoryLedgerStore::new();
        let notifier = RecordingNotifier::new();
        let engine = engine_with(&store, &notifier);
        let user_id = UserId::new();

        earn(&engine, user_id, 800).await;
        notifier.clear().await;
        earn(&engine, user_id, 400).await;

        let aggregate = engine.get_aggregate(user_id).await.unwrap();
        assert_lifetime(&aggregate, 1_200);
        assert_tier_level(&aggregate, Some(2));
        assert_eq!(
            notifier.event_types().await,
            vec!["PointsEarned", "TierUpgraded"]
        );

        let next = engine.next_tier(user_id).await.unwrap().unwrap();
        assert_eq!(next.name, "Gold");
    }

    #[tokio::test]
    async fn test_duplicate_request_id_returns_original_entry() {
        let store = MemoryLedgerStore::new();
        let notifier = RecordingNotifier::new();
        let engine = engine_with(&store, &notifier);
        let user_id = UserId::new();
        let request_id = RequestId::new();

        let first = engine
            .earn_points(
                EarnRequest::new(user_id, Points::new(500), TransactionType::OrderCompleted)
                    .with_request_id(request_id),
            )
            .await
            .unwrap();
        let second = engine
            .earn_points(
                EarnRequest::new(user_id, Points::new(500), TransactionType::OrderCompleted)
                    .with_request_id(request_id),
            )
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_balance(&engine.get_aggregate(user_id).await.unwrap(), 500);
        assert_eq!(engine.history(user_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_earns_serialize_per_user() {
        let store = MemoryLedgerStore::new();
        let notifier = RecordingNotifier::new();
        let engine = Arc::new(engine_with(&store, &notifier).with_config(EngineConfig {
            max_commit_retries: 100,
            ..EngineConfig::default()
        }));
        let user_id = UserId::new();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let engine = Arc::clone(&engine);
            handles.push(tokio::spawn(async move {
                engine
                    .earn_points(EarnRequest::new(
                        user_id,
                        Points::new(100),
                        TransactionType::ReviewSubmitted,
                    ))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let aggregate = engine.get_aggregate(user_id).await.unwrap();
        assert_balance(&aggregate, 800);
        assert_eq!(aggregate.version, 8);
        assert_aggregate_consistent(&aggregate, &engine.history(user_id).await.unwrap());
    }
}

// ============================================================================
// Spend Tests
// ============================================================================
mod spend_tests {
    use super::*;

    #[tokio::test]
    async fn test_spend_reduces_balance_not_lifetime() {
        let store = MemoryLedgerStore::new();
        let notifier = RecordingNotifier::new();
        let engine = engine_with(&store, &notifier);
        let user_id = UserId::new();

        earn(&engine, user_id, 500).await;
        let entry = engine
            .spend_points(
                SpendRequest::new(user_id, Points::new(200), TransactionType::Redemption)
                    .with_description("gift card"),
            )
            .await
            .unwrap();

        assert_eq!(entry.points, Points::new(-200));
        assert_eq!(entry.balance_after, Points::new(300));
        assert!(entry.expires_at.is_none());

        let aggregate = engine.get_aggregate(user_id).await.unwrap();
        assert_balance(&aggregate, 300);
        assert_lifetime(&aggregate, 500);
        assert_eq!(aggregate.total_points_spent, Points::new(200));
        assert_tier_level(&aggregate, Some(1));
    }

    #[tokio::test]
    async fn test_overspend_rejected_without_side_effects() {
        let store = MemoryLedgerStore::new();
        let notifier = RecordingNotifier::new();
        let engine = engine_with(&store, &notifier);
        let user_id = UserId::new();

        earn(&engine, user_id, 100).await;
        notifier.clear().await;

        let result = engine
            .spend_points(SpendRequest::new(
                user_id,
                Points::new(101),
                TransactionType::Redemption,
            ))
            .await;

        assert!(matches!(
            result,
            Err(LoyaltyError::InsufficientBalance {
                available,
                requested,
            }) if available == Points::new(100) && requested == Points::new(101)
        ));
        assert_balance(&engine.get_aggregate(user_id).await.unwrap(), 100);
        assert_eq!(engine.history(user_id).await.unwrap().len(), 1);
        assert!(notifier.events().await.is_empty());
    }

    #[tokio::test]
    async fn test_spend_for_unknown_user_fails() {
        let store = MemoryLedgerStore::new();
        let notifier = RecordingNotifier::new();
        let engine = engine_with(&store, &notifier);

        let result = engine
            .spend_points(SpendRequest::new(
                UserId::new(),
                Points::new(50),
                TransactionType::Redemption,
            ))
            .await;
        assert!(matches!(result, Err(LoyaltyError::UserNotFound(_))));
    }
}

// ============================================================================
// Reversal Tests
// ============================================================================
mod reversal_tests {
    use super::*;

    #[tokio::test]
    async fn test_reverse_earn_restores_state() {
        let store = MemoryLedgerStore::new();
        let notifier = RecordingNotifier::new();
        let engine = engine_with(&store, &notifier);
        let user_id = UserId::new();

        let entry_id = earn(&engine, user_id, 500).await;
        notifier.clear().await;

        let comp = engine
            .reverse_transaction(entry_id, "support", "duplicate award")
            .await
            .unwrap();

        assert_eq!(comp.points, Points::new(-500));
        assert_eq!(comp.transaction_type, TransactionType::Adjustment);
        assert!(comp.is_reversed);

        let aggregate = engine.get_aggregate(user_id).await.unwrap();
        assert_balance(&aggregate, 0);
        assert_lifetime(&aggregate, 0);

        let history = engine.history(user_id).await.unwrap();
        assert_eq!(history.len(), 2);
        let original = history.iter().find(|e| e.id == entry_id).unwrap();
        assert!(original.is_reversed);
        assert_eq!(original.reversed_by.as_deref(), Some("support"));
        assert_aggregate_consistent(&aggregate, &history);
    }

    #[tokio::test]
    async fn test_reverse_earn_emits_downgrade() {
        let store = MemoryLedgerStore::new();
        let notifier = RecordingNotifier::new();
        let engine = engine_with(&store, &notifier);
        let user_id = UserId::new();

        let entry_id = earn(&engine, user_id, 1_500).await;
        assert_tier_level(&engine.get_aggregate(user_id).await.unwrap(), Some(2));
        notifier.clear().await;

        engine
            .reverse_transaction(entry_id, "fraud-ops", "chargeback")
            .await
            .unwrap();

        assert_tier_level(&engine.get_aggregate(user_id).await.unwrap(), Some(1));
        assert_eq!(
            notifier.event_types().await,
            vec!["TransactionReversed", "TierDowngraded"]
        );
    }

    #[tokio::test]
    async fn test_reverse_spend_restores_balance() {
        let store = MemoryLedgerStore::new();
        let notifier = RecordingNotifier::new();
        let engine = engine_with(&store, &notifier);
        let user_id = UserId::new();

        earn(&engine, user_id, 500).await;
        let spend = engine
            .spend_points(SpendRequest::new(
                user_id,
                Points::new(200),
                TransactionType::Redemption,
            ))
            .await
            .unwrap();

        let comp = engine
            .reverse_transaction(spend.id, "support", "order cancelled")
            .await
            .unwrap();

        assert_eq!(comp.points, Points::new(200));
        let aggregate = engine.get_aggregate(user_id).await.unwrap();
        assert_balance(&aggregate, 500);
        assert_eq!(aggregate.total_points_spent, Points::ZERO);
        assert_lifetime(&aggregate, 500);
    }

    #[tokio::test]
    async fn test_double_reversal_rejected() {
        let store = MemoryLedgerStore::new();
        let notifier = RecordingNotifier::new();
        let engine = engine_with(&store, &notifier);
        let user_id = UserId::new();

        let entry_id = earn(&engine, user_id, 300).await;
        engine
            .reverse_transaction(entry_id, "support", "first")
            .await
            .unwrap();

        let result = engine
            .reverse_transaction(entry_id, "support", "second")
            .await;
        assert!(matches!(result, Err(LoyaltyError::AlreadyReversed(_))));
        assert_balance(&engine.get_aggregate(user_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reverse_unknown_entry_fails() {
        let store = MemoryLedgerStore::new();
        let notifier = RecordingNotifier::new();
        let engine = engine_with(&store, &notifier);

        let result = engine
            .reverse_transaction(LedgerEntryId::new(), "support", "nothing here")
            .await;
        assert!(matches!(result, Err(LoyaltyError::EntryNotFound(_))));
    }

    #[tokio::test]
    async fn test_reverse_earn_after_spending_it_rejected() {
        let store = MemoryLedgerStore::new();
        let notifier = RecordingNotifier::new();
        let engine = engine_with(&store, &notifier);
        let user_id = UserId::new();

        let entry_id = earn(&engine, user_id, 500).await;
        engine
            .spend_points(SpendRequest::new(
                user_id,
                Points::new(300),
                TransactionType::Redemption,
            ))
            .await
            .unwrap();

        // clawing back 500 from a balance of 200 would overdraw
        let result = engine
            .reverse_transaction(entry_id, "support", "too late")
            .await;
        assert!(matches!(
            result,
            Err(LoyaltyError::InsufficientBalance { .. })
        ));
        assert_balance(&engine.get_aggregate(user_id).await.unwrap(), 200);
    }
}

// ============================================================================
// Expiry Tests
// ============================================================================
mod expiry_tests {
    use super::*;

    #[tokio::test]
    async fn test_sweep_expires_due_entries() {
        let store = MemoryLedgerStore::new();
        let notifier = RecordingNotifier::new();
        let engine = engine_with(&store, &notifier);
        let user_id = UserId::new();

        let stale_a = TestEntryBuilder::new(user_id)
            .with_points(Points::new(300))
            .expired_days_ago(10)
            .build();
        let stale_b = TestEntryBuilder::new(user_id)
            .with_points(Points::new(200))
            .expired_days_ago(5)
            .build();
        let fresh = TestEntryBuilder::new(user_id)
            .with_points(Points::new(100))
            .build();
        seed_ledger(&store, user_id, vec![stale_a, stale_b, fresh]).await;

        let expired = engine
            .process_expiring_points(TemporalFixtures::now())
            .await
            .unwrap();
        assert_eq!(expired, 2);

        let aggregate = engine.get_aggregate(user_id).await.unwrap();
        assert_balance(&aggregate, 100);
        assert_lifetime(&aggregate, 600);

        let history = engine.history(user_id).await.unwrap();
        assert_eq!(history.iter().filter(|e| e.is_expired).count(), 2);
        assert_aggregate_consistent(&aggregate, &history);

        // one event per user per run, regardless of entry count
        assert_eq!(notifier.event_types().await, vec!["PointsExpired"]);
    }

    #[tokio::test]
    async fn test_sweep_is_idempotent() {
        let store = MemoryLedgerStore::new();
        let notifier = RecordingNotifier::new();
        let engine = engine_with(&store, &notifier);
        let user_id = UserId::new();

        let stale = TestEntryBuilder::new(user_id)
            .with_points(Points::new(300))
            .expired_days_ago(10)
            .build();
        seed_ledger(&store, user_id, vec![stale]).await;

        let now = TemporalFixtures::now();
        assert_eq!(engine.process_expiring_points(now).await.unwrap(), 1);
        assert_eq!(engine.process_expiring_points(now).await.unwrap(), 0);
        assert_balance(&engine.get_aggregate(user_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sweep_spans_multiple_users() {
        let store = MemoryLedgerStore::new();
        let notifier = RecordingNotifier::new();
        let engine = engine_with(&store, &notifier);

        let user_a = UserId::new();
        let user_b = UserId::new();
        for user_id in [user_a, user_b] {
            let stale = TestEntryBuilder::new(user_id)
                .with_points(Points::new(150))
                .expired_days_ago(3)
                .build();
            seed_ledger(&store, user_id, vec![stale]).await;
        }

        let expired = engine
            .process_expiring_points(TemporalFixtures::now())
            .await
            .unwrap();
        assert_eq!(expired, 2);
        assert_balance(&engine.get_aggregate(user_a).await.unwrap(), 0);
        assert_balance(&engine.get_aggregate(user_b).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reversing_expired_earn_keeps_balance() {
        let store = MemoryLedgerStore::new();
        let notifier = RecordingNotifier::new();
        let engine = engine_with(&store, &notifier);
        let user_id = UserId::new();

        let stale = TestEntryBuilder::new(user_id)
            .with_points(Points::new(400))
            .expired_days_ago(1)
            .build();
        let entry_id = stale.id;
        seed_ledger(&store, user_id, vec![stale]).await;

        engine
            .process_expiring_points(TemporalFixtures::now())
            .await
            .unwrap();
        assert_balance(&engine.get_aggregate(user_id).await.unwrap(), 0);

        // the expired entry no longer backs the balance, so only the
        // lifetime counters move
        engine
            .reverse_transaction(entry_id, "audit", "ineligible booking")
            .await
            .unwrap();

        let aggregate = engine.get_aggregate(user_id).await.unwrap();
        assert_balance(&aggregate, 0);
        assert_lifetime(&aggregate, 0);
    }
}

// ============================================================================
// Notification Tests
// ============================================================================
mod notification_tests {
    use super::*;

    #[tokio::test]
    async fn test_sink_failure_does_not_fail_the_operation() {
        init_tracing();
        let store = MemoryLedgerStore::new();
        let engine = LoyaltyEngine::new(
            Arc::new(store.clone()),
            Arc::new(FailingNotifier),
            TierTable::standard(),
        );
        let user_id = UserId::new();

        let entry = engine
            .earn_points(EarnRequest::new(
                user_id,
                Points::new(500),
                TransactionType::BookingCompleted,
            ))
            .await
            .unwrap();

        assert_eq!(entry.points, Points::new(500));
        assert_balance(&engine.get_aggregate(user_id).await.unwrap(), 500);
    }
}

// ============================================================================
// Query Tests
// ============================================================================
mod query_tests {
    use super::*;

    #[tokio::test]
    async fn test_queries_for_unknown_user_fail() {
        let store = MemoryLedgerStore::new();
        let notifier = RecordingNotifier::new();
        let engine = engine_with(&store, &notifier);
        let user_id = UserId::new();

        assert!(matches!(
            engine.get_balance(user_id).await,
            Err(LoyaltyError::UserNotFound(_))
        ));
        assert!(matches!(
            engine.current_tier(user_id).await,
            Err(LoyaltyError::UserNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_tier_queries() {
        let store = MemoryLedgerStore::new();
        let notifier = RecordingNotifier::new();
        let engine = engine_with(&store, &notifier);
        let user_id = UserId::new();

        earn(&engine, user_id, 3_500).await;

        let current = engine.current_tier(user_id).await.unwrap().unwrap();
        assert_eq!(current.name, "Gold");
        let next = engine.next_tier(user_id).await.unwrap().unwrap();
        assert_eq!(next.name, "Platinum");
        assert_eq!(engine.get_balance(user_id).await.unwrap(), Points::new(3_500));
    }
}
