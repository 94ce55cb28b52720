/// Property-based tests for ledger reconciliation using proptest
///
/// Random sequences of deposits, withdrawals and purchases are applied to an
/// in-memory ledger. Whatever succeeds or fails, every wallet balance must
/// equal the sum of its ledger rows and no balance may go negative.
use fixcoin::db::MemoryLedgerRepository;
use fixcoin::purchase::{CourseRef, TransferRequest};
use fixcoin::wallet::Reconciliation;
use fixcoin::{Ledger, LedgerConfig};
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::sync::Arc;

const USERS: i64 = 4;

#[derive(Debug, Clone)]
enum Op {
    Deposit { user: i64, cents: i64 },
    Withdraw { user: i64, cents: i64 },
    Purchase { buyer: i64, seller: i64, cents: i64, rate_pct: u32 },
}

// Strategy to generate one ledger operation; user 0 is the platform account
fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1..USERS, 1i64..50_000).prop_map(|(user, cents)| Op::Deposit { user, cents }),
        (1..USERS, 1i64..50_000).prop_map(|(user, cents)| Op::Withdraw { user, cents }),
        (1..USERS, 1..USERS, 0i64..30_000, 0u32..=100).prop_map(
            |(buyer, seller, cents, rate_pct)| Op::Purchase {
                buyer,
                seller,
                cents,
                rate_pct
            }
        ),
    ]
}

/// Apply one operation and return the money it moved into (positive) or out
/// of (negative) the system. Rejected operations move nothing.
async fn apply(ledger: &Ledger, op: &Op) -> Decimal {
    match *op {
        Op::Deposit { user, cents } => {
            let amount = Decimal::new(cents, 2);
            match ledger.wallets().deposit(user, amount, None).await {
                Ok(_) => amount,
                Err(_) => Decimal::ZERO,
            }
        }
        Op::Withdraw { user, cents } => {
            let amount = Decimal::new(cents, 2);
            match ledger.wallets().withdraw(user, amount, None).await {
                Ok(_) => -amount,
                Err(_) => Decimal::ZERO,
            }
        }
        Op::Purchase {
            buyer,
            seller,
            cents,
            rate_pct,
        } => {
            let course = CourseRef {
                id: 1,
                title: "Property course".to_string(),
            };
            let request = TransferRequest::new(
                buyer,
                seller,
                course,
                Decimal::new(cents, 2),
                Decimal::new(i64::from(rate_pct), 2),
            );
            // Purchases only move money between wallets
            let _ = ledger
                .purchases()
                .transfer_for_course_purchase(request)
                .await;
            Decimal::ZERO
        }
    }
}

struct Outcome {
    mismatched: Vec<Reconciliation>,
    balances: Vec<Decimal>,
    net_inflow: Decimal,
}

fn run(ops: Vec<Op>) -> Outcome {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();

    runtime.block_on(async {
        let repo = Arc::new(MemoryLedgerRepository::new().with_superuser(0));
        let ledger = Ledger::new(repo, LedgerConfig::default());

        let mut net_inflow = Decimal::ZERO;
        for op in &ops {
            net_inflow += apply(&ledger, op).await;
        }

        let mismatched = ledger.wallets().audit().await.unwrap();
        let mut balances = Vec::new();
        for user in 0..USERS {
            balances.push(ledger.wallets().get_wallet(user).await.unwrap().balance);
        }
        Outcome {
            mismatched,
            balances,
            net_inflow,
        }
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_balances_always_reconcile(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let Outcome { mismatched, balances, .. } = run(ops);

        prop_assert!(mismatched.is_empty(), "inconsistent wallets: {:?}", mismatched);
        for balance in balances {
            prop_assert!(balance >= Decimal::ZERO, "negative balance {}", balance);
        }
    }

    #[test]
    fn test_purchases_conserve_money(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let outcome = run(ops);

        // Commission lands in the platform wallet (user 0), which is counted too
        let total: Decimal = outcome.balances.iter().copied().sum();
        prop_assert_eq!(total, outcome.net_inflow);
    }
}
