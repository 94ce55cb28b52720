//! Operator CLI for the FixCoin wallet ledger.
//!
//! Runs schema migrations, moves FixCoin in and out of wallets, prints
//! statements and statistics, audits balances against the ledger, manages
//! promo codes and retries pending outbox side effects.

mod config;
mod logging;

use std::sync::Arc;

use anyhow::{Error, bail};
use chrono::{DateTime, Utc};
use fixcoin::{
    Ledger, UserId,
    db::{Database, PgLedgerRepository},
    promo::{DiscountType, NewPromoCode},
    wallet::{StatementFilter, TransactionType},
};
use pico_args::Arguments;
use rust_decimal::Decimal;
use tracing::info;

use config::AdminConfig;
use logging::{log_audit_result, log_ledger_event};

const HELP: &str = "\
Administer the FixCoin wallet ledger

USAGE:
  fixcoin_admin [OPTIONS] <COMMAND> [ARGS]

COMMANDS:
  migrate                              Apply pending schema migrations
  balance <USER>                       Print a wallet balance
  deposit <USER> <AMOUNT>              Top up a wallet           [--note TEXT]
  withdraw <USER> <AMOUNT>             Pay out from a wallet     [--note TEXT]
  statement <USER>                     List ledger rows, newest first
                                         [--type TYPE] [--limit N] [--offset N]
  stats <USER>                         Print wallet statistics as JSON
  audit                                Reconcile every wallet against its ledger
  promo-create <CODE> <percent|coins> <VALUE>
                                       Create a promo code
                                         [--max-uses N] [--from RFC3339] [--to RFC3339]
                                         [--course ID]... [--course-type ID]...
  promo-deactivate <CODE>              Deactivate a promo code
  drain-outbox                         Retry pending purchase side effects

OPTIONS:
  --db-url     URL         Database connection string  [default: env DATABASE_URL]

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  DATABASE_URL                 PostgreSQL connection string
  FIXCOIN_COMMISSION_RATE      Platform commission rate [default: 0.05]
  FIXCOIN_MAX_DEPOSIT          Largest single deposit [default: 100000]
  FIXCOIN_PLATFORM_USER_ID     Commission account [default: first superuser]
  FIXCOIN_OUTBOX_MAX_ATTEMPTS  Attempts per side effect [default: 5]
  FIXCOIN_OUTBOX_BATCH_SIZE    Entries per drain pass [default: 100]
  RUST_LOG                     Log filter [default: info,sqlx=warn]
";

#[derive(Debug, PartialEq)]
enum Command {
    Migrate,
    Balance {
        user_id: UserId,
    },
    Deposit {
        user_id: UserId,
        amount: Decimal,
        note: Option<String>,
    },
    Withdraw {
        user_id: UserId,
        amount: Decimal,
        note: Option<String>,
    },
    Statement {
        user_id: UserId,
        filter: StatementFilter,
    },
    Stats {
        user_id: UserId,
    },
    Audit,
    PromoCreate(NewPromoCode),
    PromoDeactivate {
        code: String,
    },
    DrainOutbox,
}

/// Parse the subcommand and its arguments. Options are read before
/// positional arguments so they may appear anywhere on the line.
fn parse_command(pargs: &mut Arguments) -> Result<Command, Error> {
    let Some(name) = pargs.subcommand()? else {
        bail!("No command given, see --help");
    };

    let command = match name.as_str() {
        "migrate" => Command::Migrate,
        "balance" => Command::Balance {
            user_id: pargs.free_from_str()?,
        },
        "deposit" | "withdraw" => {
            let note = pargs.opt_value_from_str("--note")?;
            let user_id = pargs.free_from_str()?;
            let amount = pargs.free_from_str()?;
            if name == "deposit" {
                Command::Deposit {
                    user_id,
                    amount,
                    note,
                }
            } else {
                Command::Withdraw {
                    user_id,
                    amount,
                    note,
                }
            }
        }
        "statement" => {
            let defaults = StatementFilter::default();
            let filter = StatementFilter {
                transaction_type: pargs.opt_value_from_str::<_, TransactionType>("--type")?,
                limit: pargs.opt_value_from_str("--limit")?.unwrap_or(defaults.limit),
                offset: pargs.opt_value_from_str("--offset")?.unwrap_or(defaults.offset),
            };
            Command::Statement {
                user_id: pargs.free_from_str()?,
                filter,
            }
        }
        "stats" => Command::Stats {
            user_id: pargs.free_from_str()?,
        },
        "audit" => Command::Audit,
        "promo-create" => {
            let max_uses: Option<i32> = pargs.opt_value_from_str("--max-uses")?;
            let valid_from: Option<DateTime<Utc>> = pargs.opt_value_from_str("--from")?;
            let valid_to: Option<DateTime<Utc>> = pargs.opt_value_from_str("--to")?;
            let courses = pargs.values_from_str("--course")?;
            let course_types = pargs.values_from_str("--course-type")?;
            let code: String = pargs.free_from_str()?;
            let discount_type: DiscountType = pargs.free_from_str()?;
            let value: Decimal = pargs.free_from_str()?;

            let mut promo = NewPromoCode::new(code, discount_type, value)
                .with_window(valid_from, valid_to)
                .for_courses(courses)
                .for_course_types(course_types);
            promo.max_uses = max_uses;
            Command::PromoCreate(promo)
        }
        "promo-deactivate" => Command::PromoDeactivate {
            code: pargs.free_from_str()?,
        },
        "drain-outbox" => Command::DrainOutbox,
        other => bail!("Unknown command: {other}, see --help"),
    };

    Ok(command)
}

async fn run(db: &Database, ledger: &Ledger, command: Command) -> Result<(), Error> {
    match command {
        Command::Migrate => {
            db.migrate().await?;
            log_ledger_event("migrate", None, None, "Schema up to date");
        }
        Command::Balance { user_id } => {
            let wallet = ledger.wallets().get_wallet(user_id).await?;
            println!("{}", wallet.balance);
        }
        Command::Deposit {
            user_id,
            amount,
            note,
        } => {
            let row = ledger.wallets().deposit(user_id, amount, note).await?;
            log_ledger_event(
                "deposit",
                Some(user_id),
                Some(&amount.to_string()),
                &row.description,
            );
            println!("Transaction {}: balance {}", row.id, row.balance_after);
        }
        Command::Withdraw {
            user_id,
            amount,
            note,
        } => {
            let row = ledger.wallets().withdraw(user_id, amount, note).await?;
            log_ledger_event(
                "withdraw",
                Some(user_id),
                Some(&amount.to_string()),
                &row.description,
            );
            println!("Transaction {}: balance {}", row.id, row.balance_after);
        }
        Command::Statement { user_id, filter } => {
            for row in ledger.wallets().statement(user_id, &filter).await? {
                println!(
                    "{:>8}  {}  {:<32} {:>12} {:>12}  {}",
                    row.id,
                    row.created_at.format("%Y-%m-%d %H:%M:%S"),
                    row.transaction_type.label(),
                    row.amount,
                    row.balance_after,
                    row.description
                );
            }
        }
        Command::Stats { user_id } => {
            let stats = ledger.wallets().stats(user_id).await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Command::Audit => {
            let mismatched = ledger.wallets().audit().await?;
            log_audit_result(mismatched.len());
            println!("{}", serde_json::to_string_pretty(&mismatched)?);
            if !mismatched.is_empty() {
                bail!("{} wallet(s) out of balance", mismatched.len());
            }
        }
        Command::PromoCreate(promo) => {
            let created = ledger.promos().create_promo(promo).await?;
            log_ledger_event("promo_create", None, None, &created.code);
            println!("{}", serde_json::to_string_pretty(&created)?);
        }
        Command::PromoDeactivate { code } => {
            ledger.promos().deactivate_promo(&code).await?;
            log_ledger_event("promo_deactivate", None, None, &code);
            println!("Promo code {code} deactivated");
        }
        Command::DrainOutbox => {
            let report = ledger.outbox().drain().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let database_url: Option<String> = pargs.opt_value_from_str("--db-url")?;
    let command = parse_command(&mut pargs)?;
    let remaining = pargs.finish();
    if !remaining.is_empty() {
        bail!("Unexpected arguments: {remaining:?}");
    }

    logging::init();

    let config = AdminConfig::from_env(database_url)?;
    config.validate()?;

    let db = Database::new(&config.database)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;
    db.health_check()
        .await
        .map_err(|e| anyhow::anyhow!("Database health check failed: {}", e))?;

    let repo = Arc::new(PgLedgerRepository::new(db.pool().clone()));
    let ledger = Ledger::new(repo, config.ledger.clone());
    info!(
        "Ledger ready (commission rate {})",
        ledger.config().commission_rate
    );

    let result = run(&db, &ledger, command).await;
    db.close().await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::dec;
    use std::ffi::OsString;

    fn parse(args: &[&str]) -> Result<Command, Error> {
        let args: Vec<OsString> = args.iter().map(OsString::from).collect();
        let mut pargs = Arguments::from_vec(args);
        let command = parse_command(&mut pargs)?;
        let remaining = pargs.finish();
        if !remaining.is_empty() {
            bail!("Unexpected arguments: {remaining:?}");
        }
        Ok(command)
    }

    #[test]
    fn test_parse_deposit_with_note() {
        let command = parse(&["deposit", "7", "12.50", "--note", "Gift card"]).unwrap();
        assert_eq!(
            command,
            Command::Deposit {
                user_id: 7,
                amount: dec!(12.50),
                note: Some("Gift card".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_statement_filter() {
        let command =
            parse(&["statement", "--type", "course_purchase", "--limit", "5", "3"]).unwrap();
        let Command::Statement { user_id, filter } = command else {
            panic!("expected statement");
        };
        assert_eq!(user_id, 3);
        assert_eq!(filter.transaction_type, Some(TransactionType::CoursePurchase));
        assert_eq!(filter.limit, 5);
        assert_eq!(filter.offset, 0);
    }

    #[test]
    fn test_parse_promo_create() {
        let command = parse(&[
            "promo-create",
            "SPRING20",
            "percent",
            "20",
            "--max-uses",
            "100",
            "--course",
            "4",
            "--course",
            "9",
        ])
        .unwrap();
        let Command::PromoCreate(promo) = command else {
            panic!("expected promo-create");
        };
        assert_eq!(promo.code, "SPRING20");
        assert_eq!(promo.discount_type, DiscountType::Percent);
        assert_eq!(promo.max_uses, Some(100));
        assert_eq!(promo.courses, vec![4, 9]);
        assert!(promo.course_types.is_empty());
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["refund", "1"]).is_err());
        assert!(parse(&["balance", "not-a-user"]).is_err());
        assert!(parse(&["statement", "1", "--type", "chargeback"]).is_err());
        assert!(parse(&["audit", "extra"]).is_err());
    }
}
