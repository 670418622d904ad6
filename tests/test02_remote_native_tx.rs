mod common;

use common::{TestResult, ledger, remote, text};
use ledger_sql_driver::prelude::*;

async fn insert_customer(conn: &mut Connection, ctx: &CallContext, name: &str) -> Result<ExecOutcome, LedgerSqlError> {
    conn.exec(
        ctx,
        "INSERT INTO customers (name) VALUES (?)",
        &Param::positional_list(&[text(name)]),
    )
    .await
}

#[tokio::test]
async fn statements_report_their_own_outcome_inside_a_transaction() -> TestResult {
    let ledger = ledger()?;
    let mut conn = remote(&ledger).await?;
    let ctx = CallContext::background();

    conn.begin_tx(&ctx, TxOptions::default()).await?;
    let first = insert_customer(&mut conn, &ctx, "Maria").await?;
    let second = insert_customer(&mut conn, &ctx, "Marc").await?;
    assert_eq!(first.rows_affected(), Some(1));
    assert_eq!(first.result().and_then(|r| r.known_last_insert_id()), Some(1));
    assert_eq!(second.result().and_then(|r| r.known_last_insert_id()), Some(2));

    // Both tables now carry a key; the snapshot tells which one moved.
    let order = conn
        .exec(
            &ctx,
            "INSERT INTO orders (customer_id, total) VALUES (?, ?)",
            &Param::positional_list(&[RowValues::Int(2), RowValues::Int(1200)]),
        )
        .await?;
    assert_eq!(order.result().and_then(|r| r.known_last_insert_id()), Some(1));
    let third = insert_customer(&mut conn, &ctx, "Aiko").await?;
    assert_eq!(third.result().and_then(|r| r.known_last_insert_id()), Some(3));

    let update = conn
        .exec(
            &ctx,
            "UPDATE customers SET name = ? WHERE id < ?",
            &Param::positional_list(&[text("renamed"), RowValues::Int(3)]),
        )
        .await?;
    assert_eq!(update.rows_affected(), Some(2));
    assert_eq!(update.result().map(|r| r.last_insert_id()), Some(UNKNOWN_LAST_INSERT_ID));

    let res = conn.commit(&ctx).await?;
    assert_eq!(res.rows_affected(), 6);
    assert_eq!(ledger.count_rows("customers")?, 3);
    assert_eq!(ledger.count_rows("orders")?, 1);
    Ok(())
}

#[tokio::test]
async fn queries_see_uncommitted_writes() -> TestResult {
    let ledger = ledger()?;
    let mut conn = remote(&ledger).await?;
    let ctx = CallContext::background();

    conn.begin_tx(&ctx, TxOptions::default()).await?;
    insert_customer(&mut conn, &ctx, "Maria").await?;
    let rs = conn
        .query(
            &ctx,
            "SELECT id, name FROM customers WHERE name = ?",
            &Param::positional_list(&[text("Maria")]),
        )
        .await?
        .collect()
        .await?;
    assert_eq!(rs.len(), 1);
    assert_eq!(rs.results[0].get("name").and_then(RowValues::as_text), Some("Maria"));

    conn.rollback(&ctx).await?;
    assert_eq!(ledger.count_rows("customers")?, 0);
    assert_eq!(ledger.cancel_count(), 0);
    Ok(())
}

#[tokio::test]
async fn failed_commit_cancels_and_clears_the_transaction() -> TestResult {
    let ledger = ledger()?;
    let mut conn = remote(&ledger).await?;
    let ctx = CallContext::background();

    conn.begin_tx(&ctx, TxOptions::default()).await?;
    insert_customer(&mut conn, &ctx, "Maria").await?;
    ledger.fail_next_commit();

    let err = conn.commit(&ctx).await.unwrap_err();
    assert!(matches!(err, LedgerSqlError::Engine(_)));
    assert_eq!(ledger.cancel_count(), 1);
    assert!(!conn.in_transaction());
    assert_eq!(ledger.count_rows("customers")?, 0);

    // The connection is usable for a fresh transaction.
    conn.begin_tx(&ctx, TxOptions::default()).await?;
    insert_customer(&mut conn, &ctx, "Marc").await?;
    conn.commit(&ctx).await?;
    assert_eq!(ledger.count_rows("customers")?, 1);
    Ok(())
}

#[tokio::test]
async fn failed_rollback_cancels_the_transaction() -> TestResult {
    let ledger = ledger()?;
    let mut conn = remote(&ledger).await?;
    let ctx = CallContext::background();

    conn.begin_tx(&ctx, TxOptions::default()).await?;
    insert_customer(&mut conn, &ctx, "Maria").await?;
    ledger.fail_next_rollback();

    assert!(conn.rollback(&ctx).await.is_err());
    assert_eq!(ledger.cancel_count(), 1);
    assert!(!conn.in_transaction());
    assert_eq!(ledger.count_rows("customers")?, 0);
    Ok(())
}

#[tokio::test]
async fn canceled_context_on_commit_still_finishes_the_transaction() -> TestResult {
    let ledger = ledger()?;
    let mut conn = remote(&ledger).await?;
    let ctx = CallContext::background();

    conn.begin_tx(&ctx, TxOptions::default()).await?;
    insert_customer(&mut conn, &ctx, "Maria").await?;

    let canceled = ctx.child();
    canceled.cancel();
    let err = conn.commit(&canceled).await.unwrap_err();
    assert!(matches!(err, LedgerSqlError::Canceled));
    assert!(!conn.in_transaction());
    assert_eq!(ledger.cancel_count(), 1);
    assert_eq!(ledger.count_rows("customers")?, 0);
    Ok(())
}

#[tokio::test]
async fn nested_begin_is_rejected_on_the_remote_backend_too() -> TestResult {
    let ledger = ledger()?;
    let mut conn = remote(&ledger).await?;
    let ctx = CallContext::background();

    conn.begin_tx(&ctx, TxOptions::default()).await?;
    assert!(matches!(
        conn.begin_tx(&ctx, TxOptions::default()).await,
        Err(LedgerSqlError::NestedTransaction)
    ));
    insert_customer(&mut conn, &ctx, "Maria").await?;
    conn.commit(&ctx).await?;
    assert_eq!(ledger.count_rows("customers")?, 1);
    Ok(())
}

#[tokio::test]
async fn ping_reports_session_liveness() -> TestResult {
    let ledger = ledger()?;
    let mut conn = remote(&ledger).await?;
    let ctx = CallContext::background();

    conn.ping(&ctx).await?;
    conn.reset_session(&ctx).await?;

    ledger.set_healthy(false);
    assert!(matches!(conn.ping(&ctx).await, Err(LedgerSqlError::BadConnection)));
    conn.reset_session(&ctx).await?;

    ledger.set_healthy(true);
    ledger.set_connected(false);
    let err = conn.ping(&ctx).await.unwrap_err();
    assert!(err.is_bad_connection());
    assert!(matches!(
        conn.reset_session(&ctx).await,
        Err(LedgerSqlError::BadConnection)
    ));
    Ok(())
}

#[tokio::test]
async fn exist_table_scans_the_table_list() -> TestResult {
    let ledger = ledger()?;
    let mut conn = remote(&ledger).await?;
    let ctx = CallContext::background();

    assert!(conn.exist_table(&ctx, "customers").await?);
    assert!(conn.exist_table(&ctx, "pairs").await?);
    assert!(!conn.exist_table(&ctx, "invoices").await?);
    Ok(())
}

#[tokio::test]
async fn autocommitted_exec_outside_a_transaction() -> TestResult {
    let ledger = ledger()?;
    let mut conn = remote(&ledger).await?;
    let ctx = CallContext::background();

    let outcome = conn
        .exec(
            &ctx,
            "INSERT INTO pairs (a, b) VALUES (@a, @b)",
            &[
                Param::named("a", 1, RowValues::Int(7)),
                Param::named("b", 2, RowValues::Int(8)),
            ],
        )
        .await?;
    assert!(!outcome.is_deferred());
    assert_eq!(outcome.rows_affected(), Some(1));
    assert_eq!(ledger.count_rows("pairs")?, 1);
    Ok(())
}
