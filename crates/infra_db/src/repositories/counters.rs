//! Transactionally reserved document numbers
//!
//! Bill and claim numbers restart every year. Each `(kind, year)` pair owns a
//! counter row that is bumped with an upsert, so the row lock taken by the
//! update serializes concurrent reservations and no two transactions can
//! receive the same value.

use sqlx::PgConnection;

use crate::error::DatabaseError;

pub(crate) const BILL_COUNTER: &str = "bill";
pub(crate) const CLAIM_COUNTER: &str = "insurance_claim";

/// Reserves the next sequence value for `kind` in `year`
///
/// The value is only consumed if the surrounding transaction commits.
pub(crate) async fn next_sequence(
    conn: &mut PgConnection,
    kind: &str,
    year: i32,
) -> Result<i64, DatabaseError> {
    let value: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO document_counters (kind, year, last_value)
        VALUES ($1, $2, 1)
        ON CONFLICT (kind, year)
        DO UPDATE SET last_value = document_counters.last_value + 1
        RETURNING last_value
        "#,
    )
    .bind(kind)
    .bind(year)
    .fetch_one(&mut *conn)
    .await?;

    Ok(value)
}
