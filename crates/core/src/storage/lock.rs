use anyhow::Context;

// Advisory locks are scoped to the Postgres session, so acquire and release must run on the same
// connection.
const LOCK_NAMESPACE: i64 = 0x4352_4544_4954; // "CREDIT"

fn lock_key_for_ticker(ticker: &str) -> i64 {
    // FNV-1a, so the key is stable across processes and releases.
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in ticker.bytes() {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    LOCK_NAMESPACE ^ (hash as i64)
}

pub async fn try_acquire_ticker_lock(
    conn: &mut sqlx::PgConnection,
    ticker: &str,
) -> anyhow::Result<bool> {
    let key = lock_key_for_ticker(ticker);
    let acquired: (bool,) = sqlx::query_as("SELECT pg_try_advisory_lock($1)")
        .persistent(false)
        .bind(key)
        .fetch_one(&mut *conn)
        .await
        .with_context(|| format!("failed to acquire advisory lock for {ticker} (key={key})"))?;
    Ok(acquired.0)
}

pub async fn release_ticker_lock(
    conn: &mut sqlx::PgConnection,
    ticker: &str,
) -> anyhow::Result<()> {
    let key = lock_key_for_ticker(ticker);
    sqlx::query("SELECT pg_advisory_unlock($1)")
        .persistent(false)
        .bind(key)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("failed to release advisory lock for {ticker} (key={key})"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_stable_and_distinct() {
        assert_eq!(lock_key_for_ticker("AAPL"), lock_key_for_ticker("AAPL"));
        assert_ne!(lock_key_for_ticker("AAPL"), lock_key_for_ticker("MSFT"));
    }
}
