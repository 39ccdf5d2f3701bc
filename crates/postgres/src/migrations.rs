use sqlx::PgPool;

/// Create `audit_events` and `audit_chain_anchors` if absent, and add any
/// columns a legacy deployment might be missing. Every statement uses `IF
/// NOT EXISTS` so this can run, unconditionally, on every process start.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "
        CREATE TABLE IF NOT EXISTS audit_events (
            seq         BIGSERIAL PRIMARY KEY,
            ts          TEXT NOT NULL,
            tenant_id   TEXT NOT NULL DEFAULT '',
            action      TEXT NOT NULL,
            actor       TEXT NOT NULL,
            object      TEXT NOT NULL,
            details     TEXT,
            request_id  TEXT,
            chain_hash  TEXT
        )
        ",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "
        CREATE TABLE IF NOT EXISTS audit_chain_anchors (
            seq         BIGINT PRIMARY KEY,
            ts          TEXT NOT NULL,
            chain_hash  TEXT NOT NULL
        )
        ",
    )
    .execute(pool)
    .await?;

    // Idempotent column additions for legacy deployments that predate the
    // chain/tenancy columns.
    let add_columns = [
        "ALTER TABLE audit_events ADD COLUMN IF NOT EXISTS tenant_id TEXT NOT NULL DEFAULT ''",
        "ALTER TABLE audit_events ADD COLUMN IF NOT EXISTS chain_hash TEXT",
    ];
    for stmt in add_columns {
        sqlx::query(stmt).execute(pool).await?;
    }

    let indexes = [
        "CREATE INDEX IF NOT EXISTS idx_audit_events_action_ts ON audit_events (action, ts)",
        "CREATE INDEX IF NOT EXISTS idx_audit_events_tenant_ts ON audit_events (tenant_id, ts)",
    ];
    for stmt in indexes {
        sqlx::query(stmt).execute(pool).await?;
    }

    Ok(())
}
