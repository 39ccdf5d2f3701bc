use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use tokio::sync::Mutex as AsyncMutex;
use tracing::warn;
use vaultlog_core::chain::{self, compute_chain_hash, format_ts};
use vaultlog_core::context::run_cancellable;
use vaultlog_core::{
    Anchor, AuditContext, AuditError, AuditMetrics, AuditPage, AuditQuery, ChainHead, DurableStore, EventRecord,
    IntegrityExport, RetentionPolicy, Sink,
};
use vaultlog_crypto::SecretSet;

use crate::config::PostgresStoreConfig;
use crate::migrations;

#[derive(sqlx::FromRow)]
struct EventRow {
    seq: i64,
    ts: String,
    tenant_id: String,
    action: String,
    actor: String,
    object: String,
    details: Option<String>,
    request_id: Option<String>,
    chain_hash: Option<String>,
}

impl EventRow {
    fn into_record(self) -> Result<EventRecord, AuditError> {
        let details = match self.details {
            Some(raw) => serde_json::from_str(&raw)?,
            None => Value::Null,
        };
        let ts = DateTime::parse_from_rfc3339(&self.ts)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| AuditError::Storage(format!("stored ts is not RFC3339: {e}")))?;
        Ok(EventRecord {
            seq: self.seq,
            ts,
            tenant_id: self.tenant_id,
            action: self.action,
            actor: self.actor,
            object: self.object,
            details,
            request_id: self.request_id.unwrap_or_default(),
            chain_hash: self.chain_hash.unwrap_or_default(),
        })
    }
}

#[derive(sqlx::FromRow)]
struct AnchorRow {
    seq: i64,
    ts: String,
    chain_hash: String,
}

impl AnchorRow {
    fn into_anchor(self) -> Result<Anchor, AuditError> {
        let ts = DateTime::parse_from_rfc3339(&self.ts)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| AuditError::Storage(format!("stored ts is not RFC3339: {e}")))?;
        Ok(Anchor {
            seq: self.seq,
            ts,
            chain_hash: self.chain_hash,
        })
    }
}

/// `sqlx::PgPool`-backed [`DurableStore`].
///
/// `write_lock` serializes the read-head/write/anchor/prune sequence
/// described for the concurrency model: Postgres alone does not guarantee
/// that the `prev_hash` a writer reads is still the true head by the time it
/// inserts, so this process enforces single-writer discipline itself rather
/// than relying on row-level locking tricks.
pub struct PostgresDurableStore {
    pool: PgPool,
    write_lock: AsyncMutex<()>,
    hasher: Option<SecretSet>,
    retention: RetentionPolicy,
    anchor_interval: u64,
    metrics: Arc<AuditMetrics>,
}

impl PostgresDurableStore {
    /// Connect and run migrations.
    pub async fn new(config: PostgresStoreConfig, metrics: Arc<AuditMetrics>) -> Result<Self, AuditError> {
        let pool = PgPool::connect(&config.url)
            .await
            .map_err(|e| AuditError::Storage(e.to_string()))?;
        Self::from_pool(pool, config, metrics).await
    }

    /// Build from an already-connected pool (useful for tests against a
    /// Postgres test container).
    pub async fn from_pool(pool: PgPool, config: PostgresStoreConfig, metrics: Arc<AuditMetrics>) -> Result<Self, AuditError> {
        migrations::run_migrations(&pool)
            .await
            .map_err(|e| AuditError::Storage(e.to_string()))?;
        let hasher = (!config.hash_secrets.is_empty()).then(|| SecretSet::new(config.hash_secrets));
        Ok(Self {
            pool,
            write_lock: AsyncMutex::new(()),
            hasher,
            retention: config.retention,
            anchor_interval: config.anchor_interval,
            metrics,
        })
    }

    fn pseudonymize(&self, raw: &str) -> String {
        match &self.hasher {
            Some(set) => set.hash(raw),
            None => vaultlog_core::record::REDACTED.to_owned(),
        }
    }

    /// Run one retention pass now. Called synchronously after every insert
    /// and again on the background sweep interval (see [`crate::cleanup`]) as
    /// defense-in-depth against a missed per-insert pass.
    pub async fn sweep_retention(&self) -> Result<(), AuditError> {
        let _guard = self.write_lock.lock().await;
        self.apply_retention_locked().await
    }

    async fn apply_retention_locked(&self) -> Result<(), AuditError> {
        let mut rows_pruned = 0u64;

        if let Some(max_rows) = self.retention.row_bound() {
            let result = sqlx::query(
                "DELETE FROM audit_events WHERE seq <= (SELECT COALESCE(MAX(seq), 0) FROM audit_events) - $1",
            )
            .bind(max_rows)
            .execute(&self.pool)
            .await
            .map_err(|e| AuditError::Storage(e.to_string()))?;
            rows_pruned += result.rows_affected();
        }

        if let Some(max_age) = self.retention.age_bound() {
            if let Ok(max_age) = chrono::Duration::from_std(max_age) {
                let cutoff = format_ts(Utc::now() - max_age);
                let result = sqlx::query(
                    "DELETE FROM audit_events WHERE ts < $1 AND seq < (SELECT COALESCE(MAX(seq), 0) FROM audit_events)",
                )
                .bind(cutoff)
                .execute(&self.pool)
                .await
                .map_err(|e| AuditError::Storage(e.to_string()))?;
                rows_pruned += result.rows_affected();
            }
        }

        let anchor_result = sqlx::query(
            "DELETE FROM audit_chain_anchors WHERE seq < (SELECT COALESCE(MIN(seq), 0) FROM audit_events)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AuditError::Storage(e.to_string()))?;

        self.metrics.record_evictions("postgres_rows", rows_pruned);
        self.metrics
            .record_evictions("postgres_anchors", anchor_result.rows_affected());
        Ok(())
    }
}

#[async_trait]
impl Sink for PostgresDurableStore {
    async fn event(&self, ctx: &AuditContext, tenant_id: &str, action: &str, actor: &str, object: &str, details: Value) {
        let start = Instant::now();
        let ts = Utc::now();
        let formatted_ts = format_ts(ts);
        let stored_actor = self.pseudonymize(actor);
        let stored_object = self.pseudonymize(object);
        let canonical_details = vaultlog_core::canonical::canonicalize(&details);
        let request_id = ctx.request_id.clone();

        let result: Result<i64, sqlx::Error> = async {
            let _guard = self.write_lock.lock().await;

            let prev_hash: Option<String> =
                sqlx::query_scalar("SELECT chain_hash FROM audit_events ORDER BY seq DESC LIMIT 1")
                    .fetch_optional(&self.pool)
                    .await?
                    .flatten();
            let prev_hash = prev_hash.unwrap_or_default();

            let chain_hash = compute_chain_hash(
                &prev_hash,
                &formatted_ts,
                tenant_id,
                action,
                &stored_actor,
                &stored_object,
                &canonical_details,
                &request_id,
            );

            let seq: i64 = sqlx::query_scalar(
                "INSERT INTO audit_events (ts, tenant_id, action, actor, object, details, request_id, chain_hash)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                 RETURNING seq",
            )
            .bind(&formatted_ts)
            .bind(tenant_id)
            .bind(action)
            .bind(&stored_actor)
            .bind(&stored_object)
            .bind(&canonical_details)
            .bind(&request_id)
            .bind(&chain_hash)
            .fetch_one(&self.pool)
            .await?;

            if self.anchor_interval > 0 && (seq as u64) % self.anchor_interval == 0 {
                if let Err(e) = sqlx::query(
                    "INSERT INTO audit_chain_anchors (seq, ts, chain_hash) VALUES ($1, $2, $3)
                     ON CONFLICT (seq) DO NOTHING",
                )
                .bind(seq)
                .bind(&formatted_ts)
                .bind(&chain_hash)
                .execute(&self.pool)
                .await
                {
                    warn!(error = %e, seq, "audit anchor insert failed");
                    self.metrics.record_failure("anchor_insert");
                } else {
                    self.metrics.record_anchor();
                }
            }

            self.apply_retention_locked().await.map_err(|e| match e {
                AuditError::Storage(s) => sqlx::Error::Protocol(s),
                other => sqlx::Error::Protocol(other.to_string()),
            })?;

            Ok(seq)
        }
        .await;

        match result {
            Ok(_) => {
                self.metrics.record_chain_head_advance();
                self.metrics.observe_insert("postgres", "ok", start.elapsed());
            }
            Err(e) => {
                warn!(error = %e, "audit event insert failed");
                self.metrics.record_failure("exec");
                self.metrics.observe_insert("postgres", "error", start.elapsed());
            }
        }
    }
}

#[async_trait]
impl DurableStore for PostgresDurableStore {
    async fn count(&self, ctx: &AuditContext) -> Result<i64, AuditError> {
        run_cancellable(ctx, async {
            sqlx::query_scalar("SELECT COUNT(*) FROM audit_events")
                .fetch_one(&self.pool)
                .await
                .map_err(|e| AuditError::Storage(e.to_string()))
        })
        .await
    }

    async fn list_recent(&self, ctx: &AuditContext, limit: i64) -> Result<Vec<EventRecord>, AuditError> {
        run_cancellable(ctx, async {
            let rows: Vec<EventRow> = sqlx::query_as(
                "SELECT seq, ts, tenant_id, action, actor, object, details, request_id, chain_hash
                 FROM audit_events ORDER BY seq DESC LIMIT $1",
            )
            .bind(limit.max(0))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AuditError::Storage(e.to_string()))?;

            rows.into_iter().map(EventRow::into_record).collect()
        })
        .await
    }

    async fn query_logs_filtered(&self, ctx: &AuditContext, query: &AuditQuery) -> Result<AuditPage, AuditError> {
        run_cancellable(ctx, self.query_logs_filtered_inner(query)).await
    }

    async fn list_anchors(&self, ctx: &AuditContext) -> Result<Vec<Anchor>, AuditError> {
        run_cancellable(ctx, async {
            let rows: Vec<AnchorRow> =
                sqlx::query_as("SELECT seq, ts, chain_hash FROM audit_chain_anchors ORDER BY seq ASC")
                    .fetch_all(&self.pool)
                    .await
                    .map_err(|e| AuditError::Storage(e.to_string()))?;
            rows.into_iter().map(AnchorRow::into_anchor).collect()
        })
        .await
    }

    async fn verify_chain(&self, ctx: &AuditContext) -> Result<(), AuditError> {
        let start = Instant::now();
        run_cancellable(ctx, async {
            let rows: Vec<EventRow> = sqlx::query_as(
                "SELECT seq, ts, tenant_id, action, actor, object, details, request_id, chain_hash
                 FROM audit_events ORDER BY seq ASC",
            )
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AuditError::Storage(e.to_string()))?;
            let records: Vec<EventRecord> = rows.into_iter().map(EventRow::into_record).collect::<Result<_, _>>()?;

            let result = chain::verify_sequence(&records);
            let status = if result.is_ok() { "ok" } else { "mismatch" };
            if let Err(err) = &result {
                warn!(?err, "audit chain verification failed");
            }
            self.metrics.observe_verification(status, start.elapsed());
            result
        })
        .await
    }

    async fn verify_from_anchor(&self, ctx: &AuditContext, anchor_seq: i64) -> Result<(), AuditError> {
        let start = Instant::now();
        run_cancellable(ctx, async {
            let prev_hash: Option<String> = sqlx::query_scalar("SELECT chain_hash FROM audit_events WHERE seq = $1")
                .bind(anchor_seq - 1)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| AuditError::Storage(e.to_string()))?
                .flatten();
            let prev_hash = prev_hash.unwrap_or_default();

            let rows: Vec<EventRow> = sqlx::query_as(
                "SELECT seq, ts, tenant_id, action, actor, object, details, request_id, chain_hash
                 FROM audit_events WHERE seq >= $1 ORDER BY seq ASC",
            )
            .bind(anchor_seq)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AuditError::Storage(e.to_string()))?;
            if rows.is_empty() {
                return Err(AuditError::NotFound);
            }
            let records: Vec<EventRecord> = rows.into_iter().map(EventRow::into_record).collect::<Result<_, _>>()?;

            let result = chain::verify_from(&prev_hash, &records);
            let status = if result.is_ok() { "ok" } else { "mismatch" };
            if let Err(err) = &result {
                warn!(?err, anchor_seq, "audit chain verification from anchor failed");
            }
            self.metrics.observe_verification(status, start.elapsed());
            result
        })
        .await
    }

    async fn export_integrity(&self, ctx: &AuditContext, anchor_limit: i64) -> Result<IntegrityExport, AuditError> {
        let start = Instant::now();
        run_cancellable(ctx, async {
            let anchor_limit = anchor_limit.clamp(1, 500);

            let head_row: Option<EventRow> = sqlx::query_as(
                "SELECT seq, ts, tenant_id, action, actor, object, details, request_id, chain_hash
                 FROM audit_events ORDER BY seq DESC LIMIT 1",
            )
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AuditError::Storage(e.to_string()))?;
            let Some(head_row) = head_row else {
                return Err(AuditError::NotFound);
            };
            let head_record = head_row.into_record()?;

            let earliest_seq: i64 = sqlx::query_scalar("SELECT COALESCE(MIN(seq), 0) FROM audit_events")
                .fetch_one(&self.pool)
                .await
                .map_err(|e| AuditError::Storage(e.to_string()))?;

            let anchor_rows: Vec<AnchorRow> =
                sqlx::query_as("SELECT seq, ts, chain_hash FROM audit_chain_anchors ORDER BY seq DESC LIMIT $1")
                    .bind(anchor_limit)
                    .fetch_all(&self.pool)
                    .await
                    .map_err(|e| AuditError::Storage(e.to_string()))?;
            let mut anchors: Vec<Anchor> = anchor_rows.into_iter().map(AnchorRow::into_anchor).collect::<Result<_, _>>()?;
            anchors.reverse();

            let export = IntegrityExport {
                head: ChainHead {
                    seq: head_record.seq,
                    hash: head_record.chain_hash,
                    ts: head_record.ts,
                },
                anchors,
                latest_seq: head_record.seq,
                earliest_seq,
                generated_at: Utc::now(),
                kid: None,
                signature: None,
            };
            self.metrics.observe_integrity_export(start.elapsed());
            Ok(export)
        })
        .await
    }
}

impl PostgresDurableStore {
    async fn query_logs_filtered_inner(&self, query: &AuditQuery) -> Result<AuditPage, AuditError> {
        let mut sql = String::from(
            "SELECT seq, ts, tenant_id, action, actor, object, details, request_id, chain_hash
             FROM audit_events WHERE tenant_id = $1",
        );
        let mut bind_idx = 2u32;
        let mut conditions = Vec::new();

        if query.filter.actor.is_some() {
            conditions.push(format!("actor = ${bind_idx}"));
            bind_idx += 1;
        }
        if query.filter.action.is_some() {
            conditions.push(format!("action = ${bind_idx}"));
            bind_idx += 1;
        }
        if query.filter.from.is_some() {
            conditions.push(format!("ts >= ${bind_idx}"));
            bind_idx += 1;
        }
        if query.filter.to.is_some() {
            conditions.push(format!("ts <= ${bind_idx}"));
            bind_idx += 1;
        }
        for cond in &conditions {
            sql.push_str(" AND ");
            sql.push_str(cond);
        }
        sql.push_str(" ORDER BY seq DESC");

        let mut q = sqlx::query_as::<_, EventRow>(&sql).bind(&query.tenant_id);
        if let Some(actor) = &query.filter.actor {
            q = q.bind(actor);
        }
        if let Some(action) = &query.filter.action {
            q = q.bind(action);
        }
        if let Some(from) = query.filter.from {
            q = q.bind(format_ts(from));
        }
        if let Some(to) = query.filter.to {
            q = q.bind(format_ts(to));
        }

        let rows: Vec<EventRow> = q.fetch_all(&self.pool).await.map_err(|e| AuditError::Storage(e.to_string()))?;
        let mut records: Vec<EventRecord> = rows
            .into_iter()
            .map(EventRow::into_record)
            .collect::<Result<_, _>>()?;

        // `object_type` matches `details.type`. The column is freeform TEXT
        // (no full-text search, per the design's non-goals), so this filter
        // is applied app-side after decoding rather than with a JSON
        // operator in SQL.
        if let Some(object_type) = &query.filter.object_type {
            records.retain(|r| {
                r.details
                    .get("type")
                    .and_then(Value::as_str)
                    .is_some_and(|t| t == object_type)
            });
        }

        let total = records.len() as i64;
        let offset = query.effective_offset() as usize;
        let limit = query.effective_limit() as usize;
        let page = records.into_iter().skip(offset).take(limit).collect();

        Ok(AuditPage { records: page, total })
    }

}
