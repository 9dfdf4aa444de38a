use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;

pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    // Create job executions table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS job_executions (
            id TEXT PRIMARY KEY,
            script TEXT NOT NULL,
            env JSONB NOT NULL DEFAULT '{}',
            required_capabilities JSONB NOT NULL DEFAULT '{}',
            timeout_seconds BIGINT NOT NULL DEFAULT 0,
            artifact_globs JSONB NOT NULL DEFAULT '[]',
            caches JSONB NOT NULL DEFAULT '[]',
            source JSONB,
            metadata JSONB NOT NULL DEFAULT '{}',
            step_plan JSONB NOT NULL DEFAULT '[]',
            current_step TEXT NOT NULL DEFAULT '',
            status VARCHAR(20) NOT NULL,
            created_utc TIMESTAMPTZ NOT NULL,
            started_utc TIMESTAMPTZ,
            finished_utc TIMESTAMPTZ,
            leased_utc TIMESTAMPTZ,
            leased_by_agent_id TEXT NOT NULL DEFAULT '',
            exit_code INTEGER,
            error TEXT NOT NULL DEFAULT '',
            output TEXT NOT NULL DEFAULT '',
            test_summary JSONB,
            sensitive_values JSONB NOT NULL DEFAULT '[]'
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create artifacts table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS job_execution_artifacts (
            job_execution_id TEXT NOT NULL REFERENCES job_executions(id) ON DELETE CASCADE,
            path TEXT NOT NULL,
            url TEXT NOT NULL,
            size_bytes BIGINT NOT NULL,
            PRIMARY KEY (job_execution_id, path)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create test reports table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS job_execution_test_reports (
            job_execution_id TEXT PRIMARY KEY REFERENCES job_executions(id) ON DELETE CASCADE,
            report JSONB NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create events table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS job_execution_events (
            id BIGSERIAL PRIMARY KEY,
            job_execution_id TEXT NOT NULL REFERENCES job_executions(id) ON DELETE CASCADE,
            event JSONB NOT NULL,
            created_utc TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for better query performance
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_job_executions_status ON job_executions(status)")
        .execute(pool)
        .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_job_executions_created ON job_executions(created_utc DESC)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_job_execution_events_job ON job_execution_events(job_execution_id, id)",
    )
    .execute(pool)
    .await?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}
