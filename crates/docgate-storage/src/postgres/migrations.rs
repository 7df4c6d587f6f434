use sqlx::PgPool;

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS accounts (
            user_id         TEXT PRIMARY KEY,
            api_key_hash    TEXT NOT NULL,
            policy          TEXT NOT NULL,
            permissions     JSONB NOT NULL,
            user_management BOOLEAN NOT NULL DEFAULT FALSE,
            metadata        JSONB NOT NULL DEFAULT '{}'::jsonb,
            created_at      TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at      TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS audit_log (
            id          BIGSERIAL PRIMARY KEY,
            recorded_at TIMESTAMPTZ NOT NULL,
            outcome     TEXT NOT NULL,
            action      TEXT NOT NULL,
            user_id     TEXT NOT NULL,
            record      JSONB NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_audit_log_user ON audit_log (user_id, recorded_at)")
        .execute(pool)
        .await?;

    Ok(())
}
