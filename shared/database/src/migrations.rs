use anyhow::Result;
use sqlx::PgPool;

pub async fn run_postgres_migrations(pool: &PgPool) -> Result<()> {
    tracing::info!("Running PostgreSQL migrations");

    // Create users table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            email VARCHAR NOT NULL UNIQUE,
            password_hash VARCHAR NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            deleted_at TIMESTAMPTZ
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create pending_emails table; deleting a user cascades to their
    // scheduled emails
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pending_emails (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            template_key VARCHAR NOT NULL,
            subject VARCHAR NOT NULL,
            body JSONB NOT NULL,
            recipients TEXT[] NOT NULL,
            bcc TEXT[],
            send_at TIMESTAMPTZ NOT NULL,
            user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for better performance
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_users_email ON users(email)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_pending_emails_send_at ON pending_emails(send_at)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_pending_emails_user_id ON pending_emails(user_id)")
        .execute(pool)
        .await?;

    tracing::info!("PostgreSQL migrations completed successfully");
    Ok(())
}
