//! Ledger schema bootstrap
//!
//! `accounts.balance` has no CHECK constraint: the overdraft policy lives in
//! the transfer workflow. Entries and transfers reference accounts, so an
//! account deleted mid-flight surfaces as a foreign-key violation.

use sqlx::PgPool;

/// Serialises concurrent bootstraps (arbitrary, stable key)
const SCHEMA_LOCK_KEY: i64 = 0x5B_A4_4B;

const CREATE_USERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    username            VARCHAR PRIMARY KEY,
    hashed_password     VARCHAR NOT NULL,
    full_name           VARCHAR NOT NULL,
    email               VARCHAR UNIQUE NOT NULL,
    password_changed_at TIMESTAMPTZ NOT NULL DEFAULT '0001-01-01 00:00:00Z',
    created_at          TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

const CREATE_ACCOUNTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    id         BIGSERIAL PRIMARY KEY,
    owner      VARCHAR NOT NULL,
    balance    BIGINT NOT NULL,
    currency   VARCHAR NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

const CREATE_ENTRIES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS entries (
    id         BIGSERIAL PRIMARY KEY,
    account_id BIGINT NOT NULL REFERENCES accounts (id),
    amount     BIGINT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

const CREATE_TRANSFERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS transfers (
    id              BIGSERIAL PRIMARY KEY,
    from_account_id BIGINT NOT NULL REFERENCES accounts (id),
    to_account_id   BIGINT NOT NULL REFERENCES accounts (id),
    amount          BIGINT NOT NULL CHECK (amount > 0),
    created_at      TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

const CREATE_INDEXES: [&str; 5] = [
    "CREATE INDEX IF NOT EXISTS accounts_owner_idx ON accounts (owner)",
    "CREATE INDEX IF NOT EXISTS entries_account_id_idx ON entries (account_id)",
    "CREATE INDEX IF NOT EXISTS transfers_from_account_id_idx ON transfers (from_account_id)",
    "CREATE INDEX IF NOT EXISTS transfers_to_account_id_idx ON transfers (to_account_id)",
    "CREATE INDEX IF NOT EXISTS transfers_from_to_idx ON transfers (from_account_id, to_account_id)",
];

/// Initialize the ledger schema
pub async fn init_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    tracing::info!("Initializing ledger schema...");

    let mut tx = pool.begin().await?;
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(SCHEMA_LOCK_KEY)
        .execute(&mut *tx)
        .await?;

    for ddl in [
        CREATE_USERS_TABLE,
        CREATE_ACCOUNTS_TABLE,
        CREATE_ENTRIES_TABLE,
        CREATE_TRANSFERS_TABLE,
    ] {
        sqlx::query(ddl).execute(&mut *tx).await?;
    }
    for ddl in CREATE_INDEXES {
        sqlx::query(ddl).execute(&mut *tx).await?;
    }

    tx.commit().await?;
    tracing::info!("Ledger schema initialized successfully");
    Ok(())
}
