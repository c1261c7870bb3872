//! PostgreSQL query executor
//!
//! [`PgQueries`] wraps anything that dereferences to a `PgConnection`:
//! a pooled connection for ambient reads, or a `sqlx::Transaction` when
//! the statements must commit or roll back together.

use std::ops::DerefMut;

use async_trait::async_trait;
use sqlx::PgConnection;

use super::Queries;
use crate::error::StoreError;
use crate::models::{
    Account, AddAccountBalanceParams, CreateAccountParams, CreateEntryParams,
    CreateTransferParams, CreateUserParams, Entry, ListAccountsParams, ListEntriesParams,
    ListTransfersParams, Transfer, UpdateAccountParams, User,
};

const ACCOUNT_COLUMNS: &str = "id, owner, balance, currency, created_at";
const ENTRY_COLUMNS: &str = "id, account_id, amount, created_at";
const TRANSFER_COLUMNS: &str = "id, from_account_id, to_account_id, amount, created_at";
const USER_COLUMNS: &str =
    "username, hashed_password, full_name, email, password_changed_at, created_at";

/// Query executor bound to one connection or transaction
pub struct PgQueries<C> {
    conn: C,
}

impl<C> PgQueries<C>
where
    C: DerefMut<Target = PgConnection> + Send,
{
    pub fn new(conn: C) -> Self {
        Self { conn }
    }

    /// Hand the connection back (e.g. to commit a transaction)
    pub fn into_inner(self) -> C {
        self.conn
    }
}

fn not_found_if_none(rows_affected: u64, entity: &'static str) -> Result<(), StoreError> {
    if rows_affected == 0 {
        Err(StoreError::NotFound(entity))
    } else {
        Ok(())
    }
}

#[async_trait]
impl<C> Queries for PgQueries<C>
where
    C: DerefMut<Target = PgConnection> + Send,
{
    async fn create_account(&mut self, arg: CreateAccountParams) -> Result<Account, StoreError> {
        let sql = format!(
            "INSERT INTO accounts (owner, balance, currency) VALUES ($1, $2, $3) RETURNING {ACCOUNT_COLUMNS}"
        );
        let account = sqlx::query_as::<_, Account>(&sql)
            .bind(&arg.owner)
            .bind(arg.balance)
            .bind(arg.currency.as_str())
            .fetch_one(&mut *self.conn)
            .await?;
        Ok(account)
    }

    async fn get_account(&mut self, id: i64) -> Result<Account, StoreError> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1 LIMIT 1");
        sqlx::query_as::<_, Account>(&sql)
            .bind(id)
            .fetch_one(&mut *self.conn)
            .await
            .map_err(|e| StoreError::from(e).for_entity("account"))
    }

    async fn get_account_for_update(&mut self, id: i64) -> Result<Account, StoreError> {
        // NO KEY UPDATE: does not block inserts of entries/transfers referencing the row
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1 LIMIT 1 FOR NO KEY UPDATE"
        );
        sqlx::query_as::<_, Account>(&sql)
            .bind(id)
            .fetch_one(&mut *self.conn)
            .await
            .map_err(|e| StoreError::from(e).for_entity("account"))
    }

    async fn list_accounts(
        &mut self,
        arg: ListAccountsParams,
    ) -> Result<Vec<Account>, StoreError> {
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE owner = $1 ORDER BY id LIMIT $2 OFFSET $3"
        );
        let accounts = sqlx::query_as::<_, Account>(&sql)
            .bind(&arg.owner)
            .bind(arg.limit)
            .bind(arg.offset)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(accounts)
    }

    async fn update_account(&mut self, arg: UpdateAccountParams) -> Result<Account, StoreError> {
        let sql =
            format!("UPDATE accounts SET balance = $2 WHERE id = $1 RETURNING {ACCOUNT_COLUMNS}");
        sqlx::query_as::<_, Account>(&sql)
            .bind(arg.id)
            .bind(arg.balance)
            .fetch_one(&mut *self.conn)
            .await
            .map_err(|e| StoreError::from(e).for_entity("account"))
    }

    async fn add_account_balance(
        &mut self,
        arg: AddAccountBalanceParams,
    ) -> Result<Account, StoreError> {
        let sql = format!(
            "UPDATE accounts SET balance = balance + $1 WHERE id = $2 RETURNING {ACCOUNT_COLUMNS}"
        );
        sqlx::query_as::<_, Account>(&sql)
            .bind(arg.amount)
            .bind(arg.id)
            .fetch_one(&mut *self.conn)
            .await
            .map_err(|e| StoreError::from(e).for_entity("account"))
    }

    async fn delete_account(&mut self, id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(id)
            .execute(&mut *self.conn)
            .await?;
        not_found_if_none(result.rows_affected(), "account")
    }

    async fn create_entry(&mut self, arg: CreateEntryParams) -> Result<Entry, StoreError> {
        let sql = format!(
            "INSERT INTO entries (account_id, amount) VALUES ($1, $2) RETURNING {ENTRY_COLUMNS}"
        );
        let entry = sqlx::query_as::<_, Entry>(&sql)
            .bind(arg.account_id)
            .bind(arg.amount)
            .fetch_one(&mut *self.conn)
            .await?;
        Ok(entry)
    }

    async fn get_entry(&mut self, id: i64) -> Result<Entry, StoreError> {
        let sql = format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE id = $1 LIMIT 1");
        sqlx::query_as::<_, Entry>(&sql)
            .bind(id)
            .fetch_one(&mut *self.conn)
            .await
            .map_err(|e| StoreError::from(e).for_entity("entry"))
    }

    async fn list_entries(&mut self, arg: ListEntriesParams) -> Result<Vec<Entry>, StoreError> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM entries WHERE account_id = $1 ORDER BY id LIMIT $2 OFFSET $3"
        );
        let entries = sqlx::query_as::<_, Entry>(&sql)
            .bind(arg.account_id)
            .bind(arg.limit)
            .bind(arg.offset)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(entries)
    }

    async fn delete_entry(&mut self, id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM entries WHERE id = $1")
            .bind(id)
            .execute(&mut *self.conn)
            .await?;
        not_found_if_none(result.rows_affected(), "entry")
    }

    async fn create_transfer(
        &mut self,
        arg: CreateTransferParams,
    ) -> Result<Transfer, StoreError> {
        let sql = format!(
            "INSERT INTO transfers (from_account_id, to_account_id, amount) VALUES ($1, $2, $3) RETURNING {TRANSFER_COLUMNS}"
        );
        let transfer = sqlx::query_as::<_, Transfer>(&sql)
            .bind(arg.from_account_id)
            .bind(arg.to_account_id)
            .bind(arg.amount)
            .fetch_one(&mut *self.conn)
            .await?;
        Ok(transfer)
    }

    async fn get_transfer(&mut self, id: i64) -> Result<Transfer, StoreError> {
        let sql = format!("SELECT {TRANSFER_COLUMNS} FROM transfers WHERE id = $1 LIMIT 1");
        sqlx::query_as::<_, Transfer>(&sql)
            .bind(id)
            .fetch_one(&mut *self.conn)
            .await
            .map_err(|e| StoreError::from(e).for_entity("transfer"))
    }

    async fn list_transfers(
        &mut self,
        arg: ListTransfersParams,
    ) -> Result<Vec<Transfer>, StoreError> {
        let sql = format!(
            r#"SELECT {TRANSFER_COLUMNS} FROM transfers
               WHERE from_account_id = $1 OR to_account_id = $2
               ORDER BY id LIMIT $3 OFFSET $4"#
        );
        let transfers = sqlx::query_as::<_, Transfer>(&sql)
            .bind(arg.from_account_id)
            .bind(arg.to_account_id)
            .bind(arg.limit)
            .bind(arg.offset)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(transfers)
    }

    async fn delete_transfer(&mut self, id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM transfers WHERE id = $1")
            .bind(id)
            .execute(&mut *self.conn)
            .await?;
        not_found_if_none(result.rows_affected(), "transfer")
    }

    async fn create_user(&mut self, arg: CreateUserParams) -> Result<User, StoreError> {
        let sql = format!(
            "INSERT INTO users (username, hashed_password, full_name, email) VALUES ($1, $2, $3, $4) RETURNING {USER_COLUMNS}"
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(&arg.username)
            .bind(&arg.hashed_password)
            .bind(&arg.full_name)
            .bind(&arg.email)
            .fetch_one(&mut *self.conn)
            .await?;
        Ok(user)
    }

    async fn get_user(&mut self, username: &str) -> Result<User, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1 LIMIT 1");
        sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_one(&mut *self.conn)
            .await
            .map_err(|e| StoreError::from(e).for_entity("user"))
    }
}
