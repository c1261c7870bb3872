//! Query Executor
//!
//! Single-statement CRUD over accounts, entries, transfers and users.
//! Nothing here opens a transaction: the executor runs on whatever
//! connection it was built on, so the caller decides the scope.

pub mod postgres;

#[cfg(test)]
pub mod mock;

pub use postgres::PgQueries;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{
    Account, AddAccountBalanceParams, CreateAccountParams, CreateEntryParams,
    CreateTransferParams, CreateUserParams, Entry, ListAccountsParams, ListEntriesParams,
    ListTransfersParams, Transfer, UpdateAccountParams, User,
};

/// Query executor trait
///
/// `get_*`, `update_*`, `add_account_balance` and `delete_*` return
/// [`StoreError::NotFound`] when no row matches.
#[async_trait]
pub trait Queries: Send {
    // === Accounts ===
    async fn create_account(&mut self, arg: CreateAccountParams) -> Result<Account, StoreError>;

    async fn get_account(&mut self, id: i64) -> Result<Account, StoreError>;

    /// Read an account and hold its row lock until the transaction ends
    async fn get_account_for_update(&mut self, id: i64) -> Result<Account, StoreError>;

    async fn list_accounts(&mut self, arg: ListAccountsParams)
    -> Result<Vec<Account>, StoreError>;

    async fn update_account(&mut self, arg: UpdateAccountParams) -> Result<Account, StoreError>;

    /// Balance Update Primitive: `balance = balance + amount`, evaluated by the database
    async fn add_account_balance(
        &mut self,
        arg: AddAccountBalanceParams,
    ) -> Result<Account, StoreError>;

    async fn delete_account(&mut self, id: i64) -> Result<(), StoreError>;

    // === Entries ===
    async fn create_entry(&mut self, arg: CreateEntryParams) -> Result<Entry, StoreError>;

    async fn get_entry(&mut self, id: i64) -> Result<Entry, StoreError>;

    async fn list_entries(&mut self, arg: ListEntriesParams) -> Result<Vec<Entry>, StoreError>;

    async fn delete_entry(&mut self, id: i64) -> Result<(), StoreError>;

    // === Transfers ===
    async fn create_transfer(&mut self, arg: CreateTransferParams)
    -> Result<Transfer, StoreError>;

    async fn get_transfer(&mut self, id: i64) -> Result<Transfer, StoreError>;

    async fn list_transfers(
        &mut self,
        arg: ListTransfersParams,
    ) -> Result<Vec<Transfer>, StoreError>;

    async fn delete_transfer(&mut self, id: i64) -> Result<(), StoreError>;

    // === Users ===
    async fn create_user(&mut self, arg: CreateUserParams) -> Result<User, StoreError>;

    async fn get_user(&mut self, username: &str) -> Result<User, StoreError>;
}
