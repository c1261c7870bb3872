//! In-memory query executor for testing
//!
//! Records every call in order and can be told to fail a given operation,
//! `commit` and `rollback` included. That is enough to check lock ordering
//! and failure propagation without a database.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;

use super::Queries;
use crate::error::StoreError;
use crate::store::TxQueries;
use crate::models::{
    Account, AddAccountBalanceParams, CreateAccountParams, CreateEntryParams,
    CreateTransferParams, CreateUserParams, Currency, Entry, ListAccountsParams,
    ListEntriesParams, ListTransfersParams, Transfer, UpdateAccountParams, User,
    password_never_changed_at,
};

/// One recorded executor call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateTransfer(CreateTransferParams),
    CreateEntry(CreateEntryParams),
    AddAccountBalance(AddAccountBalanceParams),
    Other(&'static str),
}

#[derive(Default)]
pub struct MockQueries {
    accounts: BTreeMap<i64, Account>,
    entries: BTreeMap<i64, Entry>,
    transfers: BTreeMap<i64, Transfer>,
    users: BTreeMap<String, User>,
    next_id: i64,
    calls: Vec<Call>,
    fail_on: Option<(&'static str, StoreError)>,
}

impl MockQueries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an account with a fixed id
    pub fn with_account(mut self, id: i64, balance: i64) -> Self {
        self.accounts.insert(
            id,
            Account {
                id,
                owner: format!("owner{id}"),
                balance,
                currency: Currency::Usd,
                created_at: Utc::now(),
            },
        );
        self.next_id = self.next_id.max(id);
        self
    }

    /// Make the named operation return `err`
    pub fn fail_on(mut self, op: &'static str, err: StoreError) -> Self {
        self.fail_on = Some((op, err));
        self
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    /// Account ids in the order their balances were updated
    pub fn balance_update_order(&self) -> Vec<i64> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::AddAccountBalance(p) => Some(p.id),
                _ => None,
            })
            .collect()
    }

    pub fn balance(&self, id: i64) -> Option<i64> {
        self.accounts.get(&id).map(|a| a.balance)
    }

    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn check(&self, op: &'static str) -> Result<(), StoreError> {
        match &self.fail_on {
            Some((name, err)) if *name == op => Err(err.clone()),
            _ => Ok(()),
        }
    }

    fn require_account(&self, id: i64) -> Result<(), StoreError> {
        if self.accounts.contains_key(&id) {
            Ok(())
        } else {
            Err(StoreError::Constraint {
                code: "23503".to_string(),
                message: format!("account {id} is not present"),
            })
        }
    }
}

fn page<T: Clone>(items: impl Iterator<Item = T>, limit: i64, offset: i64) -> Vec<T> {
    items
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

#[async_trait]
impl Queries for MockQueries {
    async fn create_account(&mut self, arg: CreateAccountParams) -> Result<Account, StoreError> {
        self.calls.push(Call::Other("create_account"));
        self.check("create_account")?;
        let id = self.next_id();
        let account = Account {
            id,
            owner: arg.owner,
            balance: arg.balance,
            currency: arg.currency,
            created_at: Utc::now(),
        };
        self.accounts.insert(id, account.clone());
        Ok(account)
    }

    async fn get_account(&mut self, id: i64) -> Result<Account, StoreError> {
        self.calls.push(Call::Other("get_account"));
        self.check("get_account")?;
        self.accounts
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound("account"))
    }

    async fn get_account_for_update(&mut self, id: i64) -> Result<Account, StoreError> {
        self.calls.push(Call::Other("get_account_for_update"));
        self.check("get_account_for_update")?;
        self.accounts
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound("account"))
    }

    async fn list_accounts(
        &mut self,
        arg: ListAccountsParams,
    ) -> Result<Vec<Account>, StoreError> {
        self.calls.push(Call::Other("list_accounts"));
        self.check("list_accounts")?;
        let owned = self.accounts.values().filter(|a| a.owner == arg.owner).cloned();
        Ok(page(owned, arg.limit, arg.offset))
    }

    async fn update_account(&mut self, arg: UpdateAccountParams) -> Result<Account, StoreError> {
        self.calls.push(Call::Other("update_account"));
        self.check("update_account")?;
        let account = self
            .accounts
            .get_mut(&arg.id)
            .ok_or(StoreError::NotFound("account"))?;
        account.balance = arg.balance;
        Ok(account.clone())
    }

    async fn add_account_balance(
        &mut self,
        arg: AddAccountBalanceParams,
    ) -> Result<Account, StoreError> {
        self.calls.push(Call::AddAccountBalance(arg));
        self.check("add_account_balance")?;
        let account = self
            .accounts
            .get_mut(&arg.id)
            .ok_or(StoreError::NotFound("account"))?;
        account.balance += arg.amount;
        Ok(account.clone())
    }

    async fn delete_account(&mut self, id: i64) -> Result<(), StoreError> {
        self.calls.push(Call::Other("delete_account"));
        self.check("delete_account")?;
        self.accounts
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound("account"))
    }

    async fn create_entry(&mut self, arg: CreateEntryParams) -> Result<Entry, StoreError> {
        self.calls.push(Call::CreateEntry(arg));
        self.check("create_entry")?;
        self.require_account(arg.account_id)?;
        let id = self.next_id();
        let entry = Entry {
            id,
            account_id: arg.account_id,
            amount: arg.amount,
            created_at: Utc::now(),
        };
        self.entries.insert(id, entry.clone());
        Ok(entry)
    }

    async fn get_entry(&mut self, id: i64) -> Result<Entry, StoreError> {
        self.calls.push(Call::Other("get_entry"));
        self.check("get_entry")?;
        self.entries
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound("entry"))
    }

    async fn list_entries(&mut self, arg: ListEntriesParams) -> Result<Vec<Entry>, StoreError> {
        self.calls.push(Call::Other("list_entries"));
        self.check("list_entries")?;
        let matching = self
            .entries
            .values()
            .filter(|e| e.account_id == arg.account_id)
            .cloned();
        Ok(page(matching, arg.limit, arg.offset))
    }

    async fn delete_entry(&mut self, id: i64) -> Result<(), StoreError> {
        self.calls.push(Call::Other("delete_entry"));
        self.check("delete_entry")?;
        self.entries
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound("entry"))
    }

    async fn create_transfer(
        &mut self,
        arg: CreateTransferParams,
    ) -> Result<Transfer, StoreError> {
        self.calls.push(Call::CreateTransfer(arg));
        self.check("create_transfer")?;
        self.require_account(arg.from_account_id)?;
        self.require_account(arg.to_account_id)?;
        let id = self.next_id();
        let transfer = Transfer {
            id,
            from_account_id: arg.from_account_id,
            to_account_id: arg.to_account_id,
            amount: arg.amount,
            created_at: Utc::now(),
        };
        self.transfers.insert(id, transfer.clone());
        Ok(transfer)
    }

    async fn get_transfer(&mut self, id: i64) -> Result<Transfer, StoreError> {
        self.calls.push(Call::Other("get_transfer"));
        self.check("get_transfer")?;
        self.transfers
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound("transfer"))
    }

    async fn list_transfers(
        &mut self,
        arg: ListTransfersParams,
    ) -> Result<Vec<Transfer>, StoreError> {
        self.calls.push(Call::Other("list_transfers"));
        self.check("list_transfers")?;
        let matching = self
            .transfers
            .values()
            .filter(|t| {
                t.from_account_id == arg.from_account_id || t.to_account_id == arg.to_account_id
            })
            .cloned();
        Ok(page(matching, arg.limit, arg.offset))
    }

    async fn delete_transfer(&mut self, id: i64) -> Result<(), StoreError> {
        self.calls.push(Call::Other("delete_transfer"));
        self.check("delete_transfer")?;
        self.transfers
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound("transfer"))
    }

    async fn create_user(&mut self, arg: CreateUserParams) -> Result<User, StoreError> {
        self.calls.push(Call::Other("create_user"));
        self.check("create_user")?;
        if self.users.contains_key(&arg.username) {
            return Err(StoreError::Constraint {
                code: "23505".to_string(),
                message: format!("username {} taken", arg.username),
            });
        }
        let user = User {
            username: arg.username.clone(),
            hashed_password: arg.hashed_password,
            full_name: arg.full_name,
            email: arg.email,
            password_changed_at: password_never_changed_at(),
            created_at: Utc::now(),
        };
        self.users.insert(arg.username, user.clone());
        Ok(user)
    }

    async fn get_user(&mut self, username: &str) -> Result<User, StoreError> {
        self.calls.push(Call::Other("get_user"));
        self.check("get_user")?;
        self.users
            .get(username)
            .cloned()
            .ok_or(StoreError::NotFound("user"))
    }
}

#[async_trait]
impl TxQueries for MockQueries {
    async fn commit(self) -> Result<(), StoreError> {
        self.check("commit")
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.check("rollback")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_pagination_and_increment() {
        let mut q = MockQueries::new().with_account(1, 100);
        for amount in 1..=15 {
            q.create_entry(CreateEntryParams {
                account_id: 1,
                amount,
            })
            .await
            .unwrap();
        }
        let entries = q
            .list_entries(ListEntriesParams {
                account_id: 1,
                limit: 10,
                offset: 5,
            })
            .await
            .unwrap();
        assert_eq!(entries.len(), 10);
        assert_eq!(entries[4].amount, 10);

        let account = q
            .add_account_balance(AddAccountBalanceParams { id: 1, amount: -30 })
            .await
            .unwrap();
        assert_eq!(account.balance, 70);
    }

    #[tokio::test]
    async fn test_mock_fail_on() {
        let mut q = MockQueries::new()
            .with_account(1, 0)
            .fail_on("get_account", StoreError::Transient("boom".into()));
        assert!(q.get_account(1).await.unwrap_err().is_retryable());
        assert_eq!(q.calls(), &[Call::Other("get_account")]);
    }
}
