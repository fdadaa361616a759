//! Expense storage abstraction and the in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;

use spendwise_core::{DomainError, ExpenseId, ExpenseRecord, ExpenseUpdate, OwnerId};

/// Expense table access, scoped by owner.
///
/// Used by the presentation layer to obtain the input for an analysis run;
/// the analysis controller never calls it.
#[async_trait]
pub trait ExpenseStore: Send + Sync {
    /// All expenses of `owner_id`, newest date first.
    async fn fetch_all(&self, owner_id: &OwnerId) -> Result<Vec<ExpenseRecord>, ExpenseStoreError>;

    /// One expense, if it exists and belongs to `owner_id`.
    async fn get(
        &self,
        owner_id: &OwnerId,
        id: &ExpenseId,
    ) -> Result<Option<ExpenseRecord>, ExpenseStoreError>;

    /// Insert a new record and return it as stored.
    async fn insert(&self, record: ExpenseRecord) -> Result<ExpenseRecord, ExpenseStoreError>;

    /// Apply an explicit update and return the updated record.
    async fn update(
        &self,
        owner_id: &OwnerId,
        id: &ExpenseId,
        update: ExpenseUpdate,
    ) -> Result<ExpenseRecord, ExpenseStoreError>;

    /// Delete a record.
    async fn delete(&self, owner_id: &OwnerId, id: &ExpenseId) -> Result<(), ExpenseStoreError>;
}

/// Expense store error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExpenseStoreError {
    #[error("expense not found: {0}")]
    NotFound(ExpenseId),
    #[error("expense already exists: {0}")]
    AlreadyExists(ExpenseId),
    #[error("owner isolation violation")]
    OwnerIsolation,
    #[error(transparent)]
    Invalid(#[from] DomainError),
    #[error("backend returned {status}: {body}")]
    Remote { status: u16, body: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Newest date first, ties by id so listings are stable.
pub(crate) fn sort_for_listing(records: &mut [ExpenseRecord]) {
    records.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.id.cmp(&b.id)));
}

/// In-memory expense store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryExpenseStore {
    expenses: RwLock<HashMap<ExpenseId, ExpenseRecord>>,
}

impl InMemoryExpenseStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Store pre-seeded with `records` (validated like regular inserts).
    pub fn with_records(
        records: impl IntoIterator<Item = ExpenseRecord>,
    ) -> Result<Self, ExpenseStoreError> {
        let store = Self::new();
        {
            let mut expenses = store.expenses.write().unwrap_or_else(PoisonError::into_inner);
            for record in records {
                record.validate()?;
                if expenses.contains_key(&record.id) {
                    return Err(ExpenseStoreError::AlreadyExists(record.id));
                }
                expenses.insert(record.id.clone(), record);
            }
        }
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.expenses
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ExpenseStore for InMemoryExpenseStore {
    async fn fetch_all(&self, owner_id: &OwnerId) -> Result<Vec<ExpenseRecord>, ExpenseStoreError> {
        let expenses = self.expenses.read().unwrap_or_else(PoisonError::into_inner);
        let mut result: Vec<_> = expenses
            .values()
            .filter(|e| &e.owner_id == owner_id)
            .cloned()
            .collect();

        sort_for_listing(&mut result);
        Ok(result)
    }

    async fn get(
        &self,
        owner_id: &OwnerId,
        id: &ExpenseId,
    ) -> Result<Option<ExpenseRecord>, ExpenseStoreError> {
        let expenses = self.expenses.read().unwrap_or_else(PoisonError::into_inner);
        match expenses.get(id) {
            Some(e) if &e.owner_id == owner_id => Ok(Some(e.clone())),
            Some(_) => Err(ExpenseStoreError::OwnerIsolation),
            None => Ok(None),
        }
    }

    async fn insert(&self, record: ExpenseRecord) -> Result<ExpenseRecord, ExpenseStoreError> {
        record.validate()?;
        let mut expenses = self.expenses.write().unwrap_or_else(PoisonError::into_inner);
        if expenses.contains_key(&record.id) {
            return Err(ExpenseStoreError::AlreadyExists(record.id));
        }
        expenses.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        owner_id: &OwnerId,
        id: &ExpenseId,
        update: ExpenseUpdate,
    ) -> Result<ExpenseRecord, ExpenseStoreError> {
        let mut expenses = self.expenses.write().unwrap_or_else(PoisonError::into_inner);
        let record = expenses
            .get_mut(id)
            .ok_or_else(|| ExpenseStoreError::NotFound(id.clone()))?;
        if &record.owner_id != owner_id {
            return Err(ExpenseStoreError::OwnerIsolation);
        }
        record.apply(update)?;
        Ok(record.clone())
    }

    async fn delete(&self, owner_id: &OwnerId, id: &ExpenseId) -> Result<(), ExpenseStoreError> {
        let mut expenses = self.expenses.write().unwrap_or_else(PoisonError::into_inner);
        let record = expenses
            .get(id)
            .ok_or_else(|| ExpenseStoreError::NotFound(id.clone()))?;
        if &record.owner_id != owner_id {
            return Err(ExpenseStoreError::OwnerIsolation);
        }
        expenses.remove(id);
        Ok(())
    }
}
