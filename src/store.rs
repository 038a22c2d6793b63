//! Payment ledger storage: a durable mapping from payment reference to
//! recorded payment, plus a secondary index of every recorded reference.
//!
//! The verifier never mutates state directly; all mutation goes through the
//! [`PaymentStore`] contract. Acceptance must go through
//! [`PaymentStore::insert_if_absent`] so that the replay check and the write
//! are one atomic operation per reference.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::types::{PaymentReference, RecordedPayment};

/// Namespace prefix for per-payment record keys.
pub const PAYMENT_KEY_PREFIX: &str = "payments/payment/";

/// The storage key one recorded payment lives under.
pub fn payment_key(reference: &PaymentReference) -> String {
    format!("{PAYMENT_KEY_PREFIX}{reference}")
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing store failed to read or write; surfaced, never swallowed.
    #[error("storage error: {0}")]
    Backend(String),
}

/// Contract over the durable payment set and its reference index.
///
/// The store is passive: it provides atomicity per operation (notably
/// [`insert_if_absent`](PaymentStore::insert_if_absent)) but no cross-call
/// coordination.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn get(
        &self,
        reference: &PaymentReference,
    ) -> Result<Option<RecordedPayment>, StoreError>;

    /// Writes the record under its reference key and appends the reference
    /// to the index. Appending an already-present reference must not create
    /// a duplicate index entry.
    async fn put(&self, payment: RecordedPayment) -> Result<(), StoreError>;

    /// Atomically records the payment unless its reference is already
    /// present. Returns `false` when the reference was already recorded,
    /// leaving the existing record untouched.
    async fn insert_if_absent(&self, payment: RecordedPayment) -> Result<bool, StoreError>;

    /// Removes the record and its index entry, freeing the reference for
    /// reuse. Deleting an absent reference is a no-op.
    async fn delete(&self, reference: &PaymentReference) -> Result<(), StoreError>;

    async fn exists(&self, reference: &PaymentReference) -> Result<bool, StoreError> {
        Ok(self.get(reference).await?.is_some())
    }

    /// All recorded references, for enumeration and debugging.
    async fn references(&self) -> Result<Vec<PaymentReference>, StoreError>;
}

/// In-process store backed by [`DashMap`].
///
/// `insert_if_absent` uses the map's entry API, so concurrent verifications
/// of the same reference cannot both record it.
#[derive(Debug, Default)]
pub struct MemoryPaymentStore {
    records: DashMap<String, RecordedPayment>,
    index: DashMap<String, ()>,
}

impl MemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentStore for MemoryPaymentStore {
    async fn get(
        &self,
        reference: &PaymentReference,
    ) -> Result<Option<RecordedPayment>, StoreError> {
        Ok(self
            .records
            .get(&payment_key(reference))
            .map(|entry| entry.value().clone()))
    }

    async fn put(&self, payment: RecordedPayment) -> Result<(), StoreError> {
        let reference = payment.reference.clone();
        self.records.insert(payment_key(&reference), payment);
        self.index.insert(reference.to_string(), ());
        Ok(())
    }

    async fn insert_if_absent(&self, payment: RecordedPayment) -> Result<bool, StoreError> {
        let reference = payment.reference.clone();
        match self.records.entry(payment_key(&reference)) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(payment);
                self.index.insert(reference.to_string(), ());
                Ok(true)
            }
        }
    }

    async fn delete(&self, reference: &PaymentReference) -> Result<(), StoreError> {
        self.records.remove(&payment_key(reference));
        self.index.remove(reference.as_str());
        Ok(())
    }

    async fn references(&self) -> Result<Vec<PaymentReference>, StoreError> {
        Ok(self
            .index
            .iter()
            .map(|entry| PaymentReference::from(entry.key().clone()))
            .collect())
    }
}
