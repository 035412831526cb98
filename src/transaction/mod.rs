//! Unsigned transactions, signed blobs and atomic groups
//!
//! Transactions are produced by an external builder. This module only needs
//! their canonical encoding and the ability to stamp a group identifier on
//! them before they are handed to a wallet for signing.

mod group;

pub use group::{compute_group_id, transaction_id};

use crate::{Error, Result};
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
use serde::{Deserialize, Serialize};

/// Largest group the node accepts
pub const MAX_GROUP_SIZE: usize = 16;

/// A transaction built elsewhere, ready to be signed
pub trait UnsignedTransaction: Send + Sync {
    /// Canonical binary encoding (what the wallet signs)
    fn encode(&self) -> Vec<u8>;

    /// Stamp the group identifier on this transaction
    fn set_group(&mut self, group: GroupId);
}

/// Identifier binding the members of an atomic group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupId([u8; 32]);

impl GroupId {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", BASE64_STANDARD.encode(self.0))
    }
}

/// Raw signed-transaction bytes returned by a wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedBlob(Vec<u8>);

impl SignedBlob {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Decode a base64 blob as returned by byte-oriented wallet protocols
    pub fn from_base64(encoded: &str) -> Result<Self> {
        BASE64_STANDARD
            .decode(encoded.trim())
            .map(Self)
            .map_err(|e| Error::InvalidArgument(format!("Invalid base64 blob: {}", e)))
    }

    pub fn to_base64(&self) -> String {
        BASE64_STANDARD.encode(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Ordered transactions that are signed and submitted together
///
/// With two or more members every transaction carries the same group
/// identifier and the node commits all of them or none. A single transaction
/// is left ungrouped.
#[derive(Debug)]
pub struct TransactionGroup<T> {
    transactions: Vec<T>,
    group_id: Option<GroupId>,
}

impl<T: UnsignedTransaction> TransactionGroup<T> {
    /// Wrap one transaction without assigning a group identifier
    pub fn single(transaction: T) -> Self {
        Self {
            transactions: vec![transaction],
            group_id: None,
        }
    }

    /// Group transactions atomically
    ///
    /// Computes the identifier over the current canonical encodings, in
    /// order, and assigns it to every member. Must run before signing since
    /// the signatures commit to the group field.
    pub fn build(mut transactions: Vec<T>) -> Result<Self> {
        match transactions.len() {
            0 => {
                return Err(Error::InvalidGroup(
                    "a group needs at least one transaction".to_string(),
                ))
            }
            1 => return Ok(Self::single(transactions.remove(0))),
            n if n > MAX_GROUP_SIZE => {
                return Err(Error::InvalidGroup(format!(
                    "{} transactions exceed the group limit of {}",
                    n, MAX_GROUP_SIZE
                )))
            }
            _ => {}
        }

        let encodings: Vec<Vec<u8>> = transactions.iter().map(|t| t.encode()).collect();
        let group_id = GroupId(compute_group_id(&encodings));
        for transaction in transactions.iter_mut() {
            transaction.set_group(group_id);
        }

        tracing::debug!(
            group_id = %group_id,
            size = transactions.len(),
            "Assigned group identifier"
        );

        Ok(Self {
            transactions,
            group_id: Some(group_id),
        })
    }

    /// Group identifier, `None` for a single ungrouped transaction
    pub fn group_id(&self) -> Option<GroupId> {
        self.group_id
    }

    pub fn is_grouped(&self) -> bool {
        self.group_id.is_some()
    }

    pub fn transactions(&self) -> &[T] {
        &self.transactions
    }

    /// Members as trait objects, in group order, for handing to a wallet
    pub fn as_dyn(&self) -> Vec<&dyn UnsignedTransaction> {
        self.transactions
            .iter()
            .map(|t| t as &dyn UnsignedTransaction)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}
