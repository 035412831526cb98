//! Signed transaction submission
//!
//! A grouped submission is always a single request whose body is the
//! concatenation of every member's signed blob, in group order. Members of a
//! group are never sent separately. Ungrouped transactions go out one request
//! each.
//!
//! No retries: an upstream rejection is returned verbatim.

mod node;
mod relay;

pub use node::{NodeClient, UpstreamResponse};
pub use relay::RelayClient;

use crate::transaction::{SignedBlob, TransactionGroup, UnsignedTransaction};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Outcome of an accepted submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    /// Upstream HTTP status
    pub status: u16,
    /// Upstream response body, verbatim
    pub body: String,
    /// Transaction id reported by the node, when the body carries one
    pub tx_id: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

impl SubmitReceipt {
    pub fn new(status: u16, body: String) -> Self {
        let tx_id = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("txId").and_then(|id| id.as_str()).map(String::from));
        Self {
            status,
            body,
            tx_id,
            submitted_at: Utc::now(),
        }
    }
}

/// Destination for raw signed-transaction payloads
#[async_trait]
pub trait TransactionSink: Send + Sync {
    /// Send one payload (one blob, or a concatenated group) in one request
    async fn send_raw(&self, payload: Vec<u8>) -> Result<SubmitReceipt>;
}

/// Builds atomic groups and submits their signed form
#[derive(Clone)]
pub struct GroupSubmitter {
    sink: Arc<dyn TransactionSink>,
}

impl GroupSubmitter {
    pub fn new(sink: Arc<dyn TransactionSink>) -> Self {
        Self { sink }
    }

    /// Assign a shared group id to `transactions`
    ///
    /// A single transaction is left ungrouped.
    pub fn build_group<T: UnsignedTransaction>(
        &self,
        transactions: Vec<T>,
    ) -> Result<TransactionGroup<T>> {
        TransactionGroup::build(transactions)
    }

    /// Submit the signed form of `group`
    ///
    /// `signed` must have one entry per group member. A hole (`None`) inside a
    /// grouped submission fails it with `IncompleteGroup` before anything is
    /// sent; holes in an ungrouped submission are skipped.
    pub async fn submit<T: UnsignedTransaction>(
        &self,
        group: &TransactionGroup<T>,
        signed: Vec<Option<SignedBlob>>,
    ) -> Result<Vec<SubmitReceipt>> {
        if signed.len() != group.len() {
            return Err(Error::InvalidGroup(format!(
                "{} signed entries for {} transactions",
                signed.len(),
                group.len()
            )));
        }

        if group.is_grouped() {
            let missing: Vec<usize> = signed
                .iter()
                .enumerate()
                .filter(|(_, s)| s.is_none())
                .map(|(i, _)| i)
                .collect();
            if !missing.is_empty() {
                tracing::warn!(?missing, "Group is only partially signed, not submitting");
                return Err(Error::IncompleteGroup { missing });
            }
            let receipt = self.submit_concatenated(signed.into_iter().flatten().collect()).await?;
            return Ok(vec![receipt]);
        }

        let blobs: Vec<SignedBlob> = signed.into_iter().flatten().collect();
        if blobs.is_empty() {
            return Err(Error::InvalidArgument(
                "no signed transactions to submit".to_string(),
            ));
        }
        self.submit_each(blobs).await
    }

    /// Send blobs as one atomic request
    pub async fn submit_concatenated(&self, blobs: Vec<SignedBlob>) -> Result<SubmitReceipt> {
        if blobs.is_empty() {
            return Err(Error::InvalidArgument(
                "no signed transactions to submit".to_string(),
            ));
        }
        let count = blobs.len();
        let payload: Vec<u8> = blobs.into_iter().flat_map(SignedBlob::into_bytes).collect();

        tracing::info!(count, bytes = payload.len(), "Submitting transaction group");
        self.sink.send_raw(payload).await
    }

    /// Send blobs one request each, stopping at the first rejection
    pub async fn submit_each(&self, blobs: Vec<SignedBlob>) -> Result<Vec<SubmitReceipt>> {
        let mut receipts = Vec::with_capacity(blobs.len());
        for blob in blobs {
            tracing::info!(bytes = blob.len(), "Submitting transaction");
            receipts.push(self.sink.send_raw(blob.into_bytes()).await?);
        }
        Ok(receipts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::test_support::MockTransaction;
    use std::sync::Mutex;

    /// Sink that records payloads instead of sending them
    #[derive(Default)]
    struct RecordingSink {
        payloads: Mutex<Vec<Vec<u8>>>,
        reject: bool,
    }

    #[async_trait]
    impl TransactionSink for RecordingSink {
        async fn send_raw(&self, payload: Vec<u8>) -> Result<SubmitReceipt> {
            self.payloads.lock().unwrap().push(payload);
            if self.reject {
                return Err(Error::SubmitRejected {
                    status: 400,
                    body: "overspend".into(),
                });
            }
            Ok(SubmitReceipt::new(200, r#"{"txId":"ABC"}"#.into()))
        }
    }

    fn blob(bytes: &[u8]) -> Option<SignedBlob> {
        Some(SignedBlob::new(bytes.to_vec()))
    }

    #[tokio::test]
    async fn test_grouped_submit_is_one_concatenated_request() {
        let sink = Arc::new(RecordingSink::default());
        let submitter = GroupSubmitter::new(sink.clone());
        let group = submitter
            .build_group(vec![MockTransaction::new(b"pay"), MockTransaction::new(b"call")])
            .unwrap();

        let receipts = submitter
            .submit(&group, vec![blob(b"abc"), blob(b"def")])
            .await
            .unwrap();

        assert_eq!(receipts.len(), 1);
        assert_eq!(receipts[0].tx_id.as_deref(), Some("ABC"));
        assert_eq!(*sink.payloads.lock().unwrap(), vec![b"abcdef".to_vec()]);
    }

    #[tokio::test]
    async fn test_single_submit_sends_only_that_blob() {
        let sink = Arc::new(RecordingSink::default());
        let submitter = GroupSubmitter::new(sink.clone());
        let group = submitter.build_group(vec![MockTransaction::new(b"optin")]).unwrap();

        submitter.submit(&group, vec![blob(b"xyz")]).await.unwrap();
        assert_eq!(*sink.payloads.lock().unwrap(), vec![b"xyz".to_vec()]);
    }

    #[tokio::test]
    async fn test_hole_in_group_submits_nothing() {
        let sink = Arc::new(RecordingSink::default());
        let submitter = GroupSubmitter::new(sink.clone());
        let group = submitter
            .build_group(vec![MockTransaction::new(b"pay"), MockTransaction::new(b"call")])
            .unwrap();

        let err = submitter
            .submit(&group, vec![None, blob(b"def")])
            .await
            .unwrap_err();

        assert!(matches!(err, Error::IncompleteGroup { ref missing } if missing == &vec![0]));
        assert!(sink.payloads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_all_holes_ungrouped_is_invalid_argument() {
        let sink = Arc::new(RecordingSink::default());
        let submitter = GroupSubmitter::new(sink.clone());
        let group = TransactionGroup::single(MockTransaction::new(b"optin"));

        assert!(matches!(
            submitter.submit(&group, vec![None]).await,
            Err(Error::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_length_mismatch_is_invalid_group() {
        let submitter = GroupSubmitter::new(Arc::new(RecordingSink::default()));
        let group = TransactionGroup::single(MockTransaction::new(b"optin"));

        assert!(matches!(
            submitter.submit(&group, vec![blob(b"a"), blob(b"b")]).await,
            Err(Error::InvalidGroup(_))
        ));
    }

    #[tokio::test]
    async fn test_submit_each_stops_at_first_rejection() {
        let sink = Arc::new(RecordingSink {
            reject: true,
            ..Default::default()
        });
        let submitter = GroupSubmitter::new(sink.clone());

        let err = submitter
            .submit_each(vec![SignedBlob::new(b"a".to_vec()), SignedBlob::new(b"b".to_vec())])
            .await
            .unwrap_err();

        assert!(matches!(err, Error::SubmitRejected { status: 400, .. }));
        assert_eq!(sink.payloads.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_receipt_parses_tx_id() {
        assert_eq!(
            SubmitReceipt::new(200, r#"{"txId":"T1"}"#.into()).tx_id.as_deref(),
            Some("T1")
        );
        assert!(SubmitReceipt::new(200, "ok".into()).tx_id.is_none());
    }
}
