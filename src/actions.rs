//! Dashboard actions
//!
//! Each action builds its transactions for the connected account, has the
//! active wallet sign them and submits the result. Errors from any step are
//! returned unchanged.

use crate::submit::{GroupSubmitter, SubmitReceipt};
use crate::transaction::{TransactionGroup, UnsignedTransaction};
use crate::wallet::{Account, WalletSession};
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Application call selector for updating the caller's weight
pub const SET_WEIGHT_SELECTOR: &[u8] = b"set_weight";

/// Application call selector for distributing a payment
pub const DISTRIBUTE_SELECTOR: &[u8] = b"distribute";

/// Constructs unsigned transactions for the target network
///
/// Implementations fetch suggested parameters as needed and produce the
/// canonical encoding through [`UnsignedTransaction`].
#[async_trait]
pub trait TransactionBuilder: Send + Sync {
    type Transaction: UnsignedTransaction + 'static;

    /// Application opt-in from `sender`
    async fn opt_in(&self, sender: &Account, app_id: u64) -> Result<Self::Transaction>;

    /// No-op application call with arguments and foreign accounts
    async fn app_call(
        &self,
        sender: &Account,
        app_id: u64,
        args: Vec<Vec<u8>>,
        accounts: Vec<String>,
    ) -> Result<Self::Transaction>;

    /// Payment of `amount` microAlgos
    async fn payment(
        &self,
        sender: &Account,
        receiver: &str,
        amount: u64,
    ) -> Result<Self::Transaction>;

    /// Escrow address of an application
    fn application_address(&self, app_id: u64) -> String;
}

/// Split a comma-separated recipient list, dropping blanks
pub fn parse_recipients(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(String::from)
        .collect()
}

pub struct Dashboard<B: TransactionBuilder> {
    session: Arc<WalletSession>,
    builder: B,
    submitter: GroupSubmitter,
}

impl<B: TransactionBuilder> Dashboard<B> {
    pub fn new(session: Arc<WalletSession>, builder: B, submitter: GroupSubmitter) -> Self {
        Self {
            session,
            builder,
            submitter,
        }
    }

    pub fn session(&self) -> &Arc<WalletSession> {
        &self.session
    }

    /// Account to act as, once the app id has been checked
    async fn sender(&self, app_id: u64) -> Result<Account> {
        if app_id == 0 {
            return Err(Error::InvalidArgument("Enter a valid App ID".to_string()));
        }
        self.session.current_account().await
    }

    /// Opt the connected account into the application
    pub async fn opt_in(&self, app_id: u64) -> Result<Vec<SubmitReceipt>> {
        let sender = self.sender(app_id).await?;
        let txn = self.builder.opt_in(&sender, app_id).await?;
        self.sign_and_send(TransactionGroup::single(txn), "opt-in")
            .await
    }

    /// Set the connected account's weight
    pub async fn set_weight(&self, app_id: u64, weight: u64) -> Result<Vec<SubmitReceipt>> {
        let sender = self.sender(app_id).await?;
        let args = vec![SET_WEIGHT_SELECTOR.to_vec(), weight.to_be_bytes().to_vec()];
        let txn = self
            .builder
            .app_call(&sender, app_id, args, Vec::new())
            .await?;
        self.sign_and_send(TransactionGroup::single(txn), "set-weight")
            .await
    }

    /// Pay `total_amount` into the application and distribute it to
    /// `recipients`, atomically
    pub async fn distribute(
        &self,
        app_id: u64,
        recipients: &str,
        total_amount: u64,
    ) -> Result<Vec<SubmitReceipt>> {
        let sender = self.sender(app_id).await?;

        let recipients = parse_recipients(recipients);
        if recipients.is_empty() {
            return Err(Error::InvalidArgument("No recipients provided".to_string()));
        }
        if total_amount == 0 {
            return Err(Error::InvalidArgument("Invalid amount".to_string()));
        }

        let app_address = self.builder.application_address(app_id);
        let payment = self
            .builder
            .payment(&sender, &app_address, total_amount)
            .await?;
        let call = self
            .builder
            .app_call(&sender, app_id, vec![DISTRIBUTE_SELECTOR.to_vec()], recipients)
            .await?;

        let group = self.submitter.build_group(vec![payment, call])?;
        self.sign_and_send(group, "distribute").await
    }

    async fn sign_and_send(
        &self,
        group: TransactionGroup<B::Transaction>,
        purpose: &str,
    ) -> Result<Vec<SubmitReceipt>> {
        let signed = self.session.sign(&group.as_dyn()).await?;
        let receipts = self.submitter.submit(&group, signed).await.map_err(|e| {
            tracing::warn!(purpose, error = %e, "Submission failed");
            e
        })?;
        tracing::info!(
            purpose,
            grouped = group.is_grouped(),
            count = group.len(),
            "Submitted"
        );
        Ok(receipts)
    }
}
