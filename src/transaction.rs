use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::amount::Amount;
use crate::errors::{ModelError, ModelResult};
use crate::models::Output;

/// Length in bytes of a transaction id (SHA-256 digest).
const TXID_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Preview,
    Pending,
    Confirmed,
}

impl TxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxStatus::Preview => "preview",
            TxStatus::Pending => "pending",
            TxStatus::Confirmed => "confirmed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "preview" => Some(TxStatus::Preview),
            "pending" => Some(TxStatus::Pending),
            "confirmed" => Some(TxStatus::Confirmed),
            _ => None,
        }
    }
}

/// Unsigned transaction built locally and not yet broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviewDetails {
    pub from: String,
    pub to: Vec<String>,
    pub encoded: String,
}

/// Transaction known to the network. Block and timestamp are fixed once
/// confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalDetails {
    addresses: Vec<String>,
    timestamp: i64,
    block: u64,
    confirmed: bool,
}

impl NormalDetails {
    pub fn pending(addresses: Vec<String>, timestamp: i64) -> Self {
        Self {
            addresses,
            timestamp,
            block: 0,
            confirmed: false,
        }
    }

    pub fn confirmed(addresses: Vec<String>, timestamp: i64, block: u64) -> Self {
        Self {
            addresses,
            timestamp,
            block,
            confirmed: true,
        }
    }

    pub fn addresses(&self) -> &[String] {
        &self.addresses
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.timestamp, 0)
    }

    pub fn block(&self) -> u64 {
        self.block
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmed
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransactionKind {
    Preview(PreviewDetails),
    Normal(NormalDetails),
}

/// A transfer with its wallet-relative annotations. The shape shared by both
/// kinds lives on this struct; the kind-specific fields live in `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    txid: String,
    inputs: Vec<Output>,
    outputs: Vec<Output>,
    balance: Amount,
    #[serde(skip_serializing_if = "Option::is_none")]
    hours_sent: Option<Amount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hours_burned: Option<Amount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    coins_moved_internally: Option<bool>,
    #[serde(flatten)]
    kind: TransactionKind,
}

impl Transaction {
    pub fn preview(
        txid: impl Into<String>,
        inputs: Vec<Output>,
        outputs: Vec<Output>,
        details: PreviewDetails,
    ) -> ModelResult<Self> {
        Self::build(txid.into(), inputs, outputs, TransactionKind::Preview(details))
    }

    pub fn normal(
        txid: impl Into<String>,
        inputs: Vec<Output>,
        outputs: Vec<Output>,
        details: NormalDetails,
    ) -> ModelResult<Self> {
        Self::build(txid.into(), inputs, outputs, TransactionKind::Normal(details))
    }

    fn build(
        txid: String,
        inputs: Vec<Output>,
        outputs: Vec<Output>,
        kind: TransactionKind,
    ) -> ModelResult<Self> {
        validate_txid(&txid)?;
        let tx = Self {
            txid,
            inputs,
            outputs,
            balance: Amount::ZERO,
            hours_sent: None,
            hours_burned: None,
            coins_moved_internally: None,
            kind,
        };
        tx.check_conservation()?;
        Ok(tx)
    }

    /// Outputs may never hold more coins or hours than the inputs they
    /// spend. Transactions without inputs (genesis) are exempt.
    fn check_conservation(&self) -> ModelResult<()> {
        if self.inputs.is_empty() {
            return Ok(());
        }
        let coins_in = Amount::try_sum(self.inputs.iter().map(|o| o.coins))?;
        let coins_out = Amount::try_sum(self.outputs.iter().map(|o| o.coins))?;
        if coins_out > coins_in {
            return Err(ModelError::InvariantViolation(format!(
                "transaction {} creates coins: {coins_out} out of {coins_in}",
                self.txid
            )));
        }
        let hours_in = Amount::try_sum(self.inputs.iter().map(|o| o.hours))?;
        let hours_out = Amount::try_sum(self.outputs.iter().map(|o| o.hours))?;
        if hours_out > hours_in {
            return Err(ModelError::InvariantViolation(format!(
                "transaction {} creates hours: {hours_out} out of {hours_in}",
                self.txid
            )));
        }
        Ok(())
    }

    pub fn txid(&self) -> &str {
        &self.txid
    }

    pub fn inputs(&self) -> &[Output] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    /// Net coin change for the owning wallet, set by [`Transaction::annotate`].
    pub fn balance(&self) -> Amount {
        self.balance
    }

    pub fn hours_sent(&self) -> Option<Amount> {
        self.hours_sent
    }

    pub fn hours_burned(&self) -> Option<Amount> {
        self.hours_burned
    }

    pub fn coins_moved_internally(&self) -> Option<bool> {
        self.coins_moved_internally
    }

    pub fn kind(&self) -> &TransactionKind {
        &self.kind
    }

    pub fn status(&self) -> TxStatus {
        match &self.kind {
            TransactionKind::Preview(_) => TxStatus::Preview,
            TransactionKind::Normal(details) if details.confirmed => TxStatus::Confirmed,
            TransactionKind::Normal(_) => TxStatus::Pending,
        }
    }

    /// Timestamp used to order wallet history; previews have none.
    pub fn timestamp(&self) -> Option<i64> {
        match &self.kind {
            TransactionKind::Preview(_) => None,
            TransactionKind::Normal(details) => Some(details.timestamp),
        }
    }

    /// Same node data as `other`, ignoring the wallet-relative annotations.
    pub fn same_upstream(&self, other: &Transaction) -> bool {
        self.txid == other.txid
            && self.inputs == other.inputs
            && self.outputs == other.outputs
            && self.kind == other.kind
    }

    fn lifecycle_error(&self, to: TxStatus) -> ModelError {
        ModelError::Lifecycle {
            txid: self.txid.clone(),
            from: self.status().as_str(),
            to: to.as_str(),
        }
    }

    /// Turn a broadcast preview into a pending network transaction.
    pub fn broadcast(self, addresses: Vec<String>, timestamp: i64) -> ModelResult<Transaction> {
        match self.kind {
            TransactionKind::Preview(_) => {
                tracing::debug!(txid = %self.txid, "Preview broadcast, now pending");
                Ok(Transaction {
                    kind: TransactionKind::Normal(NormalDetails::pending(addresses, timestamp)),
                    ..self
                })
            }
            TransactionKind::Normal(_) => Err(self.lifecycle_error(TxStatus::Pending)),
        }
    }

    /// Mark a pending transaction as included in `block`. Confirmed
    /// transactions never change again.
    pub fn confirm(&mut self, block: u64, timestamp: i64) -> ModelResult<()> {
        if self.status() != TxStatus::Pending {
            return Err(self.lifecycle_error(TxStatus::Confirmed));
        }
        if let TransactionKind::Normal(details) = &mut self.kind {
            details.block = block;
            details.timestamp = timestamp;
            details.confirmed = true;
        }
        tracing::debug!(txid = %self.txid, block, "Transaction confirmed");
        Ok(())
    }

    /// Classify against the wallet's addresses and store the result on the
    /// transaction.
    pub fn annotate(&mut self, wallet_addresses: &HashSet<String>) -> ModelResult<Classification> {
        let classification = classify(self, wallet_addresses)?;
        self.balance = classification.balance;
        self.hours_sent = Some(classification.hours_sent);
        self.hours_burned = Some(classification.hours_burned);
        self.coins_moved_internally = Some(classification.is_internal);
        Ok(classification)
    }
}

/// Direction and net effect of a transaction for one wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub is_incoming: bool,
    pub is_outgoing: bool,
    pub is_internal: bool,
    pub balance: Amount,
    pub hours_sent: Amount,
    pub hours_burned: Amount,
}

/// Classify `tx` relative to the wallet owning `wallet_addresses`.
///
/// Fails with [`ModelError::Classification`] when the transaction touches no
/// wallet address, since such a transaction has no place in the wallet's
/// history.
pub fn classify(
    tx: &Transaction,
    wallet_addresses: &HashSet<String>,
) -> ModelResult<Classification> {
    let owned = |o: &&Output| wallet_addresses.contains(&o.address);

    let owned_inputs: Vec<&Output> = tx.inputs.iter().filter(owned).collect();
    let owned_outputs: Vec<&Output> = tx.outputs.iter().filter(owned).collect();
    if owned_inputs.is_empty() && owned_outputs.is_empty() {
        return Err(ModelError::Classification {
            txid: tx.txid.clone(),
        });
    }

    let is_internal = !tx.inputs.is_empty()
        && owned_inputs.len() == tx.inputs.len()
        && owned_outputs.len() == tx.outputs.len();
    let is_outgoing = !owned_inputs.is_empty() && !is_internal;
    let is_incoming = !owned_outputs.is_empty() && !is_outgoing && !is_internal;

    let received = Amount::try_sum(owned_outputs.iter().map(|o| o.coins))?;
    let spent = Amount::try_sum(owned_inputs.iter().map(|o| o.coins))?;
    let balance = received.checked_sub(spent)?;

    let hours_sent = if is_internal {
        Amount::try_sum(tx.outputs.iter().map(|o| o.hours))?
    } else if is_outgoing {
        Amount::try_sum(
            tx.outputs
                .iter()
                .filter(|o| !wallet_addresses.contains(&o.address))
                .map(|o| o.hours),
        )?
    } else {
        Amount::try_sum(owned_outputs.iter().map(|o| o.hours))?
    };

    let hours_burned = if tx.inputs.is_empty() {
        Amount::ZERO
    } else {
        let hours_in = Amount::try_sum(tx.inputs.iter().map(|o| o.hours))?;
        let hours_out = Amount::try_sum(tx.outputs.iter().map(|o| o.hours))?;
        hours_in.sub_non_negative(hours_out)?
    };

    Ok(Classification {
        is_incoming,
        is_outgoing,
        is_internal,
        balance,
        hours_sent,
        hours_burned,
    })
}

/// A txid is the hex encoding of a 32-byte SHA-256 digest.
pub fn validate_txid(txid: &str) -> ModelResult<()> {
    match hex::decode(txid) {
        Ok(bytes) if bytes.len() == TXID_LEN => Ok(()),
        _ => Err(ModelError::InvalidTxid(txid.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TXID: &str = "6f8a1c7b2d3e4f5061728394a5b6c7d8e9f00112233445566778899aabbccdde";

    fn output(address: &str, coins: &str, hours: &str) -> Output {
        Output::new(address, coins.parse().unwrap(), hours.parse().unwrap(), "hash")
    }

    fn preview() -> Transaction {
        Transaction::preview(
            TXID,
            vec![output("A1", "10", "4")],
            vec![output("B1", "9", "1"), output("A1", "1", "1")],
            PreviewDetails {
                from: "A1".to_string(),
                to: vec!["B1".to_string()],
                encoded: "deadbeef".to_string(),
            },
        )
        .unwrap()
    }

    #[test]
    fn status_strings_round_trip() {
        for status in [TxStatus::Preview, TxStatus::Pending, TxStatus::Confirmed] {
            assert_eq!(TxStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(TxStatus::from_str("expired"), None);
    }

    #[test]
    fn txid_must_be_a_sha256_hex_digest() {
        assert!(validate_txid(TXID).is_ok());
        assert!(validate_txid("").is_err());
        assert!(validate_txid("abcd").is_err());
        assert!(validate_txid(&"zz".repeat(32)).is_err());
    }

    #[test]
    fn coins_cannot_be_created() {
        let err = Transaction::normal(
            TXID,
            vec![output("A1", "1", "5")],
            vec![output("B1", "2", "0")],
            NormalDetails::pending(vec![], 0),
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::InvariantViolation(_)));
    }

    #[test]
    fn hours_cannot_be_created() {
        let err = Transaction::normal(
            TXID,
            vec![output("A1", "1", "1")],
            vec![output("B1", "1", "2")],
            NormalDetails::pending(vec![], 0),
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::InvariantViolation(_)));
    }

    #[test]
    fn genesis_has_no_inputs() {
        let tx = Transaction::normal(
            TXID,
            vec![],
            vec![output("A1", "100", "0")],
            NormalDetails::confirmed(vec!["A1".to_string()], 1_400_000_000, 0),
        )
        .unwrap();
        let wallet: HashSet<String> = ["A1".to_string()].into();
        let c = classify(&tx, &wallet).unwrap();
        assert!(c.is_incoming);
        assert!(!c.is_internal);
        assert_eq!(c.hours_burned, Amount::ZERO);
    }

    #[test]
    fn preview_goes_pending_then_confirmed() {
        let tx = preview();
        assert_eq!(tx.status(), TxStatus::Preview);
        assert_eq!(tx.timestamp(), None);

        let mut tx = tx.broadcast(vec!["A1".into(), "B1".into()], 1_700_000_000).unwrap();
        assert_eq!(tx.status(), TxStatus::Pending);
        match tx.kind() {
            TransactionKind::Normal(details) => {
                assert_eq!(details.block(), 0);
                assert!(!details.is_confirmed());
            }
            other => panic!("expected normal transaction, got {other:?}"),
        }

        tx.confirm(42, 1_700_000_060).unwrap();
        assert_eq!(tx.status(), TxStatus::Confirmed);
        let TransactionKind::Normal(details) = tx.kind() else {
            panic!("expected normal transaction");
        };
        assert_eq!(details.block(), 42);
        assert_eq!(
            details.time().unwrap().to_rfc3339(),
            "2023-11-14T22:14:20+00:00"
        );
    }

    #[test]
    fn confirmed_transactions_are_final() {
        let mut tx = preview().broadcast(vec![], 1).unwrap();
        tx.confirm(10, 2).unwrap();

        let err = tx.confirm(11, 3).unwrap_err();
        assert_eq!(
            err,
            ModelError::Lifecycle {
                txid: TXID.to_string(),
                from: "confirmed",
                to: "confirmed",
            }
        );
        let TransactionKind::Normal(details) = tx.kind() else {
            panic!("expected normal transaction");
        };
        assert_eq!(details.block(), 10);
        assert_eq!(details.timestamp(), 2);
    }

    #[test]
    fn invalid_transitions_are_rejected() {
        let mut tx = preview();
        assert!(matches!(
            tx.confirm(1, 1),
            Err(ModelError::Lifecycle { from: "preview", .. })
        ));

        let pending = preview().broadcast(vec![], 1).unwrap();
        assert!(matches!(
            pending.broadcast(vec![], 2),
            Err(ModelError::Lifecycle { from: "pending", to: "pending", .. })
        ));
    }

    #[test]
    fn annotate_stores_classification() {
        let mut tx = preview();
        let wallet: HashSet<String> = ["A1".to_string()].into();
        let c = tx.annotate(&wallet).unwrap();

        assert!(c.is_outgoing);
        assert_eq!(tx.balance().to_string(), "-9");
        assert_eq!(tx.hours_sent().unwrap().to_string(), "1");
        assert_eq!(tx.hours_burned().unwrap().to_string(), "2");
        assert_eq!(tx.coins_moved_internally(), Some(false));
    }

    #[test]
    fn serializes_with_kind_tag() {
        let json = serde_json::to_value(preview()).unwrap();
        assert_eq!(json["type"], "preview");
        assert_eq!(json["encoded"], "deadbeef");
        assert_eq!(json["balance"], "0");
        assert!(json.get("hoursSent").is_none());
    }
}
