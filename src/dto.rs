use crate::amount::Amount;
use crate::models::{Balance, Output};
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};

// ===== Wallet listing DTOs =====

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetWalletsResponseWallet {
    pub meta: GetWalletsResponseMeta,
    #[serde(default)]
    pub entries: Vec<GetWalletsResponseEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetWalletsResponseMeta {
    pub label: String,
    pub filename: String,
    #[serde(default)]
    pub encrypted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetWalletsResponseEntry {
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostWalletNewAddressResponse {
    pub addresses: Vec<String>,
}

// ===== Output DTOs =====

/// Unspent outputs of a set of addresses. Amounts arrive as decimal strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnspentOutputsResponse {
    #[serde(default)]
    pub head_outputs: Vec<Output>,
}

// ===== Node info DTOs =====

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TellerConfig {
    pub enabled: bool,
    pub sky_btc_exchange_rate: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub coin_type: String,
    pub filename: String,
    pub deposit_address: String,
    pub recipient_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

// ===== Wallet change events =====

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum WalletEvent {
    TransactionAdded { filename: String, tx: Transaction },
    TransactionUpdated { filename: String, tx: Transaction },
    TransactionConfirmed { filename: String, tx: Transaction },
    BalanceChanged { filename: String, balance: Balance },
}

impl WalletEvent {
    pub fn filename(&self) -> &str {
        match self {
            WalletEvent::TransactionAdded { filename, .. }
            | WalletEvent::TransactionUpdated { filename, .. }
            | WalletEvent::TransactionConfirmed { filename, .. }
            | WalletEvent::BalanceChanged { filename, .. } => filename,
        }
    }
}
