//! Client-side data model for a coin/hour wallet: exact amounts, addresses
//! and wallets with derived balances, and transactions classified against
//! the wallet that owns them.

pub mod amount;
pub mod dto;
pub mod errors;
pub mod models;
pub mod store;
pub mod transaction;

#[cfg(feature = "runtime")]
pub mod initialize;

pub use amount::{Amount, Denomination, Precision};
pub use errors::{AppError, ModelError, ModelResult};
pub use models::{derive_balance, Address, Balance, Connection, Output, Wallet};
pub use store::{BalanceSummary, SyncReport, WalletStore};
pub use transaction::{classify, Classification, Transaction, TransactionKind, TxStatus};
