use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use crate::amount::{Amount, Denomination};
use crate::dto::{
    GetWalletsResponseWallet, PostWalletNewAddressResponse, UnspentOutputsResponse, WalletEvent,
};
use crate::errors::{ModelError, ModelResult};
use crate::models::{Balance, Wallet};
use crate::transaction::{Transaction, TxStatus};

#[derive(Debug, Clone)]
pub struct BalanceSummary {
    pub coins: Amount,
    pub hours: Amount,
    /// Signed sum of the balances of unconfirmed transactions.
    pub pending_coins: Amount,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Outcome of a wallet listing sync, one entry per listed wallet.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub results: Vec<(String, ModelResult<()>)>,
    pub removed: Vec<String>,
}

impl SyncReport {
    pub fn failures(&self) -> impl Iterator<Item = (&str, &ModelError)> {
        self.results.iter().filter_map(|(filename, result)| {
            result.as_ref().err().map(|e| (filename.as_str(), e))
        })
    }

    pub fn is_ok(&self) -> bool {
        self.failures().next().is_none()
    }
}

type History = HashMap<String, Arc<Transaction>>;

/// In-memory wallets and their transaction histories.
///
/// Every wallet is held as an immutable `Arc<Wallet>`. Updates build a new
/// wallet from a clone and swap it in under the write lock, so readers only
/// ever observe whole snapshots. Callers are expected to serialize writers.
#[derive(Debug, Default)]
pub struct WalletStore {
    denomination: Denomination,
    wallets: RwLock<HashMap<String, Arc<Wallet>>>,
    histories: RwLock<HashMap<String, History>>,
}

// Writers only swap whole `Arc`s, so a poisoned map is still consistent.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl WalletStore {
    pub fn new(denomination: Denomination) -> Self {
        Self {
            denomination,
            ..Default::default()
        }
    }

    pub fn denomination(&self) -> Denomination {
        self.denomination
    }

    pub fn wallet(&self, filename: &str) -> Option<Arc<Wallet>> {
        read(&self.wallets).get(filename).cloned()
    }

    /// All wallets ordered by file name.
    pub fn wallets(&self) -> Vec<Arc<Wallet>> {
        let mut wallets: Vec<_> = read(&self.wallets).values().cloned().collect();
        wallets.sort_by(|a, b| a.filename().cmp(b.filename()));
        wallets
    }

    pub fn remove_wallet(&self, filename: &str) -> Option<Arc<Wallet>> {
        write(&self.histories).remove(filename);
        write(&self.wallets).remove(filename)
    }

    /// Clone the current wallet, apply `update`, and swap the result in.
    /// Nothing is stored when `update` fails.
    fn update_wallet<R>(
        &self,
        filename: &str,
        update: impl FnOnce(&mut Wallet) -> ModelResult<R>,
    ) -> ModelResult<R> {
        let mut wallets = write(&self.wallets);
        let current = wallets
            .get(filename)
            .ok_or_else(|| ModelError::UnknownWallet(filename.to_string()))?;

        let mut next = Wallet::clone(current);
        let result = update(&mut next)?;
        wallets.insert(filename.to_string(), Arc::new(next));
        Ok(result)
    }

    /// Merge a full wallet listing into the store. Wallets absent from the
    /// listing are dropped. Each wallet succeeds or fails on its own.
    pub fn sync_wallets(&self, listing: &[GetWalletsResponseWallet]) -> SyncReport {
        tracing::info!("Syncing {} wallets from listing", listing.len());

        let mut report = SyncReport::default();
        let mut wallets = write(&self.wallets);
        let mut listed = Vec::with_capacity(listing.len());
        let mut refreshed = Vec::new();
        let mut changed = 0u32;
        let mut unchanged = 0u32;

        for entry in listing {
            let filename = entry.meta.filename.clone();
            listed.push(filename.clone());

            let merged = match wallets.get(&filename) {
                Some(existing) => existing.merge_listing(entry),
                None => Wallet::from_listing(entry),
            };

            let result = match merged {
                Ok(wallet) => {
                    if wallets.get(&filename).is_some_and(|existing| **existing == wallet) {
                        unchanged += 1;
                    } else {
                        refreshed.push((filename.clone(), wallet.address_set()));
                        wallets.insert(filename.clone(), Arc::new(wallet));
                        changed += 1;
                    }
                    Ok(())
                }
                Err(e) => {
                    tracing::warn!(filename = %filename, "Rejected wallet from listing: {}", e);
                    Err(e)
                }
            };
            report.results.push((filename, result));
        }

        // A wallet whose entry failed keeps its previous state.
        let stale: Vec<String> = wallets
            .keys()
            .filter(|f| !listed.contains(*f))
            .cloned()
            .collect();
        drop(wallets);
        for (filename, addresses) in &refreshed {
            self.reannotate_history(filename, addresses);
        }
        for filename in stale {
            self.remove_wallet(&filename);
            report.removed.push(filename);
        }

        tracing::info!(
            "Wallet sync complete: {} listed, {} changed/added, {} unchanged, {} removed, {} failed",
            listing.len(),
            changed,
            unchanged,
            report.removed.len(),
            report.failures().count()
        );
        report
    }

    /// Append addresses issued by the node. Returns how many were new.
    pub fn append_addresses(
        &self,
        filename: &str,
        response: &PostWalletNewAddressResponse,
    ) -> ModelResult<usize> {
        let (added, addresses) = self.update_wallet(filename, |wallet| {
            let added = wallet.append_addresses(&response.addresses);
            Ok((added, wallet.address_set()))
        })?;
        tracing::debug!(filename, added, "Appended new addresses");
        if added > 0 {
            self.reannotate_history(filename, &addresses);
        }
        Ok(added)
    }

    /// Re-classify a wallet's history against its current address set.
    /// Transactions that no longer touch the wallet are dropped.
    fn reannotate_history(&self, filename: &str, addresses: &HashSet<String>) {
        let mut histories = write(&self.histories);
        let Some(history) = histories.get_mut(filename) else {
            return;
        };

        let before = history.len();
        history.retain(|txid, tx| {
            let mut next = Transaction::clone(tx);
            match next.annotate(addresses) {
                Ok(_) => {
                    if next != **tx {
                        *tx = Arc::new(next);
                    }
                    true
                }
                Err(ModelError::Classification { .. }) => {
                    tracing::debug!(
                        filename,
                        txid = %txid,
                        "Dropping transaction no longer in wallet"
                    );
                    false
                }
                Err(e) => {
                    tracing::warn!(filename, txid = %txid, "Keeping previous annotation: {}", e);
                    true
                }
            }
        });
        tracing::debug!(
            filename,
            kept = history.len(),
            dropped = before - history.len(),
            "Re-annotated history"
        );
    }

    /// Replace the wallet's outputs with a fresh full set. Returns a balance
    /// event when the derived balance changed.
    pub fn apply_outputs(
        &self,
        filename: &str,
        response: &UnspentOutputsResponse,
    ) -> ModelResult<Option<WalletEvent>> {
        for output in &response.head_outputs {
            output.coins.check_precision(self.denomination.coins)?;
            output.hours.check_precision(self.denomination.hours)?;
        }

        let (before, after) = self.update_wallet(filename, |wallet| {
            let before = wallet.balance();
            let after = wallet.apply_outputs(response.head_outputs.clone())?;
            Ok((before, after))
        })?;

        tracing::debug!(
            filename,
            coins = %after.coins,
            hours = %after.hours,
            "Applied {} outputs",
            response.head_outputs.len()
        );

        Ok((before != after).then(|| WalletEvent::BalanceChanged {
            filename: filename.to_string(),
            balance: after,
        }))
    }

    /// Insert or refresh a transaction in the wallet's history.
    ///
    /// Returns an event when something changed, `None` when the stored copy
    /// is already up to date. A confirmed transaction is never replaced by a
    /// pending copy.
    pub fn upsert_transaction(
        &self,
        filename: &str,
        mut tx: Transaction,
    ) -> ModelResult<Option<WalletEvent>> {
        let wallet = self
            .wallet(filename)
            .ok_or_else(|| ModelError::UnknownWallet(filename.to_string()))?;

        if tx.status() == TxStatus::Preview {
            return Err(ModelError::Lifecycle {
                txid: tx.txid().to_string(),
                from: TxStatus::Preview.as_str(),
                to: TxStatus::Pending.as_str(),
            });
        }

        tx.annotate(&wallet.address_set())?;

        let mut histories = write(&self.histories);
        let history = histories.entry(filename.to_string()).or_default();

        let event = match history.get(tx.txid()) {
            None => WalletEvent::TransactionAdded {
                filename: filename.to_string(),
                tx: tx.clone(),
            },
            Some(existing) if **existing == tx => return Ok(None),
            // Only the wallet-relative annotations moved.
            Some(existing) if existing.same_upstream(&tx) => WalletEvent::TransactionUpdated {
                filename: filename.to_string(),
                tx: tx.clone(),
            },
            Some(existing) => match (existing.status(), tx.status()) {
                (TxStatus::Confirmed, TxStatus::Pending) => {
                    tracing::debug!(txid = %tx.txid(), "Ignoring stale pending copy");
                    return Ok(None);
                }
                (TxStatus::Confirmed, _) => {
                    return Err(ModelError::InvariantViolation(format!(
                        "confirmed transaction {} changed upstream",
                        tx.txid()
                    )));
                }
                (_, TxStatus::Confirmed) => WalletEvent::TransactionConfirmed {
                    filename: filename.to_string(),
                    tx: tx.clone(),
                },
                _ => WalletEvent::TransactionUpdated {
                    filename: filename.to_string(),
                    tx: tx.clone(),
                },
            },
        };

        history.insert(tx.txid().to_string(), Arc::new(tx));
        Ok(Some(event))
    }

    /// Newest first, then by txid for a stable order.
    pub fn transactions(
        &self,
        filename: &str,
        limit: usize,
        offset: usize,
    ) -> Vec<Arc<Transaction>> {
        let histories = read(&self.histories);
        let Some(history) = histories.get(filename) else {
            return Vec::new();
        };

        let mut txs: Vec<_> = history.values().cloned().collect();
        txs.sort_by(|a, b| {
            b.timestamp()
                .cmp(&a.timestamp())
                .then_with(|| a.txid().cmp(b.txid()))
        });
        txs.into_iter().skip(offset).take(limit).collect()
    }

    pub fn balance_summary(&self, filename: &str) -> ModelResult<BalanceSummary> {
        let wallet = self
            .wallet(filename)
            .ok_or_else(|| ModelError::UnknownWallet(filename.to_string()))?;
        let Balance { coins, hours } = wallet.balance();

        let histories = read(&self.histories);
        let history = histories.get(filename);
        let txs = history.into_iter().flat_map(|h| h.values());

        let mut pending_coins = Amount::ZERO;
        let mut last_updated: Option<i64> = None;
        for tx in txs {
            if tx.status() == TxStatus::Pending {
                pending_coins = pending_coins.checked_add(tx.balance())?;
            }
            last_updated = last_updated.max(tx.timestamp());
        }

        Ok(BalanceSummary {
            coins,
            hours,
            pending_coins,
            last_updated: last_updated.and_then(|ts| DateTime::from_timestamp(ts, 0)),
        })
    }
}
