use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use crate::amount::Amount;
use crate::dto::GetWalletsResponseWallet;
use crate::errors::{ModelError, ModelResult};

/// Unspent output as reported by the node. Never mutated; spending it yields
/// a new output with a different hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    pub address: String,
    pub coins: Amount,
    #[serde(rename = "calculated_hours")]
    pub hours: Amount,
    pub hash: String,
}

impl Output {
    pub fn new(
        address: impl Into<String>,
        coins: Amount,
        hours: Amount,
        hash: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            coins,
            hours,
            hash: hash.into(),
        }
    }

    fn check_non_negative(&self) -> ModelResult<()> {
        if self.coins.is_negative() || self.hours.is_negative() {
            return Err(ModelError::InvariantViolation(format!(
                "output {} carries a negative amount ({} coins, {} hours)",
                self.hash, self.coins, self.hours
            )));
        }
        Ok(())
    }
}

/// Coin and hour totals, always derived together.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub coins: Amount,
    pub hours: Amount,
}

impl Balance {
    pub const ZERO: Balance = Balance {
        coins: Amount::ZERO,
        hours: Amount::ZERO,
    };

    pub fn checked_add(self, other: Balance) -> ModelResult<Balance> {
        Ok(Balance {
            coins: self.coins.checked_add(other.coins)?,
            hours: self.hours.checked_add(other.hours)?,
        })
    }
}

/// Sum coins and hours over a set of outputs. The result does not depend on
/// iteration order.
pub fn derive_balance<'a, I>(outputs: I) -> ModelResult<Balance>
where
    I: IntoIterator<Item = &'a Output>,
{
    outputs.into_iter().try_fold(Balance::ZERO, |acc, output| {
        output.check_non_negative()?;
        acc.checked_add(Balance {
            coins: output.coins,
            hours: output.hours,
        })
    })
}

/// Outputs of an address together with the balance derived from them.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct AddressSnapshot {
    outputs: Vec<Output>,
    balance: Balance,
}

impl AddressSnapshot {
    fn derive(outputs: Vec<Output>) -> ModelResult<Self> {
        let balance = derive_balance(&outputs)?;
        Ok(Self { outputs, balance })
    }

    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    pub fn balance(&self) -> Balance {
        self.balance
    }
}

/// An address owned by a wallet. Outputs and balance are held in a single
/// shared snapshot that is replaced as a whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    address: String,
    snapshot: Arc<AddressSnapshot>,
}

impl Address {
    /// A freshly issued address with no outputs yet.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            snapshot: Arc::new(AddressSnapshot::default()),
        }
    }

    pub fn with_outputs(address: impl Into<String>, outputs: Vec<Output>) -> ModelResult<Self> {
        let mut addr = Self::new(address);
        addr.apply_outputs(outputs)?;
        Ok(addr)
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn coins(&self) -> Amount {
        self.snapshot.balance.coins
    }

    pub fn hours(&self) -> Amount {
        self.snapshot.balance.hours
    }

    pub fn balance(&self) -> Balance {
        self.snapshot.balance
    }

    pub fn outputs(&self) -> &[Output] {
        &self.snapshot.outputs
    }

    pub fn snapshot(&self) -> Arc<AddressSnapshot> {
        Arc::clone(&self.snapshot)
    }

    pub fn is_empty(&self) -> bool {
        self.coins().is_zero() && self.hours().is_zero()
    }

    /// Replace the outputs with a fresh set and re-derive the balance.
    /// On error the address is left untouched.
    pub fn apply_outputs(&mut self, outputs: Vec<Output>) -> ModelResult<()> {
        if let Some(foreign) = outputs.iter().find(|o| o.address != self.address) {
            return Err(ModelError::InvariantViolation(format!(
                "output {} belongs to {}, not {}",
                foreign.hash, foreign.address, self.address
            )));
        }

        let snapshot = AddressSnapshot::derive(outputs)?;
        tracing::debug!(
            address = %self.address,
            coins = %snapshot.balance.coins,
            hours = %snapshot.balance.hours,
            outputs = snapshot.outputs.len(),
            "Derived address balance"
        );
        self.snapshot = Arc::new(snapshot);
        Ok(())
    }

    pub fn verify(&self) -> ModelResult<()> {
        let derived = derive_balance(self.outputs())?;
        if derived != self.balance() {
            return Err(ModelError::InvariantViolation(format!(
                "address {} states {:?} but its outputs sum to {:?}",
                self.address,
                self.balance(),
                derived
            )));
        }
        Ok(())
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Address", 4)?;
        state.serialize_field("address", &self.address)?;
        state.serialize_field("coins", &self.coins())?;
        state.serialize_field("hours", &self.hours())?;
        state.serialize_field("outputs", self.outputs())?;
        state.end()
    }
}

/// A named collection of addresses identified by its file name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Wallet {
    pub label: String,
    filename: String,
    #[serde(flatten)]
    balance: Balance,
    addresses: Vec<Address>,
    pub encrypted: bool,
}

impl Wallet {
    pub fn new(label: impl Into<String>, filename: impl Into<String>, encrypted: bool) -> Self {
        Self {
            label: label.into(),
            filename: filename.into(),
            balance: Balance::ZERO,
            addresses: Vec::new(),
            encrypted,
        }
    }

    /// Build a wallet from a listing entry. Every address starts at zero
    /// until outputs are applied.
    pub fn from_listing(listing: &GetWalletsResponseWallet) -> ModelResult<Self> {
        Self::assemble(&[], listing)
    }

    /// Combine a fresh listing with what is already known about this wallet.
    /// Addresses that remain keep their outputs, new ones start at zero and
    /// addresses missing from the listing are dropped.
    pub fn merge_listing(&self, listing: &GetWalletsResponseWallet) -> ModelResult<Wallet> {
        if listing.meta.filename != self.filename {
            return Err(ModelError::InvariantViolation(format!(
                "listing for {} merged into wallet {}",
                listing.meta.filename, self.filename
            )));
        }
        Self::assemble(&self.addresses, listing)
    }

    fn assemble(known: &[Address], listing: &GetWalletsResponseWallet) -> ModelResult<Wallet> {
        let mut known: HashMap<&str, &Address> = known.iter().map(|a| (a.address(), a)).collect();

        let mut seen = HashSet::new();
        let mut addresses = Vec::with_capacity(listing.entries.len());
        for entry in &listing.entries {
            if !seen.insert(entry.address.as_str()) {
                return Err(ModelError::DuplicateAddress(entry.address.clone()));
            }
            let address = match known.remove(entry.address.as_str()) {
                Some(existing) => existing.clone(),
                None => Address::new(entry.address.clone()),
            };
            addresses.push(address);
        }

        let mut wallet = Wallet {
            label: listing.meta.label.clone(),
            filename: listing.meta.filename.clone(),
            balance: Balance::ZERO,
            addresses,
            encrypted: listing.meta.encrypted,
        };
        wallet.rederive()?;
        Ok(wallet)
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn coins(&self) -> Amount {
        self.balance.coins
    }

    pub fn hours(&self) -> Amount {
        self.balance.hours
    }

    pub fn balance(&self) -> Balance {
        self.balance
    }

    pub fn addresses(&self) -> &[Address] {
        &self.addresses
    }

    pub fn address(&self, address: &str) -> Option<&Address> {
        self.addresses.iter().find(|a| a.address() == address)
    }

    pub fn contains(&self, address: &str) -> bool {
        self.address(address).is_some()
    }

    pub fn address_set(&self) -> HashSet<String> {
        self.addresses
            .iter()
            .map(|a| a.address().to_string())
            .collect()
    }

    /// Append newly issued addresses with a zero balance. Known addresses are
    /// skipped. Returns how many were added.
    pub fn append_addresses<S: AsRef<str>>(&mut self, addresses: &[S]) -> usize {
        let mut added = 0;
        for address in addresses {
            let address = address.as_ref();
            if self.contains(address) {
                continue;
            }
            self.addresses.push(Address::new(address));
            added += 1;
        }
        added
    }

    pub fn remove_address(&mut self, address: &str) -> ModelResult<Option<Address>> {
        let Some(pos) = self.addresses.iter().position(|a| a.address() == address) else {
            return Ok(None);
        };
        let removed = self.addresses.remove(pos);
        self.rederive()?;
        Ok(Some(removed))
    }

    /// Replace the outputs of every address with a fresh full set. Addresses
    /// without outputs in the set drop to zero. Outputs for addresses the
    /// wallet does not own are rejected and nothing is changed.
    pub fn apply_outputs(&mut self, outputs: Vec<Output>) -> ModelResult<Balance> {
        let mut grouped: HashMap<String, Vec<Output>> = HashMap::new();
        for output in outputs {
            if !self.contains(&output.address) {
                return Err(ModelError::UnknownAddress {
                    filename: self.filename.clone(),
                    address: output.address,
                });
            }
            grouped.entry(output.address.clone()).or_default().push(output);
        }

        let mut addresses = self.addresses.clone();
        for address in &mut addresses {
            let outputs = grouped.remove(address.address()).unwrap_or_default();
            address.apply_outputs(outputs)?;
        }
        let balance = Self::fold(&addresses)?;

        self.addresses = addresses;
        self.balance = balance;
        Ok(balance)
    }

    /// Sum of the balances of every address; zero for an empty wallet.
    pub fn derive_balance(&self) -> ModelResult<Balance> {
        Self::fold(&self.addresses)
    }

    fn fold(addresses: &[Address]) -> ModelResult<Balance> {
        addresses
            .iter()
            .try_fold(Balance::ZERO, |acc, a| acc.checked_add(a.balance()))
    }

    fn rederive(&mut self) -> ModelResult<()> {
        self.balance = self.derive_balance()?;
        Ok(())
    }

    /// Recompute every aggregate and compare it with the stated balances.
    pub fn verify(&self) -> ModelResult<()> {
        for address in &self.addresses {
            address.verify()?;
        }
        let derived = self.derive_balance()?;
        if derived != self.balance {
            return Err(ModelError::InvariantViolation(format!(
                "wallet {} states {:?} but its addresses sum to {:?}",
                self.filename, self.balance, derived
            )));
        }
        Ok(())
    }
}

/// UI-only wallet flags. Nothing in the model depends on them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletPresentation {
    pub hide_empty: bool,
    pub opened: bool,
    pub is_hardware: bool,
    pub has_hw_security_warnings: bool,
    pub stop_showing_hw_security_popup: bool,
}

impl WalletPresentation {
    pub fn visible_addresses<'a>(&self, wallet: &'a Wallet) -> impl Iterator<Item = &'a Address> {
        let hide_empty = self.hide_empty;
        wallet
            .addresses()
            .iter()
            .filter(move |a| !(hide_empty && a.is_empty()))
    }
}

/// UI-only per-address flags, kept apart from [`Address`] like
/// [`WalletPresentation`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressPresentation {
    /// Set while the address is being copied to the clipboard.
    #[serde(default)]
    pub copying: bool,
}

/// A peer connection of the node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub id: u64,
    pub address: String,
    pub listen_port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}
