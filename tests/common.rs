#![allow(dead_code)]

use std::collections::HashSet;

use coinhours::dto::{GetWalletsResponseEntry, GetWalletsResponseMeta, GetWalletsResponseWallet};
use coinhours::transaction::NormalDetails;
use coinhours::{Amount, Output, Transaction};

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("coinhours=debug")
        .with_test_writer()
        .try_init()
        .ok();
}

pub fn amount(s: &str) -> Amount {
    s.parse().expect("valid amount")
}

pub fn output(address: &str, coins: &str, hours: &str, hash: &str) -> Output {
    Output::new(address, amount(coins), amount(hours), hash)
}

pub fn txid(n: u64) -> String {
    format!("{n:064x}")
}

pub fn addresses(list: &[&str]) -> HashSet<String> {
    list.iter().map(|a| a.to_string()).collect()
}

pub fn listing(label: &str, filename: &str, entries: &[&str]) -> GetWalletsResponseWallet {
    GetWalletsResponseWallet {
        meta: GetWalletsResponseMeta {
            label: label.to_string(),
            filename: filename.to_string(),
            encrypted: false,
        },
        entries: entries
            .iter()
            .map(|a| GetWalletsResponseEntry {
                address: a.to_string(),
            })
            .collect(),
    }
}

pub fn pending(n: u64, inputs: Vec<Output>, outputs: Vec<Output>, timestamp: i64) -> Transaction {
    Transaction::normal(
        txid(n),
        inputs,
        outputs,
        NormalDetails::pending(Vec::new(), timestamp),
    )
    .expect("valid transaction")
}

pub fn confirmed(
    n: u64,
    inputs: Vec<Output>,
    outputs: Vec<Output>,
    timestamp: i64,
    block: u64,
) -> Transaction {
    Transaction::normal(
        txid(n),
        inputs,
        outputs,
        NormalDetails::confirmed(Vec::new(), timestamp, block),
    )
    .expect("valid transaction")
}
