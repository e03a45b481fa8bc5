mod common;

use std::sync::Arc;
use std::thread;

use coinhours::dto::{UnspentOutputsResponse, WalletEvent};
use coinhours::{derive_balance, Address, Balance, ModelError, Wallet, WalletStore};

use common::{amount, listing, output};

/// Every permutation of `items`, in no particular order.
fn permutations<T: Clone>(items: &[T]) -> Vec<Vec<T>> {
    if items.len() <= 1 {
        return vec![items.to_vec()];
    }
    let mut result = Vec::new();
    for i in 0..items.len() {
        let mut rest = items.to_vec();
        let head = rest.remove(i);
        for mut tail in permutations(&rest) {
            tail.insert(0, head.clone());
            result.push(tail);
        }
    }
    result
}

#[test]
fn two_outputs_sum_to_address_balance() {
    common::init_tracing();

    let outputs = vec![
        output("A1", "10", "2", "h1"),
        output("A1", "5", "1", "h2"),
    ];
    let addr = Address::with_outputs("A1", outputs).unwrap();

    assert_eq!(addr.coins(), amount("15"));
    assert_eq!(addr.hours(), amount("3"));
    assert_eq!(addr.coins().to_string(), "15");
    assert_eq!(addr.hours().to_string(), "3");
}

#[test]
fn derivation_ignores_output_order() {
    let outputs = vec![
        output("A1", "0.000001", "0", "h1"),
        output("A1", "12.5", "7", "h2"),
        output("A1", "9007199254740993", "1", "h3"),
        output("A1", "0.1", "2", "h4"),
        output("A1", "0.2", "40", "h5"),
    ];
    let expected = derive_balance(&outputs).unwrap();
    assert_eq!(expected.coins, amount("9007199254741005.800001"));
    assert_eq!(expected.hours, amount("50"));

    for permutation in permutations(&outputs) {
        assert_eq!(derive_balance(&permutation).unwrap(), expected);
    }
}

#[test]
fn address_without_outputs_is_zero() {
    let addr = Address::with_outputs("A1", Vec::new()).unwrap();
    assert_eq!(addr.balance(), Balance::ZERO);
    assert_eq!(addr.coins().to_string(), "0");
    assert_eq!(addr.hours().to_string(), "0");
}

#[test]
fn empty_wallet_is_zero() {
    let wallet = Wallet::new("Empty", "empty.wlt", false);
    assert_eq!(wallet.derive_balance().unwrap(), Balance::ZERO);
    assert_eq!(wallet.balance(), Balance::ZERO);
    wallet.verify().unwrap();
}

#[test]
fn wallet_matches_its_addresses_after_every_change() {
    let check = |wallet: &Wallet| {
        let coins = wallet
            .addresses()
            .iter()
            .fold(amount("0"), |acc, a| acc.checked_add(a.coins()).unwrap());
        let hours = wallet
            .addresses()
            .iter()
            .fold(amount("0"), |acc, a| acc.checked_add(a.hours()).unwrap());
        assert_eq!(wallet.coins(), coins);
        assert_eq!(wallet.hours(), hours);
        wallet.verify().unwrap();
    };

    let mut wallet = Wallet::from_listing(&listing("Main", "main.wlt", &["A1", "A2"])).unwrap();
    check(&wallet);

    wallet
        .apply_outputs(vec![
            output("A1", "10", "2", "h1"),
            output("A2", "0.5", "1", "h2"),
            output("A1", "5", "1", "h3"),
        ])
        .unwrap();
    check(&wallet);
    assert_eq!(wallet.coins().to_string(), "15.5");

    wallet.append_addresses(&["A3"]);
    check(&wallet);

    wallet.apply_outputs(vec![output("A3", "1", "1", "h4")]).unwrap();
    check(&wallet);
    assert_eq!(wallet.coins().to_string(), "1");

    wallet.remove_address("A3").unwrap();
    check(&wallet);
    assert_eq!(wallet.balance(), Balance::ZERO);

    let wallet = wallet
        .merge_listing(&listing("Renamed", "main.wlt", &["A2", "A4"]))
        .unwrap();
    check(&wallet);
    assert_eq!(wallet.label, "Renamed");
}

#[test]
fn negative_output_is_rejected() {
    let err = derive_balance(&[output("A1", "-1", "0", "h1")]).unwrap_err();
    assert!(matches!(err, ModelError::InvariantViolation(_)));
}

#[test]
fn store_rejects_outputs_beyond_precision() {
    let store = WalletStore::default();
    assert!(store.sync_wallets(&[listing("Main", "main.wlt", &["A1"])]).is_ok());

    let response = UnspentOutputsResponse {
        head_outputs: vec![output("A1", "1.0000001", "1", "h1")],
    };
    let err = store.apply_outputs("main.wlt", &response).unwrap_err();
    assert!(matches!(err, ModelError::InvariantViolation(_)));

    let response = UnspentOutputsResponse {
        head_outputs: vec![output("A1", "1", "1.5", "h1")],
    };
    assert!(store.apply_outputs("main.wlt", &response).is_err());
    assert_eq!(store.wallet("main.wlt").unwrap().balance(), Balance::ZERO);
}

#[test]
fn store_emits_event_only_when_balance_changes() {
    let store = WalletStore::default();
    store.sync_wallets(&[listing("Main", "main.wlt", &["A1"])]);

    let response = UnspentOutputsResponse {
        head_outputs: vec![output("A1", "3", "1", "h1")],
    };
    let event = store.apply_outputs("main.wlt", &response).unwrap();
    match event {
        Some(WalletEvent::BalanceChanged { filename, balance }) => {
            assert_eq!(filename, "main.wlt");
            assert_eq!(balance.coins, amount("3"));
        }
        other => panic!("expected balance event, got {other:?}"),
    }

    assert!(store.apply_outputs("main.wlt", &response).unwrap().is_none());
}

#[test]
fn readers_never_see_partial_updates() {
    common::init_tracing();

    let store = Arc::new(WalletStore::default());
    store.sync_wallets(&[listing("Main", "main.wlt", &["A1", "A2"])]);

    let writer = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for i in 1..=200u64 {
                let response = UnspentOutputsResponse {
                    head_outputs: vec![
                        output("A1", &i.to_string(), &(i * 2).to_string(), "h1"),
                        output("A2", "1", &i.to_string(), "h2"),
                    ],
                };
                store.apply_outputs("main.wlt", &response).unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..500 {
                    let wallet = store.wallet("main.wlt").unwrap();
                    wallet.verify().unwrap();

                    let a1 = wallet.address("A1").unwrap();
                    // Hours of A1 are always twice its coins.
                    assert_eq!(
                        a1.hours(),
                        a1.coins().checked_add(a1.coins()).unwrap()
                    );
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }

    let wallet = store.wallet("main.wlt").unwrap();
    assert_eq!(wallet.coins().to_string(), "201");
    assert_eq!(wallet.hours().to_string(), "600");
}
