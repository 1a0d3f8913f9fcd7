mod common;

use budgetbook::storage::LedgerStore;
use budgetbook::{CurrencyCode, JsonStore, LedgerEngine, Transaction};
use common::{date, usd};

fn store_path(dir: &tempfile::TempDir) -> std::path::PathBuf {
    dir.path().join("ledger.json")
}

#[test]
fn json_store_round_trips_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = store_path(&dir);

    {
        let engine = LedgerEngine::new(JsonStore::open(&path).unwrap());
        let account = engine
            .create_account("Checking", CurrencyCode::new("USD"), 0)
            .unwrap();
        engine
            .record_transaction(account.id, None, usd(1234), date(2026, 1, 1), None)
            .unwrap();
    }

    let reopened = LedgerEngine::new(JsonStore::open(&path).unwrap());
    let accounts = reopened.list_accounts(true).unwrap();
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0].balance_minor_units, 1234);
    assert_eq!(reopened.list_transactions(true).unwrap().len(), 1);
}

#[test]
fn json_store_rollback_leaves_the_file_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = store_path(&dir);

    let store = JsonStore::open(&path).unwrap();
    let account = budgetbook::Account::new("Checking", CurrencyCode::new("USD"), 0);
    store.save_account(&account).unwrap();

    store.begin_scope().unwrap();
    let txn = Transaction::new(account.id, None, usd(100), date(2026, 1, 1));
    store.save_transaction(&txn).unwrap();
    store.rollback_scope().unwrap();

    let reopened = JsonStore::open(&path).unwrap();
    assert!(reopened.load_transactions().unwrap().is_empty());
    assert_eq!(reopened.load_accounts().unwrap().len(), 1);
}

#[test]
fn open_repairs_drift_left_by_a_partial_write() {
    let dir = tempfile::tempdir().unwrap();
    let path = store_path(&dir);

    let account_id = {
        let store = JsonStore::open(&path).unwrap();
        let account = budgetbook::Account::new("Checking", CurrencyCode::new("USD"), 500);
        store.save_account(&account).unwrap();
        // A transaction written without its balance update, as a crash
        // between the two would leave it.
        let txn = Transaction::new(account.id, None, usd(300), date(2026, 1, 1));
        store.save_transaction(&txn).unwrap();
        account.id
    };

    let engine = LedgerEngine::open(JsonStore::open(&path).unwrap()).unwrap();
    assert_eq!(engine.account_balance(account_id).unwrap().minor_units, 800);
}

#[test]
fn scoped_writes_stay_invisible_to_other_threads_until_commit() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonStore::open(store_path(&dir)).unwrap();

    store.begin_scope().unwrap();
    let account = budgetbook::Account::new("Staged", CurrencyCode::new("USD"), 0);
    store.save_account(&account).unwrap();
    assert_eq!(store.load_accounts().unwrap().len(), 1);
    std::thread::scope(|s| {
        let seen = s.spawn(|| store.load_accounts().unwrap().len());
        assert_eq!(seen.join().unwrap(), 0);
    });

    store.commit_scope().unwrap();
    std::thread::scope(|s| {
        let seen = s.spawn(|| store.load_accounts().unwrap().len());
        assert_eq!(seen.join().unwrap(), 1);
    });
}

#[test]
fn missing_file_opens_as_an_empty_ledger() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonStore::open(store_path(&dir)).unwrap();
    assert!(store.load_accounts().unwrap().is_empty());
    assert!(store.load_budgets().unwrap().is_empty());
}
