//! Ledger and Document Invariant Tests
//!
//! These tests verify the guarantees callers rely on.

use std::path::Path;
use std::sync::Arc;

use novamint_core::{
    hashing::{sha256_file, verify_file},
    sanitize_filename, Config, ContractRequest, DocumentStore, FileLedger, Ledger,
    LedgerService, LineFormat, MemoryLedger, PresetRegistry, ServiceError, TransactionRequest,
};

fn file_service(dir: &Path, format: LineFormat) -> LedgerService<FileLedger> {
    let config = Config {
        data_dir: dir.to_path_buf(),
        line_format: format,
        ..Config::default()
    };
    LedgerService::from_config(&config).unwrap()
}

fn memory_service(dir: &Path, format: LineFormat) -> LedgerService<MemoryLedger> {
    LedgerService::new(
        MemoryLedger::new(),
        format,
        PresetRegistry::default(),
        DocumentStore::open(dir.join("contracts")).unwrap(),
        DocumentStore::open(dir.join("transactions")).unwrap(),
    )
}

fn purchase(item: &str, price: &str, buyer: &str, seller: &str) -> TransactionRequest {
    TransactionRequest {
        nft_name: Some(item.into()),
        price: Some(price.into()),
        buyer_info: Some(buyer.into()),
        seller_info: Some(seller.into()),
    }
}

fn file_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

#[test]
fn invariant_record_then_list_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let svc = file_service(dir.path(), LineFormat::Escaped);

    svc.record_transaction(purchase("Cosmic Cat", "0.5", "alice", "bob")).unwrap();
    svc.record_transaction(purchase("Neon Owl", "12", "carol", "dave")).unwrap();

    let entries = svc.list_transactions().unwrap();
    assert_eq!(entries.len(), 2);
    let last = entries.last().unwrap();
    assert_eq!(last.get("NFT"), Some("Neon Owl"));
    assert_eq!(last.get("Price"), Some("12 ETH"));
    assert_eq!(last.get("Buyer"), Some("carol"));
    assert_eq!(last.get("Seller"), Some("dave"));
    assert_eq!(last.get("Date").map(str::len), Some("YYYY-MM-DD HH:MM:SS".len()));

    // File order, oldest first
    assert_eq!(entries[0].get("NFT"), Some("Cosmic Cat"));
}

#[test]
fn invariant_missing_ledger_lists_empty() {
    let dir = tempfile::tempdir().unwrap();
    let svc = file_service(dir.path(), LineFormat::Escaped);
    assert!(svc.list_transactions().unwrap().is_empty());
    assert!(!dir.path().join("transactions.log").exists());
}

#[test]
fn invariant_unreadable_ledger_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("transactions.log")).unwrap();
    let svc = file_service(dir.path(), LineFormat::Escaped);

    let err = svc.list_transactions().unwrap_err();
    assert!(matches!(err, ServiceError::Ledger(_)));
    assert!(!err.is_client_error());
}

#[test]
fn invariant_empty_contract_rejected_without_writing() {
    let dir = tempfile::tempdir().unwrap();
    let svc = file_service(dir.path(), LineFormat::Escaped);

    let result = svc.save_contract(&ContractRequest {
        filename: Some("Token.sol".into()),
        code: String::new(),
    });

    assert!(matches!(result, Err(ServiceError::Validation(_))));
    assert_eq!(file_count(&dir.path().join("contracts")), 0);
}

#[test]
fn invariant_sanitizer_literal() {
    assert_eq!(sanitize_filename("My File!!.sol", ".sol", ".pdf"), "MyFile.pdf");
}

#[test]
fn invariant_contract_resave_overwrites() {
    let dir = tempfile::tempdir().unwrap();
    let svc = file_service(dir.path(), LineFormat::Escaped);
    let req = |code: &str| ContractRequest {
        filename: Some("Token.sol".into()),
        code: code.into(),
    };

    let first = svc.save_contract(&req("contract A {}")).unwrap();
    let second = svc.save_contract(&req("contract B {}")).unwrap();

    assert_eq!(first.path, second.path);
    assert_ne!(first.sha256, second.sha256);
    assert_eq!(sha256_file(&second.path).unwrap(), second.sha256);
    assert!(verify_file(&second.path, &second.sha256).unwrap());
    assert!(!verify_file(&second.path, &first.sha256).unwrap());
    assert_eq!(file_count(&dir.path().join("contracts")), 1);
}

#[test]
fn invariant_duplicates_accumulate() {
    let dir = tempfile::tempdir().unwrap();
    let svc = file_service(dir.path(), LineFormat::Escaped);

    let a = svc.record_transaction(purchase("Cat", "1", "alice", "bob")).unwrap();
    let b = svc.record_transaction(purchase("Cat", "1", "alice", "bob")).unwrap();

    let log = std::fs::read_to_string(dir.path().join("transactions.log")).unwrap();
    assert_eq!(log.lines().count(), 2);
    assert_eq!(svc.list_transactions().unwrap().len(), 2);

    // Receipts never clobber each other, even within the same second
    assert_ne!(a.filename, b.filename);
    assert_eq!(file_count(&dir.path().join("transactions")), 2);
}

#[test]
fn invariant_legacy_format_desynchronizes_on_comma() {
    let dir = tempfile::tempdir().unwrap();
    let svc = memory_service(dir.path(), LineFormat::Legacy);

    svc.record_transaction(purchase("Cat", "1", "Alice, Bob", "carol")).unwrap();
    svc.record_transaction(purchase("Dog", "2", "erin", "frank")).unwrap();

    let raw = svc.ledger().read_all().unwrap().unwrap();
    assert!(raw.contains("Buyer: Alice, Bob, Seller: carol"));

    // The damaged line is skipped; the healthy one survives
    let entries = svc.list_transactions().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].get("NFT"), Some("Dog"));
}

#[test]
fn invariant_escaped_format_survives_separators() {
    let dir = tempfile::tempdir().unwrap();
    let svc = memory_service(dir.path(), LineFormat::Escaped);

    svc.record_transaction(purchase("Cat: Deluxe", "1,5", "Alice, Bob", "line\nbreak")).unwrap();

    let raw = svc.ledger().read_all().unwrap().unwrap();
    assert_eq!(raw.lines().count(), 1);

    let records = svc.list_records().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].item_name, "Cat: Deluxe");
    assert_eq!(records[0].price, "1,5");
    assert_eq!(records[0].buyer, "Alice, Bob");
    assert_eq!(records[0].seller, "line\nbreak");
}

#[test]
fn invariant_empty_fields_list_back_in_both_formats() {
    for format in [LineFormat::Escaped, LineFormat::Legacy] {
        let dir = tempfile::tempdir().unwrap();
        let svc = file_service(dir.path(), format);

        svc.record_transaction(purchase("Cat", "1", "", "")).unwrap();

        let entries = svc.list_transactions().unwrap();
        assert_eq!(entries.len(), 1, "{:?}", format);
        assert_eq!(entries[0].get("Buyer"), Some(""));
        assert_eq!(entries[0].get("Seller"), Some(""));
    }
}

#[test]
fn invariant_receipt_failure_keeps_ledger_entry() {
    let dir = tempfile::tempdir().unwrap();
    let svc = file_service(dir.path(), LineFormat::Escaped);

    let result = svc.record_transaction(purchase("Rocket 🚀", "3", "alice", "bob"));

    assert!(matches!(result, Err(ServiceError::Render(_))));
    let entries = svc.list_transactions().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].get("NFT"), Some("Rocket 🚀"));
    assert_eq!(file_count(&dir.path().join("transactions")), 0);
}

#[test]
fn invariant_failed_contract_render_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let svc = file_service(dir.path(), LineFormat::Escaped);

    let result = svc.save_contract(&ContractRequest {
        filename: Some("Emoji.sol".into()),
        code: "// 😀".into(),
    });

    assert!(matches!(result, Err(ServiceError::Render(_))));
    assert_eq!(file_count(&dir.path().join("contracts")), 0);
}

#[test]
fn invariant_concurrent_appends_never_interleave() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = Arc::new(FileLedger::new(dir.path().join("transactions.log")));

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let ledger = Arc::clone(&ledger);
            std::thread::spawn(move || {
                let writer = novamint_core::LedgerWriter::new(ledger.as_ref(), LineFormat::Escaped);
                for i in 0..50 {
                    writer
                        .append(novamint_core::Purchase {
                            item_name: format!("item-{}-{}", t, i),
                            price: "1".into(),
                            buyer: "x".repeat(512),
                            seller: "seller".into(),
                        })
                        .unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let reader = novamint_core::LedgerReader::new(ledger.as_ref(), LineFormat::Escaped);
    let entries = reader.entries().unwrap();
    assert_eq!(entries.len(), 400);
    assert!(entries.iter().all(|e| e.len() == 5 && e.get("Seller") == Some("seller")));
}
