//! Ledger Service - single entry point for contract saves and purchases
//!
//! A purchase is recorded before its receipt is rendered. If the receipt
//! fails, the ledger line stays: the purchase counts as recorded.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{error, info};

use crate::config::Config;
use crate::hashing::short_digest;
use crate::ledger::{
    FileLedger, Ledger, LedgerEntry, LedgerError, LedgerReader, LedgerWriter, LineFormat,
    Purchase, TransactionRecord, CURRENCY, ITEM_SENTINEL, PRICE_SENTINEL, BUYER_SENTINEL,
    SELLER_SENTINEL,
};
use crate::presets::{DocumentKind, Preset, PresetRegistry};
use crate::render::{render_document, RenderError, RenderedDocument};
use crate::sanitize::{contract_document_name, receipt_stem, DOCUMENT_EXT};
use crate::store::{DocumentStore, StoreError, StoredFile, WritePolicy};

/// Filename assumed when a contract request names none
pub const DEFAULT_CONTRACT_FILENAME: &str = "contract.sol";

const RECEIPT_STAMP_FORMAT: &str = "%Y%m%d%H%M%S";

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Render failed: {0}")]
    Render(#[from] RenderError),

    #[error("Document store error: {0}")]
    Store(#[from] StoreError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("No preset registered for {0:?} documents")]
    MissingPreset(DocumentKind),
}

impl ServiceError {
    /// True when the caller sent a bad request, as opposed to a server fault
    pub fn is_client_error(&self) -> bool {
        matches!(self, ServiceError::Validation(_))
    }
}

/// A purchase field as sent by a client.
///
/// Strings are kept verbatim and numbers keep their JSON spelling. Any other
/// JSON value is stored as its compact JSON text. `null` counts as absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldInput {
    Text(String),
    Number(serde_json::Number),
    Other(serde_json::Value),
}

impl fmt::Display for FieldInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldInput::Text(s) => f.write_str(s),
            FieldInput::Number(n) => write!(f, "{}", n),
            FieldInput::Other(v) => write!(f, "{}", v),
        }
    }
}

impl From<String> for FieldInput {
    fn from(s: String) -> Self {
        FieldInput::Text(s)
    }
}

impl From<&str> for FieldInput {
    fn from(s: &str) -> Self {
        FieldInput::Text(s.to_string())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    #[serde(default)]
    pub nft_name: Option<FieldInput>,
    #[serde(default)]
    pub price: Option<FieldInput>,
    #[serde(default)]
    pub buyer_info: Option<FieldInput>,
    #[serde(default)]
    pub seller_info: Option<FieldInput>,
}

fn field_or(value: Option<FieldInput>, sentinel: &str) -> String {
    value.map_or_else(|| sentinel.to_string(), |v| v.to_string())
}

impl TransactionRequest {
    /// Absent fields become their sentinels; nothing is ever rejected.
    pub fn into_purchase(self) -> Purchase {
        Purchase {
            item_name: field_or(self.nft_name, ITEM_SENTINEL),
            price: field_or(self.price, PRICE_SENTINEL),
            buyer: field_or(self.buyer_info, BUYER_SENTINEL),
            seller: field_or(self.seller_info, SELLER_SENTINEL),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContractRequest {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub code: String,
}

/// Confirmation for a stored document
#[derive(Debug, Clone, Serialize)]
pub struct SavedDocument {
    pub kind: DocumentKind,
    pub filename: String,
    pub path: PathBuf,
    pub pages: usize,
    pub sha256: String,
    pub message: String,
}

/// Fixed receipt template; the date is the ledger's own timestamp.
pub fn receipt_body(record: &TransactionRecord) -> String {
    format!(
        "--- NovaMint Transaction Receipt ---\n\n\
         Item: {}\n\
         Price: {} {}\n\
         Seller: {}\n\
         Buyer: {}\n\
         Date: {}\n\n\
         This document certifies the simulated purchase of the above NFT.",
        record.item_name,
        record.price,
        CURRENCY,
        record.seller,
        record.buyer,
        record.formatted_timestamp(),
    )
}

/// `receipt_<item>_<YYYYmmddHHMMSS>.pdf`
pub fn receipt_filename(record: &TransactionRecord) -> String {
    format!(
        "receipt_{}_{}{}",
        receipt_stem(&record.item_name),
        record.timestamp.format(RECEIPT_STAMP_FORMAT),
        DOCUMENT_EXT
    )
}

pub struct LedgerService<L: Ledger = FileLedger> {
    ledger: L,
    line_format: LineFormat,
    presets: PresetRegistry,
    contracts: DocumentStore,
    receipts: DocumentStore,
}

impl LedgerService<FileLedger> {
    /// Wire a file-backed service from configuration, creating directories
    pub fn from_config(config: &Config) -> Result<Self, ServiceError> {
        let contracts = DocumentStore::open(config.contracts_path())?;
        let receipts = DocumentStore::open(config.transactions_path())?;
        info!(
            ledger = %config.ledger_path().display(),
            contracts = %contracts.dir().display(),
            receipts = %receipts.dir().display(),
            "ledger service ready"
        );
        Ok(Self::new(
            FileLedger::new(config.ledger_path()),
            config.line_format,
            PresetRegistry::with_title(&config.document_title),
            contracts,
            receipts,
        ))
    }
}

impl<L: Ledger> LedgerService<L> {
    pub fn new(
        ledger: L,
        line_format: LineFormat,
        presets: PresetRegistry,
        contracts: DocumentStore,
        receipts: DocumentStore,
    ) -> Self {
        Self {
            ledger,
            line_format,
            presets,
            contracts,
            receipts,
        }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    fn preset(&self, kind: DocumentKind) -> Result<&Preset, ServiceError> {
        self.presets.get(kind).ok_or(ServiceError::MissingPreset(kind))
    }

    /// Render and store a contract document.
    ///
    /// Empty code is rejected before anything is written. A colliding
    /// filename replaces the earlier document.
    pub fn save_contract(&self, request: &ContractRequest) -> Result<SavedDocument, ServiceError> {
        if request.code.is_empty() {
            return Err(ServiceError::Validation("Contract code is required".into()));
        }

        let source_name = request
            .filename
            .as_deref()
            .unwrap_or(DEFAULT_CONTRACT_FILENAME);
        let filename = contract_document_name(source_name);

        let doc = render_document(self.preset(DocumentKind::Contract)?, &request.code)?;
        let stored = self.contracts.save(&filename, &doc.bytes, WritePolicy::Overwrite)?;

        info!(
            file = %stored.filename,
            pages = doc.pages,
            sha256 = short_digest(&doc.sha256),
            "contract saved"
        );
        Ok(SavedDocument {
            kind: DocumentKind::Contract,
            message: format!("Contract saved as {} in the backend.", stored.filename),
            filename: stored.filename,
            path: stored.path,
            pages: doc.pages,
            sha256: doc.sha256,
        })
    }

    /// Append a purchase to the ledger, then render its receipt.
    ///
    /// A receipt failure is returned to the caller but the ledger line is
    /// not rolled back.
    pub fn record_transaction(
        &self,
        request: TransactionRequest,
    ) -> Result<SavedDocument, ServiceError> {
        let record = LedgerWriter::new(&self.ledger, self.line_format).append(request.into_purchase())?;

        let (stored, doc) = match self.write_receipt(&record) {
            Ok(ok) => ok,
            Err(e) => {
                error!(
                    item = %record.item_name,
                    recorded = true,
                    error = %e,
                    "receipt generation failed after ledger append"
                );
                return Err(e);
            }
        };

        info!(
            file = %stored.filename,
            sha256 = short_digest(&doc.sha256),
            "receipt saved"
        );
        Ok(SavedDocument {
            kind: DocumentKind::Receipt,
            message: format!(
                "Transaction recorded and receipt saved as {}.",
                stored.filename
            ),
            filename: stored.filename,
            path: stored.path,
            pages: doc.pages,
            sha256: doc.sha256,
        })
    }

    fn write_receipt(
        &self,
        record: &TransactionRecord,
    ) -> Result<(StoredFile, RenderedDocument), ServiceError> {
        let doc = render_document(self.preset(DocumentKind::Receipt)?, &receipt_body(record))?;
        let stored = self
            .receipts
            .save(&receipt_filename(record), &doc.bytes, WritePolicy::Unique)?;
        Ok((stored, doc))
    }

    /// Ledger history as label mappings, oldest first
    pub fn list_transactions(&self) -> Result<Vec<LedgerEntry>, ServiceError> {
        Ok(LedgerReader::new(&self.ledger, self.line_format).entries()?)
    }

    /// Typed ledger history, oldest first
    pub fn list_records(&self) -> Result<Vec<TransactionRecord>, ServiceError> {
        Ok(LedgerReader::new(&self.ledger, self.line_format).records()?)
    }
}
