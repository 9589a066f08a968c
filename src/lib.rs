//! NovaMint Core - Transaction Ledger and Document Store
//!
//! # Guarantees
//! 1. The ledger is append-only; lines are never rewritten
//! 2. The server clock is the only source of ledger timestamps
//! 3. Escaped ledger lines parse back to the fields that were written
//! 4. Documents land on disk whole or not at all
//! 5. A purchase stays recorded even if its receipt cannot be rendered

pub mod config;
pub mod hashing;
pub mod ledger;
pub mod pdf;
pub mod presets;
pub mod render;
pub mod sanitize;
pub mod service;
pub mod store;
pub mod telemetry;

pub use config::{Config, ConfigError};
pub use ledger::{
    FileLedger, Ledger, LedgerEntry, LedgerError, LedgerReader, LedgerWriter, LineFormat,
    MemoryLedger, ParseError, Purchase, TransactionRecord,
};
pub use presets::{DocumentKind, Preset, PresetRegistry};
pub use render::{render_document, RenderError, RenderedDocument};
pub use sanitize::sanitize_filename;
pub use service::{
    ContractRequest, FieldInput, LedgerService, SavedDocument, ServiceError, TransactionRequest,
};
pub use store::{DocumentStore, StoreError, WritePolicy};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
