//! NovaMint CLI - local bridge to the ledger service
//!
//! Commands: save-contract, record, list, presets, sanitize, verify
//! Outputs JSON to stdout
//! Returns 2 on validation failure or digest mismatch, 1 on any other failure

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use novamint_core::{
    hashing::verify_file, sanitize::contract_document_name, telemetry, Config, ContractRequest,
    LedgerService, PresetRegistry, SavedDocument, ServiceError, TransactionRequest,
};

#[derive(Parser)]
#[command(name = "novamint-cli")]
#[command(about = "NovaMint CLI - transaction ledger and document store", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the data directory from the config
    #[arg(short, long)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Render contract source into a document
    SaveContract {
        /// Source filename, e.g. Token.sol
        #[arg(short, long)]
        filename: Option<String>,

        /// Contract source text
        #[arg(long, conflicts_with = "code_file")]
        code: Option<String>,

        /// Read contract source from a file
        #[arg(long)]
        code_file: Option<PathBuf>,
    },

    /// Record a simulated purchase and render its receipt
    Record {
        #[arg(long)]
        nft: Option<String>,

        /// Stored verbatim, numeric or not
        #[arg(long)]
        price: Option<String>,

        #[arg(long)]
        buyer: Option<String>,

        #[arg(long)]
        seller: Option<String>,
    },

    /// Print the ledger history
    List {
        /// Newest first instead of file order
        #[arg(long)]
        recent_first: bool,
    },

    /// List rendering presets
    Presets,

    /// Show the document name a contract filename maps to
    Sanitize {
        name: String,
    },

    /// Check a stored document against the digest reported when it was saved
    Verify {
        path: PathBuf,

        /// Expected SHA-256, hex
        #[arg(long)]
        sha256: String,
    },
}

fn load_config(config: Option<&Path>, data_dir: Option<PathBuf>) -> anyhow::Result<Config> {
    let mut config = match config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(dir) = data_dir {
        config.data_dir = dir;
    }
    config.validate()?;
    Ok(config)
}

fn open_service(config: anyhow::Result<Config>) -> Result<LedgerService, ExitCode> {
    config
        .and_then(|c| Ok(LedgerService::from_config(&c)?))
        .map_err(|e| {
            print_json(&serde_json::json!({
                "success": false,
                "error": format!("Failed to start: {:#}", e),
            }));
            ExitCode::FAILURE
        })
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("failed to encode output: {}", e),
    }
}

fn failure(error: &ServiceError) -> ExitCode {
    print_json(&serde_json::json!({
        "success": false,
        "error": error.to_string(),
    }));
    if error.is_client_error() {
        ExitCode::from(2)
    } else {
        ExitCode::FAILURE
    }
}

fn saved(result: Result<SavedDocument, ServiceError>) -> ExitCode {
    match result {
        Ok(saved) => {
            print_json(&serde_json::json!({ "success": true, "document": saved }));
            ExitCode::SUCCESS
        }
        Err(e) => failure(&e),
    }
}

fn main() -> ExitCode {
    telemetry::init_tracing("warn");
    let Cli { command, config, data_dir } = Cli::parse();
    let load = || load_config(config.as_deref(), data_dir.clone());

    match command {
        Commands::SaveContract { filename, code, code_file } => {
            let service = match open_service(load()) {
                Ok(s) => s,
                Err(exit) => return exit,
            };
            let code = match (code, code_file) {
                (Some(code), _) => code,
                (None, Some(path)) => match std::fs::read_to_string(&path) {
                    Ok(code) => code,
                    Err(e) => {
                        print_json(&serde_json::json!({
                            "success": false,
                            "error": format!("Failed to read {}: {}", path.display(), e),
                        }));
                        return ExitCode::FAILURE;
                    }
                },
                (None, None) => String::new(),
            };
            saved(service.save_contract(&ContractRequest { filename, code }))
        }

        Commands::Record { nft, price, buyer, seller } => {
            let service = match open_service(load()) {
                Ok(s) => s,
                Err(exit) => return exit,
            };
            saved(service.record_transaction(TransactionRequest {
                nft_name: nft.map(Into::into),
                price: price.map(Into::into),
                buyer_info: buyer.map(Into::into),
                seller_info: seller.map(Into::into),
            }))
        }

        Commands::List { recent_first } => {
            let service = match open_service(load()) {
                Ok(s) => s,
                Err(exit) => return exit,
            };
            match service.list_transactions() {
                Ok(mut entries) => {
                    if recent_first {
                        entries.reverse();
                    }
                    print_json(&serde_json::json!(entries));
                    ExitCode::SUCCESS
                }
                Err(e) => failure(&e),
            }
        }

        Commands::Presets => {
            let title = match load() {
                Ok(config) => config.document_title,
                Err(e) => {
                    print_json(&serde_json::json!({ "success": false, "error": format!("{:#}", e) }));
                    return ExitCode::FAILURE;
                }
            };
            let registry = PresetRegistry::with_title(&title);
            let mut presets = registry.list();
            presets.sort_by_key(|p| p.kind.as_str());
            print_json(&serde_json::json!(presets));
            ExitCode::SUCCESS
        }

        Commands::Sanitize { name } => {
            print_json(&serde_json::json!({ "filename": contract_document_name(&name) }));
            ExitCode::SUCCESS
        }

        Commands::Verify { path, sha256 } => match verify_file(&path, &sha256) {
            Ok(matches) => {
                print_json(&serde_json::json!({ "path": path, "matches": matches }));
                if matches {
                    ExitCode::SUCCESS
                } else {
                    ExitCode::from(2)
                }
            }
            Err(e) => {
                print_json(&serde_json::json!({
                    "success": false,
                    "error": format!("Failed to read {}: {}", path.display(), e),
                }));
                ExitCode::FAILURE
            }
        },
    }
}
