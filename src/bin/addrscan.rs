// SPDX-License-Identifier: Apache-2.0

use addrscan::{
    Config, ContractCaller, ContractRecord, Error, ExplorerSource, MemoryStore, Options, Resolver,
    Result, RpcCaller,
};
use async_trait::async_trait;
use clap::{builder::ValueParser, ArgAction, Args, Parser, Subcommand};
use ethabi::Function;
use serde::Serialize;
use std::{path::PathBuf, process::exit, sync::Arc};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = env!("CARGO_PKG_DESCRIPTION"), subcommand_required = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "List the address references of a local Solidity file, without network access")]
    Scan(Scan),

    #[command(about = "Fetch a verified contract and resolve its address references")]
    Resolve(Resolve),
}

#[derive(Args)]
struct Scan {
    #[arg(name = "INPUT", help = "Solidity source file", required = true, value_parser = ValueParser::path_buf())]
    file: PathBuf,

    #[arg(name = "CONTRACT", help = "Contract name to report (defaults to the file name)", long = "contract-name", num_args = 1)]
    contract_name: Option<String>,

    #[arg(name = "PRETTY", help = "pretty print the json", long = "pretty", action = ArgAction::SetTrue)]
    pretty: bool,

    #[arg(name = "VERBOSE", help = "show debug messages", short = 'v', long = "verbose", action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Args)]
struct Resolve {
    #[arg(name = "ADDRESS", help = "Address of the deployed contract", required = true)]
    address: String,

    #[arg(name = "CHAIN", help = "Chain the contract is deployed on", long = "chain", short = 'c', num_args = 1, default_value = "ethereum")]
    chain: String,

    #[arg(name = "CONFFILE", help = "Take chains and resolver settings from configuration file", long = "config", num_args = 1, value_parser = ValueParser::path_buf())]
    config: Option<PathBuf>,

    #[arg(name = "PRETTY", help = "pretty print the json", long = "pretty", action = ArgAction::SetTrue)]
    pretty: bool,

    #[arg(name = "VERBOSE", help = "show debug messages", short = 'v', long = "verbose", action = ArgAction::SetTrue)]
    verbose: bool,
}

/// Refuses every call; without a network only the source itself can be used
struct Offline;

#[async_trait]
impl ContractCaller for Offline {
    async fn call_address(
        &self,
        chain: &str,
        address: &str,
        function: &Function,
        _args: &[String],
    ) -> Result<String> {
        Err(Error::Rpc(format!(
            "not calling {address}.{} on {chain} offline",
            function.name
        )))
    }
}

fn main() {
    let cli = Cli::parse();

    let verbose = match &cli.command {
        Commands::Scan(scan) => scan.verbose,
        Commands::Resolve(resolve) => resolve.verbose,
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("error: {err}");
            exit(1);
        }
    };

    let res = runtime.block_on(async {
        match cli.command {
            Commands::Scan(scan) => scan_file(scan).await,
            Commands::Resolve(resolve) => resolve_contract(resolve).await,
        }
    });

    if let Err(err) = res {
        eprintln!("error: {err}");
        exit(1);
    }
}

fn print<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };

    println!("{json}");

    Ok(())
}

async fn scan_file(scan: Scan) -> Result<()> {
    let source_code = std::fs::read_to_string(&scan.file)?;

    let contract_name = scan.contract_name.unwrap_or_else(|| {
        scan.file
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    });

    let record = ContractRecord {
        contract_path: scan.file.display().to_string(),
        contract_name,
        source_code,
        ..Default::default()
    };

    let resolver = Resolver::new(Arc::new(MemoryStore::new()), Arc::new(Offline));

    let references = resolver.get_addresses(&record).await;

    print(&references, scan.pretty)
}

async fn resolve_contract(resolve: Resolve) -> Result<()> {
    let config = match &resolve.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    // fail early, before anything is fetched
    config.chain(&resolve.chain)?;

    let options = Options::from(&config.resolver);

    let resolver = Resolver::new(
        Arc::new(ExplorerSource::new(config.clone())),
        Arc::new(RpcCaller::new(config)),
    )
    .with_options(options);

    let files = resolver
        .addresses_by_path(&resolve.address, &resolve.chain)
        .await?;

    print(&files, resolve.pretty)
}
