// SPDX-License-Identifier: Apache-2.0

//! Find the places in Solidity source where a blockchain address is produced, and resolve
//! the address each of them stands for.
//!
//! An address can be written as a literal, held in a local or storage variable initialized
//! with a literal, or returned by a call into another deployed contract or a linked library.
//! The first three are found from the source alone; calls are made against the chain.
//!
//! ```no_run
//! use addrscan::{ContractRecord, MemoryStore, Resolver, RpcCaller, Config};
//! use std::sync::Arc;
//!
//! # async fn run(record: ContractRecord) {
//! let resolver = Resolver::new(
//!     Arc::new(MemoryStore::with_records([record.clone()])),
//!     Arc::new(RpcCaller::new(Config::default())),
//! );
//!
//! for reference in resolver.get_addresses(&record).await {
//!     println!("{}:{} {}", reference.loc_start_line, reference.loc_start_col, reference.address());
//! }
//! # }
//! ```

pub mod abi;
pub mod address;
pub mod ast;
pub mod collect;
pub mod config;
pub mod contract;
pub mod error;
pub mod explorer;
pub mod file;
pub mod library;
pub mod parse;
pub mod pipeline;
pub mod references;
pub mod resolve;
pub mod rpc;
pub mod symtable;

pub use solang_parser as parser;

pub use config::Config;
pub use contract::{ContractRecord, ContractSource, MemoryStore};
pub use error::{Error, Result};
pub use explorer::ExplorerSource;
pub use pipeline::{Analysis, Options, Report, Resolver};
pub use references::{AddressReference, CallRequest, Resolution, Source};
pub use rpc::{ContractCaller, RpcCaller};
