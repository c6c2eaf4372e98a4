// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no contract found at {address} on {chain}")]
    ContractNotFound { address: String, chain: String },

    #[error("chain '{0}' is not configured")]
    UnknownChain(String),

    #[error("no function '{function}' returning a single address in the ABI of {address} on {chain}")]
    AbiNotFound {
        address: String,
        chain: String,
        function: String,
    },

    #[error("abi: {0}")]
    Abi(#[from] ethabi::Error),

    #[error("rpc: {0}")]
    Rpc(String),

    #[error("http: {0}")]
    Http(#[from] reqwest::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("explorer: {0}")]
    Explorer(String),

    #[error("call to {function} on {address} timed out")]
    Timeout { address: String, function: String },

    #[error("config: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
