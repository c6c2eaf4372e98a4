// SPDX-License-Identifier: Apache-2.0

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// One verified source file of a deployed contract
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractRecord {
    pub address: String,
    pub chain: String,
    pub contract_path: String,
    pub contract_name: String,
    pub source_code: String,
    /// Linked libraries as `name:hexAddressWithout0x` pairs separated by `;`, possibly empty
    #[serde(default)]
    pub library: String,
    /// The contract ABI as JSON
    #[serde(default)]
    pub abi: Option<String>,
}

/// Where contract sources, ABIs and library linkage come from.
///
/// Implementations may fetch from the network on first use; the resolver does not care.
#[async_trait]
pub trait ContractSource: Send + Sync {
    /// Every source file of the contract deployed at `address`, or an empty list if there is
    /// no verified contract there.
    async fn contract_info(&self, address: &str, chain: &str) -> Result<Vec<ContractRecord>>;
}

pub(crate) fn key(address: &str, chain: &str) -> (String, String) {
    (address.to_ascii_lowercase(), chain.to_owned())
}

/// Contract records held in memory, keyed by address (case insensitive) and chain
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<(String, String), Vec<ContractRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    /// Build a store from records, grouping files of the same contract
    pub fn with_records(records: impl IntoIterator<Item = ContractRecord>) -> Self {
        let mut map: HashMap<(String, String), Vec<ContractRecord>> = HashMap::new();

        for record in records {
            map.entry(key(&record.address, &record.chain))
                .or_default()
                .push(record);
        }

        MemoryStore {
            records: RwLock::new(map),
        }
    }

    pub async fn get(&self, address: &str, chain: &str) -> Option<Vec<ContractRecord>> {
        self.records.read().await.get(&key(address, chain)).cloned()
    }

    /// Store all files of one contract, replacing anything stored before
    pub async fn insert(&self, address: &str, chain: &str, records: Vec<ContractRecord>) {
        self.records
            .write()
            .await
            .insert(key(address, chain), records);
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl ContractSource for MemoryStore {
    async fn contract_info(&self, address: &str, chain: &str) -> Result<Vec<ContractRecord>> {
        Ok(self.get(address, chain).await.unwrap_or_default())
    }
}
