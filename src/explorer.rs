// SPDX-License-Identifier: Apache-2.0

//! Verified contract sources from block explorers.

use crate::config::{ChainConfig, Config, ExplorerKind};
use crate::contract::{key, ContractRecord, ContractSource, MemoryStore};
use crate::error::{Error, Result};
use async_trait::async_trait;
use itertools::Itertools;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct EtherscanResponse {
    status: String,
    result: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EtherscanContract {
    source_code: String,
    #[serde(rename = "ABI")]
    abi: String,
    contract_name: String,
    #[serde(default)]
    library: String,
}

/// Standard JSON compiler input, of which only the sources matter
#[derive(Debug, Deserialize)]
struct StandardInput {
    sources: BTreeMap<String, SourceContent>,
}

#[derive(Debug, Deserialize)]
struct SourceContent {
    content: String,
}

/// Split the `SourceCode` field of `getsourcecode` into files. It is either a single file,
/// standard JSON input wrapped in a second pair of braces, or a map of paths to sources.
fn etherscan_sources(contract_name: &str, source: &str) -> Vec<(String, String)> {
    if let Some(inner) = source
        .trim()
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
    {
        if let Ok(input) = serde_json::from_str::<StandardInput>(inner) {
            return input
                .sources
                .into_iter()
                .map(|(path, source)| (path, source.content))
                .collect();
        }

        if let Ok(sources) =
            serde_json::from_str::<BTreeMap<String, SourceContent>>(source.trim())
        {
            return sources
                .into_iter()
                .map(|(path, source)| (path, source.content))
                .collect();
        }
    }

    vec![(format!("/{contract_name}.sol"), source.to_owned())]
}

/// Records from an Etherscan `getsourcecode` response. Unverified contracts have none.
pub fn etherscan_records(address: &str, chain: &str, response: &str) -> Result<Vec<ContractRecord>> {
    let response: EtherscanResponse = serde_json::from_str(response)?;

    if response.status != "1" {
        return Err(Error::Explorer(match response.result {
            Value::String(message) => message,
            result => result.to_string(),
        }));
    }

    let contracts: Vec<EtherscanContract> = serde_json::from_value(response.result)?;

    let Some(contract) = contracts.into_iter().next() else {
        return Ok(Vec::new());
    };

    if contract.source_code.is_empty() {
        debug!("{address} on {chain} is not verified");
        return Ok(Vec::new());
    }

    let records = etherscan_sources(&contract.contract_name, &contract.source_code)
        .into_iter()
        .map(|(contract_path, source_code)| ContractRecord {
            address: address.to_owned(),
            chain: chain.to_owned(),
            contract_path,
            contract_name: contract.contract_name.clone(),
            source_code,
            library: contract.library.clone(),
            abi: Some(contract.abi.clone()),
        })
        .collect();

    Ok(records)
}

#[derive(Debug, Deserialize)]
struct BlockscoutContract {
    name: String,
    #[serde(default)]
    file_path: Option<String>,
    #[serde(default)]
    source_code: Option<String>,
    #[serde(default)]
    abi: Option<Value>,
    #[serde(default)]
    additional_sources: Vec<BlockscoutSource>,
    #[serde(default)]
    external_libraries: Vec<BlockscoutLibrary>,
}

#[derive(Debug, Deserialize)]
struct BlockscoutSource {
    file_path: String,
    source_code: String,
}

#[derive(Debug, Deserialize)]
struct BlockscoutLibrary {
    name: String,
    address_hash: String,
}

/// Records from a Blockscout v2 `smart-contracts/{address}` response
pub fn blockscout_records(address: &str, chain: &str, response: &str) -> Result<Vec<ContractRecord>> {
    let contract: BlockscoutContract = serde_json::from_str(response)?;

    let Some(source_code) = contract.source_code else {
        debug!("{address} on {chain} is not verified");
        return Ok(Vec::new());
    };

    let library = contract
        .external_libraries
        .iter()
        .map(|library| {
            format!(
                "{}:{}",
                library.name,
                library.address_hash.trim_start_matches("0x")
            )
        })
        .join(";");

    let abi = contract.abi.as_ref().map(Value::to_string);

    let record = |contract_path: String, source_code: String| ContractRecord {
        address: address.to_owned(),
        chain: chain.to_owned(),
        contract_path,
        contract_name: contract.name.clone(),
        source_code,
        library: library.clone(),
        abi: abi.clone(),
    };

    let main = contract
        .file_path
        .clone()
        .unwrap_or_else(|| format!("/{}.sol", contract.name));

    let mut records = vec![record(main, source_code)];

    for source in &contract.additional_sources {
        records.push(record(source.file_path.clone(), source.source_code.clone()));
    }

    Ok(records)
}

type Fetch = Arc<OnceCell<Vec<ContractRecord>>>;

/// Fetches verified contracts from the explorer configured for each chain, keeping what
/// it fetched for later lookups. Each address is fetched at most once, even when looked up
/// by several tasks at the same time; a fetch which fails is tried again on the next lookup.
pub struct ExplorerSource {
    config: Config,
    client: reqwest::Client,
    store: MemoryStore,
    fetches: Mutex<HashMap<(String, String), Fetch>>,
}

impl ExplorerSource {
    pub fn new(config: Config) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        ExplorerSource {
            config,
            client,
            store: MemoryStore::new(),
            fetches: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    async fn fetch(&self, address: &str, chain: &str) -> Result<Vec<ContractRecord>> {
        let config = self.config.chain(chain)?;

        info!("fetching {address} on {chain} from {}", config.explorer);

        match config.explorer_kind {
            ExplorerKind::Etherscan => {
                let apikey = api_key(chain, config)?;

                let body = self
                    .client
                    .get(format!("{}/api", config.explorer.trim_end_matches('/')))
                    .query(&[
                        ("module", "contract"),
                        ("action", "getsourcecode"),
                        ("address", address),
                        ("apikey", apikey.as_str()),
                    ])
                    .send()
                    .await?
                    .error_for_status()?
                    .text()
                    .await?;

                etherscan_records(address, chain, &body)
            }
            ExplorerKind::Blockscout => {
                let response = self
                    .client
                    .get(format!("{}/{address}", config.explorer.trim_end_matches('/')))
                    .send()
                    .await?;

                if response.status() == reqwest::StatusCode::NOT_FOUND {
                    debug!("{address} on {chain} has no contract");
                    return Ok(Vec::new());
                }

                let body = response.error_for_status()?.text().await?;

                blockscout_records(address, chain, &body)
            }
        }
    }
}

fn api_key(chain: &str, config: &ChainConfig) -> Result<String> {
    config
        .api_key_env
        .as_deref()
        .and_then(|var| std::env::var(var).ok())
        .filter(|key| !key.is_empty())
        .ok_or_else(|| Error::Config(format!("no API key for the explorer of {chain}")))
}

#[async_trait]
impl ContractSource for ExplorerSource {
    async fn contract_info(&self, address: &str, chain: &str) -> Result<Vec<ContractRecord>> {
        if let Some(records) = self.store.get(address, chain).await {
            return Ok(records);
        }

        let fetch = self
            .fetches
            .lock()
            .await
            .entry(key(address, chain))
            .or_default()
            .clone();

        // unverified contracts are remembered too, as an empty list
        let records = fetch
            .get_or_try_init(|| async {
                let records = self.fetch(address, chain).await?;

                if !records.is_empty() {
                    self.store.insert(address, chain, records.clone()).await;
                }

                Ok::<_, Error>(records)
            })
            .await?;

        Ok(records.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const ADDRESS: &str = "0x1111111111111111111111111111111111111111";

    #[test]
    fn etherscan_single_file() {
        let response = serde_json::json!({
            "status": "1",
            "message": "OK",
            "result": [{
                "SourceCode": "contract Token {}",
                "ABI": "[]",
                "ContractName": "Token",
                "Library": "Math:2222222222222222222222222222222222222222",
            }]
        });

        let records = etherscan_records(ADDRESS, "ethereum", &response.to_string()).unwrap();

        assert_eq!(
            records,
            vec![ContractRecord {
                address: ADDRESS.to_owned(),
                chain: "ethereum".to_owned(),
                contract_path: "/Token.sol".to_owned(),
                contract_name: "Token".to_owned(),
                source_code: "contract Token {}".to_owned(),
                library: "Math:2222222222222222222222222222222222222222".to_owned(),
                abi: Some("[]".to_owned()),
            }]
        );
    }

    #[test]
    fn etherscan_standard_json() {
        let input = serde_json::json!({
            "language": "Solidity",
            "sources": {
                "contracts/A.sol": { "content": "contract A {}" },
                "contracts/B.sol": { "content": "contract B {}" },
            },
            "settings": {}
        });

        let response = serde_json::json!({
            "status": "1",
            "message": "OK",
            "result": [{
                "SourceCode": format!("{{{input}}}"),
                "ABI": "[]",
                "ContractName": "A",
                "Library": "",
            }]
        });

        let records = etherscan_records(ADDRESS, "optimism", &response.to_string()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].contract_path, "contracts/A.sol");
        assert_eq!(records[1].source_code, "contract B {}");
        assert!(records.iter().all(|r| r.contract_name == "A"));
    }

    #[test]
    fn etherscan_unverified_and_errors() {
        let response = serde_json::json!({
            "status": "1",
            "message": "OK",
            "result": [{
                "SourceCode": "",
                "ABI": "Contract source code not verified",
                "ContractName": "",
                "Library": "",
            }]
        });

        assert!(etherscan_records(ADDRESS, "ethereum", &response.to_string())
            .unwrap()
            .is_empty());

        let response = serde_json::json!({
            "status": "0",
            "message": "NOTOK",
            "result": "Invalid API Key",
        });

        assert!(matches!(
            etherscan_records(ADDRESS, "ethereum", &response.to_string()),
            Err(Error::Explorer(message)) if message == "Invalid API Key"
        ));
    }

    #[test]
    fn blockscout_sources_and_libraries() {
        let response = serde_json::json!({
            "name": "Vault",
            "file_path": "src/Vault.sol",
            "source_code": "contract Vault {}",
            "abi": [],
            "additional_sources": [
                { "file_path": "src/Lib.sol", "source_code": "library Lib {}" }
            ],
            "external_libraries": [
                { "name": "Lib", "address_hash": "0x2222222222222222222222222222222222222222" },
                { "name": "Math", "address_hash": "0x3333333333333333333333333333333333333333" }
            ]
        });

        let records = blockscout_records(ADDRESS, "mode", &response.to_string()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].contract_path, "src/Vault.sol");
        assert_eq!(records[1].contract_path, "src/Lib.sol");
        assert_eq!(
            records[0].library,
            "Lib:2222222222222222222222222222222222222222;Math:3333333333333333333333333333333333333333"
        );
        assert_eq!(records[1].abi.as_deref(), Some("[]"));

        let unverified = serde_json::json!({ "name": "", "source_code": null });

        assert!(blockscout_records(ADDRESS, "mode", &unverified.to_string())
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn etherscan_needs_api_key() {
        let mut config = Config::default();

        config.chains.insert(
            "testnet".to_owned(),
            ChainConfig {
                rpc: "http://localhost:8545".to_owned(),
                explorer: "http://localhost:1".to_owned(),
                explorer_kind: ExplorerKind::Etherscan,
                api_key_env: Some("ADDRSCAN_TEST_KEY_WHICH_IS_NOT_SET".to_owned()),
            },
        );

        let explorer = ExplorerSource::new(config);

        assert!(matches!(
            explorer.contract_info(ADDRESS, "testnet").await,
            Err(Error::Config(_))
        ));
        assert!(matches!(
            explorer.contract_info(ADDRESS, "solana").await,
            Err(Error::UnknownChain(_))
        ));
        assert!(explorer.store().is_empty().await);
    }

    /// Serve `body` with `status` for every request, slowly enough for lookups to overlap.
    /// Returns the explorer url and the number of requests served.
    async fn counting_explorer(status: &'static str, body: String) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!(
            "http://{}/api/v2/smart-contracts",
            listener.local_addr().unwrap()
        );

        let hits = Arc::new(AtomicUsize::new(0));
        let served = hits.clone();

        tokio::spawn(async move {
            loop {
                let (mut socket, _) = listener.accept().await.unwrap();
                let body = body.clone();
                let served = served.clone();

                tokio::spawn(async move {
                    let mut request = Vec::new();
                    let mut buf = [0u8; 1024];

                    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                        let n = socket.read(&mut buf).await.unwrap();
                        if n == 0 {
                            return;
                        }
                        request.extend_from_slice(&buf[..n]);
                    }

                    served.fetch_add(1, Ordering::SeqCst);

                    tokio::time::sleep(Duration::from_millis(50)).await;

                    let response = format!(
                        "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                        body.len()
                    );

                    socket.write_all(response.as_bytes()).await.unwrap();
                });
            }
        });

        (url, hits)
    }

    fn local_chain(explorer: String) -> Config {
        let mut config = Config::default();

        config.chains.insert(
            "local".to_owned(),
            ChainConfig {
                rpc: "http://localhost:8545".to_owned(),
                explorer,
                explorer_kind: ExplorerKind::Blockscout,
                api_key_env: None,
            },
        );

        config
    }

    #[tokio::test]
    async fn concurrent_lookups_fetch_once() {
        let body = serde_json::json!({
            "name": "Vault",
            "source_code": "contract Vault {}",
            "abi": [],
        });

        let (url, hits) = counting_explorer("200 OK", body.to_string()).await;

        let explorer = ExplorerSource::new(local_chain(url));

        let (first, second) = tokio::join!(
            explorer.contract_info(ADDRESS, "local"),
            explorer.contract_info(ADDRESS, "local")
        );

        let first = first.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].contract_path, "/Vault.sol");
        assert_eq!(first, second.unwrap());
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        explorer.contract_info(ADDRESS, "local").await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(explorer.store().len().await, 1);
    }

    #[tokio::test]
    async fn unverified_contract_is_fetched_once() {
        let (url, hits) = counting_explorer("404 Not Found", "{}".to_owned()).await;

        let explorer = ExplorerSource::new(local_chain(url));

        let (first, second) = tokio::join!(
            explorer.contract_info(ADDRESS, "local"),
            explorer.contract_info(ADDRESS, "local")
        );

        assert!(first.unwrap().is_empty());
        assert!(second.unwrap().is_empty());

        assert!(explorer
            .contract_info(ADDRESS, "local")
            .await
            .unwrap()
            .is_empty());

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(explorer.store().is_empty().await);
    }
}
