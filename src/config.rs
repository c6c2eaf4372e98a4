// SPDX-License-Identifier: Apache-2.0

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Which block explorer API a chain's explorer speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExplorerKind {
    /// `GET {explorer}/api?module=contract&action=getsourcecode`
    Etherscan,
    /// `GET {explorer}/{address}` on the v2 smart-contracts API
    Blockscout,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ChainConfig {
    /// JSON-RPC endpoint for `eth_call`
    pub rpc: String,
    pub explorer: String,
    pub explorer_kind: ExplorerKind,
    /// Name of the environment variable holding the explorer API key
    #[serde(default)]
    pub api_key_env: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ResolverConfig {
    pub call_timeout_ms: u64,
    pub max_library_depth: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        ResolverConfig {
            call_timeout_ms: 5000,
            max_library_depth: 8,
        }
    }
}

impl ResolverConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub chains: BTreeMap<String, ChainConfig>,
}

fn etherscan(rpc: &str, explorer: &str, api_key_env: &str) -> ChainConfig {
    ChainConfig {
        rpc: rpc.to_owned(),
        explorer: explorer.to_owned(),
        explorer_kind: ExplorerKind::Etherscan,
        api_key_env: Some(api_key_env.to_owned()),
    }
}

impl Default for Config {
    /// The chains known out of the box
    fn default() -> Self {
        let chains = [
            (
                "ethereum",
                etherscan(
                    "https://cloudflare-eth.com",
                    "https://api.etherscan.io",
                    "ETHERSCAN_API_KEY",
                ),
            ),
            (
                "goerli-ethereum",
                etherscan(
                    "https://rpc.ankr.com/eth_goerli",
                    "https://api-goerli.etherscan.io",
                    "ETHERSCAN_API_KEY",
                ),
            ),
            (
                "sepolia-ethereum",
                etherscan(
                    "https://rpc.sepolia.org",
                    "https://api-sepolia.etherscan.io",
                    "ETHERSCAN_API_KEY",
                ),
            ),
            (
                "optimism",
                etherscan(
                    "https://mainnet.optimism.io",
                    "https://api-optimistic.etherscan.io",
                    "ETHERSCAN_API_KEY_OPTIMISM",
                ),
            ),
            (
                "goerli-optimism",
                etherscan(
                    "https://goerli.optimism.io",
                    "https://api-goerli-optimistic.etherscan.io",
                    "ETHERSCAN_API_KEY_OPTIMISM",
                ),
            ),
            (
                "mode",
                ChainConfig {
                    rpc: "https://sepolia.mode.network".to_owned(),
                    explorer: "https://sepolia.explorer.mode.network/api/v2/smart-contracts"
                        .to_owned(),
                    explorer_kind: ExplorerKind::Blockscout,
                    api_key_env: None,
                },
            ),
        ]
        .into_iter()
        .map(|(name, chain)| (name.to_owned(), chain))
        .collect();

        Config {
            resolver: ResolverConfig::default(),
            chains,
        }
    }
}

impl Config {
    /// Parse a toml configuration. Chains it names replace or extend the built-in ones.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let file: Config = toml::from_str(contents).map_err(|e| Error::Config(e.to_string()))?;

        let mut chains = Config::default().chains;

        chains.extend(file.chains);

        Ok(Config {
            resolver: file.resolver,
            chains,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read '{}': {e}", path.display()))
        })?;

        Config::from_toml(&contents)
    }

    pub fn chain(&self, name: &str) -> Result<&ChainConfig> {
        self.chains
            .get(name)
            .ok_or_else(|| Error::UnknownChain(name.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn built_in_chains() {
        let config = Config::default();

        assert_eq!(config.chains.len(), 6);
        assert_eq!(
            config.chain("mode").unwrap().explorer_kind,
            ExplorerKind::Blockscout
        );
        assert_eq!(
            config.chain("optimism").unwrap().api_key_env.as_deref(),
            Some("ETHERSCAN_API_KEY_OPTIMISM")
        );
        assert!(matches!(
            config.chain("solana"),
            Err(Error::UnknownChain(name)) if name == "solana"
        ));
        assert_eq!(config.resolver.call_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn file_extends_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();

        writeln!(
            file,
            r#"
[resolver]
call-timeout-ms = 250

[chains.ethereum]
rpc = "http://localhost:8545"
explorer = "https://api.etherscan.io"
explorer-kind = "etherscan"
api-key-env = "MY_KEY"

[chains.base]
rpc = "https://mainnet.base.org"
explorer = "https://base.blockscout.com/api/v2/smart-contracts"
explorer-kind = "blockscout"
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();

        assert_eq!(config.resolver.call_timeout_ms, 250);
        assert_eq!(config.resolver.max_library_depth, 8);
        assert_eq!(config.chains.len(), 7);
        assert_eq!(config.chain("ethereum").unwrap().rpc, "http://localhost:8545");
        assert_eq!(config.chain("base").unwrap().api_key_env, None);
    }

    #[test]
    fn bad_config() {
        assert!(matches!(
            Config::from_toml("[resolver]\ncall-timeout-ms = \"soon\""),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Config::from_file(Path::new("/nonexistent/addrscan.toml")),
            Err(Error::Config(_))
        ));
    }
}
