// SPDX-License-Identifier: Apache-2.0

//! Read-only calls against deployed contracts.

use crate::address::to_hexstr_eip55;
use crate::config::Config;
use crate::error::{Error, Result};
use async_trait::async_trait;
use ethabi::ethereum_types::U256;
use ethabi::token::{LenientTokenizer, Tokenizer};
use ethabi::{Function, ParamType, Token};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// Calls a function returning a single address on a deployed contract
#[async_trait]
pub trait ContractCaller: Send + Sync {
    async fn call_address(
        &self,
        chain: &str,
        address: &str,
        function: &Function,
        args: &[String],
    ) -> Result<String>;
}

/// Turn argument values as written in Solidity source into ABI tokens
pub fn tokenize_args(function: &Function, args: &[String]) -> Result<Vec<Token>> {
    if function.inputs.len() != args.len() {
        return Err(Error::Rpc(format!(
            "{} takes {} arguments, {} given",
            function.name,
            function.inputs.len(),
            args.len()
        )));
    }

    function
        .inputs
        .iter()
        .zip(args)
        .map(|(param, arg)| tokenize(&param.kind, arg))
        .collect()
}

fn tokenize(kind: &ParamType, arg: &str) -> Result<Token> {
    let hex = arg.strip_prefix("0x").or_else(|| arg.strip_prefix("0X"));

    let token = match (kind, hex) {
        (ParamType::Address | ParamType::Bytes | ParamType::FixedBytes(_), Some(hex)) => {
            LenientTokenizer::tokenize(kind, hex)?
        }
        (ParamType::Uint(_), Some(hex)) => Token::Uint(
            U256::from_str_radix(hex, 16).map_err(|e| Error::Rpc(format!("'{arg}': {e}")))?,
        ),
        _ => LenientTokenizer::tokenize(kind, arg)?,
    };

    Ok(token)
}

/// Decode the return data of a call to `function`, which must be a single address
pub fn decode_address(function: &Function, data: &[u8]) -> Result<String> {
    match function.decode_output(data)?.as_slice() {
        [Token::Address(address)] => {
            let address = format!("0x{}", hex::encode(address.as_bytes()));

            to_hexstr_eip55(&address)
                .ok_or_else(|| Error::Rpc(format!("{} returned invalid address", function.name)))
        }
        tokens => Err(Error::Rpc(format!(
            "{} returned {} values, expected one address",
            function.name,
            tokens.len()
        ))),
    }
}

/// `eth_call` over JSON-RPC, to the endpoint configured for each chain
#[derive(Debug, Clone)]
pub struct RpcCaller {
    config: Config,
    client: reqwest::Client,
}

impl RpcCaller {
    pub fn new(config: Config) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        RpcCaller { config, client }
    }

    async fn jsonrpc_call(&self, endpoint: &str, method: &str, params: Value) -> Result<Value> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response: Value = self
            .client
            .post(endpoint)
            .json(&request)
            .send()
            .await?
            .json()
            .await?;

        if let Some(error) = response.get("error") {
            return Err(Error::Rpc(error.to_string()));
        }

        response
            .get("result")
            .cloned()
            .ok_or_else(|| Error::Rpc(format!("no result in {method} response")))
    }
}

#[async_trait]
impl ContractCaller for RpcCaller {
    async fn call_address(
        &self,
        chain: &str,
        address: &str,
        function: &Function,
        args: &[String],
    ) -> Result<String> {
        let endpoint = &self.config.chain(chain)?.rpc;

        let calldata = function.encode_input(&tokenize_args(function, args)?)?;

        debug!("eth_call {address}.{} on {chain}", function.name);

        let result = self
            .jsonrpc_call(
                endpoint,
                "eth_call",
                json!([
                    { "to": address, "data": format!("0x{}", hex::encode(calldata)) },
                    "latest"
                ]),
            )
            .await?;

        let data = result
            .as_str()
            .ok_or_else(|| Error::Rpc(format!("unexpected eth_call result {result}")))?;

        let data = hex::decode(data.trim_start_matches("0x"))
            .map_err(|e| Error::Rpc(format!("eth_call result: {e}")))?;

        decode_address(function, &data)
    }
}
