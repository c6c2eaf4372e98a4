// SPDX-License-Identifier: Apache-2.0

use crate::abi::abi_if_returns_address;
use crate::contract::ContractSource;
use crate::error::{Error, Result};
use crate::references::CallRequest;
use crate::rpc::ContractCaller;
use std::time::Duration;
use tokio::time::timeout;

/// Resolve the address a pending call returns.
///
/// The target's ABI must have an overload of the function returning exactly one `address`;
/// that overload is then called on `chain`. Looking up the ABI and making the call are
/// abandoned together after `limit`.
pub async fn deferred_address(
    source: &dyn ContractSource,
    caller: &dyn ContractCaller,
    chain: &str,
    request: &CallRequest,
    limit: Duration,
) -> Result<String> {
    timeout(limit, call(source, caller, chain, request))
        .await
        .map_err(|_| Error::Timeout {
            address: request.target.clone(),
            function: request.function.clone(),
        })?
}

async fn call(
    source: &dyn ContractSource,
    caller: &dyn ContractCaller,
    chain: &str,
    request: &CallRequest,
) -> Result<String> {
    let function = abi_if_returns_address(source, &request.target, chain, &request.function)
        .await?
        .ok_or_else(|| Error::AbiNotFound {
            address: request.target.clone(),
            chain: chain.to_owned(),
            function: request.function.clone(),
        })?;

    caller
        .call_address(chain, &request.target, &function, &request.args)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{ContractRecord, MemoryStore};
    use async_trait::async_trait;
    use ethabi::Function;

    struct Unreachable;

    #[async_trait]
    impl ContractCaller for Unreachable {
        async fn call_address(
            &self,
            _chain: &str,
            _address: &str,
            _function: &Function,
            _args: &[String],
        ) -> Result<String> {
            panic!("no call expected");
        }
    }

    #[tokio::test]
    async fn unknown_contract_is_not_called() {
        let request = CallRequest {
            target: "0x1111111111111111111111111111111111111111".to_owned(),
            function: "owner".to_owned(),
            args: Vec::new(),
        };

        let res = deferred_address(
            &MemoryStore::new(),
            &Unreachable,
            "ethereum",
            &request,
            Duration::from_secs(1),
        )
        .await;

        assert!(matches!(
            res,
            Err(Error::AbiNotFound { function, .. }) if function == "owner"
        ));
    }

    /// Takes longer to answer than anyone waits
    struct Sluggish;

    #[async_trait]
    impl ContractSource for Sluggish {
        async fn contract_info(&self, _address: &str, _chain: &str) -> Result<Vec<ContractRecord>> {
            tokio::time::sleep(Duration::from_secs(10)).await;

            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn abi_lookup_is_bounded() {
        let request = CallRequest {
            target: "0x1111111111111111111111111111111111111111".to_owned(),
            function: "owner".to_owned(),
            args: Vec::new(),
        };

        let res = deferred_address(
            &Sluggish,
            &Unreachable,
            "ethereum",
            &request,
            Duration::from_millis(50),
        )
        .await;

        assert!(matches!(
            res,
            Err(Error::Timeout { function, .. }) if function == "owner"
        ));
    }
}
