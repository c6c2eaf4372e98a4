// SPDX-License-Identifier: Apache-2.0

//! Look up functions returning an address in the ABI of a verified contract.

use crate::contract::ContractSource;
use crate::error::Result;
use ethabi::{Contract, Function, ParamType};
use std::collections::BTreeSet;

pub fn parse_abi(json: &str) -> Result<Contract> {
    Ok(Contract::load(json.as_bytes())?)
}

fn returns_address(func: &Function) -> bool {
    matches!(func.outputs.as_slice(), [output] if output.kind == ParamType::Address)
}

/// The overload of `name` which returns exactly one value of type `address`
pub fn address_returning_function<'a>(abi: &'a Contract, name: &str) -> Option<&'a Function> {
    abi.functions_by_name(name)
        .ok()?
        .iter()
        .find(|func| returns_address(func))
}

/// Names of all functions with an overload returning exactly one `address`
pub fn address_returning_functions(abi: &Contract) -> BTreeSet<String> {
    abi.functions()
        .filter(|func| returns_address(func))
        .map(|func| func.name.to_owned())
        .collect()
}

/// The parsed ABI of the contract at `address`, if it has been verified
pub async fn contract_abi(
    source: &dyn ContractSource,
    address: &str,
    chain: &str,
) -> Result<Option<Contract>> {
    let records = source.contract_info(address, chain).await?;

    match records
        .iter()
        .find_map(|record| record.abi.as_deref().filter(|abi| !abi.is_empty()))
    {
        Some(abi) => Ok(Some(parse_abi(abi)?)),
        None => Ok(None),
    }
}

/// The ABI fragment of `function` on the contract at `address`, but only if it returns a
/// single address. The contract is fetched first if it has not been seen before.
pub async fn abi_if_returns_address(
    source: &dyn ContractSource,
    address: &str,
    chain: &str,
    function: &str,
) -> Result<Option<Function>> {
    let Some(abi) = contract_abi(source, address, chain).await? else {
        return Ok(None);
    };

    Ok(address_returning_function(&abi, function).cloned())
}
