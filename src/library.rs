// SPDX-License-Identifier: Apache-2.0

//! Resolve the libraries linked into a deployed contract, and the libraries linked into
//! those.

use crate::abi::{address_returning_functions, contract_abi};
use crate::address::with_prefix;
use crate::contract::ContractSource;
use crate::error::{Error, Result};
use futures::future::join_all;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{debug, warn};

/// Library name to deployed address
pub type Linkage = BTreeMap<String, String>;

/// Parse a linkage descriptor such as `Math:6b175474e89094c44da98b954eedeac495271d0f;Utils:...`.
/// Addresses are given a `0x` prefix. Malformed pairs are ignored.
pub fn parse_linkage(descriptor: &str) -> Linkage {
    descriptor
        .split(';')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| match pair.rsplit_once(':') {
            Some((name, address)) if !name.is_empty() && !address.is_empty() => {
                Some((name.to_owned(), with_prefix(address)))
            }
            _ => {
                debug!("ignoring malformed library link '{pair}'");
                None
            }
        })
        .collect()
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Libraries {
    /// Libraries linked into the contract itself
    pub direct: Linkage,
    /// Every library reachable from the contract, flattened
    pub linkage: Linkage,
    /// Addresses of libraries whose own linkage could not be loaded
    pub failed: Vec<String>,
}

async fn linkage_of(source: &dyn ContractSource, address: &str, chain: &str) -> Result<Linkage> {
    let records = source.contract_info(address, chain).await?;

    let record = records.first().ok_or_else(|| Error::ContractNotFound {
        address: address.to_owned(),
        chain: chain.to_owned(),
    })?;

    Ok(parse_linkage(&record.library))
}

/// Load the libraries linked into the contract at `address`, following library links up to
/// `max_depth` levels deep. Each library is fetched once; a library that fails to load is
/// recorded in [`Libraries::failed`] and does not stop the others.
///
/// Only a failure to load the contract itself is an error.
pub async fn load_libraries(
    source: &dyn ContractSource,
    address: &str,
    chain: &str,
    max_depth: usize,
) -> Result<Libraries> {
    let mut libraries = Libraries::default();
    let mut seen = HashSet::from([address.to_ascii_lowercase()]);

    libraries.direct = linkage_of(source, address, chain).await?;

    let mut frontier = enqueue(libraries.direct.clone(), &mut libraries, &mut seen);
    let mut depth = 1;

    while !frontier.is_empty() {
        if depth >= max_depth {
            warn!(
                "library links of {address} nest deeper than {max_depth}, {} libraries not followed",
                frontier.len()
            );
            break;
        }

        let loads = frontier
            .iter()
            .map(|library| linkage_of(source, library, chain));

        let mut next = Vec::new();

        for (library, res) in frontier.iter().zip(join_all(loads).await) {
            match res {
                Ok(linkage) => next.extend(enqueue(linkage, &mut libraries, &mut seen)),
                Err(err) => {
                    warn!("library {library} on {chain}: {err}");
                    libraries.failed.push(library.to_owned());
                }
            }
        }

        frontier = next;
        depth += 1;
    }

    Ok(libraries)
}

/// Add newly found links to the flattened linkage; returns the addresses not visited yet.
/// When two libraries use the same name, the first one found is kept.
fn enqueue(linkage: Linkage, libraries: &mut Libraries, seen: &mut HashSet<String>) -> Vec<String> {
    let mut new = Vec::new();

    for (name, address) in linkage {
        if seen.insert(address.to_ascii_lowercase()) {
            new.push(address.clone());
        }

        libraries.linkage.entry(name).or_insert(address);
    }

    new
}

/// A linked library and the names of its functions which return an address
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkedLibrary {
    pub address: String,
    pub address_functions: BTreeSet<String>,
}

/// Look up which functions of each linked library return an address. Libraries without a
/// usable ABI are left out.
pub async fn library_functions(
    source: &dyn ContractSource,
    linkage: &Linkage,
    chain: &str,
) -> BTreeMap<String, LinkedLibrary> {
    let lookups = linkage
        .iter()
        .map(|(name, address)| async move { (name, address, contract_abi(source, address, chain).await) });

    let mut libraries = BTreeMap::new();

    for (name, address, res) in join_all(lookups).await {
        match res {
            Ok(Some(abi)) => {
                libraries.insert(
                    name.to_owned(),
                    LinkedLibrary {
                        address: address.to_owned(),
                        address_functions: address_returning_functions(&abi),
                    },
                );
            }
            Ok(None) => debug!("library {name} at {address} has no abi"),
            Err(err) => warn!("library {name} at {address}: {err}"),
        }
    }

    libraries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linkage_descriptor() {
        let linkage = parse_linkage(
            "Math:1111111111111111111111111111111111111111;Utils:0x2222222222222222222222222222222222222222;;broken",
        );

        assert_eq!(linkage.len(), 2);
        assert_eq!(linkage["Math"], "0x1111111111111111111111111111111111111111");
        assert_eq!(linkage["Utils"], "0x2222222222222222222222222222222222222222");

        assert!(parse_linkage("").is_empty());
    }

    #[test]
    fn qualified_library_names() {
        let linkage = parse_linkage("contracts/Math.sol:Math:1111111111111111111111111111111111111111");

        assert_eq!(
            linkage["contracts/Math.sol:Math"],
            "0x1111111111111111111111111111111111111111"
        );
    }
}
