// SPDX-License-Identifier: Apache-2.0

use crate::collect::Collector;
use crate::config::ResolverConfig;
use crate::contract::{ContractRecord, ContractSource};
use crate::error::{Error, Result};
use crate::library::{library_functions, load_libraries};
use crate::parse::parse;
use crate::references::{AddressReference, Resolution};
use crate::resolve::deferred_address;
use crate::rpc::ContractCaller;
use crate::symtable::{local_variables, state_variables};
use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Limit for each call made to resolve a reference
    pub call_timeout: Duration,
    /// How many levels of libraries linking libraries are followed
    pub max_library_depth: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options::from(&ResolverConfig::default())
    }
}

impl From<&ResolverConfig> for Options {
    fn from(config: &ResolverConfig) -> Self {
        Options {
            call_timeout: config.call_timeout(),
            max_library_depth: config.max_library_depth,
        }
    }
}

/// What was lost while resolving one file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// The source did not parse, so there are no references at all
    pub parse_failed: bool,
    /// Nodes without a location
    pub skipped_nodes: usize,
    /// Linked libraries whose own links could not be loaded
    pub failed_libraries: usize,
    /// Calls which could not be resolved
    pub dropped: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Analysis {
    pub references: Vec<AddressReference>,
    pub report: Report,
}

/// Finds the addresses a contract's source code refers to
pub struct Resolver {
    source: Arc<dyn ContractSource>,
    caller: Arc<dyn ContractCaller>,
    options: Options,
}

impl Resolver {
    pub fn new(source: Arc<dyn ContractSource>, caller: Arc<dyn ContractCaller>) -> Self {
        Resolver {
            source,
            caller,
            options: Options::default(),
        }
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// The address references of one source file of a contract. Calls which cannot be made
    /// are left out; this never fails.
    pub async fn get_addresses(&self, record: &ContractRecord) -> Vec<AddressReference> {
        self.resolve(record).await.references
    }

    /// Like [`Resolver::get_addresses`], with a report of what had to be left out
    pub async fn resolve(&self, record: &ContractRecord) -> Analysis {
        let mut report = Report::default();

        let Some(tree) = parse(&record.source_code) else {
            warn!("{}: no references, source does not parse", record.contract_path);
            report.parse_failed = true;

            return Analysis {
                references: Vec::new(),
                report,
            };
        };

        let (locals, local_decls) = local_variables(&tree);
        let (state, state_decls) = state_variables(&tree);

        let mut collector = Collector::new(
            &tree,
            &record.source_code,
            &record.contract_path,
            &record.contract_name,
        );

        collector.hardcoded();
        collector.local_variables(&locals, &local_decls);
        collector.state_variables(&state, &state_decls);

        let libraries = match load_libraries(
            self.source.as_ref(),
            &record.address,
            &record.chain,
            self.options.max_library_depth,
        )
        .await
        {
            Ok(libraries) => {
                report.failed_libraries = libraries.failed.len();

                // only the contract's own libraries can be called by name from its source
                library_functions(self.source.as_ref(), &libraries.direct, &record.chain).await
            }
            Err(err) => {
                debug!("no libraries for {} on {}: {err}", record.address, record.chain);
                BTreeMap::new()
            }
        };

        collector.calls(&locals, &state, &libraries);

        let (references, skipped) = collector.finish();

        report.skipped_nodes = skipped;

        let resolved = join_all(references.iter().map(|reference| async move {
            match &reference.resolution {
                Resolution::Pending(request) => Some(
                    deferred_address(
                        self.source.as_ref(),
                        self.caller.as_ref(),
                        &record.chain,
                        request,
                        self.options.call_timeout,
                    )
                    .await,
                ),
                Resolution::Resolved(_) => None,
            }
        }))
        .await;

        let references = references
            .into_iter()
            .zip(resolved)
            .filter_map(|(mut reference, resolved)| match resolved {
                None => Some(reference),
                Some(Ok(address)) => {
                    reference.resolution = Resolution::Resolved(address);
                    Some(reference)
                }
                Some(Err(err)) => {
                    warn!(
                        "{}:{}: dropping reference: {err}",
                        record.contract_path, reference.loc_start_line
                    );
                    report.dropped += 1;
                    None
                }
            })
            .collect::<Vec<_>>();

        info!(
            "{}: {} address references",
            record.contract_path,
            references.len()
        );

        Analysis { references, report }
    }

    /// The address references of every source file of the contract at `address`, by path
    pub async fn addresses_by_path(
        &self,
        address: &str,
        chain: &str,
    ) -> Result<BTreeMap<String, Vec<AddressReference>>> {
        let records = self.source.contract_info(address, chain).await?;

        if records.is_empty() {
            return Err(Error::ContractNotFound {
                address: address.to_owned(),
                chain: chain.to_owned(),
            });
        }

        let files = join_all(records.iter().map(|record| async move {
            (record.contract_path.clone(), self.get_addresses(record).await)
        }))
        .await;

        Ok(files.into_iter().collect())
    }
}
