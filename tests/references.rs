// SPDX-License-Identifier: Apache-2.0

use addrscan::{
    AddressReference, ContractCaller, ContractRecord, Error, MemoryStore, Resolver, Result,
    Source,
};
use async_trait::async_trait;
use ethabi::Function;
use pretty_assertions::assert_eq;
use std::sync::Arc;

const A: &str = "0x1111111111111111111111111111111111111111";
const B: &str = "0x2222222222222222222222222222222222222222";

struct Offline;

#[async_trait]
impl ContractCaller for Offline {
    async fn call_address(
        &self,
        _chain: &str,
        address: &str,
        _function: &Function,
        _args: &[String],
    ) -> Result<String> {
        Err(Error::Rpc(format!("no network to call {address}")))
    }
}

fn record(src: &str) -> ContractRecord {
    ContractRecord {
        address: "0x9999999999999999999999999999999999999999".to_owned(),
        chain: "ethereum".to_owned(),
        contract_path: "/test.sol".to_owned(),
        contract_name: "test".to_owned(),
        source_code: src.to_owned(),
        ..Default::default()
    }
}

async fn addresses(src: &str) -> Vec<AddressReference> {
    let record = record(src);

    let resolver = Resolver::new(
        Arc::new(MemoryStore::with_records([record.clone()])),
        Arc::new(Offline),
    );

    resolver.get_addresses(&record).await
}

fn of(references: &[AddressReference], source: Source) -> Vec<&AddressReference> {
    references.iter().filter(|r| r.source == source).collect()
}

#[tokio::test]
async fn hardcoded_literals() {
    let src = r#"
        contract Registry {
            address owner = 0x3333333333333333333333333333333333333333;

            function f() public {
                g(0x1111111111111111111111111111111111111111);
                h(0x2222222222222222222222222222222222222222, 0x1111111111111111111111111111111111111111);
            }
        }"#;

    let references = addresses(src).await;

    let hardcoded = of(&references, Source::Hardcoded);

    // one for each occurrence
    for literal in [A, B] {
        for (offset, _) in src.match_indices(literal) {
            let found = hardcoded
                .iter()
                .filter(|r| r.range_from == offset)
                .collect::<Vec<_>>();

            assert_eq!(found.len(), 1);
            assert_eq!(found[0].address(), literal);
            assert_eq!(found[0].range_to, offset + 42);
        }
    }

    assert_eq!(hardcoded.len(), 4);
    assert!(hardcoded.iter().all(|r| r.contract_path == "/test.sol"));
}

#[tokio::test]
async fn literals_which_are_not_addresses() {
    let src = format!(
        r#"
        contract c {{
            function f() public {{
                g(0x{short});
                g(0x{long});
                g({decimal});
                g(0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAe);
            }}
        }}"#,
        short = "1".repeat(39),
        long = "1".repeat(41),
        decimal = "1".repeat(42),
    );

    let references = addresses(&src).await;

    assert!(references.is_empty(), "{references:?}");
}

#[tokio::test]
async fn local_variable_and_its_uses() {
    let src = r#"
        contract c {
            function f() public {
                address a = 0x1111111111111111111111111111111111111111;
                g(a);
                h(a);
            }

            function other() public {
                g(a);
            }
        }"#;

    let references = addresses(src).await;

    let variables = of(&references, Source::Variable);

    assert_eq!(variables.len(), 3);
    assert!(variables.iter().all(|r| r.address() == A));
    assert!(variables
        .iter()
        .all(|r| &src[r.range_from..r.range_to] == "a"));

    // declaration first, then the uses in order
    assert!(variables[0].range_from < variables[1].range_from);
    assert!(variables[1].range_from < variables[2].range_from);
    assert_eq!(variables[0].loc_start_line, 4);
    assert_eq!(variables[2].loc_start_line, 6);
}

#[tokio::test]
async fn nearest_preceding_state_declaration() {
    let src = r#"
        contract First {
            address x = 0x1111111111111111111111111111111111111111;

            function f() public {
                g(x);
            }
        }

        contract Second {
            address x = 0x2222222222222222222222222222222222222222;

            function f() public {
                g(x);
            }
        }"#;

    let references = addresses(src).await;

    let state = of(&references, Source::State)
        .into_iter()
        .map(|r| (r.range_from, r.address()))
        .collect::<Vec<_>>();

    let first_use = src.find("g(x)").unwrap() + 2;
    let second_use = src.rfind("g(x)").unwrap() + 2;

    assert_eq!(state.len(), 4);
    assert!(state.contains(&(first_use, A)));
    assert!(state.contains(&(second_use, B)));
}

#[tokio::test]
async fn local_of_same_name_as_state_variable() {
    let src = r#"
        contract c {
            address x = 0x1111111111111111111111111111111111111111;

            function f() public {
                address x = 0x2222222222222222222222222222222222222222;
                g(x);
            }
        }"#;

    let references = addresses(src).await;

    let state = of(&references, Source::State)
        .into_iter()
        .map(|r| (&src[r.range_from..r.range_to], r.range_from, r.address()))
        .collect::<Vec<_>>();

    let declaration = src.find("address x").unwrap() + 8;
    let local = src.rfind("address x").unwrap() + 8;
    let used = src.find("g(x)").unwrap() + 2;

    // state variables are matched by name and position only
    assert_eq!(
        state,
        vec![("x", declaration, A), ("x", local, A), ("x", used, A)]
    );

    let variables = of(&references, Source::Variable)
        .into_iter()
        .map(|r| (r.range_from, r.address()))
        .collect::<Vec<_>>();

    assert_eq!(variables, vec![(local, B), (used, B)]);
}

#[tokio::test]
async fn state_use_before_declaration() {
    let src = r#"
        contract c {
            function f() public {
                g(y);
            }

            address y = 0x1111111111111111111111111111111111111111;
        }"#;

    let references = addresses(src).await;

    let state = of(&references, Source::State);

    // only the declaration
    assert_eq!(state.len(), 1);
    assert_eq!(&src[state[0].range_from..state[0].range_to], "y");
}

#[tokio::test]
async fn destructuring_is_not_followed() {
    let src = r#"
        contract c {
            function f() public {
                (address a, address b) = (0x1111111111111111111111111111111111111111, 0x2222222222222222222222222222222222222222);
                g(a);
            }
        }"#;

    let references = addresses(src).await;

    assert!(of(&references, Source::Variable).is_empty());
    assert_eq!(of(&references, Source::Hardcoded).len(), 2);
}

#[tokio::test]
async fn unparsable_source() {
    let record = record("contract c { function f() public { address a = ; } }");

    let resolver = Resolver::new(Arc::new(MemoryStore::new()), Arc::new(Offline));

    let analysis = resolver.resolve(&record).await;

    assert!(analysis.references.is_empty());
    assert!(analysis.report.parse_failed);
}

#[tokio::test]
async fn same_result_every_time() {
    let src = r#"
        contract c {
            address owner = 0x1111111111111111111111111111111111111111;

            function f() public {
                address a = 0x2222222222222222222222222222222222222222;
                g(a, owner);
                address p = IPool(a).token0();
            }
        }"#;

    let first = addresses(src).await;
    let second = addresses(src).await;

    assert!(!first.is_empty());
    assert_eq!(first, second);

    let json = serde_json::to_string(&first).unwrap();
    assert_eq!(json, serde_json::to_string(&second).unwrap());
    assert!(!json.contains("parent"));
}
