// SPDX-License-Identifier: Apache-2.0

use crate::ast::{NodeId, Span};
use crate::file::Position;
use serde::{Serialize, Serializer};
use std::fmt;

/// What kind of code produced the address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// An address-like number literal
    Hardcoded,
    /// A local variable initialized with an address, or a use of one
    Variable,
    /// A contract storage variable initialized with an address, or a use of one
    State,
    /// A call into another contract which returns an address
    PublicFunction,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Source::Hardcoded => write!(f, "hardcoded"),
            Source::Variable => write!(f, "variable"),
            Source::State => write!(f, "state"),
            Source::PublicFunction => write!(f, "public_function"),
        }
    }
}

/// A read-only call whose single `address` return value is the address of a reference
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallRequest {
    /// Contract to call
    pub target: String,
    pub function: String,
    /// Argument values as written in the source, or as resolved from variables
    pub args: Vec<String>,
}

impl fmt::Display for CallRequest {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}.{}({})",
            self.target,
            self.function,
            self.args.join(", ")
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(String),
    Pending(CallRequest),
}

/// Serialized as the address itself; a pending reference has the empty string
impl Serialize for Resolution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Resolution::Resolved(address) => serializer.serialize_str(address),
            Resolution::Pending(_) => serializer.serialize_str(""),
        }
    }
}

/// One place in the source where an address value is produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressReference {
    pub contract_path: String,
    pub contract_name: String,
    #[serde(rename = "address")]
    pub resolution: Resolution,
    pub loc_start_line: usize,
    pub loc_start_col: usize,
    pub loc_end_line: usize,
    pub loc_end_col: usize,
    pub range_from: usize,
    pub range_to: usize,
    pub source: Source,
    /// Enclosing node in the tree this reference was collected from
    #[serde(skip)]
    pub parent: Option<NodeId>,
}

impl AddressReference {
    /// The resolved address, or the empty string while a call is pending
    pub fn address(&self) -> &str {
        match &self.resolution {
            Resolution::Resolved(address) => address,
            Resolution::Pending(_) => "",
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.resolution, Resolution::Pending(_))
    }

    pub fn span(&self) -> Span {
        Span::new(self.range_from, self.range_to)
    }

    pub fn start(&self) -> Position {
        Position {
            line: self.loc_start_line,
            column: self.loc_start_col,
        }
    }

    pub fn end(&self) -> Position {
        Position {
            line: self.loc_end_line,
            column: self.loc_end_col,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_like_the_web_api() {
        let reference = AddressReference {
            contract_path: "/Foo.sol".into(),
            contract_name: "Foo".into(),
            resolution: Resolution::Resolved("0x1111111111111111111111111111111111111111".into()),
            loc_start_line: 3,
            loc_start_col: 4,
            loc_end_line: 3,
            loc_end_col: 46,
            range_from: 40,
            range_to: 82,
            source: Source::Hardcoded,
            parent: None,
        };

        let json = serde_json::to_value(&reference).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "contractPath": "/Foo.sol",
                "contractName": "Foo",
                "address": "0x1111111111111111111111111111111111111111",
                "locStartLine": 3,
                "locStartCol": 4,
                "locEndLine": 3,
                "locEndCol": 46,
                "rangeFrom": 40,
                "rangeTo": 82,
                "source": "hardcoded",
            })
        );
    }

    #[test]
    fn pending_has_no_address() {
        let resolution = Resolution::Pending(CallRequest {
            target: "0x1111111111111111111111111111111111111111".into(),
            function: "owner".into(),
            args: vec![],
        });

        assert_eq!(serde_json::to_string(&resolution).unwrap(), "\"\"");
    }
}
