// SPDX-License-Identifier: Apache-2.0

use tiny_keccak::{Hasher, Keccak};

/// Does this numeric token look like an address: 42 characters starting with `0x`.
///
/// Neither the hex digits nor the EIP-55 checksum are validated, so any hex literal of
/// exactly twenty bytes is accepted.
pub fn is_address_like(token: &str) -> bool {
    token.len() == 42 && token.starts_with("0x")
}

/// Make sure a linked address carries its `0x` prefix
pub fn with_prefix(address: &str) -> String {
    if address.starts_with("0x") || address.starts_with("0X") {
        address.to_owned()
    } else {
        format!("0x{address}")
    }
}

/// Returns an address in https://github.com/ethereum/EIPs/blob/master/EIPS/eip-55.md format.
/// Gives `None` unless the src is `0x` followed by 40 hex digits.
pub fn to_hexstr_eip55(src: &str) -> Option<String> {
    let digits = src.strip_prefix("0x")?;

    if digits.len() != 40 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    let address = digits.to_ascii_lowercase();

    let mut hasher = Keccak::v256();
    hasher.update(address.as_bytes());
    let mut hash = [0u8; 32];
    hasher.finalize(&mut hash);

    let checksummed = address.chars().enumerate().map(|(i, c)| {
        if c.is_ascii_digit() {
            return c;
        }

        // hash is 32 bytes; find the i'th "nibble"
        let nibble = hash[i >> 1] >> if (i & 1) != 0 { 0 } else { 4 };

        if (nibble & 8) != 0 {
            c.to_ascii_uppercase()
        } else {
            c
        }
    });

    Some("0x".chars().chain(checksummed).collect())
}
