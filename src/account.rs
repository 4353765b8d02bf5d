// SPDX-License-Identifier: Apache-2.0

//! Identities that send calls, and the handles of deployed contracts.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};
use thiserror::Error;
use tiny_keccak::{Hasher, Keccak};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("account id must not be empty")]
    Empty,
    #[error("account id '{0}' must not contain whitespace")]
    Whitespace(String),
    #[error("contract handle '{0}' must start with 0x")]
    MissingPrefix(String),
    #[error("contract handle '{0}' is not valid hex")]
    Hex(String),
    #[error("contract handle must be 20 bytes, found {0}")]
    Length(usize),
}

/// The identity used as the sender of a call.
///
/// Account ids are opaque to the harness; the environment decides what they
/// mean. The only rules are that they are non-empty and contain no whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Result<Self, AddressError> {
        let id = id.into();

        if id.is_empty() {
            return Err(AddressError::Empty);
        }

        if id.chars().any(char::is_whitespace) {
            return Err(AddressError::Whitespace(id));
        }

        Ok(AccountId(id))
    }

    /// For ids known to be well formed at compile time.
    pub(crate) fn from_static(id: &'static str) -> Self {
        debug_assert!(AccountId::new(id).is_ok());
        AccountId(id.to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for AccountId {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AccountId::new(s)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for AccountId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for AccountId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let id = String::deserialize(deserializer)?;

        AccountId::new(id).map_err(serde::de::Error::custom)
    }
}

/// Address of a deployed contract instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContractHandle([u8; 20]);

impl ContractHandle {
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        ContractHandle(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Derive the address of the `nonce`-th contract created by `deployer`.
    ///
    /// This is the last 20 bytes of `keccak256(deployer || nonce)`, with the
    /// nonce encoded as 8 bytes big endian.
    pub fn derive(deployer: &AccountId, nonce: u64) -> Self {
        let mut hasher = Keccak::v256();
        hasher.update(deployer.as_str().as_bytes());
        hasher.update(&nonce.to_be_bytes());
        let mut hash = [0u8; 32];
        hasher.finalize(&mut hash);

        let mut address = [0u8; 20];
        address.copy_from_slice(&hash[12..]);

        ContractHandle(address)
    }
}

/// Returns an address in https://github.com/ethereum/EIPs/blob/master/EIPS/eip-55.md format
fn to_hexstr_eip55(address: &[u8; 20]) -> String {
    let address = hex::encode(address);

    let mut hasher = Keccak::v256();
    hasher.update(address.as_bytes());
    let mut hash = [0u8; 32];
    hasher.finalize(&mut hash);

    "0x".chars()
        .chain(address.chars().enumerate().map(|(i, c)| {
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
        }))
        .collect()
}

impl fmt::Display for ContractHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&to_hexstr_eip55(&self.0))
    }
}

impl FromStr for ContractHandle {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .ok_or_else(|| AddressError::MissingPrefix(s.to_owned()))?;

        let bytes = hex::decode(digits).map_err(|_| AddressError::Hex(s.to_owned()))?;

        let address: [u8; 20] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| AddressError::Length(bytes.len()))?;

        Ok(ContractHandle(address))
    }
}

impl Serialize for ContractHandle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ContractHandle {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let handle = String::deserialize(deserializer)?;

        handle.parse().map_err(serde::de::Error::custom)
    }
}
