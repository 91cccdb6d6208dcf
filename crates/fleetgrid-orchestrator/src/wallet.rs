//! Ownership proof for sync targets.
//!
//! A caller proves it controls a Docker-style host by presenting the
//! mnemonic whose first account address the host was registered under.

use std::str::FromStr;

use alloy_primitives::Address;
use alloy_signer_local::MnemonicBuilder;
use alloy_signer_local::coins_bip39::English;
use thiserror::Error;

/// BIP-32 path of the account the host address is derived from.
pub const DERIVATION_PATH: &str = "m/44'/412'/0'/0/0";

#[derive(Debug, Error)]
#[error("key derivation failed: {0}")]
pub struct WalletError(String);

/// Address of the account at `path` under `mnemonic`.
pub fn derive_address_at(mnemonic: &str, path: &str) -> Result<Address, WalletError> {
    let signer = MnemonicBuilder::<English>::default()
        .phrase(mnemonic)
        .derivation_path(path)
        .map_err(|e| WalletError(e.to_string()))?
        .build()
        .map_err(|e| WalletError(e.to_string()))?;
    Ok(signer.address())
}

pub fn derive_address(mnemonic: &str) -> Result<Address, WalletError> {
    derive_address_at(mnemonic, DERIVATION_PATH)
}

/// Whether `mnemonic` derives to `claimed`. Malformed input never proves anything.
pub fn proves_ownership(mnemonic: &str, claimed: &str) -> bool {
    let Ok(claimed) = Address::from_str(claimed.trim()) else {
        return false;
    };
    derive_address(mnemonic).is_ok_and(|derived| derived == claimed)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PHRASE: &str = "test test test test test test test test test test test junk";

    #[test]
    fn known_ethereum_vector() {
        let addr = derive_address_at(PHRASE, "m/44'/60'/0'/0/0").unwrap();
        assert_eq!(
            addr,
            Address::from_str("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266").unwrap()
        );
    }

    #[test]
    fn own_address_is_proven() {
        let addr = derive_address(PHRASE).unwrap();
        assert!(proves_ownership(PHRASE, &addr.to_string()));
        assert!(proves_ownership(PHRASE, &addr.to_string().to_lowercase()));
    }

    #[test]
    fn other_address_is_not_proven() {
        assert!(!proves_ownership(PHRASE, "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"));
        assert!(!proves_ownership(PHRASE, "not-an-address"));
        assert!(!proves_ownership("not a mnemonic", "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"));
    }
}
