//! Utility functions for identifier minting and ledger keys

use bech32::Bech32m;
use uuid7::uuid7;

// construct a unique id then encode using bech32
pub fn new_uuid_to_bech32(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encode)
}

/// Prefix shared by every ledger entry of one product.
pub fn entry_prefix(product_id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(product_id.len() + 1);
    key.extend_from_slice(product_id.as_bytes());
    key.push(b'/');
    key
}

/// `<product id>/<content hash>`, so a prefix scan yields one product's entries.
pub fn entry_key(product_id: &str, digest: &str) -> Vec<u8> {
    let mut key = entry_prefix(product_id);
    key.extend_from_slice(digest.as_bytes());
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_keys_share_the_product_prefix() {
        let key = entry_key("prod_1abc", "deadbeef");

        assert!(key.starts_with(&entry_prefix("prod_1abc")));
        assert!(!key.starts_with(&entry_prefix("prod_1ab")));
        assert_eq!(key, b"prod_1abc/deadbeef".to_vec());
    }
}
