//! Group identifier derivation
//!
//! Matches the node's atomic-group convention:
//! - `txid = SHA-512/256("TX" || canonical_encoding)`
//! - `group = SHA-512/256("TG" || msgpack({"txlist": [txid, ...]}))`

use sha2::{Digest, Sha512_256};

const TX_PREFIX: &[u8] = b"TX";
const GROUP_PREFIX: &[u8] = b"TG";

/// Hash of one transaction's canonical encoding
pub fn transaction_id(encoded: &[u8]) -> [u8; 32] {
    let mut hasher = Sha512_256::new();
    hasher.update(TX_PREFIX);
    hasher.update(encoded);
    hasher.finalize().into()
}

/// Group identifier over an ordered list of canonical encodings
pub fn compute_group_id<E: AsRef<[u8]>>(encodings: &[E]) -> [u8; 32] {
    let tx_ids: Vec<[u8; 32]> = encodings
        .iter()
        .map(|encoded| transaction_id(encoded.as_ref()))
        .collect();

    let mut hasher = Sha512_256::new();
    hasher.update(GROUP_PREFIX);
    hasher.update(encode_txlist(&tx_ids));
    hasher.finalize().into()
}

/// Msgpack encoding of `{"txlist": [bin32, ...]}`
///
/// Follows the node's canonical msgpack rules: map keys sorted (only one key
/// here), smallest container header that fits, and byte strings as `bin8`
/// since every transaction id is 32 bytes.
fn encode_txlist(tx_ids: &[[u8; 32]]) -> Vec<u8> {
    let mut out = Vec::with_capacity(16 + tx_ids.len() * 34);

    // fixmap with one entry, fixstr "txlist"
    out.push(0x81);
    out.push(0xa0 | 6);
    out.extend_from_slice(b"txlist");

    let len = tx_ids.len();
    if len < 16 {
        out.push(0x90 | len as u8);
    } else {
        out.push(0xdc);
        out.extend_from_slice(&(len as u16).to_be_bytes());
    }

    for id in tx_ids {
        // bin8 of 32 bytes
        out.push(0xc4);
        out.push(32);
        out.extend_from_slice(id);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_txlist_layout() {
        let encoded = encode_txlist(&[[7u8; 32], [9u8; 32]]);

        assert_eq!(&encoded[..8], &[0x81, 0xa6, b't', b'x', b'l', b'i', b's', b't']);
        assert_eq!(encoded[8], 0x92);
        assert_eq!(&encoded[9..11], &[0xc4, 32]);
        assert_eq!(encoded[11], 7);
        assert_eq!(encoded.len(), 9 + 2 * 34);
    }

    #[test]
    fn test_large_txlist_uses_array16() {
        let ids = vec![[0u8; 32]; 16];
        let encoded = encode_txlist(&ids);
        assert_eq!(&encoded[8..11], &[0xdc, 0x00, 0x10]);
    }

    #[test]
    fn test_transaction_id_is_domain_separated() {
        let payload = b"payload";
        let mut plain = Sha512_256::new();
        plain.update(payload);
        let plain: [u8; 32] = plain.finalize().into();

        assert_ne!(transaction_id(payload), plain);
        assert_eq!(transaction_id(payload), transaction_id(payload));
    }

    #[test]
    fn test_group_id_depends_on_order() {
        let a = b"first".to_vec();
        let b = b"second".to_vec();

        let forward = compute_group_id(&[a.clone(), b.clone()]);
        let again = compute_group_id(&[a.clone(), b.clone()]);
        let reversed = compute_group_id(&[b, a]);

        assert_eq!(forward, again);
        assert_ne!(forward, reversed);
    }
}
