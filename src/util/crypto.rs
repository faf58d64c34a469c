use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Compute HMAC-SHA256(key, data) rendered as a lowercase hex string.
pub fn hmac_sha256_hex<K: AsRef<[u8]>, D: AsRef<[u8]>>(key: K, data: D) -> String {
    let mut mac =
        HmacSha256::new_from_slice(key.as_ref()).expect("HMAC can take keys of any size");
    mac.update(data.as_ref());
    let digest = mac.finalize().into_bytes();
    format!("{digest:x}")
}
