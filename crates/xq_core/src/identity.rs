use sha2::{Digest, Sha256};

const ID_LEN: usize = 16;

/// Stable article id: the first 16 hex characters of SHA-256 over the url bytes.
pub fn article_id(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    let mut hex = format!("{:x}", digest);
    hex.truncate(ID_LEN);
    hex
}
