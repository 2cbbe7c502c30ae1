//! Deterministic identifiers for documents and their vector records.
//!
//! Filenames may contain any Unicode (Hebrew names are common), while record ids
//! must be plain ASCII. Both encodings lean on the first 8 hex characters of an
//! MD5 digest: 32 bits of hash. Collisions are therefore improbable, not
//! impossible; two distinct encoded filenames share a record-key prefix with a
//! probability of roughly `n^2 / 2^33` across `n` documents.

use md5::{Digest, Md5};

const DIGEST_PREFIX_LEN: usize = 8;
const RECORD_KEY_PREFIX: &str = "doc";

fn short_digest(input: &str) -> String {
    let digest = format!("{:x}", Md5::digest(input.as_bytes()));
    digest[..DIGEST_PREFIX_LEN].to_string()
}

/// Returns `<digest8>_<name>`. The name is kept verbatim for humans reading the index.
pub fn encode_filename(name: &str) -> String {
    format!("{}_{}", short_digest(name), name)
}

/// Inverse of [`encode_filename`]. Tokens without `_` were never encoded and come back unchanged.
pub fn decode_filename(token: &str) -> &str {
    match token.split_once('_') {
        Some((_, original)) => original,
        None => token,
    }
}

/// Record key for one chunk: `doc_<digest8 of encoded name>_<chunk_index>`.
pub fn make_record_key(encoded_filename: &str, chunk_index: usize) -> String {
    format!(
        "{}_{}_{}",
        RECORD_KEY_PREFIX,
        short_digest(encoded_filename),
        chunk_index
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn encode_uses_md5_prefix() {
        assert_eq!(encode_filename("abc"), "90015098_abc");
        assert_eq!(encode_filename(""), "d41d8cd9_");
    }

    #[test]
    fn hebrew_filename_round_trips() {
        let name = "דוח_כספי 2024.pdf";
        let encoded = encode_filename(name);
        assert!(encoded[..8].chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(decode_filename(&encoded), name);
    }

    #[test]
    fn decode_without_separator_is_identity() {
        assert_eq!(decode_filename("plain.txt"), "plain.txt");
    }

    #[test]
    fn record_key_is_ascii_and_stable() {
        let encoded = encode_filename("מסמך.txt");
        let first = make_record_key(&encoded, 7);
        let second = make_record_key(&encoded, 7);
        assert_eq!(first, second);
        assert!(first.is_ascii());
        assert!(first.starts_with("doc_"));
        assert!(first.ends_with("_7"));
        assert_eq!(first.len(), "doc_".len() + 8 + "_7".len());
    }

    #[test]
    fn record_keys_differ_by_chunk_index() {
        let encoded = encode_filename("a.pdf");
        assert_ne!(make_record_key(&encoded, 0), make_record_key(&encoded, 1));
    }

    fn filename_strategy() -> impl Strategy<Value = String> {
        prop_oneof![
            any::<String>(),
            "[\u{05D0}-\u{05EA} _.0-9]{1,24}",
            "[a-zA-Z0-9 _.-]{1,24}",
        ]
    }

    proptest! {
        #[test]
        fn prop_decode_inverts_encode(name in filename_strategy()) {
            let encoded = encode_filename(&name);
            prop_assert_eq!(decode_filename(&encoded), name.as_str());
        }

        #[test]
        fn prop_distinct_names_encode_distinctly(
            first in filename_strategy(),
            second in filename_strategy(),
        ) {
            prop_assume!(first != second);
            prop_assert_ne!(encode_filename(&first), encode_filename(&second));
        }

        #[test]
        fn prop_record_key_is_deterministic(name in filename_strategy(), index in 0usize..10_000) {
            let encoded = encode_filename(&name);
            prop_assert_eq!(make_record_key(&encoded, index), make_record_key(&encoded, index));
            prop_assert!(make_record_key(&encoded, index).is_ascii());
        }
    }
}
