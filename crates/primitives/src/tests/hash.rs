use claims::{assert_err, assert_ok};

use super::*;

#[test]
fn base58_roundtrip() {
    let hash = Hash::new(b"tableraft");
    let encoded = hash.to_string();

    let decoded: Hash = assert_ok!(encoded.parse());
    assert_eq!(decoded, hash);
}

#[test]
fn parse_rejects_short_input() {
    let short = bs58::encode([7_u8; 8]).into_string();

    assert!(matches!(short.parse::<Hash>(), Err(Error::InvalidLength)));
}

#[test]
fn parse_rejects_invalid_alphabet() {
    assert_err!("0OIl".parse::<Hash>());
}

#[test]
fn serde_uses_base58_strings() {
    let hash = Hash::from([3; 32]);
    let json = serde_json::to_string(&hash).unwrap();

    assert_eq!(json, format!("\"{hash}\""));
    assert_eq!(serde_json::from_str::<Hash>(&json).unwrap(), hash);
}

#[test]
fn borsh_hash_is_stable() {
    let first = Hash::hash_borsh(&(1_u64, "key")).unwrap();
    let second = Hash::hash_borsh(&(1_u64, "key")).unwrap();
    let other = Hash::hash_borsh(&(2_u64, "key")).unwrap();

    assert_eq!(first, second);
    assert_ne!(first, other);
}

#[test]
fn zero_hash() {
    assert!(Hash::ZERO.is_zero());
    assert!(Hash::default().is_zero());
    assert!(!Hash::new(b"").is_zero());
}
