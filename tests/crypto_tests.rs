//! Integration tests for the credvault crypto module.

use credvault::crypto::keyfile::effective_passphrase;
use credvault::crypto::{
    derive, derive_on_worker, generate_nonce, open, seal, KdfParams, KdfPolicy, VaultCipher,
    NONCE_LEN, TAG_LEN,
};
use credvault::errors::{ErrorKind, VaultError};
use zeroize::Zeroizing;

/// Cheapest parameters the default policy accepts.
fn fast_params() -> KdfParams {
    KdfParams::with_costs(8_192, 1, 1)
}

// ---------------------------------------------------------------------------
// AEAD
// ---------------------------------------------------------------------------

#[test]
fn seal_open_roundtrip() {
    let key = [0xABu8; 32];
    let nonce = [7u8; NONCE_LEN];
    let plaintext = b"username=alice secret=hunter2";

    let sealed = seal(plaintext, &key, &nonce, b"header").expect("seal");
    assert_eq!(sealed.len(), plaintext.len() + TAG_LEN);

    let recovered = open(&sealed, &key, &nonce, b"header").expect("open");
    assert_eq!(recovered.as_slice(), plaintext);
}

#[test]
fn flipping_any_byte_fails_with_auth() {
    let key = [0x11u8; 32];
    let nonce = generate_nonce();
    let sealed = seal(b"short payload", &key, &nonce, b"ad").unwrap();

    for i in 0..sealed.len() {
        let mut tampered = sealed.clone();
        tampered[i] ^= 0x01;
        let result = open(&tampered, &key, &nonce, b"ad");
        assert!(
            matches!(result, Err(VaultError::Auth)),
            "flip at byte {i} was not detected"
        );
    }
}

#[test]
fn associated_data_is_bound() {
    let key = [0x22u8; 32];
    let nonce = generate_nonce();
    let sealed = seal(b"payload", &key, &nonce, b"header-v1").unwrap();

    assert!(matches!(
        open(&sealed, &key, &nonce, b"header-v2"),
        Err(VaultError::Auth)
    ));
}

#[test]
fn wrong_key_and_wrong_nonce_fail_with_auth() {
    let nonce = [1u8; NONCE_LEN];
    let sealed = seal(b"payload", &[0x33u8; 32], &nonce, b"").unwrap();

    assert!(matches!(
        open(&sealed, &[0x34u8; 32], &nonce, b""),
        Err(VaultError::Auth)
    ));
    assert!(matches!(
        open(&sealed, &[0x33u8; 32], &[2u8; NONCE_LEN], b""),
        Err(VaultError::Auth)
    ));
}

#[test]
fn vault_cipher_refuses_nonce_reuse() {
    let mut cipher = VaultCipher::new(Zeroizing::new([0x44u8; 32]));
    let nonce = [9u8; NONCE_LEN];

    cipher.seal(b"first", &nonce, b"").unwrap();
    let second = cipher.seal(b"second", &nonce, b"");
    assert!(matches!(second, Err(VaultError::NonceReuse)));
    assert_eq!(second.unwrap_err().kind(), ErrorKind::NonceReuse);

    // A fresh nonce is still fine.
    cipher.seal(b"second", &[10u8; NONCE_LEN], b"").unwrap();
}

// ---------------------------------------------------------------------------
// Key derivation
// ---------------------------------------------------------------------------

#[test]
fn derive_is_deterministic() {
    let params = fast_params();
    let policy = KdfPolicy::default();

    let a = derive(b"correct horse", &params, &policy).unwrap();
    let b = derive(b"correct horse", &params, &policy).unwrap();
    assert_eq!(a.as_bytes(), b.as_bytes());

    let c = derive(b"correct horsf", &params, &policy).unwrap();
    assert_ne!(a.as_bytes(), c.as_bytes());
}

#[test]
fn different_salts_give_different_keys() {
    let policy = KdfPolicy::default();
    let a = derive(b"pw", &fast_params(), &policy).unwrap();
    let b = derive(b"pw", &fast_params(), &policy).unwrap();
    assert_ne!(a.as_bytes(), b.as_bytes());
}

#[test]
fn weak_parameters_are_rejected() {
    let policy = KdfPolicy::default();

    let low_memory = KdfParams::with_costs(1_024, 1, 1);
    let err = derive(b"pw", &low_memory, &policy).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::WeakParameter);

    let no_iterations = KdfParams::with_costs(8_192, 0, 1);
    let err = derive(b"pw", &no_iterations, &policy).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::WeakParameter);
}

#[test]
fn stricter_policy_rejects_default_test_params() {
    let policy = KdfPolicy {
        min_memory_kib: 16_384,
        min_iterations: 2,
        ..KdfPolicy::default()
    };
    assert!(matches!(
        policy.check(&fast_params()),
        Err(VaultError::WeakParameter(_))
    ));
}

#[test]
fn worker_derivation_matches_inline() {
    let params = fast_params();
    let policy = KdfPolicy::default();

    let inline = derive(b"threaded", &params, &policy).unwrap();
    let handle = derive_on_worker(Zeroizing::new(b"threaded".to_vec()), params, policy);
    let worker = handle.join().expect("worker thread panicked").unwrap();

    assert_eq!(inline.as_bytes(), worker.as_bytes());
}

#[test]
fn keyfile_changes_the_derived_key() {
    let params = fast_params();
    let policy = KdfPolicy::default();

    let plain = effective_passphrase(b"pw", None).unwrap();
    let with_kf = effective_passphrase(b"pw", Some(&[1u8; 32])).unwrap();
    let other_kf = effective_passphrase(b"pw", Some(&[2u8; 32])).unwrap();

    let k0 = derive(&plain, &params, &policy).unwrap();
    let k1 = derive(&with_kf, &params, &policy).unwrap();
    let k2 = derive(&other_kf, &params, &policy).unwrap();
    assert_ne!(k0.as_bytes(), k1.as_bytes());
    assert_ne!(k1.as_bytes(), k2.as_bytes());
}

#[test]
fn payload_key_differs_from_master_key() {
    let master = derive(b"pw", &fast_params(), &KdfPolicy::default()).unwrap();
    let payload = master.derive_payload_key().unwrap();
    assert_ne!(&payload[..], &master.as_bytes()[..]);
}
