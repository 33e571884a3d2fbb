use std::sync::Arc;
use yoki_crypto::*;

fn aes_gcm(password: &str) -> AeadEncryptor {
    AeadEncryptor::builder()
        .derived_key(password, "integration-salt")
        .unwrap()
        .compression(true)
        .build()
        .expect("Encryptor setup failed")
}

#[test]
fn test_trait_objects_roundtrip() {
    let encryptors: Vec<Arc<dyn Encryptor>> = vec![
        Arc::new(AesCbc::from_password("pw").unwrap()),
        Arc::new(aes_gcm("pw")),
        Arc::new(AeadEncryptor::<ChaCha>::builder().key([7u8; 32]).build().unwrap()),
    ];

    let data = b"header stays plain, table is sealed".to_vec();
    for encryptor in encryptors {
        let sealed = encryptor.encrypt(&data).unwrap();
        assert_ne!(sealed, data, "{} must not be the identity", encryptor.algorithm());
        assert_eq!(encryptor.decrypt(&sealed).unwrap(), data);
    }
}

#[test]
fn test_wrong_password_is_detected_by_aead() {
    let sealed = aes_gcm("right").encrypt(b"secret progress").unwrap();

    let result = aes_gcm("wrong").decrypt(&sealed);
    assert!(
        matches!(result, Err(CryptoError::Decryption { .. })),
        "Must fail with Decryption when the key is wrong"
    );
}

#[test]
fn test_context_binding() {
    let base = || AeadEncryptor::<Aes>::builder().key([1u8; 32]);
    let slot_a = base().context("slot-a").build().unwrap();
    let slot_b = base().context("slot-b").build().unwrap();

    let sealed = slot_a.encrypt(b"bound").unwrap();
    assert_eq!(slot_a.decrypt(&sealed).unwrap(), b"bound");
    assert!(matches!(slot_b.decrypt(&sealed), Err(CryptoError::Decryption { .. })));
}

#[test]
fn test_tampering_is_detected() {
    let enc = aes_gcm("pw");
    let mut sealed = enc.encrypt(b"gold = 100").unwrap();
    let last = sealed.len() - 1;
    sealed[last] ^= 0x01;

    assert!(matches!(enc.decrypt(&sealed), Err(CryptoError::Decryption { .. })));
}

#[test]
fn test_cbc_wrong_password_never_returns_the_plaintext() {
    let sealed = AesCbc::from_password("right").unwrap().encrypt(b"secret progress").unwrap();

    match AesCbc::from_password("wrong").unwrap().decrypt(&sealed) {
        Ok(garbage) => assert_ne!(garbage, b"secret progress"),
        Err(err) => assert!(matches!(err, CryptoError::Decryption { .. })),
    }
}

#[test]
fn test_empty_password_is_rejected() {
    let result = AeadEncryptor::<Aes>::builder().derived_key("", "salt");
    assert!(matches!(result, Err(CryptoError::InvalidConfiguration { .. })));
}
