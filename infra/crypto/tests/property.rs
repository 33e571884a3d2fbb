use proptest::prelude::*;
use yoki_crypto::*;

proptest! {
    #[test]
    fn roundtrip_arbitrary_bytes(data in proptest::collection::vec(any::<u8>(), 0..2048)) {
        let cbc = AesCbc::from_password("pw").unwrap();
        prop_assert_eq!(&cbc.decrypt(&cbc.encrypt(&data).unwrap()).unwrap(), &data);

        let chacha = AeadEncryptor::<ChaCha>::builder()
            .compression(true)
            .derived_key("ikm", "salt")
            .unwrap()
            .build()
            .unwrap();
        prop_assert_eq!(chacha.decrypt(&chacha.encrypt(&data).unwrap()).unwrap(), data);
    }

    #[test]
    fn garbage_never_panics(data in proptest::collection::vec(any::<u8>(), 0..256)) {
        let aead = AeadEncryptor::<Aes>::builder().key([3u8; 32]).build().unwrap();
        prop_assert!(aead.decrypt(&data).is_err());

        let cbc = AesCbc::from_password("pw").unwrap();
        let _ = cbc.decrypt(&data);
    }
}
