use crate::error::CryptoError;
use hkdf::Hkdf;
use sha2::Sha256;

/// Salt used by the password constructors that do not take one explicitly.
pub const DEFAULT_SALT: &[u8] = b"yoki.saves.v1";

/// Fills `out` with HKDF-SHA256 output keyed by `password` and `salt`, bound to `info`.
///
/// Distinct `info` labels give independent keys from the same password.
pub fn derive(
    password: &[u8],
    salt: &[u8],
    info: &[u8],
    out: &mut [u8],
) -> Result<(), CryptoError> {
    let (_, hk) = Hkdf::<Sha256>::extract(Some(salt), password);
    hk.expand(info, out).map_err(|_| CryptoError::InvalidConfiguration {
        message: format!("HKDF cannot produce {} bytes", out.len()).into(),
        context: Some(String::from_utf8_lossy(info).into_owned().into()),
    })
}
