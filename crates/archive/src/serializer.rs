use crate::error::ArchiveError;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Turns module values into bytes and back.
///
/// The archive calls the serializer once per module: values are never mixed in a single
/// stream, so a module can be decoded without touching its neighbours.
///
/// Serde's generic methods keep this trait from being object safe; the archive and the save
/// manager are generic over it instead, defaulting to [`Postcard`].
pub trait Serializer: Send + Sync + 'static {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, ArchiveError>;

    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, ArchiveError>;
}

/// Compact binary encoding through `postcard`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Postcard;

impl Serializer for Postcard {
    fn name(&self) -> &'static str {
        "postcard"
    }

    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, ArchiveError> {
        postcard::to_stdvec(value)
            .map_err(|err| ArchiveError::serialization(err, "Postcard encoding failed"))
    }

    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, ArchiveError> {
        postcard::from_bytes(bytes)
            .map_err(|err| ArchiveError::serialization(err, "Postcard decoding failed"))
    }
}

/// Human-readable encoding through `serde_json`; handy while debugging save files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Json {
    pub pretty: bool,
}

impl Json {
    #[must_use]
    pub const fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl Serializer for Json {
    fn name(&self) -> &'static str {
        "json"
    }

    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, ArchiveError> {
        let encoded =
            if self.pretty { serde_json::to_vec_pretty(value) } else { serde_json::to_vec(value) };
        encoded.map_err(|err| ArchiveError::serialization(err, "JSON encoding failed"))
    }

    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, ArchiveError> {
        serde_json::from_slice(bytes)
            .map_err(|err| ArchiveError::serialization(err, "JSON decoding failed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Stats {
        level: u32,
        name: String,
    }

    fn stats() -> Stats {
        Stats { level: 12, name: "Yoki".into() }
    }

    #[test]
    fn postcard_is_compact() {
        let bytes = Postcard.serialize(&stats()).unwrap();
        assert_eq!(bytes, [12, 4, b'Y', b'o', b'k', b'i']);
        assert_eq!(Postcard.deserialize::<Stats>(&bytes).unwrap(), stats());
    }

    #[test]
    fn json_is_readable() {
        let bytes = Json::default().serialize(&stats()).unwrap();
        assert_eq!(bytes, br#"{"level":12,"name":"Yoki"}"#);
        assert!(Json::pretty().serialize(&stats()).unwrap().contains(&b'\n'));
    }

    #[test]
    fn decoding_garbage_is_a_serialization_error() {
        let err = Json::default().deserialize::<Stats>(b"not json").unwrap_err();
        assert!(matches!(err, ArchiveError::Serialization { .. }));

        let err = Postcard.deserialize::<Stats>(&[0xFF]).unwrap_err();
        assert!(matches!(err, ArchiveError::Serialization { .. }));
    }
}
