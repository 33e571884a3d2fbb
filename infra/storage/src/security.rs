use crate::error::StorageError;
use std::path::{Component, Path, PathBuf};

/// Marker embedded in temporary file names; files carrying it are never listed.
pub(crate) const TMP_MARKER: &str = ".yokitmp.";

/// Accepts exactly one normal path component.
///
/// Save files live flat in the root, so separators, `.`/`..`, absolute paths and the
/// temp-file marker are all rejected.
pub(crate) fn validate_file_name(name: &str) -> Result<&str, StorageError> {
    let invalid = |reason: &'static str| StorageError::InvalidFileName {
        message: name.to_owned().into(),
        context: Some(reason.into()),
    };

    if name.is_empty() {
        return Err(invalid("File name cannot be empty"));
    }
    if name.contains(TMP_MARKER) {
        return Err(invalid("File name uses the reserved temp marker"));
    }

    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(seg)), None) if seg == name => Ok(name),
        (Some(Component::Normal(_)), _) => Err(invalid("Nested paths are not allowed")),
        (Some(Component::RootDir | Component::Prefix(_)), _) => {
            Err(invalid("Absolute paths are not allowed in sandbox"))
        },
        _ => Err(invalid("Relative path segments are not allowed")),
    }
}

/// Joins a validated file name onto the canonical root.
pub(crate) fn resolve(root: &Path, name: &str) -> Result<PathBuf, StorageError> {
    let name = validate_file_name(name)?;
    Ok(root.join(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_names() {
        assert!(validate_file_name("save_0.yoki").is_ok());
        assert!(validate_file_name("slot").is_ok());
    }

    #[test]
    fn rejects_anything_but_a_single_component() {
        for bad in ["", "a/b", "../save_0.yoki", "..", ".", "/etc/passwd", "x.yokitmp.3"] {
            assert!(
                matches!(validate_file_name(bad), Err(StorageError::InvalidFileName { .. })),
                "{bad:?} should be rejected"
            );
        }
    }
}
