//! Path resolution utilities.

use std::path::{Path, PathBuf};

/// Expands a leading `~` to the user's home directory.
///
/// Paths without a leading `~` are returned unchanged, as is everything when
/// the home directory cannot be determined.
///
/// # Example
///
/// ```
/// use bencao_core::util::paths::expand_tilde;
///
/// let expanded = expand_tilde("/srv/chroma_db");
/// assert_eq!(expanded, std::path::PathBuf::from("/srv/chroma_db"));
/// ```
pub fn expand_tilde<P: AsRef<Path>>(path: P) -> PathBuf {
    let path = path.as_ref();
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_tilde_with_tilde() {
        let path = expand_tilde("~/bencao/chroma_db");
        if let Some(home) = dirs::home_dir() {
            assert!(path.starts_with(&home));
            assert!(path.ends_with("bencao/chroma_db"));
        }
    }

    #[test]
    fn test_expand_tilde_absolute_unchanged() {
        let original = PathBuf::from("/var/lib/bencao");
        assert_eq!(expand_tilde(&original), original);
    }

    #[test]
    fn test_expand_tilde_relative_unchanged() {
        let original = PathBuf::from("chroma_db");
        assert_eq!(expand_tilde(&original), original);
    }

    #[test]
    fn test_expand_tilde_only() {
        let path = expand_tilde("~");
        if let Some(home) = dirs::home_dir() {
            assert_eq!(path, home);
        }
    }
}
