//=========================================================================
// Byte Fetchers
//=========================================================================
//
// Resources separate *getting bytes* from *decoding bytes*. A `Fetcher`
// is the getting half: given a resolved URL it returns the raw content,
// synchronously, from whatever backing store it wraps. Resource workers
// call it off-thread, so implementations must be shareable.
//
//=========================================================================

//=== Standard Library Imports ============================================

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::PathBuf;

//=== Internal Dependencies ===============================================

use crate::util;

//=== FetchError ==========================================================

/// Why a fetch produced no bytes.
#[derive(Debug)]
pub enum FetchError {
    /// Nothing exists at the URL.
    NotFound(String),
    /// The URL escapes the fetcher's root directory.
    OutsideRoot(String),
    /// The backing store failed while reading.
    Io { url: String, source: io::Error },
}

//--- Trait Implementations -----------------------------------------------

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(url) => write!(f, "nothing found at {}", url),
            Self::OutsideRoot(url) => write!(f, "{} escapes the resource root", url),
            Self::Io { url, source } => write!(f, "reading {} failed: {}", url, source),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

//=== Fetcher Trait =======================================================

/// Retrieves the raw bytes behind a URL.
///
/// One fetcher is shared by every resource of a loader and is called
/// from worker threads, hence `Send + Sync`.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

//=== FsFetcher ===========================================================

/// Serves URLs from files beneath a root directory.
///
/// URLs are interpreted relative to the root regardless of leading
/// slashes, and paths that would climb above the root are rejected.
pub struct FsFetcher {
    root: PathBuf,
}

impl FsFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Fetcher for FsFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let relative = relative_path(url)?;
        let path = self.root.join(relative);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(FetchError::NotFound(url.to_string()))
            }
            Err(e) => Err(FetchError::Io { url: url.to_string(), source: e }),
        }
    }
}

/// Normalizes a URL into a root-relative path. `..` components may move
/// within the URL's own directories but never above the root.
fn relative_path(url: &str) -> Result<PathBuf, FetchError> {
    let trimmed = util::strip_query(url).trim_start_matches('/');
    let mut depth: i32 = 0;
    let mut path = PathBuf::new();
    for part in trimmed.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                depth -= 1;
                if depth < 0 {
                    return Err(FetchError::OutsideRoot(url.to_string()));
                }
                path.pop();
            }
            name => {
                depth += 1;
                path.push(name);
            }
        }
    }
    Ok(path)
}

//=== MemoryFetcher =======================================================

/// Serves URLs from an in-memory byte map. Useful for embedded assets
/// and tests.
#[derive(Default)]
pub struct MemoryFetcher {
    entries: HashMap<String, Vec<u8>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a URL entry, builder style.
    pub fn with(mut self, url: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(url, bytes);
        self
    }

    pub fn insert(&mut self, url: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.entries.insert(url.into(), bytes.into());
    }
}

impl Fetcher for MemoryFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.entries
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(url.to_string()))
    }
}

//=== Tests ===============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// Temp directory removed on drop.
    struct TempRoot(PathBuf);

    impl TempRoot {
        fn new(tag: &str) -> Self {
            let dir = std::env::temp_dir().join(format!("vellum_fetch_{}_{}", tag, std::process::id()));
            fs::create_dir_all(&dir).unwrap();
            Self(dir)
        }
    }

    impl Drop for TempRoot {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.0);
        }
    }

    //--- relative_path ----------------------------------------------------

    #[test]
    fn relative_path_normalizes() {
        assert_eq!(relative_path("a/b.png").unwrap(), PathBuf::from("a/b.png"));
        assert_eq!(relative_path("/a/b.png").unwrap(), PathBuf::from("a/b.png"));
        assert_eq!(relative_path("./a/../b.png").unwrap(), PathBuf::from("b.png"));
        assert_eq!(relative_path("a/b.png?v=1").unwrap(), PathBuf::from("a/b.png"));
    }

    #[test]
    fn relative_path_rejects_escapes() {
        assert!(matches!(relative_path("../secret"), Err(FetchError::OutsideRoot(_))));
        assert!(matches!(relative_path("a/../../secret"), Err(FetchError::OutsideRoot(_))));
    }

    //--- FsFetcher --------------------------------------------------------

    #[test]
    fn fs_fetcher_reads_files_under_root() {
        let root = TempRoot::new("reads");
        fs::write(root.0.join("data.bin"), b"payload").unwrap();

        let fetcher = FsFetcher::new(&root.0);
        assert_eq!(fetcher.fetch("data.bin").unwrap(), b"payload");
        assert_eq!(fetcher.fetch("/data.bin").unwrap(), b"payload");
        assert_eq!(fetcher.fetch("data.bin?v=3").unwrap(), b"payload");
    }

    #[test]
    fn fs_fetcher_reports_missing_files() {
        let root = TempRoot::new("missing");
        let fetcher = FsFetcher::new(&root.0);
        assert!(matches!(fetcher.fetch("nope.bin"), Err(FetchError::NotFound(_))));
    }

    #[test]
    fn fs_fetcher_rejects_root_escapes() {
        let root = TempRoot::new("escape");
        let fetcher = FsFetcher::new(&root.0);
        assert!(matches!(fetcher.fetch("../outside.bin"), Err(FetchError::OutsideRoot(_))));
    }

    //--- MemoryFetcher ----------------------------------------------------

    #[test]
    fn memory_fetcher_round_trips() {
        let fetcher = MemoryFetcher::new().with("a.json", b"{}".to_vec());
        assert_eq!(fetcher.fetch("a.json").unwrap(), b"{}");
        assert!(matches!(fetcher.fetch("b.json"), Err(FetchError::NotFound(_))));
    }

    //--- FetchError -------------------------------------------------------

    #[test]
    fn io_errors_keep_their_source() {
        use std::error::Error;
        let err = FetchError::Io {
            url: "x".into(),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.source().is_some());
        assert!(err.to_string().contains("denied"));
    }
}
