use std::path::{Path, PathBuf};

use crate::core::error::{LauncherError, LauncherResult};

/// Every on-disk location, derived from one data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LauncherPaths {
    root: PathBuf,
}

impl LauncherPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // ── Versions ────────────────────────────────────────

    pub fn versions_dir(&self) -> PathBuf {
        self.root.join("versions")
    }

    pub fn version_dir(&self, id: &str) -> PathBuf {
        self.versions_dir().join(id)
    }

    pub fn descriptor_file(&self, id: &str) -> PathBuf {
        self.version_dir(id).join(format!("{}.json", id))
    }

    pub fn client_jar(&self, id: &str) -> PathBuf {
        self.version_dir(id).join(format!("{}.jar", id))
    }

    pub fn natives_dir(&self, id: &str) -> PathBuf {
        self.version_dir(id).join("natives")
    }

    // ── Libraries ───────────────────────────────────────

    pub fn libraries_dir(&self) -> PathBuf {
        self.root.join("libraries")
    }

    pub fn library(&self, relative: &Path) -> PathBuf {
        self.libraries_dir().join(relative)
    }

    // ── Assets ──────────────────────────────────────────

    pub fn assets_dir(&self) -> PathBuf {
        self.root.join("assets")
    }

    pub fn asset_index_file(&self, id: &str) -> PathBuf {
        self.assets_dir().join("indexes").join(format!("{}.json", id))
    }

    pub fn objects_dir(&self) -> PathBuf {
        self.assets_dir().join("objects")
    }

    /// `objects/<hash[0:2]>/<hash>`. Hashes shorter than two characters
    /// land directly under `objects/`.
    pub fn asset_object(&self, hash: &str) -> PathBuf {
        match hash.get(..2) {
            Some(prefix) => self.objects_dir().join(prefix).join(hash),
            None => self.objects_dir().join(hash),
        }
    }

    pub fn virtual_assets_dir(&self, index_id: &str) -> PathBuf {
        self.assets_dir().join("virtual").join(index_id)
    }

    pub fn log_config(&self, file_id: &str) -> PathBuf {
        self.assets_dir().join("log_configs").join(file_id)
    }

    // ── Runtimes ────────────────────────────────────────

    pub fn runtimes_dir(&self) -> PathBuf {
        self.root.join("runtimes")
    }

    /// Create the top-level directory tree.
    pub async fn ensure_layout(&self) -> LauncherResult<()> {
        for dir in [
            self.versions_dir(),
            self.libraries_dir(),
            self.objects_dir(),
            self.assets_dir().join("indexes"),
            self.runtimes_dir(),
        ] {
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| LauncherError::io(&dir, e))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_files_live_under_their_id() {
        let paths = LauncherPaths::new("/data");
        assert_eq!(paths.descriptor_file("1.20.4"), PathBuf::from("/data/versions/1.20.4/1.20.4.json"));
        assert_eq!(paths.client_jar("1.20.4"), PathBuf::from("/data/versions/1.20.4/1.20.4.jar"));
        assert_eq!(paths.natives_dir("1.20.4"), PathBuf::from("/data/versions/1.20.4/natives"));
    }

    #[test]
    fn asset_objects_are_content_addressed() {
        let paths = LauncherPaths::new("/data");
        assert_eq!(
            paths.asset_object("bdf48ef6b5d0d23bbb02e17d04865216179f510a"),
            PathBuf::from("/data/assets/objects/bd/bdf48ef6b5d0d23bbb02e17d04865216179f510a")
        );
        assert_eq!(paths.asset_index_file("17"), PathBuf::from("/data/assets/indexes/17.json"));
        assert_eq!(paths.asset_object("a"), PathBuf::from("/data/assets/objects/a"));
    }

    #[tokio::test]
    async fn ensure_layout_creates_directories() {
        let temp = tempfile::tempdir().unwrap();
        let paths = LauncherPaths::new(temp.path());
        paths.ensure_layout().await.unwrap();
        assert!(paths.objects_dir().is_dir());
        assert!(paths.runtimes_dir().is_dir());
    }
}
