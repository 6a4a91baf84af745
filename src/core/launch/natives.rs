use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::state::LauncherPaths;
use crate::core::version::{RuleEnv, VersionDescriptor};

const ALWAYS_EXCLUDED: &str = "META-INF/";

/// Clear `versions/<id>/natives` and unpack every applicable native archive
/// into it. Archives missing from the library store, or that fail to
/// unpack, are skipped with a warning.
pub async fn extract_natives(
    descriptor: &VersionDescriptor,
    env: &RuleEnv,
    paths: &LauncherPaths,
) -> LauncherResult<PathBuf> {
    let natives_dir = paths.natives_dir(&descriptor.id);

    if natives_dir.exists() {
        tokio::fs::remove_dir_all(&natives_dir)
            .await
            .map_err(|e| LauncherError::io(&natives_dir, e))?;
    }
    tokio::fs::create_dir_all(&natives_dir)
        .await
        .map_err(|e| LauncherError::io(&natives_dir, e))?;

    let mut archives = Vec::new();
    for lib in descriptor.partition_libraries(env).applicable {
        let Some(native) = lib.native_artifact(env.platform) else {
            continue;
        };
        let archive = paths.library(&native.path);
        if !archive.is_file() {
            warn!("Native archive for {} missing at {:?}", lib.name, archive);
            continue;
        }
        let mut excludes = lib.extract_excludes().to_vec();
        excludes.push(ALWAYS_EXCLUDED.to_string());
        archives.push((archive, excludes));
    }

    let dest = natives_dir.clone();
    let extracted = tokio::task::spawn_blocking(move || -> LauncherResult<usize> {
        let mut total = 0;
        for (archive, excludes) in &archives {
            match extract_archive(archive, &dest, excludes) {
                Ok(count) => total += count,
                Err(e) => warn!("Failed to extract native {:?}: {}", archive, e),
            }
        }
        Ok(total)
    })
    .await
    .map_err(|e| LauncherError::Other(format!("Task join error: {}", e)))??;

    info!("Extracted {} native files into {:?}", extracted, natives_dir);
    Ok(natives_dir)
}

fn extract_archive(archive: &Path, dest: &Path, excludes: &[String]) -> LauncherResult<usize> {
    let file = File::open(archive).map_err(|e| LauncherError::io(archive, e))?;
    let mut zip = zip::ZipArchive::new(file)?;
    let mut count = 0;

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        let name = entry.name().to_string();
        if entry.is_dir() || excludes.iter().any(|prefix| name.starts_with(prefix.as_str())) {
            continue;
        }
        // Entries escaping the target directory are ignored.
        let Some(relative) = entry.enclosed_name().map(|p| p.to_path_buf()) else {
            warn!("Skipping unsafe native entry {:?} in {:?}", name, archive);
            continue;
        };

        let target = dest.join(relative);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LauncherError::io(parent, e))?;
        }
        let mut out = File::create(&target).map_err(|e| LauncherError::io(&target, e))?;
        std::io::copy(&mut entry, &mut out).map_err(|e| LauncherError::io(&target, e))?;
        debug!("Extracted native: {}", name);
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::core::platform::PlatformId;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
        let options = zip::write::SimpleFileOptions::default();
        for (name, data) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
    }

    fn descriptor() -> VersionDescriptor {
        serde_json::from_value(serde_json::json!({
            "id": "1.8.9",
            "mainClass": "Main",
            "libraries": [
                {"name": "org.lwjgl.lwjgl:lwjgl-platform:2.9.4",
                 "natives": {"linux": "natives-linux"},
                 "extract": {"exclude": ["docs/"]},
                 "downloads": {"classifiers": {"natives-linux": {"path": "nat/linux.jar", "url": "u"}}}},
                {"name": "x:absent:1", "natives": {"linux": "natives-linux"},
                 "downloads": {"classifiers": {"natives-linux": {"path": "nat/absent.jar", "url": "u"}}}}
            ]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn extracts_with_excludes_and_clears_previous_run() {
        let temp = tempfile::tempdir().unwrap();
        let paths = LauncherPaths::new(temp.path());
        write_zip(
            &paths.library(Path::new("nat/linux.jar")),
            &[
                ("liblwjgl.so", b"elf"),
                ("META-INF/MANIFEST.MF", b"m"),
                ("docs/readme.txt", b"d"),
                ("sub/libopenal.so", b"al"),
            ],
        );
        let stale = paths.natives_dir("1.8.9").join("stale.so");
        std::fs::create_dir_all(stale.parent().unwrap()).unwrap();
        std::fs::write(&stale, b"old").unwrap();

        let dir = extract_natives(&descriptor(), &RuleEnv::new(PlatformId::Linux), &paths)
            .await
            .unwrap();

        assert_eq!(std::fs::read(dir.join("liblwjgl.so")).unwrap(), b"elf");
        assert!(dir.join("sub/libopenal.so").is_file());
        assert!(!dir.join("META-INF").exists());
        assert!(!dir.join("docs").exists());
        assert!(!stale.exists());
    }

    #[tokio::test]
    async fn unreadable_archive_is_skipped() {
        let temp = tempfile::tempdir().unwrap();
        let paths = LauncherPaths::new(temp.path());
        let broken = paths.library(Path::new("nat/linux.jar"));
        std::fs::create_dir_all(broken.parent().unwrap()).unwrap();
        std::fs::write(&broken, b"not a zip").unwrap();
        write_zip(&paths.library(Path::new("nat/absent.jar")), &[("libopenal.so", b"al")]);

        let dir = extract_natives(&descriptor(), &RuleEnv::new(PlatformId::Linux), &paths)
            .await
            .unwrap();

        assert_eq!(std::fs::read(dir.join("libopenal.so")).unwrap(), b"al");
    }

    #[tokio::test]
    async fn platform_without_natives_gets_empty_directory() {
        let temp = tempfile::tempdir().unwrap();
        let paths = LauncherPaths::new(temp.path());

        let dir = extract_natives(&descriptor(), &RuleEnv::new(PlatformId::Osx), &paths)
            .await
            .unwrap();

        assert!(dir.is_dir());
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);
    }
}
