use anyhow::{bail, Context, Result};
use std::{
    ffi::OsStr,
    fs, io,
    path::{Component, Path, PathBuf},
};
use walkdir::WalkDir;

/// Fully unpacks `zip_path` into `dest_root`, rejecting entries that would
/// escape it.
pub fn extract_zip(zip_path: &Path, dest_root: &Path) -> Result<()> {
    let file = fs::File::open(zip_path)
        .with_context(|| format!("open {}", zip_path.display()))?;
    let mut zip = zip::ZipArchive::new(file)
        .with_context(|| format!("read zip {}", zip_path.display()))?;

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        let name = entry.name().to_owned();
        let path = Path::new(&name);
        if path.is_absolute()
            || path
                .components()
                .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
        {
            bail!("invalid path in release archive: {name}");
        }

        let out_path = dest_root.join(path);
        if entry.is_dir() {
            fs::create_dir_all(&out_path)
                .with_context(|| format!("create {}", out_path.display()))?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        let mut out_file = fs::File::create(&out_path)
            .with_context(|| format!("create {}", out_path.display()))?;
        io::copy(&mut entry, &mut out_file)
            .with_context(|| format!("write {}", out_path.display()))?;
    }

    Ok(())
}

/// First file named `file_name` under `root`, depth-first.
pub fn find_file(root: &Path, file_name: &str) -> Option<PathBuf> {
    let wanted = OsStr::new(file_name);
    WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .find(|entry| entry.file_type().is_file() && entry.file_name() == wanted)
        .map(|entry| entry.into_path())
}

/// Like [`find_file`], but prefers a hit whose directory path contains
/// `preferred_dir` as a substring (so `raux_ux_installer/` counts for
/// `ux_installer`); falls back to the first hit anywhere.
pub fn find_file_preferring(
    root: &Path,
    file_name: &str,
    preferred_dir: &str,
) -> Option<PathBuf> {
    let wanted = OsStr::new(file_name);
    let mut fallback = None;
    for entry in WalkDir::new(root).into_iter().filter_map(|entry| entry.ok()) {
        if !entry.file_type().is_file() || entry.file_name() != wanted {
            continue;
        }
        let path = entry.into_path();
        let in_preferred = path
            .parent()
            .is_some_and(|dir| dir.to_string_lossy().contains(preferred_dir));
        if in_preferred {
            return Some(path);
        }
        if fallback.is_none() {
            fallback = Some(path);
        }
    }
    fallback
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let file = fs::File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::FileOptions::default();
        for (name, contents) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(contents.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn extract_zip_unpacks_nested_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let zip_path = tmp.path().join("raux.zip");
        write_zip(
            &zip_path,
            &[
                ("raux-main/install.py", "print('hi')"),
                ("raux-main/scripts/launch_raux.cmd", "@echo off"),
            ],
        );

        let dest = tmp.path().join("extracted_files");
        fs::create_dir_all(&dest).unwrap();
        extract_zip(&zip_path, &dest).unwrap();

        assert!(dest.join("raux-main").join("install.py").exists());
        assert!(dest
            .join("raux-main")
            .join("scripts")
            .join("launch_raux.cmd")
            .exists());
    }

    #[test]
    fn extract_zip_rejects_parent_components() {
        let tmp = tempfile::tempdir().unwrap();
        let zip_path = tmp.path().join("evil.zip");
        write_zip(&zip_path, &[("../escape.txt", "nope")]);

        let dest = tmp.path().join("extracted_files");
        fs::create_dir_all(&dest).unwrap();
        let err = extract_zip(&zip_path, &dest).unwrap_err();
        assert!(err.to_string().contains("invalid path"));
        assert!(!tmp.path().join("escape.txt").exists());
    }

    #[test]
    fn find_file_walks_subdirectories() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join(".env.example"), "KEY=value").unwrap();

        let found = find_file(tmp.path(), ".env.example").unwrap();
        assert_eq!(found, nested.join(".env.example"));
        assert!(find_file(tmp.path(), "missing.txt").is_none());
    }

    #[test]
    fn find_file_preferring_picks_preferred_dir_first() {
        let tmp = tempfile::tempdir().unwrap();
        let other = tmp.path().join("aaa");
        let preferred = tmp.path().join("zzz").join("ux_installer");
        fs::create_dir_all(&other).unwrap();
        fs::create_dir_all(&preferred).unwrap();
        fs::write(other.join("install.py"), "wrong").unwrap();
        fs::write(preferred.join("install.py"), "right").unwrap();

        let found = find_file_preferring(tmp.path(), "install.py", "ux_installer").unwrap();
        assert_eq!(found, preferred.join("install.py"));
    }

    #[test]
    fn find_file_preferring_matches_partial_directory_names() {
        let tmp = tempfile::tempdir().unwrap();
        let other = tmp.path().join("aaa");
        let preferred = tmp.path().join("raux_ux_installer");
        fs::create_dir_all(&other).unwrap();
        fs::create_dir_all(&preferred).unwrap();
        fs::write(other.join("install.py"), "wrong").unwrap();
        fs::write(preferred.join("install.py"), "right").unwrap();

        let found = find_file_preferring(tmp.path(), "install.py", "ux_installer").unwrap();
        assert_eq!(found, preferred.join("install.py"));
    }

    #[test]
    fn find_file_preferring_falls_back_to_any_hit() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("somewhere");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("install.py"), "only").unwrap();

        let found = find_file_preferring(tmp.path(), "install.py", "ux_installer").unwrap();
        assert_eq!(found, dir.join("install.py"));
    }
}
