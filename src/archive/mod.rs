//! Repository snapshot download and extraction.
//!
//! Fetches a repository tarball, extracts it into a scratch directory, and
//! atomically swaps the scratch directory onto the destination. GitHub wraps
//! tarball contents in a single `{owner}-{repo}-{sha}/` directory, so exactly
//! one leading path component is stripped during extraction.
//!
//! The extract-then-swap ordering is the point: a failure during download or
//! extraction leaves the destination untouched. The scratch directory is
//! created next to the destination so the final rename stays on one
//! filesystem.

use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use tracing::{debug, info, warn};

use crate::error::{FetchStep, SyncError};
use crate::github::client::error_detail;
use crate::github::token::API_ROOT;
use crate::github::GitHubClient;

/// Download and extract `owner/repo` at `ref`, replacing `dest` with the
/// repository's root-level contents.
pub async fn fetch(
    client: &GitHubClient,
    owner: &str,
    repo: &str,
    git_ref: &str,
    dest: &Path,
) -> Result<(), SyncError> {
    let url = format!("{}/repos/{}/{}/tarball/{}", API_ROOT, owner, repo, git_ref);
    debug!(url = %url, "Downloading tarball");

    // Redirects (GitHub answers 302 to a codeload URL) are followed by the
    // client itself.
    let response = client
        .get(&url, |detail| SyncError::fetch(FetchStep::Download, detail))
        .await?;

    if !response.status().is_success() {
        return Err(SyncError::fetch(
            FetchStep::Download,
            error_detail(response).await,
        ));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| SyncError::fetch(FetchStep::Download, format!("failed to read body: {}", e)))?;

    let archive = tempfile::NamedTempFile::new().map_err(|e| {
        SyncError::fetch(
            FetchStep::Download,
            format!("failed to create temp archive: {}", e),
        )
    })?;
    std::fs::write(archive.path(), &bytes).map_err(|e| {
        SyncError::fetch(
            FetchStep::Download,
            format!("failed to write temp archive: {}", e),
        )
    })?;
    debug!(bytes = bytes.len(), "Tarball downloaded");

    // Extraction and the swap are blocking filesystem work; the temp archive
    // moves into the task and is removed when it drops, success or not.
    let dest = dest.to_path_buf();
    let count = tokio::task::spawn_blocking(move || {
        let scratch_parent = parent_of(&dest);
        std::fs::create_dir_all(scratch_parent).map_err(|e| {
            SyncError::fetch(
                FetchStep::Extract,
                format!("failed to prepare {}: {}", scratch_parent.display(), e),
            )
        })?;
        let scratch = tempfile::Builder::new()
            .prefix(".repolink-fetch-")
            .tempdir_in(scratch_parent)
            .map_err(|e| {
                SyncError::fetch(
                    FetchStep::Extract,
                    format!("failed to create scratch dir: {}", e),
                )
            })?;

        let count = extract_tarball(archive.path(), scratch.path())?;
        swap_into_place(scratch.path(), &dest)?;
        // The scratch tree now lives at dest; disarm the guard so drop does
        // not chase the renamed directory. On the error paths above the
        // guard still owns the tree and removes it.
        let _ = scratch.keep();
        Ok::<usize, SyncError>(count)
    })
    .await
    .map_err(|e| SyncError::fetch(FetchStep::Extract, format!("extraction task failed: {}", e)))??;

    info!(files = count, "Repository snapshot extracted");
    Ok(())
}

fn parent_of(dest: &Path) -> &Path {
    match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

/// Drop the tarball's single wrapper directory from an entry path.
///
/// Returns `None` for the wrapper itself and for metadata entries such as
/// `pax_global_header` that have no second component.
fn strip_root(path: &Path) -> Option<PathBuf> {
    let stripped: PathBuf = path.components().skip(1).collect();
    if stripped.as_os_str().is_empty() {
        None
    } else {
        Some(stripped)
    }
}

/// Extract a gzipped tarball into `dest`, stripping one leading component.
/// Returns the number of entries unpacked.
fn extract_tarball(archive_path: &Path, dest: &Path) -> Result<usize, SyncError> {
    let file = std::fs::File::open(archive_path).map_err(|e| {
        SyncError::fetch(FetchStep::Extract, format!("failed to open archive: {}", e))
    })?;
    let mut archive = tar::Archive::new(GzDecoder::new(file));

    let mut count = 0;
    let entries = archive.entries().map_err(|e| {
        SyncError::fetch(FetchStep::Extract, format!("failed to read archive: {}", e))
    })?;

    for entry in entries {
        let mut entry = entry.map_err(|e| {
            SyncError::fetch(FetchStep::Extract, format!("corrupt archive entry: {}", e))
        })?;
        let entry_path = entry
            .path()
            .map_err(|e| {
                SyncError::fetch(FetchStep::Extract, format!("invalid entry path: {}", e))
            })?
            .into_owned();

        let Some(relative) = strip_root(&entry_path) else {
            continue;
        };

        // Entries that would land outside the scratch dir are skipped.
        if relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, Component::ParentDir))
        {
            warn!(path = %entry_path.display(), "Skipping entry with suspicious path");
            continue;
        }

        let out_path = dest.join(&relative);
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                SyncError::fetch(
                    FetchStep::Extract,
                    format!("failed to create {}: {}", parent.display(), e),
                )
            })?;
        }

        entry.unpack(&out_path).map_err(|e| {
            SyncError::fetch(
                FetchStep::Extract,
                format!("failed to unpack {}: {}", relative.display(), e),
            )
        })?;
        count += 1;
    }

    Ok(count)
}

/// Replace `dest` with the extracted scratch tree: remove-if-exists, then
/// rename. The rename is the atomic step; nothing is ever partially copied.
/// On failure the scratch tree is left where it was, so the caller's guard
/// can clean it up.
fn swap_into_place(scratch: &Path, dest: &Path) -> Result<(), SyncError> {
    if dest.is_dir() {
        std::fs::remove_dir_all(dest).map_err(|e| {
            SyncError::fetch(
                FetchStep::Swap,
                format!("failed to remove existing {}: {}", dest.display(), e),
            )
        })?;
    } else if dest.exists() {
        std::fs::remove_file(dest).map_err(|e| {
            SyncError::fetch(
                FetchStep::Swap,
                format!("failed to remove existing {}: {}", dest.display(), e),
            )
        })?;
    }

    std::fs::rename(scratch, dest).map_err(|e| {
        SyncError::fetch(
            FetchStep::Swap,
            format!(
                "failed to move extracted tree to {}: {}",
                dest.display(),
                e
            ),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    /// Build a gzipped tarball whose entries live under a wrapper directory,
    /// the way GitHub serves them.
    fn build_tarball(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));

        for (path, content) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            // Write the name bytes directly: `set_path` refuses `..`
            // components, which the traversal test needs in its fixture.
            header.as_gnu_mut().unwrap().name[..path.len()].copy_from_slice(path.as_bytes());
            header.set_cksum();
            builder.append(&header, *content).unwrap();
        }

        builder.into_inner().unwrap().finish().unwrap()
    }

    fn write_archive(data: &[u8]) -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), data).unwrap();
        file
    }

    #[test]
    fn test_strip_root_drops_wrapper() {
        assert_eq!(
            strip_root(Path::new("acme-widgets-abc123/src/main.rs")),
            Some(PathBuf::from("src/main.rs"))
        );
        assert_eq!(strip_root(Path::new("acme-widgets-abc123/")), None);
        assert_eq!(strip_root(Path::new("pax_global_header")), None);
    }

    #[test]
    fn test_extract_strips_one_component() {
        let data = build_tarball(&[
            ("widgets-main/README.md", b"# widgets"),
            ("widgets-main/src/lib.rs", b"pub fn f() {}"),
        ]);
        let archive = write_archive(&data);
        let dest = tempfile::tempdir().unwrap();

        let count = extract_tarball(archive.path(), dest.path()).unwrap();

        assert_eq!(count, 2);
        assert!(dest.path().join("README.md").exists());
        assert!(dest.path().join("src/lib.rs").exists());
        assert!(!dest.path().join("widgets-main").exists());
    }

    #[test]
    fn test_extract_skips_traversal_entries() {
        let data = build_tarball(&[
            ("widgets-main/ok.txt", b"fine"),
            ("widgets-main/../escape.txt", b"nope"),
        ]);
        let archive = write_archive(&data);
        let dest = tempfile::tempdir().unwrap();

        let count = extract_tarball(archive.path(), dest.path()).unwrap();

        assert_eq!(count, 1);
        assert!(dest.path().join("ok.txt").exists());
        assert!(!dest.path().parent().unwrap().join("escape.txt").exists());
    }

    #[test]
    fn test_extract_failure_reports_substep() {
        let archive = write_archive(b"definitely not gzip");
        let dest = tempfile::tempdir().unwrap();

        let err = extract_tarball(archive.path(), dest.path()).unwrap_err();
        assert!(matches!(
            err,
            SyncError::Fetch {
                step: FetchStep::Extract,
                ..
            }
        ));
    }

    #[test]
    fn test_swap_replaces_existing_destination() {
        let root = tempfile::tempdir().unwrap();
        let dest = root.path().join("app-code");

        // Pre-existing content that must be fully gone after the swap.
        std::fs::create_dir_all(dest.join("stale")).unwrap();
        std::fs::write(dest.join("stale/old.txt"), b"old").unwrap();

        let scratch = root.path().join("scratch");
        std::fs::create_dir_all(scratch.join("src")).unwrap();
        std::fs::write(scratch.join("src/new.txt"), b"new").unwrap();

        swap_into_place(&scratch, &dest).unwrap();

        assert!(dest.join("src/new.txt").exists());
        assert!(!dest.join("stale").exists());
    }

    #[test]
    fn test_swap_creates_missing_destination() {
        let root = tempfile::tempdir().unwrap();
        let dest = root.path().join("app-code");

        let scratch = root.path().join("scratch");
        std::fs::create_dir_all(&scratch).unwrap();
        std::fs::write(scratch.join("a.txt"), b"a").unwrap();

        swap_into_place(&scratch, &dest).unwrap();
        assert!(dest.join("a.txt").exists());
    }

    #[test]
    fn test_failed_swap_leaves_scratch_for_guard_cleanup() {
        let root = tempfile::tempdir().unwrap();

        // A file where the destination's parent should be makes the rename
        // fail without relying on permissions.
        std::fs::write(root.path().join("blocker"), b"").unwrap();
        let dest = root.path().join("blocker").join("app-code");

        let scratch = tempfile::Builder::new()
            .prefix(".repolink-fetch-")
            .tempdir_in(root.path())
            .unwrap();
        std::fs::write(scratch.path().join("a.txt"), b"a").unwrap();

        let err = swap_into_place(scratch.path(), &dest).unwrap_err();
        assert!(matches!(
            err,
            SyncError::Fetch {
                step: FetchStep::Swap,
                ..
            }
        ));

        // The scratch tree is untouched and still owned by its guard, so
        // nothing leaks next to the destination once it drops.
        assert!(scratch.path().join("a.txt").exists());
        let scratch_path = scratch.path().to_path_buf();
        drop(scratch);
        assert!(!scratch_path.exists());
    }
}
