//! Saved extraction artifacts on the local filesystem.

use chrono::{DateTime, Local, TimeZone};
use serde::Serialize;
use std::fmt::Display;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::StoreError;

const EXTENSION: &str = ".txt";
const SECS_PER_DAY: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactInfo {
    pub name: String,
    pub size: u64,
    pub modified: DateTime<Local>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletedArtifact {
    pub name: String,
    pub modified: DateTime<Local>,
}

/// Outcome of [`ArtifactStore::delete_older_than`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkDeleteReport {
    pub deleted: Vec<DeletedArtifact>,
    /// Artifacts present before the sweep.
    pub total: usize,
}

/// Directory of `.txt` artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Use `root` as the results directory, creating it if needed.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        info!("results directory: {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File name for an extraction of `url`.
    ///
    /// A non-blank `requested` name wins. Otherwise the host (without a
    /// leading `www.`, dots and port separator as underscores) plus a
    /// `_YYYYMMDD_HHMMSS` stamp, or `extraction_` plus the stamp when the URL
    /// has no host. The result always ends in `.txt`.
    pub fn artifact_name<Tz>(url: &str, requested: Option<&str>, now: DateTime<Tz>) -> String
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        let base = match requested.map(str::trim).filter(|r| !r.is_empty()) {
            Some(requested) => requested.to_string(),
            None => {
                let stamp = now.format("%Y%m%d_%H%M%S");
                match host_slug(url) {
                    Some(host) => format!("{host}_{stamp}"),
                    None => format!("extraction_{stamp}"),
                }
            }
        };

        if base.to_ascii_lowercase().ends_with(EXTENSION) {
            base
        } else {
            format!("{base}{EXTENSION}")
        }
    }

    /// Reject names that are blank or could leave the results directory.
    pub fn check_name(name: &str) -> Result<(), StoreError> {
        let valid = !name.trim().is_empty()
            && !name.contains(['/', '\\'])
            && !name.contains("..")
            && name != ".";
        if valid {
            Ok(())
        } else {
            Err(StoreError::InvalidName(name.to_string()))
        }
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, StoreError> {
        Self::check_name(name)?;
        Ok(self.root.join(name))
    }

    /// Write `content` under `name`, replacing any previous artifact.
    /// Returns the size in bytes.
    pub async fn save(&self, name: &str, content: &str) -> Result<u64, StoreError> {
        let path = self.path_for(name)?;
        fs::write(&path, content).await?;
        let size = content.len() as u64;
        info!(size, "artifact saved: {}", path.display());
        Ok(size)
    }

    /// Every `.txt` artifact, newest first.
    pub async fn list(&self) -> Result<Vec<ArtifactInfo>, StoreError> {
        let mut artifacts = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if !name.ends_with(EXTENSION) {
                continue;
            }
            let meta = match entry.metadata().await {
                Ok(meta) if meta.is_file() => meta,
                Ok(_) => continue,
                Err(err) => {
                    warn!(%name, error = %err, "skipping unreadable artifact");
                    continue;
                }
            };
            artifacts.push(ArtifactInfo {
                name,
                size: meta.len(),
                modified: meta.modified()?.into(),
            });
        }

        artifacts.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.name.cmp(&b.name)));
        Ok(artifacts)
    }

    pub async fn read(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.path_for(name)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(name.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn delete(&self, name: &str) -> Result<(), StoreError> {
        let path = self.path_for(name)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                info!("artifact deleted: {}", path.display());
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(name.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Deflated ZIP holding every artifact under its own name.
    pub async fn zip_all(&self) -> Result<Vec<u8>, StoreError> {
        let artifacts = self.list().await?;
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

        for artifact in &artifacts {
            let bytes = fs::read(self.root.join(&artifact.name)).await?;
            zip.start_file(artifact.name.as_str(), options)?;
            zip.write_all(&bytes)?;
        }

        let archive = zip.finish()?.into_inner();
        debug!(files = artifacts.len(), bytes = archive.len(), "artifacts zipped");
        Ok(archive)
    }

    /// Remove artifacts last modified more than `days` days ago.
    pub async fn delete_older_than(&self, days: u32) -> Result<BulkDeleteReport, StoreError> {
        let age = Duration::from_secs(SECS_PER_DAY * u64::from(days));
        let cutoff = SystemTime::now()
            .checked_sub(age)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        self.delete_modified_before(cutoff.into()).await
    }

    pub async fn delete_modified_before(
        &self,
        cutoff: DateTime<Local>,
    ) -> Result<BulkDeleteReport, StoreError> {
        let artifacts = self.list().await?;
        let mut report = BulkDeleteReport {
            total: artifacts.len(),
            ..Default::default()
        };

        for artifact in artifacts.into_iter().filter(|a| a.modified < cutoff) {
            match fs::remove_file(self.root.join(&artifact.name)).await {
                Ok(()) => report.deleted.push(DeletedArtifact {
                    name: artifact.name,
                    modified: artifact.modified,
                }),
                Err(err) => warn!(name = %artifact.name, error = %err, "could not delete artifact"),
            }
        }

        info!(deleted = report.deleted.len(), total = report.total, %cutoff, "bulk delete finished");
        Ok(report)
    }
}

fn host_slug(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    let host = host.strip_prefix("www.").unwrap_or(host);
    if host.is_empty() {
        return None;
    }
    let mut slug = host.replace('.', "_");
    if let Some(port) = parsed.port() {
        slug.push_str(&format!("_{port}"));
    }
    Some(slug)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::io::Read;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 31, 14, 5, 9).unwrap()
    }

    #[test]
    fn derives_name_from_host_and_time() {
        let name = ArtifactStore::artifact_name("https://www.example.com/a/b?c=d", None, now());
        assert_eq!(name, "example_com_20240131_140509.txt");
    }

    #[test]
    fn keeps_non_default_port() {
        let name = ArtifactStore::artifact_name("http://localhost:8080/", None, now());
        assert_eq!(name, "localhost_8080_20240131_140509.txt");
    }

    #[test]
    fn falls_back_when_url_has_no_host() {
        let name = ArtifactStore::artifact_name("not a url", None, now());
        assert_eq!(name, "extraction_20240131_140509.txt");
    }

    #[test]
    fn requested_names_get_txt_suffix() {
        assert_eq!(
            ArtifactStore::artifact_name("https://x.org", Some("report"), now()),
            "report.txt"
        );
        assert_eq!(
            ArtifactStore::artifact_name("https://x.org", Some("notes.txt"), now()),
            "notes.txt"
        );
        assert_eq!(
            ArtifactStore::artifact_name("https://x.org", Some("  "), now()),
            "x_org_20240131_140509.txt"
        );
    }

    #[tokio::test]
    async fn rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).await.unwrap();
        for name in ["../evil.txt", "a/b.txt", "a\\b.txt", "..", ""] {
            assert!(
                matches!(store.save(name, "x").await, Err(StoreError::InvalidName(_))),
                "{name}"
            );
        }
        assert!(matches!(store.read("../x.txt").await, Err(StoreError::InvalidName(_))));
    }

    #[tokio::test]
    async fn saves_lists_reads_and_deletes() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path().join("results")).await.unwrap();

        assert_eq!(store.save("one.txt", "olá").await.unwrap(), 4);
        store.save("two.txt", "second").await.unwrap();
        std::fs::write(store.root().join("ignored.json"), "{}").unwrap();

        let names: Vec<String> = store.list().await.unwrap().into_iter().map(|a| a.name).collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"one.txt".to_string()));

        assert_eq!(store.read("one.txt").await.unwrap(), "olá".as_bytes());
        store.delete("one.txt").await.unwrap();
        assert!(matches!(store.read("one.txt").await, Err(StoreError::NotFound(_))));
        assert!(matches!(store.delete("one.txt").await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn lists_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).await.unwrap();
        store.save("old.txt", "a").await.unwrap();
        store.save("new.txt", "b").await.unwrap();
        set_age(&store, "old.txt", 3600);

        let names: Vec<String> = store.list().await.unwrap().into_iter().map(|a| a.name).collect();
        assert_eq!(names, vec!["new.txt", "old.txt"]);
    }

    #[tokio::test]
    async fn zips_every_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).await.unwrap();
        store.save("a.txt", "alpha").await.unwrap();
        store.save("b.txt", "beta").await.unwrap();

        let bytes = store.zip_all().await.unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);
        let mut content = String::new();
        archive.by_name("b.txt").unwrap().read_to_string(&mut content).unwrap();
        assert_eq!(content, "beta");
    }

    #[tokio::test]
    async fn bulk_delete_removes_only_old_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).await.unwrap();
        store.save("stale.txt", "a").await.unwrap();
        store.save("fresh.txt", "b").await.unwrap();
        set_age(&store, "stale.txt", 3 * SECS_PER_DAY);

        let report = store.delete_older_than(1).await.unwrap();
        assert_eq!(report.total, 2);
        let deleted: Vec<&str> = report.deleted.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(deleted, vec!["stale.txt"]);
        assert!(store.read("fresh.txt").await.is_ok());
    }

    fn set_age(store: &ArtifactStore, name: &str, secs: u64) {
        let file = std::fs::File::options()
            .write(true)
            .open(store.root().join(name))
            .unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(secs))
            .unwrap();
    }
}
