//! Artifact filesystem
//!
//! Artifacts live under `<artifacts_dir>/<jobID>/<relPath>`. Every path that
//! reaches the disk goes through `normalize_artifact_path` first, so nothing
//! is ever read or written outside the job's own directory.

use std::collections::HashSet;
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use base64::Engine;
use chrono::{DateTime, Datelike, Timelike, Utc};
use ciwi_core::domain::artifact::{
    COVERAGE_REPORT_ARTIFACT_PATH, JobExecutionArtifact, TEST_REPORT_ARTIFACT_PATH,
};
use ciwi_core::domain::test_report::JobExecutionTestReport;
use ciwi_core::dto::artifact::UploadArtifact;
use tempfile::TempPath;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// URL prefix under which stored artifacts are served
pub const PUBLIC_ARTIFACTS_PREFIX: &str = "/artifacts/";

const FALLBACK_ZIP_FILENAME: &str = "job-artifacts.zip";

/// Default cap on the total decompressed size of one ZIP upload
pub const DEFAULT_MAX_EXPANDED_BYTES: u64 = 256 * 1024 * 1024;

/// Artifact error type
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("invalid artifact path {0:?}")]
    InvalidPath(String),

    #[error("invalid base64 data for artifact {path}: {source}")]
    InvalidBase64 {
        path: String,
        #[source]
        source: base64::DecodeError,
    },

    #[error("invalid zip archive: {0}")]
    InvalidArchive(#[source] zip::result::ZipError),

    #[error("zip archive expands beyond {limit} bytes")]
    ArchiveTooLarge { limit: u64 },

    #[error("failed to write zip bundle: {0}")]
    Bundle(#[source] zip::result::ZipError),

    #[error("failed to encode report: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("artifact I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("artifact task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ArtifactError {
    /// Whether the error was caused by the uploaded input rather than the server
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ArtifactError::InvalidPath(_)
                | ArtifactError::InvalidBase64 { .. }
                | ArtifactError::InvalidArchive(_)
                | ArtifactError::ArchiveTooLarge { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ArtifactError>;

/// A finished ZIP bundle, rewound and ready to stream
///
/// The temp file is deleted when `temp_path` is dropped.
#[derive(Debug)]
pub struct ZipBundle {
    pub file: std::fs::File,
    pub temp_path: TempPath,
    pub entries: Vec<String>,
}

/// Artifact storage rooted at one directory
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
    max_expanded_bytes: u64,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_expanded_bytes: DEFAULT_MAX_EXPANDED_BYTES,
        }
    }

    /// Caps how many bytes a ZIP upload may expand to
    pub fn with_max_expanded_bytes(mut self, limit: u64) -> Self {
        self.max_expanded_bytes = limit;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn max_expanded_bytes(&self) -> u64 {
        self.max_expanded_bytes
    }

    /// Directory of one job; rejects ids that are not a single plain path component
    pub fn job_dir(&self, job_id: &str) -> Result<PathBuf> {
        let valid = !job_id.is_empty()
            && job_id != "."
            && job_id != ".."
            && !job_id.contains(['/', '\\'])
            && !job_id.contains('\0');
        if !valid {
            return Err(ArtifactError::InvalidPath(job_id.to_string()));
        }
        Ok(self.root.join(job_id))
    }

    // =========================================================================
    // Persisting
    // =========================================================================

    /// Decodes and writes JSON-uploaded artifacts
    ///
    /// Every entry is decoded and its path checked before anything is written.
    /// A clash with a file left by an earlier upload is only seen while
    /// writing; files written before it stay on disk.
    pub async fn persist_artifacts(
        &self,
        job_id: &str,
        uploads: &[UploadArtifact],
    ) -> Result<Vec<JobExecutionArtifact>> {
        let mut decoded = Vec::with_capacity(uploads.len());
        for upload in uploads {
            let data = base64::engine::general_purpose::STANDARD
                .decode(upload.data_base64.trim())
                .map_err(|source| ArtifactError::InvalidBase64 {
                    path: upload.path.clone(),
                    source,
                })?;
            decoded.push((upload.path.clone(), data));
        }

        self.persist_files(job_id, decoded).await
    }

    /// Writes already-decoded files, e.g. the entries of an uploaded ZIP
    ///
    /// Rejects the batch when one path is the parent directory of another.
    pub async fn persist_files(
        &self,
        job_id: &str,
        files: Vec<(String, Vec<u8>)>,
    ) -> Result<Vec<JobExecutionArtifact>> {
        let job_dir = self.job_dir(job_id)?;
        let mut normalized = Vec::with_capacity(files.len());

        for (path, data) in files {
            let rel = normalize_artifact_path(&path).ok_or(ArtifactError::InvalidPath(path))?;
            normalized.push((rel, data));
        }

        let rels: Vec<&str> = normalized.iter().map(|(rel, _)| rel.as_str()).collect();
        if let Some(clash) = find_path_collision(&rels) {
            return Err(ArtifactError::InvalidPath(clash.to_string()));
        }

        write_all(&job_dir, job_id, normalized).await
    }

    /// Writes `<jobID>/test-report.json`
    pub async fn persist_test_report(
        &self,
        job_id: &str,
        report: &JobExecutionTestReport,
    ) -> Result<()> {
        let job_dir = self.job_dir(job_id)?;
        let data = serde_json::to_vec_pretty(report)?;
        write_file(&job_dir, TEST_REPORT_ARTIFACT_PATH, &data).await
    }

    /// Writes `<jobID>/coverage-report.json`, or removes it when the report has no coverage
    pub async fn persist_coverage_report(
        &self,
        job_id: &str,
        report: &JobExecutionTestReport,
    ) -> Result<()> {
        let job_dir = self.job_dir(job_id)?;

        match &report.coverage {
            Some(coverage) => {
                let data = serde_json::to_vec_pretty(coverage)?;
                write_file(&job_dir, COVERAGE_REPORT_ARTIFACT_PATH, &data).await
            }
            None => match tokio::fs::remove_file(job_dir.join(COVERAGE_REPORT_ARTIFACT_PATH)).await {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(err) => Err(err.into()),
            },
        }
    }

    /// Removes a job's directory and everything in it; a missing directory is fine
    pub async fn remove_job_dir(&self, job_id: &str) -> Result<()> {
        let job_dir = self.job_dir(job_id)?;
        match tokio::fs::remove_dir_all(&job_dir).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    // =========================================================================
    // Synthetic Report Entries
    // =========================================================================

    /// Adds the on-disk test report to a listing that does not mention it yet
    pub async fn append_synthetic_test_report(
        &self,
        job_id: &str,
        artifacts: Vec<JobExecutionArtifact>,
    ) -> Vec<JobExecutionArtifact> {
        self.append_synthetic(job_id, artifacts, TEST_REPORT_ARTIFACT_PATH)
            .await
    }

    /// Adds the on-disk coverage report to a listing that does not mention it yet
    pub async fn append_synthetic_coverage(
        &self,
        job_id: &str,
        artifacts: Vec<JobExecutionArtifact>,
    ) -> Vec<JobExecutionArtifact> {
        self.append_synthetic(job_id, artifacts, COVERAGE_REPORT_ARTIFACT_PATH)
            .await
    }

    /// Listing with both synthetic report entries applied
    pub async fn with_synthetic_reports(
        &self,
        job_id: &str,
        artifacts: Vec<JobExecutionArtifact>,
    ) -> Vec<JobExecutionArtifact> {
        let artifacts = self.append_synthetic_test_report(job_id, artifacts).await;
        self.append_synthetic_coverage(job_id, artifacts).await
    }

    async fn append_synthetic(
        &self,
        job_id: &str,
        mut artifacts: Vec<JobExecutionArtifact>,
        rel: &str,
    ) -> Vec<JobExecutionArtifact> {
        let Ok(job_dir) = self.job_dir(job_id) else {
            return artifacts;
        };
        let Ok(meta) = tokio::fs::metadata(job_dir.join(rel)).await else {
            return artifacts;
        };
        if !meta.is_file() || artifacts.iter().any(|artifact| artifact.path == rel) {
            return artifacts;
        }

        artifacts.push(artifact_record(job_id, rel.to_string(), meta.len()));
        artifacts.sort_by(|a, b| a.path.cmp(&b.path));
        artifacts
    }

    // =========================================================================
    // ZIP Bundles
    // =========================================================================

    /// Builds a ZIP of the listed artifacts, optionally limited to a path prefix
    ///
    /// `prefix` must already be normalized. Entries that fail normalization or
    /// are missing on disk are skipped.
    pub async fn build_zip_bundle(
        &self,
        job_id: &str,
        artifacts: &[JobExecutionArtifact],
        prefix: Option<&str>,
    ) -> Result<ZipBundle> {
        let job_dir = self.job_dir(job_id)?;
        let entries = select_bundle_entries(artifacts, prefix);
        let temp_prefix = format!("ciwi-{}-", sanitize_filename(job_id));

        tokio::task::spawn_blocking(move || write_zip_bundle(&job_dir, entries, &temp_prefix))
            .await?
    }
}

// =============================================================================
// Path Helpers
// =============================================================================

/// Normalizes an artifact path to a relative slash path confined to the job dir
///
/// Backslashes become slashes, empty and `.` segments are dropped. Returns
/// `None` for absolute paths, paths containing a `..` segment, and paths that
/// end up empty.
pub fn normalize_artifact_path(raw: &str) -> Option<String> {
    let slashed = raw.replace('\\', "/");
    if slashed.starts_with('/') || slashed.contains('\0') {
        return None;
    }

    let mut segments = Vec::new();
    for segment in slashed.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return None,
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        return None;
    }
    Some(segments.join("/"))
}

/// Whether a normalized path is the prefix itself or lies below it
pub fn matches_prefix(path: &str, prefix: &str) -> bool {
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Public URL of a stored artifact URL (`<jobID>/<relPath>` → `/artifacts/<jobID>/<relPath>`)
pub fn public_url(url: &str) -> String {
    if url.starts_with(PUBLIC_ARTIFACTS_PREFIX) {
        url.to_string()
    } else {
        format!("{}{}", PUBLIC_ARTIFACTS_PREFIX, url.trim_start_matches('/'))
    }
}

/// `Content-Disposition` filename of a bundle: `<jobID>[-prefix]-artifacts.zip`, sanitized
pub fn zip_filename(job_id: &str, prefix: Option<&str>) -> String {
    let mut base = job_id.to_string();
    if let Some(prefix) = prefix.filter(|prefix| !prefix.is_empty()) {
        base.push('-');
        base.push_str(prefix);
    }

    let sanitized = sanitize_filename(&base);
    if sanitized.is_empty() {
        FALLBACK_ZIP_FILENAME.to_string()
    } else {
        format!("{}-artifacts.zip", sanitized)
    }
}

/// Keeps `[A-Za-z0-9._-]`, maps everything else to `-`, trims `-` and `.` at both ends
pub fn sanitize_filename(value: &str) -> String {
    let mapped: String = value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect();

    mapped.trim_matches(|c| c == '-' || c == '.').to_string()
}

/// First path in a batch that is also a parent directory of another path
pub fn find_path_collision<'a>(rels: &[&'a str]) -> Option<&'a str> {
    let set: HashSet<&str> = rels.iter().copied().collect();
    rels.iter().copied().find(|rel| {
        rel.match_indices('/')
            .any(|(index, _)| set.contains(&rel[..index]))
    })
}

/// Reads the file entries of an uploaded ZIP archive
///
/// Directory entries are skipped; any entry whose name escapes the job
/// directory rejects the whole archive, as does a total decompressed size
/// above `max_expanded_bytes`.
pub fn extract_zip_upload(bytes: &[u8], max_expanded_bytes: u64) -> Result<Vec<(String, Vec<u8>)>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(ArtifactError::InvalidArchive)?;
    let mut files = Vec::with_capacity(archive.len());
    let mut remaining = max_expanded_bytes;

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(ArtifactError::InvalidArchive)?;
        if entry.is_dir() {
            continue;
        }

        let rel = normalize_artifact_path(entry.name())
            .ok_or_else(|| ArtifactError::InvalidPath(entry.name().to_string()))?;
        let too_large = ArtifactError::ArchiveTooLarge {
            limit: max_expanded_bytes,
        };
        if entry.size() > remaining {
            return Err(too_large);
        }

        let mut data = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or(0));
        (&mut entry)
            .take(remaining.saturating_add(1))
            .read_to_end(&mut data)?;
        let read = data.len() as u64;
        if read > remaining {
            return Err(too_large);
        }
        remaining -= read;
        files.push((rel, data));
    }

    Ok(files)
}

fn artifact_record(job_id: &str, rel: String, size_bytes: u64) -> JobExecutionArtifact {
    JobExecutionArtifact {
        job_execution_id: job_id.to_string(),
        url: format!("{}/{}", job_id, rel),
        path: rel,
        size_bytes,
    }
}

fn select_bundle_entries(artifacts: &[JobExecutionArtifact], prefix: Option<&str>) -> Vec<String> {
    let mut entries: Vec<String> = artifacts
        .iter()
        .filter_map(|artifact| normalize_artifact_path(&artifact.path))
        .filter(|path| prefix.is_none_or(|prefix| matches_prefix(path, prefix)))
        .collect();
    entries.sort();
    entries.dedup();
    entries
}

// =============================================================================
// Blocking I/O
// =============================================================================

async fn write_all(
    job_dir: &Path,
    job_id: &str,
    files: Vec<(String, Vec<u8>)>,
) -> Result<Vec<JobExecutionArtifact>> {
    let mut artifacts = Vec::with_capacity(files.len());
    for (rel, data) in files {
        write_file(job_dir, &rel, &data).await?;
        artifacts.push(artifact_record(job_id, rel, data.len() as u64));
    }
    Ok(artifacts)
}

/// Maps errors caused by a path clashing with an existing file or directory
fn path_clash(rel: &str) -> impl FnOnce(std::io::Error) -> ArtifactError + '_ {
    move |err| match err.kind() {
        std::io::ErrorKind::AlreadyExists
        | std::io::ErrorKind::NotADirectory
        | std::io::ErrorKind::IsADirectory => ArtifactError::InvalidPath(rel.to_string()),
        _ => ArtifactError::Io(err),
    }
}

async fn write_file(job_dir: &Path, rel: &str, data: &[u8]) -> Result<()> {
    let target = job_dir.join(rel);
    if let Some(parent) = target.parent() {
        let mut builder = tokio::fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(0o755);
        builder.create(parent).await.map_err(path_clash(rel))?;
    }

    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o644);

    let mut file = options.open(&target).await.map_err(path_clash(rel))?;
    file.write_all(data).await?;
    file.flush().await?;
    Ok(())
}

fn write_zip_bundle(job_dir: &Path, entries: Vec<String>, temp_prefix: &str) -> Result<ZipBundle> {
    let temp = tempfile::Builder::new()
        .prefix(temp_prefix)
        .suffix(".zip")
        .tempfile()?;
    let (file, temp_path) = temp.into_parts();

    let mut writer = ZipWriter::new(file);
    let base_options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut written = Vec::with_capacity(entries.len());

    for rel in entries {
        let source_path = job_dir.join(&rel);
        let meta = match std::fs::metadata(&source_path) {
            Ok(meta) if meta.is_file() => meta,
            _ => continue,
        };

        let mut options = base_options;
        if let Some(modified) = meta.modified().ok().and_then(zip_timestamp) {
            options = options.last_modified_time(modified);
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            options = options.unix_permissions(meta.permissions().mode() & 0o777);
        }

        writer
            .start_file(rel.as_str(), options)
            .map_err(ArtifactError::Bundle)?;
        let mut source = std::fs::File::open(&source_path)?;
        std::io::copy(&mut source, &mut writer)?;
        written.push(rel);
    }

    let mut file = writer.finish().map_err(ArtifactError::Bundle)?;
    file.seek(SeekFrom::Start(0))?;

    Ok(ZipBundle {
        file,
        temp_path,
        entries: written,
    })
}

fn zip_timestamp(modified: std::time::SystemTime) -> Option<zip::DateTime> {
    let modified: DateTime<Utc> = modified.into();
    zip::DateTime::from_date_and_time(
        u16::try_from(modified.year()).ok()?,
        modified.month() as u8,
        modified.day() as u8,
        modified.hour() as u8,
        modified.minute() as u8,
        modified.second() as u8,
    )
    .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ciwi_core::domain::test_report::CoverageReport;

    fn encode(data: &[u8]) -> String {
        base64::engine::general_purpose::STANDARD.encode(data)
    }

    fn upload(path: &str, data: &[u8]) -> UploadArtifact {
        UploadArtifact {
            path: path.to_string(),
            data_base64: encode(data),
        }
    }

    #[test]
    fn test_normalize_artifact_path() {
        assert_eq!(
            normalize_artifact_path("dist/app.bin").as_deref(),
            Some("dist/app.bin")
        );
        assert_eq!(
            normalize_artifact_path("./dist//nested/./b.txt").as_deref(),
            Some("dist/nested/b.txt")
        );
        assert_eq!(
            normalize_artifact_path("dist\\win.exe").as_deref(),
            Some("dist/win.exe")
        );
        assert_eq!(normalize_artifact_path(""), None);
        assert_eq!(normalize_artifact_path("."), None);
        assert_eq!(normalize_artifact_path("/etc/passwd"), None);
        assert_eq!(normalize_artifact_path("../bad"), None);
        assert_eq!(normalize_artifact_path("dist/../../bad"), None);
    }

    #[test]
    fn test_matches_prefix() {
        assert!(matches_prefix("dist", "dist"));
        assert!(matches_prefix("dist/a.txt", "dist"));
        assert!(!matches_prefix("distro/a.txt", "dist"));
        assert!(!matches_prefix("other.txt", "dist"));
    }

    #[test]
    fn test_public_url() {
        assert_eq!(public_url("job-1/dist/a.txt"), "/artifacts/job-1/dist/a.txt");
        assert_eq!(
            public_url("/artifacts/job-1/dist/a.txt"),
            "/artifacts/job-1/dist/a.txt"
        );
    }

    #[test]
    fn test_zip_filename() {
        assert_eq!(zip_filename("job-1", None), "job-1-artifacts.zip");
        assert_eq!(
            zip_filename("job-1", Some("dist/nested")),
            "job-1-dist-nested-artifacts.zip"
        );
        assert_eq!(zip_filename("..//", None), FALLBACK_ZIP_FILENAME);
        assert_eq!(sanitize_filename("-a b.c-"), "a-b.c");
    }

    #[test]
    fn test_job_dir_rejects_traversal() {
        let store = ArtifactStore::new("/tmp/root");
        assert!(store.job_dir("..").is_err());
        assert!(store.job_dir("a/b").is_err());
        assert!(store.job_dir("").is_err());
        assert_eq!(store.job_dir("job-1").unwrap(), PathBuf::from("/tmp/root/job-1"));
    }

    #[tokio::test]
    async fn test_persist_artifacts_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());

        let artifacts = store
            .persist_artifacts("job-1", &[upload("dist/app.bin", b"hello")])
            .await
            .unwrap();

        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].path, "dist/app.bin");
        assert_eq!(artifacts[0].url, "job-1/dist/app.bin");
        assert_eq!(artifacts[0].size_bytes, 5);
        let written = std::fs::read(dir.path().join("job-1/dist/app.bin")).unwrap();
        assert_eq!(written, b"hello");
    }

    #[tokio::test]
    async fn test_persist_artifacts_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());

        let err = store
            .persist_artifacts(
                "job-1",
                &[upload("ok.txt", b"1"), upload("../escape.txt", b"2")],
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ArtifactError::InvalidPath(_)));
        assert!(err.is_client_error());
        assert!(!dir.path().join("job-1/ok.txt").exists());
        assert!(!dir.path().join("escape.txt").exists());
    }

    #[test]
    fn test_find_path_collision() {
        assert_eq!(find_path_collision(&["dist", "dist/a.txt"]), Some("dist/a.txt"));
        assert_eq!(find_path_collision(&["a/b/c", "a/b"]), Some("a/b/c"));
        assert_eq!(find_path_collision(&["dist/a.txt", "distro/b"]), None);
        assert_eq!(find_path_collision(&["a.txt", "a.txt"]), None);
    }

    #[tokio::test]
    async fn test_persist_rejects_file_and_directory_clash() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());

        let err = store
            .persist_artifacts("job-1", &[upload("dist", b"1"), upload("dist/a.txt", b"2")])
            .await
            .unwrap_err();
        assert!(matches!(err, ArtifactError::InvalidPath(_)));
        assert!(!dir.path().join("job-1/dist").exists());

        store
            .persist_artifacts("job-1", &[upload("dist", b"1")])
            .await
            .unwrap();
        let err = store
            .persist_artifacts("job-1", &[upload("dist/a.txt", b"2")])
            .await
            .unwrap_err();
        assert!(matches!(err, ArtifactError::InvalidPath(_)));

        store.remove_job_dir("job-1").await.unwrap();
        store
            .persist_artifacts("job-1", &[upload("dist/a.txt", b"2")])
            .await
            .unwrap();
        let err = store
            .persist_artifacts("job-1", &[upload("dist", b"1")])
            .await
            .unwrap_err();
        assert!(matches!(err, ArtifactError::InvalidPath(_)));
    }

    #[tokio::test]
    async fn test_remove_job_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        store
            .persist_artifacts("job-1", &[upload("dist/a.txt", b"a")])
            .await
            .unwrap();

        store.remove_job_dir("job-1").await.unwrap();
        assert!(!dir.path().join("job-1").exists());
        store.remove_job_dir("job-1").await.unwrap();
        assert!(store.remove_job_dir("..").await.is_err());
    }

    #[tokio::test]
    async fn test_persist_artifacts_rejects_bad_base64() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());

        let err = store
            .persist_artifacts(
                "job-1",
                &[UploadArtifact {
                    path: "a.txt".to_string(),
                    data_base64: "%%%".to_string(),
                }],
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ArtifactError::InvalidBase64 { .. }));
    }

    #[tokio::test]
    async fn test_synthetic_reports_follow_disk_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let mut report = JobExecutionTestReport {
            total: 1,
            passed: 1,
            coverage: Some(CoverageReport {
                format: "go-coverprofile".to_string(),
                total_statements: 10,
                covered_statements: 5,
                percent: 50.0,
                files: Vec::new(),
            }),
            ..Default::default()
        };

        let listed = store.with_synthetic_reports("job-1", Vec::new()).await;
        assert!(listed.is_empty());

        store.persist_test_report("job-1", &report).await.unwrap();
        store.persist_coverage_report("job-1", &report).await.unwrap();

        let uploaded = store
            .persist_artifacts("job-1", &[upload("zz.txt", b"z"), upload("a.txt", b"a")])
            .await
            .unwrap();
        let listed = store.with_synthetic_reports("job-1", uploaded).await;
        let paths: Vec<_> = listed.iter().map(|a| a.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["a.txt", "coverage-report.json", "test-report.json", "zz.txt"]
        );
        let on_disk = std::fs::metadata(dir.path().join("job-1/test-report.json")).unwrap();
        assert_eq!(listed[2].size_bytes, on_disk.len());

        let listed_again = store.with_synthetic_reports("job-1", listed.clone()).await;
        assert_eq!(listed_again.len(), listed.len());

        report.coverage = None;
        store.persist_coverage_report("job-1", &report).await.unwrap();
        store.persist_coverage_report("job-1", &report).await.unwrap();
        assert!(!dir.path().join("job-1/coverage-report.json").exists());
    }

    #[tokio::test]
    async fn test_zip_bundle_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let mut artifacts = store
            .persist_artifacts(
                "job-1",
                &[
                    upload("other.txt", b"o"),
                    upload("dist/nested/b.txt", b"b"),
                    upload("dist/a.txt", b"a"),
                ],
            )
            .await
            .unwrap();
        artifacts.push(JobExecutionArtifact {
            path: "dist/missing.txt".to_string(),
            ..Default::default()
        });

        let bundle = store
            .build_zip_bundle("job-1", &artifacts, Some("dist"))
            .await
            .unwrap();
        assert_eq!(bundle.entries, vec!["dist/a.txt", "dist/nested/b.txt"]);
        let temp_file = bundle.temp_path.to_path_buf();
        assert!(temp_file.exists());

        let mut archive = ZipArchive::new(bundle.file).unwrap();
        let names: Vec<_> = archive.file_names().map(str::to_string).collect();
        assert_eq!(names.len(), 2);
        let mut content = String::new();
        archive
            .by_name("dist/nested/b.txt")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "b");

        drop(bundle.temp_path);
        assert!(!temp_file.exists());
    }

    #[test]
    fn test_extract_zip_upload() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        writer.add_directory("dist/", options).unwrap();
        writer.start_file("dist/app.bin", options).unwrap();
        std::io::Write::write_all(&mut writer, b"hello").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let files = extract_zip_upload(&bytes, DEFAULT_MAX_EXPANDED_BYTES).unwrap();
        assert_eq!(files, vec![("dist/app.bin".to_string(), b"hello".to_vec())]);
    }

    #[test]
    fn test_extract_zip_upload_rejects_traversal() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("../evil.sh", SimpleFileOptions::default())
            .unwrap();
        std::io::Write::write_all(&mut writer, b"rm -rf").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let err = extract_zip_upload(&bytes, DEFAULT_MAX_EXPANDED_BYTES).unwrap_err();
        assert!(matches!(err, ArtifactError::InvalidPath(_)));
    }

    #[test]
    fn test_extract_zip_upload_caps_expanded_size() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let zeros = vec![0u8; 64 * 1024];
        for index in 0..4 {
            writer.start_file(format!("zeros-{}.bin", index), options).unwrap();
            std::io::Write::write_all(&mut writer, &zeros).unwrap();
        }
        let bytes = writer.finish().unwrap().into_inner();
        assert!(bytes.len() < 16 * 1024);

        let err = extract_zip_upload(&bytes, 128 * 1024).unwrap_err();
        assert!(matches!(err, ArtifactError::ArchiveTooLarge { limit: 131072 }));
        assert!(err.is_client_error());

        let files = extract_zip_upload(&bytes, 256 * 1024).unwrap();
        assert_eq!(files.len(), 4);
    }

    #[test]
    fn test_extract_zip_upload_rejects_garbage() {
        let err = extract_zip_upload(b"not a zip", DEFAULT_MAX_EXPANDED_BYTES).unwrap_err();
        assert!(matches!(err, ArtifactError::InvalidArchive(_)));
        assert!(err.is_client_error());
    }
}
