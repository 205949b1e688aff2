//! Streaming upload guard: filename sanitizing and a hard size ceiling.

use actix_web::web::Bytes;
use futures_util::{Stream, StreamExt};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, warn};
use uuid::Uuid;

pub const ALLOWED_EXTENSIONS: &[&str] = &["txt", "pdf", "png", "jpg", "jpeg", "ai"];
pub const MAX_FILENAME_BYTES: usize = 255;

const PLACEHOLDER: char = '_';
const DELIVERIES_DIR: &str = "deliveries";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("The uploaded file is missing a filename")]
    MissingFilename,
    #[error("File type {0:?} is not allowed")]
    DisallowedExtension(String),
    #[error("File exceeds the {limit}-byte limit")]
    TooLarge { limit: u64 },
    #[error("Upload stream failed: {0}")]
    Stream(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Validate the extension and strip anything unsafe from a client-supplied
/// filename. Path separators are replaced, so the result never escapes the
/// target directory.
pub fn sanitize_filename(raw: &str) -> Result<String, UploadError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(UploadError::MissingFilename);
    }

    let ext = extension_of(raw).map(str::to_ascii_lowercase);
    match &ext {
        Some(e) if ALLOWED_EXTENSIONS.contains(&e.as_str()) => {}
        _ => return Err(UploadError::DisallowedExtension(ext.unwrap_or_default())),
    }

    let mut safe = String::with_capacity(raw.len());
    for c in raw.chars() {
        let c = if is_unsafe(c) { PLACEHOLDER } else { c };
        if c == PLACEHOLDER && safe.ends_with(PLACEHOLDER) {
            continue;
        }
        safe.push(c);
    }

    Ok(truncate_keeping_extension(safe, MAX_FILENAME_BYTES))
}

/// Extension after the last dot, ignoring leading dots (`.pdf` has none).
fn extension_of(name: &str) -> Option<&str> {
    let stem_start = name.len() - name.trim_start_matches('.').len();
    let (stem, ext) = name[stem_start..].rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        None
    } else {
        Some(ext)
    }
}

fn is_unsafe(c: char) -> bool {
    c.is_control() || matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*')
}

fn truncate_keeping_extension(name: String, max_bytes: usize) -> String {
    if name.len() <= max_bytes {
        return name;
    }
    let dot = name.rfind('.').unwrap_or(name.len());
    let (stem, ext) = name.split_at(dot);
    let mut budget = max_bytes.saturating_sub(ext.len());
    while !stem.is_char_boundary(budget) {
        budget -= 1;
    }
    format!("{}{}", &stem[..budget], ext)
}

/// Writes uploads under `root`, refusing anything larger than `max_bytes`.
#[derive(Debug, Clone)]
pub struct UploadGuard {
    root: PathBuf,
    max_bytes: u64,
    buffer_bytes: usize,
}

impl UploadGuard {
    pub fn new(root: impl Into<PathBuf>, max_bytes: u64, buffer_bytes: usize) -> Self {
        Self {
            root: root.into(),
            max_bytes,
            buffer_bytes: buffer_bytes.max(1),
        }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// `{root}/deliveries/{project_id}_{filename}`
    pub fn delivery_path(&self, project_id: Uuid, sanitized: &str) -> PathBuf {
        self.root
            .join(DELIVERIES_DIR)
            .join(prefixed_name(&format!("{project_id}_"), sanitized))
    }

    /// `{root}/{random}_{filename}`, unique per call.
    pub fn general_path(&self, sanitized: &str) -> PathBuf {
        let prefix = format!("{}_", Uuid::new_v4().simple());
        self.root.join(prefixed_name(&prefix, sanitized))
    }

    /// Stream `chunks` into `dest`. The data lands in a temporary file of its
    /// own next to `dest` that is renamed into place only after the whole
    /// stream fit under the ceiling; on any failure the partial file is
    /// removed and `dest` is untouched.
    pub async fn stream_to<S, E>(&self, dest: &Path, chunks: S) -> Result<u64, UploadError>
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin,
        E: Display,
    {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }
        let partial = partial_path(dest);

        let result = self.copy_limited(&partial, chunks).await;
        match result {
            Ok(total) => {
                fs::rename(&partial, dest).await?;
                debug!(path = %dest.display(), bytes = total, "upload stored");
                Ok(total)
            }
            Err(e) => {
                if let Err(rm) = fs::remove_file(&partial).await {
                    warn!(path = %partial.display(), "failed to remove partial upload: {rm}");
                }
                Err(e)
            }
        }
    }

    async fn copy_limited<S, E>(&self, partial: &Path, mut chunks: S) -> Result<u64, UploadError>
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin,
        E: Display,
    {
        let file = File::create(partial).await?;
        let mut writer = BufWriter::with_capacity(self.buffer_bytes, file);
        let mut total: u64 = 0;

        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.map_err(|e| UploadError::Stream(e.to_string()))?;
            total += chunk.len() as u64;
            if total > self.max_bytes {
                return Err(UploadError::TooLarge {
                    limit: self.max_bytes,
                });
            }
            writer.write_all(&chunk).await?;
        }

        writer.flush().await?;
        Ok(total)
    }
}

/// `{prefix}{name}`, with the stem of `name` shortened so the whole stored
/// name still fits in [`MAX_FILENAME_BYTES`].
fn prefixed_name(prefix: &str, sanitized: &str) -> String {
    let budget = MAX_FILENAME_BYTES.saturating_sub(prefix.len());
    format!(
        "{prefix}{}",
        truncate_keeping_extension(sanitized.to_string(), budget)
    )
}

/// A short, per-upload name in the destination directory.
fn partial_path(dest: &Path) -> PathBuf {
    let name = format!(".{}.part", Uuid::new_v4().simple());
    match dest.parent() {
        Some(dir) => dir.join(name),
        None => PathBuf::from(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use std::convert::Infallible;

    fn filled(byte: u8, sizes: &[usize]) -> impl Stream<Item = Result<Bytes, Infallible>> + Unpin {
        let items: Vec<Result<Bytes, Infallible>> = sizes
            .iter()
            .map(|&n| Ok(Bytes::from(vec![byte; n])))
            .collect();
        stream::iter(items)
    }

    fn chunks(sizes: &[usize]) -> impl Stream<Item = Result<Bytes, Infallible>> + Unpin {
        filled(b'x', sizes)
    }

    /// Temporary `.part` files still sitting next to `dest`.
    fn leftover_parts(dest: &Path) -> usize {
        let Some(dir) = dest.parent() else { return 0 };
        let Ok(entries) = std::fs::read_dir(dir) else { return 0 };
        entries
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".part"))
            .count()
    }

    #[test]
    fn sanitize_accepts_allowed_extensions_case_insensitively() {
        assert_eq!(sanitize_filename("report.PDF").unwrap(), "report.PDF");
        assert_eq!(sanitize_filename("logo.ai").unwrap(), "logo.ai");
    }

    #[test]
    fn sanitize_rejects_other_extensions() {
        assert!(matches!(
            sanitize_filename("run.exe"),
            Err(UploadError::DisallowedExtension(e)) if e == "exe"
        ));
        assert!(matches!(
            sanitize_filename(".pdf"),
            Err(UploadError::DisallowedExtension(_))
        ));
        assert!(matches!(
            sanitize_filename("noext"),
            Err(UploadError::DisallowedExtension(_))
        ));
        assert!(matches!(
            sanitize_filename("  "),
            Err(UploadError::MissingFilename)
        ));
    }

    #[test]
    fn sanitize_replaces_and_collapses_unsafe_characters() {
        assert_eq!(
            sanitize_filename("../../etc/passwd.txt").unwrap(),
            ".._.._etc_passwd.txt"
        );
        assert_eq!(sanitize_filename("a<>:|b.png").unwrap(), "a_b.png");
        assert_eq!(sanitize_filename("a__\u{0}_b.jpg").unwrap(), "a_b.jpg");
        assert_eq!(sanitize_filename("設計稿.png").unwrap(), "設計稿.png");
    }

    #[test]
    fn sanitize_caps_length_and_keeps_extension() {
        let long = format!("{}.pdf", "a".repeat(400));
        let safe = sanitize_filename(&long).unwrap();
        assert_eq!(safe.len(), MAX_FILENAME_BYTES);
        assert!(safe.ends_with(".pdf"));

        let wide = format!("{}.txt", "é".repeat(200));
        let safe = sanitize_filename(&wide).unwrap();
        assert!(safe.len() <= MAX_FILENAME_BYTES);
        assert!(safe.ends_with(".txt"));
    }

    #[test]
    fn delivery_path_has_project_prefix() {
        let guard = UploadGuard::new("uploads", 10, 4);
        let id = Uuid::nil();
        assert_eq!(
            guard.delivery_path(id, "a.pdf"),
            PathBuf::from(format!("uploads/deliveries/{id}_a.pdf"))
        );
    }

    #[tokio::test]
    async fn stream_exactly_at_ceiling_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let guard = UploadGuard::new(dir.path(), 10, 4);
        let dest = dir.path().join("deliveries").join("ok.txt");

        let total = guard.stream_to(&dest, chunks(&[4, 4, 2])).await.unwrap();

        assert_eq!(total, 10);
        assert_eq!(std::fs::metadata(&dest).unwrap().len(), 10);
        assert_eq!(leftover_parts(&dest), 0);
    }

    #[tokio::test]
    async fn one_byte_over_aborts_and_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let guard = UploadGuard::new(dir.path(), 10, 4);
        let dest = dir.path().join("big.txt");

        let err = guard.stream_to(&dest, chunks(&[4, 4, 3])).await.unwrap_err();

        assert!(matches!(err, UploadError::TooLarge { limit: 10 }));
        assert!(!dest.exists());
        assert_eq!(leftover_parts(&dest), 0);
    }

    #[tokio::test]
    async fn failed_redelivery_keeps_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let guard = UploadGuard::new(dir.path(), 10, 4);
        let dest = dir.path().join("v.txt");

        guard.stream_to(&dest, chunks(&[3])).await.unwrap();
        assert!(guard.stream_to(&dest, chunks(&[11])).await.is_err());

        assert_eq!(std::fs::metadata(&dest).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn stream_error_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let guard = UploadGuard::new(dir.path(), 100, 4);
        let dest = dir.path().join("broken.txt");
        let items: Vec<Result<Bytes, &str>> = vec![Ok(Bytes::from_static(b"abc")), Err("reset")];

        let err = guard
            .stream_to(&dest, stream::iter(items))
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::Stream(msg) if msg == "reset"));
        assert!(!dest.exists());
        assert_eq!(leftover_parts(&dest), 0);
    }

    #[test]
    fn stored_names_fit_in_one_path_component() {
        let guard = UploadGuard::new("uploads", 10, 4);
        let name = sanitize_filename(&format!("{}.pdf", "a".repeat(300))).unwrap();
        assert_eq!(name.len(), MAX_FILENAME_BYTES);

        let delivery = guard.delivery_path(Uuid::new_v4(), &name);
        let general = guard.general_path(&name);
        for path in [delivery, general] {
            let stored = path.file_name().unwrap().to_string_lossy().into_owned();
            assert_eq!(stored.len(), MAX_FILENAME_BYTES, "{stored}");
            assert!(stored.ends_with(".pdf"));
        }
    }

    #[tokio::test]
    async fn longest_allowed_name_is_written_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let guard = UploadGuard::new(dir.path(), 10, 4);
        let name = sanitize_filename(&format!("{}.pdf", "a".repeat(240))).unwrap();
        let dest = guard.delivery_path(Uuid::new_v4(), &name);

        let total = guard.stream_to(&dest, chunks(&[5])).await.unwrap();

        assert_eq!(total, 5);
        assert_eq!(std::fs::metadata(&dest).unwrap().len(), 5);
        assert_eq!(leftover_parts(&dest), 0);
    }

    #[tokio::test]
    async fn concurrent_uploads_to_one_destination_do_not_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let guard = UploadGuard::new(dir.path(), 100, 2);
        let dest = dir.path().join("same.txt");

        let (a, b) = tokio::join!(
            guard.stream_to(&dest, filled(b'a', &[2, 2, 2, 2])),
            guard.stream_to(&dest, filled(b'b', &[2, 2, 2, 2])),
        );

        assert_eq!(a.unwrap(), 8);
        assert_eq!(b.unwrap(), 8);
        let stored = std::fs::read(&dest).unwrap();
        assert!(stored == vec![b'a'; 8] || stored == vec![b'b'; 8], "{stored:?}");
        assert_eq!(leftover_parts(&dest), 0);
    }
}
