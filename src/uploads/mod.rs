// Image uploads: multipart parsing, the type allow-list and on-disk storage
use axum::body::Bytes;
use axum::extract::Multipart;
use chrono::Utc;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use crate::config::UploadConfig;

/// Declared content type -> stored file extension
const ALLOWED_TYPES: &[(&str, &str)] = &[
    ("image/png", "png"),
    ("image/jpeg", "jpeg"),
    ("image/jpg", "jpg"),
];

const MAX_NAME_ATTEMPTS: u32 = 100;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Unsupported image type: {0}")]
    UnsupportedType(String),

    #[error("Too many files, at most {max} allowed")]
    TooManyFiles { max: usize },

    #[error("Uploaded file has no name")]
    MissingFileName,

    #[error("Malformed multipart body: {0}")]
    Multipart(String),

    #[error("Upload storage error: {0}")]
    Io(#[from] std::io::Error),
}

/// Map a declared content type onto the allow-list
pub fn extension_for(content_type: &str) -> Result<&'static str, UploadError> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    ALLOWED_TYPES
        .iter()
        .find(|(mime, _)| *mime == essence)
        .map(|(_, ext)| *ext)
        .ok_or_else(|| UploadError::UnsupportedType(content_type.to_string()))
}

/// An accepted file still held in memory
#[derive(Debug, Clone)]
pub struct PendingFile {
    pub original_name: String,
    pub extension: &'static str,
    pub bytes: Bytes,
}

/// Text fields and accepted files of one multipart request
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    files: Vec<PendingFile>,
}

impl MultipartForm {
    /// Drain the multipart stream. Files are only accepted under `file_field`
    /// and their declared type is checked before the body is read.
    pub async fn read(mut multipart: Multipart, file_field: &str, max_files: usize) -> Result<Self, UploadError> {
        let mut form = MultipartForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| UploadError::Multipart(e.to_string()))?
        {
            let name = field.name().unwrap_or_default().to_string();

            if name == file_field {
                let content_type = field.content_type().unwrap_or_default().to_string();
                let extension = extension_for(&content_type)?;
                let original_name = field
                    .file_name()
                    .filter(|n| !n.trim().is_empty())
                    .ok_or(UploadError::MissingFileName)?
                    .to_string();

                if form.files.len() >= max_files {
                    return Err(UploadError::TooManyFiles { max: max_files });
                }

                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| UploadError::Multipart(e.to_string()))?;
                form.files.push(PendingFile {
                    original_name,
                    extension,
                    bytes,
                });
            } else if field.file_name().is_some() {
                return Err(UploadError::Multipart(format!("unexpected file field '{}'", name)));
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|e| UploadError::Multipart(e.to_string()))?;
                form.fields.insert(name, value);
            }
        }

        Ok(form)
    }

    pub fn fields(&self) -> &HashMap<String, String> {
        &self.fields
    }

    pub fn take_files(&mut self) -> Vec<PendingFile> {
        std::mem::take(&mut self.files)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredFile {
    pub file_name: String,
    pub path: PathBuf,
}

/// Local content directory served statically under `public_path`
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
    public_path: String,
    max_gallery_images: usize,
}

impl UploadStore {
    pub fn new(config: &UploadConfig) -> Self {
        Self {
            dir: config.dir.clone(),
            public_path: format!("/{}", config.public_path.trim_matches('/')),
            max_gallery_images: config.max_gallery_images,
        }
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    pub fn public_path(&self) -> &str {
        &self.public_path
    }

    pub fn max_gallery_images(&self) -> usize {
        self.max_gallery_images
    }

    /// Write one file under a fresh name; never overwrites
    pub async fn save(&self, file: &PendingFile) -> Result<StoredFile, UploadError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let stem = sanitize_stem(&file.original_name);
        let millis = Utc::now().timestamp_millis();

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let file_name = stored_file_name(&stem, millis, attempt, file.extension);
            let path = self.dir.join(&file_name);

            let mut handle = match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(handle) => handle,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            };

            let written = async {
                handle.write_all(&file.bytes).await?;
                handle.flush().await
            }
            .await;

            let stored = StoredFile { file_name, path };
            if let Err(e) = written {
                self.discard(std::slice::from_ref(&stored)).await;
                return Err(e.into());
            }

            tracing::debug!("Stored upload {} ({} bytes)", stored.file_name, file.bytes.len());
            return Ok(stored);
        }

        Err(UploadError::Io(std::io::Error::new(
            ErrorKind::AlreadyExists,
            "no free file name for upload",
        )))
    }

    /// Save every file or none of them
    pub async fn save_all(&self, files: &[PendingFile]) -> Result<Vec<StoredFile>, UploadError> {
        let mut stored = Vec::with_capacity(files.len());
        for file in files {
            match self.save(file).await {
                Ok(saved) => stored.push(saved),
                Err(e) => {
                    self.discard(&stored).await;
                    return Err(e);
                }
            }
        }
        Ok(stored)
    }

    /// Best-effort removal of files whose owning record failed or went away
    pub async fn discard(&self, files: &[StoredFile]) {
        for file in files {
            match tokio::fs::remove_file(&file.path).await {
                Ok(()) => tracing::debug!("Removed upload {}", file.file_name),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => tracing::warn!("Failed to remove upload {}: {}", file.file_name, e),
            }
        }
    }

    /// The stored file behind a URL built by `public_url`. URLs pointing
    /// anywhere else, or at nested paths, resolve to nothing.
    pub fn stored_from_url(&self, url: &str) -> Option<StoredFile> {
        let marker = format!("{}/", self.public_path);
        let (_, file_name) = url.split_once(&marker)?;
        let plain = !file_name.is_empty()
            && !file_name.starts_with('.')
            && !file_name.contains(&['/', '\\', '?', '#'][..]);
        plain.then(|| StoredFile {
            file_name: file_name.to_string(),
            path: self.dir.join(file_name),
        })
    }

    /// Remove the files behind images that are no longer referenced
    pub async fn discard_urls<'a>(&self, urls: impl IntoIterator<Item = &'a String>) {
        let files: Vec<StoredFile> = urls.into_iter().filter_map(|url| self.stored_from_url(url)).collect();
        self.discard(&files).await;
    }

    /// `<base_url><public_path>/<file>`
    pub fn public_url(&self, base_url: &str, file: &StoredFile) -> String {
        format!(
            "{}{}/{}",
            base_url.trim_end_matches('/'),
            self.public_path,
            file.file_name
        )
    }
}

/// Keep the original name recognisable but filesystem-safe
fn sanitize_stem(original_name: &str) -> String {
    let base = original_name
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();
    let stem = match base.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => base,
    };

    let cleaned: String = stem
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .collect();
    let cleaned = cleaned.trim_matches('.');

    if cleaned.is_empty() {
        "image".to_string()
    } else {
        cleaned.to_string()
    }
}

fn stored_file_name(stem: &str, millis: i64, attempt: u32, extension: &str) -> String {
    if attempt == 0 {
        format!("{}-{}.{}", stem, millis, extension)
    } else {
        format!("{}-{}-{}.{}", stem, millis, attempt, extension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &std::path::Path) -> UploadStore {
        UploadStore::new(&UploadConfig {
            dir: dir.to_path_buf(),
            public_path: "public/uploads/".to_string(),
            max_gallery_images: 10,
        })
    }

    fn png(name: &str) -> PendingFile {
        PendingFile {
            original_name: name.to_string(),
            extension: "png",
            bytes: Bytes::from_static(b"\x89PNG fake"),
        }
    }

    #[test]
    fn allow_list_covers_png_and_jpeg() {
        assert_eq!(extension_for("image/png").unwrap(), "png");
        assert_eq!(extension_for("image/jpeg").unwrap(), "jpeg");
        assert_eq!(extension_for("IMAGE/JPG; charset=binary").unwrap(), "jpg");
        assert!(matches!(
            extension_for("application/pdf"),
            Err(UploadError::UnsupportedType(t)) if t == "application/pdf"
        ));
        assert!(extension_for("").is_err());
    }

    #[test]
    fn sanitizes_original_names() {
        assert_eq!(sanitize_stem("red running shoe.png"), "red-running-shoe");
        assert_eq!(sanitize_stem("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_stem("C:\\photos\\cat.jpeg"), "cat");
        assert_eq!(sanitize_stem("???.png"), "image");
        assert_eq!(sanitize_stem(".hidden"), "hidden");
    }

    #[tokio::test]
    async fn saves_without_overwriting() {
        let tmp = tempfile::tempdir().unwrap();
        let uploads = store(tmp.path());

        let first = uploads.save(&png("shoe one.png")).await.unwrap();
        let second = uploads.save(&png("shoe one.png")).await.unwrap();

        assert!(first.file_name.starts_with("shoe-one-"));
        assert!(first.file_name.ends_with(".png"));
        assert_ne!(first.path, second.path);
        assert!(first.path.exists());
        assert!(second.path.exists());
    }

    #[tokio::test]
    async fn discard_removes_files() {
        let tmp = tempfile::tempdir().unwrap();
        let uploads = store(tmp.path());

        let saved = uploads.save_all(&[png("a.png"), png("b.png")]).await.unwrap();
        assert_eq!(saved.len(), 2);

        uploads.discard(&saved).await;
        assert!(saved.iter().all(|f| !f.path.exists()));
        // already gone is not an error
        uploads.discard(&saved).await;
    }

    #[test]
    fn builds_public_urls() {
        let uploads = store(std::path::Path::new("/tmp/unused"));
        let file = StoredFile {
            file_name: "shoe-1.png".to_string(),
            path: PathBuf::from("/tmp/unused/shoe-1.png"),
        };
        assert_eq!(
            uploads.public_url("https://shop.example.com/", &file),
            "https://shop.example.com/public/uploads/shoe-1.png"
        );
    }

    #[tokio::test]
    async fn resolves_and_discards_own_urls() {
        let tmp = tempfile::tempdir().unwrap();
        let uploads = store(tmp.path());

        let saved = uploads.save(&png("shoe.png")).await.unwrap();
        let url = uploads.public_url("http://localhost:3000", &saved);
        assert_eq!(uploads.stored_from_url(&url), Some(saved.clone()));

        let foreign = "https://cdn.example.com/shoe.png".to_string();
        uploads.discard_urls([&url, &foreign]).await;
        assert!(!saved.path.exists());
    }

    #[test]
    fn ignores_urls_outside_the_upload_dir() {
        let uploads = store(std::path::Path::new("/tmp/unused"));
        assert!(uploads.stored_from_url("http://h/public/uploads/../secret.png").is_none());
        assert!(uploads.stored_from_url("http://h/public/uploads/a/b.png").is_none());
        assert!(uploads.stored_from_url("http://h/public/uploads/").is_none());
        assert!(uploads.stored_from_url("http://h/other/a.png").is_none());
        assert!(uploads.stored_from_url("").is_none());
    }
}
