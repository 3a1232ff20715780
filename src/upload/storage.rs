//! Streaming multipart storage.

use std::collections::HashMap;
use std::path::PathBuf;

use axum::extract::Multipart;
use serde::Serialize;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use super::UploadError;
use crate::config::UploadConfig;

/// A multipart field accepted by an endpoint and how many files it may carry.
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub name: &'static str,
    pub max_count: usize,
}

impl FieldRule {
    pub const fn new(name: &'static str, max_count: usize) -> Self {
        Self { name, max_count }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredFile {
    pub field: String,
    #[serde(rename = "fileName")]
    pub file_name: String,
    pub size: u64,
}

/// Writes uploaded files into a single directory.
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
    max_file_size: u64,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>, max_file_size: u64) -> Self {
        Self {
            dir: dir.into(),
            max_file_size,
        }
    }

    pub fn from_config(config: &UploadConfig) -> Self {
        Self::new(&config.dir, config.max_file_size)
    }

    /// Store every file part of `multipart` that matches `rules`.
    ///
    /// Non-file parts are ignored. On any error the files already written
    /// by this call are removed before the error is returned.
    pub async fn save(
        &self,
        mut multipart: Multipart,
        rules: &[FieldRule],
    ) -> Result<Vec<StoredFile>, UploadError> {
        let mut stored: Vec<StoredFile> = Vec::new();

        let result = self.save_parts(&mut multipart, rules, &mut stored).await;
        let result = result.and_then(|()| {
            if stored.is_empty() {
                Err(UploadError::NoFile)
            } else {
                Ok(())
            }
        });

        match result {
            Ok(()) => Ok(stored),
            Err(e) => {
                for file in &stored {
                    let _ = fs::remove_file(self.dir.join(&file.file_name)).await;
                }
                tracing::warn!(error = %e, removed = stored.len(), "Upload rejected");
                Err(e)
            }
        }
    }

    async fn save_parts(
        &self,
        multipart: &mut Multipart,
        rules: &[FieldRule],
        stored: &mut Vec<StoredFile>,
    ) -> Result<(), UploadError> {
        fs::create_dir_all(&self.dir).await?;
        let mut counts: HashMap<&'static str, usize> = HashMap::new();

        while let Some(mut field) = multipart.next_field().await? {
            let Some(original_name) = field.file_name().map(str::to_string) else {
                continue;
            };
            let field_name = field.name().unwrap_or_default().to_string();

            let rule = rules
                .iter()
                .find(|rule| rule.name == field_name)
                .ok_or_else(|| UploadError::UnexpectedField(field_name.clone()))?;

            let count = counts.entry(rule.name).or_insert(0);
            *count += 1;
            if *count > rule.max_count {
                return Err(UploadError::TooManyFiles {
                    field: field_name,
                    max: rule.max_count,
                });
            }

            let file_name = sanitize_file_name(&original_name);
            let path = self.dir.join(&file_name);
            let mut file = File::create(&path).await?;
            let mut size: u64 = 0;

            let written = async {
                while let Some(chunk) = field.chunk().await? {
                    size += chunk.len() as u64;
                    if size > self.max_file_size {
                        return Err(UploadError::FileTooLarge {
                            limit: self.max_file_size,
                        });
                    }
                    file.write_all(&chunk).await?;
                }
                file.flush().await?;
                Ok::<(), UploadError>(())
            }
            .await;

            if let Err(e) = written {
                drop(file);
                let _ = fs::remove_file(&path).await;
                return Err(e);
            }

            tracing::debug!(field = %field_name, file = %file_name, size, "Stored upload");
            stored.push(StoredFile {
                field: field_name,
                file_name,
                size,
            });
        }

        Ok(())
    }
}

/// Reduce a client-supplied name to a single safe path component.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .filter(|c| !c.is_control() && !matches!(c, '<' | '>' | ':' | '"' | '|' | '?' | '*'))
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.').to_string();

    if cleaned.is_empty() {
        format!("upload-{}", Uuid::new_v4())
    } else {
        cleaned
    }
}
