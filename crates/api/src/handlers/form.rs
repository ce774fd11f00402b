//! Multipart form reader shared by every upload endpoint.

use std::collections::HashMap;
use std::str::FromStr;

use axum::extract::Multipart;
use headshot_bridge::staging::TrainingUpload;
use headshot_core::error::CoreError;

use crate::error::{AppError, AppResult};

/// A fully buffered multipart form: text fields plus file parts by name.
#[derive(Debug, Default)]
pub struct FormData {
    fields: HashMap<String, String>,
    files: HashMap<String, Vec<TrainingUpload>>,
}

impl FormData {
    /// Drain `multipart` into memory.
    ///
    /// Parts carrying a file name are files; everything else is text. Empty
    /// file parts (an unselected `<input type="file">`) are skipped. A
    /// repeated text field keeps its last value.
    pub async fn read(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| AppError::BadRequest(e.body_text()))?;
                    if bytes.is_empty() {
                        continue;
                    }
                    form.files.entry(name).or_default().push(TrainingUpload {
                        file_name,
                        bytes: bytes.to_vec(),
                    });
                }
                None => {
                    let value = field
                        .text()
                        .await
                        .map_err(|e| AppError::BadRequest(e.body_text()))?;
                    form.fields.insert(name, value);
                }
            }
        }

        Ok(form)
    }

    /// Trimmed value of a text field; blank counts as absent.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Remove and return the first file sent under `name`.
    pub fn take_file(&mut self, name: &str) -> Option<TrainingUpload> {
        let files = self.files.get_mut(name)?;
        if files.is_empty() {
            None
        } else {
            Some(files.remove(0))
        }
    }

    /// Remove and return every file sent under `name`, in upload order.
    pub fn take_files(&mut self, name: &str) -> Vec<TrainingUpload> {
        self.files.remove(name).unwrap_or_default()
    }

    /// Parse an optional text field, rejecting values that do not parse.
    pub fn parse<T: FromStr>(&self, name: &str) -> Result<Option<T>, CoreError> {
        self.text(name)
            .map(|raw| {
                raw.parse().map_err(|_| {
                    CoreError::Validation(format!("{name} has an invalid value '{raw}'"))
                })
            })
            .transpose()
    }
}
