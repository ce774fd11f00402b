//! Training-set rules for LoRA fine-tuning requests.
//!
//! All checks here run before any file touches disk or the network.

use crate::error::CoreError;

/// Fewest images a training run accepts.
pub const MIN_TRAINING_IMAGES: usize = 3;
/// Most images a training run accepts.
pub const MAX_TRAINING_IMAGES: usize = 20;

/// Lower-case extensions accepted for training images.
pub const ALLOWED_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Trigger word used when the caller leaves it blank.
pub const DEFAULT_TRIGGER_WORD: &str = "TOK";

/// Name of the archive handed to the trainer.
pub const TRAINING_ARCHIVE_NAME: &str = "training_images.zip";

/// Lower-cased extension of `file_name`, if it has one.
pub fn file_extension(file_name: &str) -> Option<String> {
    let base = base_name(file_name);
    let (stem, ext) = base.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Validate the number of training images and each file's extension.
pub fn validate_training_files<S: AsRef<str>>(file_names: &[S]) -> Result<(), CoreError> {
    let count = file_names.len();
    if !(MIN_TRAINING_IMAGES..=MAX_TRAINING_IMAGES).contains(&count) {
        return Err(CoreError::Validation(format!(
            "Fine-tuning requires between {MIN_TRAINING_IMAGES} and {MAX_TRAINING_IMAGES} images, got {count}"
        )));
    }

    for name in file_names {
        let name = name.as_ref();
        let allowed = file_extension(name)
            .is_some_and(|ext| ALLOWED_IMAGE_EXTENSIONS.contains(&ext.as_str()));
        if !allowed {
            return Err(CoreError::Validation(format!(
                "Unsupported file '{name}'. Allowed extensions: {}",
                ALLOWED_IMAGE_EXTENSIONS
                    .iter()
                    .map(|e| format!(".{e}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }
    }
    Ok(())
}

/// Normalise the trigger word; blank input falls back to [`DEFAULT_TRIGGER_WORD`].
///
/// Trigger words are embedded in prompts, so whitespace inside them is rejected.
pub fn normalize_trigger_word(raw: Option<&str>) -> Result<String, CoreError> {
    let word = raw.map(str::trim).unwrap_or_default();
    if word.is_empty() {
        return Ok(DEFAULT_TRIGGER_WORD.to_string());
    }
    if word.chars().any(char::is_whitespace) {
        return Err(CoreError::Validation(format!(
            "trigger_word must be a single word, got '{word}'"
        )));
    }
    Ok(word.to_string())
}

/// Strip any directory components a client sent along with a file name.
pub fn base_name(file_name: &str) -> &str {
    file_name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(file_name)
}

/// Produce a safe, unique archive entry name for the `index`-th upload.
///
/// Keeps the client's base name where it is plain ASCII and prefixes the
/// index so duplicate names from different folders cannot collide. The
/// (lowercased) extension is always preserved, even when the stem is
/// nothing but dots.
pub fn archive_entry_name(index: usize, file_name: &str) -> String {
    let base = base_name(file_name);
    let ext = file_extension(base);
    let stem = match &ext {
        Some(ext) => &base[..base.len() - ext.len() - 1],
        None => base,
    };

    let stem: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let stem = match stem.trim_start_matches('.') {
        "" => "image",
        trimmed => trimmed,
    };

    match ext {
        Some(ext) => format!("{:02}_{stem}.{ext}", index + 1),
        None => format!("{:02}_{stem}", index + 1),
    }
}
