//! Multipart intake
//!
//! Reads the `/preview-only` form field by field. The `file` body is streamed
//! chunk by chunk to a hidden staging name while a running byte count is
//! kept; once the count passes the cap the partial file is deleted and the
//! field is marked too large. Nothing is decided here: the caller validates
//! the collected [`PreviewForm`] and then either commits or discards the
//! staged file.

use axum::extract::multipart::{Field, Multipart, MultipartError};
use axum::http::StatusCode;

use super::types::{FileField, PreviewForm, UploadError};
use super::validation::is_allowed_image;
use crate::storage::{sanitize_file_name, staging_name, UploadStorage};

/// Read every field of the form.
///
/// On error any staged body has already been removed.
pub async fn read_form(
    multipart: &mut Multipart,
    storage: &dyn UploadStorage,
    max_bytes: u64,
) -> Result<PreviewForm, UploadError> {
    let mut form = PreviewForm::default();

    let result = collect_fields(multipart, storage, max_bytes, &mut form).await;
    if let Err(e) = result {
        discard_staged(&form, storage).await;
        return Err(e);
    }

    Ok(form)
}

/// Delete the staged body of `form`, if any
pub async fn discard_staged(form: &PreviewForm, storage: &dyn UploadStorage) {
    if let Some(staged) = form.file.as_ref().and_then(|f| f.staged_as.as_deref()) {
        if let Err(e) = storage.delete(staged).await {
            tracing::warn!(staged = %staged, error = %e, "Failed to remove staged upload");
        }
    }
}

async fn collect_fields(
    multipart: &mut Multipart,
    storage: &dyn UploadStorage,
    max_bytes: u64,
    form: &mut PreviewForm,
) -> Result<(), UploadError> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) if limit_after_rejected_file(&e, form) => break,
            Err(e) => return Err(multipart_error(e, max_bytes)),
        };
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" if form.file.is_none() => {
                let file = receive_file(field, storage, max_bytes, form).await?;
                form.file = Some(file);
            }
            "file" => {
                tracing::debug!("Ignoring repeated file field");
            }
            "complexity" | "depth" => {
                let value = match field.text().await {
                    Ok(value) => value,
                    Err(e) if limit_after_rejected_file(&e, form) => break,
                    Err(e) => return Err(multipart_error(e, max_bytes)),
                };
                if name == "complexity" {
                    form.complexity = Some(value);
                } else {
                    form.depth = Some(value);
                }
            }
            other => {
                tracing::debug!(field = %other, "Ignoring unknown form field");
            }
        }
    }

    Ok(())
}

/// The body limit tripped after a file field that validation rejects anyway.
///
/// Reading stops there so the earlier rejection is reported instead of 413.
fn limit_after_rejected_file(e: &MultipartError, form: &PreviewForm) -> bool {
    let rejected = form
        .file
        .as_ref()
        .is_some_and(|file| !is_acceptable_file(file));
    if rejected && e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        tracing::debug!("Body limit reached after a rejected file field, ignoring the rest");
        return true;
    }
    false
}

/// Whether a file field is worth storing: it has a name and an image type
fn is_acceptable_file(file: &FileField) -> bool {
    file.file_name.is_some() && file.content_type.as_deref().is_some_and(is_allowed_image)
}

async fn receive_file(
    mut field: Field<'_>,
    storage: &dyn UploadStorage,
    max_bytes: u64,
    form: &mut PreviewForm,
) -> Result<FileField, UploadError> {
    let mut file = FileField {
        file_name: field.file_name().and_then(sanitize_file_name),
        content_type: field.content_type().map(str::to_string),
        ..FileField::default()
    };

    // Bodies that will be rejected anyway are never written
    if !is_acceptable_file(&file) {
        return Ok(file);
    }

    let staged = staging_name();
    let mut writer = storage.create(&staged).await?;
    // Record the staging name first so error paths can clean it up
    form.file = Some(FileField {
        staged_as: Some(staged.clone()),
        ..file.clone()
    });

    loop {
        let chunk = match field.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                file.too_large = true;
                break;
            }
            Err(e) => return Err(multipart_error(e, max_bytes)),
        };

        file.bytes_received += chunk.len() as u64;
        if file.bytes_received > max_bytes {
            file.too_large = true;
            break;
        }

        writer.write_chunk(&chunk).await?;
    }

    if file.too_large {
        drop(writer);
        storage.delete(&staged).await?;
        form.file = None;
        tracing::info!(
            file_name = ?file.file_name,
            bytes_received = file.bytes_received,
            max_bytes,
            "Upload exceeded size cap, partial file removed"
        );
        return Ok(file);
    }

    writer.finish().await?;
    file.staged_as = Some(staged);
    Ok(file)
}

fn multipart_error(e: MultipartError, max_bytes: u64) -> UploadError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return UploadError::FileTooLarge { max: max_bytes };
    }
    tracing::debug!(error = %e, "Failed to read multipart field");
    UploadError::Malformed(e.body_text())
}
