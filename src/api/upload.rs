// Multipart upload parsing
use actix_multipart::{Field, Multipart};
use bytes::BytesMut;
use futures::TryStreamExt;
use log::{debug, warn};

use crate::error::{Error, Result};
use crate::repository::NewPhoto;

/// Text fields are small; anything larger is not a title or a description
const MAX_TEXT_FIELD_BYTES: usize = 64 * 1024;

fn multipart_error(e: actix_multipart::MultipartError) -> Error {
    Error::Validation(format!("invalid multipart body: {}", e))
}

async fn read_field(field: &mut Field, limit: usize, too_large: &str) -> Result<BytesMut> {
    let mut buffer = BytesMut::new();
    while let Some(chunk) = field.try_next().await.map_err(multipart_error)? {
        if buffer.len() + chunk.len() > limit {
            return Err(Error::Validation(too_large.to_string()));
        }
        buffer.extend_from_slice(&chunk);
    }
    Ok(buffer)
}

/// Consume a field without keeping any of it
async fn drain_field(field: &mut Field) -> Result<usize> {
    let mut skipped = 0;
    while let Some(chunk) = field.try_next().await.map_err(multipart_error)? {
        skipped += chunk.len();
    }
    Ok(skipped)
}

async fn read_text(field: &mut Field, name: &str) -> Result<String> {
    let bytes = read_field(field, MAX_TEXT_FIELD_BYTES, &format!("Field {} is too large", name)).await?;
    String::from_utf8(bytes.to_vec()).map_err(|_| Error::Validation(format!("Field {} is not valid UTF-8", name)))
}

/// Read the `title`, `description` and `photo` fields of an upload form
pub async fn parse_upload(mut payload: Multipart, max_file_size: usize) -> Result<NewPhoto> {
    let mut photo = NewPhoto::default();

    while let Some(mut field) = payload.try_next().await.map_err(multipart_error)? {
        let name = field.content_disposition().get_name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" => photo.title = read_text(&mut field, "title").await?,
            "description" => photo.description = read_text(&mut field, "description").await?,
            "photo" => {
                let is_image = field
                    .content_type()
                    .map(|mime| mime.type_() == actix_web::mime::IMAGE)
                    .unwrap_or(false);
                if !is_image {
                    warn!("Rejected upload with content type {:?}", field.content_type());
                    return Err(Error::Validation("Only image files are allowed".to_string()));
                }
                photo.original_name = field
                    .content_disposition()
                    .get_filename()
                    .unwrap_or_default()
                    .to_string();
                let too_large = format!("File size must not exceed {} MB", max_file_size / (1024 * 1024));
                photo.image_bytes = read_field(&mut field, max_file_size, &too_large).await?.to_vec();
                debug!("Received {} ({} bytes)", photo.original_name, photo.image_bytes.len());
            }
            other => {
                let skipped = drain_field(&mut field).await?;
                debug!("Ignored multipart field {:?} ({} bytes)", other, skipped);
            }
        }
    }

    Ok(photo)
}
