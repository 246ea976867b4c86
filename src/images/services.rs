use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use futures_util::future::join_all;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::dto::UserImageResponse;
use super::repo_types::{Image, NewImage};
use crate::{error::AppError, state::AppState};

const PROMPT_TEMPLATE: &str = "Generate an image of a {prompt} with a width of 640 and a height of 352 EXPLICITLY.";
const STORED_CONTENT_TYPE: &str = "image/png";

pub fn render_prompt(prompt: &str) -> String {
    PROMPT_TEMPLATE.replace("{prompt}", prompt)
}

/// Runs the generator and returns the image as standard base64.
pub async fn generate_image(st: &AppState, prompt: &str) -> Result<String, AppError> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(AppError::BadRequest("Prompt must not be empty.".into()));
    }

    let image = st
        .generator
        .generate(&render_prompt(prompt))
        .await
        .map_err(|e| {
            error!(error = %e, %prompt, "image generation failed");
            AppError::Internal(format!("image generation failed: {e}"))
        })?;
    debug!(mime = %image.mime_type, bytes = image.data.len(), "image generated");

    Ok(STANDARD.encode(&image.data))
}

/// Accepts plain base64 or a `data:*;base64,` URL.
pub fn decode_image(payload: &str) -> Result<Bytes, AppError> {
    let payload = payload.trim();
    let payload = match payload.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => payload,
    };

    let bytes = STANDARD
        .decode(payload)
        .map_err(|_| AppError::BadRequest("Invalid image data format.".into()))?;
    if bytes.is_empty() {
        return Err(AppError::BadRequest("Invalid image data format.".into()));
    }
    Ok(Bytes::from(bytes))
}

/// Fresh key per upload; identical bytes are stored twice.
pub fn blob_path(user_id: Uuid) -> String {
    format!("user_images/{}/{}.png", user_id, Uuid::new_v4())
}

/// decode -> upload -> commit metadata, strictly in that order.
///
/// A failed commit after a successful upload leaves the blob in place; the
/// key is logged under `orphaned_blob` so it can be swept later. A row never
/// points at a blob that was not uploaded.
pub async fn save_user_image(
    st: &AppState,
    user_id: Uuid,
    image_base64: &str,
    prompt: Option<String>,
) -> Result<Image, AppError> {
    let bytes = decode_image(image_base64).map_err(|e| {
        warn!(%user_id, "rejected image payload: not base64");
        e
    })?;

    let key = blob_path(user_id);
    info!(%user_id, %key, bytes = bytes.len(), "uploading image");
    st.storage
        .put_object(&key, bytes, STORED_CONTENT_TYPE)
        .await
        .map_err(|e| {
            error!(error = %e, %user_id, %key, "storage upload failed");
            AppError::Internal(format!("storage error: {e:#}"))
        })?;

    let prompt = prompt
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty());
    let new_image = NewImage {
        id: Uuid::new_v4(),
        user_id,
        file_path: key.clone(),
        prompt,
    };

    match st.images.insert(new_image).await {
        Ok(image) => {
            info!(image_id = %image.id, %user_id, "image saved");
            Ok(image)
        }
        Err(e) => {
            warn!(error = %e, %user_id, orphaned_blob = %key, "image metadata commit failed");
            Err(AppError::Internal(format!("image metadata commit failed: {e}")))
        }
    }
}

/// Owned images, newest first, each with a freshly signed URL. Entries whose
/// URL cannot be signed are dropped; a failed query fails the whole call.
pub async fn list_user_images(
    st: &AppState,
    user_id: Uuid,
) -> Result<Vec<UserImageResponse>, AppError> {
    let images = st.images.list_by_owner(user_id).await.map_err(|e| {
        error!(error = %e, %user_id, "image query failed");
        AppError::Internal(format!("image query failed: {e}"))
    })?;

    let images: Vec<Image> = images
        .into_iter()
        .filter(|img| {
            if img.file_path.is_empty() {
                warn!(image_id = %img.id, %user_id, "image has no file_path");
            }
            !img.file_path.is_empty()
        })
        .collect();

    let ttl = Duration::from_secs(st.config.storage.signed_url_ttl_minutes * 60);
    let urls = join_all(
        images
            .iter()
            .map(|img| st.storage.presign_get(&img.file_path, ttl)),
    )
    .await;

    let entries: Vec<UserImageResponse> = images
        .into_iter()
        .zip(urls)
        .filter_map(|(img, url)| match url {
            Ok(image_url) if !image_url.is_empty() => Some(UserImageResponse {
                id: img.id,
                prompt: img.prompt,
                created_at: img.created_at,
                image_url,
            }),
            Ok(_) => {
                warn!(image_id = %img.id, path = %img.file_path, "empty signed url");
                None
            }
            Err(e) => {
                error!(error = %e, image_id = %img.id, path = %img.file_path, "signing url failed");
                None
            }
        })
        .collect();

    info!(%user_id, count = entries.len(), "prepared image entries");
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{harness, seed_image};

    const PNG_B64: &str = "iVBORw0KGgo=";

    #[test]
    fn prompt_is_wrapped_in_template() {
        assert_eq!(
            render_prompt("red fox"),
            "Generate an image of a red fox with a width of 640 and a height of 352 EXPLICITLY."
        );
    }

    #[test]
    fn decode_accepts_plain_and_data_url() {
        assert_eq!(decode_image(PNG_B64).expect("plain").len(), 8);
        let data_url = format!("data:image/png;base64,{PNG_B64}");
        assert_eq!(decode_image(&data_url).expect("data url").len(), 8);
    }

    #[test]
    fn decode_rejects_garbage_and_empty() {
        assert!(matches!(decode_image("not-base64!!"), Err(AppError::BadRequest(_))));
        assert!(matches!(decode_image(""), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn blob_paths_are_namespaced_and_unique() {
        let user = Uuid::new_v4();
        let a = blob_path(user);
        let b = blob_path(user);
        assert!(a.starts_with(&format!("user_images/{user}/")));
        assert!(a.ends_with(".png"));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn invalid_base64_creates_nothing() {
        let h = harness();
        let user = h.seed_user("ada", "ada@example.com", "password123").await;

        let err = save_user_image(&h.state, user.id, "not-base64!!", None)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::BadRequest(_)));
        assert_eq!(h.images.count(), 0);
        assert_eq!(h.storage.count(), 0);
    }

    #[tokio::test]
    async fn save_creates_one_row_matching_stored_blob() {
        let h = harness();
        let user = h.seed_user("ada", "ada@example.com", "password123").await;

        let image = save_user_image(&h.state, user.id, PNG_B64, Some("  a red fox ".into()))
            .await
            .expect("saved");

        assert_eq!(h.images.count(), 1);
        assert_eq!(image.user_id, user.id);
        assert_eq!(image.prompt.as_deref(), Some("a red fox"));
        let stored = h.storage.get(&image.file_path).expect("blob present");
        assert_eq!(stored.0.len(), 8);
        assert_eq!(stored.1, "image/png");
    }

    #[tokio::test]
    async fn identical_payloads_are_not_deduplicated() {
        let h = harness();
        let user = h.seed_user("ada", "ada@example.com", "password123").await;
        let a = save_user_image(&h.state, user.id, PNG_B64, None).await.expect("a");
        let b = save_user_image(&h.state, user.id, PNG_B64, None).await.expect("b");
        assert_ne!(a.file_path, b.file_path);
        assert_eq!(h.storage.count(), 2);
    }

    #[tokio::test]
    async fn upload_failure_is_internal_and_writes_no_row() {
        let h = harness();
        let user = h.seed_user("ada", "ada@example.com", "password123").await;
        h.storage.fail_uploads();

        let err = save_user_image(&h.state, user.id, PNG_B64, None)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Internal(_)));
        assert_eq!(h.images.count(), 0);
    }

    #[tokio::test]
    async fn commit_failure_keeps_uploaded_blob() {
        let h = harness();
        let user = h.seed_user("ada", "ada@example.com", "password123").await;
        h.images.fail_inserts();

        let err = save_user_image(&h.state, user.id, PNG_B64, None)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Internal(_)));
        assert_eq!(h.images.count(), 0);
        assert_eq!(h.storage.count(), 1);
    }

    #[tokio::test]
    async fn listing_empty_is_ok() {
        let h = harness();
        let user = h.seed_user("ada", "ada@example.com", "password123").await;
        let listed = list_user_images(&h.state, user.id).await.expect("list");
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn listing_is_scoped_to_owner_and_newest_first() {
        let h = harness();
        let ada = h.seed_user("ada", "ada@example.com", "password123").await;
        let bob = h.seed_user("bob", "bob@example.com", "password123").await;

        let old = seed_image(&h, ada.id, "old", 3).await;
        let new = seed_image(&h, ada.id, "new", 1).await;
        seed_image(&h, bob.id, "bob's", 2).await;

        let listed = list_user_images(&h.state, ada.id).await.expect("list");
        let ids: Vec<Uuid> = listed.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![new.id, old.id]);
        assert!(listed[0].image_url.contains(&new.file_path));
    }

    #[tokio::test]
    async fn one_signing_failure_drops_only_that_entry() {
        let h = harness();
        let user = h.seed_user("ada", "ada@example.com", "password123").await;
        let a = seed_image(&h, user.id, "a", 3).await;
        let b = seed_image(&h, user.id, "b", 2).await;
        let c = seed_image(&h, user.id, "c", 1).await;
        h.storage.fail_presign_for(&b.file_path);

        let listed = list_user_images(&h.state, user.id).await.expect("list");
        let ids: Vec<Uuid> = listed.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![c.id, a.id]);
    }

    #[tokio::test]
    async fn query_failure_fails_listing() {
        let h = harness();
        let user = h.seed_user("ada", "ada@example.com", "password123").await;
        h.images.fail_queries();
        let err = list_user_images(&h.state, user.id).await.unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[tokio::test]
    async fn generate_returns_base64_of_generated_bytes() {
        let h = harness();
        let b64 = generate_image(&h.state, "red fox").await.expect("generated");
        assert_eq!(STANDARD.decode(b64).expect("b64"), b"fake-png".to_vec());
        assert_eq!(
            h.generator.last_prompt().as_deref(),
            Some(render_prompt("red fox").as_str())
        );
    }

    #[tokio::test]
    async fn generate_failure_is_internal() {
        let h = harness();
        h.generator.fail();
        let err = generate_image(&h.state, "red fox").await.unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[tokio::test]
    async fn blank_prompt_is_bad_request() {
        let h = harness();
        let err = generate_image(&h.state, "   ").await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
