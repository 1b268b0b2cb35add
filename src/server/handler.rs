use super::error::{ApiError, ApiResult};
use super::response::{encode_region, HealthResponse, SegmentResponse};
use super::AppState;
use axum::body::Bytes;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;

/// Multipart field carrying the uploaded image
pub const IMAGE_FIELD: &str = "image";

/// POST /segment - Crop every detected medicine out of an uploaded photo
pub async fn segment(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<SegmentResponse>> {
    let multipart = multipart.map_err(|rejection| {
        tracing::debug!("Rejected non-multipart request: {}", rejection);
        ApiError::NoImage
    })?;

    let image_bytes = read_image_field(multipart).await?.ok_or(ApiError::NoImage)?;
    if image_bytes.is_empty() {
        return Err(ApiError::EmptyImage);
    }

    tracing::debug!("Received {} byte image", image_bytes.len());

    let pipeline = state.pipeline.clone();
    let segmented_images = tokio::task::spawn_blocking(move || -> ApiResult<Vec<String>> {
        let regions = pipeline.run(&image_bytes)?;
        if regions.is_empty() {
            return Err(ApiError::NoDetections);
        }

        regions
            .iter()
            .map(|region| {
                encode_region(&region.image).map_err(|e| {
                    ApiError::server(format!(
                        "Failed to encode region {} at {:?}: {}",
                        region.index, region.bbox, e
                    ))
                })
            })
            .collect()
    })
    .await
    .map_err(|e| ApiError::server(format!("Segmentation task failed: {}", e)))??;

    Ok(Json(SegmentResponse::new(segmented_images)))
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        model: state.pipeline.model_name().to_string(),
    })
}

/// Find the image field, skipping any others
async fn read_image_field(mut multipart: Multipart) -> ApiResult<Option<Bytes>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error("Failed to read multipart body", e))?
    {
        if field.name() == Some(IMAGE_FIELD) {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| multipart_error("Failed to read image field", e))?;
            return Ok(Some(bytes));
        }
    }
    Ok(None)
}

/// Uploads over the body limit are 413; any other broken stream is a server error
fn multipart_error(context: &str, err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(err.body_text())
    } else {
        ApiError::server(format!("{}: {}", context, err))
    }
}
