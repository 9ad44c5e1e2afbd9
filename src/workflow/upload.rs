//! Presign, transfer and register a local file as an application asset.

use std::path::Path;

use tracing::{error, info, warn};

use crate::error::FactoryError;
use crate::screening::ApiError;
use crate::screening::ScreeningClient;
use crate::screening::types::{BulkDocumentsRequest, DocumentUpload, FileMetadata};

pub const CONTENT_TYPE_PDF: &str = "application/pdf";
pub const CONTENT_TYPE_SVG: &str = "image/svg+xml";
pub const CONTENT_TYPE_OCTET_STREAM: &str = "application/octet-stream";

pub fn content_type_for(filename: &str) -> &'static str {
    let lower = filename.to_ascii_lowercase();
    if lower.ends_with(".pdf") {
        CONTENT_TYPE_PDF
    } else if lower.ends_with(".svg") {
        CONTENT_TYPE_SVG
    } else {
        CONTENT_TYPE_OCTET_STREAM
    }
}

/// A file that has reached object storage but is not yet registered.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub url: String,
    pub metadata: FileMetadata,
}

/// Request a presigned target for `path` and transfer its bytes there.
pub async fn transfer(client: &ScreeningClient, path: &Path) -> Result<UploadedFile, FactoryError> {
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("upload.bin")
        .to_string();
    let content_type = content_type_for(&filename);

    info!("Getting presigned URL for file: {filename}");
    let presign = client.presign(&filename, content_type).await?;
    if presign.url.is_empty() {
        return Err(ApiError::InvalidResponse(
            "Failed to get presigned URL: missing url in response".into(),
        )
        .into());
    }

    info!("Reading file from: {}", path.display());
    let bytes = tokio::fs::read(path).await?;
    let size = bytes.len();

    info!("Uploading file to object storage: {}", presign.url);
    client
        .upload_to_presigned(&presign.url, bytes, content_type)
        .await?;
    info!("File uploaded successfully");

    Ok(UploadedFile {
        url: presign.url,
        metadata: FileMetadata {
            size,
            original_filename: filename,
            content_type: content_type.to_string(),
        },
    })
}

/// Upload the signature image and return the registered asset's global id.
pub async fn upload_signature(
    client: &ScreeningClient,
    application_id: &str,
    path: &Path,
) -> Result<String, FactoryError> {
    let file = transfer(client, path).await?;

    info!("Creating asset record for signature");
    let asset = client
        .create_asset(application_id, &file.url, &file.metadata)
        .await
        .inspect_err(|e| error!("Failed to create signature asset after retries: {e}"))?;

    match asset.asset.and_then(|a| a.global_id) {
        Some(global_id) => {
            info!("Signature asset created successfully. Asset ID: {global_id}");
            Ok(global_id)
        }
        None => Err(ApiError::InvalidResponse(
            "Failed to get asset ID from asset creation response".into(),
        )
        .into()),
    }
}

/// Upload a document and attach it to an income source.
pub async fn upload_income_document(
    client: &ScreeningClient,
    application_id: &str,
    verification_id: &str,
    income_source_id: &str,
    path: &Path,
    document_type: &str,
) -> Result<(), FactoryError> {
    let file = transfer(client, path).await?;

    info!("Creating document record for income source: {income_source_id}");
    let request = BulkDocumentsRequest {
        documents: vec![DocumentUpload {
            document_type,
            url: &file.url,
            metadata: &file.metadata,
        }],
    };
    let response = client
        .bulk_create_documents(application_id, verification_id, income_source_id, &request)
        .await?;

    let first = response
        .assets
        .and_then(|assets| assets.items.into_iter().next());
    match first {
        Some(asset) => info!(
            "Document uploaded successfully. Asset ID: {}",
            asset.global_id.unwrap_or_default()
        ),
        None => warn!("Document upload completed but no assets returned in response"),
    }
    Ok(())
}
