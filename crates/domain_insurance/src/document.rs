//! Claim document descriptors

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use core_kernel::ClaimId;

/// Root namespace for claim files on the document store
pub const CLAIM_DOCUMENT_NAMESPACE: &str = "insurance-claims";

/// Metadata for a file attached to a claim; the bytes live in a `DocumentStore`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimDocument {
    pub name: String,
    pub path: String,
    pub size: u64,
    pub mime_type: String,
    pub uploaded_at: DateTime<Utc>,
}

impl ClaimDocument {
    /// Builds a descriptor with a fresh storage path under the claim's namespace
    pub fn new(claim_id: ClaimId, name: &str, size: u64, mime_type: impl Into<String>) -> Self {
        let name = sanitize_file_name(name);
        Self {
            path: storage_path(claim_id, &name),
            name,
            size,
            mime_type: mime_type.into(),
            uploaded_at: Utc::now(),
        }
    }
}

/// `insurance-claims/{claim}/{random}-{name}`
pub fn storage_path(claim_id: ClaimId, file_name: &str) -> String {
    format!(
        "{}/{}/{}-{}",
        CLAIM_DOCUMENT_NAMESPACE,
        claim_id.as_uuid(),
        Uuid::new_v4().simple(),
        sanitize_file_name(file_name)
    )
}

/// Strips directory components and anything outside `[A-Za-z0-9._-]`
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "document".to_string()
    } else {
        cleaned
    }
}
