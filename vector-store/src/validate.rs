use crate::error::{Result, VectorStoreError};

const MAX_COLLECTION_NAME_LEN: usize = 255;
const MAX_DOC_ID_LEN: usize = 512;

/// Collection names are identifiers: a letter or underscore followed by
/// letters, digits, or underscores.
pub fn validate_collection_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(VectorStoreError::Validation(
            "collection name is empty".to_string(),
        ));
    }
    if name.len() > MAX_COLLECTION_NAME_LEN {
        return Err(VectorStoreError::Validation(format!(
            "collection name exceeds {MAX_COLLECTION_NAME_LEN} characters"
        )));
    }
    if !is_identifier(name) {
        return Err(VectorStoreError::Validation(format!(
            "invalid collection name '{name}'"
        )));
    }
    Ok(())
}

/// Document ids may contain any printable characters; quoting happens when
/// filter expressions are rendered.
pub fn validate_doc_id(doc_id: &str) -> Result<()> {
    if doc_id.is_empty() {
        return Err(VectorStoreError::Validation("document id is empty".to_string()));
    }
    if doc_id.len() > MAX_DOC_ID_LEN {
        return Err(VectorStoreError::Validation(format!(
            "document id exceeds {MAX_DOC_ID_LEN} characters"
        )));
    }
    if doc_id.chars().any(char::is_control) {
        return Err(VectorStoreError::Validation(
            "document id contains control characters".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
