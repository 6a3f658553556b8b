// Attachment Lifecycle Manager: uploads incoming files through the
// object gateway, keeps the owning document's attachment list in step
// with the backing objects, and applies the cover policy for
// gallery-like resources.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use crate::error::ApiError;
use crate::storage::{IncomingFile, ObjectGateway, StorageError};

/// Cover sentinel for gallery resources with no attachments left.
pub const DEFAULT_COVER: &str = "";

/// Attachment record embedded on the owning document, in upload order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mimetype: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum AttachmentError {
    #[error("Attachment not found")]
    NotFound,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<AttachmentError> for ApiError {
    fn from(err: AttachmentError) -> Self {
        match err {
            AttachmentError::NotFound => ApiError::not_found("attachment not found"),
            AttachmentError::Storage(e) => e.into(),
        }
    }
}

/// Upload all files concurrently and build attachment records in input
/// order. If any upload fails, the already-stored objects are rolled
/// back best-effort and the whole operation fails — callers never
/// persist a partially-attached parent.
pub async fn attach(
    gateway: &dyn ObjectGateway,
    files: &[IncomingFile],
    folder: &str,
) -> Result<Vec<Attachment>, AttachmentError> {
    let uploads = join_all(files.iter().map(|file| gateway.put(file, folder))).await;

    let mut stored = Vec::with_capacity(uploads.len());
    let mut failure: Option<StorageError> = None;
    for result in uploads {
        match result {
            Ok(object) => stored.push(object),
            Err(e) if failure.is_none() => failure = Some(e),
            Err(_) => {}
        }
    }

    if let Some(err) = failure {
        rollback(gateway, stored.iter().map(|s| s.url.clone()).collect()).await;
        return Err(err.into());
    }

    Ok(stored
        .into_iter()
        .map(|object| Attachment {
            id: Uuid::new_v4(),
            name: object.name,
            url: object.url,
            size: Some(object.size),
            mimetype: Some(object.mimetype),
        })
        .collect())
}

async fn rollback(gateway: &dyn ObjectGateway, urls: Vec<String>) {
    let results = join_all(urls.iter().map(|url| gateway.delete(url))).await;
    for (url, result) in urls.iter().zip(results) {
        if let Err(e) = result {
            warn!(url = %url, error = %e, "rollback of uploaded object failed; object orphaned");
        }
    }
}

/// Remove one attachment record and delete its backing object. The
/// object is deleted first; if that fails the record stays on the list,
/// so the document never references a half-removed attachment.
pub async fn detach_one(
    gateway: &dyn ObjectGateway,
    attachments: &mut Vec<Attachment>,
    attachment_id: Uuid,
) -> Result<Attachment, AttachmentError> {
    let index = attachments
        .iter()
        .position(|a| a.id == attachment_id)
        .ok_or(AttachmentError::NotFound)?;

    gateway.delete(&attachments[index].url).await?;
    Ok(attachments.remove(index))
}

/// Best-effort cascade used during parent deletion: every backing object
/// is requested for deletion, failures are logged and do not abort the
/// remaining deletions. Returns the number of failed deletions.
pub async fn detach_all(gateway: &dyn ObjectGateway, attachments: &[Attachment]) -> usize {
    let results = join_all(attachments.iter().map(|a| gateway.delete(&a.url))).await;

    let mut failures = 0;
    for (attachment, result) in attachments.iter().zip(results) {
        if let Err(e) = result {
            failures += 1;
            warn!(
                url = %attachment.url,
                error = %e,
                "cascade delete of attachment object failed"
            );
        }
    }
    failures
}

/// Cover policy: keep the current cover while it still points at a live
/// attachment; otherwise elect the first remaining attachment; otherwise
/// fall back to the sentinel.
pub fn elect_cover(current: Option<&str>, attachments: &[Attachment]) -> String {
    if let Some(cover) = current {
        if !cover.is_empty() && attachments.iter().any(|a| a.url == cover) {
            return cover.to_string();
        }
    }
    attachments
        .first()
        .map(|a| a.url.clone())
        .unwrap_or_else(|| DEFAULT_COVER.to_string())
}

/// Read the attachment list embedded in a document field. Unknown or
/// malformed entries are dropped rather than failing the whole read.
pub fn from_value(value: Option<&Value>) -> Vec<Attachment> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| serde_json::from_value(item.clone()).ok())
            .collect(),
        _ => vec![],
    }
}

pub fn to_value(attachments: &[Attachment]) -> Value {
    serde_json::to_value(attachments).unwrap_or_else(|_| Value::Array(vec![]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::collections::HashSet;
    use std::sync::Mutex;

    use crate::storage::StoredObject;

    /// Gateway stub: records puts/deletes, fails on command.
    #[derive(Default)]
    struct StubGateway {
        fail_put_names: HashSet<String>,
        fail_delete_urls: HashSet<String>,
        deletes: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ObjectGateway for StubGateway {
        async fn put(&self, file: &IncomingFile, folder: &str) -> Result<StoredObject, StorageError> {
            if self.fail_put_names.contains(&file.file_name) {
                return Err(StorageError::Backend("upload refused".to_string()));
            }
            Ok(StoredObject {
                name: file.file_name.clone(),
                url: format!("https://cdn.test/{}/{}", folder, file.file_name),
                size: file.bytes.len() as u64,
                mimetype: file.mimetype(),
            })
        }

        async fn delete(&self, url: &str) -> Result<(), StorageError> {
            self.deletes.lock().unwrap().push(url.to_string());
            if self.fail_delete_urls.contains(url) {
                return Err(StorageError::Backend("delete refused".to_string()));
            }
            Ok(())
        }
    }

    fn file(name: &str) -> IncomingFile {
        IncomingFile {
            file_name: name.to_string(),
            content_type: Some("image/jpeg".to_string()),
            bytes: Bytes::from_static(b"bytes"),
        }
    }

    fn attachment(url: &str) -> Attachment {
        Attachment {
            id: Uuid::new_v4(),
            name: url.rsplit('/').next().unwrap_or(url).to_string(),
            url: url.to_string(),
            size: Some(1),
            mimetype: Some("image/jpeg".to_string()),
        }
    }

    #[tokio::test]
    async fn attach_preserves_input_order() {
        let gateway = StubGateway::default();
        let files = vec![file("first.jpg"), file("second.jpg"), file("third.jpg")];
        let attached = attach(&gateway, &files, "albums").await.unwrap();

        let names: Vec<&str> = attached.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["first.jpg", "second.jpg", "third.jpg"]);
        assert!(attached.iter().all(|a| a.url.starts_with("https://cdn.test/albums/")));
    }

    #[tokio::test]
    async fn attach_rolls_back_stored_objects_when_any_upload_fails() {
        let mut gateway = StubGateway::default();
        gateway.fail_put_names.insert("bad.jpg".to_string());

        let files = vec![file("ok1.jpg"), file("bad.jpg"), file("ok2.jpg")];
        let err = attach(&gateway, &files, "albums").await;
        assert!(matches!(err, Err(AttachmentError::Storage(_))));

        let deletes = gateway.deletes.lock().unwrap().clone();
        assert!(deletes.contains(&"https://cdn.test/albums/ok1.jpg".to_string()));
        assert!(deletes.contains(&"https://cdn.test/albums/ok2.jpg".to_string()));
        assert_eq!(deletes.len(), 2);
    }

    #[tokio::test]
    async fn detach_one_removes_record_and_object() {
        let gateway = StubGateway::default();
        let mut list = vec![attachment("https://cdn.test/a.jpg"), attachment("https://cdn.test/b.jpg")];
        let target = list[0].id;

        let removed = detach_one(&gateway, &mut list, target).await.unwrap();
        assert_eq!(removed.url, "https://cdn.test/a.jpg");
        assert_eq!(list.len(), 1);
        assert_eq!(gateway.deletes.lock().unwrap().as_slice(), ["https://cdn.test/a.jpg"]);
    }

    #[tokio::test]
    async fn detach_one_unknown_id_is_not_found() {
        let gateway = StubGateway::default();
        let mut list = vec![attachment("https://cdn.test/a.jpg")];
        let err = detach_one(&gateway, &mut list, Uuid::new_v4()).await;
        assert!(matches!(err, Err(AttachmentError::NotFound)));
        assert_eq!(list.len(), 1);
    }

    #[tokio::test]
    async fn detach_one_keeps_record_when_object_delete_fails() {
        let mut gateway = StubGateway::default();
        gateway.fail_delete_urls.insert("https://cdn.test/a.jpg".to_string());
        let mut list = vec![attachment("https://cdn.test/a.jpg")];
        let target = list[0].id;

        let err = detach_one(&gateway, &mut list, target).await;
        assert!(matches!(err, Err(AttachmentError::Storage(_))));
        assert_eq!(list.len(), 1);
    }

    #[tokio::test]
    async fn detach_all_attempts_every_delete_despite_failures() {
        let mut gateway = StubGateway::default();
        gateway.fail_delete_urls.insert("https://cdn.test/b.jpg".to_string());
        let list = vec![
            attachment("https://cdn.test/a.jpg"),
            attachment("https://cdn.test/b.jpg"),
            attachment("https://cdn.test/c.jpg"),
        ];

        let failures = detach_all(&gateway, &list).await;
        assert_eq!(failures, 1);
        assert_eq!(gateway.deletes.lock().unwrap().len(), 3);
    }

    #[test]
    fn first_attachment_becomes_cover() {
        let list = vec![attachment("https://cdn.test/x.jpg"), attachment("https://cdn.test/y.jpg")];
        assert_eq!(elect_cover(None, &list), "https://cdn.test/x.jpg");
        assert_eq!(elect_cover(Some(""), &list), "https://cdn.test/x.jpg");
    }

    #[test]
    fn live_cover_is_kept() {
        let list = vec![attachment("https://cdn.test/x.jpg"), attachment("https://cdn.test/y.jpg")];
        assert_eq!(elect_cover(Some("https://cdn.test/y.jpg"), &list), "https://cdn.test/y.jpg");
    }

    #[test]
    fn deleting_cover_re_elects_or_falls_back() {
        let remaining = vec![attachment("https://cdn.test/y.jpg")];
        assert_eq!(
            elect_cover(Some("https://cdn.test/x.jpg"), &remaining),
            "https://cdn.test/y.jpg"
        );
        assert_eq!(elect_cover(Some("https://cdn.test/x.jpg"), &[]), DEFAULT_COVER);
    }

    #[test]
    fn attachment_list_round_trips_through_document_value() {
        let list = vec![attachment("https://cdn.test/a.jpg")];
        let value = to_value(&list);
        let parsed = from_value(Some(&value));
        assert_eq!(parsed, list);
        // Malformed entries are dropped, not fatal
        let parsed = from_value(Some(&serde_json::json!([{"bogus": true}])));
        assert!(parsed.is_empty());
    }
}
