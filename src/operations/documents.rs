//! Document operations.

use bytes::Bytes;
use reqwest::Method;
use serde_json::Value;

use crate::error::{CouchError, Result};
use crate::execution::http::HttpResponse;
use crate::operation::{CouchOperation, process_json_response};
use crate::operations::{
    DocumentUpdate, ResultHandler, path_segment, require_non_empty, validate_database_name,
};
use crate::types::HttpInfo;

/// `GET /{db}/{docid}`
pub struct GetDocument {
    database: String,
    doc_id: String,
    rev: Option<String>,
    revs: Option<bool>,
    handler: Option<ResultHandler<Value>>,
}

impl GetDocument {
    pub fn new(database: impl Into<String>, doc_id: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            doc_id: doc_id.into(),
            rev: None,
            revs: None,
            handler: None,
        }
    }

    /// Fetch a specific revision.
    pub fn rev(mut self, rev: impl Into<String>) -> Self {
        self.rev = Some(rev.into());
        self
    }

    /// Include the document's revision history.
    pub fn revs(mut self, revs: bool) -> Self {
        self.revs = Some(revs);
        self
    }

    pub fn on_response<F>(mut self, handler: F) -> Self
    where
        F: FnOnce(Result<(Value, HttpInfo)>) + Send + 'static,
    {
        self.handler = Some(Box::new(handler));
        self
    }
}

impl CouchOperation for GetDocument {
    fn endpoint(&self) -> String {
        format!(
            "/{}/{}",
            path_segment(&self.database),
            path_segment(&self.doc_id)
        )
    }

    fn parameters(&self) -> Vec<(String, String)> {
        let mut items = Vec::new();
        if let Some(rev) = &self.rev {
            items.push(("rev".to_string(), rev.clone()));
        }
        if let Some(revs) = self.revs {
            items.push(("revs".to_string(), revs.to_string()));
        }
        items
    }

    fn validate(&self) -> Result<()> {
        validate_database_name(&self.database)?;
        require_non_empty("document id", &self.doc_id)
    }

    fn process_response(&mut self, result: Result<HttpResponse>) {
        if let Some(handler) = self.handler.take() {
            handler(process_json_response(result));
        }
    }
}

/// `PUT /{db}/{docid}`, or `POST /{db}` when no id is given and the server
/// assigns one.
pub struct PutDocument {
    database: String,
    doc_id: Option<String>,
    rev: Option<String>,
    document: Value,
    payload: Option<Bytes>,
    handler: Option<ResultHandler<DocumentUpdate>>,
}

impl PutDocument {
    pub fn new(database: impl Into<String>, document: Value) -> Self {
        Self {
            database: database.into(),
            doc_id: None,
            rev: None,
            document,
            payload: None,
            handler: None,
        }
    }

    pub fn id(mut self, doc_id: impl Into<String>) -> Self {
        self.doc_id = Some(doc_id.into());
        self
    }

    /// Revision being updated; required by the server for existing documents.
    pub fn rev(mut self, rev: impl Into<String>) -> Self {
        self.rev = Some(rev.into());
        self
    }

    pub fn on_response<F>(mut self, handler: F) -> Self
    where
        F: FnOnce(Result<(DocumentUpdate, HttpInfo)>) + Send + 'static,
    {
        self.handler = Some(Box::new(handler));
        self
    }
}

impl CouchOperation for PutDocument {
    fn endpoint(&self) -> String {
        match &self.doc_id {
            Some(id) => format!("/{}/{}", path_segment(&self.database), path_segment(id)),
            None => format!("/{}", path_segment(&self.database)),
        }
    }

    fn method(&self) -> Method {
        if self.doc_id.is_some() {
            Method::PUT
        } else {
            Method::POST
        }
    }

    fn parameters(&self) -> Vec<(String, String)> {
        self.rev
            .iter()
            .map(|rev| ("rev".to_string(), rev.clone()))
            .collect()
    }

    fn body(&self) -> Option<Bytes> {
        self.payload.clone()
    }

    fn validate(&self) -> Result<()> {
        validate_database_name(&self.database)?;
        if let Some(id) = &self.doc_id {
            require_non_empty("document id", id)?;
        }
        if !self.document.is_object() {
            return Err(CouchError::validation("document body must be a JSON object"));
        }
        Ok(())
    }

    fn serialise(&mut self) -> Result<()> {
        self.payload = Some(Bytes::from(serde_json::to_vec(&self.document)?));
        Ok(())
    }

    fn process_response(&mut self, result: Result<HttpResponse>) {
        if let Some(handler) = self.handler.take() {
            handler(process_json_response(result));
        }
    }
}

/// `DELETE /{db}/{docid}?rev={rev}`
pub struct DeleteDocument {
    database: String,
    doc_id: String,
    rev: String,
    handler: Option<ResultHandler<DocumentUpdate>>,
}

impl DeleteDocument {
    pub fn new(
        database: impl Into<String>,
        doc_id: impl Into<String>,
        rev: impl Into<String>,
    ) -> Self {
        Self {
            database: database.into(),
            doc_id: doc_id.into(),
            rev: rev.into(),
            handler: None,
        }
    }

    pub fn on_response<F>(mut self, handler: F) -> Self
    where
        F: FnOnce(Result<(DocumentUpdate, HttpInfo)>) + Send + 'static,
    {
        self.handler = Some(Box::new(handler));
        self
    }
}

impl CouchOperation for DeleteDocument {
    fn endpoint(&self) -> String {
        format!(
            "/{}/{}",
            path_segment(&self.database),
            path_segment(&self.doc_id)
        )
    }

    fn method(&self) -> Method {
        Method::DELETE
    }

    fn parameters(&self) -> Vec<(String, String)> {
        vec![("rev".to_string(), self.rev.clone())]
    }

    fn validate(&self) -> Result<()> {
        validate_database_name(&self.database)?;
        require_non_empty("document id", &self.doc_id)?;
        require_non_empty("revision", &self.rev)
    }

    fn process_response(&mut self, result: Result<HttpResponse>) {
        if let Some(handler) = self.handler.take() {
            handler(process_json_response(result));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    #[test]
    fn get_describes_path_and_query() {
        let op = GetDocument::new("db", "a/b").rev("1-abc").revs(true);
        assert_eq!(op.endpoint(), "/db/a%2Fb");
        assert_eq!(op.method(), Method::GET);
        assert_eq!(
            op.parameters(),
            vec![
                ("rev".to_string(), "1-abc".to_string()),
                ("revs".to_string(), "true".to_string())
            ]
        );
        assert!(op.body().is_none());
    }

    #[test]
    fn get_requires_id_and_valid_database() {
        assert!(GetDocument::new("db", "").validate().is_err());
        assert!(GetDocument::new("Bad", "doc").validate().is_err());
        assert!(GetDocument::new("db", "doc").validate().is_ok());
    }

    #[test]
    fn put_without_id_posts_to_database() {
        let mut op = PutDocument::new("db", json!({"hello": "world"}));
        assert_eq!(op.method(), Method::POST);
        assert_eq!(op.endpoint(), "/db");
        op.serialise().unwrap();
        assert_eq!(op.body().unwrap(), Bytes::from_static(br#"{"hello":"world"}"#));

        let op = PutDocument::new("db", json!({})).id("doc").rev("2-x");
        assert_eq!(op.method(), Method::PUT);
        assert_eq!(op.endpoint(), "/db/doc");
        assert_eq!(op.parameters(), vec![("rev".to_string(), "2-x".to_string())]);
    }

    #[test]
    fn put_rejects_non_object_body() {
        let err = PutDocument::new("db", json!([1, 2])).validate().unwrap_err();
        assert!(matches!(err, CouchError::Validation(_)));
    }

    #[test]
    fn delete_requires_revision() {
        assert!(DeleteDocument::new("db", "doc", "").validate().is_err());
        let op = DeleteDocument::new("db", "doc", "1-a");
        assert!(op.validate().is_ok());
        assert_eq!(op.method(), Method::DELETE);
        assert_eq!(op.parameters(), vec![("rev".to_string(), "1-a".to_string())]);
    }

    #[test]
    fn put_handler_receives_typed_update() {
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        let mut op = PutDocument::new("db", json!({})).id("doc").on_response(move |r| {
            *sink.lock().unwrap() = Some(r.map(|(update, _)| update));
        });

        op.process_response(Ok(HttpResponse::new(
            201,
            r#"{"ok":true,"id":"doc","rev":"1-abc"}"#,
        )));

        let update = seen.lock().unwrap().take().unwrap().unwrap();
        assert_eq!(
            update,
            DocumentUpdate {
                ok: true,
                id: "doc".into(),
                rev: "1-abc".into()
            }
        );
    }

    #[test]
    fn get_handler_receives_http_error() {
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        let mut op = GetDocument::new("db", "doc").on_response(move |r| {
            *sink.lock().unwrap() = Some(r);
        });

        op.process_response(Ok(HttpResponse::new(404, r#"{"error":"not_found"}"#)));

        let result = seen.lock().unwrap().take().unwrap();
        assert!(matches!(result, Err(CouchError::Http { status: 404, .. })));
    }
}
