//! Database operations.

use reqwest::Method;
use serde_json::Value;

use crate::error::Result;
use crate::execution::http::HttpResponse;
use crate::operation::{CouchOperation, process_json_response};
use crate::operations::{ResultHandler, path_segment, validate_database_name};
use crate::types::HttpInfo;

/// `PUT /{db}`
pub struct CreateDatabase {
    name: String,
    handler: Option<ResultHandler<Value>>,
}

impl CreateDatabase {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handler: None,
        }
    }

    pub fn on_response<F>(mut self, handler: F) -> Self
    where
        F: FnOnce(Result<(Value, HttpInfo)>) + Send + 'static,
    {
        self.handler = Some(Box::new(handler));
        self
    }
}

impl CouchOperation for CreateDatabase {
    fn endpoint(&self) -> String {
        format!("/{}", path_segment(&self.name))
    }

    fn method(&self) -> Method {
        Method::PUT
    }

    fn validate(&self) -> Result<()> {
        validate_database_name(&self.name)
    }

    fn process_response(&mut self, result: Result<HttpResponse>) {
        if let Some(handler) = self.handler.take() {
            handler(process_json_response(result));
        }
    }
}

/// `DELETE /{db}`
pub struct DeleteDatabase {
    name: String,
    handler: Option<ResultHandler<Value>>,
}

impl DeleteDatabase {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handler: None,
        }
    }

    pub fn on_response<F>(mut self, handler: F) -> Self
    where
        F: FnOnce(Result<(Value, HttpInfo)>) + Send + 'static,
    {
        self.handler = Some(Box::new(handler));
        self
    }
}

impl CouchOperation for DeleteDatabase {
    fn endpoint(&self) -> String {
        format!("/{}", path_segment(&self.name))
    }

    fn method(&self) -> Method {
        Method::DELETE
    }

    fn validate(&self) -> Result<()> {
        validate_database_name(&self.name)
    }

    fn process_response(&mut self, result: Result<HttpResponse>) {
        if let Some(handler) = self.handler.take() {
            handler(process_json_response(result));
        }
    }
}

/// `GET /_all_dbs`
///
/// The per-database callback runs once for each name before the result
/// handler receives the full list.
#[derive(Default)]
pub struct GetAllDatabases {
    database_handler: Option<Box<dyn FnMut(&str) + Send>>,
    handler: Option<ResultHandler<Vec<String>>>,
}

impl GetAllDatabases {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_database<F>(mut self, handler: F) -> Self
    where
        F: FnMut(&str) + Send + 'static,
    {
        self.database_handler = Some(Box::new(handler));
        self
    }

    pub fn on_response<F>(mut self, handler: F) -> Self
    where
        F: FnOnce(Result<(Vec<String>, HttpInfo)>) + Send + 'static,
    {
        self.handler = Some(Box::new(handler));
        self
    }
}

impl CouchOperation for GetAllDatabases {
    fn endpoint(&self) -> String {
        "/_all_dbs".to_string()
    }

    fn process_response(&mut self, result: Result<HttpResponse>) {
        let result = process_json_response::<Vec<String>>(result);
        if let (Ok((names, _)), Some(each)) = (&result, self.database_handler.as_mut()) {
            for name in names {
                each(name.as_str());
            }
        }
        if let Some(handler) = self.handler.take() {
            handler(result);
        }
    }
}
