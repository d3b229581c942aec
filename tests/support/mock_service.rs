use std::{
    collections::HashMap,
    convert::Infallible,
    sync::{Arc, RwLock},
    time::Duration,
};

use anyhow::{Context, Result};
use hyper::service::{make_service_fn, service_fn};
use hyper::{body, Body, Method, Request, Response, Server, StatusCode};
use orgbatch::service::client::methods;
use serde_json::{json, Map, Value};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use uuid::Uuid;

pub const NAME_REQUIRED: i64 = -2147220891;
pub const RECORD_NOT_FOUND: i64 = -2147220969;
pub const UNAUTHORIZED: i64 = -2147180286;
const DEFAULT_PAGE_SIZE: usize = 50;

/// In-memory organization backing the mock service.
#[derive(Clone)]
pub struct MockOrganization {
    inner: Arc<RwLock<OrganizationInner>>,
    accepted_authorization: Arc<Option<String>>,
}

#[derive(Default)]
struct OrganizationInner {
    records: Vec<StoredRecord>,
    associations: Vec<(Uuid, String, Uuid)>,
    calls: HashMap<String, usize>,
}

#[derive(Clone)]
struct StoredRecord {
    logical_name: String,
    id: Uuid,
    attributes: Map<String, Value>,
}

impl StoredRecord {
    fn to_value(&self) -> Value {
        json!({
            "logical_name": self.logical_name,
            "id": self.id,
            "attributes": self.attributes,
        })
    }
}

impl MockOrganization {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(OrganizationInner::default())),
            accepted_authorization: Arc::new(None),
        }
    }

    /// Only requests carrying exactly this `Authorization` header are served.
    pub fn requiring_authorization(value: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(OrganizationInner::default())),
            accepted_authorization: Arc::new(Some(value.into())),
        }
    }

    pub fn seed(&self, logical_name: &str, attributes: Value) -> Uuid {
        let attributes = attributes.as_object().cloned().unwrap_or_default();
        let id = Uuid::new_v4();
        self.inner
            .write()
            .expect("mock organization poisoned")
            .records
            .push(StoredRecord {
                logical_name: logical_name.to_owned(),
                id,
                attributes,
            });
        id
    }

    pub fn record_count(&self, logical_name: &str) -> usize {
        self.inner
            .read()
            .expect("mock organization poisoned")
            .records
            .iter()
            .filter(|record| record.logical_name == logical_name)
            .count()
    }

    pub fn attribute(&self, id: Uuid, name: &str) -> Option<Value> {
        self.inner
            .read()
            .expect("mock organization poisoned")
            .records
            .iter()
            .find(|record| record.id == id)
            .and_then(|record| record.attributes.get(name).cloned())
    }

    pub fn associations(&self) -> Vec<(Uuid, String, Uuid)> {
        self.inner
            .read()
            .expect("mock organization poisoned")
            .associations
            .clone()
    }

    pub fn calls(&self, method: &str) -> usize {
        self.inner
            .read()
            .expect("mock organization poisoned")
            .calls
            .get(method)
            .copied()
            .unwrap_or(0)
    }

    fn authorized(&self, header: Option<&str>) -> bool {
        match self.accepted_authorization.as_ref() {
            Some(expected) => header == Some(expected.as_str()),
            None => true,
        }
    }

    fn create(&self, entity: &Value) -> Result<Value, Value> {
        let logical_name = entity
            .get("logical_name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        let attributes = entity
            .get("attributes")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let has_name = attributes
            .get("name")
            .and_then(Value::as_str)
            .is_some_and(|name| !name.trim().is_empty());
        if !has_name {
            return Err(fault(
                NAME_REQUIRED,
                "name is required",
                Some(json!({ "attribute": "name", "entity": logical_name })),
            ));
        }

        let id = Uuid::new_v4();
        self.inner
            .write()
            .expect("mock organization poisoned")
            .records
            .push(StoredRecord {
                logical_name,
                id,
                attributes,
            });
        Ok(json!(id))
    }

    fn update(&self, entity: &Value) -> Result<Value, Value> {
        let id = parse_id(entity.get("id"))?;
        let attributes = entity
            .get("attributes")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let mut inner = self.inner.write().expect("mock organization poisoned");
        let record = inner
            .records
            .iter_mut()
            .find(|record| record.id == id)
            .ok_or_else(|| not_found(id))?;
        record.attributes.extend(attributes);
        Ok(Value::Null)
    }

    fn delete(&self, reference: &Value) -> Result<Value, Value> {
        let id = parse_id(reference.get("id"))?;
        let mut inner = self.inner.write().expect("mock organization poisoned");
        let before = inner.records.len();
        inner.records.retain(|record| record.id != id);
        if inner.records.len() == before {
            return Err(not_found(id));
        }
        Ok(Value::Null)
    }

    fn associate(&self, request: &Value) -> Result<Value, Value> {
        let target = parse_id(request.pointer("/target/id"))?;
        let relationship = request
            .get("relationship")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        let related = request
            .get("related")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
            .iter()
            .map(|reference| parse_id(reference.get("id")))
            .collect::<Result<Vec<_>, _>>()?;

        let mut inner = self.inner.write().expect("mock organization poisoned");
        for id in std::iter::once(target).chain(related.iter().copied()) {
            if !inner.records.iter().any(|record| record.id == id) {
                return Err(not_found(id));
            }
        }
        for id in related {
            inner.associations.push((target, relationship.clone(), id));
        }
        Ok(Value::Null)
    }

    async fn execute(&self, request: &Value) -> Result<Value, Value> {
        let name = request
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let parameters = request.get("parameters").cloned().unwrap_or(json!({}));
        match name {
            "Echo" => Ok(parameters),
            "Sleep" => {
                let millis = parameters
                    .get("millis")
                    .and_then(Value::as_u64)
                    .unwrap_or(0);
                tokio::time::sleep(Duration::from_millis(millis)).await;
                Ok(json!({ "slept": millis }))
            }
            "CountRecords" => {
                let logical_name = parameters
                    .get("entity")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                Ok(json!(self.record_count(logical_name)))
            }
            other => Err(fault(-32601, format!("unknown action {other}"), None)),
        }
    }

    fn retrieve_multiple(&self, query: &Value, cookie: Option<&str>) -> Result<Value, Value> {
        let logical_name = query
            .get("logical_name")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let filter = query
            .get("filter")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let page_size = query
            .get("page_size")
            .and_then(Value::as_u64)
            .map(|size| size.max(1) as usize)
            .unwrap_or(DEFAULT_PAGE_SIZE);
        let offset = match cookie {
            Some(cookie) => cookie
                .strip_prefix("offset:")
                .and_then(|raw| raw.parse::<usize>().ok())
                .ok_or_else(|| fault(-32602, format!("invalid paging cookie {cookie}"), None))?,
            None => 0,
        };

        let inner = self.inner.read().expect("mock organization poisoned");
        let matching: Vec<&StoredRecord> = inner
            .records
            .iter()
            .filter(|record| record.logical_name == logical_name)
            .filter(|record| {
                filter
                    .iter()
                    .all(|(key, value)| record.attributes.get(key) == Some(value))
            })
            .collect();

        let end = offset.saturating_add(page_size).min(matching.len());
        let entities: Vec<Value> = matching
            .get(offset..end)
            .unwrap_or_default()
            .iter()
            .map(|record| record.to_value())
            .collect();
        let more_records = end < matching.len();

        let mut page = json!({
            "entities": entities,
            "more_records": more_records,
        });
        if more_records {
            page["paging_cookie"] = json!(format!("offset:{end}"));
        }
        Ok(page)
    }

    fn count_call(&self, method: &str) {
        *self
            .inner
            .write()
            .expect("mock organization poisoned")
            .calls
            .entry(method.to_owned())
            .or_default() += 1;
    }
}

pub struct MockServiceServer {
    url: String,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl MockServiceServer {
    pub async fn start(organization: MockOrganization) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("failed to bind mock service listener")?;
        let addr = listener
            .local_addr()
            .context("failed to read mock listener address")?;
        let std_listener = listener
            .into_std()
            .context("failed to convert mock listener")?;
        std_listener
            .set_nonblocking(true)
            .context("failed to set mock listener non-blocking")?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let make_service = make_service_fn(move |_| {
            let organization = organization.clone();
            async move {
                Ok::<_, Infallible>(service_fn(move |req| {
                    serve_request(organization.clone(), req)
                }))
            }
        });

        let server = Server::from_tcp(std_listener)
            .context("failed to build mock HTTP server")?
            .serve(make_service);
        let graceful = server.with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        });

        let handle = tokio::spawn(async move {
            if let Err(err) = graceful.await {
                eprintln!("mock service stopped: {err}");
            }
        });

        Ok(Self {
            url: format!("http://{}", addr),
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

async fn serve_request(
    organization: MockOrganization,
    req: Request<Body>,
) -> Result<Response<Body>, Infallible> {
    if req.method() != Method::POST {
        let mut response = Response::new(Body::from("Unsupported method"));
        *response.status_mut() = StatusCode::METHOD_NOT_ALLOWED;
        return Ok(response);
    }

    let authorization = req
        .headers()
        .get(hyper::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    let bytes = match body::to_bytes(req.into_body()).await {
        Ok(bytes) => bytes,
        Err(err) => {
            let mut response = Response::new(Body::from(format!("failed to read body: {err}")));
            *response.status_mut() = StatusCode::BAD_REQUEST;
            return Ok(response);
        }
    };

    let payload: Value = match serde_json::from_slice(&bytes) {
        Ok(value) => value,
        Err(err) => {
            let mut response = Response::new(Body::from(format!("invalid JSON payload: {err}")));
            *response.status_mut() = StatusCode::BAD_REQUEST;
            return Ok(response);
        }
    };

    let response_value = handle_call(&organization, authorization.as_deref(), payload).await;

    let mut response = Response::new(Body::from(response_value.to_string()));
    response.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("application/json"),
    );
    Ok(response)
}

async fn handle_call(
    organization: &MockOrganization,
    authorization: Option<&str>,
    call: Value,
) -> Value {
    let id = call.get("id").cloned().unwrap_or(Value::Null);
    let method = call
        .get("method")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let params = call
        .get("params")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    organization.count_call(&method);

    if !organization.authorized(authorization) {
        return error(id, fault(UNAUTHORIZED, "caller is not authenticated", None));
    }

    let first = params.first().cloned().unwrap_or(Value::Null);
    let outcome = match method.as_str() {
        methods::WHOAMI => Ok(json!({
            "user_id": Uuid::nil(),
            "organization": "mock-org",
        })),
        methods::CREATE => organization.create(&first),
        methods::UPDATE => organization.update(&first),
        methods::DELETE => organization.delete(&first),
        methods::ASSOCIATE => organization.associate(&first),
        methods::EXECUTE => organization.execute(&first).await,
        methods::RETRIEVE_MULTIPLE => {
            let cookie = params.get(1).and_then(Value::as_str);
            organization.retrieve_multiple(&first, cookie)
        }
        _ => Err(fault(-32601, format!("unknown method {method}"), None)),
    };

    match outcome {
        Ok(result) => success(id, result),
        Err(object) => error(id, object),
    }
}

fn parse_id(value: Option<&Value>) -> Result<Uuid, Value> {
    value
        .and_then(Value::as_str)
        .and_then(|raw| Uuid::parse_str(raw).ok())
        .ok_or_else(|| fault(-32602, "a valid record id is required", None))
}

fn not_found(id: Uuid) -> Value {
    fault(
        RECORD_NOT_FOUND,
        format!("record {id} does not exist"),
        Some(json!({ "id": id })),
    )
}

fn fault(code: i64, message: impl Into<String>, data: Option<Value>) -> Value {
    let mut object = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(data) = data {
        object["data"] = data;
    }
    object
}

fn success(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "result": result,
        "id": id,
    })
}

fn error(id: Value, object: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "error": object,
        "id": id,
    })
}
