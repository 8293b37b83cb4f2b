//! API Handlers
//!
//! HTTP request handlers for each hoard server endpoint. Namespaces are
//! opened lazily on first request and kept for the life of the server.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::{HoardError, Result};
use crate::hoard::{
    EventHandler, EventKind, Hoard, HoardContext, HoardEvent, ReentrancyProtector,
    DEFAULT_LATEST_LIMIT, MAX_KEY_LENGTH,
};
use crate::models::requests::validate_key;
use crate::models::{
    ClearResponse, DeleteResponse, ExcludesResponse, HealthResponse, KeysQuery, KeysRequest,
    LatestQuery, PutRecordsRequest, PutResponse, RecordResponse, RecordsResponse, StatsResponse,
    VersionResponse,
};
use crate::storage::MemoryStore;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Stores and event sinks shared by every namespace
    pub context: Arc<HoardContext>,
    /// Options applied to each namespace on open
    pub config: Arc<ServerConfig>,
    hoards: Arc<RwLock<HashMap<String, Arc<Hoard>>>>,
    protector: Option<Arc<dyn ReentrancyProtector>>,
}

impl AppState {
    /// Creates a new AppState over the given context.
    ///
    /// Event handlers run on the context's dispatch thread, started when the
    /// first namespace opens, unless [`with_protector`](Self::with_protector)
    /// supplies another protector.
    pub fn new(context: HoardContext, config: ServerConfig) -> Self {
        Self {
            context: Arc::new(context),
            config: Arc::new(config),
            hoards: Arc::new(RwLock::new(HashMap::new())),
            protector: None,
        }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Uses the file store at `store_path` when set. A file that cannot be
    /// opened is logged and replaced by memory.
    pub fn from_config(config: &ServerConfig) -> Self {
        let context = match &config.store_path {
            Some(path) => HoardContext::with_file_store(path, config.store_quota)
                .unwrap_or_else(|err| {
                    warn!(
                        "Could not open store file {}: {}; using in-memory storage",
                        path.display(),
                        err
                    );
                    memory_context(config.store_quota)
                }),
            None => memory_context(config.store_quota),
        };
        Self::new(context, config.clone())
    }

    pub fn with_protector(mut self, protector: Arc<dyn ReentrancyProtector>) -> Self {
        self.protector = Some(protector);
        self
    }

    /// The hoard for `namespace`, opening it on first use.
    pub async fn hoard(&self, namespace: &str) -> Result<Arc<Hoard>> {
        if let Some(hoard) = self.hoards.read().await.get(namespace) {
            return Ok(Arc::clone(hoard));
        }

        validate_namespace(namespace)?;

        let mut hoards = self.hoards.write().await;
        // Another request may have opened it while we waited for the lock.
        if let Some(hoard) = hoards.get(namespace) {
            return Ok(Arc::clone(hoard));
        }

        let context = Arc::clone(&self.context);
        let config = self.config.hoard_config(namespace);
        let protector = self.protector.clone();
        let hoard = blocking(move || {
            let builder = Hoard::builder(&context, config);
            match protector {
                Some(protector) => builder.reentrancy_protector(protector).open(),
                None => builder.open(),
            }
        })
        .await?;

        for kind in EventKind::ALL {
            hoard.on(kind.as_str(), trace_handler(namespace))?;
        }

        info!(
            "Opened namespace '{}' (fallback: {})",
            namespace,
            hoard.is_fallback()
        );

        let hoard = Arc::new(hoard);
        hoards.insert(namespace.to_string(), Arc::clone(&hoard));
        Ok(hoard)
    }

    /// Runs `op` against the hoard for `namespace` on the blocking pool.
    ///
    /// Store reads and writes may hit the disk, so they stay off the
    /// async workers.
    pub async fn with_hoard<T, F>(&self, namespace: &str, op: F) -> Result<T>
    where
        F: FnOnce(&Hoard) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let hoard = self.hoard(namespace).await?;
        blocking(move || op(&hoard)).await
    }
}

async fn blocking<T, F>(op: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(op).await?
}

fn memory_context(quota: Option<usize>) -> HoardContext {
    let store = || -> Arc<MemoryStore> {
        Arc::new(match quota {
            Some(quota) => MemoryStore::with_quota(quota),
            None => MemoryStore::new(),
        })
    };
    HoardContext::new(store(), store())
}

fn trace_handler(namespace: &str) -> EventHandler {
    let namespace = namespace.to_string();
    Arc::new(move |event: &HoardEvent| {
        debug!(
            "{} {} {}",
            namespace,
            event.kind(),
            event.key().unwrap_or("*")
        );
    })
}

fn validate_namespace(namespace: &str) -> Result<()> {
    if namespace.is_empty() {
        return Err(HoardError::InvalidRequest(
            "Namespace cannot be empty".to_string(),
        ));
    }
    if namespace.len() > MAX_KEY_LENGTH {
        return Err(HoardError::InvalidRequest(format!(
            "Namespace exceeds maximum length of {} bytes",
            MAX_KEY_LENGTH
        )));
    }
    Ok(())
}

fn checked_key(key: &str) -> Result<()> {
    match validate_key(key) {
        Some(msg) => Err(HoardError::InvalidRequest(msg)),
        None => Ok(()),
    }
}

/// Handler for PUT /hoards/:namespace/records
///
/// Stores each value under the key found in its `key_field`.
pub async fn put_records_handler(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
    Json(req): Json<PutRecordsRequest>,
) -> Result<Json<PutResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(HoardError::InvalidRequest(error_msg));
    }

    let stored = req.values.len();
    state
        .with_hoard(&namespace, move |hoard| hoard.put(&req.values, &req.key_field))
        .await?;

    Ok(Json(PutResponse::new(&namespace, stored)))
}

/// Handler for GET /hoards/:namespace/records?keys=a,b
///
/// Returns the live values for the listed keys in the order given.
pub async fn get_records_handler(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
    Query(query): Query<KeysQuery>,
) -> Result<Json<RecordsResponse>> {
    let values = state
        .with_hoard(&namespace, move |hoard| Ok(hoard.get(&query.keys())))
        .await?;

    Ok(Json(RecordsResponse::new(namespace, values)))
}

/// Handler for POST /hoards/:namespace/lookup
///
/// Same as the records GET, with keys sent as a JSON list so they may
/// contain commas.
pub async fn lookup_records_handler(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
    Json(req): Json<KeysRequest>,
) -> Result<Json<RecordsResponse>> {
    let values = state
        .with_hoard(&namespace, move |hoard| Ok(hoard.get(&req.keys)))
        .await?;

    Ok(Json(RecordsResponse::new(namespace, values)))
}

/// Handler for DELETE /hoards/:namespace/records
pub async fn clear_records_handler(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> Result<Json<ClearResponse>> {
    state.with_hoard(&namespace, |hoard| hoard.clear()).await?;

    Ok(Json(ClearResponse::new(&namespace)))
}

/// Handler for GET /hoards/:namespace/records/:key
pub async fn get_record_handler(
    State(state): State<AppState>,
    Path((namespace, key)): Path<(String, String)>,
) -> Result<Json<RecordResponse>> {
    checked_key(&key)?;

    let lookup = key.clone();
    let value = state
        .with_hoard(&namespace, move |hoard| Ok(hoard.get_one(&lookup)))
        .await?
        .ok_or_else(|| HoardError::NotFound(key.clone()))?;

    Ok(Json(RecordResponse::new(key, value)))
}

/// Handler for PUT /hoards/:namespace/records/:key
///
/// Stores the request body as-is under the path key.
pub async fn put_record_handler(
    State(state): State<AppState>,
    Path((namespace, key)): Path<(String, String)>,
    Json(value): Json<Value>,
) -> Result<Json<PutResponse>> {
    checked_key(&key)?;

    state
        .with_hoard(&namespace, move |hoard| hoard.put_one(&key, &value))
        .await?;

    Ok(Json(PutResponse::new(&namespace, 1)))
}

/// Handler for DELETE /hoards/:namespace/records/:key
///
/// Returns 404 when there is no live record to delete.
pub async fn delete_record_handler(
    State(state): State<AppState>,
    Path((namespace, key)): Path<(String, String)>,
) -> Result<Json<DeleteResponse>> {
    checked_key(&key)?;

    let target = key.clone();
    let deleted = state
        .with_hoard(&namespace, move |hoard| {
            if !hoard.excludes(&[target.as_str()]).is_empty() {
                return Ok(false);
            }
            hoard.remove_one(&target)?;
            Ok(true)
        })
        .await?;

    if !deleted {
        return Err(HoardError::NotFound(key));
    }
    Ok(Json(DeleteResponse::new(key)))
}

/// Handler for POST /hoards/:namespace/excludes
///
/// Returns the requested keys that have no live record.
pub async fn excludes_handler(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
    Json(req): Json<KeysRequest>,
) -> Result<Json<ExcludesResponse>> {
    let missing = state
        .with_hoard(&namespace, move |hoard| Ok(hoard.excludes(&req.keys)))
        .await?;

    Ok(Json(ExcludesResponse { missing }))
}

/// Handler for GET /hoards/:namespace/latest?limit=n
pub async fn latest_handler(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
    Query(query): Query<LatestQuery>,
) -> Result<Json<RecordsResponse>> {
    let limit = query.limit.unwrap_or(DEFAULT_LATEST_LIMIT);
    let values = state
        .with_hoard(&namespace, move |hoard| Ok(hoard.get_latest(limit)))
        .await?;

    Ok(Json(RecordsResponse::new(namespace, values)))
}

/// Handler for GET /hoards/:namespace/version
pub async fn version_handler(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> Result<Json<VersionResponse>> {
    let version = state
        .with_hoard(&namespace, |hoard| Ok(hoard.version()))
        .await?;

    Ok(Json(VersionResponse { version, namespace }))
}

/// Handler for GET /hoards/:namespace/stats
pub async fn stats_handler(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> Result<Json<StatsResponse>> {
    let (stats, fallback) = state
        .with_hoard(&namespace, |hoard| Ok((hoard.stats(), hoard.is_fallback())))
        .await?;

    Ok(Json(StatsResponse::new(namespace, &stats, fallback)))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
