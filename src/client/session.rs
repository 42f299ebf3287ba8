//! Minimal remote session: get-or-create, range, show, stop.
//!
//! Every RPC goes through the intercepted channel produced by
//! `ChannelBuilder`, so registered interceptors see each call.

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use arrow::array::{Array, AsArray};
use arrow::error::ArrowError;
use arrow::ipc::reader::StreamReader;
use arrow::record_batch::RecordBatch;
use once_cell::sync::Lazy;
use tonic::client::Grpc;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::GrpcMethod;
use uuid::Uuid;

use super::channel::{ChannelBuilder, InterceptedChannel};
use super::proto::{
    self, execute_plan_response::ResponseType, plan, relation, ExecutePlanRequest,
    ExecutePlanResponse, Plan, Relation, RelationCommon, ReleaseSessionRequest,
    ReleaseSessionResponse, UserContext,
};
use crate::errors::ClientError;

/// Used when a builder is given neither a remote nor a channel builder.
/// Mirrors the Spark Connect client default (port 15002), unlike the
/// binary's configured `config::DEFAULT_REMOTE`.
pub const FALLBACK_REMOTE: &str = "sc://localhost";
pub const DEFAULT_SHOW_ROWS: i32 = 20;
pub const DEFAULT_SHOW_TRUNCATE: i32 = 20;

const CLIENT_TYPE: &str = concat!("connect-auth/", env!("CARGO_PKG_VERSION"));

static ACTIVE_SESSION: Lazy<Mutex<Option<SparkSession>>> = Lazy::new(|| Mutex::new(None));

fn active_slot() -> std::sync::MutexGuard<'static, Option<SparkSession>> {
    ACTIVE_SESSION.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Debug, Default)]
pub struct SessionBuilder {
    remote: Option<String>,
    channel_builder: Option<ChannelBuilder>,
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remote(mut self, url: impl Into<String>) -> Self {
        self.remote = Some(url.into());
        self
    }

    /// Use a prepared channel builder (with its interceptors) instead of `remote`.
    pub fn channel_builder(mut self, builder: ChannelBuilder) -> Self {
        self.channel_builder = Some(builder);
        self
    }

    /// Return the active session, or create and register a new one.
    pub async fn get_or_create(self) -> Result<SparkSession, ClientError> {
        if let Some(session) = SparkSession::active() {
            tracing::debug!(session_id = %session.session_id(), "reusing active session");
            return Ok(session);
        }

        let session = self.create().await?;

        let mut slot = active_slot();
        match slot.as_ref() {
            // Lost a race with another caller; keep theirs.
            Some(existing) => Ok(existing.clone()),
            None => {
                *slot = Some(session.clone());
                Ok(session)
            }
        }
    }

    /// Create a new session without touching the active-session slot.
    ///
    /// The connection is established on the first RPC.
    pub async fn create(self) -> Result<SparkSession, ClientError> {
        let builder = match self.channel_builder {
            Some(b) => b,
            None => ChannelBuilder::new(self.remote.as_deref().unwrap_or(FALLBACK_REMOTE))?,
        };
        let connection = builder.connection();

        let session_id = match connection.session_id() {
            Some(id) => Uuid::parse_str(id)
                .map_err(|_| ClientError::connection_string("session_id must be a UUID"))?
                .to_string(),
            None => Uuid::new_v4().to_string(),
        };

        let user_id = connection
            .user_id()
            .map(str::to_string)
            .or_else(|| std::env::var("USER").ok())
            .unwrap_or_default();

        let channel = builder.connect_lazy()?;

        tracing::info!(
            %session_id,
            endpoint = %connection.endpoint_uri(),
            "created session"
        );

        Ok(SparkSession {
            inner: Arc::new(SessionInner {
                session_id,
                user_context: UserContext {
                    user_name: user_id.clone(),
                    user_id,
                },
                channel,
                next_plan_id: AtomicI64::new(0),
                stopped: AtomicBool::new(false),
            }),
        })
    }
}

struct SessionInner {
    session_id: String,
    user_context: UserContext,
    channel: InterceptedChannel,
    next_plan_id: AtomicI64,
    stopped: AtomicBool,
}

/// Handle to a remote session. Cheap to clone.
#[derive(Clone)]
pub struct SparkSession {
    inner: Arc<SessionInner>,
}

impl std::fmt::Debug for SparkSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SparkSession")
            .field("session_id", &self.inner.session_id)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

impl SparkSession {
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    pub fn active() -> Option<SparkSession> {
        active_slot().clone()
    }

    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    pub fn user_id(&self) -> &str {
        &self.inner.user_context.user_id
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    /// `range(end)` is `range_with(0, end, 1)`.
    pub fn range(&self, end: i64) -> DataFrame {
        self.range_with(0, end, 1)
    }

    pub fn range_with(&self, start: i64, end: i64, step: i64) -> DataFrame {
        let relation = Relation {
            common: Some(self.next_common()),
            rel_type: Some(relation::RelType::Range(proto::Range {
                start: Some(start),
                end,
                step,
                num_partitions: None,
            })),
        };
        DataFrame {
            session: self.clone(),
            relation,
        }
    }

    /// Release the server-side session and clear the active slot.
    ///
    /// Calling `stop` more than once is a no-op.
    pub async fn stop(&self) -> Result<(), ClientError> {
        if self.inner.stopped.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        {
            let mut slot = active_slot();
            if slot.as_ref().map(|s| s.session_id()) == Some(self.session_id()) {
                *slot = None;
            }
        }

        let request = ReleaseSessionRequest {
            session_id: self.inner.session_id.clone(),
            user_context: Some(self.inner.user_context.clone()),
            client_type: Some(CLIENT_TYPE.to_string()),
        };

        let mut grpc = self.grpc().await?;
        let mut req = tonic::Request::new(request);
        req.extensions_mut()
            .insert(GrpcMethod::new(proto::SERVICE, "ReleaseSession"));
        let codec: ProstCodec<ReleaseSessionRequest, ReleaseSessionResponse> = ProstCodec::default();
        grpc.unary(req, PathAndQuery::from_static(proto::RELEASE_SESSION_PATH), codec)
            .await?;

        tracing::info!(session_id = %self.inner.session_id, "session released");
        Ok(())
    }

    fn next_common(&self) -> RelationCommon {
        RelationCommon {
            source_info: String::new(),
            plan_id: Some(self.inner.next_plan_id.fetch_add(1, Ordering::SeqCst)),
        }
    }

    async fn grpc(&self) -> Result<Grpc<InterceptedChannel>, ClientError> {
        let mut grpc = Grpc::new(self.inner.channel.clone());
        grpc.ready().await.map_err(ClientError::Transport)?;
        Ok(grpc)
    }

    async fn execute(&self, root: Relation) -> Result<Vec<RecordBatch>, ClientError> {
        let operation_id = Uuid::new_v4().to_string();
        let request = ExecutePlanRequest {
            session_id: self.inner.session_id.clone(),
            user_context: Some(self.inner.user_context.clone()),
            plan: Some(Plan {
                op_type: Some(plan::OpType::Root(root)),
            }),
            client_type: Some(CLIENT_TYPE.to_string()),
            operation_id: Some(operation_id.clone()),
        };

        let mut grpc = self.grpc().await?;
        let mut req = tonic::Request::new(request);
        req.extensions_mut()
            .insert(GrpcMethod::new(proto::SERVICE, "ExecutePlan"));
        let codec: ProstCodec<ExecutePlanRequest, ExecutePlanResponse> = ProstCodec::default();
        let mut stream = grpc
            .server_streaming(req, PathAndQuery::from_static(proto::EXECUTE_PLAN_PATH), codec)
            .await?
            .into_inner();

        let mut batches = Vec::new();
        while let Some(response) = stream.message().await? {
            match response.response_type {
                Some(ResponseType::ArrowBatch(batch)) => {
                    tracing::debug!(%operation_id, rows = batch.row_count, "received arrow batch");
                    batches.extend(decode_arrow_batch(&batch.data)?);
                }
                Some(ResponseType::ResultComplete(_)) => break,
                None => {}
            }
        }
        Ok(batches)
    }
}

/// Lazily evaluated relation bound to a session.
#[derive(Debug, Clone)]
pub struct DataFrame {
    session: SparkSession,
    relation: Relation,
}

impl DataFrame {
    pub fn relation(&self) -> &Relation {
        &self.relation
    }

    /// Server-rendered table text for the first `num_rows` rows.
    pub async fn show_string(&self, num_rows: i32, truncate: i32) -> Result<String, ClientError> {
        let root = Relation {
            common: Some(self.session.next_common()),
            rel_type: Some(relation::RelType::ShowString(Box::new(proto::ShowString {
                input: Some(Box::new(self.relation.clone())),
                num_rows,
                truncate,
                vertical: false,
            }))),
        };
        let batches = self.session.execute(root).await?;
        first_string_cell(&batches)
    }

    /// Print the first 20 rows to stdout.
    pub async fn show(&self) -> Result<(), ClientError> {
        let table = self
            .show_string(DEFAULT_SHOW_ROWS, DEFAULT_SHOW_TRUNCATE)
            .await?;
        println!("{}", table);
        Ok(())
    }
}

fn decode_arrow_batch(data: &[u8]) -> Result<Vec<RecordBatch>, ClientError> {
    let reader = StreamReader::try_new(Cursor::new(data), None)?;
    reader.map(|b| b.map_err(ClientError::from)).collect()
}

fn first_string_cell(batches: &[RecordBatch]) -> Result<String, ClientError> {
    let batch = batches
        .iter()
        .find(|b| b.num_rows() > 0 && b.num_columns() > 0)
        .ok_or(ClientError::EmptyResult)?;
    let column = batch.column(0);

    if let Some(strings) = column.as_string_opt::<i32>() {
        return Ok(strings.value(0).to_string());
    }
    if let Some(strings) = column.as_string_opt::<i64>() {
        return Ok(strings.value(0).to_string());
    }
    Err(ArrowError::SchemaError(format!(
        "expected a string column, got {}",
        column.data_type()
    ))
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{ArrayRef, Int64Array, StringArray};
    use arrow::ipc::writer::StreamWriter;

    fn string_batch(value: &str) -> RecordBatch {
        let col: ArrayRef = Arc::new(StringArray::from(vec![value]));
        RecordBatch::try_from_iter(vec![("show_string", col)]).unwrap()
    }

    #[test]
    fn test_first_string_cell() {
        let batches = vec![string_batch("+---+\n| id|\n+---+\n")];
        assert_eq!(first_string_cell(&batches).unwrap(), "+---+\n| id|\n+---+\n");
    }

    #[test]
    fn test_first_string_cell_empty() {
        assert!(matches!(first_string_cell(&[]), Err(ClientError::EmptyResult)));
    }

    #[test]
    fn test_first_string_cell_wrong_type() {
        let col: ArrayRef = Arc::new(Int64Array::from(vec![1_i64]));
        let batch = RecordBatch::try_from_iter(vec![("id", col)]).unwrap();
        assert!(matches!(
            first_string_cell(&[batch]),
            Err(ClientError::Arrow(_))
        ));
    }

    #[test]
    fn test_decode_arrow_ipc_stream() {
        let batch = string_batch("table");
        let mut buf = Vec::new();
        {
            let mut writer = StreamWriter::try_new(&mut buf, &batch.schema()).unwrap();
            writer.write(&batch).unwrap();
            writer.finish().unwrap();
        }

        let decoded = decode_arrow_batch(&buf).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(first_string_cell(&decoded).unwrap(), "table");
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(decode_arrow_batch(b"not arrow").is_err());
    }

    #[tokio::test]
    async fn test_session_lifecycle_without_server() {
        let session = SessionBuilder::new()
            .remote("sc://127.0.0.1:1/;user_id=alice")
            .get_or_create()
            .await
            .unwrap();
        assert_eq!(session.user_id(), "alice");
        assert!(Uuid::parse_str(session.session_id()).is_ok());

        // A second get_or_create hands back the same session.
        let again = SparkSession::builder()
            .remote("sc://other-host/")
            .get_or_create()
            .await
            .unwrap();
        assert_eq!(again.session_id(), session.session_id());

        let df = session.range(5);
        match &df.relation().rel_type {
            Some(relation::RelType::Range(r)) => {
                assert_eq!((r.start, r.end, r.step), (Some(0), 5, 1));
            }
            other => panic!("unexpected relation {:?}", other),
        }

        // Nothing listens on port 1, so the release RPC fails, but the
        // session is still marked stopped and the slot is cleared.
        assert!(session.stop().await.is_err());
        assert!(session.is_stopped());
        assert!(SparkSession::active().is_none());
        assert!(session.stop().await.is_ok());
    }

    #[tokio::test]
    async fn test_session_id_param_must_be_uuid() {
        let err = SessionBuilder::new()
            .remote("sc://localhost/;session_id=nope")
            .create()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("session_id must be a UUID"));

        let id = Uuid::new_v4().to_string();
        let session = SessionBuilder::new()
            .remote(format!("sc://localhost/;session_id={}", id))
            .create()
            .await
            .unwrap();
        assert_eq!(session.session_id(), id);
    }
}
