//! Framework adapters
//!
//! Each adapter converts one framework's notion of an event (an HTTP request, a
//! database statement, an outbound round trip) into records on a shared [`Logger`].
//!
//! [`Logger`]: crate::core::Logger

pub mod client;
pub mod http;
pub mod query;
pub mod query_policy;
pub mod recovery;
pub mod statement;

pub use client::ClientTraceLogger;
pub use self::http::{
    from_fn, private_error_text, AccessLog, Endpoint, ErrorKind, Exchange, FromFn, HandlerError,
    HttpContext, Middleware, Next, Pipeline, DEFAULT_SKIP_PATHS,
};
pub use query::{OrmLogger, QueryLogger, SqlEngineLogger, SqlLogLevel, ORM_PREFIX, SQL_PREFIX};
pub use query_policy::{
    is_record_not_found, QueryOutcome, QueryPolicy, RecordNotFound, TraceLevel, RECORD_NOT_FOUND,
};
pub use recovery::{Recovery, StackPool, STACK_BUFFER_SIZE};
pub use statement::{bind, BindFormatter, SqlArg, StatementFormatter, TraceEvent};
