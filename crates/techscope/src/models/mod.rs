pub mod envelope;
pub mod session;
pub mod tool;
pub mod value;

pub use envelope::{ENVELOPE_SCHEMA_VERSION, Envelope, EnvelopeError, EnvelopeFailure};
pub use session::{DEFAULT_SESSION_TITLE, Message, MessageRole, Session};
pub use tool::{
    ExecuteQueryInput, NO_RESULTS_MESSAGE, NO_VALID_RESULTS_MESSAGE, ToolDefinition, ToolOutcome,
};
pub use value::{ResultRow, SqlScalar};
