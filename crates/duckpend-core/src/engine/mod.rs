//! Ingestion session and flush orchestration.
//!
//! - [`Appender`] is the caller-facing session: open, append, flush, close
//! - [`FlushEngine`] moves staged rows into a target append handle

mod appender;
mod flush;

pub use appender::{Appender, AppenderBuilder, SessionStats};
pub use flush::{FlushEngine, FlushReport};
