//! Human-readable reports of a flow run.

mod formatter;

pub use formatter::ResultFormatter;
