//! Command line client for the Norikra stream processing server.
//!
//! Targets, fields and queries are managed with one-shot RPC calls. Events are
//! read line by line from stdin and sent in batches, and query output events
//! are written to stdout one line per event.

pub mod buffer_batcher;
pub mod cli;
pub mod event_stream;
pub mod helpers;
pub mod instrumentation;
pub mod models;
pub mod parser;
pub mod rpc;
pub mod runtime;

#[cfg(test)]
mod testing;
