//! Hybrid search over OCR'd archive pages: a full-text channel and an
//! embedding channel merged with weighted reciprocal rank fusion.

pub mod cli;
pub mod commands;
pub mod model;
pub mod ranking;
pub mod semantic;
pub mod store;
pub mod util;
