//! Worksheet OCR with quality-gated fallback and manual correction.
//!
//! * [`imaging`] classifies uploads and normalizes them for recognition.
//! * [`ocr`] runs the local Tesseract engine.
//! * [`remote`] talks to the fallback proxy and the table-extraction model.
//! * [`pipeline`] gates, falls back and drives the correction session.
//! * [`server`] is the proxy service itself.
//! * [`app`] is the line-oriented terminal front-end.

pub mod app;
pub mod config;
pub mod imaging;
pub mod ocr;
pub mod pipeline;
pub mod remote;
pub mod server;
