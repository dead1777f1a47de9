//! Pipeline stages for résumé analysis.
//!
//! Each submodule implements exactly one transformation step.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ encode ──▶ llm ──▶ extract
//! (path/URL)  (base64)  (VLM)   (tolerant JSON)
//! ```
//!
//! 1. [`input`]   — load the résumé from a path, URL or memory and sniff its kind
//! 2. [`encode`]  — base64-wrap the document, downscaling oversized images
//! 3. [`llm`]     — one vision call with the analysis prompt; the only stage
//!    with network I/O
//! 4. [`extract`] — recover the first valid JSON value from the raw answer

pub mod encode;
pub mod extract;
pub mod input;
pub mod llm;
