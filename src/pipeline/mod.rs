//! Pipeline stages for chunked PDF text extraction.
//!
//! Each submodule implements one step, so each can be tested on its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ split ──▶ transcribe ──▶ assemble
//! (paths)   (lopdf)   (backend,      (page order,
//!                      retries)       markers)
//!            └──────── dispatch ────────┘
//! ```
//!
//! 1. [`input`]: expand the user-supplied path into PDF files
//! 2. [`split`]: cut a standalone sub-document per page range; CPU-bound,
//!    run in `spawn_blocking`
//! 3. [`transcribe`]: one backend call per attempt with timeout, backoff
//!    and cancellation; the only stage with network I/O
//! 4. [`structured`] / [`postprocess`]: render and clean the backend text
//! 5. [`dispatch`]: fan the ranges of a document out under the run-wide
//!    semaphore and collect one result per range
//! 6. [`assemble`]: order results by page and add chunk and failure markers

pub mod assemble;
pub mod cancel;
pub mod dispatch;
pub mod input;
pub mod postprocess;
pub mod split;
pub mod structured;
pub mod transcribe;
