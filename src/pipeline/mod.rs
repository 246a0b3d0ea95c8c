//! Pipeline stages for scanned-document OCR.
//!
//! Each submodule implements one transformation step, so stages can be tested
//! alone and the rasteriser or OCR backend swapped without touching the rest.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ ocr / llm ──▶ aggregate
//! (route)   (pdfium)   (PNG)      (service)     (ordered text)
//! ```
//!
//! 1. [`input`]: route a filename to its format; check the `%PDF` header
//! 2. [`render`]: rasterise every page; pdfium runs in `spawn_blocking`
//! 3. [`encode`]: PNG-encode each page image
//! 4. [`ocr`]: the [`ocr::TextDetector`] seam and the Cloud Vision client;
//!    [`llm`] is the vision-LLM alternative, cleaned by [`postprocess`]
//! 5. [`aggregate`]: drive 2–4 page by page and collect text in page order

pub mod aggregate;
pub mod encode;
pub mod input;
pub mod llm;
pub mod ocr;
pub mod postprocess;
pub mod render;
