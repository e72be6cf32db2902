//! Timetable Maker Library
//!
//! This library expands a single-week `.docx` template into a full-year timetable:
//! the template's paragraphs and tables are cloned once per week, the owner name
//! and date-range placeholders are filled in, and the result is saved next to the
//! template.

pub mod error;
pub mod helpers;
pub mod models;
pub mod service;

pub use error::{Result, TimetableError};
pub use service::{BatchReport, TimetableConfig, TimetableService};

// Re-export key types for convenience
pub use helpers::docx::DocxPackage;
pub use models::document::{Block, BlockKind, Body, XmlElement, XmlNode};
