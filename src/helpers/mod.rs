pub mod dates;
pub mod docx;
pub mod substitute;
pub mod xml;
