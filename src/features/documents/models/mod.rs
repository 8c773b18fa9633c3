pub mod document;

pub use document::{Document, DocumentVerification, VerificationStatus};
