pub mod share;

pub use share::{
    DocumentShare, DocumentSummary, PermissionLevel, Profile, ShareToken, ShareWithDocument,
    SharedDocument,
};
