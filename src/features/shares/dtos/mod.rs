pub mod share_dto;

pub use share_dto::*;
