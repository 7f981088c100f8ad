pub mod comments;
pub mod error;
