pub mod discard;
pub mod init;
pub mod score;
pub mod take;
pub mod validate;
