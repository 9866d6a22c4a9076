//! Caller authentication for the RPC surface

pub mod jwt;

pub use jwt::{extract_token_from_header, Claims, JwtValidator};
