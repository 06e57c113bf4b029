pub mod token_cache;

pub use token_cache::{IssuedToken, StaticTokenSource, TokenCache, TokenSource};
