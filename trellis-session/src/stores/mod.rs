//! Built-in session stores.

mod array;
mod cookie;
mod file;

pub use array::ArraySessionStore;
pub use cookie::CookieSessionStore;
pub use file::FileSessionStore;
