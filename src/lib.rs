#[macro_use]
extern crate cfg_if;
#[macro_use]
extern crate derive_more;
#[macro_use]
extern crate serde;

mod cursor;
mod env;
mod error;
mod memory;
mod pager;
mod post;
mod query;
mod service;
mod store;

pub use crate::cursor::*;
pub use crate::env::*;
pub use crate::error::*;
pub use crate::memory::*;
pub use crate::pager::*;
pub use crate::post::*;
pub use crate::query::*;
pub use crate::service::*;
pub use crate::store::*;

cfg_if! { if #[cfg(feature = "postgres")] {
    mod diesel;
    pub use crate::diesel::*;
} }

cfg_if! { if #[cfg(feature = "async-graphql")] {
    mod graphql;
    pub use crate::graphql::*;

    pub(crate) use ::async_graphql;
} }
