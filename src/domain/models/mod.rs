pub mod filter;
pub mod user;

pub use filter::{ListFilter, SortDirection, SortField, SortKey};
pub use user::{NewUser, User, UserLookup, UserUpdate};
