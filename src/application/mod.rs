pub mod context;
pub mod handlers;
pub mod services;
pub mod usecases;
