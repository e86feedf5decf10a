pub mod user_consumer;
