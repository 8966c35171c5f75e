pub mod http_client;
pub mod search;
pub mod text_generator;
