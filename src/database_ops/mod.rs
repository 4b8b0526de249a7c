pub mod connector;
pub mod db;
pub mod documents;
pub mod mongo_source;
pub mod pg_catalog;
pub mod repository;
pub mod retry;
pub mod safety;
pub mod schema;
