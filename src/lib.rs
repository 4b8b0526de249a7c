pub mod cli;
pub mod database_ops;
pub mod error;
pub mod logging;
pub mod normalization;
pub mod variations;

pub mod util {
    pub mod env;
}
