pub mod canonical_colors;
pub mod consolidate;
pub mod constraints;
pub mod health;

/// Variables logged (redacted) in every command's preflight snapshot.
pub(crate) const STORE_ENV_KEYS: &[&str] = &[
    "MONGODB_URI",
    "MONGODB_DATABASE",
    "MONGODB_COLLECTION",
    "DATABASE_URL",
    "RELATIONAL_BRANCH",
    "NEON_BRANCH",
    "FORCE_CONNECTION",
    "DB_MAX_CONNS",
    "STORE_MAX_RETRIES",
    "STORE_RETRY_DELAY_MS",
    "COLOR_OPTION_NAME",
];
