use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

/// Driver chatter that drowns out per-group progress unless asked for.
const QUIET_DEPENDENCIES: &[&str] = &["sqlx=warn", "mongodb=warn", "hyper=warn"];

fn default_directives(default_filter: &str) -> String {
    let mut directives = vec![default_filter.to_string()];
    directives.extend(QUIET_DEPENDENCIES.iter().map(|d| d.to_string()));
    directives.join(",")
}

fn build_filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(default_filter)))
}

/// Installs the global fmt subscriber. `RUST_LOG` wins over `default_filter`;
/// set `LOG_FORMAT=json` for machine-readable lines.
pub fn init_tracing(default_filter: &str) -> Result<(), anyhow::Error> {
    let builder = SubscriberBuilder::default()
        .with_env_filter(build_filter(default_filter))
        .with_target(true)
        .with_line_number(true)
        .with_file(true);

    let json = crate::util::env::env_opt("LOG_FORMAT").is_some_and(|v| v.eq_ignore_ascii_case("json"));
    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| anyhow::anyhow!("failed to initialize tracing: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_quiets_drivers() {
        assert_eq!(
            default_directives("catalog_variants=debug"),
            "catalog_variants=debug,sqlx=warn,mongodb=warn,hyper=warn"
        );
    }
}
