//! Logging setup and request spans.

use crate::settings::Settings;

/// Installs the global tracing subscriber described by `settings`.
///
/// `settings.log_level` is parsed as an [`EnvFilter`](tracing_subscriber::EnvFilter)
/// directive; an invalid directive falls back to `info`. Debug mode prints a
/// pretty, human-readable format, otherwise one JSON object per line.
/// Calling this twice is harmless: the second installation is ignored.
pub fn setup_logging(settings: &Settings) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_new(&settings.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    if settings.debug {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .pretty()
            .try_init()
            .ok();
    } else {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .try_init()
            .ok();
    }
}

/// Creates the span every admin API request runs in.
///
/// ```
/// use admin_mis_core::logging::request_span;
///
/// let span = request_span("abc-123", "GET", "/api/v1/admin/");
/// let _guard = span.enter();
/// tracing::info!("handling request");
/// ```
pub fn request_span(request_id: &str, method: &str, path: &str) -> tracing::Span {
    tracing::info_span!("request", id = request_id, method = method, path = path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_logging_twice_does_not_panic() {
        let settings = Settings {
            log_level: "not a [valid filter".to_string(),
            ..Settings::default()
        };
        setup_logging(&settings);
        setup_logging(&settings);
    }

    #[test]
    fn test_request_span_metadata() {
        let span = request_span("id-1", "GET", "/");
        if let Some(meta) = span.metadata() {
            assert_eq!(meta.name(), "request");
        }
    }
}
