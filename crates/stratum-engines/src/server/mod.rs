//! HTTP server engine adapters
//!
//! Two interchangeable engines behind the `ApiPort`/`PagePort` contracts.
//! Route templates use `:param` segments at the port boundary; both engines
//! here translate them to their native `{param}` syntax.

pub mod actix_engine;
pub mod axum_engine;
pub(crate) mod proxy;

/// Translate a `:param` template to the `{param}` syntax both engines use
pub(crate) fn brace_path(url: &str) -> String {
    url.split('/')
        .map(|segment| match segment.strip_prefix(':') {
            Some(name) => format!("{{{name}}}"),
            None => segment.to_string(),
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Normalize a proxy/static mount prefix: leading slash, no trailing slash
pub(crate) fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brace_path_translates_params() {
        assert_eq!(brace_path("/users/:id/posts/:post"), "/users/{id}/posts/{post}");
        assert_eq!(brace_path("/health"), "/health");
    }

    #[test]
    fn prefix_normalization() {
        assert_eq!(normalize_prefix("api/"), "/api");
        assert_eq!(normalize_prefix("/api"), "/api");
    }
}
