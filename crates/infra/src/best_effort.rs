//! Explicit "log-and-continue" handling for optional collaborators.

use tracing::warn;

/// Run a best-effort operation result: log a failure and move on.
///
/// Use this wherever a collaborator's failure must never block the primary
/// authentication/authorization decision (TTL maintenance, audit hooks).
/// Making the swallow explicit keeps the decision visible in review.
pub fn best_effort<T, E: std::fmt::Display>(what: &str, result: Result<T, E>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            warn!("best-effort {what} failed: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_through_success() {
        assert_eq!(best_effort::<_, String>("op", Ok(7)), Some(7));
    }

    #[test]
    fn swallows_failure() {
        let result: Result<i32, &str> = Err("boom");
        assert_eq!(best_effort("op", result), None);
    }
}
