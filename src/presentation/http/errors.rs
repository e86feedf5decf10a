use poem::http::StatusCode;
use tracing::error;

use crate::domain::errors::DomainError;

/// Maps each error kind onto its own status. Internal details are logged, never returned.
pub fn domain_error(err: DomainError) -> poem::Error {
    let status = status_of(&err);
    match err {
        DomainError::Internal(err) => {
            error!(error = %err, "internal error");
            poem::Error::from_string("internal server error", status)
        }
        other => poem::Error::from_string(other.to_string(), status),
    }
}

pub fn status_of(err: &DomainError) -> StatusCode {
    match err {
        DomainError::NotFound(_) => StatusCode::NOT_FOUND,
        DomainError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        DomainError::Conflict(_) => StatusCode::CONFLICT,
        DomainError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        DomainError::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        DomainError::Cancelled => StatusCode::REQUEST_TIMEOUT,
        DomainError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_distinct_statuses() {
        let statuses = [
            status_of(&DomainError::not_found("User", 1)),
            status_of(&DomainError::invalid("bad")),
            status_of(&DomainError::Conflict("dup".into())),
            status_of(&DomainError::Unavailable("down".into())),
            status_of(&DomainError::DeadlineExceeded),
            status_of(&DomainError::Cancelled),
            status_of(&DomainError::Internal(anyhow::anyhow!("boom"))),
        ];
        for (i, a) in statuses.iter().enumerate() {
            for b in &statuses[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn internal_details_are_not_exposed() {
        let err = domain_error(DomainError::Internal(anyhow::anyhow!("password=hunter2")));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.to_string().contains("hunter2"));
    }

    #[test]
    fn not_found_keeps_its_message() {
        let err = domain_error(DomainError::not_found("User", "abc"));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert!(err.to_string().contains("abc"));
    }
}
