//! Mapping of sqlx errors into [`AppError`].

use portal_core::error::{AppError, ErrorKind};

/// Wrap a sqlx error, surfacing unique violations as [`ErrorKind::Conflict`].
pub(crate) fn db_error(context: &str, err: sqlx::Error) -> AppError {
    let unique_violation = err
        .as_database_error()
        .is_some_and(|db| db.is_unique_violation());

    if unique_violation {
        AppError::with_source(
            ErrorKind::Conflict,
            format!("{context}: unique constraint violated"),
            err,
        )
    } else {
        AppError::with_source(ErrorKind::Database, format!("{context}: {err}"), err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found_is_database_kind() {
        let err = db_error("Failed to load parent", sqlx::Error::RowNotFound);
        assert_eq!(err.kind, ErrorKind::Database);
        assert!(err.message.starts_with("Failed to load parent"));
    }
}
