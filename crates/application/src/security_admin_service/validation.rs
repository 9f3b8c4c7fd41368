use std::collections::BTreeSet;

use keystone_core::{AppError, AppResult, FieldErrors};

/// Moves a validation failure into the collected field errors.
///
/// Other error categories propagate unchanged.
pub(super) fn collect<T>(errors: &mut FieldErrors, result: AppResult<T>) -> AppResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(AppError::Validation(field_errors)) => {
            errors.merge(field_errors);
            Ok(None)
        }
        Err(error) => Err(error),
    }
}

/// Returns field errors for requested ids missing from the store, keyed
/// `field.N` by request position.
pub(super) fn missing_references(
    field: &str,
    requested: &[i64],
    existing: &BTreeSet<i64>,
) -> FieldErrors {
    let mut errors = FieldErrors::new();
    for (index, id) in requested.iter().enumerate() {
        if !existing.contains(id) {
            let key = format!("{field}.{index}");
            errors.insert(key.clone(), format!("The selected {key} is invalid."));
        }
    }

    errors
}

/// Drops repeated ids while keeping first-seen order.
pub(super) fn dedup_ids(ids: &[i64]) -> Vec<i64> {
    let mut seen = BTreeSet::new();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

pub(super) fn insert_taken(errors: &mut FieldErrors, field: &str) {
    errors.insert(field, format!("The {field} has already been taken."));
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use keystone_core::{AppError, FieldErrors};

    use super::{collect, dedup_ids, missing_references};

    #[test]
    fn missing_references_are_keyed_by_position() {
        let existing = BTreeSet::from([1]);
        let errors = missing_references("permissions", &[999, 1, 998], &existing);

        assert!(errors.contains("permissions.0"));
        assert!(!errors.contains("permissions.1"));
        assert!(errors.contains("permissions.2"));
    }

    #[test]
    fn collect_propagates_non_validation_errors() {
        let mut errors = FieldErrors::new();
        let result: Result<Option<()>, AppError> = collect(
            &mut errors,
            Err(AppError::Internal("boom".to_owned())),
        );
        assert!(matches!(result, Err(AppError::Internal(_))));
        assert!(errors.is_empty());
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        assert_eq!(dedup_ids(&[3, 1, 3, 2, 1]), vec![3, 1, 2]);
    }
}
