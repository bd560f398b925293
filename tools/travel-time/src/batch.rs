//! Generic row driver
//!
//! Per-row logic is a plain `row -> Result<T>` function. The driver maps a
//! column of optional rows through it: null in gives null out, a row-scoped
//! failure nulls only that row, anything else aborts the whole call.

use tracing::debug;
use travel_time_common::{Error, Result};

pub fn evaluate_rows<R, T, I, F>(rows: I, mut eval: F) -> Result<Vec<Option<T>>>
where
    I: IntoIterator<Item = Option<R>>,
    F: FnMut(R) -> Result<T>,
{
    rows.into_iter()
        .enumerate()
        .map(|(row, input)| match input.map(&mut eval) {
            None => Ok(None),
            Some(Ok(value)) => Ok(Some(value)),
            Some(Err(err)) if err.is_row_scoped() => {
                debug!(row, kind = err.kind(), error = %err, "Row evaluated to null");
                Ok(None)
            }
            Some(Err(err)) => Err(err),
        })
        .collect()
}

/// All argument columns of one call must have the same row count
pub fn common_len(columns: &[(&str, usize)]) -> Result<usize> {
    let Some(&(_, expected)) = columns.first() else {
        return Ok(0);
    };
    match columns.iter().find(|(_, len)| *len != expected) {
        Some((name, len)) => Err(Error::InvalidInput(format!(
            "Column '{name}' has {len} rows, expected {expected}"
        ))),
        None => Ok(expected),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nulls_stay_in_place() {
        let out = evaluate_rows(vec![Some(1), None, Some(3)], |x: i32| Ok(x * 10)).unwrap();
        assert_eq!(out, vec![Some(10), None, Some(30)]);
    }

    #[test]
    fn test_row_scoped_errors_null_the_row() {
        let out = evaluate_rows(vec![Some(1), Some(2), Some(3)], |x: i32| {
            if x == 2 {
                Err(Error::EngineRequest("No path".into()))
            } else if x == 3 {
                Err(Error::GeometryDecode("bad".into()))
            } else {
                Ok(x)
            }
        })
        .unwrap();
        assert_eq!(out, vec![Some(1), None, None]);
    }

    #[test]
    fn test_other_errors_abort() {
        let mut seen = 0;
        let err = evaluate_rows(vec![Some(1), Some(2), Some(3)], |x: i32| {
            seen += 1;
            if x == 2 {
                Err(Error::EngineNotLoaded)
            } else {
                Ok(x)
            }
        })
        .unwrap_err();
        assert!(matches!(err, Error::EngineNotLoaded));
        assert_eq!(seen, 2);
    }

    #[test]
    fn test_common_len() {
        assert_eq!(common_len(&[]).unwrap(), 0);
        assert_eq!(common_len(&[("a", 3), ("b", 3)]).unwrap(), 3);
        let err = common_len(&[("a", 3), ("b", 2)]).unwrap_err();
        assert!(err.to_string().contains("'b'"));
    }
}
