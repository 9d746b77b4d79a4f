//! matcher defines the pluggable equality predicate used by the cursor's
//! find operations.

use crate::table::Table;
use crate::value::Value;

/// Matches column values during a find.  Implementations are pure and may
/// be swapped per cursor.
pub trait ColumnMatcher {
    /// True if `v1` and `v2` should be considered equal for `column_name`
    /// of `table`.
    fn matches(&self, table: &Table<'_>, column_name: &str, v1: &Value, v2: &Value) -> bool;
}

/// Default matcher: null-safe value equality.  Two nulls match; null and
/// non-null do not; otherwise values compare field-wise.
#[derive(Debug, Default)]
pub struct SimpleColumnMatcher;

impl ColumnMatcher for SimpleColumnMatcher {
    fn matches(&self, _table: &Table<'_>, _column_name: &str, v1: &Value, v2: &Value) -> bool {
        v1.matches(v2)
    }
}

/// Matches text values without regard to ASCII case, delegating everything
/// else to plain value equality.
#[derive(Debug, Default)]
pub struct CaseInsensitiveColumnMatcher;

impl ColumnMatcher for CaseInsensitiveColumnMatcher {
    fn matches(&self, _table: &Table<'_>, _column_name: &str, v1: &Value, v2: &Value) -> bool {
        if let (Some(s1), Some(s2)) = (v1.as_text(), v2.as_text()) {
            return s1.eq_ignore_ascii_case(s2);
        }
        v1.matches(v2)
    }
}
