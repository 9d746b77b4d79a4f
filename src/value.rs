//! Defines an enum of all the possible values a table cell can hold.

use enum_as_inner::EnumAsInner;

#[derive(Debug, Clone, PartialEq, EnumAsInner)]
/// Can hold any value that can be stored in a table cell: one variant per
/// `data_type::DataType`, plus `Null`.
pub enum Value {
    Null,
    Bool(bool),
    Long(i32),
    Double(f64),
    Text(String),
    Binary(Vec<u8>),
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(x) => write!(f, "{}", x),
            Value::Long(x) => write!(f, "{}", x),
            Value::Double(x) => write!(f, "{}", x),
            Value::Text(x) => write!(f, "{}", x),
            Value::Binary(_) => write!(f, "<BINARY>"),
        }
    }
}

impl Value {
    /// Null-safe equality: two nulls match, null and non-null do not, and
    /// non-null values compare field-wise.
    pub fn matches(&self, other: &Value) -> bool {
        self == other
    }
}

#[test]
fn test_display() {
    assert_eq!(format!("{}", Value::Long(42)), "42");
    assert_eq!(format!("{}", Value::Null), "NULL");
    assert_eq!(format!("{}", Value::Text(String::from("hi"))), "hi");
}

#[test]
fn test_null_safe_matches() {
    assert!(Value::Null.matches(&Value::Null));
    assert!(!Value::Null.matches(&Value::Long(0)));
    assert!(Value::Long(3).matches(&Value::Long(3)));
    assert!(!Value::Long(3).matches(&Value::Double(3.0)));
}
