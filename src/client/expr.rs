//! Boolean filter expressions understood by the remote service.
//!
//! Only membership tests are needed by the index: scoping searches to the
//! live ID set, looking rows up by primary key and probing patches by owning
//! sample. Values are rendered as double-quoted string literals.

use std::fmt;

use crate::types::{Record, PK_FIELD, SAMPLE_ID_FIELD};

/// `<field> in ["v1", "v2", ...]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expr {
    field: String,
    values: Vec<String>,
}

impl Expr {
    pub fn field_in<I, S>(field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            field: field.to_string(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Restrict to rows whose primary key is one of `ids`.
    pub fn pk_in<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::field_in(PK_FIELD, ids)
    }

    /// Restrict to rows owned by one of `sample_ids`.
    pub fn sample_id_in<I, S>(sample_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::field_in(SAMPLE_ID_FIELD, sample_ids)
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Evaluate against a stored row. Unknown fields never match.
    pub fn matches(&self, record: &Record) -> bool {
        let value = match self.field.as_str() {
            PK_FIELD => &record.pk,
            SAMPLE_ID_FIELD => &record.sample_id,
            _ => return false,
        };
        self.values.iter().any(|v| v == value)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in [", self.field)?;
        for (i, v) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            f.write_str("\"")?;
            for c in v.chars() {
                match c {
                    '"' => f.write_str("\\\"")?,
                    '\\' => f.write_str("\\\\")?,
                    c => write!(f, "{c}")?,
                }
            }
            f.write_str("\"")?;
        }
        f.write_str("]")
    }
}
