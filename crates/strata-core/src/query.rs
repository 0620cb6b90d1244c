//! Typed fetch requests: filter expressions, sort order, and windows.

use crate::store::{Record, Value};
use std::cmp::Ordering;

/// A filter expression evaluated against record values.
///
/// An attribute absent from a record evaluates as null.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Attribute equals value.
    Eq {
        /// Attribute name.
        attribute: String,
        /// Comparison value.
        value: Value,
    },
    /// Attribute does not equal value.
    Ne {
        /// Attribute name.
        attribute: String,
        /// Comparison value.
        value: Value,
    },
    /// Attribute is strictly less than value.
    Lt {
        /// Attribute name.
        attribute: String,
        /// Comparison value.
        value: Value,
    },
    /// Attribute is less than or equal to value.
    Le {
        /// Attribute name.
        attribute: String,
        /// Comparison value.
        value: Value,
    },
    /// Attribute is strictly greater than value.
    Gt {
        /// Attribute name.
        attribute: String,
        /// Comparison value.
        value: Value,
    },
    /// Attribute is greater than or equal to value.
    Ge {
        /// Attribute name.
        attribute: String,
        /// Comparison value.
        value: Value,
    },
    /// Attribute is one of the given values.
    In {
        /// Attribute name.
        attribute: String,
        /// Candidate values.
        values: Vec<Value>,
    },
    /// Attribute is null or absent.
    IsNull {
        /// Attribute name.
        attribute: String,
    },
    /// Attribute is present and non-null.
    IsNotNull {
        /// Attribute name.
        attribute: String,
    },
    /// Every sub-filter matches.
    And(Vec<Filter>),
    /// At least one sub-filter matches.
    Or(Vec<Filter>),
}

impl Filter {
    /// `attribute == value`
    pub fn eq(attribute: impl Into<String>, value: Value) -> Self {
        Filter::Eq {
            attribute: attribute.into(),
            value,
        }
    }

    /// `attribute != value`
    pub fn ne(attribute: impl Into<String>, value: Value) -> Self {
        Filter::Ne {
            attribute: attribute.into(),
            value,
        }
    }

    /// `attribute < value`
    pub fn lt(attribute: impl Into<String>, value: Value) -> Self {
        Filter::Lt {
            attribute: attribute.into(),
            value,
        }
    }

    /// `attribute <= value`
    pub fn le(attribute: impl Into<String>, value: Value) -> Self {
        Filter::Le {
            attribute: attribute.into(),
            value,
        }
    }

    /// `attribute > value`
    pub fn gt(attribute: impl Into<String>, value: Value) -> Self {
        Filter::Gt {
            attribute: attribute.into(),
            value,
        }
    }

    /// `attribute >= value`
    pub fn ge(attribute: impl Into<String>, value: Value) -> Self {
        Filter::Ge {
            attribute: attribute.into(),
            value,
        }
    }

    /// `attribute IN values`
    pub fn is_in(attribute: impl Into<String>, values: Vec<Value>) -> Self {
        Filter::In {
            attribute: attribute.into(),
            values,
        }
    }

    /// `attribute IS NULL`
    pub fn is_null(attribute: impl Into<String>) -> Self {
        Filter::IsNull {
            attribute: attribute.into(),
        }
    }

    /// `attribute IS NOT NULL`
    pub fn is_not_null(attribute: impl Into<String>) -> Self {
        Filter::IsNotNull {
            attribute: attribute.into(),
        }
    }

    /// Evaluate this filter against a record.
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Filter::Eq { attribute, value } => {
                record.get(attribute).is_some_and(|v| v == value)
            }
            Filter::Ne { attribute, value } => {
                record.get(attribute).is_none_or(|v| v != value)
            }
            Filter::Lt { attribute, value } => compare_attr(record, attribute, value)
                .is_some_and(Ordering::is_lt),
            Filter::Le { attribute, value } => compare_attr(record, attribute, value)
                .is_some_and(Ordering::is_le),
            Filter::Gt { attribute, value } => compare_attr(record, attribute, value)
                .is_some_and(Ordering::is_gt),
            Filter::Ge { attribute, value } => compare_attr(record, attribute, value)
                .is_some_and(Ordering::is_ge),
            Filter::In { attribute, values } => record
                .get(attribute)
                .is_some_and(|v| values.iter().any(|candidate| v == candidate)),
            Filter::IsNull { attribute } => {
                record.get(attribute).is_none_or(Value::is_null)
            }
            Filter::IsNotNull { attribute } => {
                record.get(attribute).is_some_and(|v| !v.is_null())
            }
            Filter::And(filters) => filters.iter().all(|f| f.matches(record)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(record)),
        }
    }
}

fn compare_attr(record: &Record, attribute: &str, value: &Value) -> Option<Ordering> {
    record.get(attribute)?.compare(value)
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order.
    Ascending,
    /// Descending order.
    Descending,
}

/// Order specification for fetch results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortOrder {
    /// Attribute to order by.
    pub attribute: String,
    /// Sort direction.
    pub direction: SortDirection,
}

impl SortOrder {
    /// Create ascending order.
    pub fn ascending(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            direction: SortDirection::Ascending,
        }
    }

    /// Create descending order.
    pub fn descending(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            direction: SortDirection::Descending,
        }
    }

    fn compare(&self, a: &Record, b: &Record) -> Ordering {
        let null = Value::Null;
        let left = a.get(&self.attribute).unwrap_or(&null);
        let right = b.get(&self.attribute).unwrap_or(&null);
        let ordering = left.compare(right).unwrap_or(Ordering::Equal);
        match self.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

/// A typed fetch request against one entity.
#[derive(Debug, Clone, Default)]
pub struct FetchRequest {
    /// Entity to fetch.
    pub entity: String,
    /// Optional filter expression.
    pub filter: Option<Filter>,
    /// Sort order, applied in sequence.
    pub sort: Vec<SortOrder>,
    /// Number of leading results to skip.
    pub offset: usize,
    /// Maximum number of results, `None` for unbounded.
    pub limit: Option<usize>,
}

impl FetchRequest {
    /// Create a request fetching every record of an entity.
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            ..Default::default()
        }
    }

    /// Restrict results to records matching the filter.
    pub fn filtered(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Add a sort clause.
    pub fn sorted_by(mut self, order: SortOrder) -> Self {
        self.sort.push(order);
        self
    }

    /// Skip the first `offset` results.
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Cap the number of results.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sort records in place per the request's sort clauses.
    pub(crate) fn sort_records(&self, records: &mut [([u8; 16], Record)]) {
        if self.sort.is_empty() {
            return;
        }
        records.sort_by(|(_, a), (_, b)| {
            for order in &self.sort {
                let ordering = order.compare(a, b);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
    }
}

/// One fetched record with its id.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedObject {
    /// The record id.
    pub id: [u8; 16],
    /// The record values.
    pub record: Record,
}

/// Render a value as a section key for sectioned fetches.
pub(crate) fn section_key(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Int32(v)) => v.to_string(),
        Some(Value::Int64(v)) => v.to_string(),
        Some(Value::Float32(v)) => v.to_string(),
        Some(Value::Float64(v)) => v.to_string(),
        Some(Value::Timestamp(v)) => v.to_string(),
        Some(Value::Uuid(id)) => hex::encode(id),
        Some(Value::Bytes(bytes)) => hex::encode(bytes),
        Some(Value::UuidArray(ids)) => ids.iter().map(hex::encode).collect::<Vec<_>>().join(","),
    }
}
