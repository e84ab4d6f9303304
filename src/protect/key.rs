//! Coalescing fingerprints: operation id plus canonical argument values.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{Month, NaiveDate};

static NEXT_SENTINEL: AtomicU64 = AtomicU64::new(1);

/// Canonical form of one operation argument.
///
/// Two keys are equal when their operation ids are equal and their argument
/// lists are element-wise equal. Dates compare by their UTC-midnight
/// timestamp, so the same calendar day always produces the same value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArgValue {
    /// Absent optional argument.
    Null,
    /// Boolean flag.
    Bool(bool),
    /// Any integer argument.
    Int(i64),
    /// Text argument.
    Str(String),
    /// Calendar date as seconds since the epoch at UTC midnight.
    Date(i64),
    /// Opaque value that equals only itself.
    Sentinel(u64),
}

impl From<bool> for ArgValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ArgValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for ArgValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for ArgValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<NaiveDate> for ArgValue {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value.and_time(chrono::NaiveTime::MIN).and_utc().timestamp())
    }
}

impl From<Month> for ArgValue {
    fn from(value: Month) -> Self {
        Self::Int(i64::from(value.number_from_month()))
    }
}

impl From<Sentinel> for ArgValue {
    fn from(value: Sentinel) -> Self {
        Self::Sentinel(value.0)
    }
}

impl<T: Into<ArgValue>> From<Option<T>> for ArgValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Process-unique marker that makes a fingerprint differ from every other.
///
/// Copies of one sentinel are equal to each other, so calls carrying the same
/// sentinel still coalesce among themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sentinel(u64);

impl Sentinel {
    /// Creates a sentinel distinct from all previously created ones.
    #[must_use]
    pub fn fresh() -> Self {
        Self(NEXT_SENTINEL.fetch_add(1, Ordering::Relaxed))
    }
}

/// Identity of one logical call: operation id plus ordered arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CoalescingKey {
    operation: &'static str,
    args: Vec<ArgValue>,
}

impl CoalescingKey {
    /// Key for `operation` with no arguments yet.
    #[must_use]
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            args: Vec::new(),
        }
    }

    /// Appends an argument.
    #[must_use]
    pub fn arg(mut self, value: impl Into<ArgValue>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Operation id.
    #[must_use]
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// Arguments in call order.
    #[must_use]
    pub fn args(&self) -> &[ArgValue] {
        &self.args
    }
}

impl fmt::Display for CoalescingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.operation)?;
        for (index, arg) in self.args.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            match arg {
                ArgValue::Null => f.write_str("null")?,
                ArgValue::Bool(value) => write!(f, "{value}")?,
                ArgValue::Int(value) => write!(f, "{value}")?,
                ArgValue::Str(value) => write!(f, "{value:?}")?,
                ArgValue::Date(value) => write!(f, "@{value}")?,
                ArgValue::Sentinel(value) => write!(f, "#{value}")?,
            }
        }
        f.write_str(")")
    }
}
