//! Journal records and their line encoding
//!
//! Each record is serialized to exactly one newline-terminated line:
//!
//! ```text
//! <key>@<unix-timestamp>:<name1>=<value1>|<name2>=<value2>|...
//! ```

use std::fmt;

use crate::error::{Error, Result};

/// A metric value as written to the journal
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    /// Signed integer
    Int(i64),
    /// Unsigned integer
    UInt(u64),
    /// Floating point, written in shortest round-trip form
    Float(f64),
    /// Pre-formatted decimal text
    Text(String),
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{}", v),
            Self::UInt(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Text(v) => f.write_str(v),
        }
    }
}

impl From<i64> for MetricValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for MetricValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u64> for MetricValue {
    fn from(v: u64) -> Self {
        Self::UInt(v)
    }
}

impl From<u32> for MetricValue {
    fn from(v: u32) -> Self {
        Self::UInt(u64::from(v))
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for MetricValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for MetricValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// A named metric value
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    /// Metric name
    pub name: String,
    /// Metric value
    pub value: MetricValue,
}

impl Metric {
    /// Create a new metric
    pub fn new(name: impl Into<String>, value: impl Into<MetricValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl<N: Into<String>, V: Into<MetricValue>> From<(N, V)> for Metric {
    fn from((name, value): (N, V)) -> Self {
        Self::new(name, value)
    }
}

/// One time-stamped metric write
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    key: String,
    timestamp: i64,
    metrics: Vec<Metric>,
}

impl Record {
    /// Create a record, rejecting text that would break the line format
    pub fn new(key: impl Into<String>, timestamp: i64, metrics: Vec<Metric>) -> Result<Self> {
        let key = key.into();
        if key.contains(['@', '\n']) {
            return Err(Error::invalid_record(format!(
                "key {:?} contains '@' or a newline",
                key
            )));
        }

        for metric in &metrics {
            if metric.name.contains(['|', '=', '\n']) {
                return Err(Error::invalid_record(format!(
                    "metric name {:?} contains '|', '=' or a newline",
                    metric.name
                )));
            }
            match &metric.value {
                MetricValue::Text(text) if text.contains(['|', '=', '\n']) => {
                    return Err(Error::invalid_record(format!(
                        "value of metric {:?} contains '|', '=' or a newline",
                        metric.name
                    )));
                }
                MetricValue::Float(v) if !v.is_finite() => {
                    return Err(Error::invalid_record(format!(
                        "value of metric {:?} is not a finite number",
                        metric.name
                    )));
                }
                _ => {}
            }
        }

        Ok(Self {
            key,
            timestamp,
            metrics,
        })
    }

    /// Record key
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Unix timestamp in seconds
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Metrics in write order
    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }

    /// Append this record's line, newline included, to `buf`
    pub fn encode_into(&self, buf: &mut String) {
        use std::fmt::Write as _;

        // Writing into a String cannot fail
        let _ = write!(buf, "{}@{}:", self.key, self.timestamp);
        for (i, metric) in self.metrics.iter().enumerate() {
            if i > 0 {
                buf.push('|');
            }
            let _ = write!(buf, "{}={}", metric.name, metric.value);
        }
        buf.push('\n');
    }

    /// This record's line, newline included
    pub fn to_line(&self) -> String {
        let mut line = String::new();
        self.encode_into(&mut line);
        line
    }
}

/// Encode a batch in the order given
pub fn encode_batch<'a, I>(records: I) -> String
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut buf = String::new();
    for record in records {
        record.encode_into(&mut buf);
    }
    buf
}
