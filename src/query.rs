use std::fmt;

use chrono::DateTime;
use thiserror::Error;

use crate::arg::FilterOpt;

/// Projection every filter expression starts with.
pub const PROJECTION: &str = r#"SELECT s.id, s."time", s.words FROM S3Object s"#;

const WHERE: &str = "WHERE";
const AND: &str = "AND";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimeBound {
    From,
    To,
}

impl fmt::Display for TimeBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeBound::From => write!(f, "--from-time"),
            TimeBound::To => write!(f, "--to-time"),
        }
    }
}

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("{bound} value {value:?} is invalid - {source}")]
    InvalidTime {
        bound: TimeBound,
        value: String,
        source: chrono::ParseError,
    },
    #[error("{bound} value {value:?} is invalid - date and time must be separated by 'T'")]
    TimeSeparator { bound: TimeBound, value: String },
}

/// A single boolean clause of the filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Id(i64),
    FromTime(String),
    ToTime(String),
    Word(String),
}

impl Predicate {
    fn validate(&self) -> Result<(), QueryError> {
        match self {
            Predicate::FromTime(value) => check_rfc3339(TimeBound::From, value),
            Predicate::ToTime(value) => check_rfc3339(TimeBound::To, value),
            Predicate::Id(_) | Predicate::Word(_) => Ok(()),
        }
    }

    fn clause(&self) -> String {
        match self {
            Predicate::Id(id) => format!("s.id = {}", id),
            Predicate::FromTime(time) => {
                format!(r#"TO_TIMESTAMP(s."time") >= TO_TIMESTAMP('{}')"#, time)
            }
            Predicate::ToTime(time) => {
                format!(r#"TO_TIMESTAMP(s."time") <= TO_TIMESTAMP('{}')"#, time)
            }
            Predicate::Word(word) => format!("'{}' IN s.words", quote_literal(word)),
        }
    }
}

fn check_rfc3339(bound: TimeBound, value: &str) -> Result<(), QueryError> {
    DateTime::parse_from_rfc3339(value).map_err(|source| QueryError::InvalidTime {
        bound,
        value: value.to_owned(),
        source,
    })?;

    // chrono also takes ' ' and 't' here, S3 only takes 'T'
    if value.as_bytes().get(10) != Some(&b'T') {
        return Err(QueryError::TimeSeparator {
            bound,
            value: value.to_owned(),
        });
    }

    Ok(())
}

// S3 Select string literals escape a quote by doubling it
fn quote_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// Optional filters of a single run. Empty strings count as unset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicates {
    pub id: Option<i64>,
    pub from_time: Option<String>,
    pub to_time: Option<String>,
    pub word: Option<String>,
}

impl Predicates {
    /// Supplied predicates in clause order: id, from-time, to-time, word.
    pub fn to_list(&self) -> Vec<Predicate> {
        let non_empty = |x: &Option<String>| x.clone().filter(|s| !s.is_empty());

        let mut list = Vec::new();

        if let Some(id) = self.id {
            list.push(Predicate::Id(id));
        }

        if let Some(from_time) = non_empty(&self.from_time) {
            list.push(Predicate::FromTime(from_time));
        }

        if let Some(to_time) = non_empty(&self.to_time) {
            list.push(Predicate::ToTime(to_time));
        }

        if let Some(word) = non_empty(&self.word) {
            list.push(Predicate::Word(word));
        }

        list
    }
}

impl From<&FilterOpt> for Predicates {
    fn from(opts: &FilterOpt) -> Self {
        let FilterOpt {
            with_id,
            from_time,
            to_time,
            with_word,
            ..
        } = opts;

        Predicates {
            id: *with_id,
            from_time: from_time.clone(),
            to_time: to_time.clone(),
            word: with_word.clone(),
        }
    }
}

/// Builds the S3 Select expression for the given predicates.
///
/// All time bounds are validated before any clause is produced, so a bad
/// timestamp never yields a partial expression.
pub fn build_query(predicates: &Predicates) -> Result<String, QueryError> {
    let list = predicates.to_list();

    for predicate in &list {
        predicate.validate()?;
    }

    let mut query = PROJECTION.to_owned();
    for (idx, predicate) in list.iter().enumerate() {
        let keyword = if idx == 0 { WHERE } else { AND };
        query.push(' ');
        query.push_str(keyword);
        query.push(' ');
        query.push_str(&predicate.clause());
    }

    Ok(query)
}
