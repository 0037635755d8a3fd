//! Accumulation of parameterized `WHERE` clauses.

use itertools::Itertools as _;
use sqlx::{
    mysql::{MySql, MySqlArguments},
    query::Query,
};
use time::PrimitiveDateTime;

/// A value bound to a `?` placeholder.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Param {
    Int(i64),
    DateTime(PrimitiveDateTime),
}

impl From<i64> for Param {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<PrimitiveDateTime> for Param {
    fn from(value: PrimitiveDateTime) -> Self {
        Self::DateTime(value)
    }
}

/// Placeholder list for an `IN (...)` clause together with the values to
/// bind, in order.
pub fn in_list<I>(values: I) -> (String, Vec<Param>)
where
    I: IntoIterator,
    I::Item: Into<Param>,
{
    let params = values.into_iter().map(Into::into).collect::<Vec<_>>();
    (placeholders(params.len()), params)
}

pub fn placeholders(count: usize) -> String {
    std::iter::repeat("?").take(count).join(", ")
}

/// Ordered predicates joined with `AND`, and the parameters matching their
/// placeholders positionally.
#[derive(Clone, Debug, Default)]
pub struct Where {
    predicates: Vec<String>,
    params: Vec<Param>,
}

impl Where {
    pub fn push<P>(&mut self, predicate: impl Into<String>, params: P)
    where
        P: IntoIterator<Item = Param>,
    {
        self.predicates.push(predicate.into());
        self.params.extend(params);
    }

    /// Appends a predicate without parameters.
    pub fn and(mut self, predicate: &str) -> Self {
        self.predicates.push(predicate.to_owned());
        self
    }

    pub fn predicates(&self) -> &[String] {
        &self.predicates
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// `WHERE a AND b`, or an empty string when there is nothing to filter.
    pub fn sql(&self) -> String {
        if self.predicates.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.predicates.iter().join(" AND "))
        }
    }

    pub fn bind<'q>(
        &self,
        query: Query<'q, MySql, MySqlArguments>,
    ) -> Query<'q, MySql, MySqlArguments> {
        bind(query, &self.params)
    }
}

/// Binds `params` in order.
pub fn bind<'q>(
    query: Query<'q, MySql, MySqlArguments>,
    params: &[Param],
) -> Query<'q, MySql, MySqlArguments> {
    params.iter().fold(query, |query, param| match *param {
        Param::Int(v) => query.bind(v),
        Param::DateTime(v) => query.bind(v),
    })
}
