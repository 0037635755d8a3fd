//! Translation of report query strings into a shared `WHERE` clause.
//!
//! The ticket list, the NPS summary, the TMA summary and the report
//! breakdown all build their predicates here, so the same query string always
//! selects the same tickets. Every statement using [`Filter::to_where`] must
//! join `glpi_entities e` on the ticket's entity and `glpi_entities parent`
//! on that entity's parent (see [`crate::db::ticket::FILTER_JOINS`]).

use derive_more::Display;
use itertools::Itertools as _;
use serde::Deserialize;
use time::{
    format_description::{well_known::Rfc3339, BorrowedFormatItem},
    macros::{format_description, time},
    Date, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset,
};

use crate::db::{
    sql::{in_list, Where},
    ticket::{Actor, Status},
};

/// Statuses a report ever looks at. Always applied; `status` can only narrow
/// it.
pub const REPORTED_STATUSES: [Status; 6] = [
    Status::New,
    Status::Assigned,
    Status::Planned,
    Status::Waiting,
    Status::Solved,
    Status::Closed,
];

/// Raw query string, as sent by the dashboard.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Params {
    #[serde(rename = "startDate")]
    pub start_date: Option<String>,
    #[serde(rename = "endDate")]
    pub end_date: Option<String>,
    /// Client entity.
    pub cliente: Option<String>,
    /// Business unit entity, takes precedence over `cliente`.
    pub unidade: Option<String>,
    pub include_children: Option<String>,
    pub exclude_requerentes: Option<String>,
    pub tecnico: Option<String>,
    pub status: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Filter {
    pub period: Period,
    pub scope: Scope,
    pub technicians: Vec<i64>,
    pub excluded_requesters: Vec<i64>,
    /// Empty means every status of [`REPORTED_STATUSES`].
    pub statuses: Vec<Status>,
}

/// Inclusive bounds on the ticket opening date.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Period {
    pub start: Option<PrimitiveDateTime>,
    pub end: Option<PrimitiveDateTime>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Scope {
    #[default]
    All,
    Unit(i64),
    /// With `include_children`, tickets of direct children match too.
    /// Grandchildren never do.
    Client { id: i64, include_children: bool },
}

#[derive(Clone, Debug, Display, PartialEq)]
#[display("invalid value for `{name}`: {value:?}")]
pub struct InvalidParam {
    pub name: &'static str,
    pub value: String,
}

impl std::error::Error for InvalidParam {}

impl TryFrom<&Params> for Filter {
    type Error = InvalidParam;

    fn try_from(params: &Params) -> Result<Self, Self::Error> {
        let period = Period {
            start: params
                .start_date
                .as_deref()
                .and_then(|raw| parse_bound(raw, Bound::Start)),
            end: params
                .end_date
                .as_deref()
                .and_then(|raw| parse_bound(raw, Bound::End)),
        };

        let scope = match parse_id("unidade", params.unidade.as_deref())? {
            Some(id) => Scope::Unit(id),
            None => match parse_id("cliente", params.cliente.as_deref())? {
                Some(id) => Scope::Client {
                    id,
                    include_children: is_truthy(
                        params.include_children.as_deref(),
                    ),
                },
                None => Scope::All,
            },
        };

        let statuses = parse_list("status", params.status.as_deref())?
            .into_iter()
            .map(|code| {
                u8::try_from(code)
                    .ok()
                    .and_then(|code| Status::try_from(code).ok())
                    .filter(|s| REPORTED_STATUSES.contains(s))
                    .ok_or_else(|| InvalidParam {
                        name: "status",
                        value: code.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            period,
            scope,
            technicians: parse_list("tecnico", params.tecnico.as_deref())?,
            excluded_requesters: parse_list(
                "exclude_requerentes",
                params.exclude_requerentes.as_deref(),
            )?,
            statuses,
        })
    }
}

impl Filter {
    pub fn to_where(&self) -> Where {
        let mut w = Where::default();

        if let Some(start) = self.period.start {
            w.push("t.date >= ?", [start.into()]);
        }
        if let Some(end) = self.period.end {
            w.push("t.date <= ?", [end.into()]);
        }

        match self.scope {
            Scope::All => {}
            Scope::Unit(id)
            | Scope::Client {
                id,
                include_children: false,
            } => w.push("t.entities_id = ?", [id.into()]),
            Scope::Client {
                id,
                include_children: true,
            } => w.push(
                "(t.entities_id = ? OR parent.id = ?)",
                [id.into(), id.into()],
            ),
        }

        if !self.excluded_requesters.is_empty() {
            let (ph, params) =
                in_list(self.excluded_requesters.iter().copied());
            w.push(
                format!(
                    "NOT EXISTS (SELECT 1 FROM glpi_tickets_users tu_ex \
                     WHERE tu_ex.tickets_id = t.id \
                     AND tu_ex.users_id IN ({ph}))"
                ),
                params,
            );
        }

        if !self.technicians.is_empty() {
            let (ph, params) = in_list(self.technicians.iter().copied());
            w.push(
                format!(
                    "EXISTS (SELECT 1 FROM glpi_tickets_users tu_tech \
                     WHERE tu_tech.tickets_id = t.id \
                     AND tu_tech.users_id IN ({ph}) \
                     AND tu_tech.type = {})",
                    Actor::Assigned as u8,
                ),
                params,
            );
        }

        let statuses = if self.statuses.is_empty() {
            &REPORTED_STATUSES[..]
        } else {
            &self.statuses[..]
        };
        let (ph, params) =
            in_list(statuses.iter().map(|s| i64::from(*s as u8)));
        w.push(format!("t.status IN ({ph})"), params);

        w
    }
}

#[derive(Clone, Copy)]
enum Bound {
    Start,
    End,
}

const DATE: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]");

const DATE_TIMES: [&[BorrowedFormatItem<'static>]; 4] = [
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    format_description!("[year]-[month]-[day]T[hour]:[minute]"),
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    format_description!("[year]-[month]-[day] [hour]:[minute]"),
];

/// A bare date covers the whole day.
fn parse_bound(raw: &str, bound: Bound) -> Option<PrimitiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(date) = Date::parse(raw, DATE) {
        let time = match bound {
            Bound::Start => Time::MIDNIGHT,
            Bound::End => time!(23:59:59),
        };
        return Some(PrimitiveDateTime::new(date, time));
    }

    if let Ok(at) = OffsetDateTime::parse(raw, &Rfc3339) {
        let at = at.to_offset(UtcOffset::UTC);
        return Some(PrimitiveDateTime::new(at.date(), at.time()));
    }

    let parsed = DATE_TIMES
        .iter()
        .find_map(|format| PrimitiveDateTime::parse(raw, *format).ok());
    if parsed.is_none() {
        tracing::debug!(value = raw, "ignoring unparseable date bound");
    }
    parsed
}

fn is_truthy(raw: Option<&str>) -> bool {
    matches!(raw.map(str::trim), Some("1" | "true" | "yes"))
}

/// `None` for a missing, blank or `all` value.
pub(crate) fn parse_id(
    name: &'static str,
    raw: Option<&str>,
) -> Result<Option<i64>, InvalidParam> {
    match raw.map(str::trim) {
        None | Some("" | "all") => Ok(None),
        Some(value) => value.parse().map(Some).map_err(|_| InvalidParam {
            name,
            value: value.to_owned(),
        }),
    }
}

/// Comma separated ids. Blank entries and zero ids are skipped.
fn parse_list(
    name: &'static str,
    raw: Option<&str>,
) -> Result<Vec<i64>, InvalidParam> {
    let Some(raw) = raw.map(str::trim) else {
        return Ok(Vec::new());
    };
    if raw == "all" {
        return Ok(Vec::new());
    }

    let ids = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>().map_err(|_| InvalidParam {
                name,
                value: s.to_owned(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ids.into_iter().filter(|id| *id != 0).unique().collect())
}
