//! Breakdowns the report view charts, computed over an already filtered set
//! of tickets.

use std::collections::{BTreeMap, HashMap};

use itertools::Itertools as _;
use serde::{Deserialize, Serialize};

use crate::db::{
    ticket::{minutes_one_decimal, NpsTally, Status},
    Ticket,
};

/// Label of tickets missing the grouped attribute.
pub const UNKNOWN: &str = "Não informado";

pub const TOP_REQUESTERS: usize = 7;

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Count {
    pub label: String,
    pub count: usize,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct NpsSplit {
    pub promotores: i64,
    pub neutros: i64,
    pub detratores: i64,
    pub nps: i64,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Breakdown {
    pub total: usize,
    /// Ascending by day.
    pub per_day: Vec<Count>,
    pub per_category: Vec<Count>,
    pub per_unit: Vec<Count>,
    pub top_requesters: Vec<Count>,
    /// Satisfaction of closed tickets only.
    pub nps_closed: NpsSplit,
    pub avg_tme_min: f64,
    pub avg_tma_min: f64,
}

impl Breakdown {
    pub fn of(tickets: &[Ticket]) -> Self {
        let per_day = tickets
            .iter()
            .filter_map(|t| t.date.as_deref())
            .filter_map(|date| date.get(..10))
            .fold(BTreeMap::<&str, usize>::new(), |mut days, day| {
                *days.entry(day).or_default() += 1;
                days
            })
            .into_iter()
            .map(|(day, count)| Count {
                label: day.to_owned(),
                count,
            })
            .collect();

        let mut top_requesters =
            group_count(tickets.iter().map(|t| t.requester_name.as_deref()));
        top_requesters.truncate(TOP_REQUESTERS);

        let nps = NpsTally::from_scores(
            tickets
                .iter()
                .filter(|t| t.status() == Some(Status::Closed))
                .filter_map(|t| t.satisfaction),
        );

        Self {
            total: tickets.len(),
            per_day,
            per_category: group_count(
                tickets.iter().map(|t| Some(t.category_name.as_str())),
            ),
            per_unit: group_count(tickets.iter().map(|t| {
                t.unit_name.as_deref().or(t.parent_name.as_deref())
            })),
            top_requesters,
            nps_closed: NpsSplit {
                promotores: nps.promoters,
                neutros: nps.neutrals,
                detratores: nps.detractors,
                nps: nps.score(),
            },
            avg_tme_min: average_minutes(
                tickets.iter().filter_map(Ticket::take_into_account_minutes),
            ),
            avg_tma_min: average_minutes(
                tickets.iter().filter_map(Ticket::solve_minutes),
            ),
        }
    }
}

/// Counts per label, largest first. Ties are ordered by label.
fn group_count<'a>(labels: impl Iterator<Item = Option<&'a str>>) -> Vec<Count> {
    labels
        .map(|label| label.map(str::trim).filter(|l| !l.is_empty()))
        .map(|label| label.unwrap_or(UNKNOWN))
        .fold(HashMap::<&str, usize>::new(), |mut counts, label| {
            *counts.entry(label).or_default() += 1;
            counts
        })
        .into_iter()
        .sorted_by(|(a, ac), (b, bc)| bc.cmp(ac).then_with(|| a.cmp(b)))
        .map(|(label, count)| Count {
            label: label.to_owned(),
            count,
        })
        .collect()
}

/// `0` without samples.
fn average_minutes(minutes: impl Iterator<Item = i64>) -> f64 {
    let (sum, n) = minutes.fold((0_i64, 0_i64), |(sum, n), m| (sum + m, n + 1));
    if n == 0 {
        return 0.0;
    }
    minutes_one_decimal(sum as f64 * 60.0 / n as f64)
}
