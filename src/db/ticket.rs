use constcat::concat;
use enum_utils::TryFromRepr;
use serde::{Deserialize, Serialize};
use sqlx::{mysql::MySqlRow, Row as _};

use super::{sql::Where, Client, Error, USER_DISPLAY_NAME};

/// Joins every filtered statement needs: the ticket's entity as `e` and that
/// entity's parent as `parent`.
pub const FILTER_JOINS: &str = "\
    LEFT JOIN glpi_entities e ON e.id = t.entities_id \
    LEFT JOIN glpi_entities parent ON parent.id = e.entities_id";

const TICKET_JOINS: &str = concat!(
    FILTER_JOINS,
    " LEFT JOIN glpi_itilcategories cat ON cat.id = t.itilcategories_id",
    " LEFT JOIN glpi_ticketsatisfactions ts ON ts.tickets_id = t.id",
);

const DATETIME: &str = "'%Y-%m-%d %H:%i:%s'";

/// Requester actors first, then assigned technicians.
const REQUESTER_ORDER: &str =
    "ORDER BY (tu.type = 1) DESC, (tu.type = 2) DESC, tu.id";

const TICKET_COLUMNS: &str = concat!(
    "CAST(t.id AS SIGNED) AS id, t.name AS title, ",
    "DATE_FORMAT(t.date, ", DATETIME, ") AS date, ",
    "CAST(t.status AS SIGNED) AS status, ",
    "CAST(t.entities_id AS SIGNED) AS entities_id, ",
    "CAST(t.itilcategories_id AS SIGNED) AS itilcategories_id, ",
    "e.name AS unit_name, parent.name AS parent_name, ",
    "COALESCE(NULLIF(cat.name, ''), '(sem categoria)') AS category_name, ",
    "CAST(ts.satisfaction AS SIGNED) AS satisfaction, ",
    "DATE_FORMAT(t.takeintoaccountdate, ", DATETIME, ") AS takeintoaccountdate, ",
    "DATE_FORMAT(t.solvedate, ", DATETIME, ") AS solvedate, ",
    "DATE_FORMAT(t.closedate, ", DATETIME, ") AS closedate, ",
    "CAST(t.takeintoaccount_delay_stat AS SIGNED) AS takeintoaccount_delay_stat, ",
    "CAST(t.solve_delay_stat AS SIGNED) AS solve_delay_stat, ",
    "(SELECT ", USER_DISPLAY_NAME, " FROM glpi_tickets_users tu ",
    "JOIN glpi_users u ON u.id = tu.users_id ",
    "WHERE tu.tickets_id = t.id ", REQUESTER_ORDER, " LIMIT 1) AS requester_name, ",
    "(SELECT CAST(tu.users_id AS SIGNED) FROM glpi_tickets_users tu ",
    "WHERE tu.tickets_id = t.id ", REQUESTER_ORDER, " LIMIT 1) AS requester_id, ",
    "(SELECT ", USER_DISPLAY_NAME, " FROM glpi_tickets_users tu ",
    "JOIN glpi_users u ON u.id = tu.users_id ",
    "WHERE tu.tickets_id = t.id AND tu.type = 2 ",
    "ORDER BY tu.users_id LIMIT 1) AS technician_name, ",
    "(SELECT CAST(tu.users_id AS SIGNED) FROM glpi_tickets_users tu ",
    "WHERE tu.tickets_id = t.id AND tu.type = 2 ",
    "ORDER BY tu.users_id LIMIT 1) AS technician_id",
);

#[derive(Clone, Debug, PartialEq)]
pub struct Ticket {
    pub id: i64,
    pub title: Option<String>,
    pub date: Option<String>,
    pub status: i64,
    pub entity_id: Option<i64>,
    pub category_id: Option<i64>,
    pub unit_name: Option<String>,
    pub parent_name: Option<String>,
    pub category_name: String,
    pub satisfaction: Option<i64>,
    pub takeintoaccountdate: Option<String>,
    pub solvedate: Option<String>,
    pub closedate: Option<String>,
    /// Seconds, precomputed by GLPI.
    pub takeintoaccount_delay_stat: Option<i64>,
    /// Seconds, precomputed by GLPI.
    pub solve_delay_stat: Option<i64>,
    pub requester_id: Option<i64>,
    pub requester_name: Option<String>,
    pub technician_id: Option<i64>,
    pub technician_name: Option<String>,
}

impl Ticket {
    /// Time to resolution, once the ticket is solved or closed.
    pub fn solve_minutes(&self) -> Option<i64> {
        self.solvedate
            .as_ref()
            .or(self.closedate.as_ref())
            .and(self.solve_delay_stat)
            .map(|secs| secs / 60)
    }

    /// Waiting time until a technician took the ticket into account.
    pub fn take_into_account_minutes(&self) -> Option<i64> {
        self.takeintoaccountdate
            .as_ref()
            .and(self.takeintoaccount_delay_stat)
            .map(|secs| secs / 60)
    }

    pub fn status(&self) -> Option<Status> {
        u8::try_from(self.status)
            .ok()
            .and_then(|code| Status::try_from(code).ok())
    }

    fn from_row(row: &MySqlRow) -> Result<Self, Error> {
        Ok(Self {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            date: row.try_get("date")?,
            status: row.try_get("status")?,
            entity_id: row.try_get("entities_id")?,
            category_id: row.try_get("itilcategories_id")?,
            unit_name: row.try_get("unit_name")?,
            parent_name: row.try_get("parent_name")?,
            category_name: row.try_get("category_name")?,
            satisfaction: row.try_get("satisfaction")?,
            takeintoaccountdate: row.try_get("takeintoaccountdate")?,
            solvedate: row.try_get("solvedate")?,
            closedate: row.try_get("closedate")?,
            takeintoaccount_delay_stat: row
                .try_get("takeintoaccount_delay_stat")?,
            solve_delay_stat: row.try_get("solve_delay_stat")?,
            requester_id: row.try_get("requester_id")?,
            requester_name: row.try_get("requester_name")?,
            technician_id: row.try_get("technician_id")?,
            technician_name: row.try_get("technician_name")?,
        })
    }
}

#[derive(
    Clone, Copy, Debug, Deserialize, Eq, TryFromRepr, PartialEq, Serialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum Status {
    /// Opened, nobody assigned yet.
    New = 1,

    /// Being processed by an assigned technician.
    Assigned = 2,

    /// Being processed, with a planned task.
    Planned = 3,

    /// Pending on the requester or a third party.
    Waiting = 4,

    Solved = 5,

    Closed = 6,
}

/// Role of a user on a ticket (`glpi_tickets_users.type`).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum Actor {
    Requester = 1,
    Assigned = 2,
    Observer = 3,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Page {
    /// Every matching row, no `LIMIT`/`OFFSET`.
    All,
    Rows { limit: i64, offset: i64 },
}

#[derive(Clone, Debug)]
pub struct TicketDetails {
    pub ticket: Ticket,
    pub content: Option<String>,
}

#[derive(Clone, Debug)]
pub struct Followup {
    pub id: i64,
    pub date: Option<String>,
    pub content: Option<String>,
    pub is_private: bool,
    pub author_id: Option<i64>,
    pub author_name: Option<String>,
}

/// Satisfaction answers bucketed on the 1–5 scale.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct NpsTally {
    pub total: i64,
    pub promoters: i64,
    pub neutrals: i64,
    pub detractors: i64,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NpsBucket {
    Promoter,
    Neutral,
    Detractor,
}

impl NpsBucket {
    pub fn of(satisfaction: i64) -> Option<Self> {
        match satisfaction {
            5.. => Some(Self::Promoter),
            4 => Some(Self::Neutral),
            1..=3 => Some(Self::Detractor),
            _ => None,
        }
    }
}

impl NpsTally {
    pub fn from_scores(scores: impl IntoIterator<Item = i64>) -> Self {
        scores.into_iter().fold(Self::default(), |mut tally, score| {
            tally.total += 1;
            match NpsBucket::of(score) {
                Some(NpsBucket::Promoter) => tally.promoters += 1,
                Some(NpsBucket::Neutral) => tally.neutrals += 1,
                Some(NpsBucket::Detractor) => tally.detractors += 1,
                None => {}
            }
            tally
        })
    }

    /// Net promoter score in `[-100, 100]`, rounded half up; `0` without
    /// answers.
    pub fn score(&self) -> i64 {
        if self.total <= 0 {
            return 0;
        }
        let raw = (self.promoters - self.detractors) as f64
            / self.total as f64
            * 100.0;
        ((raw + 0.5).floor() as i64).clamp(-100, 100)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TmaSummary {
    pub solved_count: i64,
    pub avg_solve_seconds: Option<f64>,
    pub avg_take_into_account_seconds: Option<f64>,
}

impl TmaSummary {
    pub fn avg_tma_minutes(&self) -> Option<f64> {
        self.avg_solve_seconds.map(minutes_one_decimal)
    }

    pub fn avg_tme_minutes(&self) -> Option<f64> {
        self.avg_take_into_account_seconds.map(minutes_one_decimal)
    }
}

pub fn minutes_one_decimal(seconds: f64) -> f64 {
    (seconds / 60.0 * 10.0).round() / 10.0
}

#[derive(Clone, Debug)]
pub struct Technician {
    pub id: i64,
    pub display_name: Option<String>,
    pub login: Option<String>,
}

impl Client {
    pub async fn get_tickets_page(
        &self,
        filter: &Where,
        page: Page,
    ) -> Result<Vec<Ticket>, Error> {
        let sql = format!(
            "SELECT {TICKET_COLUMNS} \
             FROM glpi_tickets t {TICKET_JOINS} \
             {} \
             ORDER BY t.date DESC, t.id DESC{}",
            filter.sql(),
            match page {
                Page::All => "",
                Page::Rows { .. } => " LIMIT ? OFFSET ?",
            },
        );

        let mut query = filter.bind(sqlx::query(&sql));
        if let Page::Rows { limit, offset } = page {
            query = query.bind(limit).bind(offset);
        }
        query
            .fetch_all(&self.0)
            .await?
            .iter()
            .map(Ticket::from_row)
            .collect()
    }

    pub async fn get_tickets_count(&self, filter: &Where) -> Result<u64, Error> {
        let sql = format!(
            "SELECT COUNT(*) AS cnt FROM glpi_tickets t {FILTER_JOINS} {}",
            filter.sql(),
        );
        let count: i64 = filter
            .bind(sqlx::query(&sql))
            .fetch_one(&self.0)
            .await?
            .try_get("cnt")?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    pub async fn get_nps_tally(&self, filter: Where) -> Result<NpsTally, Error> {
        let filter = filter.and("ts.satisfaction IS NOT NULL");
        let sql = format!(
            "SELECT COUNT(DISTINCT ts.tickets_id) AS total_responses, \
                    CAST(COALESCE(SUM(CASE WHEN ts.satisfaction >= 5 \
                         THEN 1 ELSE 0 END), 0) AS SIGNED) AS promoters, \
                    CAST(COALESCE(SUM(CASE WHEN ts.satisfaction = 4 \
                         THEN 1 ELSE 0 END), 0) AS SIGNED) AS neutrals, \
                    CAST(COALESCE(SUM(CASE WHEN ts.satisfaction BETWEEN 1 AND 3 \
                         THEN 1 ELSE 0 END), 0) AS SIGNED) AS detractors \
             FROM glpi_tickets t {FILTER_JOINS} \
             LEFT JOIN glpi_ticketsatisfactions ts ON ts.tickets_id = t.id \
             {}",
            filter.sql(),
        );
        let row = filter.bind(sqlx::query(&sql)).fetch_one(&self.0).await?;
        Ok(NpsTally {
            total: row.try_get("total_responses")?,
            promoters: row.try_get("promoters")?,
            neutrals: row.try_get("neutrals")?,
            detractors: row.try_get("detractors")?,
        })
    }

    pub async fn get_tma_summary(
        &self,
        filter: Where,
    ) -> Result<TmaSummary, Error> {
        let filter = filter.and("t.solve_delay_stat > 0");
        let sql = format!(
            "SELECT COUNT(*) AS solved_count, \
                    CAST(AVG(t.solve_delay_stat) AS DOUBLE) \
                        AS avg_solve_seconds, \
                    CAST(AVG(NULLIF(t.takeintoaccount_delay_stat, 0)) AS DOUBLE) \
                        AS avg_take_into_account_seconds \
             FROM glpi_tickets t {FILTER_JOINS} \
             {}",
            filter.sql(),
        );
        let row = filter.bind(sqlx::query(&sql)).fetch_one(&self.0).await?;
        Ok(TmaSummary {
            solved_count: row.try_get("solved_count")?,
            avg_solve_seconds: row.try_get("avg_solve_seconds")?,
            avg_take_into_account_seconds: row
                .try_get("avg_take_into_account_seconds")?,
        })
    }

    pub async fn get_ticket_by_id(
        &self,
        id: i64,
    ) -> Result<Option<TicketDetails>, Error> {
        const SQL: &str = concat!(
            "SELECT ",
            TICKET_COLUMNS,
            ", t.content AS content FROM glpi_tickets t ",
            TICKET_JOINS,
            " WHERE t.id = ? LIMIT 1",
        );
        sqlx::query(SQL)
            .bind(id)
            .fetch_optional(&self.0)
            .await?
            .map(|row| {
                Ok(TicketDetails {
                    ticket: Ticket::from_row(&row)?,
                    content: row.try_get("content")?,
                })
            })
            .transpose()
    }

    pub async fn get_followups(
        &self,
        ticket_id: i64,
    ) -> Result<Vec<Followup>, Error> {
        const SQL: &str = concat!(
            "SELECT CAST(f.id AS SIGNED) AS id, ",
            "DATE_FORMAT(f.date, ", DATETIME, ") AS date, ",
            "f.content AS content, ",
            "CAST(f.is_private AS SIGNED) AS is_private, ",
            "CAST(f.users_id AS SIGNED) AS users_id, ",
            USER_DISPLAY_NAME, " AS author_name ",
            "FROM glpi_itilfollowups f ",
            "LEFT JOIN glpi_users u ON u.id = f.users_id ",
            "WHERE f.itemtype = 'Ticket' AND f.items_id = ? ",
            "ORDER BY f.date ASC, f.id ASC",
        );
        sqlx::query(SQL)
            .bind(ticket_id)
            .fetch_all(&self.0)
            .await?
            .iter()
            .map(|row| {
                Ok(Followup {
                    id: row.try_get("id")?,
                    date: row.try_get("date")?,
                    content: row.try_get("content")?,
                    is_private: row
                        .try_get::<Option<i64>, _>("is_private")?
                        .is_some_and(|v| v != 0),
                    author_id: row.try_get("users_id")?,
                    author_name: row.try_get("author_name")?,
                })
            })
            .collect()
    }

    pub async fn get_technicians(&self) -> Result<Vec<Technician>, Error> {
        const SQL: &str = "\
            SELECT DISTINCT CAST(u.id AS SIGNED) AS id, \
                   TRIM(CONCAT_WS(' ', NULLIF(u.firstname, ''), \
                                       NULLIF(u.realname, ''))) AS display_name, \
                   TRIM(u.name) AS login \
            FROM glpi_tickets_users tu \
            JOIN glpi_users u ON u.id = tu.users_id \
            WHERE tu.type = 2 \
            ORDER BY display_name";
        sqlx::query(SQL)
            .fetch_all(&self.0)
            .await?
            .iter()
            .map(|row| {
                Ok(Technician {
                    id: row.try_get("id")?,
                    display_name: row.try_get("display_name")?,
                    login: row.try_get("login")?,
                })
            })
            .collect()
    }
}
