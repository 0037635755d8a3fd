use serde::{Deserialize, Serialize};

use crate::db;

pub use crate::db::ticket::Status;

/// A ticket as the report table shows it.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: i64,
    pub titulo: Option<String>,
    pub date: Option<String>,
    pub data_registro: Option<String>,
    /// GLPI status code.
    pub status: i64,
    pub status_label: Option<String>,
    pub unidade_id: Option<i64>,
    #[serde(rename = "unidade_name")]
    pub unidade_name: Option<String>,
    /// Unit name, or its parent's when the unit has none.
    pub cliente: Option<String>,
    pub requerente: Option<String>,
    #[serde(rename = "requerente_id")]
    pub requerente_id: Option<i64>,
    pub tecnico: Option<String>,
    #[serde(rename = "tecnico_id")]
    pub tecnico_id: Option<i64>,
    pub nota_nps: Option<i64>,
    pub categoria: String,
    #[serde(rename = "categoria_id")]
    pub categoria_id: Option<i64>,
    pub tempo_solucao_min: Option<i64>,
    pub tme_min: Option<i64>,
    #[serde(rename = "takeintoaccountdate")]
    pub take_into_account_date: Option<String>,
    #[serde(rename = "solvedate")]
    pub solve_date: Option<String>,
    #[serde(rename = "closedate")]
    pub close_date: Option<String>,
}

impl From<db::Ticket> for Ticket {
    fn from(t: db::Ticket) -> Self {
        let tempo_solucao_min = t.solve_minutes();
        let tme_min = t.take_into_account_minutes();
        let status_label = t.status().map(|s| status_label(s).to_owned());
        let cliente = t
            .unit_name
            .clone()
            .filter(|n| !n.is_empty())
            .or_else(|| t.parent_name.clone());
        Self {
            id: t.id,
            titulo: t.title,
            data_registro: t.date.clone(),
            date: t.date,
            status: t.status,
            status_label,
            unidade_id: t.entity_id,
            unidade_name: t.unit_name.filter(|n| !n.is_empty()),
            cliente,
            requerente: t.requester_name.filter(|n| !n.is_empty()),
            requerente_id: t.requester_id,
            tecnico: t.technician_name.filter(|n| !n.is_empty()),
            tecnico_id: t.technician_id,
            nota_nps: t.satisfaction,
            categoria: t.category_name,
            categoria_id: t.category_id,
            tempo_solucao_min,
            tme_min,
            take_into_account_date: t.takeintoaccountdate,
            solve_date: t.solvedate,
            close_date: t.closedate,
        }
    }
}

/// Label GLPI's Brazilian Portuguese interface uses for the status.
pub fn status_label(status: Status) -> &'static str {
    match status {
        Status::New => "Novo",
        Status::Assigned => "Em atendimento (atribuído)",
        Status::Planned => "Em atendimento (planejado)",
        Status::Waiting => "Pendente",
        Status::Solved => "Solucionado",
        Status::Closed => "Fechado",
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Page {
    pub success: bool,
    pub total: u64,
    pub data: Vec<Ticket>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Details {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub content: Option<String>,
    pub followups: Vec<Followup>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Followup {
    pub id: i64,
    pub date: Option<String>,
    pub content: Option<String>,
    pub is_private: bool,
    pub author_id: Option<i64>,
    pub author_name: Option<String>,
}

impl From<db::ticket::Followup> for Followup {
    fn from(f: db::ticket::Followup) -> Self {
        Self {
            id: f.id,
            date: f.date,
            content: f.content,
            is_private: f.is_private,
            author_id: f.author_id,
            author_name: f.author_name,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Nps {
    pub total_responses: i64,
    pub promotores: i64,
    pub neutros: i64,
    pub detratores: i64,
    pub nps: i64,
}

impl From<db::ticket::NpsTally> for Nps {
    fn from(tally: db::ticket::NpsTally) -> Self {
        Self {
            total_responses: tally.total,
            promotores: tally.promoters,
            neutros: tally.neutrals,
            detratores: tally.detractors,
            nps: tally.score(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Tma {
    pub solved_count: i64,
    pub avg_tma_minutes: Option<f64>,
    pub avg_tme_minutes: Option<f64>,
}

impl From<db::ticket::TmaSummary> for Tma {
    fn from(summary: db::ticket::TmaSummary) -> Self {
        Self {
            solved_count: summary.solved_count,
            avg_tma_minutes: summary.avg_tma_minutes(),
            avg_tme_minutes: summary.avg_tme_minutes(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Technician {
    pub id: i64,
    pub display_name: String,
    pub login: Option<String>,
}

impl From<db::ticket::Technician> for Technician {
    fn from(t: db::ticket::Technician) -> Self {
        let non_empty = |n: &Option<String>| n.clone().filter(|n| !n.is_empty());
        let display_name = non_empty(&t.display_name)
            .or_else(|| non_empty(&t.login))
            .unwrap_or_else(|| t.id.to_string());
        Self {
            id: t.id,
            display_name,
            login: t.login,
        }
    }
}
