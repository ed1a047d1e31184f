use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

use super::ticket::{Ticket, TicketEstado};

const TOP_PERFORMERS: usize = 5;

/// Inclusive `fecha_creacion` bounds; an open side is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalyticsWindow {
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
}

impl AnalyticsWindow {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.date_from.map_or(true, |from| at >= from) && self.date_to.map_or(true, |to| at <= to)
    }
}

/// Catalog identity of a procedure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProcedureInfo {
    pub codigo: String,
    pub nombre: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProcedurePerformance {
    pub total_tickets: u64,
    pub completados: u64,
    /// `"66.67%"`, or `"0%"` when the window holds no tickets.
    pub completion_rate: String,
    pub eficiencia_promedio: Option<f64>,
    pub tiempo_real_promedio_horas: Option<f64>,
    pub tiempo_pausa_promedio_horas: Option<f64>,
    pub tickets_con_kpis: u64,
    pub kpi_compliance_avg: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TopPerformer {
    pub empleado_id: String,
    pub tickets_completados: u64,
    pub eficiencia_promedio: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TimeBucket {
    pub categoria: String,
    pub count: u64,
}

/// Aggregates over the tickets of one procedure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProcedureStats {
    pub performance: ProcedurePerformance,
    pub top_performers: Vec<TopPerformer>,
    pub time_distribution: Vec<TimeBucket>,
}

#[derive(Default)]
struct Mean {
    sum: f64,
    count: u64,
}

impl Mean {
    fn push(&mut self, value: Option<f64>) {
        if let Some(value) = value {
            self.sum += value;
            self.count += 1;
        }
    }

    fn value(&self) -> Option<f64> {
        (self.count > 0).then(|| round2(self.sum / self.count as f64))
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Bucket of a completed ticket by real versus estimated hours.
fn time_category(tiempo_real: f64, tiempo_estimado: f64) -> &'static str {
    if tiempo_real <= tiempo_estimado * 0.8 {
        "Muy eficiente"
    } else if tiempo_real <= tiempo_estimado {
        "Eficiente"
    } else if tiempo_real <= tiempo_estimado * 1.2 {
        "En tiempo"
    } else {
        "Retrasado"
    }
}

const CATEGORY_ORDER: [&str; 4] = ["Muy eficiente", "Eficiente", "En tiempo", "Retrasado"];

impl ProcedureStats {
    /// Folds already-filtered tickets. Averages over time and efficiency
    /// only look at COMPLETADO tickets; KPI figures look at all of them.
    pub fn from_tickets<'a>(tickets: impl IntoIterator<Item = &'a Ticket>) -> Self {
        let mut total = 0u64;
        let mut completados = 0u64;
        let mut eficiencia = Mean::default();
        let mut tiempo_real = Mean::default();
        let mut tiempo_pausa = Mean::default();
        let mut con_kpis = 0u64;
        let mut compliance = Mean::default();
        let mut performers: BTreeMap<&str, (u64, Mean)> = BTreeMap::new();
        let mut buckets: BTreeMap<&'static str, u64> = BTreeMap::new();

        for ticket in tickets {
            total += 1;
            if !ticket.kpis.especificos.is_empty() {
                con_kpis += 1;
            }
            compliance.push(ticket.kpis.rendimiento.as_ref().map(|r| r.cumplimiento_kpis));

            if ticket.estado != TicketEstado::Completado {
                continue;
            }
            completados += 1;
            eficiencia.push(ticket.eficiencia_temporal);
            tiempo_real.push(ticket.tiempo_real);
            tiempo_pausa.push(Some(ticket.tiempo_pausa_total as f64));

            if let Some(empleado) = ticket.asignado_a.as_deref() {
                let entry = performers.entry(empleado).or_default();
                entry.0 += 1;
                entry.1.push(ticket.eficiencia_temporal);
            }
            if let Some(real) = ticket.tiempo_real {
                *buckets
                    .entry(time_category(real, ticket.tiempo_estimado))
                    .or_default() += 1;
            }
        }

        let completion_rate = if total > 0 {
            format!("{:.2}%", completados as f64 / total as f64 * 100.0)
        } else {
            "0%".to_string()
        };

        let mut top_performers: Vec<TopPerformer> = performers
            .into_iter()
            .map(|(empleado, (count, mean))| TopPerformer {
                empleado_id: empleado.to_string(),
                tickets_completados: count,
                eficiencia_promedio: mean.value(),
            })
            .collect();
        // Unknown efficiency sorts last; BTreeMap order breaks ties by id.
        top_performers.sort_by(|a, b| {
            let a_key = a.eficiencia_promedio.unwrap_or(f64::NEG_INFINITY);
            let b_key = b.eficiencia_promedio.unwrap_or(f64::NEG_INFINITY);
            b_key.total_cmp(&a_key)
        });
        top_performers.truncate(TOP_PERFORMERS);

        let mut time_distribution: Vec<TimeBucket> = CATEGORY_ORDER
            .iter()
            .filter_map(|categoria| {
                buckets.get(categoria).map(|count| TimeBucket {
                    categoria: (*categoria).to_string(),
                    count: *count,
                })
            })
            .collect();
        time_distribution.sort_by(|a, b| b.count.cmp(&a.count));

        Self {
            performance: ProcedurePerformance {
                total_tickets: total,
                completados,
                completion_rate,
                eficiencia_promedio: eficiencia.value(),
                tiempo_real_promedio_horas: tiempo_real.value(),
                tiempo_pausa_promedio_horas: tiempo_pausa.value(),
                tickets_con_kpis: con_kpis,
                kpi_compliance_avg: compliance.value(),
            },
            top_performers,
            time_distribution,
        }
    }
}
