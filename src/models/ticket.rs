use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumIter, EnumString};
use utoipa::ToSchema;

use crate::errors::ServiceError;
use crate::models::procedure::{KpiSchema, KpiSummary};

/// Lifecycle state of a ticket.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketEstado {
    Creado,
    Activo,
    EnPausa,
    EnRevision,
    Completado,
    Cancelado,
}

/// A percentage checkpoint inside a ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hito {
    pub porcentaje: i32,
    #[serde(default)]
    pub completado: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fecha_completado: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aprobado: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Hito {
    pub fn new(porcentaje: i32) -> Self {
        Self {
            porcentaje,
            completado: false,
            fecha_completado: None,
            aprobado: None,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rendimiento {
    pub eficiencia_temporal: Option<f64>,
    pub cumplimiento_kpis: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Kpis {
    #[serde(default)]
    pub especificos: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rendimiento: Option<Rendimiento>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The open pause of a ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PauseRecord {
    pub razon: String,
    pub solicitante: String,
    pub aprobador: Option<String>,
    pub fecha_pausa: DateTime<Utc>,
    pub requirio_aprobacion: bool,
}

/// A closed pause, kept in `pausas_historicas`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumedPause {
    #[serde(flatten)]
    pub pausa: PauseRecord,
    pub fecha_reanudacion: DateTime<Utc>,
    pub duracion_horas: i64,
    pub reanudado_por: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReassignmentRecord {
    pub reason: Option<String>,
    pub requested_by: Option<String>,
    pub requested_at: Option<DateTime<Utc>>,
    pub resolved_by: String,
    pub resolved_at: DateTime<Utc>,
    pub previous_assignee: Option<String>,
    pub new_assignee: String,
}

/// Free-form ticket metadata. The workflow owns the pause and reassignment
/// keys; everything else round-trips untouched through `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadatos {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pausa_actual: Option<PauseRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pausas_historicas: Vec<ResumedPause>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub reassignment_requested: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reassignment_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reassignment_requested_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reassignment_requested_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reassignment_history: Vec<ReassignmentRecord>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Metadatos {
    fn clear_reassignment_request(&mut self) {
        self.reassignment_requested = false;
        self.reassignment_reason = None;
        self.reassignment_requested_by = None;
        self.reassignment_requested_at = None;
    }
}

/// Last review recorded on a ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Revision {
    pub feedback: String,
    pub aprobado: bool,
    pub fecha: DateTime<Utc>,
    pub revisor: String,
    pub accion: String,
}

/// What a reviewer decided about a ticket in EN_REVISION.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewDecision {
    Approve,
    Reject,
    Reassign { new_assignee: String },
}

impl ReviewDecision {
    /// Decodes the wire `accion` (`aprobar`, `rechazar`, `reasignar`).
    pub fn parse(accion: &str, nuevo_asignado: Option<String>) -> Result<Self, ServiceError> {
        match accion {
            "aprobar" => Ok(Self::Approve),
            "rechazar" => Ok(Self::Reject),
            "reasignar" => match nuevo_asignado.filter(|v| !v.trim().is_empty()) {
                Some(new_assignee) => Ok(Self::Reassign { new_assignee }),
                None => Err(ServiceError::InvalidArgument(
                    "nuevo_asignado is required for reasignar action".to_string(),
                )),
            },
            _ => Err(ServiceError::InvalidArgument(
                "accion must be: aprobar, rechazar, or reasignar".to_string(),
            )),
        }
    }

    pub fn accion(&self) -> &'static str {
        match self {
            Self::Approve => "aprobar",
            Self::Reject => "rechazar",
            Self::Reassign { .. } => "reasignar",
        }
    }

    pub fn target_estado(&self) -> TicketEstado {
        match self {
            Self::Approve => TicketEstado::Completado,
            Self::Reject => TicketEstado::Activo,
            Self::Reassign { .. } => TicketEstado::Creado,
        }
    }

    pub fn success_message(&self) -> &'static str {
        match self {
            Self::Approve => "Ticket approved successfully",
            Self::Reject => "Ticket rejected successfully",
            Self::Reassign { .. } => "Ticket reassigned successfully",
        }
    }
}

/// Pause figures reported when a ticket resumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct ResumeMetrics {
    pub pause_duration_hours: i64,
    pub total_pause_time_hours: i64,
    pub deadline_extended: bool,
}

/// Input for a brand new ticket.
#[derive(Debug, Clone, Default)]
pub struct NewTicket {
    pub id: String,
    pub codigo_actividad: String,
    pub titulo: String,
    pub tiempo_estimado: f64,
    pub codigo_linea_trabajo: Option<String>,
    pub codigo_procedimiento: Option<String>,
    pub descripcion: Option<String>,
    pub asignado_a: Option<String>,
    pub asignado_por: Option<String>,
    pub flujo: Option<Value>,
    pub hitos: Vec<Hito>,
    pub kpis: Kpis,
    pub recursos: Option<Value>,
    pub metadatos: Metadatos,
    pub triggers: Option<Value>,
}

/// The ticket aggregate. Every transition validates its precondition, mutates
/// the aggregate in place and stamps `fecha_actualizado`; persistence is the
/// caller's job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Ticket {
    pub id: String,
    pub codigo_actividad: String,
    pub codigo_linea_trabajo: Option<String>,
    pub codigo_procedimiento: Option<String>,
    pub titulo: String,
    pub descripcion: Option<String>,
    pub asignado_a: Option<String>,
    pub asignado_por: Option<String>,
    pub estado: TicketEstado,
    #[schema(value_type = Option<Object>)]
    pub flujo: Option<Value>,
    #[schema(value_type = Vec<Object>)]
    pub hitos: Vec<Hito>,
    pub hito_actual: Option<i32>,
    pub hito_aprobado: Option<i32>,
    #[schema(value_type = Object)]
    pub kpis: Kpis,
    #[schema(value_type = Option<Object>)]
    pub recursos: Option<Value>,
    #[schema(value_type = Object)]
    pub metadatos: Metadatos,
    #[schema(value_type = Option<Object>)]
    pub triggers: Option<Value>,
    #[schema(value_type = Option<Object>)]
    pub revision: Option<Revision>,
    pub tiempo_estimado: f64,
    pub tiempo_real: Option<f64>,
    pub tiempo_pausa_total: i64,
    pub eficiencia_temporal: Option<f64>,
    pub fecha_creacion: DateTime<Utc>,
    pub fecha_aceptacion: Option<DateTime<Utc>>,
    pub fecha_actualizado: DateTime<Utc>,
}

impl Ticket {
    pub fn new(draft: NewTicket, now: DateTime<Utc>) -> Self {
        Self {
            id: draft.id,
            codigo_actividad: draft.codigo_actividad,
            codigo_linea_trabajo: draft.codigo_linea_trabajo,
            codigo_procedimiento: draft.codigo_procedimiento,
            titulo: draft.titulo,
            descripcion: draft.descripcion,
            asignado_a: draft.asignado_a,
            asignado_por: draft.asignado_por,
            estado: TicketEstado::Creado,
            flujo: draft.flujo,
            hitos: draft.hitos,
            hito_actual: None,
            hito_aprobado: None,
            kpis: draft.kpis,
            recursos: draft.recursos,
            metadatos: draft.metadatos,
            triggers: draft.triggers,
            revision: None,
            tiempo_estimado: draft.tiempo_estimado,
            tiempo_real: None,
            tiempo_pausa_total: 0,
            eficiencia_temporal: None,
            fecha_creacion: now,
            fecha_aceptacion: None,
            fecha_actualizado: now,
        }
    }

    fn require_estado(&self, expected: TicketEstado, message: &str) -> Result<(), ServiceError> {
        if self.estado == expected {
            Ok(())
        } else {
            Err(ServiceError::InvalidState(message.to_string()))
        }
    }

    pub fn hito(&self, porcentaje: i32) -> Option<&Hito> {
        self.hitos.iter().find(|h| h.porcentaje == porcentaje)
    }

    fn hito_mut(&mut self, porcentaje: i32) -> Option<&mut Hito> {
        self.hitos.iter_mut().find(|h| h.porcentaje == porcentaje)
    }

    /// CREADO -> ACTIVO. The store repeats the CREADO check atomically.
    pub fn accept(&mut self, empleado_id: &str, now: DateTime<Utc>) -> Result<(), ServiceError> {
        if self.estado != TicketEstado::Creado {
            return Err(ServiceError::NotFoundOrAlreadyAccepted(self.id.clone()));
        }
        self.estado = TicketEstado::Activo;
        self.asignado_a = Some(empleado_id.to_string());
        self.fecha_aceptacion = Some(now);
        self.fecha_actualizado = now;
        Ok(())
    }

    pub fn update_milestone(
        &mut self,
        porcentaje: i32,
        completado: bool,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        self.require_estado(
            TicketEstado::Activo,
            "Can only update hitos for ACTIVO tickets",
        )?;

        let ticket_id = self.id.clone();
        let hito = self
            .hito_mut(porcentaje)
            .ok_or(ServiceError::MilestoneNotFound {
                ticket_id,
                porcentaje,
            })?;
        hito.completado = completado;
        if completado {
            hito.fecha_completado = Some(now);
        }

        self.estado = if porcentaje == 100 && completado {
            TicketEstado::EnRevision
        } else {
            TicketEstado::Activo
        };
        self.hito_actual = Some(porcentaje);
        self.fecha_actualizado = now;
        Ok(())
    }

    /// Administrative override; any state may follow any state.
    pub fn set_estado(&mut self, estado: TicketEstado, now: DateTime<Utc>) {
        self.estado = estado;
        self.fecha_actualizado = now;
    }

    pub fn request_reassignment(
        &mut self,
        empleado_id: &str,
        razon: &str,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        self.require_estado(
            TicketEstado::Activo,
            "Can only request reassignment for ACTIVO tickets",
        )?;
        if self.asignado_a.as_deref() != Some(empleado_id) {
            return Err(ServiceError::Forbidden(
                "Only assigned employee can request reassignment".to_string(),
            ));
        }

        self.metadatos.reassignment_requested = true;
        self.metadatos.reassignment_reason = Some(razon.to_string());
        self.metadatos.reassignment_requested_by = Some(empleado_id.to_string());
        self.metadatos.reassignment_requested_at = Some(now);
        self.estado = TicketEstado::EnRevision;
        self.fecha_actualizado = now;
        Ok(())
    }

    pub fn review(
        &mut self,
        revisor_id: &str,
        decision: &ReviewDecision,
        feedback: &str,
        hito_porcentaje: Option<i32>,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        self.require_estado(
            TicketEstado::EnRevision,
            "Can only review tickets in EN_REVISION state",
        )?;

        let target = hito_porcentaje.or(self.hito_actual);
        match decision {
            ReviewDecision::Approve => {
                self.hito_aprobado = target;
            }
            ReviewDecision::Reject => {
                if let Some(hito) = target.and_then(|p| self.hito_mut(p)) {
                    hito.completado = false;
                    hito.aprobado = Some(false);
                    hito.fecha_completado = None;
                }
            }
            ReviewDecision::Reassign { new_assignee } => {
                if self.metadatos.reassignment_requested {
                    let record = ReassignmentRecord {
                        reason: self.metadatos.reassignment_reason.clone(),
                        requested_by: self.metadatos.reassignment_requested_by.clone(),
                        requested_at: self.metadatos.reassignment_requested_at,
                        resolved_by: revisor_id.to_string(),
                        resolved_at: now,
                        previous_assignee: self.asignado_a.clone(),
                        new_assignee: new_assignee.clone(),
                    };
                    self.metadatos.reassignment_history.push(record);
                    self.metadatos.clear_reassignment_request();
                }
                self.asignado_a = Some(new_assignee.clone());
                self.fecha_aceptacion = None;
            }
        }

        self.revision = Some(Revision {
            feedback: feedback.to_string(),
            aprobado: *decision == ReviewDecision::Approve,
            fecha: now,
            revisor: revisor_id.to_string(),
            accion: decision.accion().to_string(),
        });
        self.estado = decision.target_estado();
        self.fecha_actualizado = now;
        Ok(())
    }

    /// Replaces the KPI sub-document with the submission and its compliance.
    pub fn apply_kpis(
        &mut self,
        especificos: Map<String, Value>,
        schema: &KpiSchema,
        now: DateTime<Utc>,
    ) -> Result<KpiSummary, ServiceError> {
        let missing = schema.missing_from(&especificos);
        if !missing.is_empty() {
            return Err(ServiceError::MissingKpis {
                missing,
                required: schema.names(),
            });
        }

        let evaluation = schema.evaluate(&especificos);
        self.kpis = Kpis {
            especificos,
            rendimiento: Some(Rendimiento {
                eficiencia_temporal: self.eficiencia_temporal,
                cumplimiento_kpis: evaluation.ratio(),
            }),
            extra: Map::new(),
        };
        self.fecha_actualizado = now;
        Ok(evaluation.summary())
    }

    /// ACTIVO -> EN_PAUSA. Anyone other than the owning director needs an
    /// approver.
    pub fn pause(
        &mut self,
        solicitante_id: &str,
        razon: &str,
        aprobador_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<PauseRecord, ServiceError> {
        self.require_estado(TicketEstado::Activo, "Can only pause ACTIVO tickets")?;

        let needs_approval = self.asignado_por.as_deref() != Some(solicitante_id);
        let aprobador = aprobador_id.filter(|a| !a.trim().is_empty());
        if needs_approval && aprobador.is_none() {
            return Err(ServiceError::ApprovalRequired {
                original_director: self.asignado_por.clone(),
            });
        }

        let record = PauseRecord {
            razon: razon.to_string(),
            solicitante: solicitante_id.to_string(),
            aprobador: aprobador.map(str::to_string),
            fecha_pausa: now,
            requirio_aprobacion: needs_approval,
        };
        self.metadatos.pausa_actual = Some(record.clone());
        self.estado = TicketEstado::EnPausa;
        self.fecha_actualizado = now;
        Ok(record)
    }

    /// EN_PAUSA -> ACTIVO, closing the open pause into the history.
    pub fn resume(
        &mut self,
        reanudado_por: &str,
        now: DateTime<Utc>,
    ) -> Result<ResumeMetrics, ServiceError> {
        self.require_estado(TicketEstado::EnPausa, "Can only resume EN_PAUSA tickets")?;
        let pausa = self
            .metadatos
            .pausa_actual
            .take()
            .ok_or(ServiceError::NoPauseRecord)?;

        let duracion_horas = whole_hours_between(pausa.fecha_pausa, now);
        self.tiempo_pausa_total += duracion_horas;
        self.metadatos.pausas_historicas.push(ResumedPause {
            pausa,
            fecha_reanudacion: now,
            duracion_horas,
            reanudado_por: reanudado_por.to_string(),
        });
        self.estado = TicketEstado::Activo;
        self.fecha_actualizado = now;

        Ok(ResumeMetrics {
            pause_duration_hours: duracion_horas,
            total_pause_time_hours: self.tiempo_pausa_total,
            deadline_extended: true,
        })
    }
}

/// Whole elapsed hours. A start later than `end` (clock skew) counts as zero.
fn whole_hours_between(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    (end - start).num_hours().max(0)
}
