use async_trait::async_trait;
use metrics::counter;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, SqlErr,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, error};

use crate::entities::ticket::{
    ActiveModel as TicketActiveModel, Column, Entity as TicketEntity, Model as TicketModel,
};
use crate::errors::ServiceError;
use crate::models::{AnalyticsWindow, ProcedureStats, Ticket, TicketEstado};
use crate::repositories::{BaseRepository, Repository, TicketFilter, TicketStore};

/// SeaORM-backed ticket store
#[derive(Debug, Clone)]
pub struct TicketRepository {
    base: BaseRepository,
}

impl TicketRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    async fn find_model(&self, id: &str) -> Result<Option<TicketModel>, ServiceError> {
        TicketEntity::find_by_id(id.to_string())
            .one(self.base.get_db())
            .await
            .map_err(db_error)
    }

    /// Runs one UPDATE over the whole aggregate, optionally guarded by the
    /// stored `estado`, then reads the row back.
    async fn write(
        &self,
        ticket: &Ticket,
        expected: Option<TicketEstado>,
    ) -> Result<Option<Ticket>, ServiceError> {
        let mut query = TicketEntity::update_many()
            .set(to_active_model(ticket)?)
            .filter(Column::Id.eq(ticket.id.as_str()));
        if let Some(expected) = expected {
            query = query.filter(Column::Estado.eq(expected.to_string()));
        }

        let result = query.exec(self.base.get_db()).await.map_err(db_error)?;
        debug!(
            ticket_id = %ticket.id,
            rows_affected = result.rows_affected,
            guarded = expected.is_some(),
            "ticket row updated"
        );
        if result.rows_affected == 0 {
            return Ok(None);
        }

        self.find_model(&ticket.id)
            .await?
            .map(to_domain)
            .transpose()
    }
}

impl Repository for TicketRepository {
    fn get_db(&self) -> &DatabaseConnection {
        self.base.get_db()
    }
}

#[async_trait]
impl TicketStore for TicketRepository {
    async fn get(&self, id: &str) -> Result<Option<Ticket>, ServiceError> {
        self.find_model(id).await?.map(to_domain).transpose()
    }

    async fn insert(&self, ticket: &Ticket) -> Result<Ticket, ServiceError> {
        if self.find_model(&ticket.id).await?.is_some() {
            return Err(duplicate(&ticket.id));
        }

        let model = to_active_model(ticket)?
            .insert(self.base.get_db())
            .await
            .map_err(|e| match e.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => duplicate(&ticket.id),
                _ => db_error(e),
            })?;
        to_domain(model)
    }

    async fn list(&self, filter: &TicketFilter) -> Result<Vec<Ticket>, ServiceError> {
        let mut query = TicketEntity::find();
        if let Some(estado) = filter.estado {
            query = query.filter(Column::Estado.eq(estado.to_string()));
        }
        if let Some(asignado_a) = filter.asignado_a.as_deref() {
            query = query.filter(Column::AsignadoA.eq(asignado_a));
        }

        query
            .order_by_desc(Column::FechaCreacion)
            .order_by_asc(Column::Id)
            .limit(filter.limit)
            .offset(filter.offset)
            .all(self.base.get_db())
            .await
            .map_err(db_error)?
            .into_iter()
            .map(to_domain)
            .collect()
    }

    async fn update(&self, ticket: &Ticket) -> Result<Option<Ticket>, ServiceError> {
        self.write(ticket, None).await
    }

    async fn conditional_update(
        &self,
        ticket: &Ticket,
        expected: TicketEstado,
    ) -> Result<Option<Ticket>, ServiceError> {
        self.write(ticket, Some(expected)).await
    }

    async fn procedure_stats(
        &self,
        codigo: &str,
        window: &AnalyticsWindow,
    ) -> Result<ProcedureStats, ServiceError> {
        let mut query = TicketEntity::find().filter(Column::CodigoProcedimiento.eq(codigo));
        if let Some(from) = window.date_from {
            query = query.filter(Column::FechaCreacion.gte(from));
        }
        if let Some(to) = window.date_to {
            query = query.filter(Column::FechaCreacion.lte(to));
        }

        let tickets = query
            .all(self.base.get_db())
            .await
            .map_err(db_error)?
            .into_iter()
            .map(to_domain)
            .collect::<Result<Vec<_>, _>>()?;
        debug!(codigo = %codigo, rows = tickets.len(), "procedure tickets loaded for analytics");
        Ok(ProcedureStats::from_tickets(&tickets))
    }
}

fn db_error(err: DbErr) -> ServiceError {
    error!(error = %err, "ticket store query failed");
    counter!("ticketflow_db.query.error", 1, "table" => "tickets");
    ServiceError::DatabaseError(err)
}

fn duplicate(id: &str) -> ServiceError {
    ServiceError::Conflict(format!("Ticket {} already exists", id))
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, ServiceError> {
    Ok(serde_json::to_value(value)?)
}

/// SQL NULL or JSON null both read back as the empty sub-document.
fn from_json<T: DeserializeOwned + Default>(value: Value) -> Result<T, ServiceError> {
    if value.is_null() {
        return Ok(T::default());
    }
    Ok(serde_json::from_value(value)?)
}

pub(crate) fn to_active_model(ticket: &Ticket) -> Result<TicketActiveModel, ServiceError> {
    Ok(TicketActiveModel {
        id: Set(ticket.id.clone()),
        codigo_actividad: Set(ticket.codigo_actividad.clone()),
        codigo_linea_trabajo: Set(ticket.codigo_linea_trabajo.clone()),
        codigo_procedimiento: Set(ticket.codigo_procedimiento.clone()),
        titulo: Set(ticket.titulo.clone()),
        descripcion: Set(ticket.descripcion.clone()),
        asignado_a: Set(ticket.asignado_a.clone()),
        asignado_por: Set(ticket.asignado_por.clone()),
        estado: Set(ticket.estado.to_string()),
        flujo: Set(ticket.flujo.clone()),
        hitos: Set(to_json(&ticket.hitos)?),
        hito_actual: Set(ticket.hito_actual),
        hito_aprobado: Set(ticket.hito_aprobado),
        kpis: Set(to_json(&ticket.kpis)?),
        recursos: Set(ticket.recursos.clone()),
        metadatos: Set(to_json(&ticket.metadatos)?),
        triggers: Set(ticket.triggers.clone()),
        revision: Set(ticket.revision.as_ref().map(to_json).transpose()?),
        tiempo_estimado: Set(ticket.tiempo_estimado),
        tiempo_real: Set(ticket.tiempo_real),
        tiempo_pausa_total: Set(ticket.tiempo_pausa_total),
        eficiencia_temporal: Set(ticket.eficiencia_temporal),
        fecha_creacion: Set(ticket.fecha_creacion),
        fecha_aceptacion: Set(ticket.fecha_aceptacion),
        fecha_actualizado: Set(ticket.fecha_actualizado),
    })
}

pub(crate) fn to_domain(model: TicketModel) -> Result<Ticket, ServiceError> {
    let estado = TicketEstado::from_str(&model.estado).map_err(|_| {
        ServiceError::InternalError(format!(
            "ticket {} has unknown estado '{}'",
            model.id, model.estado
        ))
    })?;

    Ok(Ticket {
        estado,
        hitos: from_json(model.hitos)?,
        kpis: from_json(model.kpis)?,
        metadatos: from_json(model.metadatos)?,
        revision: model
            .revision
            .filter(|v| !v.is_null())
            .map(serde_json::from_value)
            .transpose()?,
        id: model.id,
        codigo_actividad: model.codigo_actividad,
        codigo_linea_trabajo: model.codigo_linea_trabajo,
        codigo_procedimiento: model.codigo_procedimiento,
        titulo: model.titulo,
        descripcion: model.descripcion,
        asignado_a: model.asignado_a,
        asignado_por: model.asignado_por,
        flujo: model.flujo,
        hito_actual: model.hito_actual,
        hito_aprobado: model.hito_aprobado,
        recursos: model.recursos,
        triggers: model.triggers,
        tiempo_estimado: model.tiempo_estimado,
        tiempo_real: model.tiempo_real,
        tiempo_pausa_total: model.tiempo_pausa_total,
        eficiencia_temporal: model.eficiencia_temporal,
        fecha_creacion: model.fecha_creacion,
        fecha_aceptacion: model.fecha_aceptacion,
        fecha_actualizado: model.fecha_actualizado,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Hito, NewTicket};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn sample() -> Ticket {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        let mut ticket = Ticket::new(
            NewTicket {
                id: "TCK-7".into(),
                codigo_actividad: "ACT".into(),
                titulo: "Check".into(),
                tiempo_estimado: 2.5,
                hitos: vec![Hito::new(100)],
                flujo: Some(json!({"pasos": ["a", "b"]})),
                ..Default::default()
            },
            now,
        );
        ticket.metadatos.extra.insert("origen".into(), json!("import"));
        ticket
    }

    #[test]
    fn model_conversion_keeps_aggregate() {
        let ticket = sample();
        let active = to_active_model(&ticket).unwrap();
        let model = TicketModel {
            id: active.id.unwrap(),
            codigo_actividad: active.codigo_actividad.unwrap(),
            codigo_linea_trabajo: active.codigo_linea_trabajo.unwrap(),
            codigo_procedimiento: active.codigo_procedimiento.unwrap(),
            titulo: active.titulo.unwrap(),
            descripcion: active.descripcion.unwrap(),
            asignado_a: active.asignado_a.unwrap(),
            asignado_por: active.asignado_por.unwrap(),
            estado: active.estado.unwrap(),
            flujo: active.flujo.unwrap(),
            hitos: active.hitos.unwrap(),
            hito_actual: active.hito_actual.unwrap(),
            hito_aprobado: active.hito_aprobado.unwrap(),
            kpis: active.kpis.unwrap(),
            recursos: active.recursos.unwrap(),
            metadatos: active.metadatos.unwrap(),
            triggers: active.triggers.unwrap(),
            revision: active.revision.unwrap(),
            tiempo_estimado: active.tiempo_estimado.unwrap(),
            tiempo_real: active.tiempo_real.unwrap(),
            tiempo_pausa_total: active.tiempo_pausa_total.unwrap(),
            eficiencia_temporal: active.eficiencia_temporal.unwrap(),
            fecha_creacion: active.fecha_creacion.unwrap(),
            fecha_aceptacion: active.fecha_aceptacion.unwrap(),
            fecha_actualizado: active.fecha_actualizado.unwrap(),
        };
        assert_eq!(model.estado, "CREADO");
        assert_eq!(model.metadatos["origen"], json!("import"));
        assert_eq!(to_domain(model).unwrap(), ticket);
    }

    #[test]
    fn unknown_estado_is_internal_error() {
        let ticket = sample();
        let active = to_active_model(&ticket).unwrap();
        let mut model = TicketModel {
            id: active.id.unwrap(),
            codigo_actividad: active.codigo_actividad.unwrap(),
            codigo_linea_trabajo: None,
            codigo_procedimiento: None,
            titulo: active.titulo.unwrap(),
            descripcion: None,
            asignado_a: None,
            asignado_por: None,
            estado: "ARCHIVADO".into(),
            flujo: None,
            hitos: json!([]),
            hito_actual: None,
            hito_aprobado: None,
            kpis: Value::Null,
            recursos: None,
            metadatos: Value::Null,
            triggers: None,
            revision: None,
            tiempo_estimado: 1.0,
            tiempo_real: None,
            tiempo_pausa_total: 0,
            eficiencia_temporal: None,
            fecha_creacion: ticket.fecha_creacion,
            fecha_aceptacion: None,
            fecha_actualizado: ticket.fecha_actualizado,
        };
        assert!(matches!(
            to_domain(model.clone()),
            Err(ServiceError::InternalError(_))
        ));

        model.estado = "ACTIVO".into();
        let ticket = to_domain(model).unwrap();
        assert_eq!(ticket.estado, TicketEstado::Activo);
        assert_eq!(ticket.metadatos, Default::default());
    }
}
