use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// The `tickets` table. Sub-documents live in JSON columns and `estado` holds
/// the wire name of the lifecycle state.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tickets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub codigo_actividad: String,
    pub codigo_linea_trabajo: Option<String>,
    pub codigo_procedimiento: Option<String>,
    pub titulo: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub descripcion: Option<String>,
    pub asignado_a: Option<String>,
    pub asignado_por: Option<String>,
    pub estado: String,
    pub flujo: Option<Json>,
    pub hitos: Json,
    pub hito_actual: Option<i32>,
    pub hito_aprobado: Option<i32>,
    pub kpis: Json,
    pub recursos: Option<Json>,
    pub metadatos: Json,
    pub triggers: Option<Json>,
    pub revision: Option<Json>,
    pub tiempo_estimado: f64,
    pub tiempo_real: Option<f64>,
    pub tiempo_pausa_total: i64,
    pub eficiencia_temporal: Option<f64>,
    pub fecha_creacion: DateTime<Utc>,
    pub fecha_aceptacion: Option<DateTime<Utc>>,
    pub fecha_actualizado: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
