use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// The `procedimientos` table; only the KPI definitions matter to the workflow.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "procedimientos")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub codigo: String,
    pub nombre: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub descripcion: Option<String>,
    pub kpis: Option<Json>,
    pub activo: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
