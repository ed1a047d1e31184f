use async_trait::async_trait;
use sea_orm::{DatabaseConnection, EntityTrait};
use std::sync::Arc;
use tracing::error;

use crate::entities::procedimiento::Entity as ProcedimientoEntity;
use crate::errors::ServiceError;
use crate::entities::procedimiento::Model as ProcedimientoModel;
use crate::models::{KpiSchema, ProcedureInfo};
use crate::repositories::{BaseRepository, ProcedureCatalog, Repository};

/// Reads KPI definitions from the `procedimientos` table
#[derive(Debug, Clone)]
pub struct ProcedureRepository {
    base: BaseRepository,
}

impl ProcedureRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    async fn find_model(&self, codigo: &str) -> Result<Option<ProcedimientoModel>, ServiceError> {
        ProcedimientoEntity::find_by_id(codigo.to_string())
            .one(self.base.get_db())
            .await
            .map_err(|e| {
                error!(codigo = %codigo, error = %e, "procedure lookup failed");
                ServiceError::DatabaseError(e)
            })
    }
}

impl Repository for ProcedureRepository {
    fn get_db(&self) -> &DatabaseConnection {
        self.base.get_db()
    }
}

#[async_trait]
impl ProcedureCatalog for ProcedureRepository {
    async fn kpi_schema(&self, codigo: &str) -> Result<Option<KpiSchema>, ServiceError> {
        let procedure = self.find_model(codigo).await?;
        Ok(procedure.map(|p| KpiSchema::from_json(p.kpis.as_ref())))
    }

    async fn find(&self, codigo: &str) -> Result<Option<ProcedureInfo>, ServiceError> {
        let procedure = self.find_model(codigo).await?;
        Ok(procedure.map(|p| ProcedureInfo {
            codigo: p.codigo,
            nombre: p.nombre,
        }))
    }
}
