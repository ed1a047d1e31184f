use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_procedimientos_table::Migration),
            Box::new(m20240101_000002_create_tickets_table::Migration),
        ]
    }
}

mod m20240101_000001_create_procedimientos_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_procedimientos_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Procedimientos::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Procedimientos::Codigo)
                                .string()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Procedimientos::Nombre).string().not_null())
                        .col(ColumnDef::new(Procedimientos::Descripcion).text().null())
                        .col(ColumnDef::new(Procedimientos::Kpis).json().null())
                        .col(
                            ColumnDef::new(Procedimientos::Activo)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Procedimientos::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Procedimientos {
        Table,
        Codigo,
        Nombre,
        Descripcion,
        Kpis,
        Activo,
    }
}

mod m20240101_000002_create_tickets_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_tickets_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Tickets::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Tickets::Id).string().primary_key().not_null())
                        .col(ColumnDef::new(Tickets::CodigoActividad).string().not_null())
                        .col(ColumnDef::new(Tickets::CodigoLineaTrabajo).string().null())
                        .col(ColumnDef::new(Tickets::CodigoProcedimiento).string().null())
                        .col(ColumnDef::new(Tickets::Titulo).string().not_null())
                        .col(ColumnDef::new(Tickets::Descripcion).text().null())
                        .col(ColumnDef::new(Tickets::AsignadoA).string().null())
                        .col(ColumnDef::new(Tickets::AsignadoPor).string().null())
                        .col(
                            ColumnDef::new(Tickets::Estado)
                                .string()
                                .not_null()
                                .default("CREADO"),
                        )
                        .col(ColumnDef::new(Tickets::Flujo).json().null())
                        .col(ColumnDef::new(Tickets::Hitos).json().not_null())
                        .col(ColumnDef::new(Tickets::HitoActual).integer().null())
                        .col(ColumnDef::new(Tickets::HitoAprobado).integer().null())
                        .col(ColumnDef::new(Tickets::Kpis).json().not_null())
                        .col(ColumnDef::new(Tickets::Recursos).json().null())
                        .col(ColumnDef::new(Tickets::Metadatos).json().not_null())
                        .col(ColumnDef::new(Tickets::Triggers).json().null())
                        .col(ColumnDef::new(Tickets::Revision).json().null())
                        .col(ColumnDef::new(Tickets::TiempoEstimado).double().not_null())
                        .col(ColumnDef::new(Tickets::TiempoReal).double().null())
                        .col(
                            ColumnDef::new(Tickets::TiempoPausaTotal)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Tickets::EficienciaTemporal).double().null())
                        .col(
                            ColumnDef::new(Tickets::FechaCreacion)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Tickets::FechaAceptacion)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Tickets::FechaActualizado)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_tickets_estado")
                        .table(Tickets::Table)
                        .col(Tickets::Estado)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_tickets_asignado_a")
                        .table(Tickets::Table)
                        .col(Tickets::AsignadoA)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_tickets_fecha_creacion")
                        .table(Tickets::Table)
                        .col(Tickets::FechaCreacion)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Tickets::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Tickets {
        Table,
        Id,
        CodigoActividad,
        CodigoLineaTrabajo,
        CodigoProcedimiento,
        Titulo,
        Descripcion,
        AsignadoA,
        AsignadoPor,
        Estado,
        Flujo,
        Hitos,
        HitoActual,
        HitoAprobado,
        Kpis,
        Recursos,
        Metadatos,
        Triggers,
        Revision,
        TiempoEstimado,
        TiempoReal,
        TiempoPausaTotal,
        EficienciaTemporal,
        FechaCreacion,
        FechaAceptacion,
        FechaActualizado,
    }
}
