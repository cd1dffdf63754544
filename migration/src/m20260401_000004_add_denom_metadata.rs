use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .alter_table(
                Table::alter()
                    .table(Denoms::Table)
                    .add_column_if_not_exists(
                        ColumnDef::new(Denoms::Name)
                            .text()
                            .not_null()
                            .default("UNKNOWN"),
                    )
                    .add_column_if_not_exists(
                        ColumnDef::new(Denoms::Symbol)
                            .text()
                            .not_null()
                            .default("UNKNOWN"),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(DenomUnits::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DenomUnits::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(DenomUnits::DenomId).big_integer().not_null())
                    .col(ColumnDef::new(DenomUnits::Name).text().not_null())
                    .col(
                        ColumnDef::new(DenomUnits::Exponent)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("denom_units_denom")
                            .from(DenomUnits::Table, DenomUnits::DenomId)
                            .to(Denoms::Table, Denoms::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One unit name per denom
        manager
            .create_index(
                Index::create()
                    .name("denom_units_denom_id_name")
                    .table(DenomUnits::Table)
                    .col(DenomUnits::DenomId)
                    .col(DenomUnits::Name)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DenomUnits::Table).if_exists().to_owned())
            .await?;
        manager
            .alter_table(
                Table::alter()
                    .table(Denoms::Table)
                    .drop_column(Denoms::Name)
                    .drop_column(Denoms::Symbol)
                    .to_owned(),
            )
            .await?;
        Ok(())
    }
}

#[derive(Iden)]
enum Denoms {
    Table,
    Id,
    Name,
    Symbol,
}

#[derive(Iden)]
enum DenomUnits {
    Table,
    Id,
    DenomId,
    Name,
    Exponent,
}
