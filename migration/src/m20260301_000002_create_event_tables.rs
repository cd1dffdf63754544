use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(BlockEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BlockEvents::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(BlockEvents::ChainId).text().not_null())
                    .col(ColumnDef::new(BlockEvents::Height).big_integer().not_null())
                    .col(
                        ColumnDef::new(BlockEvents::LifecyclePosition)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(BlockEvents::EventIndex).integer().not_null())
                    .col(ColumnDef::new(BlockEvents::EventType).text().not_null())
                    .col(
                        ColumnDef::new(BlockEvents::Attributes)
                            .json_binary()
                            .not_null()
                            .default("[]"),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("block_events_chain_height")
                    .table(BlockEvents::Table)
                    .col(BlockEvents::ChainId)
                    .col(BlockEvents::Height)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(EventRelevantData::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EventRelevantData::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(EventRelevantData::ChainId).text().not_null())
                    .col(
                        ColumnDef::new(EventRelevantData::Height)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(EventRelevantData::Address).text().not_null())
                    .col(
                        ColumnDef::new(EventRelevantData::Amount)
                            .decimal_len(78, 0)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EventRelevantData::Denomination)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EventRelevantData::EventSource)
                            .text()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("event_relevant_data_chain_height")
                    .table(EventRelevantData::Table)
                    .col(EventRelevantData::ChainId)
                    .col(EventRelevantData::Height)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("event_relevant_data_address")
                    .table(EventRelevantData::Table)
                    .col(EventRelevantData::Address)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(FailedBlocks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FailedBlocks::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(FailedBlocks::ChainId).text().not_null())
                    .col(ColumnDef::new(FailedBlocks::ChainName).text().not_null())
                    .col(ColumnDef::new(FailedBlocks::Height).big_integer().not_null())
                    .col(ColumnDef::new(FailedBlocks::Kind).text().not_null())
                    .col(ColumnDef::new(FailedBlocks::Reason).text().not_null())
                    .col(
                        ColumnDef::new(FailedBlocks::Attempts)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(FailedBlocks::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(FailedBlocks::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(FailedBlocks::ResolvedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        // One record per (chain, height, kind)
        manager
            .create_index(
                Index::create()
                    .name("failed_blocks_chain_height_kind")
                    .table(FailedBlocks::Table)
                    .col(FailedBlocks::ChainId)
                    .col(FailedBlocks::Height)
                    .col(FailedBlocks::Kind)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(FailedBlocks::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .table(EventRelevantData::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(BlockEvents::Table).if_exists().to_owned())
            .await?;
        Ok(())
    }
}

#[derive(Iden)]
enum BlockEvents {
    Table,
    Id,
    ChainId,
    Height,
    LifecyclePosition,
    EventIndex,
    EventType,
    Attributes,
}

#[derive(Iden)]
enum EventRelevantData {
    Table,
    Id,
    ChainId,
    Height,
    Address,
    Amount,
    Denomination,
    EventSource,
}

#[derive(Iden)]
enum FailedBlocks {
    Table,
    Id,
    ChainId,
    ChainName,
    Height,
    Kind,
    Reason,
    Attempts,
    CreatedAt,
    UpdatedAt,
    ResolvedAt,
}
