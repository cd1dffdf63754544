use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MessageRelevantData::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MessageRelevantData::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(MessageRelevantData::TxId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MessageRelevantData::MessageIndex)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(MessageRelevantData::TypeUrl).text().not_null())
                    .col(
                        ColumnDef::new(MessageRelevantData::SenderAddress)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(MessageRelevantData::ReceiverAddress)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(MessageRelevantData::Amount)
                            .decimal_len(78, 0)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MessageRelevantData::Denomination)
                            .text()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("message_relevant_data_tx")
                            .from(MessageRelevantData::Table, MessageRelevantData::TxId)
                            .to(Txes::Table, Txes::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("message_relevant_data_tx_id")
                    .table(MessageRelevantData::Table)
                    .col(MessageRelevantData::TxId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("message_relevant_data_receiver")
                    .table(MessageRelevantData::Table)
                    .col(MessageRelevantData::ReceiverAddress)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("message_relevant_data_sender")
                    .table(MessageRelevantData::Table)
                    .col(MessageRelevantData::SenderAddress)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(MessageRelevantData::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await?;
        Ok(())
    }
}

#[derive(Iden)]
enum MessageRelevantData {
    Table,
    Id,
    TxId,
    MessageIndex,
    TypeUrl,
    SenderAddress,
    ReceiverAddress,
    Amount,
    Denomination,
}

#[derive(Iden)]
enum Txes {
    Table,
    Id,
}
