use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Blocks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Blocks::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Blocks::ChainId).text().not_null())
                    .col(ColumnDef::new(Blocks::Height).big_integer().not_null())
                    .col(ColumnDef::new(Blocks::BlockHash).text().not_null())
                    .col(
                        ColumnDef::new(Blocks::TimeStamp)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Blocks::ProposerAddress)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(Blocks::TxIndexed)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Blocks::BlockEventsIndexed)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Blocks::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Upserts conflict on (chain_id, height)
        manager
            .create_index(
                Index::create()
                    .name("blocks_chain_height")
                    .table(Blocks::Table)
                    .col(Blocks::ChainId)
                    .col(Blocks::Height)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Txes::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Txes::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Txes::ChainId).text().not_null())
                    .col(ColumnDef::new(Txes::Hash).text().not_null())
                    .col(ColumnDef::new(Txes::Height).big_integer().not_null())
                    .col(
                        ColumnDef::new(Txes::TimeStamp)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Txes::Code).big_integer().not_null())
                    .col(ColumnDef::new(Txes::Codespace).text().not_null().default(""))
                    .col(ColumnDef::new(Txes::RawLog).text().not_null().default(""))
                    .col(ColumnDef::new(Txes::GasWanted).big_integer().not_null())
                    .col(ColumnDef::new(Txes::GasUsed).big_integer().not_null())
                    .col(ColumnDef::new(Txes::Memo).text().not_null().default(""))
                    .col(ColumnDef::new(Txes::TimeoutHeight).big_integer().not_null())
                    .col(
                        ColumnDef::new(Txes::Signers)
                            .json_binary()
                            .not_null()
                            .default("[]"),
                    )
                    .col(
                        ColumnDef::new(Txes::AuthInfo)
                            .json_binary()
                            .not_null()
                            .default("{}"),
                    )
                    .col(
                        ColumnDef::new(Txes::DroppedExtensionOptions)
                            .json_binary()
                            .not_null()
                            .default("[]"),
                    )
                    .col(
                        ColumnDef::new(Txes::DecodedWithFallback)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("txes_chain_hash")
                    .table(Txes::Table)
                    .col(Txes::ChainId)
                    .col(Txes::Hash)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("txes_chain_height")
                    .table(Txes::Table)
                    .col(Txes::ChainId)
                    .col(Txes::Height)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Messages::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Messages::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Messages::TxId).big_integer().not_null())
                    .col(ColumnDef::new(Messages::MessageIndex).integer().not_null())
                    .col(ColumnDef::new(Messages::MessageType).text().not_null())
                    .col(
                        ColumnDef::new(Messages::Payload)
                            .json_binary()
                            .not_null()
                            .default("{}"),
                    )
                    .col(
                        ColumnDef::new(Messages::Events)
                            .json_binary()
                            .not_null()
                            .default("[]"),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("messages_tx_id_fkey")
                            .from(Messages::Table, Messages::TxId)
                            .to(Txes::Table, Txes::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("messages_message_type")
                    .table(Messages::Table)
                    .col(Messages::MessageType)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("messages_tx_id")
                    .table(Messages::Table)
                    .col(Messages::TxId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Fees::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Fees::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Fees::TxId).big_integer().not_null())
                    .col(ColumnDef::new(Fees::Denomination).text().not_null())
                    .col(ColumnDef::new(Fees::Amount).decimal_len(78, 0).not_null())
                    .col(ColumnDef::new(Fees::PayerAddress).text().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fees_tx_id_fkey")
                            .from(Fees::Table, Fees::TxId)
                            .to(Txes::Table, Txes::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("fees_tx_id")
                    .table(Fees::Table)
                    .col(Fees::TxId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Denoms::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Denoms::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Denoms::Base).text().not_null().unique_key())
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Denoms::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Fees::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Messages::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Txes::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Blocks::Table).if_exists().to_owned())
            .await?;
        Ok(())
    }
}

#[derive(Iden)]
enum Blocks {
    Table,
    Id,
    ChainId,
    Height,
    BlockHash,
    TimeStamp,
    ProposerAddress,
    TxIndexed,
    BlockEventsIndexed,
    UpdatedAt,
}

#[derive(Iden)]
enum Txes {
    Table,
    Id,
    ChainId,
    Hash,
    Height,
    TimeStamp,
    Code,
    Codespace,
    RawLog,
    GasWanted,
    GasUsed,
    Memo,
    TimeoutHeight,
    Signers,
    AuthInfo,
    DroppedExtensionOptions,
    DecodedWithFallback,
}

#[derive(Iden)]
enum Messages {
    Table,
    Id,
    TxId,
    MessageIndex,
    MessageType,
    Payload,
    Events,
}

#[derive(Iden)]
enum Fees {
    Table,
    Id,
    TxId,
    Denomination,
    Amount,
    PayerAddress,
}

#[derive(Iden)]
enum Denoms {
    Table,
    Id,
    Base,
}
