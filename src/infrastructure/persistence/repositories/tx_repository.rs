//! Repository for txes, messages, fees and message relevant data

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use sea_orm::sea_query::{OnConflict, Query};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde_json::{json, Value};
use std::fmt;

use crate::domain::models::{BlockHeight, MessagePayload, NormalizedTx};
use crate::infrastructure::persistence::entities::{
    fees, message_relevant_data, messages, txes,
};
use crate::infrastructure::persistence::error::DbError;

/// Repository for transaction operations
#[derive(Clone)]
pub struct TxRepository {
    conn: DatabaseConnection,
}

impl fmt::Debug for TxRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxRepository").finish_non_exhaustive()
    }
}

fn to_json<T: serde::Serialize>(column: &'static str, value: &T) -> Result<Value, DbError> {
    serde_json::to_value(value).map_err(|e| DbError::Encode {
        column,
        message: e.to_string(),
    })
}

fn payload_json(payload: &MessagePayload) -> Value {
    match payload {
        MessagePayload::Json(value) => value.clone(),
        MessagePayload::Raw(bytes) => json!({ "raw": BASE64.encode(bytes) }),
    }
}

impl TxRepository {
    /// Create a new TxRepository
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Heights in `[from, to]` holding at least one message of `type_url`
    pub async fn heights_with_message_type(
        &self,
        chain_id: &str,
        type_url: &str,
        from: BlockHeight,
        to: BlockHeight,
    ) -> Result<Vec<BlockHeight>, DbError> {
        let heights: Vec<i64> = txes::Entity::find()
            .select_only()
            .column(txes::Column::Height)
            .distinct()
            .filter(txes::Column::ChainId.eq(chain_id))
            .filter(txes::Column::Height.between(from, to))
            .filter(
                txes::Column::Id.in_subquery(
                    Query::select()
                        .column(messages::Column::TxId)
                        .from(messages::Entity)
                        .and_where(messages::Column::MessageType.eq(type_url))
                        .to_owned(),
                ),
            )
            .order_by_asc(txes::Column::Height)
            .into_tuple()
            .all(&self.conn)
            .await?;

        Ok(heights)
    }

    /// Upsert a transaction and replace its messages, fees and relevant data
    pub async fn upsert_tx<C: ConnectionTrait>(
        db: &C,
        chain_id: &str,
        tx: &NormalizedTx,
    ) -> Result<i64, DbError> {
        let model = txes::ActiveModel {
            chain_id: Set(chain_id.to_string()),
            hash: Set(tx.hash.clone()),
            height: Set(tx.height),
            time_stamp: Set(tx.timestamp.into()),
            code: Set(i64::from(tx.code)),
            codespace: Set(tx.codespace.clone()),
            raw_log: Set(tx.raw_log.clone()),
            gas_wanted: Set(tx.gas_wanted),
            gas_used: Set(tx.gas_used),
            memo: Set(tx.memo.clone()),
            timeout_height: Set(i64::try_from(tx.timeout_height).unwrap_or(i64::MAX)),
            signers: Set(to_json("signers", &tx.signers)?),
            auth_info: Set(to_json("auth_info", &tx.auth_info)?),
            dropped_extension_options: Set(to_json(
                "dropped_extension_options",
                &tx.dropped_extension_options,
            )?),
            decoded_with_fallback: Set(tx.decoded_with_fallback),
            ..Default::default()
        };

        let tx_id = txes::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([txes::Column::ChainId, txes::Column::Hash])
                    .update_columns([
                        txes::Column::Height,
                        txes::Column::TimeStamp,
                        txes::Column::Code,
                        txes::Column::Codespace,
                        txes::Column::RawLog,
                        txes::Column::GasWanted,
                        txes::Column::GasUsed,
                        txes::Column::Memo,
                        txes::Column::TimeoutHeight,
                        txes::Column::Signers,
                        txes::Column::AuthInfo,
                        txes::Column::DroppedExtensionOptions,
                        txes::Column::DecodedWithFallback,
                    ])
                    .to_owned(),
            )
            .exec(db)
            .await?
            .last_insert_id;

        messages::Entity::delete_many()
            .filter(messages::Column::TxId.eq(tx_id))
            .exec(db)
            .await?;
        fees::Entity::delete_many()
            .filter(fees::Column::TxId.eq(tx_id))
            .exec(db)
            .await?;
        message_relevant_data::Entity::delete_many()
            .filter(message_relevant_data::Column::TxId.eq(tx_id))
            .exec(db)
            .await?;

        let message_models = tx
            .messages
            .iter()
            .map(|message| {
                Ok(messages::ActiveModel {
                    tx_id: Set(tx_id),
                    message_index: Set(message.message_index as i32),
                    message_type: Set(message.type_url.clone()),
                    payload: Set(payload_json(&message.payload)),
                    events: Set(to_json("events", &message.events)?),
                    ..Default::default()
                })
            })
            .collect::<Result<Vec<_>, DbError>>()?;
        if !message_models.is_empty() {
            messages::Entity::insert_many(message_models)
                .exec_without_returning(db)
                .await?;
        }

        let fee_models: Vec<fees::ActiveModel> = tx
            .fees
            .iter()
            .map(|fee| fees::ActiveModel {
                tx_id: Set(tx_id),
                denomination: Set(fee.denomination.clone()),
                amount: Set(fee.amount.clone()),
                payer_address: Set(fee.payer_address.clone()),
                ..Default::default()
            })
            .collect();
        if !fee_models.is_empty() {
            fees::Entity::insert_many(fee_models)
                .exec_without_returning(db)
                .await?;
        }

        let relevant_models: Vec<message_relevant_data::ActiveModel> = tx
            .relevant_data
            .iter()
            .map(|data| message_relevant_data::ActiveModel {
                tx_id: Set(tx_id),
                message_index: Set(data.message_index as i32),
                type_url: Set(data.type_url.clone()),
                sender_address: Set(data.sender_address.clone()),
                receiver_address: Set(data.receiver_address.clone()),
                amount: Set(data.amount.clone()),
                denomination: Set(data.denomination.clone()),
                ..Default::default()
            })
            .collect();
        if !relevant_models.is_empty() {
            message_relevant_data::Entity::insert_many(relevant_models)
                .exec_without_returning(db)
                .await?;
        }

        Ok(tx_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_payload_is_wrapped() {
        assert_eq!(
            payload_json(&MessagePayload::Raw(vec![1, 2, 3])),
            json!({"raw": "AQID"})
        );
        let value = json!({"@type": "/cosmos.bank.v1beta1.MsgSend"});
        assert_eq!(payload_json(&MessagePayload::Json(value.clone())), value);
    }
}
