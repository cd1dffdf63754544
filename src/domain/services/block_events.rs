//! Begin/end block event normalization

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::domain::errors::DecodeError;
use crate::domain::models::{
    Attribute, BlockEventRecord, BlockLifecyclePosition, BlockResults, RawEvent,
};

const MODE_KEY: &str = "mode";
const MODE_BEGIN_BLOCK: &str = "BeginBlock";
const MODE_END_BLOCK: &str = "EndBlock";

fn decode_base64_text(value: &str) -> Result<String, DecodeError> {
    let bytes = BASE64
        .decode(value)
        .map_err(|e| DecodeError::InvalidLogs(format!("attribute {:?}: {}", value, e)))?;
    String::from_utf8(bytes)
        .map_err(|e| DecodeError::InvalidLogs(format!("attribute {:?}: {}", value, e)))
}

/// Decode attributes as delivered by the node. Legacy nodes base64 encode
/// both key and value.
pub fn normalize_attributes(
    attributes: &[Attribute],
    base64_encoded: bool,
) -> Result<Vec<Attribute>, DecodeError> {
    if !base64_encoded {
        return Ok(attributes.to_vec());
    }

    attributes
        .iter()
        .map(|attr| {
            Ok(Attribute {
                key: decode_base64_text(&attr.key)?,
                value: decode_base64_text(&attr.value)?,
            })
        })
        .collect()
}

/// Encode attributes the way legacy nodes deliver them
pub fn encode_attributes_base64(attributes: &[Attribute]) -> Vec<Attribute> {
    attributes
        .iter()
        .map(|attr| Attribute {
            key: BASE64.encode(attr.key.as_bytes()),
            value: BASE64.encode(attr.value.as_bytes()),
        })
        .collect()
}

pub fn normalize_event(event: &RawEvent, base64_encoded: bool) -> Result<RawEvent, DecodeError> {
    Ok(RawEvent {
        event_type: event.event_type.clone(),
        attributes: normalize_attributes(&event.attributes, base64_encoded)?,
    })
}

/// Split `finalize_block_events` by their `mode` attribute.
///
/// Every event must carry exactly one of the two modes.
pub fn split_finalize_block_events(
    events: &[RawEvent],
) -> Result<(Vec<RawEvent>, Vec<RawEvent>), String> {
    let mut begin = Vec::new();
    let mut end = Vec::new();

    for event in events {
        let modes: Vec<&str> = event
            .attributes
            .iter()
            .filter(|a| a.key == MODE_KEY)
            .map(|a| a.value.as_str())
            .collect();
        let is_begin = modes.contains(&MODE_BEGIN_BLOCK);
        let is_end = modes.contains(&MODE_END_BLOCK);

        match (is_begin, is_end) {
            (true, false) => begin.push(event.clone()),
            (false, true) => end.push(event.clone()),
            (true, true) => {
                return Err(format!(
                    "finalize block event {} has both BeginBlock and EndBlock modes",
                    event.event_type
                ))
            }
            (false, false) => {
                return Err(format!(
                    "finalize block event {} has no BeginBlock or EndBlock mode",
                    event.event_type
                ))
            }
        }
    }

    Ok((begin, end))
}

/// Fold finalize-block events into the begin/end lists
pub fn fold_finalize_block_events(results: &mut BlockResults) -> Result<(), String> {
    if results.finalize_block_events.is_empty() {
        return Ok(());
    }
    let (begin, end) = split_finalize_block_events(&results.finalize_block_events)?;
    results.begin_block_events.extend(begin);
    results.end_block_events.extend(end);
    results.finalize_block_events.clear();
    Ok(())
}

/// Normalized begin and end block events in emission order
pub fn block_event_records(
    results: &BlockResults,
    base64_encoded: bool,
) -> Result<(Vec<RawEvent>, Vec<RawEvent>, Vec<BlockEventRecord>), DecodeError> {
    let begin = results
        .begin_block_events
        .iter()
        .map(|e| normalize_event(e, base64_encoded))
        .collect::<Result<Vec<_>, _>>()?;
    let end = results
        .end_block_events
        .iter()
        .map(|e| normalize_event(e, base64_encoded))
        .collect::<Result<Vec<_>, _>>()?;

    let records = begin
        .iter()
        .enumerate()
        .map(|(i, e)| (BlockLifecyclePosition::BeginBlock, i, e))
        .chain(
            end.iter()
                .enumerate()
                .map(|(i, e)| (BlockLifecyclePosition::EndBlock, i, e)),
        )
        .map(|(position, event_index, event)| BlockEventRecord {
            position,
            event_index,
            event_type: event.event_type.clone(),
            attributes: event.attributes.clone(),
        })
        .collect();

    Ok((begin, end, records))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attributes() -> Vec<Attribute> {
        vec![
            Attribute::new("receiver", "cosmos1abc"),
            Attribute::new("amount", "100uatom,5uosmo"),
            Attribute::new("receiver", "cosmos1def"),
            Attribute::new("", ""),
        ]
    }

    #[test]
    fn test_attribute_round_trip_keeps_order() {
        let original = attributes();
        let encoded = encode_attributes_base64(&original);
        assert_ne!(encoded, original);

        let decoded = normalize_attributes(&encoded, true).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_plain_attributes_pass_through() {
        assert_eq!(normalize_attributes(&attributes(), false).unwrap(), attributes());
    }

    #[test]
    fn test_invalid_base64_attribute() {
        let attrs = vec![Attribute::new("not*base64", "x")];
        assert!(normalize_attributes(&attrs, true).is_err());
    }

    #[test]
    fn test_split_finalize_block_events() {
        let events = vec![
            RawEvent::new("mint", vec![Attribute::new("mode", "BeginBlock")]),
            RawEvent::new("complete_unbonding", vec![Attribute::new("mode", "EndBlock")]),
            RawEvent::new("rewards", vec![Attribute::new("mode", "BeginBlock")]),
        ];
        let (begin, end) = split_finalize_block_events(&events).unwrap();

        assert_eq!(begin.len(), 2);
        assert_eq!(begin[1].event_type, "rewards");
        assert_eq!(end[0].event_type, "complete_unbonding");
    }

    #[test]
    fn test_split_rejects_missing_or_double_mode() {
        let neither = vec![RawEvent::new("mint", vec![])];
        assert!(split_finalize_block_events(&neither).is_err());

        let both = vec![RawEvent::new(
            "mint",
            vec![Attribute::new("mode", "BeginBlock"), Attribute::new("mode", "EndBlock")],
        )];
        assert!(split_finalize_block_events(&both).is_err());
    }

    #[test]
    fn test_block_event_records_indices() {
        let results = BlockResults {
            height: 5,
            begin_block_events: vec![RawEvent::new("a", vec![]), RawEvent::new("b", vec![])],
            end_block_events: vec![RawEvent::new("c", vec![])],
            ..BlockResults::default()
        };
        let (_, _, records) = block_event_records(&results, false).unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[1].event_index, 1);
        assert_eq!(records[2].position, BlockLifecyclePosition::EndBlock);
        assert_eq!(records[2].event_index, 0);
    }
}
