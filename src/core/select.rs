//! Selection of store records through a [`ConditionSet`].

use crate::core::condition::ConditionSet;
use crate::core::error::{PluginError, Result};
use crate::core::record::Record;
use crate::core::store::{RecordStream, Store};
use tracing::debug;

/// Lazily select the records of `record_type` that satisfy `conditions`.
///
/// Records are pulled from the store one at a time as the stream is consumed.
/// A row of the wrong type surfaces as an error instead of being handed to a
/// transformer that expects a different shape.
pub fn select<'a>(
    store: &'a dyn Store,
    record_type: &'a str,
    conditions: &'a ConditionSet,
) -> Result<RecordStream<'a>> {
    if record_type.is_empty() {
        return Err(PluginError::ConfigError(
            "record type to select must not be empty".to_string(),
        ));
    }
    debug!(
        record_type,
        conditions = conditions.len(),
        "selecting records"
    );
    let records = store.select(record_type, conditions)?;
    Ok(Box::new(records.map(move |item| {
        let record = item?;
        if record.record_type() != record_type {
            return Err(PluginError::ValidationError(format!(
                "store returned a '{}' item when selecting '{}'",
                record.record_type(),
                record_type
            )));
        }
        Ok(record)
    })))
}

/// Materialize a selection.
pub fn select_all(
    store: &dyn Store,
    record_type: &str,
    conditions: &ConditionSet,
) -> Result<Vec<Record>> {
    select(store, record_type, conditions)?.collect()
}
