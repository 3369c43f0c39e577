//! Data-driven unit and building definitions.
//!
//! Plain structs deserialized from RON. Nothing here touches the file
//! system; callers hand in the text and a name to report errors against.

mod building_data;
mod unit_data;

pub use building_data::{default_spawn_queue_capacity, BuildingData};
pub use unit_data::{LocomotionKind, UnitData};

use serde::de::DeserializeOwned;

use crate::error::{GridError, Result};

/// Parse a RON document, mapping failures to [`GridError::DataParseError`].
pub(crate) fn parse_ron<T: DeserializeOwned>(source_name: &str, text: &str) -> Result<T> {
    ron::from_str(text).map_err(|error| {
        tracing::error!(source = source_name, %error, "Failed to parse data file");
        GridError::DataParseError {
            source_name: source_name.to_string(),
            message: error.to_string(),
        }
    })
}
