//! Reading [`OnStatus`].

use freshet_amf::{Amf0Decoder, Amf0Marker, AmfObject, AmfValue};

use super::OnStatus;
use crate::command_messages::CommandResultLevel;
use crate::command_messages::error::CommandError;

impl OnStatus {
    /// Reads an [`OnStatus`] command from the given decoder: the null
    /// command object followed by the info object.
    pub fn read(decoder: &mut Amf0Decoder) -> Result<Self, CommandError> {
        // the command object is null
        if decoder.peek_marker()? == Amf0Marker::Null {
            decoder.decode_null()?;
        }

        let info_object = decoder.decode_object()?;

        let mut code = None;
        let mut description = None;
        let mut level = None;
        let mut others = AmfObject::new();

        for (key, value) in info_object.into_iter() {
            if let AmfValue::String(text) = &value {
                match key.as_str() {
                    "code" => {
                        code = Some(text.clone());
                        continue;
                    }
                    "description" => {
                        description = Some(text.clone());
                        continue;
                    }
                    "level" => {
                        level = text.parse().ok();
                        continue;
                    }
                    _ => {}
                }
            }

            others.insert(key, value);
        }

        Ok(Self {
            code: code.ok_or(CommandError::InvalidOnStatusInfoObject)?,
            description,
            level: level.unwrap_or(CommandResultLevel::Status),
            others: (!others.is_empty()).then_some(others),
        })
    }
}
