//! Writing [`OnStatus`].

use std::io;

use freshet_amf::{Amf0Encoder, AmfValue};

use super::OnStatus;
use crate::command_messages::error::CommandError;

impl OnStatus {
    /// Writes an [`OnStatus`] command to the given writer.
    pub fn write(&self, buf: &mut impl io::Write, transaction_id: f64) -> Result<(), CommandError> {
        let mut encoder = Amf0Encoder::new(buf);

        encoder.encode_string("onStatus")?;
        encoder.encode_number(transaction_id)?;
        // command object is null
        encoder.encode_null()?;

        let mut info_object = freshet_amf::AmfObject::new();

        info_object.insert("level", AmfValue::String(self.level.to_string()));
        info_object.insert("code", AmfValue::String(self.code.clone()));

        if let Some(description) = &self.description {
            info_object.insert("description", AmfValue::String(description.clone()));
        }

        if let Some(others) = &self.others {
            for (key, value) in others.iter() {
                info_object.insert(key, value.clone());
            }
        }

        encoder.encode_object(&info_object)?;

        Ok(())
    }
}
