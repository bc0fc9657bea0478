use serde::de::DeserializeOwned;

use crate::error::ConversionError;
use crate::value::Value;

/// Decode a normalized tree into a typed target, reporting the path of the
/// first mismatch. The payload is handed back inside the error so callers can
/// show what actually failed to fit.
pub fn decode<T: DeserializeOwned>(payload: Value, target: &'static str) -> Result<T, ConversionError> {
    let json = serde_json::Value::from(payload.clone());
    match serde_path_to_error::deserialize::<_, T>(json) {
        Ok(v) => Ok(v),
        Err(err) => {
            let path = err.path().to_string();
            Err(ConversionError { target, path, message: err.into_inner().to_string(), payload })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cwl::CommandLineTool;
    use serde_json::json;

    #[test]
    fn mismatch_reports_json_path() {
        let payload = Value::from(json!({
            "id": "t",
            "inputs": [{"id": "x", "inputBinding": {"position": "first"}}]
        }));
        let err = decode::<CommandLineTool>(payload.clone(), "CommandLineTool").unwrap_err();
        assert_eq!(err.target, "CommandLineTool");
        assert_eq!(err.path, "inputs[0].inputBinding.position");
        assert_eq!(err.payload, payload);
    }

    #[test]
    fn well_formed_payload_decodes() {
        let tool: CommandLineTool =
            decode(Value::from(json!({"id": "t", "baseCommand": ["echo"]})), "CommandLineTool").unwrap();
        assert_eq!(tool.base_command, ["echo"]);
    }
}
