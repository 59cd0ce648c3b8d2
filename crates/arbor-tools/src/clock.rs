use anyhow::Result;
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};

use crate::registry::Tool;

/// Current wall-clock time, ISO 8601 extended by default or a UTC string.
pub struct CurrentTimeTool;

#[async_trait]
impl Tool for CurrentTimeTool {
    fn name(&self) -> &str {
        "current_time"
    }

    fn description(&self) -> &str {
        "Get current time in ISO 8601 Extended Format (YYYY-MM-DDTHH:mm:ss.sssZ) or UTC string format. Uses ISO by default."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "iso": { "type": "boolean" },
                "utc": { "type": "boolean" }
            }
        })
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let iso = args.get("iso").and_then(Value::as_bool).unwrap_or(false);
        let utc = args.get("utc").and_then(Value::as_bool).unwrap_or(false);
        let now = Utc::now();

        let formatted = if utc && !iso {
            now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
        } else {
            now.to_rfc3339_opts(SecondsFormat::Millis, true)
        };
        Ok(Value::String(formatted))
    }
}
