//! Image generation tool.
//!
//! Delegates to the engine's image capability, saves the decoded payload
//! under the artifacts directory, and returns the sentinel string the
//! orchestration loop recognizes as a deliverable binary.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chatclaw_core::engine::Engine;
use chatclaw_core::error::ToolError;
use chatclaw_core::tool::{IMAGE_SENTINEL_PREFIX, Tool};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

pub struct GenerateImageTool {
    engine: Arc<dyn Engine>,
    artifacts_dir: PathBuf,
}

impl GenerateImageTool {
    pub fn new(engine: Arc<dyn Engine>, artifacts_dir: PathBuf) -> Self {
        Self {
            engine,
            artifacts_dir,
        }
    }
}

#[async_trait]
impl Tool for GenerateImageTool {
    fn name(&self) -> &str {
        "generate_image"
    }

    fn description(&self) -> &str {
        "Generate an image using AI. Call this when the user asks to draw or visualize something."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "prompt": {
                    "type": "string",
                    "description": "The detailed visual description for the image."
                }
            },
            "required": ["prompt"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> Result<String, ToolError> {
        let prompt = args["prompt"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'prompt' argument".into()))?;

        info!(prompt = %prompt, "Generating image");

        let parts =
            self.engine
                .generate_image(prompt)
                .await
                .map_err(|e| ToolError::ExecutionFailed {
                    tool_name: "generate_image".into(),
                    reason: e.to_string(),
                })?;

        // The first part is often explanatory text; find the first part
        // that actually carries inline binary data.
        let Some(inline) = parts.iter().find_map(|p| p.as_inline_data()) else {
            return Err(ToolError::ExecutionFailed {
                tool_name: "generate_image".into(),
                reason: "no inline image data in engine response".into(),
            });
        };

        let bytes = BASE64
            .decode(&inline.data)
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "generate_image".into(),
                reason: format!("invalid image payload: {e}"),
            })?;

        tokio::fs::create_dir_all(&self.artifacts_dir)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "generate_image".into(),
                reason: e.to_string(),
            })?;

        let filename = format!("generated_{}.png", chrono::Utc::now().timestamp_millis());
        let path = self.artifacts_dir.join(filename);

        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "generate_image".into(),
                reason: e.to_string(),
            })?;

        info!(path = %path.display(), "Image saved");
        Ok(format!("{IMAGE_SENTINEL_PREFIX}{}", path.display()))
    }
}
