//! `ai_chat` nodes

use super::config_str;
use crate::error::{EngineError, Result};
use crate::expression::render;
use crate::models::Context;
use crate::services::{CompletionProvider, ModelConfig};
use serde_json::{Map, Value};
use tracing::debug;

pub(super) async fn execute(
    provider: &dyn CompletionProvider,
    config: &Map<String, Value>,
    context: &Context,
) -> Result<Context> {
    let prompt = render(config_str(config, "prompt").unwrap_or_default(), context);
    let model = ModelConfig::from_value(config.get("model"));

    let completion = provider
        .complete(&prompt, &model)
        .await
        .map_err(|e| match e {
            EngineError::Provider(_) => e,
            other => EngineError::Provider(other.to_string()),
        })?;

    debug!(
        model = %model.display_name(),
        tokens_used = completion.tokens_used,
        "Completion received"
    );

    let mut output = Map::new();
    output.insert("response".into(), Value::String(completion.text));
    output.insert("model".into(), Value::String(model.display_name().to_string()));
    output.insert("tokens_used".into(), Value::from(completion.tokens_used));
    output.insert("cost".into(), Value::from(completion.cost));
    Ok(output)
}
