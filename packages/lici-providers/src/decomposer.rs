use std::time::Duration;

use color_eyre::{Result, eyre};
use reqwest::Client;
use serde_json::Value;

/// One call to the query-understanding service. Sends chat-style
/// messages and parses the reply content as a JSON object. Retrying
/// and the literal-query fallback live in the service layer; this is a
/// single attempt so the shared retry policy stays in charge.
pub async fn decompose(cfg: &lici_config::LlmProviderConfig, messages: &[Value]) -> Result<Value> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"messages": messages,
	});
	let res = client
		.post(&url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_decomposer_json(json)
}

fn parse_decomposer_json(json: Value) -> Result<Value> {
	if let Some(content) = json
		.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|msg| msg.get("content"))
		.and_then(|c| c.as_str())
	{
		let parsed: Value = serde_json::from_str(content)
			.map_err(|_| eyre::eyre!("Decomposer content is not valid JSON."))?;

		if !parsed.is_object() {
			return Err(eyre::eyre!("Decomposer content is not a JSON object."));
		}

		return Ok(parsed);
	}

	if json.is_object() && json.get("search_terms").is_some() {
		return Ok(json);
	}

	Err(eyre::eyre!("Decomposer response is missing JSON content."))
}
