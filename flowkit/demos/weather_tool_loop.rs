//! Tool loop with structured output against a scripted model.
//!
//! Run with:
//! ```bash
//! RUST_LOG=debug cargo run -p flowkit --example weather_tool_loop
//! ```

use flowkit::prelude::*;
use serde::Deserialize;
use serde_json::json;

/// Answer shape the prompt asks for.
#[derive(Debug, Deserialize)]
struct Report {
    city: String,
    advice: String,
}

#[tokio::main]
async fn main() -> Result<(), GenerateError> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let model = MockModel::new("scripted")
        .with_tool_call("get_weather", json!({"city": "Bergen"}))
        .with_text_response(r#"{"city": "Bergen", "advice": "Bring an umbrella."}"#);

    let mut registry = Registry::new();
    registry.register_model(model)?;
    registry.register_tool(SyncFunctionTool::new(
        "get_weather",
        "Current weather for a city",
        json!({"type": "object", "properties": {"city": {"type": "string"}}, "required": ["city"]}),
        |input| Ok(json!({"city": input["city"], "conditions": "rain", "celsius": 9})),
    ))?;
    registry.define_prompt(
        Prompt::builder("advisor")
            .model("scripted")
            .system("You give short, practical clothing advice.")
            .prompt("What should I wear in {{city}} today?")
            .tool("get_weather")
            .max_turns(4)
            .output_schema(json!({
                "type": "object",
                "properties": {"city": {"type": "string"}, "advice": {"type": "string"}},
                "required": ["city", "advice"]
            })),
    )?;

    let response = registry
        .run_prompt(
            "advisor",
            &json!({"city": "Bergen"}),
            GenerateOptions::new().stream(|chunk| {
                print!("{}", chunk.text());
                Ok(())
            }),
        )
        .await?;

    let report: Report = response.output_as()?;
    println!("{}: {} ({} turns, {} ms)", report.city, report.advice, response.turns, response.latency_ms);
    Ok(())
}
