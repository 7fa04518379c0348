//! Tests for the tool system.

use serde_json::json;

use tandem::tools::*;

fn object(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    value.as_object().cloned().unwrap_or_default()
}

#[test]
fn parameter_builder_constructs_schema() {
    let params = ToolParameters::object()
        .string("query", "Search query", true)
        .number("limit", "Max results", false)
        .boolean("verbose", "Enable verbose output", false)
        .build();

    let schema = &params.schema;
    assert_eq!(schema["type"], "object");
    assert_eq!(schema["properties"]["query"]["type"], "string");
    assert_eq!(schema["properties"]["limit"]["type"], "number");
    assert_eq!(schema["required"].as_array().unwrap().len(), 1);
}

#[test]
fn parameter_builder_string_enum() {
    let params = ToolParameters::object()
        .string_enum("format", "Output format", &["json", "text", "csv"], true)
        .build();

    let enums = params.schema["properties"]["format"]["enum"]
        .as_array()
        .unwrap();
    assert_eq!(enums.len(), 3);
}

#[test]
fn empty_parameters() {
    let params = ToolParameters::empty();
    assert_eq!(params.schema["type"], "object");
}

#[test]
fn tool_arguments_typed_getters() {
    let args = ToolArguments::new(object(json!({ "name": "Alice", "age": 30, "active": true })));

    assert_eq!(args.get_str("name").unwrap(), "Alice");
    assert_eq!(args.get_i64("age").unwrap(), 30);
    assert!(args.get_bool("active").unwrap());
    assert!(args.get_str("missing").is_err());
    assert_eq!(args.get_str_opt("missing"), None);
}

#[test]
fn tool_arguments_merge_input_over_defaults() {
    let args = ToolArguments::merged(
        object(json!({ "units": "metric", "days": 1 })),
        &object(json!({ "days": 3, "city": "Oslo" })),
    );

    assert_eq!(args.get_str("units").unwrap(), "metric");
    assert_eq!(args.get_i64("days").unwrap(), 3);
    assert_eq!(args.get_str("city").unwrap(), "Oslo");
}

#[test]
fn tool_arguments_deserialize() {
    #[derive(serde::Deserialize, PartialEq, Debug)]
    struct Params {
        query: String,
        limit: Option<u32>,
    }

    let args = ToolArguments::new(object(json!({ "query": "rust", "limit": 10 })));
    let params: Params = args.deserialize().unwrap();
    assert_eq!(params.query, "rust");
    assert_eq!(params.limit, Some(10));
}

#[tokio::test]
async fn agent_tool_executes() {
    let tool = AgentTool::new(
        "greet",
        "Greet a person",
        ToolParameters::object().string("name", "Name", true).build(),
        |args, _ctx| async move {
            let name = args.get_str("name")?;
            Ok(json!({ "greeting": format!("Hello, {}!", name) }))
        },
    );

    assert_eq!(tool.name(), "greet");
    assert_eq!(tool.description(), "Greet a person");

    let args = ToolArguments::new(object(json!({ "name": "World" })));
    let result = tool
        .execute(&args, &ToolExecutionContext::default())
        .await
        .unwrap();
    assert_eq!(result["greeting"], "Hello, World!");
}

#[test]
fn registry_advertises_sorted_definitions() {
    let noop = |name: &str| {
        AgentTool::new(name, format!("{name} tool"), ToolParameters::empty(), |_args, _ctx| async {
            Ok(json!(null))
        })
    };
    let registry = InMemoryToolRegistry::new()
        .with_tool(noop("search"))
        .with_tool(noop("calculate"));

    let names: Vec<_> = registry
        .definitions()
        .into_iter()
        .map(|definition| definition.name)
        .collect();

    assert_eq!(names, vec!["calculate", "search"]);
    assert!(registry.get("search").is_some());
    assert!(registry.get("weather").is_none());
    assert_eq!(registry.len(), 2);
}
