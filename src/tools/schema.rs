//! 工具参数 JSON Schema 生成（schemars）
//!
//! 下面的结构体只用于生成提供给模型的 parameters schema；字段文档即参数描述。
//! 实际执行时的参数校验由 ToolRegistry 的 ArgSpec 完成。

use schemars::gen::SchemaSettings;
use schemars::JsonSchema;
use serde_json::Value;

#[allow(dead_code)]
#[derive(JsonSchema)]
pub(crate) struct PlanStepParams {
    /// Short title of the step
    pub title: String,
    /// Detailed description
    pub description: String,
}

#[allow(dead_code)]
#[derive(JsonSchema)]
pub(crate) struct CreatePlanParams {
    /// Ordered list of steps to execute
    pub steps: Vec<PlanStepParams>,
}

#[allow(dead_code)]
#[derive(JsonSchema)]
pub(crate) struct WebSearchParams {
    /// The search query
    pub query: String,
}

#[allow(dead_code)]
#[derive(JsonSchema)]
pub(crate) struct VisitPageParams {
    /// The URL to visit
    pub url: String,
}

#[allow(dead_code)]
#[derive(JsonSchema)]
pub(crate) struct WriteCodeParams {
    /// The code to execute
    pub code: String,
    /// Filename to save as
    pub filename: String,
}

/// 生成内联（无 $ref）的参数 schema，去掉顶层 $schema / title
pub(crate) fn parameters_schema<T: JsonSchema>() -> Value {
    let generator = SchemaSettings::draft07()
        .with(|s| {
            s.inline_subschemas = true;
            s.meta_schema = None;
        })
        .into_generator();
    let root = generator.into_root_schema_for::<T>();
    let mut value = serde_json::to_value(root).unwrap_or_else(|_| serde_json::json!({}));
    if let Value::Object(map) = &mut value {
        map.remove("title");
        map.remove("$schema");
        map.remove("definitions");
    }
    value
}
