//! 工具注册表
//!
//! 固定的工具目录：名称、描述、参数声明（必填 / 可选 + 粗粒度类型）。注册表只做描述与校验，
//! 不执行任何工具；执行由 ToolExecutionEngine 按名分发。

use serde_json::{Map, Value};

use crate::core::AgentError;
use crate::llm::FunctionDeclaration;
use crate::tools::schema::{
    parameters_schema, CreatePlanParams, VisitPageParams, WebSearchParams, WriteCodeParams,
};
use crate::tools::{CREATE_PLAN, VISIT_PAGE, WEB_SEARCH, WRITE_CODE};

/// 参数的粗粒度类型
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArgKind {
    String,
    /// 对象数组（如 create_plan 的 steps）
    ObjectList,
}

impl ArgKind {
    fn matches(self, value: &Value) -> bool {
        match self {
            ArgKind::String => value.is_string(),
            ArgKind::ObjectList => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_object)),
        }
    }

    fn describe(self) -> &'static str {
        match self {
            ArgKind::String => "a string",
            ArgKind::ObjectList => "a list of objects",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArgSpec {
    pub name: &'static str,
    pub kind: ArgKind,
    pub required: bool,
}

impl ArgSpec {
    pub const fn required(name: &'static str, kind: ArgKind) -> Self {
        Self {
            name,
            kind,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, kind: ArgKind) -> Self {
        Self {
            name,
            kind,
            required: false,
        }
    }
}

/// 单个工具的描述
#[derive(Clone, Debug)]
pub struct ToolSchema {
    pub name: &'static str,
    pub description: &'static str,
    pub args: Vec<ArgSpec>,
    /// 提供给模型的 JSON Schema
    pub parameters: Value,
}

impl ToolSchema {
    /// 分发前校验：必填参数存在且非 null，已给出的参数类型匹配；多余参数忽略
    pub fn validate(&self, args: &Map<String, Value>) -> Result<(), AgentError> {
        for spec in &self.args {
            match args.get(spec.name) {
                None | Some(Value::Null) if spec.required => {
                    return Err(self.argument_error(format!(
                        "missing required argument `{}`",
                        spec.name
                    )));
                }
                None | Some(Value::Null) => {}
                Some(value) if !spec.kind.matches(value) => {
                    return Err(self.argument_error(format!(
                        "argument `{}` must be {}",
                        spec.name,
                        spec.kind.describe()
                    )));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    fn argument_error(&self, message: String) -> AgentError {
        AgentError::ToolArgument {
            tool: self.name.to_string(),
            message,
        }
    }

    pub fn declaration(&self) -> FunctionDeclaration {
        FunctionDeclaration {
            name: self.name.to_string(),
            description: self.description.to_string(),
            parameters: self.parameters.clone(),
        }
    }
}

/// 工具注册表：按注册顺序保存 ToolSchema
#[derive(Clone, Debug, Default)]
pub struct ToolRegistry {
    tools: Vec<ToolSchema>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 内置目录：create_plan / web_search / visit_page / write_code
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(ToolSchema {
            name: CREATE_PLAN,
            description: "Initialize the task with a list of steps to execute.",
            args: vec![ArgSpec::required("steps", ArgKind::ObjectList)],
            parameters: parameters_schema::<CreatePlanParams>(),
        });
        registry.register(ToolSchema {
            name: WEB_SEARCH,
            description: "Search the web for a query.",
            args: vec![ArgSpec::required("query", ArgKind::String)],
            parameters: parameters_schema::<WebSearchParams>(),
        });
        registry.register(ToolSchema {
            name: VISIT_PAGE,
            description: "Visit a URL and extract text content.",
            args: vec![ArgSpec::required("url", ArgKind::String)],
            parameters: parameters_schema::<VisitPageParams>(),
        });
        registry.register(ToolSchema {
            name: WRITE_CODE,
            description: "Write a file and execute it (simulated).",
            args: vec![
                ArgSpec::required("code", ArgKind::String),
                ArgSpec::required("filename", ArgKind::String),
            ],
            parameters: parameters_schema::<WriteCodeParams>(),
        });
        registry
    }

    /// 同名覆盖
    pub fn register(&mut self, schema: ToolSchema) {
        match self.tools.iter_mut().find(|t| t.name == schema.name) {
            Some(existing) => *existing = schema,
            None => self.tools.push(schema),
        }
    }

    pub fn describe(&self, name: &str) -> Result<&ToolSchema, AgentError> {
        self.tools
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| AgentError::UnknownTool(name.to_string()))
    }

    pub fn tool_names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|t| t.name).collect()
    }

    pub fn declarations(&self) -> Vec<FunctionDeclaration> {
        self.tools.iter().map(ToolSchema::declaration).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_describe_known_and_unknown() {
        let registry = ToolRegistry::builtin();
        assert_eq!(
            registry.tool_names(),
            vec!["create_plan", "web_search", "visit_page", "write_code"]
        );
        assert_eq!(registry.describe("web_search").unwrap().args.len(), 1);
        assert_eq!(
            registry.describe("rm_rf").unwrap_err(),
            AgentError::UnknownTool("rm_rf".to_string())
        );
    }

    #[test]
    fn test_validate_missing_required() {
        let registry = ToolRegistry::builtin();
        let schema = registry.describe("write_code").unwrap();
        let err = schema
            .validate(&args(json!({"code": "print(1)"})))
            .unwrap_err();
        match err {
            AgentError::ToolArgument { tool, message } => {
                assert_eq!(tool, "write_code");
                assert!(message.contains("filename"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(schema
            .validate(&args(json!({"code": "x", "filename": null})))
            .is_err());
    }

    #[test]
    fn test_validate_wrong_type() {
        let registry = ToolRegistry::builtin();
        let plan = registry.describe("create_plan").unwrap();
        assert!(plan.validate(&args(json!({"steps": "one, two"}))).is_err());
        assert!(plan.validate(&args(json!({"steps": [1, 2]}))).is_err());
        assert!(plan
            .validate(&args(json!({"steps": [{"title": "a"}]})))
            .is_ok());

        let search = registry.describe("web_search").unwrap();
        assert!(search.validate(&args(json!({"query": 42}))).is_err());
        assert!(search
            .validate(&args(json!({"query": "rust", "extra": true})))
            .is_ok());
    }

    #[test]
    fn test_optional_arg_may_be_absent() {
        let mut registry = ToolRegistry::new();
        registry.register(ToolSchema {
            name: "note",
            description: "test tool",
            args: vec![ArgSpec::optional("text", ArgKind::String)],
            parameters: json!({"type": "object"}),
        });
        let schema = registry.describe("note").unwrap();
        assert!(schema.validate(&Map::new()).is_ok());
        assert!(schema.validate(&args(json!({"text": 1}))).is_err());
    }

    #[test]
    fn test_declarations_follow_registration_order() {
        let decls = ToolRegistry::builtin().declarations();
        assert_eq!(decls.len(), 4);
        assert_eq!(decls[0].name, "create_plan");
        assert_eq!(decls[3].parameters["required"], json!(["code", "filename"]));
    }
}
