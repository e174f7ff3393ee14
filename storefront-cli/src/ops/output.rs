use clap::ValueEnum;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

impl OutputFormat {
    /// JSON 模式直接打印并返回 true，调用方跳过表格渲染
    pub fn emit_json<T: serde::Serialize>(self, value: &T) -> anyhow::Result<bool> {
        if self == OutputFormat::Json {
            println!("{}", serde_json::to_string_pretty(value)?);
            return Ok(true);
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::OutputFormat;
    use serde_json::json;

    #[test]
    fn table_mode_defers_to_caller() {
        assert!(!OutputFormat::Table.emit_json(&json!({"a": 1})).unwrap());
        assert!(OutputFormat::Json.emit_json(&json!({"a": 1})).unwrap());
    }
}
