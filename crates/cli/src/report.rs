use cmdtree_argparse::{ParseError, ParseResult, Value};
use indexmap::IndexMap;
use serde::Serialize;

/// JSON view of one parse, as printed by `cmdtree parse`.
#[derive(Debug, Serialize)]
pub struct ParseReport {
    pub command: Vec<String>,
    #[serde(rename = "match")]
    pub matched: String,
    pub arguments: IndexMap<String, Value>,
    pub options: IndexMap<String, Value>,
    pub rest: Vec<String>,
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit: Option<i32>,
}

impl ParseReport {
    pub fn from_result(result: &ParseResult) -> Self {
        Self {
            command: result.commands().into_iter().map(str::to_string).collect(),
            matched: result.matched.clone(),
            arguments: result.arguments().to_map(),
            options: result.options().to_map(),
            rest: result.rest.clone(),
            errors: result.errors.iter().map(ToString::to_string).collect(),
            exit: None,
        }
    }

    /// A report for input rejected before parsing started.
    pub fn rejected(root: &str, errors: &[ParseError]) -> Self {
        Self {
            command: vec![root.to_string()],
            matched: root.to_string(),
            arguments: IndexMap::new(),
            options: IndexMap::new(),
            rest: Vec::new(),
            errors: errors.iter().map(ToString::to_string).collect(),
            exit: None,
        }
    }

    /// A report for a run an option handler ended.
    pub fn exited(root: &str, code: i32) -> Self {
        Self {
            exit: Some(code),
            ..Self::rejected(root, &[])
        }
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty() && self.exit.is_none_or(|code| code == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use cmdtree_argparse::{ArgumentSpec, Command, ParseOutcome, parse};
    use serde_json::json;

    #[tokio::test]
    async fn report_uses_match_key_and_bulk_maps() {
        let mut cp = Command::new("cp");
        cp.add_argument(ArgumentSpec::new("src")).unwrap();
        cp.add_option(ArgumentSpec::new("--force").alias("-f")).unwrap();
        let cp = Arc::new(cp);

        let ParseOutcome::Parsed(result) = parse(&cp, &["a.txt", "-f"]).await.unwrap() else {
            panic!("no handlers declared");
        };
        let report = serde_json::to_value(ParseReport::from_result(&result)).unwrap();
        assert_eq!(
            report,
            json!({
                "command": ["cp"],
                "match": "cp",
                "arguments": { "src": "a.txt" },
                "options": { "force": true },
                "rest": [],
                "errors": []
            })
        );
    }

    #[test]
    fn rejected_input_is_not_ok() {
        let report = ParseReport::rejected("cp", &[ParseError::BareDash]);
        assert!(!report.is_ok());
        assert_eq!(report.errors, vec!["a bare '-' is not a valid argument"]);
        assert!(ParseReport::exited("cp", 0).is_ok());
        assert!(!ParseReport::exited("cp", 2).is_ok());
    }
}
