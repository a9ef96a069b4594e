//! Rendering command results and errors

use serde_json::{json, Value};
use std::io::Write;
use stratus_core::{ErrorCode, StratusError};
use stratus_provider::{
    CommandOutput, DeletionResult, DispatchError, InvocationResult, ResourceHandle,
    ResourceSummary,
};

/// Write `output` to `out` and return the process exit code
pub fn render(output: CommandOutput, json: bool, out: &mut impl Write) -> std::io::Result<i32> {
    match output {
        CommandOutput::Initialized(handle) => {
            if json {
                writeln!(out, "{}", to_json(&handle))?;
            } else {
                out.write_all(handle_text(&handle).as_bytes())?;
            }
            Ok(0)
        }
        CommandOutput::Invoked(result) => {
            if json {
                writeln!(out, "{}", invocation_json(&result))?;
            } else {
                if let Some(output) = &result.output {
                    out.write_all(output)?;
                }
                eprintln!("Request ID: {}", result.request_id);
                eprintln!("Log stream: {}", result.log_stream);
            }
            Ok(if result.function_error.is_some() {
                ErrorCode::ExecutionError.exit_code()
            } else {
                0
            })
        }
        CommandOutput::Listed(functions) => {
            if json {
                writeln!(out, "{}", to_json(&functions))?;
            } else {
                out.write_all(summary_table(&functions).as_bytes())?;
            }
            Ok(0)
        }
        CommandOutput::Removed(result) => {
            if json {
                writeln!(out, "{}", to_json(&result))?;
            } else {
                out.write_all(deletion_text(&result).as_bytes())?;
            }
            Ok(if result.is_complete() {
                0
            } else {
                ErrorCode::ProvisioningError.exit_code()
            })
        }
        CommandOutput::Logs(lines) => {
            for line in lines {
                if json {
                    writeln!(out, "{}", to_json(&line))?;
                } else {
                    writeln!(out, "{line}")?;
                }
            }
            Ok(0)
        }
    }
}

/// Report a failed command and return the process exit code
pub fn report_error(error: &DispatchError, json: bool, out: &mut impl Write) -> std::io::Result<i32> {
    let code = error.code();
    let (partial, resource) = match error {
        DispatchError::Provider(e) => (e.partial_handle(), e.resource()),
        DispatchError::Config(_) => (None, None),
    };

    if json {
        let mut report = StratusError::new(code, error.to_string());
        if let Some(resource) = resource {
            report = report.with_resource(resource);
        }
        let mut body: Value = serde_json::from_str(&report.to_json()).unwrap_or_else(|_| json!({}));
        if let Some(handle) = partial {
            body["partial"] = serde_json::to_value(handle).unwrap_or(Value::Null);
        }
        writeln!(out, "{body}")?;
    } else if code.is_fatal() {
        eprintln!("Error: {error}");
        if let Some(handle) = partial {
            eprintln!("Resources created before the failure:");
            eprint!("{}", handle_text(handle));
        }
    } else {
        writeln!(out, "{error}")?;
    }
    Ok(code.exit_code())
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

fn invocation_json(result: &InvocationResult) -> Value {
    json!({
        "functionName": result.function_name,
        "requestId": result.request_id,
        "statusCode": result.status_code,
        "logGroup": result.log_group,
        "logStream": result.log_stream,
        "functionError": result.function_error,
        "output": result.output.as_ref().map(|o| String::from_utf8_lossy(o).into_owned()),
    })
}

fn handle_text(handle: &ResourceHandle) -> String {
    let mut text = format!("Function: {}\n", handle.function_name);
    let fields = [
        ("ARN", &handle.function_arn),
        ("Role", &handle.role_arn),
        ("Log group", &handle.log_group),
        ("Batch environment", &handle.batch_environment),
        ("Trigger", &handle.trigger),
        ("Endpoint", &handle.api_endpoint),
    ];
    for (label, value) in fields {
        if let Some(value) = value {
            text.push_str(&format!("  {label}: {value}\n"));
        }
    }
    text
}

fn summary_table(functions: &[ResourceSummary]) -> String {
    if functions.is_empty() {
        return "No functions found\n".to_string();
    }

    let width = functions
        .iter()
        .map(|f| f.name.len())
        .max()
        .unwrap_or(0)
        .max("NAME".len());

    let mut text = format!(
        "{:<width$}  {:>6}  {:>7}  {:<9}  {}\n",
        "NAME", "MEMORY", "TIMEOUT", "TARGET", "IMAGE"
    );
    for f in functions {
        text.push_str(&format!(
            "{:<width$}  {:>6}  {:>7}  {:<9}  {}\n",
            f.name, f.memory, f.timeout, f.execution_target, f.image
        ));
    }
    text
}

fn deletion_text(result: &DeletionResult) -> String {
    let mut text = String::new();
    for deleted in &result.deleted {
        text.push_str(&format!("Deleted {} {}\n", deleted.kind, deleted.id));
    }
    for failure in &result.failures {
        text.push_str(&format!(
            "Failed to delete {} {}: {}\n",
            failure.kind, failure.id, failure.message
        ));
    }
    if text.is_empty() {
        text.push_str("Nothing to delete\n");
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratus_provider::ProviderError;

    fn summary(name: &str) -> ResourceSummary {
        ResourceSummary {
            name: name.to_string(),
            arn: format!("arn:aws:lambda:us-east-1:000000000000:function:{name}"),
            image: "alpine".to_string(),
            memory: 512,
            timeout: 300,
            runtime: "provided.al2023".to_string(),
            execution_target: "function".to_string(),
            code_sha256: String::new(),
            last_modified: String::new(),
            trigger: None,
            api_id: None,
        }
    }

    #[test]
    fn test_summary_table() {
        let table = summary_table(&[summary("blur"), summary("a-longer-name")]);
        let lines: Vec<_> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("NAME           MEMORY"));
        assert!(lines[1].starts_with("blur           "));
        assert_eq!(summary_table(&[]), "No functions found\n");
    }

    #[test]
    fn test_handle_text_skips_missing() {
        let mut handle = ResourceHandle::new("blur");
        handle.log_group = Some("/aws/lambda/blur".to_string());
        assert_eq!(
            handle_text(&handle),
            "Function: blur\n  Log group: /aws/lambda/blur\n"
        );
    }

    #[test]
    fn test_incomplete_removal_is_failure() {
        let mut result = DeletionResult::default();
        result.record("function", "f", Ok(()));
        result.record("role", "r", Err("denied".into()));

        let mut out = Vec::new();
        let code = render(CommandOutput::Removed(result), false, &mut out).unwrap();
        assert_eq!(code, ErrorCode::ProvisioningError.exit_code());
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Deleted function f"));
        assert!(text.contains("Failed to delete role r: denied"));
    }

    #[test]
    fn test_not_found_is_reported_with_success() {
        let error = DispatchError::Provider(ProviderError::NotFound("ghost".into()));
        let mut out = Vec::new();
        let code = report_error(&error, false, &mut out).unwrap();
        assert_eq!(code, 0);
        assert!(String::from_utf8(out).unwrap().contains("ghost"));
    }

    #[test]
    fn test_json_error_carries_partial_handle() {
        let mut partial = ResourceHandle::new("blur");
        partial.log_group = Some("/aws/lambda/blur".to_string());
        let error = DispatchError::Provider(ProviderError::Provisioning {
            message: "trigger failed".into(),
            partial: Box::new(partial),
        });

        let mut out = Vec::new();
        let code = report_error(&error, true, &mut out).unwrap();
        assert_eq!(code, ErrorCode::ProvisioningError.exit_code());

        let body: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(body["errorType"], "ProvisioningError");
        assert_eq!(body["resource"], "blur");
        assert_eq!(body["partial"]["log_group"], "/aws/lambda/blur");
    }

    #[test]
    fn test_json_error_names_missing_function() {
        let error = DispatchError::Provider(ProviderError::NotFound("ghost".into()));
        let mut out = Vec::new();
        report_error(&error, true, &mut out).unwrap();

        let body: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(body["errorType"], "NotFoundError");
        assert_eq!(body["resource"], "ghost");
    }
}
