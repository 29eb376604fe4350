use super::*;
use serde_json::json;

// =============================================================================
// LANGUAGE MAP
// =============================================================================

#[test]
fn language_spec_pins_every_supported_language() {
    for language in SUPPORTED_LANGUAGES {
        let spec = language_spec(language).expect("supported language should map");
        assert_eq!(spec.language, language);
        assert!(!spec.version.is_empty());
        assert!(!spec.file_name.is_empty());
    }
}

#[test]
fn language_spec_versions_match_pins() {
    assert_eq!(language_spec("javascript").unwrap().version, "18.15.0");
    assert_eq!(language_spec("typescript").unwrap().version, "5.0.3");
    assert_eq!(language_spec("python").unwrap().version, "3.10.0");
    assert_eq!(language_spec("cpp").unwrap().version, "10.2.0");
    assert_eq!(language_spec("java").unwrap().version, "15.0.2");
}

#[test]
fn language_spec_rejects_unknown() {
    assert!(language_spec("cobol").is_none());
    assert!(language_spec("").is_none());
    // Case-sensitive on purpose: the editor sends lowercase identifiers.
    assert!(language_spec("Python").is_none());
}

#[test]
fn java_entrypoint_is_capitalized() {
    // Piston compiles Java by class name, so the file must be Main.java.
    assert_eq!(language_spec("java").unwrap().file_name, "Main.java");
}

#[test]
fn filter_supported_drops_unpinned_runtimes() {
    let runtimes = vec![
        Runtime { language: "javascript".into(), version: "18.15.0".into(), aliases: vec!["node".into()] },
        Runtime { language: "brainfuck".into(), version: "2.7.3".into(), aliases: vec![] },
        Runtime { language: "python".into(), version: "3.10.0".into(), aliases: vec!["py".into()] },
    ];

    let kept = filter_supported(runtimes);
    let languages: Vec<&str> = kept.iter().map(|r| r.language.as_str()).collect();
    assert_eq!(languages, vec!["javascript", "python"]);
}

// =============================================================================
// RESPONSE PARSING
// =============================================================================

#[test]
fn parse_successful_run() {
    let body = json!({
        "run": { "stdout": "Hello, World!\n", "stderr": "", "code": 0, "signal": null }
    })
    .to_string();

    let result = parse_execute_response(&body, "python", "3.10.0").expect("parse");
    assert_eq!(result.stdout, "Hello, World!\n");
    assert_eq!(result.stderr, "");
    assert_eq!(result.exit_code, 0);
    assert!(result.signal.is_none());
    assert_eq!(result.language, "python");
    assert_eq!(result.version, "3.10.0");
}

#[test]
fn parse_prefers_run_stderr_over_compile() {
    let body = json!({
        "compile": { "stdout": "", "stderr": "warning: unused variable", "code": 0 },
        "run": { "stdout": "", "stderr": "panic at runtime", "code": 1 }
    })
    .to_string();

    let result = parse_execute_response(&body, "cpp", "10.2.0").expect("parse");
    assert_eq!(result.stderr, "panic at runtime");
    assert_eq!(result.exit_code, 1);
}

#[test]
fn parse_falls_back_to_compile_stderr() {
    let body = json!({
        "compile": { "stdout": "", "stderr": "main.cpp:3: error: expected ';'", "code": 1 },
        "run": { "stdout": "", "stderr": "", "code": 0 }
    })
    .to_string();

    let result = parse_execute_response(&body, "cpp", "10.2.0").expect("parse");
    assert_eq!(result.stderr, "main.cpp:3: error: expected ';'");
    assert_eq!(result.exit_code, 1);
}

#[test]
fn parse_exit_code_prefers_run_stage() {
    let body = json!({
        "compile": { "code": 1 },
        "run": { "code": 139, "signal": "SIGSEGV" }
    })
    .to_string();

    let result = parse_execute_response(&body, "cpp", "10.2.0").expect("parse");
    assert_eq!(result.exit_code, 139);
    assert_eq!(result.signal.as_deref(), Some("SIGSEGV"));
}

#[test]
fn parse_missing_stages_defaults_to_empty_success() {
    let result = parse_execute_response("{}", "javascript", "18.15.0").expect("parse");
    assert_eq!(result.stdout, "");
    assert_eq!(result.stderr, "");
    assert_eq!(result.exit_code, 0);
}

#[test]
fn parse_rejects_invalid_json() {
    let err = parse_execute_response("<html>502</html>", "python", "3.10.0").expect_err("should fail");
    assert!(matches!(err, ExecutionError::Parse(_)));
}

#[test]
fn execution_result_serializes_camel_case() {
    let result = ExecutionResult {
        stdout: "ok".into(),
        stderr: String::new(),
        exit_code: 0,
        signal: None,
        language: "python".into(),
        version: "3.10.0".into(),
    };

    let value = serde_json::to_value(&result).expect("serialize");
    assert_eq!(value.get("exitCode").and_then(serde_json::Value::as_i64), Some(0));
    // Absent signal is omitted, not null.
    assert!(value.get("signal").is_none());
}

// =============================================================================
// ERROR CODES
// =============================================================================

#[test]
fn execution_errors_carry_codes() {
    use crate::protocol::ErrorCode;

    assert_eq!(ExecutionError::UnsupportedLanguage("cobol".into()).error_code(), "E_UNSUPPORTED_LANGUAGE");
    assert_eq!(ExecutionError::Timeout.error_code(), "E_EXEC_TIMEOUT");
    assert_eq!(ExecutionError::Upstream { status: 502, body: String::new() }.error_code(), "E_EXEC_UPSTREAM");
}

#[test]
fn transient_errors_are_retryable() {
    use crate::protocol::ErrorCode;

    assert!(ExecutionError::Timeout.retryable());
    assert!(ExecutionError::Upstream { status: 503, body: String::new() }.retryable());
    assert!(ExecutionError::Request("connection reset".into()).retryable());
    assert!(!ExecutionError::UnsupportedLanguage("cobol".into()).retryable());
    assert!(!ExecutionError::Parse("bad json".into()).retryable());
}
