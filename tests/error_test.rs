use rqscript::http::TransportError;
use rqscript::parser::{ParseError, parse_content};
use rqscript::script::ScriptError;
use rqscript::{Result, RqError};

#[test]
fn test_parse_error_display() {
    let err: RqError = parse_content("FOO bar baz\n").unwrap_err().into();
    assert!(matches!(err, RqError::Parse(ParseError::InvalidRequest { line: 1, .. })));
    assert!(err.to_string().starts_with("解析错误: invalid request at line 1"));
}

#[test]
fn test_transport_error_is_transparent() {
    let err: RqError = TransportError::InvalidUrl {
        url: "nope".to_string(),
        message: "relative URL without a base".to_string(),
    }
    .into();
    assert_eq!(
        err.to_string(),
        "无效的 URL 'nope': relative URL without a base"
    );
}

#[test]
fn test_script_error_conversion() {
    let err: RqError = ScriptError::runtime("boom").into();
    assert_eq!(err.to_string(), "脚本错误: Script runtime error: boom");
}

#[test]
fn test_result_type() {
    fn returns_error() -> Result<()> {
        Err(RqError::Other("test".to_string()))
    }

    match returns_error() {
        Err(RqError::Other(msg)) => assert_eq!(msg, "test"),
        _ => panic!("Expected Other"),
    }
}

#[test]
fn test_io_error_conversion() {
    fn read_missing() -> Result<String> {
        Ok(std::fs::read_to_string("/definitely/not/here.http")?)
    }

    assert!(matches!(read_missing(), Err(RqError::Io(_))));
}
