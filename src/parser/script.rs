//! 脚本块子语法
//!
//! 以 `<` 开头的行可能引入一个脚本：
//! - `< path/to/script.js`：读取整个文件作为脚本
//! - `< {% code %}`：单行内联脚本
//! - `< {% code` ... `code %}`：多行内联脚本
//!
//! 不符合以上任何形式时返回 `None`，调用方按普通内容处理该行。

use crate::parser::http_file::LineReader;
use crate::parser::types::{ParseError, ParseResult};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;

fn file_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^<\s*([^{\s].*\.js)\s*$").unwrap())
}

fn one_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^<\s*\{%(.*)%\}").unwrap())
}

fn start_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^<\s*\{%(.*)").unwrap())
}

fn end_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(.*)%\}").unwrap())
}

/// 尝试从 `line` 开始解析一个脚本块
///
/// 多行形式会继续从 `lines` 中读取，直到遇到 `%}` 或输入结束。
pub fn parse_script(
    line: &str,
    lines: &mut LineReader<'_>,
    base_dir: &Path,
) -> ParseResult<Option<String>> {
    let line = line.trim();

    if let Some(caps) = file_regex().captures(line) {
        let path = resolve_path(base_dir, caps[1].trim());
        debug!(path = %path.display(), "loading script file");
        let script = std::fs::read_to_string(&path)
            .map_err(|source| ParseError::ScriptFile { path, source })?;
        return Ok(Some(script));
    }

    if let Some(caps) = one_line_regex().captures(line) {
        return Ok(Some(caps[1].trim().to_string()));
    }

    let Some(caps) = start_regex().captures(line) else {
        return Ok(None);
    };

    let mut fragments = Vec::new();
    let first = caps[1].trim();
    if !first.is_empty() {
        fragments.push(first.to_string());
    }

    while let Some(next) = lines.next_line() {
        let next = next.trim();
        if let Some(end) = end_regex().captures(next) {
            let last = end[1].trim();
            if !last.is_empty() {
                fragments.push(last.to_string());
            }
            return Ok(Some(fragments.join("\n")));
        }
        fragments.push(next.to_string());
    }

    // 没有结束标记，输入结束时关闭脚本块
    Ok(Some(fragments.join("\n")))
}

/// 相对路径基于 `base_dir` 解析，绝对路径保持不变
pub fn resolve_path(base_dir: &Path, file: &str) -> PathBuf {
    let path = Path::new(file);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}
