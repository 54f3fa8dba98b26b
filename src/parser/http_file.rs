use crate::http::Method;
use crate::parser::script::parse_script;
use crate::parser::types::{
    Header, ParseError, ParseResult, ParsedFile, ParsedRequest, REQUEST_SEPARATOR,
};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;

fn request_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(GET|POST|PUT|DELETE|PATCH|OPTIONS|HEAD)\s+(.+)$").unwrap())
}

fn header_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([^:]+):\s*(.*)").unwrap())
}

/// 逐行读取文档，支持向前查看一行
pub struct LineReader<'a> {
    lines: Vec<&'a str>,
    pos: usize,
}

impl<'a> LineReader<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines().collect(),
            pos: 0,
        }
    }

    pub fn next_line(&mut self) -> Option<&'a str> {
        let line = self.lines.get(self.pos).copied()?;
        self.pos += 1;
        Some(line)
    }

    pub fn peek(&self) -> Option<&'a str> {
        self.lines.get(self.pos).copied()
    }

    /// 最近一次读取的行号（从 1 开始）
    pub fn line_number(&self) -> usize {
        self.pos
    }
}

/// 正在解析中的请求
#[derive(Debug, Default)]
struct Draft {
    name: Option<String>,
    pre_request_script: Option<String>,
    post_request_script: Option<String>,
    method: Option<Method>,
    url: String,
    headers: Vec<Header>,
    headers_parsed: bool,
    body: String,
    line_number: usize,
}

impl Draft {
    fn new(line_number: usize) -> Self {
        Self {
            line_number,
            ..Self::default()
        }
    }

    fn named(name: &str, line_number: usize) -> Self {
        Self {
            name: non_empty(name.trim().to_string()),
            line_number,
            ..Self::default()
        }
    }

    fn finish(self) -> ParseResult<Option<ParsedRequest>> {
        let Some(method) = self.method else {
            if self.name.is_none() && self.pre_request_script.is_none() {
                // 空白块（例如文件末尾的 ###）不产生请求
                return Ok(None);
            }
            return Err(ParseError::MissingRequestLine {
                line: self.line_number,
            });
        };

        Ok(Some(ParsedRequest {
            name: self.name,
            pre_request_script: self.pre_request_script,
            post_request_script: self.post_request_script,
            method,
            url: self.url,
            headers: self.headers,
            body: self.body,
            skip: false,
            line_number: self.line_number,
        }))
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}

/// HTTP 文件解析器
pub struct HttpFileParser;

impl HttpFileParser {
    /// 从文件路径解析，脚本文件相对于该文件所在目录解析
    pub fn parse_file<P: AsRef<Path>>(path: P) -> ParseResult<ParsedFile> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let parsed = Self::parse_content_in(&content, base_dir)?;
        Ok(parsed.with_source_path(path.to_path_buf()))
    }

    /// 从字符串内容解析，脚本文件相对于当前目录解析
    pub fn parse_content(content: &str) -> ParseResult<ParsedFile> {
        Self::parse_content_in(content, Path::new("."))
    }

    /// 从字符串内容解析，脚本文件相对于 `base_dir` 解析
    pub fn parse_content_in(content: &str, base_dir: &Path) -> ParseResult<ParsedFile> {
        let mut state = ParserState {
            base_dir: base_dir.to_path_buf(),
            lines: LineReader::new(content),
            file: ParsedFile::new(),
            draft: None,
        };
        state.run()?;
        debug!(requests = state.file.len(), "parsed document");
        Ok(state.file)
    }
}

struct ParserState<'a> {
    base_dir: PathBuf,
    lines: LineReader<'a>,
    file: ParsedFile,
    draft: Option<Draft>,
}

impl ParserState<'_> {
    fn run(&mut self) -> ParseResult<()> {
        while let Some(line) = self.lines.next_line() {
            let line_number = self.lines.line_number();

            if let Some(name) = line.strip_prefix(REQUEST_SEPARATOR) {
                self.finish_draft()?;
                self.draft = Some(Draft::named(name, line_number));
                continue;
            }

            let draft = self.draft.get_or_insert_with(|| Draft::new(line_number));

            // 请求行之前：请求前脚本、空行、请求行
            if draft.method.is_none() {
                if line.trim_start().starts_with('<') {
                    if let Some(script) = parse_script(line, &mut self.lines, &self.base_dir)? {
                        draft.pre_request_script = non_empty(script);
                        continue;
                    }
                }
                if line.trim().is_empty() {
                    continue;
                }
                parse_request_line(draft, line, line_number)?;
                continue;
            }

            // 请求行之后的第一行总是作为 header 块的开头被消费，
            // 即使它是空行或不是 header；每个请求只解析一次
            if !draft.headers_parsed {
                draft.headers_parsed = true;
                parse_headers(draft, line, &mut self.lines);
                continue;
            }

            if line.is_empty() {
                continue;
            }

            // 第一个请求后脚本生效后，该请求剩余的行都被忽略
            if draft.post_request_script.is_some() {
                continue;
            }

            if line.trim_start().starts_with('<') {
                if let Some(script) = parse_script(line, &mut self.lines, &self.base_dir)? {
                    draft.post_request_script = non_empty(script);
                    continue;
                }
            }

            draft.body.push_str(line);
            draft.body.push('\n');
        }

        self.finish_draft()
    }

    fn finish_draft(&mut self) -> ParseResult<()> {
        if let Some(draft) = self.draft.take() {
            if let Some(request) = draft.finish()? {
                debug!(
                    name = %request.display_name(),
                    line = request.line_number,
                    "parsed request"
                );
                self.file.add_request(request);
            }
        }
        Ok(())
    }
}

/// 解析请求行（方法 + URL）
fn parse_request_line(draft: &mut Draft, line: &str, line_number: usize) -> ParseResult<()> {
    if draft.method.is_some() {
        return Err(ParseError::InvalidRequest {
            line: line_number,
            content: line.to_string(),
            reason: "request method and target have already been parsed".to_string(),
        });
    }

    let invalid = |reason: &str| ParseError::InvalidRequest {
        line: line_number,
        content: line.to_string(),
        reason: reason.to_string(),
    };

    let caps = request_line_regex()
        .captures(line)
        .ok_or_else(|| invalid("request does not include method or URL"))?;
    let url = caps[2].trim_end();
    if url.is_empty() {
        return Err(invalid("request does not include a URL"));
    }
    let method = caps[1]
        .parse::<Method>()
        .map_err(|e| invalid(&e.to_string()))?;

    draft.method = Some(method);
    draft.url = url.to_string();
    Ok(())
}

/// 解析 header 块
///
/// `first` 是请求行之后的第一行，调用方已经消费它；不是 header 时整个块为空。
/// 之后的行只在匹配 header 时才被读取，结束 header 块的行留给调用方。
fn parse_headers(draft: &mut Draft, first: &str, lines: &mut LineReader<'_>) {
    let Some(header) = parse_header(first) else {
        return;
    };
    draft.headers.push(header);

    while let Some(next) = lines.peek() {
        if next.starts_with(REQUEST_SEPARATOR) {
            break;
        }
        let Some(header) = parse_header(next) else {
            break;
        };
        draft.headers.push(header);
        lines.next_line();
    }
}

/// 解析 header 行
fn parse_header(line: &str) -> Option<Header> {
    let caps = header_regex().captures(line)?;
    Some(Header::new(&caps[1], &caps[2]))
}
