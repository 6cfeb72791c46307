use std::sync::LazyLock;

use regex::Regex;

use super::{estimate_tokens, Document, Splitter};
use crate::types::{meta_keys, Fragment};

static CLASS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        ^\s*
        (?:@\w+(?:\([^)]*\))?\s*)*
        (?:(?:public|private|protected|static|final|abstract|sealed|non-sealed|strictfp)\s+)*
        (?:class|interface|enum|@\s*interface)\s+
        (\w+)
        ",
    )
    .expect("class declaration regex is valid")
});

static METHOD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        ^\s*
        (?:@\w+(?:\([^)]*\))?\s*)*
        (?:(?:public|private|protected|static|final|synchronized|abstract|native|default|strictfp)\s+)*
        (?:<[^>]+>\s*)?
        [\w.\[\]<>,?\s]+?\s+
        ([A-Za-z_$][\w$]*)
        \s*\(([^()]*)\)
        \s*(?:throws\s+[\w.,\s<>]+)?
        \s*\{\s*$
        ",
    )
    .expect("method declaration regex is valid")
});

const CONTROL_KEYWORDS: &[&str] = &[
    "if", "for", "while", "switch", "catch", "synchronized", "else", "do", "try", "finally",
];

/// Per-file Java splitter. Scans lines while tracking brace depth so that no
/// fragment ever splits the interior of a method (§4.1). There is no AST: a
/// hand-rolled regex + brace-depth scanner plays the role a framework would
/// give a proper parser, matching this crate's existing preference for
/// narrow, purpose-built text scanning over pulling in a full parser for one
/// job (see `processing::parser`'s tag stripping).
pub struct JavaSplitter {
    max_tokens: usize,
}

enum Segment {
    Method { name: String, lines: Vec<String> },
    Other { lines: Vec<String> },
}

impl Segment {
    fn text(&self) -> String {
        match self {
            Segment::Method { lines, .. } => lines.join("\n"),
            Segment::Other { lines } => lines.join("\n"),
        }
    }
}

impl JavaSplitter {
    pub fn new(max_tokens: usize) -> Self {
        Self { max_tokens: max_tokens.max(1) }
    }

    /// Net brace delta for a line, ignoring braces inside string/char
    /// literals. `in_block_comment` is threaded across lines by the caller.
    fn brace_delta(line: &str, in_block_comment: &mut bool) -> i32 {
        let mut delta = 0;
        let mut chars = line.chars().peekable();
        let mut in_string = false;
        let mut in_char = false;

        while let Some(c) = chars.next() {
            if *in_block_comment {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    *in_block_comment = false;
                }
                continue;
            }
            if in_string {
                if c == '\\' {
                    chars.next();
                } else if c == '"' {
                    in_string = false;
                }
                continue;
            }
            if in_char {
                if c == '\\' {
                    chars.next();
                } else if c == '\'' {
                    in_char = false;
                }
                continue;
            }
            match c {
                '/' if chars.peek() == Some(&'/') => break,
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    *in_block_comment = true;
                }
                '"' => in_string = true,
                '\'' => in_char = true,
                '{' => delta += 1,
                '}' => delta -= 1,
                _ => {}
            }
        }
        delta
    }

    fn extract_class_name(lines: &[&str]) -> Option<String> {
        lines.iter().find_map(|line| {
            CLASS_RE.captures(line).map(|c| c[1].to_string())
        })
    }

    fn method_name_if_boundary(line: &str) -> Option<String> {
        let captures = METHOD_RE.captures(line)?;
        let name = captures[1].to_string();
        if CONTROL_KEYWORDS.contains(&name.as_str()) {
            return None;
        }
        Some(name)
    }
}

impl Splitter for JavaSplitter {
    fn split(&self, document: &Document) -> Vec<Fragment> {
        let lines: Vec<&str> = document.content.lines().collect();
        if lines.is_empty() {
            return Vec::new();
        }

        let class_name = Self::extract_class_name(&lines).unwrap_or_else(|| "UnknownClass".to_string());

        // Header: package, imports, annotations and the class declaration up
        // to and including the line that first opens the class body.
        let mut header_lines: Vec<String> = Vec::new();
        let mut depth = 0i32;
        let mut in_block_comment = false;
        let mut body_start = lines.len();

        for (i, line) in lines.iter().enumerate() {
            header_lines.push((*line).to_string());
            let delta = Self::brace_delta(line, &mut in_block_comment);
            depth += delta;
            if depth >= 1 {
                body_start = i + 1;
                break;
            }
        }

        if body_start >= lines.len() {
            // No class body ever opened (e.g. a fragment of Java with no
            // braces at all) — treat the whole file as one header fragment.
            let content = document.content.clone();
            if content.trim().is_empty() {
                return Vec::new();
            }
            return vec![fragment_for(&content, &class_name, None, document, true)];
        }

        // Body: walk the remaining lines collecting Method/Other segments,
        // tracking depth relative to the class body (currently at depth 1).
        let mut segments: Vec<Segment> = Vec::new();
        let mut current_method: Option<(String, Vec<String>, i32)> = None;
        let mut other_buf: Vec<String> = Vec::new();

        for line in &lines[body_start..] {
            if depth == 1 {
                if let Some(name) = Self::method_name_if_boundary(line) {
                    if !other_buf.is_empty() {
                        segments.push(Segment::Other { lines: std::mem::take(&mut other_buf) });
                    }
                    current_method = Some((name, vec![(*line).to_string()], depth));
                    let delta = Self::brace_delta(line, &mut in_block_comment);
                    depth += delta;
                    if depth <= 1 {
                        // one-line method body: `void f() { }`
                        if let Some((name, lines, _)) = current_method.take() {
                            segments.push(Segment::Method { name, lines });
                        }
                    }
                    continue;
                }
            }

            let delta = Self::brace_delta(line, &mut in_block_comment);

            if let Some((_, ref mut lines, base_depth)) = current_method {
                lines.push((*line).to_string());
                depth += delta;
                if depth <= base_depth {
                    if let Some((name, lines, _)) = current_method.take() {
                        segments.push(Segment::Method { name, lines });
                    }
                }
            } else {
                other_buf.push((*line).to_string());
                depth += delta;
            }
        }

        if let Some((name, lines, _)) = current_method.take() {
            segments.push(Segment::Method { name, lines });
        }
        if !other_buf.is_empty() {
            segments.push(Segment::Other { lines: other_buf });
        }

        pack_segments(&header_lines.join("\n"), segments, &class_name, self.max_tokens, document)
    }
}

fn condensed_context(header: &str, class_name: &str) -> String {
    let carried: Vec<&str> = header
        .lines()
        .filter(|l| {
            let t = l.trim_start();
            t.starts_with("package ") || CLASS_RE.is_match(l)
        })
        .collect();
    let mut block = carried.join("\n");
    if !block.is_empty() {
        block.push('\n');
    }
    block.push_str(&format!("// ...continued from {}...", class_name));
    block
}

fn pack_segments(
    header: &str,
    segments: Vec<Segment>,
    class_name: &str,
    max_tokens: usize,
    document: &Document,
) -> Vec<Fragment> {
    let mut fragments = Vec::new();
    let mut current = header.to_string();
    let mut current_method_name: Option<String> = None;
    let mut current_segment_count = 0usize;
    let is_first_ref = std::cell::Cell::new(true);

    let flush = |current: &mut String,
                 current_method_name: &mut Option<String>,
                 current_segment_count: &mut usize,
                 fragments: &mut Vec<Fragment>| {
        if !current.trim().is_empty() {
            let is_first = is_first_ref.get();
            fragments.push(fragment_for(current, class_name, current_method_name.clone(), document, is_first));
            is_first_ref.set(false);
        }
        *current = condensed_context(header, class_name);
        *current_method_name = None;
        *current_segment_count = 0;
    };

    for segment in segments {
        let text = segment.text();
        let seg_tokens = estimate_tokens(&text);
        let cur_tokens = estimate_tokens(&current);

        if cur_tokens > estimate_tokens(header) && cur_tokens + seg_tokens > max_tokens {
            flush(&mut current, &mut current_method_name, &mut current_segment_count, &mut fragments);
        }

        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(&text);
        current_segment_count += 1;

        match &segment {
            Segment::Method { name, .. } => {
                if current_segment_count == 1 {
                    current_method_name = Some(name.clone());
                } else {
                    current_method_name = None;
                }
            }
            Segment::Other { .. } => {
                current_method_name = None;
            }
        }

        // Boundary preservation dominates: an oversized method is still
        // emitted whole, even past the budget; flush right after it so the
        // next segment starts fresh.
        if seg_tokens > max_tokens {
            flush(&mut current, &mut current_method_name, &mut current_segment_count, &mut fragments);
        }
    }

    if !current.trim().is_empty() {
        let is_first = is_first_ref.get();
        fragments.push(fragment_for(&current, class_name, current_method_name, document, is_first));
    }

    if fragments.is_empty() {
        fragments.push(fragment_for(header, class_name, None, document, true));
    }

    fragments
}

fn fragment_for(content: &str, class_name: &str, method_name: Option<String>, document: &Document, _is_first: bool) -> Fragment {
    let mut fragment = Fragment::new(content.to_string());
    fragment.metadata = document.metadata.clone();
    fragment.metadata.insert(meta_keys::CHUNK_TYPE.to_string(), "java_code".to_string());
    fragment.metadata.insert(meta_keys::CLASS_NAME.to_string(), class_name.to_string());
    if let Some(name) = method_name {
        fragment.metadata.insert(meta_keys::METHOD_NAME.to_string(), name);
    }
    fragment
}

#[cfg(test)]
mod tests {
    use super::*;

    const CALCULATOR: &str = r#"package com.example;

import java.util.List;

public class Calculator {
    private int base;

    public int add(int a, int b) {
        return a + b;
    }

    public int subtract(int a, int b) {
        return a - b;
    }

    public int multiply(int a, int b) {
        return a * b;
    }

    public int divide(int a, int b) {
        if (b == 0) {
            throw new ArithmeticException("divide by zero");
        }
        return a / b;
    }
}
"#;

    #[test]
    fn chunks_calculator_with_four_methods() {
        let doc = Document::new(CALCULATOR, "/src/Calculator.java", "java");
        let fragments = JavaSplitter::new(1500).split(&doc);

        assert!(!fragments.is_empty());
        for fragment in &fragments {
            assert_eq!(fragment.class_name(), Some("Calculator"));
            assert_eq!(fragment.chunk_type(), "java_code");
        }

        let all_content: String = fragments.iter().map(|f| f.content.as_str()).collect::<Vec<_>>().join("\n");
        for method in ["add", "subtract", "multiply", "divide"] {
            assert!(all_content.contains(method));
        }
    }

    #[test]
    fn method_boundaries_are_never_split() {
        let doc = Document::new(CALCULATOR, "/src/Calculator.java", "java");
        let fragments = JavaSplitter::new(20).split(&doc);
        for fragment in &fragments {
            if let Some(name) = fragment.method_name() {
                let opens = fragment.content.matches('{').count();
                let closes = fragment.content.matches('}').count();
                assert!(opens <= closes + 1, "method {} split mid-body", name);
            }
        }
    }

    #[test]
    fn unknown_class_fallback() {
        let doc = Document::new("int x = 1;\n", "/src/Snippet.java", "java");
        let fragments = JavaSplitter::new(1500).split(&doc);
        assert!(!fragments.is_empty());
        assert_eq!(fragments[0].class_name(), Some("UnknownClass"));
    }
}
