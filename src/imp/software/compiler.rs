// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Front end of the software driver's OpenCL C compiler.
//!
//! This does not generate code. It does what a driver front end does before code
//! generation: validate build options, run the preprocessor conditionals, check
//! bracket structure, and find kernel entry points with their parameter lists.
//! Diagnostics use the `<kernel>:line:col: error: message` shape real drivers emit.

use std::collections::HashSet;
use std::fmt::Write;

/// How a kernel parameter is passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ParamKind {
    /// A memory object, image or sampler. Bound with a handle.
    Memory,
    /// A scalar or vector of known size.
    Scalar(usize),
    /// `__local` pointers and user types. Any non-zero size is accepted.
    Any,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct KernelDecl {
    pub(crate) name: String,
    pub(crate) params: Vec<ParamKind>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum BuildFailure {
    /// The option string was rejected before compilation started.
    InvalidOptions(String),
    /// Compilation failed; the payload is the build log.
    Diagnostics(String),
}

#[derive(Debug, Default)]
struct Options {
    defines: HashSet<String>,
}

fn parse_std(v: &str) -> Option<(u8, u8)> {
    match v {
        "CL1.1" => Some((1, 1)),
        "CL1.2" => Some((1, 2)),
        "CL2.0" => Some((2, 0)),
        "CL3.0" => Some((3, 0)),
        _ => None,
    }
}

fn parse_options(options: &str, device_version: (u8, u8)) -> Result<Options, String> {
    fn define(def: &str, out: &mut Options) -> Result<(), String> {
        let name = def.split('=').next().unwrap_or_default();
        if name.is_empty() {
            return Err("macro name missing after '-D'".to_string());
        }
        out.defines.insert(name.to_string());
        Ok(())
    }
    let mut out = Options::default();
    let mut tokens = options.split_whitespace();
    while let Some(tok) = tokens.next() {
        if let Some(v) = tok.strip_prefix("-cl-std=") {
            let version =
                parse_std(v).ok_or_else(|| format!("invalid value '{v}' in '-cl-std='"))?;
            if version > device_version {
                return Err(format!(
                    "-cl-std={v} is not supported by a device with OpenCL C {}.{}",
                    device_version.0, device_version.1
                ));
            }
        } else if tok == "-D" {
            let def = tokens
                .next()
                .ok_or_else(|| "macro name missing after '-D'".to_string())?;
            define(def, &mut out)?;
        } else if let Some(def) = tok.strip_prefix("-D") {
            define(def, &mut out)?;
        } else if tok == "-I" {
            tokens
                .next()
                .ok_or_else(|| "directory missing after '-I'".to_string())?;
        } else if tok.starts_with("-I") {
        } else if !matches!(
            tok,
            "-w" | "-Werror"
                | "-cl-fast-relaxed-math"
                | "-cl-mad-enable"
                | "-cl-opt-disable"
                | "-cl-kernel-arg-info"
                | "-cl-finite-math-only"
                | "-cl-no-signed-zeros"
                | "-cl-denorms-are-zero"
                | "-cl-single-precision-constant"
                | "-cl-unsafe-math-optimizations"
        ) {
            return Err(format!("unknown build option '{tok}'"));
        }
    }
    Ok(out)
}

#[derive(Debug, Default)]
struct Diagnostics {
    log: String,
    errors: usize,
}

impl Diagnostics {
    fn error(&mut self, line: usize, col: usize, msg: impl AsRef<str>) {
        let _ = writeln!(self.log, "<kernel>:{line}:{col}: error: {}", msg.as_ref());
        self.errors += 1;
    }
    fn note(&mut self, line: usize, col: usize, msg: impl AsRef<str>) {
        let _ = writeln!(self.log, "<kernel>:{line}:{col}: note: {}", msg.as_ref());
    }
    fn finish(mut self) -> Option<String> {
        if self.errors == 0 {
            return None;
        }
        let plural = if self.errors == 1 { "" } else { "s" };
        let _ = writeln!(self.log, "{} error{plural} generated.", self.errors);
        Some(self.log)
    }
}

/// Replaces comments with spaces, keeping line structure.
fn strip_comments(source: &str, diags: &mut Diagnostics) -> String {
    #[derive(PartialEq)]
    enum State {
        Code,
        Line,
        Block,
        Str(char),
    }
    let mut out = String::with_capacity(source.len());
    let mut state = State::Code;
    let mut chars = source.chars().peekable();
    let (mut line, mut col) = (1, 1);
    let mut block_start = (0, 0);
    while let Some(c) = chars.next() {
        let here = (line, col);
        if c == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
        match state {
            State::Code => match (c, chars.peek().copied()) {
                ('/', Some('/')) => {
                    chars.next();
                    col += 1;
                    out.push_str("  ");
                    state = State::Line;
                }
                ('/', Some('*')) => {
                    chars.next();
                    col += 1;
                    out.push_str("  ");
                    block_start = here;
                    state = State::Block;
                }
                ('"', _) | ('\'', _) => {
                    out.push(c);
                    state = State::Str(c);
                }
                _ => out.push(c),
            },
            State::Line => {
                if c == '\n' {
                    out.push('\n');
                    state = State::Code;
                } else {
                    out.push(' ');
                }
            }
            State::Block => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    col += 1;
                    out.push_str("  ");
                    state = State::Code;
                } else if c == '\n' {
                    out.push('\n');
                } else {
                    out.push(' ');
                }
            }
            State::Str(q) => {
                out.push(c);
                if c == '\\' {
                    if let Some(n) = chars.next() {
                        col += 1;
                        out.push(n);
                    }
                } else if c == q || c == '\n' {
                    state = State::Code;
                }
            }
        }
    }
    if state == State::Block {
        diags.error(block_start.0, block_start.1, "unterminated /* comment");
    }
    out
}

struct Conditional {
    line: usize,
    parent_active: bool,
    active: bool,
    taken: bool,
}

fn eval_if(expr: &str, defines: &HashSet<String>) -> bool {
    let expr = expr.trim();
    if let Some(rest) = expr.strip_prefix("defined") {
        let name = rest.trim().trim_start_matches('(').trim_end_matches(')').trim();
        return defines.contains(name);
    }
    if let Some(rest) = expr.strip_prefix('!') {
        return !eval_if(rest, defines);
    }
    match expr.parse::<i64>() {
        Ok(v) => v != 0,
        Err(_) => defines.contains(expr),
    }
}

/// Runs preprocessor conditionals. Returns the source with directives and inactive
/// lines blanked.
fn preprocess(source: &str, options: &mut Options, diags: &mut Diagnostics) -> String {
    let mut out = String::with_capacity(source.len());
    let mut stack: Vec<Conditional> = Vec::new();
    for (index, text) in source.split('\n').enumerate() {
        let line = index + 1;
        if index > 0 {
            out.push('\n');
        }
        let active = stack.last().is_none_or(|c| c.active);
        let trimmed = text.trim_start();
        let Some(directive) = trimmed.strip_prefix('#') else {
            if active {
                out.push_str(text);
            }
            continue;
        };
        let col = text.len() - trimmed.len() + 1;
        let directive = directive.trim_start();
        let (name, rest) = directive
            .split_once(char::is_whitespace)
            .unwrap_or((directive, ""));
        let rest = rest.trim();
        match name {
            "ifdef" | "ifndef" | "if" => {
                let cond = match name {
                    "ifdef" => options.defines.contains(rest),
                    "ifndef" => !options.defines.contains(rest),
                    _ => eval_if(rest, &options.defines),
                };
                stack.push(Conditional {
                    line,
                    parent_active: active,
                    active: active && cond,
                    taken: cond,
                });
            }
            "elif" | "else" => match stack.last_mut() {
                Some(c) => {
                    let cond = name == "else" || eval_if(rest, &options.defines);
                    c.active = c.parent_active && !c.taken && cond;
                    c.taken |= cond;
                }
                None => diags.error(line, col, format!("#{name} without #if")),
            },
            "endif" => {
                if stack.pop().is_none() {
                    diags.error(line, col, "#endif without #if");
                }
            }
            "define" if active => {
                let macro_name = rest
                    .split(|c: char| c.is_whitespace() || c == '(')
                    .next()
                    .unwrap_or_default();
                options.defines.insert(macro_name.to_string());
            }
            "undef" if active => {
                options.defines.remove(rest);
            }
            "error" if active => diags.error(line, col, rest),
            _ => {}
        }
    }
    for c in stack {
        diags.error(c.line, 1, "unterminated conditional directive");
    }
    out
}

#[derive(Debug, Clone)]
struct Token {
    text: String,
    line: usize,
    col: usize,
}

fn tokenize(source: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    for (index, text) in source.split('\n').enumerate() {
        let chars: Vec<char> = text.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            let start = i;
            if c.is_whitespace() {
                i += 1;
                continue;
            }
            if c.is_ascii_alphabetic() || c == '_' {
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
            } else if c.is_ascii_digit() {
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '.') {
                    i += 1;
                }
            } else if c == '"' || c == '\'' {
                i += 1;
                while i < chars.len() && chars[i] != c {
                    if chars[i] == '\\' {
                        i += 1;
                    }
                    i += 1;
                }
                i = (i + 1).min(chars.len());
            } else {
                i += 1;
            }
            tokens.push(Token {
                text: chars[start..i].iter().collect(),
                line: index + 1,
                col: start + 1,
            });
        }
    }
    tokens
}

fn closer(open: &str) -> &'static str {
    match open {
        "{" => "}",
        "(" => ")",
        _ => "]",
    }
}

fn check_brackets(tokens: &[Token], eof: (usize, usize), diags: &mut Diagnostics) {
    let mut stack: Vec<&Token> = Vec::new();
    for t in tokens {
        match t.text.as_str() {
            "{" | "(" | "[" => stack.push(t),
            "}" | ")" | "]" => match stack.last() {
                Some(open) if closer(&open.text) == t.text => {
                    stack.pop();
                }
                Some(open) => {
                    diags.error(t.line, t.col, format!("expected '{}'", closer(&open.text)));
                    diags.note(open.line, open.col, format!("to match this '{}'", open.text));
                    stack.pop();
                }
                None if t.text == "}" => {
                    diags.error(t.line, t.col, "extraneous closing brace ('}')")
                }
                None => diags.error(t.line, t.col, format!("unmatched '{}'", t.text)),
            },
            _ => {}
        }
    }
    for open in stack.into_iter().rev() {
        diags.error(eof.0, eof.1, format!("expected '{}'", closer(&open.text)));
        diags.note(open.line, open.col, format!("to match this '{}'", open.text));
    }
}

/// Index of the bracket that closes the one at `open`.
fn matching(tokens: &[Token], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, t) in tokens.iter().enumerate().skip(open) {
        match t.text.as_str() {
            "(" | "[" | "{" => depth += 1,
            ")" | "]" | "}" => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

const IMAGE_TYPES: &[&str] = &[
    "image1d_t",
    "image1d_array_t",
    "image1d_buffer_t",
    "image2d_t",
    "image2d_array_t",
    "image3d_t",
    "sampler_t",
];

fn scalar_size(ty: &str) -> Option<usize> {
    let base_end = ty
        .find(|c: char| c.is_ascii_digit())
        .unwrap_or(ty.len());
    let (base, lanes) = ty.split_at(base_end);
    let size = match base {
        "char" | "uchar" | "bool" => 1,
        "short" | "ushort" | "half" => 2,
        "int" | "uint" | "float" => 4,
        "long" | "ulong" | "double" | "size_t" | "ptrdiff_t" | "intptr_t" | "uintptr_t" => 8,
        _ => return None,
    };
    let lanes = match lanes {
        "" => 1,
        "2" => 2,
        "3" | "4" => 4,
        "8" => 8,
        "16" => 16,
        _ => return None,
    };
    Some(size * lanes)
}

fn classify(param: &[Token]) -> ParamKind {
    let mut saw_pointer = false;
    for t in param {
        match t.text.as_str() {
            "__local" | "local" => return ParamKind::Any,
            "*" | "__global" | "global" | "__constant" | "constant" => saw_pointer = true,
            s if IMAGE_TYPES.contains(&s) => return ParamKind::Memory,
            _ => {}
        }
    }
    if saw_pointer {
        return ParamKind::Memory;
    }
    //`unsigned int` and friends
    let unsigned = param.iter().any(|t| t.text == "unsigned");
    param
        .iter()
        .find_map(|t| scalar_size(&t.text))
        .or_else(|| unsigned.then_some(4))
        .map(ParamKind::Scalar)
        .unwrap_or(ParamKind::Any)
}

fn find_kernels(tokens: &[Token], diags: &mut Diagnostics) -> Vec<KernelDecl> {
    let mut kernels: Vec<KernelDecl> = Vec::new();
    let mut seen = HashSet::new();
    let mut depth = 0usize;
    let mut i = 0;
    while i < tokens.len() {
        let t = &tokens[i];
        match t.text.as_str() {
            "{" => depth += 1,
            "}" => depth = depth.saturating_sub(1),
            "__kernel" | "kernel" if depth == 0 => {
                let mut j = i + 1;
                if tokens.get(j).is_some_and(|t| t.text == "__attribute__") {
                    match tokens.get(j + 1).filter(|t| t.text == "(") {
                        Some(_) => j = matching(tokens, j + 1).map_or(tokens.len(), |e| e + 1),
                        None => j += 1,
                    }
                }
                let Some(open) = (j..tokens.len()).find(|&k| {
                    matches!(tokens[k].text.as_str(), "(" | ";" | "{")
                }) else {
                    break;
                };
                if tokens[open].text != "(" || open == j {
                    diags.error(tokens[open].line, tokens[open].col, "expected function declarator");
                    i = open + 1;
                    continue;
                }
                let name_tok = &tokens[open - 1];
                let return_type: Vec<&str> =
                    tokens[j..open - 1].iter().map(|t| t.text.as_str()).collect();
                let Some(close) = matching(tokens, open) else {
                    break;
                };
                let params: Vec<ParamKind> = split_params(&tokens[open + 1..close])
                    .iter()
                    .map(|p| classify(p))
                    .collect();
                let next = tokens.get(close + 1).map(|t| t.text.as_str());
                if next == Some(";") {
                    i = close + 2;
                    continue;
                }
                if next != Some("{") {
                    let (line, col) = tokens
                        .get(close + 1)
                        .map_or((name_tok.line, name_tok.col), |t| (t.line, t.col));
                    diags.error(line, col, "expected function body after function declarator");
                }
                match return_type.as_slice() {
                    ["void"] => {}
                    [] => diags.error(name_tok.line, name_tok.col, "type specifier missing"),
                    _ => diags.error(
                        tokens[j].line,
                        tokens[j].col,
                        "kernel must have void return type",
                    ),
                }
                if !seen.insert(name_tok.text.clone()) {
                    diags.error(
                        name_tok.line,
                        name_tok.col,
                        format!("redefinition of '{}'", name_tok.text),
                    );
                } else {
                    kernels.push(KernelDecl {
                        name: name_tok.text.clone(),
                        params,
                    });
                }
                i = close + 1;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    kernels
}

fn split_params(tokens: &[Token]) -> Vec<Vec<Token>> {
    if tokens.is_empty() || (tokens.len() == 1 && tokens[0].text == "void") {
        return Vec::new();
    }
    let mut params = vec![Vec::new()];
    let mut depth = 0usize;
    for t in tokens {
        match t.text.as_str() {
            "(" | "[" => depth += 1,
            ")" | "]" => depth = depth.saturating_sub(1),
            "," if depth == 0 => {
                params.push(Vec::new());
                continue;
            }
            _ => {}
        }
        if let Some(last) = params.last_mut() {
            last.push(t.clone());
        }
    }
    params
}

/// Compiles `source` for a device supporting `device_version`.
pub(crate) fn compile(
    source: &str,
    options: &str,
    device_version: (u8, u8),
) -> Result<Vec<KernelDecl>, BuildFailure> {
    let mut options = parse_options(options, device_version).map_err(BuildFailure::InvalidOptions)?;
    let mut diags = Diagnostics::default();
    let stripped = strip_comments(source, &mut diags);
    let preprocessed = preprocess(&stripped, &mut options, &mut diags);
    let tokens = tokenize(&preprocessed);
    let last_line = preprocessed.split('\n').count();
    let last_col = preprocessed.rsplit('\n').next().map_or(0, |l| l.chars().count()) + 1;
    check_brackets(&tokens, (last_line, last_col), &mut diags);
    let kernels = if diags.errors == 0 {
        find_kernels(&tokens, &mut diags)
    } else {
        Vec::new()
    };
    match diags.finish() {
        Some(log) => Err(BuildFailure::Diagnostics(log)),
        None => Ok(kernels),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
// sample one texel
__kernel void sample(__read_only image2d_t image, __global float* out) {
    const sampler_t s = CLK_NORMALIZED_COORDS_TRUE | CLK_FILTER_NEAREST;
    out[0] = read_imagef(image, s, (float2)(0.5f, 0.5f)).x;
}
"#;

    #[test]
    fn finds_kernel_and_params() {
        let kernels = compile(SAMPLE, "-cl-std=CL2.0", (3, 0)).unwrap();
        assert_eq!(kernels.len(), 1);
        assert_eq!(kernels[0].name, "sample");
        assert_eq!(kernels[0].params, vec![ParamKind::Memory, ParamKind::Memory]);
    }

    #[test]
    fn scalar_params_are_sized() {
        let src = "kernel void k(float a, uint2 b, unsigned int c, __local float* d, struct S e) {}";
        let kernels = compile(src, "", (1, 2)).unwrap();
        assert_eq!(
            kernels[0].params,
            vec![
                ParamKind::Scalar(4),
                ParamKind::Scalar(8),
                ParamKind::Scalar(4),
                ParamKind::Any,
                ParamKind::Any
            ]
        );
    }

    #[test]
    fn void_param_list_is_empty() {
        let kernels = compile("__kernel void k(void) {}\n__kernel void j() {}", "", (1, 2)).unwrap();
        assert!(kernels.iter().all(|k| k.params.is_empty()));
        assert_eq!(kernels[1].name, "j");
    }

    #[test]
    fn helpers_and_declarations_are_not_kernels() {
        let src = "float helper(float x) { return x; }\n__kernel void k(float x);\n__kernel void k(float x) {}";
        let kernels = compile(src, "", (1, 2)).unwrap();
        assert_eq!(kernels.len(), 1);
    }

    #[test]
    fn unknown_option_is_rejected() {
        assert!(matches!(
            compile(SAMPLE, "-fancy", (3, 0)),
            Err(BuildFailure::InvalidOptions(_))
        ));
    }

    #[test]
    fn std_above_device_is_rejected() {
        assert!(matches!(
            compile(SAMPLE, "-cl-std=CL3.0", (1, 2)),
            Err(BuildFailure::InvalidOptions(_))
        ));
        assert!(compile(SAMPLE, "-cl-std=CL1.2 -D FOO=1 -w", (1, 2)).is_ok());
    }

    #[test]
    fn missing_brace_is_located() {
        let Err(BuildFailure::Diagnostics(log)) = compile("__kernel void k() {\n", "", (3, 0)) else {
            panic!("expected diagnostics");
        };
        assert!(log.contains("error: expected '}'"), "{log}");
        assert!(log.contains("<kernel>:1:19: note: to match this '{'"), "{log}");
        assert!(log.ends_with("1 error generated.\n"), "{log}");
    }

    #[test]
    fn non_void_kernel_is_an_error() {
        let Err(BuildFailure::Diagnostics(log)) = compile("__kernel int k() { return 0; }", "", (3, 0))
        else {
            panic!("expected diagnostics");
        };
        assert!(log.starts_with("<kernel>:1:10: error: kernel must have void return type"), "{log}");
    }

    #[test]
    fn error_directive_respects_conditionals() {
        let src = "#ifndef FEATURE\n#error FEATURE required\n#endif\n__kernel void k() {}";
        let Err(BuildFailure::Diagnostics(log)) = compile(src, "", (3, 0)) else {
            panic!("expected diagnostics");
        };
        assert!(log.contains("<kernel>:2:1: error: FEATURE required"), "{log}");
        assert!(compile(src, "-DFEATURE", (3, 0)).is_ok());
    }

    #[test]
    fn comments_do_not_hide_line_numbers() {
        let src = "/* a\n b */ __kernel void k() {\n }\n }";
        let Err(BuildFailure::Diagnostics(log)) = compile(src, "", (3, 0)) else {
            panic!("expected diagnostics");
        };
        assert!(log.contains("<kernel>:4:2: error: extraneous closing brace"), "{log}");
    }

    #[test]
    fn duplicate_kernel_is_an_error() {
        let src = "__kernel void k() {}\n__kernel void k() {}";
        assert!(matches!(
            compile(src, "", (3, 0)),
            Err(BuildFailure::Diagnostics(log)) if log.contains("redefinition of 'k'")
        ));
    }
}
