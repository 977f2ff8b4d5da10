use super::markup::parse_jsx;
use super::{Dialect, ImportSite, ScanContext, ScanOutcome, Scanner, plan_nodes};

/// Scanner for JavaScript/TypeScript modules containing JSX.
///
/// Every element in the module is a candidate. Imports go at the top of the
/// module, after a shebang line and the directive prologue.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsxScanner;

impl Scanner for JsxScanner {
    fn dialect(&self) -> Dialect {
        Dialect::Jsx
    }

    fn scan(&self, source: &str, ctx: &ScanContext<'_>) -> ScanOutcome {
        if ctx.registry.is_empty() {
            return ScanOutcome::pass_through();
        }

        let nodes = parse_jsx(source);
        plan_nodes(&nodes, ctx, ImportSite::Offset(prologue_end(source)))
    }
}

/// Offset after a leading shebang and any `"use ..."` directives.
pub(crate) fn prologue_end(source: &str) -> usize {
    let bytes = source.as_bytes();
    let mut pos = 0;

    if source.starts_with("#!") {
        pos = source.find('\n').map_or(source.len(), |i| i + 1);
    }

    loop {
        let mut cursor = pos;
        while cursor < bytes.len() && bytes[cursor].is_ascii_whitespace() {
            cursor += 1;
        }

        let Some(&quote) = bytes.get(cursor) else {
            return pos;
        };
        if quote != b'"' && quote != b'\'' {
            return pos;
        }

        let Some(len) = source[cursor + 1..].find(|c: char| c == char::from(quote) || c == '\n')
        else {
            return pos;
        };
        let closing = cursor + 1 + len;
        if bytes[closing] != quote {
            return pos;
        }

        let mut after = closing + 1;
        while after < bytes.len() && matches!(bytes[after], b' ' | b'\t') {
            after += 1;
        }
        match bytes.get(after) {
            Some(b';') => pos = after + 1,
            Some(b'\n' | b'\r') | None => pos = after,
            Some(_) => return pos,
        }
    }
}
