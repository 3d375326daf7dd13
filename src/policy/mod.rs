//! Static policy scanner — the first defensive layer.
//!
//! Operates purely on the lexical form of the submitted source, before
//! anything is parsed or executed. One violation is enough to deny, but the
//! full set is collected so the human reviewer sees every problem at once.
//!
//! This layer is a heuristic. It is deliberately *not* the safety property:
//! the workbench's closed namespace (no import construct, host-owned name
//! resolution) and the outer isolation boundary must hold even for source
//! that slips past every rule here. Tests drive scanner-bypass payloads
//! directly into the workbench to keep that claim honest.

use serde::Serialize;

use crate::script::lexer::{tokenize_collect, Spanned, Token};

/// Identifiers that the upstream code generator has no business producing:
/// filesystem, process, network, and interpreter-escape vocabulary.
/// Matched against whole tokens, never substrings.
const DENYLIST: &[&str] = &[
    "open", "eval", "exec", "compile", "input", "globals", "locals", "vars", "getattr",
    "setattr", "delattr", "breakpoint", "memoryview", "system", "popen", "spawn", "fork",
    "os", "sys", "subprocess", "socket", "shutil", "ctypes", "pickle", "builtins",
    "importlib", "file", "exit", "quit",
];

/// Import-like binding keywords, in any position.
const IMPORT_KEYWORDS: &[&str] = &["import", "from", "require", "include"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleId {
    /// Any import-like binding form.
    ImportSyntax,
    /// Reflection-conventional double-underscore names.
    DunderAccess,
    /// Capability-granting identifier from the denylist.
    DenylistedName,
    /// String-literal concatenation assembling a forbidden token.
    StringAssembly,
    /// Source the lexer cannot tokenize.
    MalformedSource,
}

impl RuleId {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleId::ImportSyntax => "import-syntax",
            RuleId::DunderAccess => "dunder-access",
            RuleId::DenylistedName => "denylisted-name",
            RuleId::StringAssembly => "string-assembly",
            RuleId::MalformedSource => "malformed-source",
        }
    }
}

/// One matched rule with the offending text and its source location.
#[derive(Debug, Clone, Serialize)]
pub struct Violation {
    pub rule: RuleId,
    pub matched: String,
    pub line: u32,
    pub column: u32,
}

/// The scanner's verdict. Immutable once produced.
#[derive(Debug, Clone, Serialize)]
pub struct PolicyDecision {
    pub allowed: bool,
    pub violations: Vec<Violation>,
}

impl PolicyDecision {
    /// One-line summary for logs and diagnostics, e.g.
    /// `denylisted-name ('eval' at 1:5); dunder-access ('__class__' at 2:1)`.
    pub fn summary(&self) -> String {
        self.violations
            .iter()
            .map(|v| {
                format!(
                    "{} ('{}' at {}:{})",
                    v.rule.as_str(),
                    v.matched,
                    v.line,
                    v.column
                )
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Scans source text and returns the full violation set.
///
/// Never panics and never executes anything; malformed text is itself a
/// violation rather than an error.
pub fn scan(source: &str) -> PolicyDecision {
    let (tokens, lex_error) = tokenize_collect(source);
    let mut violations = Vec::new();

    for spanned in &tokens {
        if let Token::Ident(name) = &spanned.token {
            check_identifier(name, spanned, &mut violations);
        }
    }

    scan_string_assembly(&tokens, &mut violations);

    if let Some(error) = lex_error {
        // The lexer error already carries its own position in the message
        violations.push(Violation {
            rule: RuleId::MalformedSource,
            matched: error.to_string(),
            line: 0,
            column: 0,
        });
    }

    PolicyDecision {
        allowed: violations.is_empty(),
        violations,
    }
}

fn check_identifier(name: &str, spanned: &Spanned, violations: &mut Vec<Violation>) {
    if IMPORT_KEYWORDS.contains(&name) {
        violations.push(violation(RuleId::ImportSyntax, name, spanned));
    }
    if name.contains("__") {
        violations.push(violation(RuleId::DunderAccess, name, spanned));
    }
    if DENYLIST.contains(&name) {
        violations.push(violation(RuleId::DenylistedName, name, spanned));
    }
}

/// Flags maximal `"lit" + "lit" (+ "lit")*` runs whose joined text contains
/// a denylisted token or a dunder. Best-effort: catches the common
/// split-string obfuscations, not every possible assembly.
fn scan_string_assembly(tokens: &[Spanned], violations: &mut Vec<Violation>) {
    let mut i = 0;
    while i < tokens.len() {
        let Token::Str(first) = &tokens[i].token else {
            i += 1;
            continue;
        };

        let mut joined = first.clone();
        let mut end = i;
        while end + 2 < tokens.len() {
            let (plus, next) = (&tokens[end + 1].token, &tokens[end + 2].token);
            match (plus, next) {
                (Token::Plus, Token::Str(s)) => {
                    joined.push_str(s);
                    end += 2;
                }
                _ => break,
            }
        }

        if end > i && assembled_text_is_forbidden(&joined) {
            violations.push(violation(RuleId::StringAssembly, &joined, &tokens[i]));
        }
        i = end + 1;
    }
}

fn assembled_text_is_forbidden(text: &str) -> bool {
    if text.contains("__") {
        return true;
    }
    text.split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .any(|word| !word.is_empty() && (DENYLIST.contains(&word) || IMPORT_KEYWORDS.contains(&word)))
}

fn violation(rule: RuleId, matched: &str, spanned: &Spanned) -> Violation {
    Violation {
        rule,
        matched: matched.to_string(),
        line: spanned.pos.line,
        column: spanned.pos.column,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn denied_rules(source: &str) -> Vec<RuleId> {
        let decision = scan(source);
        assert!(!decision.allowed, "expected denial for: {source}");
        decision.violations.iter().map(|v| v.rule).collect()
    }

    // ── Per-rule regression tests ─────────────────────────

    #[test]
    fn test_import_statement_denied() {
        assert!(denied_rules("import pandas").contains(&RuleId::ImportSyntax));
        assert!(denied_rules("from os import path")
            .iter()
            .any(|r| *r == RuleId::ImportSyntax));
    }

    #[test]
    fn test_import_anywhere_denied() {
        // Token-level: not just statement-leading position
        assert!(denied_rules("x = import").contains(&RuleId::ImportSyntax));
    }

    #[test]
    fn test_dunder_identifier_denied() {
        assert!(denied_rules("__class__").contains(&RuleId::DunderAccess));
        assert!(denied_rules("x = a.__globals__()").contains(&RuleId::DunderAccess));
    }

    #[test]
    fn test_dunder_import_hits_both_rules() {
        let rules = denied_rules("__import__");
        assert!(rules.contains(&RuleId::DunderAccess));
    }

    #[test]
    fn test_denylisted_identifier_denied() {
        for name in ["open", "eval", "exec", "compile", "subprocess", "socket"] {
            assert!(
                denied_rules(&format!("x = {name}")).contains(&RuleId::DenylistedName),
                "denylist miss: {name}"
            );
        }
    }

    #[test]
    fn test_denylisted_name_in_attribute_position() {
        // `x.eval(1)` — attribute indirection is still a token match
        assert!(denied_rules("x.eval(1)").contains(&RuleId::DenylistedName));
    }

    #[test]
    fn test_string_assembly_obfuscation_denied() {
        assert!(denied_rules(r#"x = "ev" + "al""#).contains(&RuleId::StringAssembly));
        assert!(denied_rules(r#"x = "__cl" + "ass__""#).contains(&RuleId::StringAssembly));
        assert!(denied_rules(r#"x = "sub" + "proc" + "ess""#).contains(&RuleId::StringAssembly));
    }

    #[test]
    fn test_malformed_source_is_violation_not_panic() {
        assert!(denied_rules("x = \"unterminated").contains(&RuleId::MalformedSource));
        assert!(denied_rules("a $ b").contains(&RuleId::MalformedSource));
    }

    // ── Whole-token matching, not substrings ──────────────

    #[test]
    fn test_substring_of_denylisted_name_is_allowed() {
        // "opening_balance" contains "open"; "systematic" contains "system"
        assert!(scan("opening_balance = 1").allowed);
        assert!(scan(r#"dataframe.rename("systematic", "s")"#).allowed);
        assert!(scan(r#"dataframe.rename("import_date", "date")"#).allowed);
    }

    #[test]
    fn test_plain_string_literal_is_allowed() {
        // A lone literal is data; only assembly runs are flagged
        assert!(scan(r#"dataframe.filter("status", "==", "open")"#).allowed);
    }

    #[test]
    fn test_benign_string_concatenation_allowed() {
        assert!(scan(r#"x = "first" + "second""#).allowed);
    }

    // ── Aggregate behavior ────────────────────────────────

    #[test]
    fn test_all_violations_collected_in_order() {
        let decision = scan("import os\nx = eval");
        assert!(!decision.allowed);
        let rules: Vec<RuleId> = decision.violations.iter().map(|v| v.rule).collect();
        // import, os (denylisted), eval — in token order
        assert_eq!(
            rules,
            vec![
                RuleId::ImportSyntax,
                RuleId::DenylistedName,
                RuleId::DenylistedName,
            ]
        );
        assert_eq!(decision.violations[0].line, 1);
        assert_eq!(decision.violations[2].line, 2);
    }

    #[test]
    fn test_clean_transformation_code_allowed() {
        let decision = scan(
            r#"
            dataframe.fillna(dataframe.mean())
            dataframe.rename("Age", "age")
            dataframe.dedupe()
            x = stats.mean(dataframe["age"])
            "#,
        );
        assert!(decision.allowed, "violations: {}", decision.summary());
        assert!(decision.violations.is_empty());
    }

    #[test]
    fn test_summary_names_rule_and_position() {
        let decision = scan("eval");
        let summary = decision.summary();
        assert!(summary.contains("denylisted-name"));
        assert!(summary.contains("'eval'"));
        assert!(summary.contains("1:1"));
    }
}
