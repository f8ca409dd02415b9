//! AI-assisted compliance check of a notice's code changes.

use crate::models::{CodeChange, ComplianceCheckResult, ComplianceState, Notice, PairCheckResult};
use crate::router::QuestionRouter;

use super::local_timestamp;

const BEFORE_FOUND: &str = "BEFORE_FOUND:";
const AFTER_ADOPTED: &str = "AFTER_ADOPTED:";

/// State of a pair from the two findings.
///
/// A present old pattern is never reported as fully applied, even when the
/// new pattern is present too: the old one still has to go.
pub fn classify(before_found: bool, after_found: bool) -> ComplianceState {
    match (before_found, after_found) {
        (false, _) => ComplianceState::NotApplicable,
        (true, true) => ComplianceState::PartiallyApplied,
        (true, false) => ComplianceState::NonCompliant,
    }
}

/// Instruction asking the model to inspect one before/after pair.
pub fn build_check_prompt(language: &str, change: &CodeChange) -> String {
    format!(
        "You are reviewing an indexed codebase for compliance with a coding-standard change.\n\
\n\
Old pattern (before):\n\
```{lang}\n{before}\n```\n\
\n\
New pattern (after):\n\
```{lang}\n{after}\n```\n\
\n\
1. Search the codebase for code equivalent to the old pattern. Match on structure and \
behavior, ignoring whitespace, identifier names and comments.\n\
2. If the old pattern is found, search for code equivalent to the new pattern.\n\
3. Report the replacement ratio literally as \"N of M occurrences replaced\".\n\
4. Classify the result as one of: not applicable (old pattern absent), fully applied \
(every occurrence replaced), partially applied (some occurrences replaced), \
non-compliant (no occurrence replaced).\n\
5. List the files where you found each pattern.\n\
\n\
End your answer with exactly these two lines:\n\
{before_label} yes|no\n\
{after_label} yes|no",
        lang = language,
        before = change.before,
        after = change.after,
        before_label = BEFORE_FOUND,
        after_label = AFTER_ADOPTED,
    )
}

fn parse_flag(line: &str, label: &str) -> Option<bool> {
    let rest = line.get(..label.len())?;
    if !rest.eq_ignore_ascii_case(label) {
        return None;
    }
    let value = line[label.len()..].trim().trim_matches(|c| c == '*' || c == '`').trim();
    match value.to_ascii_lowercase().as_str() {
        "yes" | "true" => Some(true),
        "no" | "false" => Some(false),
        _ => None,
    }
}

/// The (before found, after adopted) lines of an answer, last occurrence wins.
pub fn parse_findings(answer: &str) -> Option<(bool, bool)> {
    let mut before = None;
    let mut after = None;

    for line in answer.lines() {
        let line = line.trim().trim_start_matches(|c| c == '*' || c == '`' || c == '-').trim();
        if let Some(found) = parse_flag(line, BEFORE_FOUND) {
            before = Some(found);
        } else if let Some(found) = parse_flag(line, AFTER_ADOPTED) {
            after = Some(found);
        }
    }

    Some((before?, after?))
}

/// Ask the router about every non-blank pair of `notice`, in order.
///
/// A failed call becomes that pair's analysis text; the remaining pairs still run.
pub async fn run_compliance_check(
    router: &QuestionRouter,
    notice: &Notice,
    container: &str,
    index: &str,
) -> ComplianceCheckResult {
    let changes = notice.effective_code_changes();
    let numbered = changes.len() > 1;

    let mut results = Vec::with_capacity(changes.len());
    for (position, change) in changes.iter().enumerate() {
        if change.is_blank() {
            continue;
        }

        let prompt = build_check_prompt(&notice.code_language, change);
        let (ai_analysis, citations, state) = match router.ask(&prompt, container, Some(index)).await {
            Ok(answer) => {
                let state = parse_findings(&answer.content).map(|(b, a)| classify(b, a));
                (answer.content, answer.citations, state)
            }
            Err(e) => {
                tracing::warn!("Compliance check of change {} failed: {}", position + 1, e);
                (format!("AI analysis failed: {}", e.message()), Vec::new(), None)
            }
        };

        results.push(PairCheckResult {
            change_index: numbered.then_some(position + 1),
            before_code: change.before.clone(),
            after_code: change.after.clone(),
            ai_analysis,
            citations,
            state,
        });
    }

    tracing::info!(
        "Compliance check of '{}' against {}|{} finished with {} results",
        notice.title,
        container,
        index,
        results.len()
    );

    ComplianceCheckResult {
        container: container.to_string(),
        index: index.to_string(),
        timestamp: local_timestamp(),
        results,
    }
}
