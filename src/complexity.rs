//! Complexity analyzer. Stateless: a pure function over a
//! symbol body's text, no store access. Cyclomatic complexity counts
//! decision points; cognitive complexity adds a nesting penalty, via a
//! token-based heuristic rather than a real per-language control-flow graph.

const DECISION_KEYWORDS: &[&str] = &[
    "if ", "if(", "else if", "elif ", "for ", "for(", "while ", "while(", "case ", "catch ", "except ", "&&", "||", "?",
];

/// Cyclomatic complexity: 1 + count of decision points in the body text.
pub fn cyclomatic_complexity(body: &str) -> u32 {
    let mut count = 1u32;
    for line in body.lines() {
        let trimmed = line.trim();
        for kw in DECISION_KEYWORDS {
            count += trimmed.matches(kw).count() as u32;
        }
    }
    count
}

/// Cognitive complexity: decision points weighted by nesting depth, tracked
/// via brace/indent depth as a proxy for control-flow nesting.
pub fn cognitive_complexity(body: &str) -> u32 {
    let mut score = 0u32;
    let mut depth = 0i32;
    for line in body.lines() {
        let trimmed = line.trim();
        let opens = trimmed.matches('{').count() as i32;
        let closes = trimmed.matches('}').count() as i32;

        let is_decision = DECISION_KEYWORDS.iter().any(|kw| trimmed.contains(kw));
        if is_decision {
            score += 1 + depth.max(0) as u32;
        }

        depth += opens - closes;
    }
    score
}

/// Inverted cyclomatic bucket used as the ranker's `complexityScore` signal
///.
pub fn complexity_score(complexity: u32) -> f64 {
    match complexity {
        0..=5 => 1.0,
        6..=10 => 0.8,
        11..=15 => 0.5,
        16..=20 => 0.3,
        _ => 0.1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn straight_line_body_has_base_complexity() {
        let body = "fn f() {\n    let x = 1;\n    return x;\n}";
        assert_eq!(cyclomatic_complexity(body), 1);
    }

    #[test]
    fn branches_increase_complexity() {
        let body = "fn f(x: i32) -> i32 {\n    if x > 0 {\n        return 1;\n    } else if x < 0 {\n        return -1;\n    }\n    0\n}";
        assert!(cyclomatic_complexity(body) >= 3);
    }

    #[test]
    fn nested_branches_score_higher_cognitively() {
        let flat = "fn f() {\n    if a {}\n    if b {}\n}";
        let nested = "fn f() {\n    if a {\n        if b {\n            if c {}\n        }\n    }\n}";
        assert!(cognitive_complexity(nested) > cognitive_complexity(flat));
    }
}
