//! Constraint parsing
//!
//! Extracts variable bounds and time/memory limits from free-form problem constraint text
//! such as `1 ≤ n ≤ 10^5` or `Time limit: 2 seconds`, and checks test inputs against the
//! extracted bounds. Everything here is pure; no I/O.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::error::JudgeError;
use crate::runner::ExecutionLimits;

/// Problem difficulty; scales the derived time limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    fn time_multiplier(self) -> f64 {
        match self {
            Difficulty::Easy => 0.8,
            Difficulty::Medium => 1.0,
            Difficulty::Hard => 1.5,
        }
    }
}

impl FromStr for Difficulty {
    type Err = JudgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            _ => Err(JudgeError::BadRequest(format!("Unknown difficulty: {}", s))),
        }
    }
}

impl TryFrom<String> for Difficulty {
    type Error = JudgeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    Integer,
    ArraySize,
    StringLength,
}

/// Bound on one input variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintRule {
    pub variable: String,
    pub min: Option<i64>,
    pub max: Option<i64>,
    #[serde(rename = "type")]
    pub kind: ConstraintKind,
}

impl ConstraintRule {
    fn new(variable: &str, min: Option<i64>, max: Option<i64>) -> Self {
        Self {
            variable: variable.to_string(),
            min,
            max,
            kind: kind_of(variable),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedConstraints {
    pub time_limit_ms: u64,
    pub memory_limit_mb: u64,
    pub input_constraints: Vec<ConstraintRule>,
}

impl ParsedConstraints {
    pub fn limits(&self) -> ExecutionLimits {
        ExecutionLimits::new(self.time_limit_ms, self.memory_limit_mb)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

struct Patterns {
    multi_range: Regex,
    range: Regex,
    upper: Regex,
    lower: Regex,
    string_length: Regex,
    time_limit: Regex,
    memory_limit: Regex,
}

const OP: &str = r"(?:<=|≤|<)";
const NUM: &str = r"(-?\d+(?:\^\d+)?)";
const IDENT: &str = r"[A-Za-z_]\w*(?:\[\w+\])?";

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let build = |pattern: String| Regex::new(&pattern).expect("valid constraint regex");
        Patterns {
            multi_range: build(format!(
                r"{NUM}\s*{OP}\s*({IDENT}(?:\s*,\s*{IDENT})+)\s*{OP}\s*{NUM}"
            )),
            range: build(format!(r"{NUM}\s*{OP}\s*\b({IDENT})\s*{OP}\s*{NUM}")),
            upper: build(format!(r"\b({IDENT})\s*{OP}\s*{NUM}")),
            lower: build(format!(r"{NUM}\s*{OP}\s*\b({IDENT})")),
            string_length: build(format!(r"\|\s*([A-Za-z_]\w*)\s*\|\s*{OP}\s*{NUM}")),
            time_limit: build(
                r"(?i)time\s*limit[:\s]*(\d+(?:\.\d+)?)\s*(milliseconds?|ms|seconds?|sec|s)\b"
                    .to_string(),
            ),
            memory_limit: build(
                r"(?i)memory\s*limit[:\s]*(\d+(?:\.\d+)?)\s*(mb|gb|kb)\b".to_string(),
            ),
        }
    })
}

/// Parse constraint text into limits and per-variable rules
pub fn parse(text: &str, difficulty: Difficulty) -> ParsedConstraints {
    let p = patterns();
    let mut rules: Vec<ConstraintRule> = Vec::new();

    for caps in p.multi_range.captures_iter(text) {
        let min = number(&caps, 1);
        let max = number(&caps, 3);
        for variable in caps[2].split(',').map(str::trim) {
            push_unique(&mut rules, ConstraintRule::new(variable, min, max));
        }
    }

    for caps in p.range.captures_iter(text) {
        let rule = ConstraintRule::new(&caps[2], number(&caps, 1), number(&caps, 3));
        push_unique(&mut rules, rule);
    }

    for caps in p.upper.captures_iter(text) {
        let rule = ConstraintRule::new(&caps[1], Some(1), number(&caps, 2));
        push_unique(&mut rules, rule);
    }

    for caps in p.lower.captures_iter(text) {
        let rule = ConstraintRule::new(&caps[2], number(&caps, 1), None);
        push_unique(&mut rules, rule);
    }

    for caps in p.string_length.captures_iter(text) {
        let rule = ConstraintRule {
            variable: caps[1].to_string(),
            min: Some(0),
            max: number(&caps, 2),
            kind: ConstraintKind::StringLength,
        };
        push_unique(&mut rules, rule);
    }

    let (derived_time_ms, derived_memory_mb) = derive_limits(&rules);

    let time_limit_ms = explicit_time_ms(text).unwrap_or_else(|| {
        (derived_time_ms as f64 * difficulty.time_multiplier()).round() as u64
    });
    let memory_limit_mb = explicit_memory_mb(text).unwrap_or(derived_memory_mb);

    ParsedConstraints {
        time_limit_ms,
        memory_limit_mb,
        input_constraints: rules,
    }
}

/// Check the first line of a test input positionally against `rules`
pub fn validate_input(input: &str, rules: &[ConstraintRule]) -> ValidationReport {
    let first_line = input.trim().lines().next().unwrap_or_default();
    let values: Vec<i64> = first_line
        .split_whitespace()
        .filter_map(|token| token.parse().ok())
        .collect();

    let mut errors = Vec::new();
    for (rule, value) in rules.iter().zip(values) {
        if let Some(min) = rule.min {
            if value < min {
                errors.push(format!(
                    "{} = {} is less than minimum {}",
                    rule.variable, value, min
                ));
            }
        }
        if let Some(max) = rule.max {
            if value > max {
                errors.push(format!("{} = {} exceeds maximum {}", rule.variable, value, max));
            }
        }
    }

    ValidationReport {
        valid: errors.is_empty(),
        errors,
    }
}

/// Earlier passes win for a variable
fn push_unique(rules: &mut Vec<ConstraintRule>, rule: ConstraintRule) {
    if !rules.iter().any(|r| r.variable == rule.variable) {
        rules.push(rule);
    }
}

fn kind_of(variable: &str) -> ConstraintKind {
    let is_size = variable.contains('[')
        || variable == "n"
        || variable == "m"
        || variable.ends_with("_size");
    if is_size {
        ConstraintKind::ArraySize
    } else {
        ConstraintKind::Integer
    }
}

fn number(caps: &Captures<'_>, group: usize) -> Option<i64> {
    caps.get(group).map(|m| parse_number(m.as_str()))
}

/// `-10^3` is `(-10)^3`; values saturate at the i64 range
fn parse_number(s: &str) -> i64 {
    let (base, exponent) = match s.split_once('^') {
        Some((base, exponent)) => (base, Some(exponent)),
        None => (s, None),
    };
    let base = base.parse::<i64>().unwrap_or(if base.starts_with('-') {
        i64::MIN
    } else {
        i64::MAX
    });
    match exponent {
        Some(exponent) => {
            let exponent = exponent.parse::<u32>().unwrap_or(u32::MAX);
            base.saturating_pow(exponent)
        }
        None => base,
    }
}

/// Time and memory implied by the largest array size
fn derive_limits(rules: &[ConstraintRule]) -> (u64, u64) {
    let largest = rules
        .iter()
        .filter(|r| r.kind == ConstraintKind::ArraySize)
        .map(|r| r.max.unwrap_or(1000))
        .max();

    match largest {
        None => (1000, 64),
        Some(size) if size <= 1_000 => (1000, 64),
        Some(size) if size <= 100_000 => (2000, 128),
        Some(size) if size <= 1_000_000 => (3000, 256),
        Some(_) => (5000, 512),
    }
}

fn explicit_time_ms(text: &str) -> Option<u64> {
    let caps = patterns().time_limit.captures(text)?;
    let value: f64 = caps[1].parse().ok()?;
    let unit = caps[2].to_lowercase();
    let ms = if unit.starts_with("ms") || unit.starts_with("milli") {
        value
    } else {
        value * 1000.0
    };
    Some((ms.round() as u64).max(1))
}

fn explicit_memory_mb(text: &str) -> Option<u64> {
    let caps = patterns().memory_limit.captures(text)?;
    let value: f64 = caps[1].parse().ok()?;
    let mb = match caps[2].to_lowercase().as_str() {
        "gb" => value * 1024.0,
        "kb" => value / 1024.0,
        _ => value,
    };
    Some((mb.round() as u64).max(1))
}
