//! Dice expressions.
//!
//! Supports the subset of dice notation authored automation uses:
//! `NdM`, integer constants, `+`/`-` between terms, `khK`/`klK` to keep
//! the highest/lowest dice (advantage), and a bracketed annotation after
//! any term (`2d6 [fire]`).
//!
//! ```
//! use effect_automation::core::DiceRng;
//! use effect_automation::eval::DiceExpr;
//!
//! let expr = DiceExpr::parse("2d6 [fire] + 3").unwrap();
//! let outcome = expr.roll(&mut DiceRng::new(1)).unwrap();
//! assert!((5..=15).contains(&outcome.total));
//! assert!(outcome.display.contains("[fire]"));
//! ```

use std::fmt;

use thiserror::Error;

use crate::core::DiceRng;

/// Upper bound on dice in one term.
const MAX_DICE: u32 = 1000;

/// Errors parsing a dice expression.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("invalid dice expression `{expr}`: {reason}")]
pub struct DiceError {
    /// The offending expression.
    pub expr: String,
    /// What was wrong.
    pub reason: String,
}

/// Which dice in a term are kept.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Keep {
    /// Keep every die.
    All,
    /// Keep the highest N.
    Highest(u32),
    /// Keep the lowest N.
    Lowest(u32),
}

/// One additive term of a dice expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TermKind {
    /// `count` dice with `sides` faces.
    Dice { count: u32, sides: u32, keep: Keep },
    /// A constant.
    Constant(i64),
}

/// A signed, optionally annotated term.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiceTerm {
    /// Whether the term is subtracted.
    pub negative: bool,
    /// The term body.
    pub kind: TermKind,
    /// Bracketed annotation, without brackets.
    pub annotation: Option<String>,
}

/// A parsed dice expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiceExpr {
    terms: Vec<DiceTerm>,
}

/// The result of rolling a dice expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RollOutcome {
    /// Sum of all kept dice and constants.
    pub total: i64,
    /// Human-readable breakdown, e.g. ``1d20 (14) + 5 = `19` ``.
    pub display: String,
    /// The kept value of the first d20 term, if any.
    pub natural: Option<i64>,
}

impl DiceExpr {
    /// Parse an expression.
    pub fn parse(src: &str) -> Result<Self, DiceError> {
        let err = |reason: &str| DiceError {
            expr: src.to_string(),
            reason: reason.to_string(),
        };
        let chars: Vec<char> = src.chars().filter(|c| !c.is_whitespace()).collect();
        let mut terms = Vec::new();
        let mut i = 0;

        while i < chars.len() {
            let mut negative = false;
            if !terms.is_empty() || chars[i] == '-' || chars[i] == '+' {
                match chars[i] {
                    '+' => i += 1,
                    '-' => {
                        negative = true;
                        i += 1;
                    }
                    _ => return Err(err("expected `+` or `-` between terms")),
                }
            }

            let count = read_number(&chars, &mut i);
            let kind = if chars.get(i) == Some(&'d') {
                i += 1;
                let sides = read_number(&chars, &mut i).ok_or_else(|| err("missing die size"))?;
                let count = count.unwrap_or(1);
                let keep = match (chars.get(i), chars.get(i + 1)) {
                    (Some(&'k'), Some(&which @ ('h' | 'l'))) => {
                        i += 2;
                        let n = read_number(&chars, &mut i).unwrap_or(1);
                        let n = u32::try_from(n).map_err(|_| err("keep count out of range"))?;
                        if which == 'h' {
                            Keep::Highest(n)
                        } else {
                            Keep::Lowest(n)
                        }
                    }
                    _ => Keep::All,
                };
                if count > i64::from(MAX_DICE) {
                    return Err(err("too many dice"));
                }
                TermKind::Dice {
                    count: count as u32,
                    sides: u32::try_from(sides).map_err(|_| err("die size out of range"))?,
                    keep,
                }
            } else {
                TermKind::Constant(count.ok_or_else(|| err("expected a number or dice"))?)
            };

            let annotation = if chars.get(i) == Some(&'[') {
                let close = chars[i..]
                    .iter()
                    .position(|c| *c == ']')
                    .ok_or_else(|| err("unclosed annotation"))?;
                let text: String = chars[i + 1..i + close].iter().collect();
                i += close + 1;
                Some(text)
            } else {
                None
            };

            terms.push(DiceTerm {
                negative,
                kind,
                annotation,
            });
        }

        if terms.is_empty() {
            return Err(err("empty expression"));
        }
        Ok(Self { terms })
    }

    /// The terms of this expression.
    #[must_use]
    pub fn terms(&self) -> &[DiceTerm] {
        &self.terms
    }

    /// Double the number of dice in every dice term (critical hits).
    #[must_use]
    pub fn doubled(&self) -> Self {
        self.scaled(2)
    }

    /// Multiply the number of dice in every dice term.
    #[must_use]
    pub fn scaled(&self, factor: u32) -> Self {
        let terms = self
            .terms
            .iter()
            .map(|t| {
                let kind = match &t.kind {
                    TermKind::Dice { count, sides, keep } => TermKind::Dice {
                        count: count.saturating_mul(factor).min(MAX_DICE),
                        sides: *sides,
                        keep: *keep,
                    },
                    other => other.clone(),
                };
                DiceTerm {
                    negative: t.negative,
                    kind,
                    annotation: t.annotation.clone(),
                }
            })
            .collect();
        Self { terms }
    }

    /// Roll the expression. Fails if the total does not fit in an `i64`.
    pub fn roll(&self, rng: &mut DiceRng) -> Result<RollOutcome, DiceError> {
        let mut total = 0i64;
        let mut natural = None;
        let mut parts = Vec::with_capacity(self.terms.len());

        for term in &self.terms {
            let (value, text) = match &term.kind {
                TermKind::Constant(v) => (*v, v.to_string()),
                TermKind::Dice { count, sides, keep } => {
                    let rolls: Vec<i64> = (0..*count).map(|_| rng.roll_die(*sides)).collect();
                    let kept = kept_indices(&rolls, *keep);
                    let value: i64 = kept.iter().map(|&idx| rolls[idx]).sum();
                    if *sides == 20 && natural.is_none() {
                        natural = kept.first().map(|&idx| rolls[idx]);
                    }
                    let shown: Vec<String> = rolls
                        .iter()
                        .enumerate()
                        .map(|(idx, r)| {
                            if kept.contains(&idx) {
                                r.to_string()
                            } else {
                                format!("~~{r}~~")
                            }
                        })
                        .collect();
                    let keep_text = match keep {
                        Keep::All => String::new(),
                        Keep::Highest(n) => format!("kh{n}"),
                        Keep::Lowest(n) => format!("kl{n}"),
                    };
                    (value, format!("{count}d{sides}{keep_text} ({})", shown.join(", ")))
                }
            };

            let next = if term.negative {
                total.checked_sub(value)
            } else {
                total.checked_add(value)
            };
            total = next.ok_or_else(|| DiceError {
                expr: self.to_string(),
                reason: "total out of range".to_string(),
            })?;
            let text = match &term.annotation {
                Some(note) => format!("{text} [{note}]"),
                None => text,
            };
            parts.push((term.negative, text));
        }

        let mut display = String::new();
        for (idx, (negative, text)) in parts.iter().enumerate() {
            match (idx, negative) {
                (0, true) => display.push('-'),
                (0, false) => {}
                (_, true) => display.push_str(" - "),
                (_, false) => display.push_str(" + "),
            }
            display.push_str(text);
        }
        display.push_str(&format!(" = `{total}`"));

        Ok(RollOutcome {
            total,
            display,
            natural,
        })
    }
}

impl fmt::Display for DiceExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, term) in self.terms.iter().enumerate() {
            match (idx, term.negative) {
                (0, true) => f.write_str("-")?,
                (0, false) => {}
                (_, true) => f.write_str(" - ")?,
                (_, false) => f.write_str(" + ")?,
            }
            match &term.kind {
                TermKind::Constant(v) => write!(f, "{v}")?,
                TermKind::Dice { count, sides, keep } => {
                    write!(f, "{count}d{sides}")?;
                    match keep {
                        Keep::All => {}
                        Keep::Highest(n) => write!(f, "kh{n}")?,
                        Keep::Lowest(n) => write!(f, "kl{n}")?,
                    }
                }
            }
            if let Some(note) = &term.annotation {
                write!(f, " [{note}]")?;
            }
        }
        Ok(())
    }
}

fn read_number(chars: &[char], i: &mut usize) -> Option<i64> {
    let start = *i;
    while *i < chars.len() && chars[*i].is_ascii_digit() {
        *i += 1;
    }
    if start == *i {
        return None;
    }
    chars[start..*i].iter().collect::<String>().parse().ok()
}

fn kept_indices(rolls: &[i64], keep: Keep) -> Vec<usize> {
    let mut order: Vec<usize> = (0..rolls.len()).collect();
    match keep {
        Keep::All => return order,
        Keep::Highest(_) => order.sort_by(|&a, &b| rolls[b].cmp(&rolls[a])),
        Keep::Lowest(_) => order.sort_by(|&a, &b| rolls[a].cmp(&rolls[b])),
    }
    let n = match keep {
        Keep::Highest(n) | Keep::Lowest(n) => n as usize,
        Keep::All => rolls.len(),
    };
    order.truncate(n);
    order
}

/// Parse and roll in one step.
pub fn roll(src: &str, rng: &mut DiceRng) -> Result<RollOutcome, DiceError> {
    DiceExpr::parse(src)?.roll(rng)
}

/// The d20 expression for an advantage state: `1` advantage, `-1`
/// disadvantage, `0` straight.
#[must_use]
pub fn d20_for(adv: i64) -> &'static str {
    match adv.signum() {
        1 => "2d20kh1",
        -1 => "2d20kl1",
        _ => "1d20",
    }
}

/// Cantrip dice multiplier for a caster level.
#[must_use]
pub fn cantrip_scale(caster_level: i64) -> u32 {
    match caster_level {
        i64::MIN..=4 => 1,
        5..=10 => 2,
        11..=16 => 3,
        _ => 4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_terms() {
        let expr = DiceExpr::parse("2d6 + 3 - 1d4 [cold]").unwrap();
        assert_eq!(expr.terms().len(), 3);
        assert_eq!(
            expr.terms()[0].kind,
            TermKind::Dice {
                count: 2,
                sides: 6,
                keep: Keep::All
            }
        );
        assert!(expr.terms()[2].negative);
        assert_eq!(expr.terms()[2].annotation.as_deref(), Some("cold"));
    }

    #[test]
    fn test_constant_roll() {
        let outcome = roll("5", &mut DiceRng::new(0)).unwrap();
        assert_eq!(outcome.total, 5);
        assert_eq!(outcome.display, "5 = `5`");
        assert_eq!(outcome.natural, None);
    }

    #[test]
    fn test_leading_negative() {
        let outcome = roll("-3", &mut DiceRng::new(0)).unwrap();
        assert_eq!(outcome.total, -3);
    }

    #[test]
    fn test_d20_natural() {
        let mut rng = DiceRng::new(3);
        for _ in 0..50 {
            let outcome = roll("1d20+4", &mut rng).unwrap();
            let natural = outcome.natural.unwrap();
            assert_eq!(outcome.total, natural + 4);
        }
    }

    #[test]
    fn test_advantage_keeps_highest() {
        let mut rng = DiceRng::new(11);
        for _ in 0..50 {
            let outcome = roll(d20_for(1), &mut rng).unwrap();
            assert_eq!(Some(outcome.total), outcome.natural);
            assert!(outcome.display.contains("~~"));
        }
    }

    #[test]
    fn test_doubled() {
        let expr = DiceExpr::parse("1d8+2").unwrap().doubled();
        assert_eq!(
            expr.terms()[0].kind,
            TermKind::Dice {
                count: 2,
                sides: 8,
                keep: Keep::All
            }
        );
        assert_eq!(expr.terms()[1].kind, TermKind::Constant(2));
    }

    #[test]
    fn test_cantrip_scale() {
        assert_eq!(cantrip_scale(1), 1);
        assert_eq!(cantrip_scale(5), 2);
        assert_eq!(cantrip_scale(11), 3);
        assert_eq!(cantrip_scale(20), 4);
    }

    #[test]
    fn test_invalid() {
        assert!(DiceExpr::parse("").is_err());
        assert!(DiceExpr::parse("1d").is_err());
        assert!(DiceExpr::parse("2d6 * 3").is_err());
        assert!(DiceExpr::parse("1d6 [fire").is_err());
        assert!(DiceExpr::parse("abc").is_err());
        assert!(DiceExpr::parse("2d20kh4294967296").is_err());
    }

    #[test]
    fn test_total_overflow_is_an_error() {
        let mut rng = DiceRng::new(0);
        let err = roll("9223372036854775807 + 1", &mut rng).unwrap_err();
        assert_eq!(err.reason, "total out of range");
        assert!(roll("-9223372036854775807 - 2", &mut rng).is_err());
        assert_eq!(roll("9223372036854775807 - 1", &mut rng).unwrap().total, i64::MAX - 1);
    }

    #[test]
    fn test_display_renders_notation() {
        let expr = DiceExpr::parse("2d20kh1 [fire] - 3").unwrap();
        assert_eq!(expr.to_string(), "2d20kh1 [fire] - 3");
    }
}
