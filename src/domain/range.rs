//! Range matcher: reads taxonomy labels such as `"9 < HB <= 12"` as numeric
//! predicates and finds the first label a value satisfies.
//!
//! Labels are tokenized into numbers, comparison operators and identifiers,
//! then matched against four shapes:
//!
//! 1. single-sided inclusive: `X <= n`, `X >= n`
//! 2. two-sided: `a < X <= b` (any mix of `<`/`<=`, or `>`/`>=`)
//! 3. single-sided exclusive: `X < n`, `X > n`
//! 4. equality: `X == n`
//!
//! A label that fits none of the shapes is not a range and never matches.

use std::fmt;

/// Error for labels that are not range expressions.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RangeParseError {
    #[error("Unexpected character {0:?} in range label")]
    UnexpectedChar(char),

    #[error("Invalid number {0:?} in range label")]
    InvalidNumber(String),

    #[error("Label is not a range expression")]
    UnsupportedShape,
}

/// A comparison operator as written in a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
}

impl Comparison {
    /// Evaluate `lhs <op> rhs`.
    #[must_use]
    pub fn holds(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Self::Lt => lhs < rhs,
            Self::Le => lhs <= rhs,
            Self::Gt => lhs > rhs,
            Self::Ge => lhs >= rhs,
            Self::Eq => lhs == rhs,
        }
    }

    /// The operator obtained by swapping operands (`a < b` == `b > a`).
    #[must_use]
    pub fn flipped(self) -> Self {
        match self {
            Self::Lt => Self::Gt,
            Self::Le => Self::Ge,
            Self::Gt => Self::Lt,
            Self::Ge => Self::Le,
            Self::Eq => Self::Eq,
        }
    }

    fn is_inclusive(self) -> bool {
        matches!(self, Self::Le | Self::Ge)
    }

    fn is_ordering(self) -> bool {
        !matches!(self, Self::Eq)
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Eq => "==",
        })
    }
}

/// Structured form of a range label. Every bound is expressed with the
/// value on the left: `value <op> bound`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RangePredicate {
    /// `X <= n` or `X >= n`
    Inclusive { op: Comparison, bound: f64 },
    /// `a <op> X <op> b`, both sides must hold. `left` is `a`, `right` is `b`.
    Between {
        left_op: Comparison,
        left: f64,
        right_op: Comparison,
        right: f64,
    },
    /// `X < n` or `X > n`
    Exclusive { op: Comparison, bound: f64 },
    /// `X == n`
    Equal(f64),
}

impl RangePredicate {
    /// Parse a label into a predicate.
    ///
    /// # Errors
    /// Returns `RangeParseError` if the label is not one of the supported shapes.
    pub fn parse(label: &str) -> Result<Self, RangeParseError> {
        let tokens = tokenize(label)?;

        match tokens.as_slice() {
            // X op n
            [Token::Ident, Token::Op(op), Token::Number(n)] => Ok(Self::single(*op, *n)),
            // n op X
            [Token::Number(n), Token::Op(op), Token::Ident] => Ok(Self::single(op.flipped(), *n)),
            // a op1 X op2 b
            [Token::Number(a), Token::Op(op1), Token::Ident, Token::Op(op2), Token::Number(b)]
                if op1.is_ordering() && op2.is_ordering() =>
            {
                Ok(Self::Between {
                    left_op: op1.flipped(),
                    left: *a,
                    right_op: *op2,
                    right: *b,
                })
            }
            _ => Err(RangeParseError::UnsupportedShape),
        }
    }

    fn single(op: Comparison, bound: f64) -> Self {
        match op {
            Comparison::Eq => Self::Equal(bound),
            op if op.is_inclusive() => Self::Inclusive { op, bound },
            op => Self::Exclusive { op, bound },
        }
    }

    /// Test a value against the predicate.
    #[must_use]
    pub fn matches(&self, value: f64) -> bool {
        match *self {
            Self::Inclusive { op, bound } | Self::Exclusive { op, bound } => op.holds(value, bound),
            Self::Between {
                left_op,
                left,
                right_op,
                right,
            } => left_op.holds(value, left) && right_op.holds(value, right),
            Self::Equal(bound) => value == bound,
        }
    }
}

/// Return the first label (in order) whose predicate holds for `value`.
///
/// Labels that do not parse as ranges are skipped.
#[must_use]
pub fn match_range(value: f64, labels: &[String]) -> Option<&str> {
    labels
        .iter()
        .find(|label| {
            RangePredicate::parse(label)
                .map(|p| p.matches(value))
                .unwrap_or(false)
        })
        .map(String::as_str)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Number(f64),
    Op(Comparison),
    Ident,
}

fn tokenize(label: &str) -> Result<Vec<Token>, RangeParseError> {
    let chars: Vec<char> = label.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        if c.is_whitespace() {
            i += 1;
        } else if c.is_ascii_digit()
            || (c == '.' && next.is_some_and(|n| n.is_ascii_digit()))
            || (c == '-' && next.is_some_and(|n| n.is_ascii_digit() || n == '.'))
        {
            let start = i;
            i += 1;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            let n = text
                .parse::<f64>()
                .map_err(|_| RangeParseError::InvalidNumber(text.clone()))?;
            tokens.push(Token::Number(n));
        } else if c.is_alphabetic() || c == '_' {
            i += 1;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push(Token::Ident);
        } else {
            let (op, width) = match (c, next) {
                ('<', Some('=')) => (Comparison::Le, 2),
                ('>', Some('=')) => (Comparison::Ge, 2),
                ('=', Some('=')) => (Comparison::Eq, 2),
                ('<', _) => (Comparison::Lt, 1),
                ('>', _) => (Comparison::Gt, 1),
                _ => return Err(RangeParseError::UnexpectedChar(c)),
            };
            tokens.push(Token::Op(op));
            i += width;
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Container, Taxonomy};
    use proptest::prelude::*;

    fn labels(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_parse_shapes() {
        assert_eq!(
            RangePredicate::parse("HB <= 9"),
            Ok(RangePredicate::Inclusive { op: Comparison::Le, bound: 9.0 })
        );
        assert_eq!(
            RangePredicate::parse("EGFR >= 90"),
            Ok(RangePredicate::Inclusive { op: Comparison::Ge, bound: 90.0 })
        );
        assert_eq!(
            RangePredicate::parse("9 < HB <= 12"),
            Ok(RangePredicate::Between {
                left_op: Comparison::Gt,
                left: 9.0,
                right_op: Comparison::Le,
                right: 12.0,
            })
        );
        assert_eq!(
            RangePredicate::parse("Age > 78"),
            Ok(RangePredicate::Exclusive { op: Comparison::Gt, bound: 78.0 })
        );
        assert_eq!(RangePredicate::parse("Age == 40"), Ok(RangePredicate::Equal(40.0)));
    }

    #[test]
    fn test_reversed_single_sided() {
        let p = RangePredicate::parse("90 <= EGFR").expect("Should parse");
        assert_eq!(p, RangePredicate::Inclusive { op: Comparison::Ge, bound: 90.0 });
        assert!(p.matches(90.0));
        assert!(!p.matches(89.9));
    }

    #[test]
    fn test_non_range_labels_rejected() {
        assert_eq!(RangePredicate::parse("Stage 3"), Err(RangeParseError::UnsupportedShape));
        assert!(RangePredicate::parse("Male").is_err());
        assert!(RangePredicate::parse("HB <= ").is_err());
        assert!(RangePredicate::parse("HB ~ 9").is_err());
        assert!(RangePredicate::parse("1.2.3 < HB").is_err());
        assert!(RangePredicate::parse("9 == HB == 9").is_err());
    }

    #[test]
    fn test_two_sided_boundaries() {
        let p = RangePredicate::parse("9 < HB <= 12").expect("Should parse");
        assert!(!p.matches(9.0));
        assert!(p.matches(9.0001));
        assert!(p.matches(12.0));
        assert!(!p.matches(12.0001));
    }

    #[test]
    fn test_all_two_sided_operator_mixes() {
        let cases = [
            ("1 < X < 2", [false, true, false]),
            ("1 <= X < 2", [true, true, false]),
            ("1 < X <= 2", [false, true, true]),
            ("1 <= X <= 2", [true, true, true]),
            ("2 > X > 1", [false, true, false]),
            ("2 >= X >= 1", [true, true, true]),
        ];
        for (label, expected) in cases {
            let p = RangePredicate::parse(label).expect("Should parse");
            let got = [p.matches(1.0), p.matches(1.5), p.matches(2.0)];
            assert_eq!(got, expected, "{label}");
        }
    }

    #[test]
    fn test_nan_never_matches() {
        let taxonomy = Taxonomy::builtin();
        assert_eq!(match_range(f64::NAN, taxonomy.labels(Container::Hb)), None);
    }

    #[test]
    fn test_first_match_wins() {
        let overlapping = labels(&["X <= 10", "X <= 5", "X > 10"]);
        assert_eq!(match_range(3.0, &overlapping), Some("X <= 10"));
        assert_eq!(match_range(11.0, &overlapping), Some("X > 10"));
    }

    #[test]
    fn test_malformed_label_is_skipped() {
        let mixed = labels(&["Stage 1", "X ~ 4", "X < 5"]);
        assert_eq!(match_range(4.0, &mixed), Some("X < 5"));
        assert_eq!(match_range(6.0, &mixed), None);
    }

    #[test]
    fn test_age_groups() {
        let taxonomy = Taxonomy::builtin();
        let ages = taxonomy.labels(Container::AgeGroup);
        assert_eq!(match_range(39.9, ages), Some("Age < 40"));
        assert_eq!(match_range(40.0, ages), Some("Age == 40"));
        assert_eq!(match_range(45.0, ages), Some("40 < Age <= 45"));
        assert_eq!(match_range(78.0, ages), Some("75 < Age <= 78"));
        assert_eq!(match_range(78.5, ages), Some("Age > 78"));
    }

    proptest! {
        #[test]
        fn prop_match_is_member_of_container(value in -1000.0f64..1000.0, idx in 0usize..10) {
            let taxonomy = Taxonomy::builtin();
            let container = Container::ALL[idx];
            let list = taxonomy.labels(container);
            if let Some(label) = match_range(value, list) {
                prop_assert!(list.iter().any(|l| l == label));
            }
        }

        #[test]
        fn prop_numeric_containers_are_total(value in 0.0f64..500.0) {
            let taxonomy = Taxonomy::builtin();
            for container in [Container::AgeGroup, Container::DurationOfDiabetes, Container::Hb, Container::Hba, Container::Egfr] {
                prop_assert!(match_range(value, taxonomy.labels(container)).is_some());
            }
        }
    }
}
