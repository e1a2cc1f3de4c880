//! Formula parsing for mixtures and compounds.
//!
//! The two notations are deliberately different:
//!
//! * a **mixture** (`"Ti90Al6V4"`, `"H11.2/C50.9"`) lists element symbols
//!   followed by literal mass weights;
//! * a **compound** (`"H2O"`, `"SiC"`) lists element symbols followed by
//!   integer atom counts, converted to mass fractions with the molar masses.

use std::collections::HashMap;

use crate::element::ElementSet;
use crate::error::{Result, XraySimError};

const SEPARATORS: &[char] = &[' ', '\t', '/', '\\', ',', ';', ':'];

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Symbol(String),
    Number(String),
    Separator,
    Eos,
}

struct Tokenizer {
    chars: Vec<char>,
    pos: usize,
}

impl Tokenizer {
    fn new(input: &str) -> Self {
        Tokenizer {
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn next_token(&mut self, letters: fn(&[char], usize) -> usize) -> std::result::Result<Token, String> {
        if self.pos >= self.chars.len() {
            return Ok(Token::Eos);
        }

        let ch = self.chars[self.pos];

        if SEPARATORS.contains(&ch) {
            self.pos += 1;
            return Ok(Token::Separator);
        }

        if ch.is_ascii_digit() || ch == '.' {
            let start = self.pos;
            while self.pos < self.chars.len()
                && (self.chars[self.pos].is_ascii_digit() || self.chars[self.pos] == '.')
            {
                self.pos += 1;
            }
            return Ok(Token::Number(self.chars[start..self.pos].iter().collect()));
        }

        if ch.is_ascii_alphabetic() {
            let start = self.pos;
            self.pos = letters(&self.chars, start);
            return Ok(Token::Symbol(self.chars[start..self.pos].iter().collect()));
        }

        Err(format!(
            "unrecognized character '{}' at position {}",
            ch, self.pos
        ))
    }
}

/// Mixture symbols run over every consecutive letter, in the case given.
fn mixture_letters(chars: &[char], start: usize) -> usize {
    let mut pos = start;
    while pos < chars.len() && chars[pos].is_ascii_alphabetic() {
        pos += 1;
    }
    pos
}

/// Compound symbols are one uppercase letter and the lowercase letters after it.
fn compound_letters(chars: &[char], start: usize) -> usize {
    let mut pos = start + 1;
    while pos < chars.len() && chars[pos].is_ascii_lowercase() {
        pos += 1;
    }
    pos
}

/// Literal `symbol → weight` pairs of a mixture formula.
///
/// The weights are returned as written; `"Ti90Al6V4"` gives
/// `{Ti: 90, Al: 6, V: 4}`. A symbol written twice accumulates its weights.
pub fn mixture_weight_set(formula: &str) -> Result<HashMap<String, f64>> {
    let invalid = |msg: String| XraySimError::InvalidFormula(format!("{formula}: {msg}"));

    let mut tokenizer = Tokenizer::new(formula);
    let mut weights: HashMap<String, f64> = HashMap::new();
    let mut symbol: Option<String> = None;

    loop {
        let token = tokenizer.next_token(mixture_letters).map_err(invalid)?;
        match token {
            Token::Symbol(s) => {
                if let Some(previous) = symbol.replace(s) {
                    return Err(invalid(format!("missing weight after '{previous}'")));
                }
            }
            Token::Number(n) => {
                let Some(s) = symbol.take() else {
                    return Err(invalid(format!("weight '{n}' has no element")));
                };
                let weight: f64 = n
                    .parse()
                    .map_err(|_| invalid(format!("invalid weight '{n}'")))?;
                *weights.entry(s).or_insert(0.0) += weight;
            }
            Token::Separator => {
                if let Some(s) = &symbol {
                    return Err(invalid(format!("missing weight after '{s}'")));
                }
            }
            Token::Eos => break,
        }
    }

    if let Some(s) = symbol {
        return Err(invalid(format!("missing weight after '{s}'")));
    }
    if weights.is_empty() {
        return Err(invalid("no constituent".to_string()));
    }
    Ok(weights)
}

/// Atom counts of a compound formula; a symbol without a count counts once.
pub fn compound_atom_counts(formula: &str) -> Result<HashMap<String, u32>> {
    let invalid = |msg: String| XraySimError::InvalidFormula(format!("{formula}: {msg}"));

    let mut tokenizer = Tokenizer::new(formula);
    let mut counts: HashMap<String, u32> = HashMap::new();
    let mut symbol: Option<String> = None;

    loop {
        let token = tokenizer.next_token(compound_letters).map_err(invalid)?;
        match token {
            Token::Symbol(s) => {
                if !s.starts_with(|c: char| c.is_ascii_uppercase()) {
                    return Err(invalid(format!("'{s}' does not start with an uppercase letter")));
                }
                if let Some(previous) = symbol.replace(s) {
                    *counts.entry(previous).or_insert(0) += 1;
                }
            }
            Token::Number(n) => {
                let Some(s) = symbol.take() else {
                    return Err(invalid(format!("count '{n}' has no element")));
                };
                let count: u32 = n
                    .parse()
                    .map_err(|_| invalid(format!("invalid atom count '{n}'")))?;
                *counts.entry(s).or_insert(0) += count;
            }
            Token::Separator => {
                return Err(invalid("separators are not allowed in a compound".to_string()));
            }
            Token::Eos => break,
        }
    }

    if let Some(s) = symbol {
        *counts.entry(s).or_insert(0) += 1;
    }
    if counts.is_empty() {
        return Err(invalid("no constituent".to_string()));
    }
    Ok(counts)
}

/// Mass fractions of a compound: `count × molar mass / total molar mass`.
pub fn compound_weight_set(elements: &ElementSet, formula: &str) -> Result<HashMap<String, f64>> {
    let counts = compound_atom_counts(formula)?;

    let mut masses = HashMap::with_capacity(counts.len());
    for (symbol, &count) in &counts {
        let element = elements.find(symbol)?;
        masses.insert(symbol.clone(), f64::from(count) * element.molar_mass());
    }

    let total: f64 = masses.values().sum();
    if total <= 0.0 {
        return Err(XraySimError::InvalidFormula(format!(
            "zero weight formula: {formula}"
        )));
    }
    Ok(masses
        .into_iter()
        .map(|(symbol, mass)| (symbol, mass / total))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixture_tokens() {
        let weights = mixture_weight_set("Ti90Al6V4").unwrap();
        assert_eq!(weights.len(), 3);
        assert_eq!(weights["Ti"], 90.0);
        assert_eq!(weights["Al"], 6.0);
        assert_eq!(weights["V"], 4.0);
    }

    #[test]
    fn test_mixture_separators_and_decimals() {
        let weights = mixture_weight_set("H11.2 / C50.9, N1.3;O35.9").unwrap();
        assert_eq!(weights["H"], 11.2);
        assert_eq!(weights["C"], 50.9);
        assert_eq!(weights["N"], 1.3);
        assert_eq!(weights["O"], 35.9);
    }

    #[test]
    fn test_mixture_keeps_case_as_given() {
        let weights = mixture_weight_set("fe70cr30").unwrap();
        assert_eq!(weights["fe"], 70.0);
        assert_eq!(weights["cr"], 30.0);
    }

    #[test]
    fn test_mixture_missing_weight() {
        assert!(matches!(
            mixture_weight_set("Ti90Al"),
            Err(XraySimError::InvalidFormula(_))
        ));
        assert!(matches!(
            mixture_weight_set("Ti Al6"),
            Err(XraySimError::InvalidFormula(_))
        ));
        assert!(matches!(
            mixture_weight_set("90"),
            Err(XraySimError::InvalidFormula(_))
        ));
    }

    #[test]
    fn test_compound_counts() {
        let counts = compound_atom_counts("H2O").unwrap();
        assert_eq!(counts["H"], 2);
        assert_eq!(counts["O"], 1);

        let counts = compound_atom_counts("CaCO3").unwrap();
        assert_eq!(counts["Ca"], 1);
        assert_eq!(counts["C"], 1);
        assert_eq!(counts["O"], 3);
    }

    #[test]
    fn test_compound_rejects_mixture_notation() {
        assert!(compound_atom_counts("H 2").is_err());
        assert!(compound_atom_counts("h2o").is_err());
        assert!(compound_atom_counts("H0.5").is_err());
    }
}
