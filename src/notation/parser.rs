use std::collections::HashMap;

use crate::complex::{BondTest, ComplexGraph, Molecule, Site};
use crate::notation::error::NotationError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum StateToken {
    Named(String),
    Wildcard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ComponentToken {
    pub name: String,
    pub state: Option<(StateToken, usize)>,
    pub labels: Vec<String>,
    pub wildcard: Option<(BondTest, usize)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MoleculeToken {
    pub name: String,
    pub components: Vec<ComponentToken>,
    pub compartment: Option<String>,
}

struct Cursor {
    chars: Vec<char>,
    pos: usize,
}

impl Cursor {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        Some(ch)
    }

    fn expect(&mut self, want: char) -> Result<(), NotationError> {
        match self.bump() {
            Some(ch) if ch == want => Ok(()),
            Some(ch) => Err(NotationError::UnexpectedChar {
                pos: self.pos - 1,
                ch,
            }),
            None => Err(NotationError::UnexpectedEnd),
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn unexpected(&self) -> NotationError {
        match self.peek() {
            Some(ch) => NotationError::UnexpectedChar { pos: self.pos, ch },
            None => NotationError::UnexpectedEnd,
        }
    }

    fn name(&mut self) -> Result<String, NotationError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.unexpected());
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn digits(&mut self) -> Result<String, NotationError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.unexpected());
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }
}

/// Splits a complex string into molecule tokens. Bond labels stay unresolved.
pub(crate) fn tokenize(input: &str) -> Result<Vec<MoleculeToken>, NotationError> {
    let mut cur = Cursor {
        chars: input.chars().collect(),
        pos: 0,
    };
    cur.skip_ws();
    if cur.peek().is_none() {
        return Err(NotationError::EmptyInput);
    }

    let mut molecules = Vec::new();
    loop {
        cur.skip_ws();
        molecules.push(parse_molecule(&mut cur)?);
        cur.skip_ws();
        match cur.peek() {
            None => break,
            Some('.') => {
                cur.pos += 1;
            }
            Some(_) => return Err(cur.unexpected()),
        }
    }
    Ok(molecules)
}

fn parse_molecule(cur: &mut Cursor) -> Result<MoleculeToken, NotationError> {
    let name = cur.name()?;
    let mut components = Vec::new();
    if cur.peek() == Some('(') {
        cur.pos += 1;
        cur.skip_ws();
        if cur.peek() == Some(')') {
            cur.pos += 1;
        } else {
            loop {
                cur.skip_ws();
                components.push(parse_component(cur)?);
                cur.skip_ws();
                match cur.bump() {
                    Some(',') => continue,
                    Some(')') => break,
                    Some(ch) => {
                        return Err(NotationError::UnexpectedChar {
                            pos: cur.pos - 1,
                            ch,
                        })
                    }
                    None => return Err(NotationError::UnexpectedEnd),
                }
            }
        }
    }
    let compartment = if cur.peek() == Some('@') {
        cur.pos += 1;
        Some(cur.name()?)
    } else {
        None
    };
    Ok(MoleculeToken {
        name,
        components,
        compartment,
    })
}

fn parse_component(cur: &mut Cursor) -> Result<ComponentToken, NotationError> {
    let name = cur.name()?;
    let mut state = None;
    let mut labels = Vec::new();
    let mut wildcard = None;

    if cur.peek() == Some('~') {
        cur.pos += 1;
        let pos = cur.pos;
        if cur.peek() == Some('?') {
            cur.pos += 1;
            state = Some((StateToken::Wildcard, pos));
        } else {
            state = Some((StateToken::Named(cur.name()?), pos));
        }
    }

    while cur.peek() == Some('!') {
        cur.pos += 1;
        let pos = cur.pos;
        let test = match cur.peek() {
            Some('+') => {
                cur.pos += 1;
                Some(BondTest::Bound)
            }
            Some('?') => {
                cur.pos += 1;
                Some(BondTest::Any)
            }
            Some('=') => {
                cur.pos += 1;
                let n = cur.digits()?;
                let n = n
                    .parse::<usize>()
                    .map_err(|_| NotationError::UnexpectedChar { pos, ch: '=' })?;
                Some(BondTest::Exactly(n))
            }
            Some(c) if c.is_ascii_digit() => {
                labels.push(cur.digits()?);
                None
            }
            _ => return Err(cur.unexpected()),
        };
        if let Some(test) = test {
            if wildcard.is_some() {
                return Err(NotationError::UnexpectedChar {
                    pos,
                    ch: cur.chars[pos],
                });
            }
            wildcard = Some((test, pos));
        }
    }

    Ok(ComponentToken {
        name,
        state,
        labels,
        wildcard,
    })
}

/// Builds a graph from molecule tokens, converting each component token with
/// `make`, then pairing bond labels.
pub(crate) fn build<C, F>(
    tokens: Vec<MoleculeToken>,
    mut make: F,
) -> Result<ComplexGraph<C>, NotationError>
where
    F: FnMut(&ComponentToken) -> Result<C, NotationError>,
{
    let mut graph = ComplexGraph::new();
    let mut open: HashMap<String, Vec<Site>> = HashMap::new();
    let mut label_order: Vec<String> = Vec::new();

    for (m, mol) in tokens.iter().enumerate() {
        let mut components = Vec::with_capacity(mol.components.len());
        for (c, comp) in mol.components.iter().enumerate() {
            components.push(make(comp)?);
            for label in &comp.labels {
                let ends = open.entry(label.clone()).or_insert_with(|| {
                    label_order.push(label.clone());
                    Vec::new()
                });
                ends.push(Site::new(m, c));
                if ends.len() > 2 {
                    return Err(NotationError::BondLabelReused {
                        label: label.clone(),
                    });
                }
            }
        }
        let mut molecule = Molecule::new(mol.name.clone(), components);
        molecule.compartment = mol.compartment.clone();
        graph.add_molecule(molecule);
    }

    for label in label_order {
        let ends = &open[&label];
        if ends.len() < 2 {
            return Err(NotationError::UnpairedBond { label });
        }
        if ends[0] == ends[1] {
            return Err(NotationError::SelfBond { label });
        }
        graph.add_bond(ends[0], ends[1]);
    }
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_molecule_with_everything() {
        let toks = tokenize("A(b~P!1!+,c~?)@cyt").unwrap();
        assert_eq!(toks.len(), 1);
        let a = &toks[0];
        assert_eq!(a.name, "A");
        assert_eq!(a.compartment.as_deref(), Some("cyt"));
        assert_eq!(a.components[0].labels, vec!["1".to_string()]);
        assert_eq!(a.components[0].wildcard.map(|w| w.0), Some(BondTest::Bound));
        assert_eq!(
            a.components[1].state.as_ref().map(|s| &s.0),
            Some(&StateToken::Wildcard)
        );
    }

    #[test]
    fn bare_name_has_no_components() {
        let toks = tokenize("Trash").unwrap();
        assert!(toks[0].components.is_empty());
    }

    #[test]
    fn exact_bond_count() {
        let toks = tokenize("A(b!=2)").unwrap();
        assert_eq!(
            toks[0].components[0].wildcard.map(|w| w.0),
            Some(BondTest::Exactly(2))
        );
    }

    #[test]
    fn errors() {
        assert_eq!(tokenize("  "), Err(NotationError::EmptyInput));
        assert_eq!(tokenize("A(b"), Err(NotationError::UnexpectedEnd));
        assert_eq!(
            tokenize("A(b)B()"),
            Err(NotationError::UnexpectedChar { pos: 4, ch: 'B' })
        );
        assert!(tokenize("A(b!+!?)").is_err());
        assert!(tokenize("A(b!x)").is_err());
    }
}
