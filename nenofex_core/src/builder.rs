use std::collections::HashMap;

use crate::error::BuilderError;
use crate::graph::Graph;
use crate::node::NodeId;

/// Builds an NNF graph from a small s-expression-like text format:
/// `and(a, or(b, not(c)), d)`. Input must already be in negation normal
/// form; `not(...)` may only wrap a single literal name, matching the
/// NNF invariant the rest of the crate relies on. This stands in for the
/// full limboole grammar, which is out of scope.
pub struct Builder {
    graph: Graph,
    vars: HashMap<String, crate::variable::VarId>,
}

impl Builder {
    pub fn new() -> Self {
        Builder {
            graph: Graph::new(),
            vars: HashMap::new(),
        }
    }

    pub fn parse(
        mut self,
        text: &str,
    ) -> Result<(Graph, NodeId, HashMap<String, crate::variable::VarId>), BuilderError> {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return Err(BuilderError::NoRoot);
        }
        let mut pos = 0;
        let root = self.parse_term(&tokens, &mut pos)?;
        if pos != tokens.len() {
            return Err(BuilderError::UnexpectedToken {
                expected: "end of input",
                found: tokens[pos].clone(),
            });
        }
        self.graph.set_root(root);
        Ok((self.graph, root, self.vars))
    }

    fn var_for(&mut self, name: &str) -> crate::variable::VarId {
        if let Some(&id) = self.vars.get(name) {
            id
        } else {
            let id = self.graph.new_var();
            self.vars.insert(name.to_string(), id);
            id
        }
    }

    fn parse_term(&mut self, tokens: &[String], pos: &mut usize) -> Result<NodeId, BuilderError> {
        let token = tokens.get(*pos).ok_or(BuilderError::UnexpectedToken {
            expected: "a term",
            found: "end of input".to_string(),
        })?;

        match token.as_str() {
            "and" | "or" => {
                let is_and = token == "and";
                *pos += 1;
                expect(tokens, pos, "(")?;
                let mut children = Vec::new();
                loop {
                    children.push(self.parse_term(tokens, pos)?);
                    match tokens.get(*pos).map(String::as_str) {
                        Some(",") => {
                            *pos += 1;
                        }
                        Some(")") => {
                            *pos += 1;
                            break;
                        }
                        other => {
                            return Err(BuilderError::UnexpectedToken {
                                expected: "',' or ')'",
                                found: other.unwrap_or("end of input").to_string(),
                            })
                        }
                    }
                }
                if children.is_empty() {
                    return Err(BuilderError::EmptyOperator(if is_and { "and" } else { "or" }));
                }
                Ok(if is_and {
                    self.graph.and_node(children)
                } else {
                    self.graph.or_node(children)
                })
            }
            "not" => {
                *pos += 1;
                expect(tokens, pos, "(")?;
                let name = tokens.get(*pos).cloned().ok_or(BuilderError::UnexpectedToken {
                    expected: "a literal name",
                    found: "end of input".to_string(),
                })?;
                *pos += 1;
                expect(tokens, pos, ")")?;
                let var = self.var_for(&name);
                Ok(self.graph.literal_node(var, false))
            }
            "(" | ")" | "," => Err(BuilderError::UnexpectedToken {
                expected: "a term",
                found: token.clone(),
            }),
            name => {
                *pos += 1;
                let var = self.var_for(name);
                Ok(self.graph.literal_node(var, true))
            }
        }
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

fn expect(tokens: &[String], pos: &mut usize, expected: &'static str) -> Result<(), BuilderError> {
    match tokens.get(*pos).map(String::as_str) {
        Some(t) if t == expected => {
            *pos += 1;
            Ok(())
        }
        other => Err(BuilderError::UnexpectedToken {
            expected,
            found: other.unwrap_or("end of input").to_string(),
        }),
    }
}

fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c == '(' || c == ')' || c == ',' {
            tokens.push(c.to_string());
            chars.next();
        } else {
            let mut ident = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() || c == '(' || c == ')' || c == ',' {
                    break;
                }
                ident.push(c);
                chars.next();
            }
            tokens.push(ident);
        }
    }
    tokens
}
