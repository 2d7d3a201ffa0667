// src/kernel/ast.rs
use std::fmt;

/// Parameter payload of a simple action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Params {
    /// Everything after the `:` up to the end of the line, trimmed.
    Line(String),
    /// Contents of a `{ ... }` block with the outer whitespace trimmed.
    /// Newlines and nested braces are kept verbatim.
    Block(String),
}

impl Params {
    /// The payload without any block braces.
    pub fn text(&self) -> &str {
        match self {
            Params::Line(s) | Params::Block(s) => s,
        }
    }

    /// The payload as written: block params get their braces back.
    pub fn raw(&self) -> String {
        match self {
            Params::Line(s) => s.clone(),
            Params::Block(s) => format!("{{{s}}}"),
        }
    }

    pub fn is_block(&self) -> bool {
        matches!(self, Params::Block(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElifBranch {
    pub condition: String,
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Simple {
        name: String,
        params: Option<Params>,
    },
    Conditional {
        condition: String,
        then_actions: Vec<Action>,
        elif_branches: Vec<ElifBranch>,
        else_actions: Vec<Action>,
    },
    /// `@iframe <selector> { ... }` and friends.
    Container {
        kind: String,
        target: String,
        actions: Vec<Action>,
    },
    /// A bare line: navigate there and run the default analysis.
    Url {
        target: String,
    },
}

impl Action {
    pub fn simple(name: impl Into<String>, params: Option<Params>) -> Self {
        Action::Simple {
            name: name.into(),
            params,
        }
    }

    /// Registry key used to dispatch this action.
    pub fn name(&self) -> &str {
        match self {
            Action::Simple { name, .. } => name,
            Action::Conditional { .. } => "if",
            Action::Container { kind, .. } => kind,
            Action::Url { .. } => "url",
        }
    }

    pub fn params(&self) -> Option<&Params> {
        match self {
            Action::Simple { params, .. } => params.as_ref(),
            _ => None,
        }
    }

    /// Param text of a simple action, `None` when absent or blank.
    pub fn param_text(&self) -> Option<&str> {
        self.params().map(Params::text).filter(|s| !s.trim().is_empty())
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Simple { name, params: None } => write!(f, "@{name}"),
            Action::Simple {
                name,
                params: Some(p),
            } => write!(f, "@{name}: {}", p.raw()),
            Action::Conditional {
                condition,
                then_actions,
                elif_branches,
                else_actions,
            } => {
                write!(f, "@if: {condition} {{{} actions}}", then_actions.len())?;
                for branch in elif_branches {
                    write!(
                        f,
                        " @elif: {} {{{} actions}}",
                        branch.condition,
                        branch.actions.len()
                    )?;
                }
                if !else_actions.is_empty() {
                    write!(f, " @else {{{} actions}}", else_actions.len())?;
                }
                Ok(())
            }
            Action::Container {
                kind,
                target,
                actions,
            } => write!(f, "@{kind}: {target} {{{} actions}}", actions.len()),
            Action::Url { target } => write!(f, "{target}"),
        }
    }
}

/// Pretty tree dump used by `a11ycheck check`.
pub fn render_tree(actions: &[Action]) -> String {
    let mut out = String::new();
    render_into(&mut out, actions, 0);
    out
}

fn render_into(out: &mut String, actions: &[Action], depth: usize) {
    let pad = "  ".repeat(depth);
    for action in actions {
        match action {
            Action::Conditional {
                condition,
                then_actions,
                elif_branches,
                else_actions,
            } => {
                out.push_str(&format!("{pad}if {condition}\n"));
                render_into(out, then_actions, depth + 1);
                for branch in elif_branches {
                    out.push_str(&format!("{pad}elif {}\n", branch.condition));
                    render_into(out, &branch.actions, depth + 1);
                }
                if !else_actions.is_empty() {
                    out.push_str(&format!("{pad}else\n"));
                    render_into(out, else_actions, depth + 1);
                }
            }
            Action::Container {
                kind,
                target,
                actions,
            } => {
                out.push_str(&format!("{pad}{kind} {target}\n"));
                render_into(out, actions, depth + 1);
            }
            Action::Url { target } => out.push_str(&format!("{pad}url {target}\n")),
            Action::Simple { name, params } => match params {
                None => out.push_str(&format!("{pad}{name}\n")),
                Some(Params::Line(p)) => out.push_str(&format!("{pad}{name}: {p}\n")),
                Some(Params::Block(p)) => {
                    let lines = p.lines().count();
                    out.push_str(&format!("{pad}{name}: {{block, {lines} line(s)}}\n"));
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_params_keep_braces_in_raw_form() {
        let p = Params::Block("let x = {a: 1};".into());
        assert_eq!(p.text(), "let x = {a: 1};");
        assert_eq!(p.raw(), "{let x = {a: 1};}");
        assert!(p.is_block());
    }

    #[test]
    fn display_matches_script_syntax() {
        let a = Action::simple("wait", Some(Params::Line("2".into())));
        assert_eq!(a.to_string(), "@wait: 2");
        assert_eq!(Action::simple("back", None).to_string(), "@back");
        assert_eq!(a.name(), "wait");
        assert_eq!(a.param_text(), Some("2"));
    }

    #[test]
    fn tree_dump_indents_branches() {
        let tree = vec![Action::Conditional {
            condition: "x == 1".into(),
            then_actions: vec![Action::simple("back", None)],
            elif_branches: vec![],
            else_actions: vec![Action::Url {
                target: "/home".into(),
            }],
        }];
        let out = render_tree(&tree);
        assert_eq!(out, "if x == 1\n  back\nelse\n  url /home\n");
    }
}
