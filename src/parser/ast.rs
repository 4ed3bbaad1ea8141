use std::rc::Rc;

/// A parsed module script.
#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `define a.b.c;` or `define a.b.c = <literal>;`
    Define {
        path: String,
        value: Option<Literal>,
    },
    /// `require x.y, vendor/lib.js { ... }`
    ///
    /// The body is shared so a deferred callback can own it without cloning the tree.
    Require {
        requires: Vec<String>,
        body: Rc<Vec<Statement>>,
    },
    /// `log "message";`
    Log(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Str(String),
    Number(f64),
    Bool(bool),
    Null,
}

impl Script {
    /// Every namespace this script requires, in source order, including nested blocks.
    pub fn required_names(&self) -> Vec<&str> {
        let mut names = vec![];
        collect_required(&self.body, &mut names);
        names
    }
}

fn collect_required<'a>(statements: &'a [Statement], out: &mut Vec<&'a str>) {
    for statement in statements {
        if let Statement::Require { requires, body } = statement {
            out.extend(requires.iter().map(|r| r.as_str()));
            collect_required(body, out);
        }
    }
}
