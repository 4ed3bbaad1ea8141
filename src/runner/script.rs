//! Execution of module scripts against the registry.

use std::rc::Rc;

use tracing::info;

use crate::parser::ast::Statement;
use crate::parser::ScriptParser;
use crate::runner::error::LoaderError;
use crate::runner::scheduler::{LoadContext, Request};

/// Parses `source` (fetched from `url`) and runs it in `ctx`.
pub fn run_script(
    source: &str,
    url: &str,
    ctx: &mut LoadContext<'_>,
) -> Result<(), LoaderError> {
    let script = ScriptParser::parse_to_script(source).map_err(|e| LoaderError::Script {
        url: url.to_string(),
        message: e.to_string(),
    })?;
    execute_statements(&script.body, url, ctx)
}

pub fn execute_statements(
    statements: &[Statement],
    url: &str,
    ctx: &mut LoadContext<'_>,
) -> Result<(), LoaderError> {
    for statement in statements {
        match statement {
            Statement::Define { path, value: None } => {
                ctx.registry_mut().create_namespaces(path)?;
            }
            Statement::Define {
                path,
                value: Some(literal),
            } => {
                ctx.registry_mut().assign(path, literal.clone().into())?;
            }
            Statement::Log(message) => {
                info!(scope = %ctx.scope(), "{}", message);
            }
            Statement::Require { requires, body } => {
                let body = Rc::clone(body);
                let source_url = url.to_string();
                let request = Request::new(requires.clone())
                    .in_scope(ctx.scope().clone())
                    .then(move |ctx| {
                        if let Err(e) = execute_statements(&body, &source_url, ctx) {
                            ctx.report(e);
                        }
                    });
                ctx.require(request);
            }
        }
    }
    Ok(())
}
