//! Expression engine integration.
//!
//! The engine is a minijinja [`Environment`] owned by the renderer. It is
//! created once at init with the configured delimiter pair and the baseline
//! function table, and fragments are added to it as they register, so parse
//! errors surface from the load call that introduced them.
//!
//! Render calls never mutate the shared environment. Layout-mode rendering
//! clones it and layers the per-call `yield` binding onto the clone
//! ([`bind_yield`]); the clone runs the layout only, the wrapped target
//! renders against the unbound baseline, and everything is dropped when the
//! call returns. This is the render-scoped function-table overlay that makes
//! concurrent renders safe: renders borrow the renderer immutably and the
//! shared table is never rebound in place.

use minijinja::syntax::SyntaxConfig;
use minijinja::value::{Value, ValueKind};
use minijinja::{Environment, ErrorKind, State, UndefinedBehavior};
use tracing::trace;

use crate::error::{RenderError, Result};
use crate::funcs::{self, FuncRegistry};
use crate::options::Delims;
use crate::store::strip_ext;

/// Build the baseline environment: syntax config, undefined behavior, and
/// the three function tiers (built-in stubs, std helpers, customs).
pub(crate) fn new_environment(
    delims: &Delims,
    ext_names: &[String],
    funcs: &FuncRegistry,
) -> Result<Environment<'static>> {
    let mut env = Environment::new();

    let syntax = SyntaxConfig::builder()
        .variable_delimiters(delims.left.clone(), delims.right.clone())
        .build()
        .map_err(|source| RenderError::Delims {
            left: delims.left.clone(),
            right: delims.right.clone(),
            source,
        })?;
    env.set_syntax(syntax);
    env.set_undefined_behavior(UndefinedBehavior::Chainable);

    install_builtins(&mut env, ext_names);
    funcs::install_std(&mut env);
    funcs.install(&mut env);
    Ok(env)
}

/// Install the built-in composition stubs.
///
/// `yield` here is only the fail-loudly placeholder; the real binding is
/// layered on per render call by [`bind_yield`]. `include` and `current_tpl`
/// are fully functional at this tier because they resolve everything they
/// need through the engine state at call time.
fn install_builtins(env: &mut Environment<'static>, ext_names: &[String]) {
    env.add_function("yield", || -> std::result::Result<Value, minijinja::Error> {
        Err(minijinja::Error::new(
            ErrorKind::InvalidOperation,
            "yield called with no layout defined",
        ))
    });

    env.add_function("current_tpl", |state: &State| -> String {
        let name = state.name();
        // Ephemeral render_str templates get a synthetic <string> name.
        if name.starts_with('<') {
            String::new()
        } else {
            name.to_string()
        }
    });

    let exts: Vec<String> = ext_names
        .iter()
        .map(|e| {
            if e.starts_with('.') {
                e.clone()
            } else {
                format!(".{e}")
            }
        })
        .collect();
    env.add_function(
        "include",
        move |state: &State,
              name: String,
              payload: Option<Value>|
              -> std::result::Result<Value, minijinja::Error> {
            let env = state.env();
            let cleaned = strip_ext(&name, &exts);
            let template = match env.get_template(cleaned) {
                Ok(t) => t,
                Err(_) if cleaned.len() != name.len() => match env.get_template(&name) {
                    Ok(t) => t,
                    Err(_) => return Err(include_not_found(&name)),
                },
                Err(_) => return Err(include_not_found(&name)),
            };

            // Explicit data wins; otherwise the caller's ambient payload
            // flows through.
            let ctx = match payload {
                Some(value) => build_context(&value),
                None => {
                    let ambient = state.lookup("data").unwrap_or(Value::UNDEFINED);
                    build_context(&ambient)
                }
            };
            trace!("include template: {}", template.name());
            let out = template.render(&ctx)?;
            Ok(Value::from_safe_string(out))
        },
    );
}

fn include_not_found(name: &str) -> minijinja::Error {
    minijinja::Error::new(
        ErrorKind::TemplateNotFound,
        format!("the include template {name:?} is not found"),
    )
}

/// Layer the per-render `yield` binding onto an environment clone.
///
/// The closure captures the wrapped target's canonical name, the already
/// built context, and `base`: the environment as it was *before* the
/// binding was added. The target renders against `base`, so the binding is
/// visible only while the layout itself executes; a `yield()` inside the
/// wrapped page still hits the fail-loudly stub instead of re-rendering the
/// page recursively. The binding lives exactly as long as the clone.
pub(crate) fn bind_yield(
    env: &mut Environment<'static>,
    base: Environment<'static>,
    target: String,
    ctx: Value,
) {
    env.add_function(
        "yield",
        move || -> std::result::Result<Value, minijinja::Error> {
            trace!("yield target template: {target}");
            let template = base.get_template(&target)?;
            let out = template.render(&ctx)?;
            Ok(Value::from_safe_string(out))
        },
    );
}

/// Shape the caller's data for template consumption.
///
/// The whole payload is exposed as the `data` variable; when it is a map,
/// its fields are additionally exposed as top-level variables. `data`
/// always wins a key collision.
pub(crate) fn build_context(payload: &Value) -> Value {
    let mut pairs: Vec<(String, Value)> = Vec::new();
    if payload.kind() == ValueKind::Map {
        if let Ok(keys) = payload.try_iter() {
            for key in keys {
                if let Ok(value) = payload.get_item(&key) {
                    pairs.push((key.to_string(), value));
                }
            }
        }
    }
    pairs.push(("data".to_string(), payload.clone()));
    Value::from_iter(pairs)
}

/// Map an engine error to the crate taxonomy: syntax diagnostics become
/// parse errors, everything else is an execution failure.
pub(crate) fn classify(name: &str, err: minijinja::Error) -> RenderError {
    if err.kind() == ErrorKind::SyntaxError {
        RenderError::Parse {
            name: name.to_string(),
            source: err,
        }
    } else {
        RenderError::Execute {
            name: name.to_string(),
            source: err,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Delims;

    fn env() -> Environment<'static> {
        new_environment(&Delims::default(), &["tpl".to_string()], &FuncRegistry::new()).unwrap()
    }

    #[test]
    fn context_exposes_data_and_map_fields() {
        let payload = Value::from_iter([("user", "sam"), ("role", "admin")]);
        let ctx = build_context(&payload);
        let out = env()
            .render_str("{{ user }}/{{ role }}/{{ data.user }}", &ctx)
            .unwrap();
        assert_eq!(out, "sam/admin/sam");
    }

    #[test]
    fn scalar_payload_is_only_data() {
        let ctx = build_context(&Value::from("Sam"));
        let out = env().render_str("hi {{ data }}", &ctx).unwrap();
        assert_eq!(out, "hi Sam");
    }

    #[test]
    fn yield_stub_fails_loudly() {
        let err = env().render_str("{{ yield() }}", ()).unwrap_err();
        assert!(err.to_string().contains("yield called with no layout defined"));
    }

    #[test]
    fn current_tpl_is_empty_for_ephemeral_renders() {
        let out = env().render_str("[{{ current_tpl() }}]", ()).unwrap();
        assert_eq!(out, "[]");
    }

    #[test]
    fn include_renders_registered_template() {
        let mut env = env();
        env.add_template_owned("partial".to_string(), "p:{{ data }}".to_string())
            .unwrap();
        env.add_template_owned(
            "page".to_string(),
            "start {{ include('partial') }} mid {{ include('partial', 'X') }} end".to_string(),
        )
        .unwrap();

        let ctx = build_context(&Value::from("A"));
        let out = env.get_template("page").unwrap().render(&ctx).unwrap();
        assert_eq!(out, "start p:A mid p:X end");
    }

    #[test]
    fn include_accepts_extension_form() {
        let mut env = env();
        env.add_template_owned("partial".to_string(), "p".to_string())
            .unwrap();
        let out = env
            .render_str("{{ include('partial.tpl') }}", build_context(&Value::UNDEFINED))
            .unwrap();
        assert_eq!(out, "p");
    }

    #[test]
    fn include_missing_target_fails_whole_render() {
        let err = env()
            .render_str("a {{ include('nope') }} b", ())
            .unwrap_err();
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn yield_binding_is_scoped_to_the_layout() {
        let mut base = env();
        base.add_template_owned("page".to_string(), "p:{{ data }}".to_string())
            .unwrap();
        base.add_template_owned("selfish".to_string(), "x {{ yield() }}".to_string())
            .unwrap();
        base.add_template_owned("layout".to_string(), "L[{{ yield() }}]".to_string())
            .unwrap();
        let ctx = build_context(&Value::from("d"));

        let mut scoped = base.clone();
        bind_yield(&mut scoped, base.clone(), "page".to_string(), ctx.clone());
        let out = scoped.get_template("layout").unwrap().render(&ctx).unwrap();
        assert_eq!(out, "L[p:d]");

        // the binding does not follow the wrapped target: a yield inside it
        // hits the stub instead of recursing
        let mut scoped = base.clone();
        bind_yield(&mut scoped, base, "selfish".to_string(), ctx.clone());
        let err = scoped.get_template("layout").unwrap().render(&ctx).unwrap_err();
        assert!(format!("{err:?}").contains("yield called with no layout defined"));
    }

    #[test]
    fn custom_delimiters_apply_to_expressions() {
        let env = new_environment(
            &Delims::new("<%=", "%>"),
            &["tpl".to_string()],
            &FuncRegistry::new(),
        )
        .unwrap();
        let ctx = build_context(&Value::from("t"));
        let out = env.render_str("v=<%= data %> and {{ data }}", &ctx).unwrap();
        assert_eq!(out, "v=t and {{ data }}");
    }

    #[test]
    fn classify_splits_parse_from_execute() {
        let parse_err = env().render_str("{{ unclosed", ()).unwrap_err();
        assert!(matches!(
            classify("t", parse_err),
            RenderError::Parse { .. }
        ));

        let exec_err = env().render_str("{{ yield() }}", ()).unwrap_err();
        assert!(matches!(
            classify("t", exec_err),
            RenderError::Execute { .. }
        ));
    }
}
