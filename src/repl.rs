use crate::core::property_key::PropertyKey;
use crate::core::realm::Realm;
use crate::{EvaluateOptions, JSError, Value, evaluate, parse_program};
use std::collections::BTreeSet;
use std::rc::Rc;
use std::time::Duration;

/// A persistent console session.
///
/// Every entry runs against the same [`Realm`], so bindings, timers and
/// registries survive from one entry to the next.
pub struct Repl {
    realm: Rc<Realm>,
    timeout: Option<Duration>,
    strict: bool,
    dry_run: bool,
}

impl Default for Repl {
    fn default() -> Self {
        Self::new()
    }
}

impl Repl {
    pub fn new() -> Self {
        Repl {
            realm: Realm::new(),
            timeout: None,
            strict: false,
            dry_run: false,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Evaluate every entry without side effects.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn realm(&self) -> &Rc<Realm> {
        &self.realm
    }

    fn options(&self) -> EvaluateOptions {
        let mut options = EvaluateOptions::default()
            .realm(self.realm.clone())
            .strict(self.strict)
            .throw_on_side_effect(self.dry_run);
        if let Some(timeout) = self.timeout {
            options = options.timeout(timeout);
        }
        options
    }

    /// Evaluates one entry, waiting for a top-level `await` to settle.
    pub fn eval<T: AsRef<str>>(&self, script: T) -> Result<Value, JSError> {
        evaluate(script.as_ref(), self.options())?.into_value()
    }

    /// Result of `script` if it can be computed without side effects.
    ///
    /// Any failure, including a thrown exception, yields `None`: a preview
    /// is shown only when it is certain.
    pub fn preview<T: AsRef<str>>(&self, script: T) -> Option<Value> {
        let options = self
            .options()
            .throw_on_side_effect(true)
            .timeout(self.timeout.unwrap_or(Duration::from_millis(500)));
        match evaluate(script.as_ref(), options) {
            Ok(evaluation) if !evaluation.is_pending() => evaluation.into_value().ok(),
            Ok(_) => None,
            Err(e) => {
                log::trace!("no preview: {e}");
                None
            }
        }
    }

    /// Names in global scope starting with `prefix`, sorted.
    ///
    /// Covers lexical bindings of the session and string-keyed properties of
    /// the global object and its prototype chain.
    pub fn completions(&self, prefix: &str) -> Vec<String> {
        let mut names: BTreeSet<String> = self
            .realm
            .global_scope
            .binding_names()
            .iter()
            .filter(|name| name.starts_with(prefix))
            .map(|name| name.to_string())
            .collect();
        let mut object = Some(self.realm.global_object.clone());
        while let Some(current) = object {
            let data = current.borrow();
            for key in data.properties.keys() {
                if let PropertyKey::String(name) = key
                    && name.starts_with(prefix)
                {
                    names.insert(name.to_string());
                }
            }
            object = data.prototype.clone();
        }
        names.into_iter().collect()
    }

    /// False while `input` only fails to parse because it ends too early,
    /// such as an open brace or an unterminated template literal.
    pub fn is_complete_input(input: &str) -> bool {
        match parse_program(input) {
            Ok(_) => true,
            Err(JSError::SyntaxError { message, .. }) => {
                !(message == "Unexpected end of input" || message.starts_with("Unterminated"))
            }
            Err(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incomplete_inputs_are_detected() {
        assert!(Repl::is_complete_input("let a = 1"));
        assert!(!Repl::is_complete_input("function f() {"));
        assert!(!Repl::is_complete_input("[1, 2,"));
        assert!(!Repl::is_complete_input("`abc ${"));
        // Errors that more input cannot fix are reported right away.
        assert!(Repl::is_complete_input("1 +* 2"));
    }

    #[test]
    fn bindings_persist_between_entries() {
        let repl = Repl::new();
        repl.eval("let counter = 1; var total = 10;").unwrap();
        let v = repl.eval("counter + total").unwrap();
        assert!(matches!(v, Value::Number(n) if n == 11.0));
        let names = repl.completions("cou");
        assert_eq!(names, vec!["counter".to_string()]);
        assert!(repl.completions("tot").contains(&"total".to_string()));
    }

    #[test]
    fn preview_refuses_side_effects() {
        let repl = Repl::new();
        repl.eval("var state = { n: 1 };").unwrap();
        assert!(matches!(repl.preview("state.n + 1"), Some(Value::Number(n)) if n == 2.0));
        assert!(repl.preview("state.n = 5").is_none());
        assert!(matches!(repl.eval("state.n").unwrap(), Value::Number(n) if n == 1.0));
    }
}
