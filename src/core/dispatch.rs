//! Command registry and dispatcher.
//!
//! A [`Registry`] holds named commands, each with an ordered schema of typed,
//! defaulted parameters. [`Registry::parse_and_run`] splits a flat token list
//! into runs at every registered command name and executes each run as soon as
//! it has been scanned, so `vimbuild get patch build` chains three commands in
//! one process. The first failing run aborts the rest.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};

/// A parameter value. The variant of a parameter's default is its type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Str(String),
    Bool(bool),
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Str(value.to_string())
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: String,
    pub default: ParamValue,
}

/// Handler invoked with the dispatcher context and the bound arguments.
pub type Handler<C> = fn(&C, &BoundArgs) -> Result<Value>;

pub struct Command<C> {
    name: String,
    about: String,
    params: Vec<ParamSpec>,
    handler: Handler<C>,
}

impl<C> Command<C> {
    pub fn new(name: &str, about: &str, handler: Handler<C>) -> Self {
        Self {
            name: name.to_string(),
            about: about.to_string(),
            params: Vec::new(),
            handler,
        }
    }

    /// Declare the next parameter. Declaration order is positional order.
    pub fn param(mut self, name: &str, default: impl Into<ParamValue>) -> Self {
        self.params.push(ParamSpec {
            name: name.to_string(),
            default: default.into(),
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn about(&self) -> &str {
        &self.about
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }
}

/// Arguments of one run after binding against the command's schema.
/// Every declared parameter is present, either overridden or defaulted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoundArgs {
    command: String,
    values: Vec<(String, ParamValue)>,
}

impl BoundArgs {
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// String parameter value.
    pub fn str(&self, name: &str) -> Result<&str> {
        match self.get(name) {
            Some(ParamValue::Str(value)) => Ok(value),
            Some(ParamValue::Bool(_)) => Err(Error::internal_unexpected(format!(
                "Parameter '{}' of '{}' is a flag, not a string",
                name, self.command
            ))),
            None => Err(self.undeclared(name)),
        }
    }

    /// Boolean parameter value.
    pub fn flag(&self, name: &str) -> Result<bool> {
        match self.get(name) {
            Some(ParamValue::Bool(value)) => Ok(*value),
            Some(ParamValue::Str(_)) => Err(Error::internal_unexpected(format!(
                "Parameter '{}' of '{}' is a string, not a flag",
                name, self.command
            ))),
            None => Err(self.undeclared(name)),
        }
    }

    fn undeclared(&self, name: &str) -> Error {
        Error::internal_unexpected(format!(
            "Parameter '{}' is not declared by '{}'",
            name, self.command
        ))
    }
}

/// One command name plus the raw tokens that followed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub command: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub command: String,
    pub args: BoundArgs,
    pub output: Value,
}

pub struct Registry<C> {
    commands: Vec<Command<C>>,
    index: HashMap<String, usize>,
}

impl<C> Default for Registry<C> {
    fn default() -> Self {
        Self {
            commands: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<C> Registry<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, command: Command<C>) -> Result<()> {
        if self.index.contains_key(&command.name) {
            return Err(Error::command_duplicate(&command.name));
        }
        self.index.insert(command.name.clone(), self.commands.len());
        self.commands.push(command);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Command<C>> {
        self.index.get(name).map(|&idx| &self.commands[idx])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Commands in registration order.
    pub fn commands(&self) -> impl Iterator<Item = &Command<C>> {
        self.commands.iter()
    }

    /// Lazily split `tokens` into runs. The first token is the program name.
    pub fn runs<'a>(&'a self, tokens: &'a [String]) -> Runs<'a, C> {
        Runs {
            registry: self,
            tokens,
            pos: 1,
        }
    }

    /// Scan and execute runs one at a time, stopping at the first error.
    pub fn parse_and_run(&self, ctx: &C, tokens: &[String]) -> Result<Vec<RunOutcome>> {
        let mut outcomes = Vec::new();
        for run in self.runs(tokens) {
            outcomes.push(self.execute(ctx, &run)?);
        }
        Ok(outcomes)
    }

    /// Bind and execute a single run.
    pub fn execute(&self, ctx: &C, run: &Run) -> Result<RunOutcome> {
        let command = self.get(&run.command).ok_or_else(|| {
            Error::validation_invalid_argument(
                "command",
                format!("Unknown command '{}'", run.command),
                Some(run.command.clone()),
                Some(self.commands.iter().map(|c| c.name.clone()).collect()),
            )
        })?;

        let args = bind(&command.name, &command.params, &run.args)?;
        log_status!("dispatch", "Running '{}' ({})", command.name, command.about);
        let output = (command.handler)(ctx, &args)?;

        Ok(RunOutcome {
            command: command.name.clone(),
            args,
            output,
        })
    }
}

/// Iterator over the runs of a token list. See [`Registry::runs`].
pub struct Runs<'a, C> {
    registry: &'a Registry<C>,
    tokens: &'a [String],
    pos: usize,
}

impl<C> Iterator for Runs<'_, C> {
    type Item = Run;

    fn next(&mut self) -> Option<Run> {
        // Tokens ahead of the first command name have no run to join.
        while self.pos < self.tokens.len() && !self.registry.contains(&self.tokens[self.pos]) {
            self.pos += 1;
        }

        let command = self.tokens.get(self.pos)?.clone();
        self.pos += 1;

        let mut args = Vec::new();
        while let Some(token) = self.tokens.get(self.pos) {
            if self.registry.contains(token) {
                break;
            }
            args.push(token.clone());
            self.pos += 1;
        }

        Some(Run { command, args })
    }
}

/// Bind raw tokens to a parameter schema.
///
/// - `key=value` / `--key=value` bind by name
/// - `--key` / `--no-key` set a flag parameter
/// - anything else binds to the next unbound parameter in declaration order
pub fn bind(command: &str, params: &[ParamSpec], args: &[String]) -> Result<BoundArgs> {
    let mut values: Vec<Option<ParamValue>> = vec![None; params.len()];
    let accepted = || params.iter().map(|p| p.name.clone()).collect::<Vec<_>>();
    let position_of = |name: &str| params.iter().position(|p| p.name == name);

    for arg in args {
        let named = arg.strip_prefix("--");
        let (idx, raw) = if let Some((key, value)) = named.unwrap_or(arg.as_str()).split_once('=') {
            let idx = position_of(key)
                .ok_or_else(|| Error::unknown_argument(command, arg, accepted()))?;
            (idx, value.to_string())
        } else if let Some(flag) = named {
            flag_binding(command, params, flag, arg)?
        } else {
            let idx = values
                .iter()
                .position(Option::is_none)
                .ok_or_else(|| Error::unknown_argument(command, arg, accepted()))?;
            (idx, arg.clone())
        };

        if values[idx].is_some() {
            return Err(Error::validation_invalid_argument(
                params[idx].name.clone(),
                format!("'{}' was given more than once", params[idx].name),
                Some(command.to_string()),
                None,
            ));
        }
        values[idx] = Some(parse_value(command, &params[idx], &raw)?);
    }

    let values = params
        .iter()
        .zip(values)
        .map(|(spec, value)| (spec.name.clone(), value.unwrap_or_else(|| spec.default.clone())))
        .collect();

    Ok(BoundArgs {
        command: command.to_string(),
        values,
    })
}

fn flag_binding(
    command: &str,
    params: &[ParamSpec],
    flag: &str,
    arg: &str,
) -> Result<(usize, String)> {
    let accepted = || params.iter().map(|p| p.name.clone()).collect::<Vec<_>>();
    let find = |name: &str| {
        params
            .iter()
            .position(|p| p.name == name && matches!(p.default, ParamValue::Bool(_)))
    };

    if let Some(idx) = find(flag) {
        return Ok((idx, "true".to_string()));
    }
    if let Some(idx) = flag.strip_prefix("no-").and_then(find) {
        return Ok((idx, "false".to_string()));
    }
    if params.iter().any(|p| p.name == flag) {
        return Err(Error::validation_invalid_argument(
            flag,
            format!("Missing value for --{} (use {}=<value>)", flag, flag),
            Some(command.to_string()),
            None,
        ));
    }
    Err(Error::unknown_argument(command, arg, accepted()))
}

/// Parse a raw token into the type of the parameter's default.
fn parse_value(command: &str, spec: &ParamSpec, raw: &str) -> Result<ParamValue> {
    match spec.default {
        ParamValue::Str(_) => Ok(ParamValue::Str(raw.to_string())),
        ParamValue::Bool(_) => match raw.to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(ParamValue::Bool(true)),
            "false" | "no" | "off" | "0" => Ok(ParamValue::Bool(false)),
            _ => Err(Error::validation_invalid_argument(
                spec.name.clone(),
                format!("'{}' is not a boolean (expected true or false)", raw),
                Some(command.to_string()),
                None,
            )),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    type Log = RefCell<Vec<String>>;

    fn record(ctx: &Log, args: &BoundArgs) -> Result<Value> {
        ctx.borrow_mut().push(format!("{:?}", args.values));
        Ok(Value::Null)
    }

    fn fail(_ctx: &Log, _args: &BoundArgs) -> Result<Value> {
        Err(Error::internal_unexpected("boom"))
    }

    fn tokens(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn registry() -> Registry<Log> {
        let mut registry = Registry::new();
        registry
            .register(Command::new("get", "fetch", record).param("target", "."))
            .unwrap();
        registry
            .register(
                Command::new("build", "build", record)
                    .param("target", ".")
                    .param("python", true)
                    .param("x", ""),
            )
            .unwrap();
        registry
            .register(Command::new("fail", "always fails", fail))
            .unwrap();
        registry
    }

    fn specs() -> Vec<ParamSpec> {
        registry().get("build").unwrap().params().to_vec()
    }

    #[test]
    fn register_rejects_duplicate_names() {
        let mut registry = registry();
        let err = registry
            .register(Command::new("get", "again", record))
            .unwrap_err();
        assert_eq!(err.code.as_str(), "command.duplicate");
    }

    #[test]
    fn runs_split_at_command_names() {
        let registry = registry();
        let tokens = tokens(&["prog", "get", "build", "x=1"]);
        let runs: Vec<Run> = registry.runs(&tokens).collect();

        assert_eq!(
            runs,
            vec![
                Run {
                    command: "get".to_string(),
                    args: vec![]
                },
                Run {
                    command: "build".to_string(),
                    args: vec!["x=1".to_string()]
                },
            ]
        );
    }

    #[test]
    fn runs_drop_tokens_before_first_command() {
        let registry = registry();
        let tokens = tokens(&["prog", "stray", "x=1", "get", "/tmp"]);
        let runs: Vec<Run> = registry.runs(&tokens).collect();

        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].command, "get");
        assert_eq!(runs[0].args, vec!["/tmp".to_string()]);
    }

    #[test]
    fn runs_empty_for_program_name_only() {
        let registry = registry();
        let tokens = tokens(&["prog"]);
        assert_eq!(registry.runs(&tokens).count(), 0);
    }

    #[test]
    fn repeated_command_starts_new_run() {
        let registry = registry();
        let tokens = tokens(&["prog", "get", "a", "get", "b"]);
        let runs: Vec<Run> = registry.runs(&tokens).collect();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[1].args, vec!["b".to_string()]);
    }

    #[test]
    fn bind_uses_defaults_when_no_args() {
        let bound = bind("build", &specs(), &[]).unwrap();
        assert_eq!(bound.str("target").unwrap(), ".");
        assert!(bound.flag("python").unwrap());
        assert_eq!(bound.str("x").unwrap(), "");
    }

    #[test]
    fn bind_positional_then_named() {
        let bound = bind("build", &specs(), &tokens(&["/work", "python=no", "--x=FOO=1"])).unwrap();
        assert_eq!(bound.str("target").unwrap(), "/work");
        assert!(!bound.flag("python").unwrap());
        assert_eq!(bound.str("x").unwrap(), "FOO=1");
    }

    #[test]
    fn bind_positional_skips_named_parameters() {
        let bound = bind("build", &specs(), &tokens(&["target=/w", "off", "extra"])).unwrap();
        assert_eq!(bound.str("target").unwrap(), "/w");
        assert!(!bound.flag("python").unwrap());
        assert_eq!(bound.str("x").unwrap(), "extra");
    }

    #[test]
    fn bind_flag_forms() {
        let bound = bind("build", &specs(), &tokens(&["--no-python"])).unwrap();
        assert!(!bound.flag("python").unwrap());

        let bound = bind("build", &specs(), &tokens(&["--python"])).unwrap();
        assert!(bound.flag("python").unwrap());
    }

    #[test]
    fn bind_rejects_unknown_name() {
        let err = bind("build", &specs(), &tokens(&["jobs=4"])).unwrap_err();
        assert_eq!(err.code.as_str(), "validation.unknown_argument");
        assert_eq!(err.details["accepted"], serde_json::json!(["target", "python", "x"]));
    }

    #[test]
    fn bind_rejects_surplus_positional() {
        let params = vec![ParamSpec {
            name: "target".to_string(),
            default: ".".into(),
        }];
        let err = bind("get", &params, &tokens(&["a", "b"])).unwrap_err();
        assert_eq!(err.code.as_str(), "validation.unknown_argument");
        assert_eq!(err.details["argument"], "b");
    }

    #[test]
    fn bind_rejects_bad_boolean() {
        let err = bind("build", &specs(), &tokens(&["python=maybe"])).unwrap_err();
        assert_eq!(err.code.as_str(), "validation.invalid_argument");
    }

    #[test]
    fn bind_rejects_repeated_parameter() {
        let err = bind("build", &specs(), &tokens(&["/a", "target=/b"])).unwrap_err();
        assert_eq!(err.code.as_str(), "validation.invalid_argument");
    }

    #[test]
    fn bind_rejects_string_parameter_used_as_flag() {
        let err = bind("build", &specs(), &tokens(&["--target"])).unwrap_err();
        assert_eq!(err.code.as_str(), "validation.invalid_argument");
    }

    #[test]
    fn parse_and_run_executes_in_order() {
        let registry = registry();
        let log = Log::default();
        let outcomes = registry
            .parse_and_run(&log, &tokens(&["prog", "get", "/src", "build", "x=1"]))
            .unwrap();

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].command, "get");
        assert_eq!(outcomes[1].args.str("x").unwrap(), "1");
        assert_eq!(log.borrow().len(), 2);
        assert!(log.borrow()[0].contains("/src"));
    }

    #[test]
    fn parse_and_run_executes_earlier_runs_before_binding_later_ones() {
        let registry = registry();
        let log = Log::default();
        let err = registry
            .parse_and_run(&log, &tokens(&["prog", "get", "build", "bogus=1"]))
            .unwrap_err();

        assert_eq!(err.code.as_str(), "validation.unknown_argument");
        assert_eq!(log.borrow().len(), 1, "get should have run before build was bound");
    }

    #[test]
    fn parse_and_run_stops_at_first_failure() {
        let registry = registry();
        let log = Log::default();
        let err = registry
            .parse_and_run(&log, &tokens(&["prog", "get", "fail", "build"]))
            .unwrap_err();

        assert_eq!(err.code.as_str(), "internal.unexpected");
        assert_eq!(log.borrow().len(), 1);
    }
}
