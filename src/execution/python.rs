//! Python guest context backed by an in-process RustPython interpreter.

use std::env;
use std::fmt;

use rustpython_vm::{
    builtins::{PyBaseExceptionRef, PyFloat, PyInt, PyStr},
    compiler::Mode,
    scope::Scope,
    AsObject, Interpreter, PyObject, PyObjectRef, Settings, VirtualMachine,
};

use super::{AccessPolicy, GuestError, GuestValue, Language};

const SOURCE_PATH: &str = "<embedded>";

#[derive(Debug, Clone)]
pub struct ContextBuilder {
    language_id: String,
    access: AccessPolicy,
}

impl ContextBuilder {
    pub fn allow_all_access(mut self, allow: bool) -> Self {
        self.access = AccessPolicy::from_allow_all(allow);
        self
    }

    pub fn build(self) -> Result<Context, GuestError> {
        let language: Language = self.language_id.parse()?;
        let settings = settings_for(self.access);
        let interpreter = match self.access {
            AccessPolicy::Minimal => Interpreter::without_stdlib(settings),
            AccessPolicy::Unrestricted => Interpreter::with_init(settings, |vm| {
                vm.add_native_modules(rustpython_stdlib::get_module_inits());
            }),
        };
        let scope = interpreter.enter(|vm| vm.new_scope_with_builtins());
        tracing::debug!(%language, access = ?self.access, "guest context created");

        Ok(Context {
            language,
            access: self.access,
            interpreter: Some(interpreter),
            scope: Some(scope),
        })
    }
}

/// One guest interpreter. Dropping it finalizes the interpreter, which runs
/// the guest's exit hooks and flushes its standard streams.
pub struct Context {
    language: Language,
    access: AccessPolicy,
    interpreter: Option<Interpreter>,
    scope: Option<Scope>,
}

impl Context {
    pub fn builder(language_id: &str) -> ContextBuilder {
        ContextBuilder {
            language_id: language_id.to_string(),
            access: AccessPolicy::default(),
        }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn access_policy(&self) -> AccessPolicy {
        self.access
    }

    /// Run `source` as module-level statements.
    pub fn eval(&self, language_id: &str, source: &str) -> Result<(), GuestError> {
        self.check_language(language_id)?;
        self.with_vm(|vm, scope| run(vm, scope, source, Mode::Exec).map(drop))
    }

    /// Evaluate `source` as a single expression and copy the result out.
    pub fn eval_expression(&self, language_id: &str, source: &str) -> Result<GuestValue, GuestError> {
        self.check_language(language_id)?;
        self.with_vm(|vm, scope| {
            let value = run(vm, scope, source, Mode::Eval)?;
            to_guest_value(vm, &value)
        })
    }

    fn check_language(&self, language_id: &str) -> Result<(), GuestError> {
        let requested: Language = language_id.parse()?;
        if requested != self.language {
            return Err(GuestError::UnsupportedLanguage(language_id.to_string()));
        }
        Ok(())
    }

    fn with_vm<F, R>(&self, f: F) -> Result<R, GuestError>
    where
        F: FnOnce(&VirtualMachine, Scope) -> Result<R, GuestError>,
    {
        match (&self.interpreter, &self.scope) {
            (Some(interpreter), Some(scope)) => interpreter.enter(|vm| f(vm, scope.clone())),
            _ => Err(GuestError::Released),
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("language", &self.language)
            .field("access", &self.access)
            .field("released", &self.interpreter.is_none())
            .finish()
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        let scope = self.scope.take();
        if let Some(interpreter) = self.interpreter.take() {
            // Globals go first so their finalizers still see a live VM.
            interpreter.enter(|_| drop(scope));
            let status = interpreter.finalize(None);
            if status != 0 {
                tracing::warn!(status, "guest interpreter exited with non-zero status");
            }
            tracing::debug!(language = %self.language, "guest context released");
        }
    }
}

fn settings_for(access: AccessPolicy) -> Settings {
    let mut settings = Settings::default();
    settings.import_site = false;
    match access {
        AccessPolicy::Minimal => {
            settings.isolated = true;
            settings.ignore_environment = true;
        }
        AccessPolicy::Unrestricted => {
            if let Some(paths) = env::var_os("PYTHONPATH") {
                settings
                    .path_list
                    .extend(env::split_paths(&paths).map(|p| p.to_string_lossy().into_owned()));
            }
        }
    }
    settings
}

fn run(vm: &VirtualMachine, scope: Scope, source: &str, mode: Mode) -> Result<PyObjectRef, GuestError> {
    let code = vm
        .compile(source, mode, SOURCE_PATH.to_owned())
        .map_err(|err| GuestError::Compile { message: err.to_string() })?;
    tracing::trace!(bytes = source.len(), "running guest code");
    vm.run_code_obj(code, scope).map_err(|exc| GuestError::Evaluation {
        message: render_exception(vm, &exc),
    })
}

fn to_guest_value(vm: &VirtualMachine, obj: &PyObject) -> Result<GuestValue, GuestError> {
    if vm.is_none(obj) {
        return Ok(GuestValue::None);
    }
    // bool is an int subclass, so it has to be matched first
    if obj.is(&vm.ctx.true_value) {
        return Ok(GuestValue::Bool(true));
    }
    if obj.is(&vm.ctx.false_value) {
        return Ok(GuestValue::Bool(false));
    }
    if let Some(int) = obj.payload::<PyInt>() {
        if let Ok(i) = i64::try_from(int.as_bigint()) {
            return Ok(GuestValue::Int(i));
        }
    } else if let Some(float) = obj.payload::<PyFloat>() {
        return Ok(GuestValue::Float(float.to_f64()));
    } else if let Some(s) = obj.payload::<PyStr>() {
        return Ok(GuestValue::Str(s.as_str().to_owned()));
    }

    let repr = obj.repr(vm).map_err(|exc| GuestError::Conversion {
        message: render_exception(vm, &exc),
    })?;
    Ok(GuestValue::Other {
        type_name: obj.class().name().to_string(),
        repr: repr.as_str().to_owned(),
    })
}

fn render_exception(vm: &VirtualMachine, exc: &PyBaseExceptionRef) -> String {
    let mut out = String::new();
    match vm.write_exception(&mut out, exc) {
        Ok(()) => out.trim_end().to_owned(),
        Err(_) => exc.class().name().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> Context {
        Context::builder("python").build().unwrap()
    }

    #[test]
    fn test_build_and_drop_without_eval() {
        let ctx = minimal();
        assert_eq!(ctx.language(), Language::Python);
        assert_eq!(ctx.access_policy(), AccessPolicy::Minimal);
    }

    #[test]
    fn test_unsupported_language_fails_at_build() {
        let err = Context::builder("ruby").build().unwrap_err();
        assert!(matches!(err, GuestError::UnsupportedLanguage(ref id) if id == "ruby"));
    }

    #[test]
    fn test_eval_rejects_other_language() {
        let ctx = minimal();
        let err = ctx.eval("js", "print('Hello World')").unwrap_err();
        assert!(matches!(err, GuestError::UnsupportedLanguage(_)));
    }

    #[test]
    fn test_eval_statements() {
        let ctx = minimal();
        ctx.eval("python", "greeting = 'Hello' + ' ' + 'World'").unwrap();
        assert_eq!(
            ctx.eval_expression("python", "greeting").unwrap(),
            GuestValue::Str("Hello World".into())
        );
    }

    #[test]
    fn test_eval_expression_values() {
        let ctx = minimal();
        assert_eq!(ctx.eval_expression("python", "1 + 2").unwrap(), GuestValue::Int(3));
        assert_eq!(ctx.eval_expression("python", "7 / 2").unwrap(), GuestValue::Float(3.5));
        assert_eq!(ctx.eval_expression("python", "None").unwrap(), GuestValue::None);
        assert_eq!(ctx.eval_expression("python", "1 < 2").unwrap(), GuestValue::Bool(true));
        assert_eq!(ctx.eval_expression("python", "not True").unwrap(), GuestValue::Bool(false));
        assert_eq!(
            ctx.eval_expression("python", "[1, 2]").unwrap(),
            GuestValue::Other { type_name: "list".into(), repr: "[1, 2]".into() }
        );
    }

    #[test]
    fn test_big_int_falls_back_to_repr() {
        let ctx = minimal();
        let value = ctx.eval_expression("python", "2 ** 100").unwrap();
        assert_eq!(
            value,
            GuestValue::Other {
                type_name: "int".into(),
                repr: "1267650600228229401496703205376".into(),
            }
        );
    }

    #[test]
    fn test_syntax_error_is_compile_error() {
        let ctx = minimal();
        let err = ctx.eval("python", "print('Hello World'").unwrap_err();
        assert!(matches!(err, GuestError::Compile { .. }), "got {err:?}");
        // context survives a failed evaluation
        assert_eq!(ctx.eval_expression("python", "40 + 2").unwrap(), GuestValue::Int(42));
    }

    #[test]
    fn test_exception_is_evaluation_error() {
        let ctx = minimal();
        match ctx.eval("python", "1 / 0").unwrap_err() {
            GuestError::Evaluation { message } => assert!(message.contains("ZeroDivisionError"), "{message}"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_contexts_do_not_share_state() {
        let first = minimal();
        first.eval("python", "x = 1").unwrap();
        drop(first);

        let second = minimal();
        match second.eval_expression("python", "x").unwrap_err() {
            GuestError::Evaluation { message } => assert!(message.contains("NameError"), "{message}"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_minimal_policy_has_no_native_stdlib() {
        let ctx = minimal();
        match ctx.eval("python", "import math").unwrap_err() {
            GuestError::Evaluation { message } => assert!(message.contains("math"), "{message}"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unrestricted_policy_loads_native_stdlib() {
        let ctx = Context::builder("python").allow_all_access(true).build().unwrap();
        assert!(ctx.access_policy().allows_host_access());
        assert_eq!(
            ctx.eval_expression("python", "__import__('math').sqrt(16.0)").unwrap(),
            GuestValue::Float(4.0)
        );
    }
}
