//! Default handler: runs the embedded greeting in a scoped Python context.

use anyhow::{Context as _, Result};

use crate::config::Config;
use crate::execution::{Context, Language};

pub const GREETING_SCRIPT: &str = "print('Hello World')";

pub struct DefaultHandler;

impl DefaultHandler {
    pub fn run(cfg: &Config) -> Result<()> {
        Self::run_script(cfg, GREETING_SCRIPT)
    }

    pub(crate) fn run_script(cfg: &Config, script: &str) -> Result<()> {
        let language = cfg.language();
        let context = Context::builder(&language)
            .allow_all_access(cfg.allow_all_access())
            .build()
            .with_context(|| format!("failed to create guest context for {language:?}"))?;

        tracing::debug!(language = %context.language(), access = ?context.access_policy(), "running greeting");
        // `context` is dropped on both paths out of here, releasing the interpreter.
        context
            .eval(Language::Python.id(), script)
            .context("greeting script failed")?;
        Ok(())
    }
}
