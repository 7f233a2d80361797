//! Wheel compatibility tags.

use std::fmt;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use devwheel_domain::ProjectConfig;
use serde::Deserialize;
use tracing::debug;

use crate::config::Config;
use crate::effects::TagProvider;
use crate::process::{resolve_python, run_command};

/// `{python}-{abi}-{platform}`; each part may be a `.`-compressed set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WheelTag {
    pub python: String,
    pub abi: String,
    pub platform: String,
}

impl WheelTag {
    pub fn new(
        python: impl Into<String>,
        abi: impl Into<String>,
        platform: impl Into<String>,
    ) -> Self {
        Self {
            python: python.into(),
            abi: abi.into(),
            platform: platform.into(),
        }
    }

    /// Tag for wheels without compiled code.
    pub fn pure() -> Self {
        Self::new("py3", "none", "any")
    }

    pub fn is_pure(&self) -> bool {
        self.abi == "none" && self.platform == "any"
    }

    /// Every concrete tag a compressed tag set stands for, as listed in the
    /// `WHEEL` file.
    pub fn expanded(&self) -> Vec<String> {
        let mut tags = Vec::new();
        for python in self.python.split('.') {
            for abi in self.abi.split('.') {
                for platform in self.platform.split('.') {
                    tags.push(format!("{python}-{abi}-{platform}"));
                }
            }
        }
        tags
    }
}

impl fmt::Display for WheelTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.python, self.abi, self.platform)
    }
}

const INTERPRETER_PROBE: &str = "import json, sys, sysconfig; print(json.dumps({\
'implementation': sys.implementation.name, \
'major': sys.version_info[0], 'minor': sys.version_info[1], \
'soabi': sysconfig.get_config_var('SOABI') or '', \
'platform': sysconfig.get_platform()}))";

#[derive(Debug, Deserialize)]
struct InterpreterFacts {
    implementation: String,
    major: u32,
    minor: u32,
    soabi: String,
    platform: String,
}

impl InterpreterFacts {
    fn tag(&self) -> WheelTag {
        let abbrev = match self.implementation.as_str() {
            "cpython" => "cp",
            "pypy" => "pp",
            "ironpython" => "ip",
            "jython" => "jy",
            other => other,
        };
        let python = format!("{abbrev}{}{}", self.major, self.minor);
        let abi = if self.soabi.is_empty() {
            // Windows CPython has no SOABI; its ABI is still the version tag.
            if abbrev == "cp" {
                format!("cp{}{}", self.major, self.minor)
            } else {
                "none".to_string()
            }
        } else if let Some(rest) = self.soabi.strip_prefix("cpython-") {
            format!("cp{}", rest.split('-').next().unwrap_or_default())
        } else {
            sanitize_tag(&self.soabi)
        };
        WheelTag::new(python, abi, sanitize_tag(&self.platform))
    }
}

fn sanitize_tag(value: &str) -> String {
    value.replace(['-', '.'], "_")
}

/// Pure projects get `py3-none-any`; projects declaring native extensions
/// are tagged for the interpreter that builds them.
pub struct InterpreterTagProvider {
    pure: bool,
    project_dir: PathBuf,
    config: Config,
}

impl InterpreterTagProvider {
    pub fn new(project: &ProjectConfig, config: &Config) -> Self {
        Self {
            pure: !project.has_ext_modules(),
            project_dir: project.root.clone(),
            config: config.clone(),
        }
    }
}

impl TagProvider for InterpreterTagProvider {
    fn wheel_tag(&self) -> Result<WheelTag> {
        if self.pure {
            return Ok(WheelTag::pure());
        }
        let python = resolve_python(&self.config)?;
        let output = run_command(
            &python,
            &["-c".to_string(), INTERPRETER_PROBE.to_string()],
            &self.project_dir,
        )?;
        if !output.success() {
            return Err(anyhow!(
                "{python} exited with {} while probing wheel tags: {}",
                output.code,
                output.stderr.trim()
            ));
        }
        let facts: InterpreterFacts = serde_json::from_str(output.stdout.trim())
            .with_context(|| format!("parsing interpreter probe output from {python}"))?;
        let tag = facts.tag();
        debug!(%tag, python = %python, "computed platform tag");
        Ok(tag)
    }
}
