//! Language configuration for compilation and execution

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;

use anyhow::Context;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::error::{JudgeError, JudgeResult};
use crate::runner::CommandSpec;

/// Supported languages, keyed by their wire identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Py,
    Java,
    Cpp,
    C,
    Go,
    Rs,
    Rb,
}

impl Language {
    pub const ALL: [Language; 7] = [
        Language::Py,
        Language::Java,
        Language::Cpp,
        Language::C,
        Language::Go,
        Language::Rs,
        Language::Rb,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Language::Py => "py",
            Language::Java => "java",
            Language::Cpp => "cpp",
            Language::C => "c",
            Language::Go => "go",
            Language::Rs => "rs",
            Language::Rb => "rb",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Language {
    type Err = JudgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = s.trim().to_lowercase();
        Language::ALL
            .into_iter()
            .find(|l| l.id() == id)
            .ok_or_else(|| JudgeError::UnsupportedLanguage(s.to_string()))
    }
}

/// Files of one prepared submission, used to fill command templates
#[derive(Debug, Clone)]
pub struct ProgramPaths {
    pub dir: PathBuf,
    pub source: PathBuf,
    pub executable: PathBuf,
    /// Entry class for languages that name the file after it
    pub entry: String,
}

impl ProgramPaths {
    fn substitute(&self, template: &str) -> String {
        template
            .replace("{source}", &self.source.to_string_lossy())
            .replace("{exe}", &self.executable.to_string_lossy())
            .replace("{dir}", &self.dir.to_string_lossy())
            .replace("{entry}", &self.entry)
    }

    fn command(&self, template: &[String]) -> Option<CommandSpec> {
        let argv: Vec<String> = template.iter().map(|t| self.substitute(t)).collect();
        CommandSpec::from_vec(&argv, &self.dir)
    }
}

/// Configuration for a supported programming language
#[derive(Debug, Clone)]
pub struct LanguageSpec {
    pub language: Language,
    /// Display name (e.g., "C++")
    pub name: String,
    /// Source file extension without the dot
    pub extension: String,
    /// Source file name template, for languages that tie file and entry point names
    pub source_file: Option<String>,
    /// Compile command template (None if not needed)
    pub compile_command: Option<Vec<String>>,
    /// Run command template
    pub run_command: Vec<String>,
    /// File the build must produce
    pub artifact: Option<String>,
}

impl LanguageSpec {
    /// Source file name for a machine-generated stem and the program's entry class
    pub fn source_file_name(&self, stem: &str, entry: &str) -> String {
        match &self.source_file {
            Some(template) => template.replace("{entry}", entry),
            None => format!("{}.{}", stem, self.extension),
        }
    }

    /// Name of the public class holding the entry point; `Main` when there is none
    pub fn entry_class(&self, source: &str) -> String {
        match self.language {
            Language::Java => entry_points()
                .java
                .captures(source)
                .map(|caps| caps[1].to_string())
                .unwrap_or_else(|| DEFAULT_ENTRY.to_string()),
            _ => DEFAULT_ENTRY.to_string(),
        }
    }

    pub fn build_command(&self, paths: &ProgramPaths) -> Option<CommandSpec> {
        self.compile_command
            .as_deref()
            .and_then(|template| paths.command(template))
    }

    pub fn run_command(&self, paths: &ProgramPaths) -> Option<CommandSpec> {
        paths.command(&self.run_command)
    }

    pub fn artifact_path(&self, paths: &ProgramPaths) -> Option<PathBuf> {
        self.artifact
            .as_deref()
            .map(|template| PathBuf::from(paths.substitute(template)))
    }

    /// Inject a minimal entry point when the code lacks one.
    ///
    /// Plain substring/regex detection; code with several entry points is passed through.
    pub fn wrap_source<'a>(&self, code: &'a str) -> Cow<'a, str> {
        match self.language {
            Language::Py | Language::Rb => Cow::Borrowed(code),
            Language::Java => {
                if entry_points().java.is_match(code) {
                    Cow::Borrowed(code)
                } else {
                    Cow::Owned(format!(
                        "import java.util.*;\n\npublic class Main {{\n    public static void main(String[] args) {{\n        Scanner sc = new Scanner(System.in);\n{}\n    }}\n}}\n",
                        code
                    ))
                }
            }
            Language::Cpp => {
                if entry_points().c_main.is_match(code) {
                    Cow::Borrowed(code)
                } else {
                    Cow::Owned(format!(
                        "#include <bits/stdc++.h>\nusing namespace std;\n\nint main() {{\n{}\n    return 0;\n}}\n",
                        code
                    ))
                }
            }
            Language::C => {
                if entry_points().c_main.is_match(code) {
                    Cow::Borrowed(code)
                } else {
                    Cow::Owned(format!(
                        "#include <stdio.h>\n#include <stdlib.h>\n\nint main() {{\n{}\n    return 0;\n}}\n",
                        code
                    ))
                }
            }
            Language::Go => {
                if entry_points().go.is_match(code) {
                    Cow::Borrowed(code)
                } else {
                    Cow::Owned(format!(
                        "package main\n\nimport \"fmt\"\n\nvar _ = fmt.Println\n\nfunc main() {{\n{}\n}}\n",
                        code
                    ))
                }
            }
            Language::Rs => {
                if entry_points().rust.is_match(code) {
                    Cow::Borrowed(code)
                } else {
                    Cow::Owned(format!("fn main() {{\n{}\n}}\n", code))
                }
            }
        }
    }
}

const DEFAULT_ENTRY: &str = "Main";

struct EntryPoints {
    java: Regex,
    c_main: Regex,
    go: Regex,
    rust: Regex,
}

fn entry_points() -> &'static EntryPoints {
    static ENTRY_POINTS: OnceLock<EntryPoints> = OnceLock::new();
    ENTRY_POINTS.get_or_init(|| EntryPoints {
        java: Regex::new(r"\bpublic\s+(?:final\s+)?class\s+(\w+)").expect("valid java regex"),
        c_main: Regex::new(r"\bmain\s*\(").expect("valid main regex"),
        go: Regex::new(r"\bpackage\s+main\b").expect("valid go regex"),
        rust: Regex::new(r"\bfn\s+main\s*\(").expect("valid rust regex"),
    })
}

/// Raw TOML configuration for a language
#[derive(Debug, Deserialize)]
struct RawLanguageConfig {
    name: String,
    extension: String,
    source_file: Option<String>,
    compile_command: Option<String>,
    run_command: String,
    artifact: Option<String>,
    #[serde(default)]
    aliases: Vec<String>,
}

struct Registry {
    specs: HashMap<Language, LanguageSpec>,
    aliases: HashMap<String, Language>,
}

/// Global language configurations
static LANGUAGES: OnceLock<Registry> = OnceLock::new();

const EMBEDDED_LANGUAGES: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/files/languages.toml"));

/// Initialize language configurations, from a TOML file or the embedded table
pub fn init_languages(path: Option<&Path>) -> anyhow::Result<()> {
    let registry = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read language config {:?}", path))?;
            parse_languages(&content)?
        }
        None => parse_languages(EMBEDDED_LANGUAGES)?,
    };

    LANGUAGES
        .set(registry)
        .map_err(|_| anyhow::anyhow!("Languages already initialized"))?;

    Ok(())
}

fn registry() -> &'static Registry {
    LANGUAGES.get_or_init(|| {
        parse_languages(EMBEDDED_LANGUAGES).unwrap_or_else(|e| {
            error!("Embedded language table is invalid: {:#}", e);
            Registry {
                specs: HashMap::new(),
                aliases: HashMap::new(),
            }
        })
    })
}

fn parse_languages(content: &str) -> anyhow::Result<Registry> {
    let raw_configs: HashMap<String, RawLanguageConfig> = toml::from_str(content)?;

    let mut specs = HashMap::new();
    let mut aliases = HashMap::new();

    for (id, raw) in raw_configs {
        let language: Language = id
            .parse()
            .map_err(|_| anyhow::anyhow!("Unknown language id in config: {}", id))?;

        let run_command = into_command(&raw.run_command);
        if run_command.is_empty() {
            anyhow::bail!("Empty run command for {}", id);
        }
        let compile_command = raw.compile_command.map(|cmd| into_command(&cmd));
        if compile_command.as_ref().is_some_and(|cmd| cmd.is_empty()) {
            anyhow::bail!("Empty compile command for {}", id);
        }

        aliases.insert(language.id().to_string(), language);
        for alias in raw.aliases {
            aliases.insert(alias.to_lowercase(), language);
        }

        specs.insert(
            language,
            LanguageSpec {
                language,
                name: raw.name,
                extension: raw.extension,
                source_file: raw.source_file,
                compile_command,
                run_command,
                artifact: raw.artifact,
            },
        );
    }

    Ok(Registry { specs, aliases })
}

/// Look up a language by identifier or alias
pub fn resolve(id: &str) -> JudgeResult<&'static LanguageSpec> {
    let registry = registry();
    registry
        .aliases
        .get(&id.trim().to_lowercase())
        .and_then(|language| registry.specs.get(language))
        .ok_or_else(|| JudgeError::UnsupportedLanguage(id.to_string()))
}

/// All configured languages in a stable order
pub fn supported_languages() -> Vec<&'static LanguageSpec> {
    let mut specs: Vec<_> = registry().specs.values().collect();
    specs.sort_by_key(|s| s.language);
    specs
}

fn into_command(command: &str) -> Vec<String> {
    command.split_whitespace().map(|s| s.to_string()).collect()
}
