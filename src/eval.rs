//! Represents strings with embedded variable references, e.g.
//! `lilypond -o {PROJECT_NAME} {PROJECT_NAME}.ly`, and mechanisms for
//! expanding those into plain strings.
//!
//! Only `{NAME}` where NAME is upper case letters, digits and underscores is a
//! reference; any other brace is literal text, so shell syntax passes through.

use std::borrow::Cow;
use std::path::PathBuf;

pub const PROJECT_NAME: &str = "PROJECT_NAME";
pub const CWD: &str = "CWD";

/// An environment providing a mapping of variable name to variable value.
pub trait Env {
    fn get_var(&self, var: &str) -> Option<Cow<str>>;
}

/// One token within an EvalString, either literal text or a variable reference.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalPart<T: AsRef<str>> {
    Literal(T),
    VarRef(T),
}

/// A parsed but unexpanded variable-reference string.
#[derive(Debug, PartialEq)]
pub struct EvalString<T: AsRef<str>>(T);

impl<T: AsRef<str>> EvalString<T> {
    pub fn new(inner: T) -> Self {
        EvalString(inner)
    }

    pub fn parse(&self) -> impl Iterator<Item = EvalPart<&str>> {
        EvalParser {
            text: self.0.as_ref(),
        }
    }

    /// Expands the string, looking each variable up in the first Env that has
    /// it.  References no Env knows about are kept verbatim.
    pub fn evaluate(&self, envs: &[&dyn Env]) -> String {
        let mut result = String::new();
        for part in self.parse() {
            match part {
                EvalPart::Literal(s) => result.push_str(s),
                EvalPart::VarRef(v) => match envs.iter().find_map(|env| env.get_var(v)) {
                    Some(val) => result.push_str(&val),
                    None => {
                        result.push('{');
                        result.push_str(v);
                        result.push('}');
                    }
                },
            }
        }
        result
    }
}

fn is_var_char(c: u8) -> bool {
    c.is_ascii_uppercase() || c.is_ascii_digit() || c == b'_'
}

struct EvalParser<'a> {
    text: &'a str,
}

impl<'a> Iterator for EvalParser<'a> {
    type Item = EvalPart<&'a str>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.text.is_empty() {
            return None;
        }
        let bytes = self.text.as_bytes();
        let mut search = 0;
        while let Some(ofs) = self.text[search..].find('{') {
            let open = search + ofs;
            let len = bytes[open + 1..].iter().take_while(|&&c| is_var_char(c)).count();
            let close = open + 1 + len;
            if len > 0 && bytes.get(close) == Some(&b'}') {
                if open > 0 {
                    let literal = &self.text[..open];
                    self.text = &self.text[open..];
                    return Some(EvalPart::Literal(literal));
                }
                let var = &self.text[1..close];
                self.text = &self.text[close + 1..];
                return Some(EvalPart::VarRef(var));
            }
            search = open + 1;
        }
        let literal = self.text;
        self.text = "";
        Some(EvalPart::Literal(literal))
    }
}

/// Whether a template refers to the variable `var`.
pub fn mentions(template: &str, var: &str) -> bool {
    EvalString::new(template)
        .parse()
        .any(|part| matches!(part, EvalPart::VarRef(v) if v == var))
}

/// Expands a single template against an environment.
pub fn expand(template: &str, env: &dyn Env) -> String {
    EvalString::new(template).evaluate(&[env])
}

/// The values substituted into descriptors at build time.
#[derive(Debug, Clone)]
pub struct Vars {
    pub project_name: String,
    pub cwd: PathBuf,
}

impl Env for Vars {
    fn get_var(&self, var: &str) -> Option<Cow<str>> {
        match var {
            PROJECT_NAME => Some(Cow::Borrowed(&self.project_name)),
            CWD => Some(self.cwd.to_string_lossy()),
            _ => None,
        }
    }
}
