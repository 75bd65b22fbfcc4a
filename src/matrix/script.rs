//! One compiled test script: a binding rendered on top of the shared
//! defaults and body
//!
//! Assignments are emitted defaults first, then test params, then user
//! overrides. The shell evaluates them top to bottom, so a later assignment
//! of the same name wins.
//!
//! The body is raw bytes from the document, so the rendered script is bytes
//! too. Only the generated header is guaranteed to be UTF-8.

use std::borrow::Cow;
use std::fmt;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use tracing::trace;

use super::axis::ParameterBinding;
use super::defaults::DefaultParameterSet;
use crate::common::{shell_quote, Error, Result};

const SHEBANG: &str = "#!/bin/bash";
const BANNER: &str = "# test script auto generated by matrix-shell";

/// Build the descriptor `name/k=v__k2=v2` used to identify and filter scripts
///
/// Spaces in values become underscores.
pub fn descriptor(name: &str, binding: &ParameterBinding) -> String {
    let params = binding
        .iter()
        .map(|(k, v)| format!("{}={}", k, v.replace(' ', "_")))
        .collect::<Vec<_>>()
        .join("__");
    format!("{name}/{params}")
}

#[derive(Debug, Clone)]
pub struct TestScript {
    name: Arc<str>,
    binding: ParameterBinding,
    defaults: Arc<DefaultParameterSet>,
    body: Arc<[u8]>,
    overrides: Vec<(String, String)>,
    text: Vec<u8>,
}

impl TestScript {
    pub fn new(
        name: Arc<str>,
        binding: ParameterBinding,
        defaults: Arc<DefaultParameterSet>,
        body: Arc<[u8]>,
    ) -> Self {
        let mut script = Self {
            name,
            binding,
            defaults,
            body,
            overrides: Vec::new(),
            text: Vec::new(),
        };
        script.render();
        script
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn binding(&self) -> &ParameterBinding {
        &self.binding
    }

    pub fn defaults(&self) -> &DefaultParameterSet {
        &self.defaults
    }

    /// User overrides in the order they were first appended
    pub fn overrides(&self) -> &[(String, String)] {
        &self.overrides
    }

    pub fn descriptor(&self) -> String {
        descriptor(&self.name, &self.binding)
    }

    /// The rendered script, exactly as it is written to disk
    pub fn as_bytes(&self) -> &[u8] {
        &self.text
    }

    /// The rendered script as text, with invalid UTF-8 replaced
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.text)
    }

    /// Append one `KEY=VALUE` override and re-render
    ///
    /// The value is everything after the first `=`. Appending a key that is
    /// already overridden replaces its value.
    pub fn append_override(&mut self, param: &str) -> Result<()> {
        self.append_overrides([param])
    }

    /// Append several overrides at once
    ///
    /// Either all of them are applied or, on the first invalid one, none.
    pub fn append_overrides<I, S>(&mut self, params: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let parsed = params
            .into_iter()
            .map(|p| parse_override(p.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        for (key, value) in parsed {
            match self.overrides.iter_mut().find(|(k, _)| *k == key) {
                Some(existing) => existing.1 = value,
                None => self.overrides.push((key, value)),
            }
        }

        self.render();
        Ok(())
    }

    /// Write the rendered script to `path`
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, &self.text)?;
        trace!(path = %path.display(), descriptor = %self.descriptor(), "saved script");
        Ok(())
    }

    fn render(&mut self) {
        let mut header = String::with_capacity(256);
        header.push_str(SHEBANG);
        header.push('\n');
        header.push_str(BANNER);
        header.push_str("\n\n");

        push_section(&mut header, "default params", self.defaults.iter());
        push_section(&mut header, "test params", self.binding.iter());
        push_section(
            &mut header,
            "user defined params",
            self.overrides.iter().map(|(k, v)| (k.as_str(), v.as_str())),
        );

        let banner = format!("{} => {}", self.name, self.binding);
        let _ = writeln!(header, "echo {}", shell_quote(banner.trim_end()));

        let mut out = header.into_bytes();
        out.extend_from_slice(&self.body);
        self.text = out;
    }
}

fn push_section<'a>(out: &mut String, title: &str, params: impl Iterator<Item = (&'a str, &'a str)>) {
    let _ = writeln!(out, "# {title}");
    for (k, v) in params {
        let _ = writeln!(out, "{}={}", k, shell_quote(v));
    }
    out.push('\n');
}

fn parse_override(param: &str) -> Result<(String, String)> {
    match param.split_once('=') {
        Some((key, value)) if is_shell_name(key.trim()) => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(Error::InvalidOverride(param.to_string())),
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`, the names the shell accepts in an assignment
fn is_shell_name(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {
            chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
        }
        _ => false,
    }
}

impl fmt::Display for TestScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn binding(pairs: &[(&str, &str)]) -> ParameterBinding {
        ParameterBinding::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    fn script(pairs: &[(&str, &str)], defaults: &[(&str, &str)], body: &str) -> TestScript {
        TestScript::new(
            Arc::from("deploy"),
            binding(pairs),
            Arc::new(DefaultParameterSet::new(
                defaults
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            )),
            Arc::from(body.as_bytes()),
        )
    }

    fn position(text: &str, needle: &str) -> usize {
        text.find(needle)
            .unwrap_or_else(|| panic!("'{needle}' not found in:\n{text}"))
    }

    #[test]
    fn test_render_order() {
        let s = script(&[("env", "prod")], &[("region", "us")], "echo hi\n");
        let text = s.text();
        let text: &str = &text;

        assert!(text.starts_with("#!/bin/bash\n# test script auto generated by matrix-shell\n"));
        let region = position(text, "region='us'\n");
        let env = position(text, "env='prod'\n");
        let log = position(text, "echo 'deploy => env=prod'\n");
        let body = position(text, "echo hi\n");
        assert!(region < env && env < log && log < body);
        assert!(text.ends_with("echo hi\n"));
    }

    #[test]
    fn test_render_exact() {
        let s = script(&[("env", "prod")], &[("region", "us")], "echo hi\n");
        assert_eq!(
            s.to_string(),
            "#!/bin/bash\n\
             # test script auto generated by matrix-shell\n\
             \n\
             # default params\n\
             region='us'\n\
             \n\
             # test params\n\
             env='prod'\n\
             \n\
             # user defined params\n\
             \n\
             echo 'deploy => env=prod'\n\
             echo hi\n"
        );
    }

    #[test]
    fn test_overrides_come_last_and_rerender() {
        let mut s = script(&[("env", "prod")], &[("env", "dev")], "echo $env\n");
        let before = s.text().to_string();
        s.append_override("env=staging").unwrap();

        let text = s.text();
        assert_ne!(before, text);
        let defaults = position(&text, "env='dev'");
        let params = position(&text, "env='prod'");
        let user = position(&text, "env='staging'");
        assert!(defaults < params && params < user);
    }

    #[test]
    fn test_override_replaces_same_key() {
        let mut s = script(&[], &[], "");
        s.append_overrides(["a=1", "b=2"]).unwrap();
        s.append_override("a=3").unwrap();
        assert_eq!(
            s.overrides(),
            &[
                ("a".to_string(), "3".to_string()),
                ("b".to_string(), "2".to_string())
            ]
        );
        assert!(!s.text().contains("a='1'"));
    }

    #[test]
    fn test_override_value_keeps_later_equals() {
        let mut s = script(&[], &[], "");
        s.append_override("opts=a=b").unwrap();
        assert!(s.text().contains("opts='a=b'\n"));
    }

    #[test]
    fn test_invalid_override_applies_nothing() {
        let mut s = script(&[], &[], "");
        let before = s.text().to_string();
        assert!(matches!(
            s.append_overrides(["ok=1", "broken"]),
            Err(Error::InvalidOverride(_))
        ));
        assert!(matches!(s.append_override("=x"), Err(Error::InvalidOverride(_))));
        assert!(s.overrides().is_empty());
        assert_eq!(before, s.text());
    }

    #[test]
    fn test_override_key_must_be_shell_name() {
        let mut s = script(&[], &[], "");
        for bad in ["a b=1", "1x=2", "x-y=3", "$x=4", "é=5"] {
            assert!(
                matches!(s.append_override(bad), Err(Error::InvalidOverride(_))),
                "{bad} accepted"
            );
        }
        assert!(s.overrides().is_empty());

        s.append_overrides(["_ok1=v", " padded =w"]).unwrap();
        assert!(s.text().contains("_ok1='v'\n"));
        assert!(s.text().contains("padded='w'\n"));
    }

    #[test]
    fn test_body_bytes_survive_rendering() {
        let body: &[u8] = b"echo caf\xe9\r\n";
        let mut s = TestScript::new(
            Arc::from("latin"),
            ParameterBinding::default(),
            Arc::new(DefaultParameterSet::default()),
            Arc::from(body),
        );
        s.append_override("x=1").unwrap();
        assert!(s.as_bytes().ends_with(body));
        assert!(s.text().ends_with("echo caf\u{fffd}\r\n"));

        let dir = tempdir().unwrap();
        let path = dir.path().join("latin.sh");
        s.save(&path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), s.as_bytes());
    }

    #[test]
    fn test_descriptor() {
        let b = binding(&[("mode", "fast path"), ("size", "64")]);
        assert_eq!(descriptor("net", &b), "net/mode=fast_path__size=64");
        assert_eq!(descriptor("net", &ParameterBinding::default()), "net/");
    }

    #[test]
    fn test_descriptor_stable_across_rerenders() {
        let mut s = script(&[("env", "prod")], &[], "");
        let first = s.descriptor();
        s.append_override("x=1").unwrap();
        s.append_override("x=2").unwrap();
        assert_eq!(first, s.descriptor());
        assert_eq!(first, "deploy/env=prod");
    }

    #[test]
    fn test_values_are_quoted_safely() {
        let s = script(&[("msg", "it's")], &[], "");
        assert!(s.text().contains(r"msg='it'\''s'"));
    }

    #[test]
    fn test_clone_is_independent() {
        let original = script(&[("env", "prod")], &[], "");
        let mut copy = original.clone();
        copy.append_override("env=dev").unwrap();
        assert!(original.overrides().is_empty());
        assert!(!original.text().contains("env='dev'"));
    }

    #[test]
    fn test_save() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("testshell.sh");
        let s = script(&[("env", "prod")], &[], "true\n");
        s.save(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), s.text());
        assert_eq!(std::fs::read(&path).unwrap(), s.as_bytes());
    }
}
