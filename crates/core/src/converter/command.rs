//! External-program converter implementation.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

use super::config::ConverterConfig;
use super::error::ConverterError;
use super::traits::SingleFileConverter;
use super::types::{ConvertedFile, WorkItem};

/// Runs a configured codec program once per region file.
///
/// The program writes to a hidden partial path which is renamed onto the
/// destination only after a successful exit, so an interrupted or failed
/// conversion never leaves a truncated region file behind.
pub struct CommandConverter {
    config: ConverterConfig,
}

impl CommandConverter {
    /// Creates a new converter with the given configuration.
    pub fn new(config: ConverterConfig) -> Self {
        Self { config }
    }

    /// Creates a converter with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(ConverterConfig::default())
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// Expands the argument template for one item.
    fn build_args(&self, item: &WorkItem, output_path: &Path) -> Vec<String> {
        let value = |name: &str| -> Option<String> {
            match name {
                "mode" => Some(item.mode().as_str().to_string()),
                "source" => Some(item.source_path().to_string_lossy().into_owned()),
                "destination_dir" => Some(item.destination_dir().to_string_lossy().into_owned()),
                "destination" => Some(output_path.to_string_lossy().into_owned()),
                "level" => Some(item.compression_level().to_string()),
                _ => None,
            }
        };
        self.config
            .args
            .iter()
            .map(|arg| expand_placeholders(arg, &value))
            .collect()
    }

    fn truncate_stderr(&self, raw: &[u8]) -> Option<String> {
        let text = String::from_utf8_lossy(raw);
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let mut end = text.len().min(self.config.stderr_limit);
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        Some(text[..end].to_string())
    }

    fn not_found(&self, e: std::io::Error) -> ConverterError {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConverterError::ProgramNotFound {
                path: self.config.program.clone(),
            }
        } else {
            ConverterError::Io(e)
        }
    }

    async fn run_program(&self, item: &WorkItem) -> Result<ConvertedFile, ConverterError> {
        let start = Instant::now();
        let partial = item.partial_path();
        let destination = item.destination_path();
        let args = self.build_args(item, &partial);

        debug!(
            program = %self.config.program.display(),
            source = %item.source_path().display(),
            "Running converter"
        );

        let child = Command::new(&self.config.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.not_found(e))?;

        // Dropping the pending future on timeout drops the child, which kills it.
        let output = match self.config.timeout_secs {
            Some(secs) => timeout(Duration::from_secs(secs), child.wait_with_output())
                .await
                .map_err(|_| ConverterError::Timeout { timeout_secs: secs })??,
            None => child.wait_with_output().await?,
        };

        if !output.status.success() {
            return Err(ConverterError::conversion_failed(
                format!("{} exited with code: {:?}", self.program_name(), output.status.code()),
                self.truncate_stderr(&output.stderr),
            ));
        }

        if tokio::fs::try_exists(&partial).await.unwrap_or(false) {
            tokio::fs::rename(&partial, &destination).await?;
        } else if !tokio::fs::try_exists(&destination).await.unwrap_or(false) {
            // Tools given only {destination_dir} write the final name themselves.
            return Err(ConverterError::MissingOutput { path: destination });
        }

        let output_meta = tokio::fs::metadata(&destination).await?;

        Ok(ConvertedFile {
            output_path: destination,
            output_size_bytes: output_meta.len(),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn program_name(&self) -> String {
        self.config
            .program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.config.program.display().to_string())
    }
}

/// Replace each `{name}` token of `template` in a single left-to-right pass.
/// Substituted text is never scanned again; unknown names are kept as-is.
fn expand_placeholders(template: &str, value: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let token = &rest[open..];
        let expanded = token
            .find('}')
            .and_then(|close| value(&token[1..close]).map(|v| (v, close)));
        match expanded {
            Some((v, close)) => {
                out.push_str(&v);
                rest = &token[close + 1..];
            }
            None => {
                out.push('{');
                rest = &token[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Looks `program` up the way the OS would when spawning it.
fn resolve_program(program: &Path) -> Option<PathBuf> {
    if program.components().count() > 1 || program.is_absolute() {
        return program.is_file().then(|| program.to_path_buf());
    }
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

#[async_trait]
impl SingleFileConverter for CommandConverter {
    fn name(&self) -> &str {
        "command"
    }

    async fn validate(&self) -> Result<(), ConverterError> {
        match resolve_program(&self.config.program) {
            Some(path) => {
                debug!(program = %path.display(), "Converter program resolved");
                Ok(())
            }
            None => Err(ConverterError::ProgramNotFound {
                path: self.config.program.clone(),
            }),
        }
    }

    async fn convert(&self, item: &WorkItem) -> Result<ConvertedFile, ConverterError> {
        if !tokio::fs::try_exists(item.source_path()).await.unwrap_or(false) {
            return Err(ConverterError::InputNotFound {
                path: item.source_path().to_path_buf(),
            });
        }

        let result = self.run_program(item).await;
        if result.is_err() {
            let partial = item.partial_path();
            if let Err(e) = tokio::fs::remove_file(&partial).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %partial.display(), error = %e, "Failed to remove partial output");
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::ConversionMode;
    use tempfile::TempDir;

    fn item_in(dir: &Path, name: &str) -> WorkItem {
        WorkItem::new(
            dir.join(name),
            ConversionMode::McaToLinear,
            dir.join("out"),
            9,
        )
        .unwrap()
    }

    fn sh(script: &str) -> CommandConverter {
        CommandConverter::new(ConverterConfig::with_program(
            "sh",
            vec![
                "-c".to_string(),
                script.to_string(),
                "sh".to_string(),
                "{source}".to_string(),
                "{destination}".to_string(),
                "{level}".to_string(),
            ],
        ))
    }

    #[test]
    fn test_build_args_expands_placeholders() {
        let converter = CommandConverter::with_defaults();
        let item = WorkItem::new(
            PathBuf::from("/world/r.0.1.mca"),
            ConversionMode::McaToLinear,
            PathBuf::from("/out"),
            12,
        )
        .unwrap();

        let args = converter.build_args(&item, &item.partial_path());
        assert_eq!(
            args,
            vec![
                "mca2linear",
                "--level",
                "12",
                "/world/r.0.1.mca",
                "/out/.r.0.1.partial.linear",
            ]
        );
    }

    #[test]
    fn test_destination_dir_placeholder() {
        let converter = CommandConverter::new(ConverterConfig::with_program(
            "tool",
            vec!["{destination_dir}".to_string(), "{destination}".to_string()],
        ));
        let item = WorkItem::new(
            PathBuf::from("/world/r.0.1.linear"),
            ConversionMode::LinearToMca,
            PathBuf::from("/restore"),
            6,
        )
        .unwrap();

        let args = converter.build_args(&item, Path::new("/restore/x.mca"));
        assert_eq!(args, vec!["/restore", "/restore/x.mca"]);
    }

    #[test]
    fn test_build_args_does_not_expand_inside_paths() {
        let converter = CommandConverter::with_defaults();
        let item = WorkItem::new(
            PathBuf::from("/worlds/{level}/r.0.0.mca"),
            ConversionMode::McaToLinear,
            PathBuf::from("/out/{mode}"),
            6,
        )
        .unwrap();

        let args = converter.build_args(&item, &item.partial_path());
        assert_eq!(
            args,
            vec![
                "mca2linear",
                "--level",
                "6",
                "/worlds/{level}/r.0.0.mca",
                "/out/{mode}/.r.0.0.partial.linear",
            ]
        );
    }

    #[test]
    fn test_expand_placeholders_edge_cases() {
        let value = |name: &str| (name == "level").then(|| "9".to_string());

        assert_eq!(expand_placeholders("-l{level}", value), "-l9");
        assert_eq!(expand_placeholders("{{level}}", value), "{9}");
        assert_eq!(expand_placeholders("{unknown} {level", value), "{unknown} {level");
        assert_eq!(expand_placeholders("plain", value), "plain");
    }

    #[test]
    fn test_truncate_stderr() {
        let mut config = ConverterConfig::default();
        config.stderr_limit = 5;
        let converter = CommandConverter::new(config);

        assert_eq!(converter.truncate_stderr(b"  \n"), None);
        assert_eq!(
            converter.truncate_stderr(b"bad header\n"),
            Some("bad h".to_string())
        );
    }

    #[tokio::test]
    async fn test_validate_missing_program() {
        let converter = CommandConverter::new(ConverterConfig::with_program(
            "/nonexistent/region-codec",
            vec![],
        ));
        let err = converter.validate().await.unwrap_err();
        assert!(matches!(err, ConverterError::ProgramNotFound { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_convert_success_renames_partial() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("out")).unwrap();
        std::fs::write(temp.path().join("r.0.0.mca"), b"region").unwrap();
        let item = item_in(temp.path(), "r.0.0.mca");

        let converter = sh("cp \"$1\" \"$2\"");
        let result = converter.convert(&item).await.unwrap();

        assert_eq!(result.output_path, temp.path().join("out/r.0.0.linear"));
        assert_eq!(result.output_size_bytes, 6);
        assert!(!item.partial_path().exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_convert_failure_captures_stderr_and_cleans_up() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("out")).unwrap();
        std::fs::write(temp.path().join("r.0.0.mca"), b"region").unwrap();
        let item = item_in(temp.path(), "r.0.0.mca");

        let converter = sh("echo partial > \"$2\"; echo 'corrupt chunk table' >&2; exit 3");
        let err = converter.convert(&item).await.unwrap_err();

        match &err {
            ConverterError::ConversionFailed { stderr, .. } => {
                assert_eq!(stderr.as_deref(), Some("corrupt chunk table"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.detail().contains("corrupt chunk table"));
        assert!(!item.partial_path().exists());
        assert!(!item.destination_path().exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_convert_missing_output() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("out")).unwrap();
        std::fs::write(temp.path().join("r.0.0.mca"), b"region").unwrap();
        let item = item_in(temp.path(), "r.0.0.mca");

        let converter = sh("exit 0");
        let err = converter.convert(&item).await.unwrap_err();
        assert!(matches!(err, ConverterError::MissingOutput { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_convert_timeout() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("out")).unwrap();
        std::fs::write(temp.path().join("r.0.0.mca"), b"region").unwrap();
        let item = item_in(temp.path(), "r.0.0.mca");

        let mut config = ConverterConfig::with_program(
            "sh",
            vec!["-c".to_string(), "sleep 5".to_string()],
        );
        config.timeout_secs = Some(1);
        let converter = CommandConverter::new(config);

        let err = converter.convert(&item).await.unwrap_err();
        assert!(matches!(err, ConverterError::Timeout { timeout_secs: 1 }));
    }

    #[tokio::test]
    async fn test_convert_missing_input() {
        let temp = TempDir::new().unwrap();
        let item = item_in(temp.path(), "r.9.9.mca");

        let converter = CommandConverter::with_defaults();
        let err = converter.convert(&item).await.unwrap_err();
        assert!(matches!(err, ConverterError::InputNotFound { .. }));
    }
}
