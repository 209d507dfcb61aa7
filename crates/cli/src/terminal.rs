use std::io::{self, Write};

use anyhow::{Context, Result};
use crossterm::{
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
};
use kat_command::{CommandEvent, CommandOutput};
use tracing::warn;

use crate::cli::OutputFormat;

/// Color scheme for terminal output.
struct Colors;

impl Colors {
    const KIND: Color = Color::Cyan;
    const ERROR: Color = Color::Red;
    const WARN: Color = Color::Yellow;
    const DIM: Color = Color::DarkGrey;
}

/// Writes rendered output to stdout and status lines to stderr.
pub struct Terminal {
    format: OutputFormat,
}

impl Terminal {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Display one runner event.
    pub fn display_event(&self, event: &CommandEvent) -> Result<()> {
        match event {
            CommandEvent::Start => self.print_info("rendering..."),
            CommandEvent::Cancel => self.print_info("superseded by a newer run"),
            CommandEvent::End(output) => self.display_output(output),
        }
    }

    /// Watch-mode display: a failure to print one event is logged and the
    /// stream goes on. Returns whether the event was printed.
    pub fn show_event(&self, event: &CommandEvent) -> bool {
        match self.display_event(event) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "failed to display event");
                false
            }
        }
    }

    /// Print resources (or the failure) of a finished run.
    pub fn display_output(&self, output: &CommandOutput) -> Result<()> {
        if let Some(error) = &output.error {
            self.print_error(&error.to_string())?;
        }
        if output.truncation.is_truncated() {
            self.print_warning(&format!("output truncated: {}", output.truncation))?;
        }

        match self.format {
            OutputFormat::Summary => self.print_summary(output)?,
            format => {
                let mut stdout = io::stdout();
                stdout.write_all(format_output(output, format)?.as_bytes())?;
                stdout.flush()?;
            }
        }

        if output.error.is_none() {
            self.print_info(&format!(
                "{} resources in {} ms",
                output.resources.len(),
                output.duration().num_milliseconds()
            ))?;
        }
        Ok(())
    }

    fn print_summary(&self, output: &CommandOutput) -> Result<()> {
        let mut stdout = io::stdout();
        for resource in &output.resources {
            execute!(
                stdout,
                SetForegroundColor(Colors::KIND),
                Print(format!("{:<32}", resource.group_kind().to_string())),
                ResetColor,
                Print(format!(" {}\n", resource.namespaced_name())),
            )?;
        }
        stdout.flush()?;
        Ok(())
    }

    pub fn print_profiles<'a>(&self, names: impl Iterator<Item = (&'a str, String)>) -> Result<()> {
        let mut stdout = io::stdout();
        for (name, command) in names {
            execute!(
                stdout,
                SetForegroundColor(Colors::KIND),
                Print(format!("{:<16}", name)),
                ResetColor,
                Print(format!(" {}\n", command)),
            )?;
        }
        stdout.flush()?;
        Ok(())
    }

    /// Print an error message.
    pub fn print_error(&self, msg: &str) -> Result<()> {
        self.print_status(Colors::ERROR, &format!("Error: {}", msg))
    }

    pub fn print_warning(&self, msg: &str) -> Result<()> {
        self.print_status(Colors::WARN, msg)
    }

    /// Print an info message.
    pub fn print_info(&self, msg: &str) -> Result<()> {
        self.print_status(Colors::DIM, msg)
    }

    fn print_status(&self, color: Color, msg: &str) -> Result<()> {
        let mut stderr = io::stderr();
        execute!(
            stderr,
            SetForegroundColor(color),
            Print(format!("{}\n", msg)),
            ResetColor,
        )?;
        stderr.flush()?;
        Ok(())
    }
}

/// Machine-readable rendering of the decoded resources.
pub fn format_output(output: &CommandOutput, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Summary => Ok(output
            .resources
            .iter()
            .map(|r| format!("{} {}\n", r.group_kind(), r.namespaced_name()))
            .collect()),
        OutputFormat::Yaml => Ok(output
            .resources
            .iter()
            .map(|r| format!("---\n{}\n", r.yaml.trim()))
            .collect()),
        OutputFormat::Json => {
            let objects: Vec<_> = output.resources.iter().map(|r| &r.object).collect();
            let mut json = serde_json::to_string_pretty(&objects).context("failed to encode resources as JSON")?;
            json.push('\n');
            Ok(json)
        }
    }
}

#[cfg(test)]
mod tests {
    use kat_command::ProfileExec;
    use kat_rules::Profile;
    use tempfile::TempDir;

    use super::*;

    async fn rendered() -> CommandOutput {
        let dir = TempDir::new().unwrap();
        let profile = Profile::new(
            "printf",
            ["apiVersion: apps/v1\\nkind: Deployment\\nmetadata:\\n  name: web\\n  namespace: prod\\n---\\napiVersion: v1\\nkind: Namespace\\nmetadata:\\n  name: prod\\n"],
        );
        profile.exec(dir.path(), 1 << 20, &Default::default()).await
    }

    #[tokio::test]
    async fn summary_lists_group_kind_and_name() {
        let output = rendered().await;
        assert_eq!(
            format_output(&output, OutputFormat::Summary).unwrap(),
            "Deployment.apps prod/web\nNamespace prod\n"
        );
    }

    #[tokio::test]
    async fn yaml_keeps_documents() {
        let output = rendered().await;
        let yaml = format_output(&output, OutputFormat::Yaml).unwrap();
        assert!(yaml.starts_with("---\napiVersion: apps/v1\n"));
        assert_eq!(yaml.matches("---\n").count(), 2);
    }

    #[tokio::test]
    async fn undisplayable_event_does_not_stop_the_stream() {
        let dir = TempDir::new().unwrap();
        let profile = Profile::new("printf", ["kind: A\\n? [1, 2]\\n: x\\n"]);
        let output = profile.exec(dir.path(), 1 << 20, &Default::default()).await;
        assert_eq!(output.resources.len(), 1, "{:?}", output.error);
        assert!(format_output(&output, OutputFormat::Json).is_err());

        let terminal = Terminal::new(OutputFormat::Json);
        assert!(!terminal.show_event(&CommandEvent::End(output)));
        assert!(terminal.show_event(&CommandEvent::Start));
    }

    #[tokio::test]
    async fn json_encodes_objects() {
        let output = rendered().await;
        let json: serde_json::Value =
            serde_json::from_str(&format_output(&output, OutputFormat::Json).unwrap()).unwrap();
        assert_eq!(json[0]["metadata"]["name"], "web");
        assert_eq!(json[1]["kind"], "Namespace");
    }
}
