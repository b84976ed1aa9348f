use anyhow::{Context, Result, bail};
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::app_config::Config;
use crate::event_log::EventLog;
use crate::file_utils;
use crate::providers::openai::OpenAI;
use crate::translation::{ProgressUpdate, TranslateOptions, TranslationEngine};

// @module: Application controller for markdown translation runs

/// Where a translated document goes.
enum OutputTarget {
    /// Write to this path, creating parents as needed
    File(PathBuf),
    /// Stream to standard output
    Stdout,
}

/// Main application controller for markdown translation
pub struct Controller {
    config: Config,
    engine: TranslationEngine,
}

impl Controller {
    /// Create a controller from validated configuration.
    pub fn new(
        config: Config,
        glossary: BTreeMap<String, String>,
        translation_prompt: String,
        judge_prompt: Option<String>,
        events: Arc<EventLog>,
    ) -> Result<Self> {
        config.validate()?;
        if config.translation.api_key.is_empty() {
            bail!("api_key is required. Set it in the config file or OPENAI_API_KEY.");
        }

        let provider = Arc::new(OpenAI::new_with_config(
            &config.translation.base_url,
            &config.translation.api_key,
            config.translation.timeout_ms,
        ));
        let engine = TranslationEngine::new(
            provider,
            &config,
            &glossary,
            &translation_prompt,
            judge_prompt.as_deref(),
            events,
        );

        Ok(Self { config, engine })
    }

    /// Translate a file or a directory tree of markdown files.
    pub async fn run(&self, input_path: &Path, output: Option<&str>) -> Result<()> {
        let metadata = std::fs::metadata(input_path)
            .with_context(|| format!("Failed to read input path: {}", input_path.display()))?;

        if metadata.is_dir() {
            if output == Some("-") {
                bail!("Output to stdout is not supported when input is a directory.");
            }
            self.run_folder(input_path, output.map(Path::new)).await
        } else {
            let target = self.resolve_file_output(input_path, output);
            self.translate_file(input_path, target).await
        }
    }

    /// Translate every markdown file under a directory.
    async fn run_folder(&self, input_dir: &Path, output_root: Option<&Path>) -> Result<()> {
        let files = file_utils::collect_markdown_files(input_dir)?;
        if files.is_empty() {
            info!("No markdown files found.");
            return Ok(());
        }

        for file in &files {
            let relative = file.strip_prefix(input_dir).unwrap_or(file);
            let base = match output_root {
                Some(root) => root.join(relative),
                None => file.clone(),
            };
            let output_path = file_utils::default_output_path(&base, &self.config.target_language);
            self.translate_file(file, OutputTarget::File(output_path)).await?;
        }

        info!("Translated {} markdown files.", files.len());
        Ok(())
    }

    fn resolve_file_output(&self, input: &Path, output: Option<&str>) -> OutputTarget {
        match output {
            Some("-") => OutputTarget::Stdout,
            Some(path_str) => {
                let path = Path::new(path_str);
                if path.is_dir() {
                    let default = file_utils::default_output_path(input, &self.config.target_language);
                    let name = default
                        .file_name()
                        .map(|n| n.to_os_string())
                        .unwrap_or_default();
                    OutputTarget::File(path.join(name))
                } else {
                    OutputTarget::File(path.to_path_buf())
                }
            }
            None => OutputTarget::File(file_utils::default_output_path(
                input,
                &self.config.target_language,
            )),
        }
    }

    /// Translate one file, drawing a per-file progress bar.
    async fn translate_file(&self, input: &Path, target: OutputTarget) -> Result<()> {
        let label = std::env::current_dir()
            .ok()
            .and_then(|cwd| input.strip_prefix(&cwd).ok().map(Path::to_path_buf))
            .unwrap_or_else(|| input.to_path_buf());

        let progress_bar = ProgressBar::new(0);
        let template_result = ProgressStyle::default_bar()
            .template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        progress_bar.set_style(template_result);
        progress_bar.set_message(label.display().to_string());

        let bar = progress_bar.clone();
        let on_progress = move |update: ProgressUpdate| {
            if bar.length() != Some(update.total.max(1) as u64) {
                bar.set_length(update.total.max(1) as u64);
            }
            bar.set_position(update.done as u64);
            if update.total == 0 || update.done >= update.total {
                bar.finish();
            }
        };

        let source = file_utils::read_to_string(input)?;
        let options = TranslateOptions {
            translate_markdown_code_blocks: self.config.translation.translate_markdown_code_blocks,
            on_progress: Some(&on_progress),
        };
        let output = self
            .engine
            .translate_markdown(&source, options)
            .await
            .with_context(|| format!("Failed to translate: {}", input.display()))?;

        if !progress_bar.is_finished() {
            progress_bar.finish();
        }

        match target {
            OutputTarget::Stdout => {
                print!("{output}");
            }
            OutputTarget::File(path) => {
                file_utils::write_string(&path, &output)?;
                info!("Translated markdown written to: {}", path.display());
            }
        }

        Ok(())
    }
}
