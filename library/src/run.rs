//! `retrolaunch run` - launch a core headlessly and collect its outputs

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Args;
use retrolaunch_core::options::defaults::core_name_from_file;
use retrolaunch_core::{
    CoreSource, InputDescriptor, LaunchOptions, RuntimeController, Size, configure, launch,
};

use crate::config::Config;

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Core id (`fceumm`, `snes9x`, ...) or path/URL to a core binary
    #[arg(long)]
    pub core: Option<String>,

    /// Core script half, for a core given as explicit files
    #[arg(long, requires = "wasm", conflicts_with = "core")]
    pub js: Option<PathBuf>,

    /// Core binary half, for a core given as explicit files
    #[arg(long, requires = "js", conflicts_with = "core")]
    pub wasm: Option<PathBuf>,

    /// Content to run: path, URL or bare name (repeatable)
    #[arg(value_name = "ROM")]
    pub rom: Vec<String>,

    /// Firmware file (repeatable)
    #[arg(long)]
    pub bios: Vec<String>,

    /// Shader preset or file (repeatable)
    #[arg(long)]
    pub shader: Vec<String>,

    /// Save state to load after launch
    #[arg(long)]
    pub state: Option<PathBuf>,

    /// Battery save to install before launch
    #[arg(long)]
    pub sram: Option<PathBuf>,

    /// Canvas width
    #[arg(long, requires = "height")]
    pub width: Option<u32>,

    /// Canvas height
    #[arg(long, requires = "width")]
    pub height: Option<u32>,

    /// How long to let the core run before collecting outputs, in seconds
    #[arg(long, default_value_t = 5.0)]
    pub duration: f64,

    /// Write a screenshot here before exiting
    #[arg(long)]
    pub screenshot_out: Option<PathBuf>,

    /// Write a save state here before exiting
    #[arg(long)]
    pub state_out: Option<PathBuf>,

    /// Write the battery save here before exiting
    #[arg(long)]
    pub sram_out: Option<PathBuf>,
}

impl RunArgs {
    fn core_source(&self, config: &Config) -> Result<CoreSource> {
        if let (Some(js), Some(wasm)) = (&self.js, &self.wasm) {
            let name = wasm
                .file_name()
                .map(|name| core_name_from_file(&name.to_string_lossy()))
                .context("--wasm must name a file")?;
            return Ok(CoreSource::Explicit {
                name,
                js: InputDescriptor::File(js.clone()),
                wasm: InputDescriptor::File(wasm.clone()),
            });
        }
        match self.core.clone().or_else(|| config.launch.core.clone()) {
            Some(core) => Ok(CoreSource::Id(core)),
            None => bail!("no core given; pass --core or set [launch] core in the config file"),
        }
    }

    /// Per-run options, layered over the configuration file's defaults.
    pub fn launch_options(&self, config: &Config) -> Result<LaunchOptions> {
        let mut options = LaunchOptions::new().core(self.core_source(config)?);
        options.rom = self.rom.iter().cloned().map(InputDescriptor::from).collect();
        options.bios = self.bios.iter().cloned().map(InputDescriptor::from).collect();
        options.shader = self.shader.iter().cloned().map(InputDescriptor::from).collect();
        options.state = self.state.clone().map(InputDescriptor::File);
        options.sram = self.sram.clone().map(InputDescriptor::File);
        if let (Some(width), Some(height)) = (self.width, self.height) {
            options.size = Some(Size::new(width, height));
        }
        Ok(options)
    }

    fn duration(&self) -> Result<Duration> {
        Duration::try_from_secs_f64(self.duration).context("--duration must be a non-negative number")
    }
}

/// Launch, let the core run, then save whatever outputs were requested.
pub async fn execute(args: &RunArgs, config: &Config) -> Result<()> {
    configure(config.launch_options());
    let options = args.launch_options(config)?;
    let duration = args.duration()?;

    let controller = launch(options).await.context("Failed to launch core")?;
    tracing::info!(
        core = %controller.options().core.name,
        seconds = duration.as_secs_f64(),
        "core running"
    );

    tokio::time::sleep(duration).await;
    let collected = collect_outputs(&controller, args).await;

    let code = controller.exit_code().unwrap_or(0);
    controller.exit(code);
    collected
}

async fn collect_outputs(controller: &RuntimeController, args: &RunArgs) -> Result<()> {
    if let Some(path) = &args.screenshot_out {
        let png = controller.screenshot().await.context("Failed to take screenshot")?;
        write_output(path, &png)?;
    }
    if let Some(path) = &args.state_out {
        let saved = controller.save_state().await.context("Failed to save state")?;
        write_output(path, &saved.state)?;
        if let Some(thumbnail) = &saved.thumbnail {
            write_output(&thumbnail_path(path), thumbnail)?;
        }
    }
    if let Some(path) = &args.sram_out {
        let sram = controller.save_sram().await.context("Failed to save battery data")?;
        write_output(path, &sram)?;
    }
    Ok(())
}

/// `game.state` → `game.state.png`
fn thumbnail_path(state: &Path) -> PathBuf {
    let mut name = state.as_os_str().to_owned();
    name.push(".png");
    PathBuf::from(name)
}

fn write_output(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    std::fs::write(path, data).with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), bytes = data.len(), "output written");
    Ok(())
}
