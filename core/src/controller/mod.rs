//! Lifecycle and command control for a launched core
//!
//! [`RuntimeController::setup`] loads the core and populates its filesystem;
//! [`RuntimeController::launch`] runs it. Afterwards every intent (save a
//! state, press a button, take a screenshot) becomes filesystem work plus a
//! command sent over one of two channels: a direct method call when the core
//! exports one, otherwise a line pushed onto the core's command byte queue.

pub mod commands;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::try_join_all;
use retrolaunch_shared::{ConfigMap, core_full_name, ini, keys, layout};

use crate::abort;
use crate::error::{Error, Result};
use crate::input::{InputDescriptor, ResolvableInput, ResolveContext};
use crate::module::{CoreModule, ModuleConfig};
use crate::options::RuntimeOptions;
use crate::surface::{EventKind, HostEvent, ListenerId, Size, Surface};
use crate::vfs::VirtualFileSystemBridge;

/// How long a scripted button press is held.
pub const PRESS_DELAY: Duration = Duration::from_millis(100);

/// Run state of a launched core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Initial,
    Running,
    Paused,
    /// Absorbing; nothing leaves this state
    Terminated,
}

/// Bytes captured by [`RuntimeController::save_state`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedState {
    pub state: Vec<u8>,
    /// Present only when state thumbnails are enabled in the frontend config
    pub thumbnail: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Copy)]
enum ListenerHost {
    Document,
    Surface,
}

/// A running (or about to run) core and everything needed to drive it.
pub struct RuntimeController {
    options: RuntimeOptions,
    core: Arc<dyn CoreModule>,
    config: ModuleConfig,
    bridge: VirtualFileSystemBridge,
    status: Mutex<Status>,
    /// Set by the first `launch`; main runs at most once
    launched: AtomicBool,
    installed: Mutex<Vec<(ListenerHost, ListenerId)>>,
    recorded_size: Mutex<Option<Size>>,
}

impl RuntimeController {
    /// Load the core and populate its filesystem.
    ///
    /// Content, firmware, shaders and the battery save are written
    /// concurrently; configuration is written only after all of them land.
    pub async fn setup(options: RuntimeOptions) -> Result<Self> {
        let signal = options.signal.clone();
        abort::check(signal.as_ref())?;

        let config = ModuleConfig::new(
            &options.core.name,
            options.surface.clone(),
            options.document.clone(),
        );
        tracing::info!(core = %options.core.name, "loading core");
        let core = options.loader.load(&options.core, config.clone()).await?;
        abort::check(signal.as_ref())?;

        let controller = Self {
            bridge: VirtualFileSystemBridge::new(core.clone(), options.poll),
            options,
            core,
            config,
            status: Mutex::new(Status::Initial),
            launched: AtomicBool::new(false),
            installed: Mutex::new(Vec::new()),
            recorded_size: Mutex::new(None),
        };

        if let Err(e) = controller.prepare().await {
            tracing::warn!(error = %e, "core setup failed");
            controller.exit(1);
            return Err(e);
        }
        Ok(controller)
    }

    async fn prepare(&self) -> Result<()> {
        let signal = self.options.signal.as_ref();

        self.config.run_dependencies.wait_idle().await;
        abort::check(signal)?;

        self.bridge.provision().await?;
        abort::check(signal)?;

        self.write_inputs().await?;
        abort::check(signal)?;

        self.write_configs().await?;
        abort::check(signal)
    }

    async fn write_inputs(&self) -> Result<()> {
        let options = &self.options;
        let mut files: Vec<(String, &ResolvableInput)> = Vec::new();

        for rom in &options.rom {
            files.push((layout::content_path(rom.name()), rom));
        }
        for bios in &options.bios {
            files.push((layout::system_path(bios.name()), bios));
        }
        for shader in &options.shader {
            files.push((layout::shader_path(shader.name()), shader));
        }
        if let Some(sram) = &options.sram {
            let base = self
                .content_base_name()
                .unwrap_or_else(|| sram.base_name().to_string());
            files.push((layout::sram_path(self.core_full_name()?, &base), sram));
        }

        try_join_all(
            files
                .iter()
                .map(|(path, input)| self.bridge.write_file(path, input)),
        )
        .await?;
        tracing::debug!(files = files.len(), "inputs written");
        Ok(())
    }

    /// Frontend config with the fixed directory layout filled in.
    fn frontend_config(&self) -> ConfigMap {
        let mut config = self.options.retroarch_config.clone();
        for (key, dir) in [
            ("savefile_directory", layout::SAVES_DIR),
            ("savestate_directory", layout::STATES_DIR),
            ("screenshot_directory", layout::SCREENSHOT_DIR),
            ("system_directory", layout::SYSTEM_DIR),
            ("rgui_config_directory", layout::CONFIG_DIR),
        ] {
            config.entry(key.to_string()).or_insert_with(|| dir.into());
        }
        config
    }

    async fn write_configs(&self) -> Result<()> {
        self.bridge
            .write_config(layout::CONFIG_PATH, &self.frontend_config())
            .await?;
        self.bridge
            .write_config(layout::CORE_CONFIG_PATH, &self.options.retroarch_core_config)
            .await?;

        let presets: Vec<String> = self
            .options
            .shader
            .iter()
            .filter(|shader| {
                shader
                    .extension()
                    .eq_ignore_ascii_case(layout::SHADER_PRESET_EXTENSION)
            })
            .map(|shader| layout::shader_path(shader.name()))
            .collect();
        if !presets.is_empty() {
            let preset = ResolvableInput::from_text("global.glslp", layout::shader_preset(&presets));
            self.bridge
                .write_file(layout::SHADER_PRESET_PATH, &preset)
                .await?;
        }
        Ok(())
    }

    /// Start the core. Only a controller still in `Initial` can be launched.
    pub async fn launch(&self) -> Result<()> {
        let status = self.status();
        if status != Status::Initial || self.launched.swap(true, Ordering::AcqRel) {
            return Err(Error::AlreadyLaunched(status));
        }

        let options = &self.options;
        let signal = options.signal.as_ref();
        abort::check(signal)?;

        let surface = &options.surface;
        if !surface.is_attached() {
            options.document.attach(surface);
        }
        if let Some(size) = options.size {
            surface.set_size(size);
        }
        let recorded = surface.size();
        *lock(&self.recorded_size) = Some(recorded);

        if let Some(gate) = &options.wait_for_interaction {
            tracing::debug!("waiting for user interaction");
            gate().await;
            abort::check(signal)?;
        }
        if let Some(hook) = &options.before_launch {
            hook().await?;
            abort::check(signal)?;
        }

        let args = self.main_args();
        tracing::info!(core = %options.core.name, ?args, "starting core");
        self.core.call_main(&args)?;
        self.set_status(Status::Running);

        // Cores resize the canvas to their own preference while starting.
        self.apply_size(recorded);

        for gamepad in options.document.connected_gamepads() {
            self.config
                .handlers
                .dispatch(&HostEvent::GamepadConnected { gamepad });
        }
        self.rebind_keyboard_handlers();

        if let Some(state) = &options.state {
            self.load_state(state.clone()).await?;
        }
        if let Some(hook) = &options.on_launch {
            hook().await?;
            abort::check(signal)?;
        }
        Ok(())
    }

    fn main_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(rom) = self.options.rom.first() {
            args.push(layout::content_path(rom.name()));
        }
        args.push("-c".to_string());
        args.push(layout::CONFIG_PATH.to_string());
        args
    }

    /// Route the core's keyboard handlers through the document or the surface.
    fn rebind_keyboard_handlers(&self) {
        self.remove_listeners();

        let host = if self.options.respond_to_global_events {
            ListenerHost::Document
        } else {
            ListenerHost::Surface
        };
        let target = match host {
            ListenerHost::Document => self.options.document.target(),
            ListenerHost::Surface => self.options.surface.target(),
        };

        let mut installed = lock(&self.installed);
        for (kind, handler) in self.config.handlers.handlers() {
            if matches!(kind, EventKind::KeyDown | EventKind::KeyUp) {
                installed.push((host, target.add_listener(kind, handler)));
            }
        }
        tracing::debug!(?host, listeners = installed.len(), "keyboard handlers bound");
    }

    fn remove_listeners(&self) {
        for (host, id) in lock(&self.installed).drain(..) {
            let target = match host {
                ListenerHost::Document => self.options.document.target(),
                ListenerHost::Surface => self.options.surface.target(),
            };
            if !target.remove_listener(id) {
                tracing::debug!(?host, "listener already removed");
            }
        }
    }

    /// Issue a named command, preferring the core's direct method.
    ///
    /// Unknown names, and known ones the core has no method for, are queued
    /// as a line of text for the core's input callback.
    pub fn send_command(&self, command: &str) -> Result<()> {
        if let Some(method) = commands::method_for(command)
            && self.core.has_method(method)
        {
            tracing::debug!(command, method, "sending command directly");
            self.core.call_method(method)?;
            return Ok(());
        }
        if self.config.commands.push_command(command) {
            tracing::debug!(command, "queued command");
        } else {
            tracing::debug!(command, "command queue disarmed, dropping command");
        }
        Ok(())
    }

    fn core_full_name(&self) -> Result<&'static str> {
        let name = &self.options.core.name;
        core_full_name(name).ok_or_else(|| Error::InvalidCoreName(name.clone()))
    }

    fn content_base_name(&self) -> Option<String> {
        self.options
            .rom
            .first()
            .map(|rom| rom.base_name().to_string())
    }

    fn require_content_base_name(&self) -> Result<String> {
        self.content_base_name()
            .ok_or_else(|| Error::InputResolution("no content was loaded".to_string()))
    }

    fn state_paths(&self) -> Result<(String, String)> {
        let full_name = self.core_full_name()?;
        let base = self.require_content_base_name()?;
        Ok((
            layout::state_path(full_name, &base),
            layout::state_thumbnail_path(full_name, &base),
        ))
    }

    fn thumbnails_enabled(&self) -> bool {
        self.options
            .retroarch_config
            .get("savestate_thumbnail_enable")
            .is_some_and(|value| value.is_truthy())
    }

    /// Capture the core's execution state.
    pub async fn save_state(&self) -> Result<SavedState> {
        let (state_path, thumbnail_path) = self.state_paths()?;
        self.bridge.unlink(&state_path);
        self.bridge.unlink(&thumbnail_path);

        self.send_command(commands::SAVE_STATE)?;
        let state = self.bridge.wait_for_file(&state_path).await?;
        let thumbnail = if self.thumbnails_enabled() {
            Some(self.bridge.wait_for_file(&thumbnail_path).await?)
        } else {
            None
        };

        self.bridge.unlink(&state_path);
        self.bridge.unlink(&thumbnail_path);
        tracing::info!(bytes = state.len(), "state saved");
        Ok(SavedState { state, thumbnail })
    }

    /// Restore a previously captured state.
    pub async fn load_state(&self, state: impl Into<InputDescriptor>) -> Result<()> {
        let ctx = ResolveContext::with_signal(self.options.signal.clone());
        let input = ResolvableInput::create(state, &ctx).await?;
        let (state_path, thumbnail_path) = self.state_paths()?;

        self.bridge.unlink(&state_path);
        self.bridge.unlink(&thumbnail_path);
        self.bridge.write_file(&state_path, &input).await?;
        self.bridge.wait_for_file(&state_path).await?;
        self.send_command(commands::LOAD_STATE)?;
        tracing::info!(name = input.name(), "state loaded");
        Ok(())
    }

    /// Flush and return the battery save.
    pub async fn save_sram(&self) -> Result<Vec<u8>> {
        let base = self.require_content_base_name()?;
        let path = layout::sram_path(self.core_full_name()?, &base);

        self.bridge.unlink(&path);
        self.send_command(commands::SAVE_FILES)?;
        let sram = self.bridge.wait_for_file(&path).await?;
        tracing::info!(bytes = sram.len(), "battery save flushed");
        Ok(sram)
    }

    /// Take a screenshot and return the PNG bytes.
    pub async fn screenshot(&self) -> Result<Vec<u8>> {
        let base = self.require_content_base_name()?;
        self.send_command(commands::SCREENSHOT)?;

        let file_name = layout::screenshot_file_name(&base, &chrono::Local::now());
        let path = layout::screenshot_path(&file_name);
        let png = self.bridge.wait_for_file(&path).await?;
        self.bridge.unlink(&path);
        Ok(png)
    }

    /// Keyboard code bound to a player's button in the live frontend config.
    fn key_code_for(&self, button: &str, player: u32) -> Result<Option<u32>> {
        let config = self.bridge.read_file(layout::CONFIG_PATH)?;
        let config = ini::parse(&String::from_utf8_lossy(&config));
        let key = format!("input_player{}_{}", player, button);
        Ok(config.get(&key).and_then(|binding| keys::key_code(binding)))
    }

    /// Press and release a button.
    pub async fn press(&self, button: &str, player: u32) -> Result<()> {
        let Some(key_code) = self.key_code_for(button, player)? else {
            tracing::debug!(button, player, "button is not bound");
            return Ok(());
        };
        self.config.handlers.dispatch(&HostEvent::KeyDown { key_code });
        tokio::time::sleep(PRESS_DELAY).await;
        self.config.handlers.dispatch(&HostEvent::KeyUp { key_code });
        Ok(())
    }

    pub fn press_down(&self, button: &str, player: u32) -> Result<()> {
        if let Some(key_code) = self.key_code_for(button, player)? {
            self.config.handlers.dispatch(&HostEvent::KeyDown { key_code });
        }
        Ok(())
    }

    pub fn press_up(&self, button: &str, player: u32) -> Result<()> {
        if let Some(key_code) = self.key_code_for(button, player)? {
            self.config.handlers.dispatch(&HostEvent::KeyUp { key_code });
        }
        Ok(())
    }

    /// Stop the core. Cleanup failures are logged, never returned.
    pub fn exit(&self, code: i32) {
        if self.status() == Status::Terminated {
            return;
        }
        if let Err(e) = self.core.exit(code) {
            tracing::warn!(error = %e, code, "core exit failed");
        }
        self.remove_listeners();
        self.config.commands.disarm();
        self.set_status(Status::Terminated);
        tracing::info!(code, "core terminated");
    }

    pub fn resize(&self, size: Size) {
        self.apply_size(size);
    }

    fn apply_size(&self, size: Size) {
        self.options.surface.set_size(size);
        self.core.set_canvas_size(size.width, size.height);
    }

    /// Reset the running content, resuming first if paused.
    pub fn restart(&self) -> Result<()> {
        self.resume()?;
        self.send_command(commands::RESET)
    }

    pub fn pause(&self) -> Result<()> {
        if self.status() == Status::Running {
            self.send_command(commands::PAUSE_TOGGLE)?;
            self.set_status(Status::Paused);
        }
        Ok(())
    }

    pub fn resume(&self) -> Result<()> {
        if self.status() == Status::Paused {
            self.send_command(commands::PAUSE_TOGGLE)?;
            self.set_status(Status::Running);
        }
        Ok(())
    }

    pub fn status(&self) -> Status {
        *lock(&self.status)
    }

    fn set_status(&self, next: Status) {
        let mut status = lock(&self.status);
        if *status != Status::Terminated {
            *status = next;
        }
    }

    pub fn options(&self) -> &RuntimeOptions {
        &self.options
    }

    pub fn core(&self) -> &Arc<dyn CoreModule> {
        &self.core
    }

    pub fn surface(&self) -> &Arc<Surface> {
        &self.options.surface
    }

    pub fn bridge(&self) -> &VirtualFileSystemBridge {
        &self.bridge
    }

    /// Exit code the core reported, if it asked to exit.
    pub fn exit_code(&self) -> Option<i32> {
        self.config.exit.code()
    }

    /// Size recorded just before main ran.
    pub fn launch_size(&self) -> Option<Size> {
        *lock(&self.recorded_size)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|p| p.into_inner())
}
