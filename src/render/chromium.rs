//! Headless Chromium as the render engine (`--print-to-pdf`).
//!
//! A session owns a throwaway browser profile directory. Each surface owns a
//! work directory holding the input document, the printed PDF and the
//! browser's stderr, plus the browser process while it runs. Dropping a
//! surface kills a process that is still running and removes its files.

use std::fs::{self, File};
use std::io::{ErrorKind, Read as _};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};
use tempfile::TempDir;

use super::{RenderEngine, RenderSession, RenderSurface};
use crate::error::{Error, Result};
use crate::style::PageFormat;

/// Executable names tried by [`ChromiumEngine::discover`], in order.
const CANDIDATES: &[&str] = &[
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
    "chrome",
];

const BASE_ARGS: &[&str] = &[
    "--headless=new",
    "--disable-gpu",
    "--no-sandbox",
    "--disable-setuid-sandbox",
    "--disable-dev-shm-usage",
    "--font-render-hinting=none",
    "--no-first-run",
    "--no-default-browser-check",
    "--no-pdf-header-footer",
];

/// How often a running render is polled for completion.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Bytes of stderr kept in crash reports.
const STDERR_TAIL: usize = 2048;

/// A Chromium or Chrome binary driven from the command line.
#[derive(Debug, Clone)]
pub struct ChromiumEngine {
    binary: PathBuf,
    extra_args: Vec<String>,
}

impl ChromiumEngine {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            extra_args: Vec::new(),
        }
    }

    /// Find a browser on `PATH`.
    pub fn discover() -> Option<Self> {
        let path = std::env::var_os("PATH")?;
        std::env::split_paths(&path)
            .flat_map(|dir| CANDIDATES.iter().map(move |name| dir.join(name)))
            .find(|candidate| candidate.is_file())
            .map(Self::new)
    }

    /// Pass an additional command line argument to every browser process.
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_args.push(arg.into());
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

impl RenderEngine for ChromiumEngine {
    fn name(&self) -> &str {
        "chromium"
    }

    fn launch(&self) -> Result<Box<dyn RenderSession>> {
        let profile = tempfile::Builder::new().prefix("folio-profile-").tempdir()?;
        debug!("Chromium profile at {}", profile.path().display());
        Ok(Box::new(ChromiumSession {
            engine: self.clone(),
            profile,
            renders: 0,
        }))
    }
}

struct ChromiumSession {
    engine: ChromiumEngine,
    profile: TempDir,
    renders: usize,
}

impl RenderSession for ChromiumSession {
    fn open_surface(&mut self) -> Result<Box<dyn RenderSurface + '_>> {
        self.renders += 1;
        let work = tempfile::Builder::new()
            .prefix(&format!("unit-{}-", self.renders))
            .tempdir_in(self.profile.path())?;
        Ok(Box::new(ChromiumSurface {
            engine: &self.engine,
            profile: self.profile.path(),
            work,
            child: None,
        }))
    }
}

struct ChromiumSurface<'s> {
    engine: &'s ChromiumEngine,
    profile: &'s Path,
    work: TempDir,
    child: Option<Child>,
}

impl ChromiumSurface<'_> {
    fn command(&self, input: &Path, output: &Path) -> Command {
        let mut command = Command::new(&self.engine.binary);
        command
            .args(BASE_ARGS)
            .arg(format!("--user-data-dir={}", self.profile.display()))
            .arg(format!("--print-to-pdf={}", output.display()))
            .args(&self.engine.extra_args)
            .arg(file_url(input));
        command
    }

    /// Wait for the running process, killing it once `timeout` has passed.
    fn wait(&mut self, timeout: Duration) -> Result<std::process::ExitStatus> {
        let deadline = Instant::now() + timeout;
        loop {
            let Some(child) = self.child.as_mut() else {
                return Err(Error::RenderCrash("browser process is gone".into()));
            };
            if let Some(status) = child.try_wait()? {
                self.child = None;
                return Ok(status);
            }
            if Instant::now() >= deadline {
                self.kill();
                return Err(Error::RenderTimeout(timeout));
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    fn kill(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill() {
                warn!("Cannot kill browser process {}: {e}", child.id());
            }
            // Reap it so no zombie outlives the surface
            let _ = child.wait();
        }
    }

    fn stderr_tail(&self) -> String {
        let mut stderr = String::new();
        if let Ok(mut file) = File::open(self.work.path().join("stderr.log")) {
            let _ = file.read_to_string(&mut stderr);
        }
        let stderr = stderr.trim();
        let start = stderr
            .char_indices()
            .map(|(i, _)| i)
            .find(|&i| stderr.len() - i <= STDERR_TAIL)
            .unwrap_or(stderr.len());
        stderr[start..].to_string()
    }
}

impl RenderSurface for ChromiumSurface<'_> {
    /// Chromium sizes pages from the document's `@page` rule, so `format`
    /// is only logged.
    fn render(&mut self, document: &str, format: &PageFormat, timeout: Duration) -> Result<Vec<u8>> {
        let input = self.work.path().join("unit.html");
        let output = self.work.path().join("unit.pdf");
        fs::write(&input, document)?;
        let stderr = File::create(self.work.path().join("stderr.log"))?;

        debug!(
            "Printing {} ({:?}) with {}",
            input.display(),
            format.size,
            self.engine.binary.display()
        );
        let child = self
            .command(&input, &output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(stderr)
            .spawn()
            .map_err(|e| match e.kind() {
                // A missing binary will not fix itself for the next unit
                ErrorKind::NotFound | ErrorKind::PermissionDenied => Error::Io(e),
                _ => Error::RenderCrash(format!("cannot start browser: {e}")),
            })?;
        self.child = Some(child);

        let status = self.wait(timeout)?;
        if !status.success() {
            return Err(Error::RenderCrash(format!(
                "browser exited with {status}: {}",
                self.stderr_tail()
            )));
        }

        match fs::read(&output) {
            Ok(bytes) if !bytes.is_empty() => Ok(bytes),
            Ok(_) => Err(Error::RenderCrash("browser printed an empty file".into())),
            Err(e) => Err(Error::RenderCrash(format!(
                "browser printed nothing ({e}): {}",
                self.stderr_tail()
            ))),
        }
    }
}

impl Drop for ChromiumSurface<'_> {
    fn drop(&mut self) {
        self.kill();
    }
}

/// `file://` URL for an absolute path, percent-encoding what a URL cannot
/// carry verbatim.
fn file_url(path: &Path) -> String {
    use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

    const PATH: &AsciiSet = &CONTROLS
        .add(b' ')
        .add(b'"')
        .add(b'#')
        .add(b'%')
        .add(b'<')
        .add(b'>')
        .add(b'?')
        .add(b'`')
        .add(b'{')
        .add(b'}');

    let path = path.to_string_lossy().replace('\\', "/");
    let path = if path.starts_with('/') { path } else { format!("/{path}") };
    format!("file://{}", utf8_percent_encode(&path, PATH))
}
