//! Render oracle client.
//!
//! Pagination is delegated to an external engine. The engine is reached
//! through three traits that mirror its lifetime:
//!
//! - [`RenderEngine`] launches sessions
//! - [`RenderSession`] holds per-run state (a browser profile, a process)
//!   and opens surfaces
//! - [`RenderSurface`] renders exactly one document and is dropped after
//!
//! [`RenderClient`] drives them for one conversion: it launches the session
//! lazily, opens a fresh surface per unit and relaunches the session after
//! a crash or timeout.

pub mod chromium;

pub use chromium::ChromiumEngine;

use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::book::ContentUnit;
use crate::error::{Error, Result};
use crate::pdf::RenderedFragment;
use crate::style::{HouseStyle, PageFormat};

/// Something that can paginate HTML into PDF.
pub trait RenderEngine {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Start a session. Sessions are independent of each other.
    fn launch(&self) -> Result<Box<dyn RenderSession>>;
}

/// One running engine instance.
///
/// Dropping the session releases everything it holds.
pub trait RenderSession {
    /// Open a surface for a single document.
    fn open_surface(&mut self) -> Result<Box<dyn RenderSurface + '_>>;
}

/// A single-use rendering target, released on drop whether or not
/// [`RenderSurface::render`] succeeded.
pub trait RenderSurface {
    /// Render a complete, self-contained HTML document to PDF bytes.
    ///
    /// The document already carries the page size and margins of `format`
    /// in its `@page` rule. Engines that honour CSS paged media, such as
    /// [`ChromiumEngine`], need nothing else; `format` is there for engines
    /// that take the paper size out of band.
    ///
    /// Fails with [`Error::RenderTimeout`] when the engine does not finish
    /// within `timeout` and [`Error::RenderCrash`] when it dies or produces
    /// nothing.
    fn render(&mut self, document: &str, format: &PageFormat, timeout: Duration) -> Result<Vec<u8>>;
}

/// Renders content units for one conversion.
pub struct RenderClient<'e, E: RenderEngine + ?Sized> {
    engine: &'e E,
    session: Option<Box<dyn RenderSession>>,
    style: HouseStyle,
    language: String,
    timeout: Duration,
    launches: usize,
}

impl<'e, E: RenderEngine + ?Sized> RenderClient<'e, E> {
    pub fn new(engine: &'e E, style: HouseStyle, language: impl Into<String>, timeout: Duration) -> Self {
        Self {
            engine,
            session: None,
            style,
            language: language.into(),
            timeout,
            launches: 0,
        }
    }

    /// Render one unit inside the house style.
    ///
    /// A crash or timeout drops the session; the next call launches a new
    /// one.
    pub fn render(&mut self, unit: &ContentUnit) -> Result<RenderedFragment> {
        let document = self.style.wrap_document(&unit.title, &self.language, &unit.markup);
        let started = Instant::now();

        let result = self.render_document(&document);
        match &result {
            Ok(fragment) => debug!(
                "Rendered '{}' to {} pages in {:?}",
                unit.id,
                fragment.page_count(),
                started.elapsed()
            ),
            Err(e) if e.poisons_session() => {
                warn!("{} session lost while rendering '{}': {e}", self.engine.name(), unit.id);
                self.session = None;
            }
            Err(_) => {}
        }
        result
    }

    /// How many sessions have been launched so far.
    pub fn launches(&self) -> usize {
        self.launches
    }

    fn render_document(&mut self, document: &str) -> Result<RenderedFragment> {
        let format = self.style.page;
        let timeout = self.timeout;

        let session = self.session()?;
        let bytes = {
            let mut surface = session.open_surface()?;
            surface.render(document, &format, timeout)?
        };

        RenderedFragment::from_pdf(&bytes)
            .map_err(|e| Error::RenderCrash(format!("engine produced an unusable document: {e}")))
    }

    fn session(&mut self) -> Result<&mut Box<dyn RenderSession>> {
        let session = match self.session.take() {
            Some(session) => session,
            None => {
                debug!("Launching {} session", self.engine.name());
                let session = self.engine.launch()?;
                self.launches += 1;
                session
            }
        };
        Ok(self.session.insert(session))
    }
}
