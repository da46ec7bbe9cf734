use std::time::Duration;

use crate::style::{HouseStyle, Margins, PageSize};

/// Default per-unit render deadline.
pub const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(60);

/// Default `/Creator` of the output document.
pub const DEFAULT_CREATOR: &str = "folio";

/// Configuration for a conversion.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Page format and typography every unit is rendered with.
    pub style: HouseStyle,
    /// How long a single unit may take to render.
    pub render_timeout: Duration,
    /// Written to the document info as `/Creator`.
    pub creator: String,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            style: HouseStyle::default(),
            render_timeout: DEFAULT_RENDER_TIMEOUT,
            creator: DEFAULT_CREATOR.to_string(),
        }
    }
}

impl ConvertOptions {
    pub fn with_page_size(mut self, size: PageSize) -> Self {
        self.style.page.size = size;
        self
    }

    pub fn with_margins(mut self, margins: Margins) -> Self {
        self.style.page.margins = margins;
        self
    }

    /// Body font size in points.
    pub fn with_font_size(mut self, pt: f32) -> Self {
        self.style.typography.font_size_pt = pt;
        self
    }

    pub fn with_line_height(mut self, line_height: f32) -> Self {
        self.style.typography.line_height = line_height;
        self
    }

    pub fn with_render_timeout(mut self, timeout: Duration) -> Self {
        self.render_timeout = timeout;
        self
    }

    pub fn with_creator(mut self, creator: impl Into<String>) -> Self {
        self.creator = creator.into();
        self
    }
}
