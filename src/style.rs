//! House style: page format, typography and the document shell every
//! content unit is rendered in.

use std::fmt::Write as _;

/// Physical paper size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageSize {
    #[default]
    A4,
    Letter,
}

impl PageSize {
    /// Width and height in millimetres.
    pub fn dimensions_mm(self) -> (f32, f32) {
        match self {
            PageSize::A4 => (210.0, 297.0),
            PageSize::Letter => (215.9, 279.4),
        }
    }

    /// Width and height in PDF points.
    pub fn dimensions_pt(self) -> (f32, f32) {
        let (w, h) = self.dimensions_mm();
        (mm_to_pt(w), mm_to_pt(h))
    }

    fn css_name(self) -> &'static str {
        match self {
            PageSize::A4 => "A4",
            PageSize::Letter => "letter",
        }
    }
}

/// Page margins in millimetres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margins {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Margins {
    pub fn uniform(mm: f32) -> Self {
        Self {
            top: mm,
            right: mm,
            bottom: mm,
            left: mm,
        }
    }
}

impl Default for Margins {
    fn default() -> Self {
        Self::uniform(20.0)
    }
}

/// Page size and margins shared by every unit of one conversion.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PageFormat {
    pub size: PageSize,
    pub margins: Margins,
}

/// Body text settings substituted into the print stylesheet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Typography {
    pub font_size_pt: f32,
    pub line_height: f32,
}

impl Default for Typography {
    fn default() -> Self {
        Self {
            font_size_pt: 11.0,
            line_height: 1.6,
        }
    }
}

const PRINT_STYLES: &str = r#"
* { box-sizing: border-box; }

body {
  font-family: 'Merriweather', Georgia, 'Times New Roman', serif;
  text-align: justify;
  color: #000 !important;
  background: #fff !important;
  padding: 0;
  margin: 0;
  -webkit-print-color-adjust: exact;
}

h1, h2, h3, h4, h5, h6 {
  font-family: 'Inter', 'Helvetica Neue', Arial, sans-serif;
  font-weight: 700;
  color: #000;
  page-break-after: avoid;
  page-break-inside: avoid;
}

h1 {
  font-size: 24pt;
  margin-top: 0;
  margin-bottom: 1.5em;
  border-bottom: 2px solid #000;
  padding-bottom: 0.5em;
}

h2 { font-size: 18pt; margin-top: 2em; margin-bottom: 1em; }
h3 { font-size: 14pt; margin-top: 1.5em; margin-bottom: 0.8em; }

p { margin: 0 0 1em 0; orphans: 3; widows: 3; }

img, svg {
  max-width: 100%;
  height: auto;
  display: block;
  margin: 2em auto;
  page-break-inside: avoid;
}

figure { margin: 2em 0; page-break-inside: avoid; }
figcaption { text-align: center; font-size: 0.9em; font-style: italic; margin-top: 0.5em; color: #444; }

table { width: 100%; border-collapse: collapse; margin: 2em 0; page-break-inside: avoid; font-size: 0.9em; }
th, td { border: 1px solid #ccc; padding: 8px 12px; text-align: left; }
th { background-color: #f5f5f5 !important; font-weight: 600; }

blockquote {
  border-left: 3px solid #000;
  margin: 1.5em 0;
  padding: 0.5em 0 0.5em 1.5em;
  font-style: italic;
}

code, pre { font-family: 'Courier New', Courier, monospace; background-color: #f5f5f5 !important; font-size: 0.9em; }
pre { padding: 1em; border-radius: 4px; white-space: pre-wrap; word-wrap: break-word; page-break-inside: avoid; }

a { color: #000; text-decoration: underline; text-decoration-thickness: 1px; }

.page-break { page-break-before: always; }
.center { text-align: center; }
"#;

/// The fixed style every unit is rendered with.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HouseStyle {
    pub page: PageFormat,
    pub typography: Typography,
}

impl HouseStyle {
    /// The complete print stylesheet, page rule first.
    pub fn stylesheet(&self) -> String {
        let PageFormat { size, margins } = self.page;
        let mut css = String::with_capacity(PRINT_STYLES.len() + 256);

        // Writing into a String cannot fail
        let _ = write!(
            css,
            "@page {{ size: {}; margin: {}mm {}mm {}mm {}mm; }}\n\
             body {{ font-size: {}pt; line-height: {}; }}\n",
            size.css_name(),
            margins.top,
            margins.right,
            margins.bottom,
            margins.left,
            self.typography.font_size_pt,
            self.typography.line_height,
        );
        css.push_str(PRINT_STYLES);
        css
    }

    /// Wrap body markup in a self-contained document carrying the stylesheet.
    pub fn wrap_document(&self, title: &str, language: &str, body: &str) -> String {
        let lang = if language.trim().is_empty() { "en" } else { language.trim() };
        format!(
            "<!DOCTYPE html>\n<html lang=\"{}\">\n<head>\n<meta charset=\"utf-8\">\n\
             <title>{}</title>\n<style>{}</style>\n</head>\n<body>\n{}\n</body>\n</html>\n",
            escape_html(lang),
            escape_html(title),
            self.stylesheet(),
            body
        )
    }
}

pub(crate) fn mm_to_pt(mm: f32) -> f32 {
    mm * 72.0 / 25.4
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}
