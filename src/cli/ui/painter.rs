use owo_colors::{OwoColorize, Style as OwoStyle};

use crate::handlers::Frame;
use crate::message::MessageSource;
use crate::utils::format_hex;

/// Named styles used across the views.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum Tone {
    Heading,
    Success,
    Warning,
    Muted,
    Value,
    Host,
    Console,
}

impl Tone {
    fn style(self) -> OwoStyle {
        match self {
            Self::Heading => OwoStyle::new().bold().cyan(),
            Self::Success => OwoStyle::new().bold().green(),
            Self::Warning => OwoStyle::new().bold().yellow(),
            Self::Muted => OwoStyle::new().dimmed(),
            Self::Value => OwoStyle::new().bold(),
            Self::Host => OwoStyle::new().magenta(),
            Self::Console => OwoStyle::new().blue(),
        }
    }
}

/// Applies colour and style to terminal text.
#[derive(Debug)]
pub(crate) struct Painter {
    use_colour: bool,
}

impl Painter {
    /// Creates a painter with explicit colour control.
    pub(crate) fn new(use_colour: bool) -> Self {
        Self { use_colour }
    }

    pub(crate) fn heading<T: AsRef<str>>(&self, text: T) -> String {
        self.paint(text.as_ref(), Tone::Heading)
    }

    pub(crate) fn success<T: AsRef<str>>(&self, text: T) -> String {
        self.paint(text.as_ref(), Tone::Success)
    }

    pub(crate) fn warning<T: AsRef<str>>(&self, text: T) -> String {
        self.paint(text.as_ref(), Tone::Warning)
    }

    pub(crate) fn muted<T: AsRef<str>>(&self, text: T) -> String {
        self.paint(text.as_ref(), Tone::Muted)
    }

    pub(crate) fn value<T: AsRef<str>>(&self, text: T) -> String {
        self.paint(text.as_ref(), Tone::Value)
    }

    /// Host writes and console responses get distinct colours.
    pub(crate) fn source(&self, source: MessageSource) -> String {
        let tone = match source {
            MessageSource::Host => Tone::Host,
            MessageSource::Console => Tone::Console,
        };
        self.paint(&source.to_string(), tone)
    }

    /// Embedded CRC, flagged with the expected value when it does not match.
    pub(crate) fn crc(&self, frame: &Frame) -> String {
        let embedded = format_hex(&frame.crc());
        if frame.crc_valid() {
            return embedded;
        }
        self.warning(format!(
            "{embedded} (expected {})",
            format_hex(&frame.expected_crc())
        ))
    }

    fn paint(&self, text: &str, tone: Tone) -> String {
        if self.use_colour {
            format!("{}", text.style(tone.style()))
        } else {
            text.to_string()
        }
    }
}
