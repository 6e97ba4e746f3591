//! Field delimiter detection for the reference dataset.

/// Field separator of a delimited text file.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, strum_macros::Display, strum_macros::AsRefStr,
)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Delimiter {
    /// `,`
    #[default]
    Comma,
    /// `\t`
    Tab,
}

impl Delimiter {
    /// The separator byte, as passed to [`csv::ReaderBuilder::delimiter`].
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::Comma => b',',
            Self::Tab => b'\t',
        }
    }
}

/// Picks tab if `text` contains more tabs than commas, otherwise comma.
#[must_use]
pub fn detect_delimiter(text: &str) -> Delimiter {
    let (mut commas, mut tabs) = (0usize, 0usize);
    for b in text.bytes() {
        match b {
            b',' => commas += 1,
            b'\t' => tabs += 1,
            _ => {}
        }
    }
    if tabs > commas {
        Delimiter::Tab
    } else {
        Delimiter::Comma
    }
}
