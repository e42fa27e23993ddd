//! Acquired images awaiting classification

use std::fmt;

/// How an image was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    /// Street-level image aimed at the storefront
    Oriented,
    /// Generic place photo used when no oriented image was usable
    Fallback,
}

/// Heading tag for an image
///
/// Fallback photos have no direction, so they carry a synthetic label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadingLabel {
    Degrees(u16),
    PlacePhoto(usize),
}

impl fmt::Display for HeadingLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeadingLabel::Degrees(degrees) => write!(f, "{}", degrees),
            HeadingLabel::PlacePhoto(index) => write!(f, "place_photo_{}", index),
        }
    }
}

/// One image for one candidate
///
/// Carries its `place_id` so persistence never has to infer grouping from
/// call order.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageSample {
    pub place_id: String,
    pub heading: HeadingLabel,
    pub bytes: Vec<u8>,
    pub source: ImageSource,
}

impl ImageSample {
    pub fn oriented(place_id: &str, heading: u16, bytes: Vec<u8>) -> Self {
        Self {
            place_id: place_id.to_string(),
            heading: HeadingLabel::Degrees(heading),
            bytes,
            source: ImageSource::Oriented,
        }
    }

    pub fn fallback(place_id: &str, index: usize, bytes: Vec<u8>) -> Self {
        Self {
            place_id: place_id.to_string(),
            heading: HeadingLabel::PlacePhoto(index),
            bytes,
            source: ImageSource::Fallback,
        }
    }

    /// File name used when the sample is persisted
    pub fn file_name(&self) -> String {
        format!("{}_heading_{}.jpg", sanitize(&self.place_id), self.heading)
    }
}

// Byte payloads are noise in logs
impl fmt::Debug for ImageSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageSample")
            .field("place_id", &self.place_id)
            .field("heading", &self.heading)
            .field("bytes", &self.bytes.len())
            .field("source", &self.source)
            .finish()
    }
}

fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
