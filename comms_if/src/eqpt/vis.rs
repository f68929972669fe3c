//! # Vision Equipment Communications Module
//!
//! Wire formats for the RGB+depth frame pairs published by the capture exec.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::convert::TryFrom;

use base64::DecodeError;
use byteorder::{BigEndian, ByteOrder};
use chrono::{serde::ts_milliseconds, DateTime, Utc};
use image::{DynamicImage, ImageBuffer, Luma};
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A pair of RGB and depth frames acquired at (nominally) the same instant.
///
/// This is the message published by the capture exec for each new frame pair.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VisFramePair {
    /// The RGB frame
    pub rgb: CamFrame,

    /// The depth frame
    pub depth: DepthFrame,
}

/// An individual encoded frame from the RGB camera
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CamFrame {
    /// UTC timestamp at which the frame was acquired
    #[serde(with = "ts_milliseconds")]
    pub timestamp: DateTime<Utc>,

    /// The format of this frame
    pub format: ImageFormat,

    /// The formatted image data, encoded in base64.
    pub b64_data: String,
}

/// A decoded RGB camera image
#[derive(Clone)]
pub struct CamImage {
    /// UTC timestamp at which the frame was acquired
    pub timestamp: DateTime<Utc>,

    /// The image itself
    pub image: DynamicImage,
}

/// A serialisable depth image frame
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DepthFrame {
    /// UTC timestamp at which the frame was acquired
    #[serde(with = "ts_milliseconds")]
    pub timestamp: DateTime<Utc>,

    /// Width of the image in pixels
    pub width: u32,

    /// Height of the image in pixels
    pub height: u32,

    /// The formatted image data, encoded in base64, by first flattening the 16 bit image, then
    /// converting to a bigendian Vec<u8>, then encoding in base64.
    pub b64_data: String,
}

/// Represents a concrete image of depth in mm.
#[derive(Debug, Clone)]
pub struct DepthImage {
    /// UTC timestamp at which the frame was acquired
    pub timestamp: DateTime<Utc>,

    /// The 16 bit greyscale image which describes z depth from the camera's optical centre, in
    /// millimeters.
    pub image: ImageBuffer<Luma<u16>, Vec<u16>>,
}

// -----------------------------------------------------------------------------------------------
// ENUMS
// -----------------------------------------------------------------------------------------------

/// Possible formats for camera images. This is used rather than image::ImageFormat to:
///     1. Restrict the formats that can be sent back and forth
///     2. Allow serialisation as image::ImageFormat does not implement serde.
#[derive(Debug, Serialize, Deserialize, Copy, Clone)]
pub enum ImageFormat {
    /// PNG image
    Png,

    /// JPEG image with a quality value between 1 and 100, where 100 is best.
    Jpeg(u8),
}

#[derive(Debug, thiserror::Error)]
pub enum VisFrameError {
    #[error("Failed to decode frame data from base64: {0}")]
    Base64DecodeError(DecodeError),

    #[error("Failed to decode the image data: {0}")]
    ImageDecodeError(image::ImageError),

    #[error("The encoded frame data was the wrong size")]
    FrameWrongSize,
}

// -----------------------------------------------------------------------------------------------
// IMPLS
// -----------------------------------------------------------------------------------------------

impl TryFrom<CamFrame> for CamImage {
    type Error = VisFrameError;

    fn try_from(frame: CamFrame) -> Result<Self, Self::Error> {
        // Decode the bytes from the base64 string
        let bytes = base64::decode(frame.b64_data).map_err(VisFrameError::Base64DecodeError)?;

        // Decode the formatted image data
        let image = image::load_from_memory_with_format(
            &bytes,
            match frame.format {
                ImageFormat::Png => image::ImageFormat::Png,
                ImageFormat::Jpeg(_) => image::ImageFormat::Jpeg,
            },
        )
        .map_err(VisFrameError::ImageDecodeError)?;

        Ok(Self {
            timestamp: frame.timestamp,
            image,
        })
    }
}

impl TryFrom<DepthFrame> for DepthImage {
    type Error = VisFrameError;

    fn try_from(frame: DepthFrame) -> Result<Self, Self::Error> {
        // Decode the bytes from the base64 string
        let bytes = base64::decode(frame.b64_data).map_err(VisFrameError::Base64DecodeError)?;

        // Put those bytes (which are bigendian) into a buffer
        let buffer_len = bytes.len() / 2;
        let mut buff = vec![0u16; buffer_len];
        BigEndian::read_u16_into(&bytes, &mut buff);

        // Build the image from the raw data
        let image = ImageBuffer::from_raw(frame.width, frame.height, buff)
            .ok_or(VisFrameError::FrameWrongSize)?;

        // Construct self
        Ok(Self {
            timestamp: frame.timestamp,
            image,
        })
    }
}

impl DepthImage {
    /// Encode this image as a [`DepthFrame`] for transmission.
    pub fn to_depth_frame(&self) -> DepthFrame {
        let raw = self.image.as_raw();

        // Flatten into bigendian bytes
        let mut bytes = vec![0u8; raw.len() * 2];
        BigEndian::write_u16_into(raw, &mut bytes);

        DepthFrame {
            timestamp: self.timestamp,
            width: self.image.width(),
            height: self.image.height(),
            b64_data: base64::encode(&bytes),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::convert::TryInto;

    #[test]
    fn test_depth_frame_decode() {
        // A 2x2 image of depths 1, 2, 3, 4 mm
        let image = ImageBuffer::from_raw(2, 2, vec![1u16, 2, 3, 4]).unwrap();
        let depth_image = DepthImage {
            timestamp: Utc::now(),
            image,
        };

        let frame = depth_image.to_depth_frame();
        let decoded: DepthImage = frame.try_into().unwrap();

        assert_eq!(decoded.image.dimensions(), (2, 2));
        assert_eq!(decoded.image.as_raw(), &vec![1u16, 2, 3, 4]);
    }

    #[test]
    fn test_depth_frame_wrong_size_rejected() {
        let frame = DepthFrame {
            timestamp: Utc::now(),
            width: 100,
            height: 100,
            b64_data: base64::encode(&[0u8, 1]),
        };

        let image: Result<DepthImage, _> = frame.try_into();
        assert!(matches!(image, Err(VisFrameError::FrameWrongSize)));
    }
}
