//! Netpbm reader for the diffuse textures.
//!
//! Handles `P2`/`P3` (plain) and `P5`/`P6` (raw) images. Everything is
//! converted to 8-bit RGB.

use std::{
    fs::File,
    io::{
        BufReader,
        ErrorKind,
        Read,
        Write,
    },
    path::Path,
};

use image::RgbImage;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pixmap {
    pub width: u32,
    pub height: u32,
    /// Packed RGB, top row first.
    pub data: Vec<u8>,
}

impl Pixmap {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PpmError> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "loading netpbm image");
        Self::read(BufReader::new(File::open(path)?))
    }

    pub fn read(reader: impl Read) -> Result<Self, PpmError> {
        let mut scanner = Scanner::new(reader);

        let format = match scanner.magic()? {
            [b'P', b'2'] => Format::PlainGray,
            [b'P', b'3'] => Format::PlainRgb,
            [b'P', b'5'] => Format::RawGray,
            [b'P', b'6'] => Format::RawRgb,
            magic => return Err(PpmError::BadMagic(magic)),
        };

        let width = scanner.header_number()?;
        let height = scanner.header_number()?;
        if width == 0 || height == 0 {
            return Err(PpmError::ZeroSize { width, height });
        }
        let max_value = scanner.header_number()?;
        if max_value == 0 || max_value > u16::MAX as u32 {
            return Err(PpmError::InvalidMaxValue(max_value));
        }

        // buffers grow with the data actually read, never with the header size
        let channels = format.channels();
        let pixel_count = (width as usize)
            .checked_mul(height as usize)
            .filter(|pixels| pixels.checked_mul(3).is_some())
            .ok_or(PpmError::TooLarge { width, height })?;
        let sample_count = pixel_count * channels;

        let mut samples = vec![];
        if format.is_raw() {
            let bytes_per_sample = if max_value < 256 { 1 } else { 2 };
            let byte_count = sample_count
                .checked_mul(bytes_per_sample)
                .ok_or(PpmError::TooLarge { width, height })?;
            scanner.separator()?;
            scanner.raw_samples(byte_count, bytes_per_sample, &mut samples)?;
        }
        else {
            for _ in 0..sample_count {
                samples.push(scanner.plain_sample()?);
            }
        }

        for (i, &sample) in samples.iter().enumerate() {
            if sample > max_value {
                return Err(PpmError::SampleOutOfRange {
                    sample,
                    max_value,
                    offset: i,
                });
            }
        }

        let scaled = samples.iter().map(|&sample| scale_sample(sample, max_value));
        let data = if channels == 1 {
            scaled.flat_map(|value| [value; 3]).collect()
        }
        else {
            scaled.collect()
        };

        tracing::debug!(?format, width, height, max_value, "read netpbm image");

        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn write_ppm(&self, mut writer: impl Write) -> Result<(), PpmError> {
        write!(writer, "P6\n{} {}\n255\n", self.width, self.height)?;
        writer.write_all(&self.data)?;
        Ok(())
    }

    pub fn get(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 3;
        let pixel = self.data.get(offset..offset + 3)?;
        Some([pixel[0], pixel[1], pixel[2]])
    }

    /// Reverses the row order. OpenGL expects the first row of a texture to
    /// be the bottom one.
    pub fn flip_vertical(&mut self) {
        let row_len = self.width as usize * 3;
        let height = self.height as usize;
        for y in 0..height / 2 {
            let (top, bottom) = self.data.split_at_mut((height - 1 - y) * row_len);
            top[y * row_len..(y + 1) * row_len].swap_with_slice(&mut bottom[..row_len]);
        }
    }
}

impl From<Pixmap> for RgbImage {
    fn from(value: Pixmap) -> Self {
        if value.data.len() != value.width as usize * value.height as usize * 3 {
            // missing pixels are black
            return RgbImage::from_fn(value.width, value.height, |x, y| {
                image::Rgb(value.get(x, y).unwrap_or_default())
            });
        }

        let Pixmap {
            width,
            height,
            data,
        } = value;
        RgbImage::from_raw(width, height, data).unwrap_or_else(|| RgbImage::new(width, height))
    }
}

impl From<RgbImage> for Pixmap {
    fn from(value: RgbImage) -> Self {
        Self {
            width: value.width(),
            height: value.height(),
            data: value.into_raw(),
        }
    }
}

fn scale_sample(sample: u32, max_value: u32) -> u8 {
    if max_value == 255 {
        sample as u8
    }
    else {
        ((sample * 255 + max_value / 2) / max_value) as u8
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Format {
    PlainGray,
    PlainRgb,
    RawGray,
    RawRgb,
}

impl Format {
    fn channels(&self) -> usize {
        match self {
            Self::PlainGray | Self::RawGray => 1,
            Self::PlainRgb | Self::RawRgb => 3,
        }
    }

    fn is_raw(&self) -> bool {
        matches!(self, Self::RawGray | Self::RawRgb)
    }
}

struct Scanner<R> {
    reader: R,
    peeked: Option<u8>,
}

impl<R: Read> Scanner<R> {
    fn new(reader: R) -> Self {
        Self {
            reader,
            peeked: None,
        }
    }

    fn next_byte(&mut self) -> Result<Option<u8>, PpmError> {
        if let Some(byte) = self.peeked.take() {
            return Ok(Some(byte));
        }
        let mut buf = [0];
        loop {
            match self.reader.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(buf[0])),
                Err(error) if error.kind() == ErrorKind::Interrupted => {}
                Err(error) => return Err(error.into()),
            }
        }
    }

    fn peek_byte(&mut self) -> Result<Option<u8>, PpmError> {
        if self.peeked.is_none() {
            self.peeked = self.next_byte()?;
        }
        Ok(self.peeked)
    }

    fn expect_byte(&mut self) -> Result<u8, PpmError> {
        self.next_byte()?.ok_or(PpmError::UnexpectedEof)
    }

    fn magic(&mut self) -> Result<[u8; 2], PpmError> {
        Ok([self.expect_byte()?, self.expect_byte()?])
    }

    fn skip_comment(&mut self) -> Result<(), PpmError> {
        while let Some(byte) = self.next_byte()? {
            if byte == b'\n' || byte == b'\r' {
                break;
            }
        }
        Ok(())
    }

    /// Skips whitespace and `#` comments.
    fn skip_filler(&mut self) -> Result<(), PpmError> {
        while let Some(byte) = self.peek_byte()? {
            if byte == b'#' {
                self.skip_comment()?;
            }
            else if byte.is_ascii_whitespace() {
                self.peeked = None;
            }
            else {
                break;
            }
        }
        Ok(())
    }

    fn number(&mut self) -> Result<u32, PpmError> {
        let mut digits = String::new();
        while let Some(byte) = self.peek_byte()? {
            if byte.is_ascii_whitespace() || byte == b'#' {
                break;
            }
            digits.push(byte as char);
            self.peeked = None;
        }

        if digits.is_empty() {
            return Err(PpmError::UnexpectedEof);
        }

        digits.parse().map_err(|_| PpmError::InvalidNumber(digits))
    }

    fn header_number(&mut self) -> Result<u32, PpmError> {
        self.skip_filler()?;
        self.number()
    }

    fn plain_sample(&mut self) -> Result<u32, PpmError> {
        self.skip_filler()?;
        self.number()
    }

    /// Consumes the single whitespace byte (or a comment running up to the
    /// end of its line) between `maxval` and a raw raster.
    fn separator(&mut self) -> Result<(), PpmError> {
        match self.expect_byte()? {
            b'#' => self.skip_comment(),
            byte if byte.is_ascii_whitespace() => Ok(()),
            byte => Err(PpmError::MissingSeparator(byte)),
        }
    }

    fn raw_samples(
        &mut self,
        byte_count: usize,
        bytes_per_sample: usize,
        samples: &mut Vec<u32>,
    ) -> Result<(), PpmError> {
        let mut raster = vec![];
        if let Some(byte) = self.peeked.take() {
            raster.push(byte);
        }
        let remaining = byte_count.saturating_sub(raster.len());
        self.reader
            .by_ref()
            .take(remaining as u64)
            .read_to_end(&mut raster)?;
        if raster.len() < byte_count {
            return Err(PpmError::UnexpectedEof);
        }

        if bytes_per_sample == 1 {
            samples.extend(raster.iter().map(|&byte| byte as u32));
        }
        else {
            samples.extend(
                raster
                    .chunks_exact(2)
                    .map(|pair| u16::from_be_bytes([pair[0], pair[1]]) as u32),
            );
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PpmError {
    #[error("io error")]
    Io(#[from] std::io::Error),
    #[error("not a netpbm image: {0:?}")]
    BadMagic([u8; 2]),
    #[error("unexpected end of file")]
    UnexpectedEof,
    #[error("invalid number: {0}")]
    InvalidNumber(String),
    #[error("invalid maximum sample value: {0}")]
    InvalidMaxValue(u32),
    #[error("sample {sample} at offset {offset} exceeds maximum {max_value}")]
    SampleOutOfRange {
        sample: u32,
        max_value: u32,
        offset: usize,
    },
    #[error("image has zero size: {width}x{height}")]
    ZeroSize { width: u32, height: u32 },
    #[error("image is too large: {width}x{height}")]
    TooLarge { width: u32, height: u32 },
    #[error("expected whitespace before raster data, found {0:#04x}")]
    MissingSeparator(u8),
}
