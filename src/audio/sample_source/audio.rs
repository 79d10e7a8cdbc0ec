// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::fs::File;
use std::path::Path;

use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Packet};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;
use symphonia::default::{get_codecs, get_probe};

use super::error::LoadError;
use super::traits::SampleSource;

/// A sample source that decodes audio files (WAV, AIFF, MP3, FLAC, OGG, AAC...)
/// with symphonia and hands out planar f32 chunks at the file's native rate.
pub struct AudioSampleSource {
    format_reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    is_finished: bool,
    /// Frames decoded from the last packet that have not been handed out yet.
    pending: Vec<Vec<f32>>,
    pending_pos: usize,
    channels: u16,
    sample_rate: u32,
    frame_count: Option<u64>,
}

impl SampleSource for AudioSampleSource {
    fn next_chunk(
        &mut self,
        output: &mut [Vec<f32>],
        max_frames: usize,
    ) -> Result<usize, LoadError> {
        if output.len() != self.channels as usize {
            return Err(LoadError::Unsupported(format!(
                "output has {} channels, expected {}",
                output.len(),
                self.channels
            )));
        }

        for ch in output.iter_mut() {
            ch.clear();
        }

        let mut written = 0;
        while written < max_frames {
            let available = self.pending_frames().saturating_sub(self.pending_pos);
            if available == 0 {
                if self.is_finished || !self.decode_next()? {
                    self.is_finished = true;
                    break;
                }
                continue;
            }

            let to_copy = available.min(max_frames - written);
            let decoded_channels = self.pending.len();
            for (ch_idx, out_ch) in output.iter_mut().enumerate() {
                // Packets that decode to fewer channels than the track reports are
                // spread across the remaining outputs.
                let plane = &self.pending[ch_idx % decoded_channels];
                out_ch.extend_from_slice(&plane[self.pending_pos..self.pending_pos + to_copy]);
            }
            self.pending_pos += to_copy;
            written += to_copy;
        }

        Ok(written)
    }

    fn channel_count(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn frame_count(&self) -> Option<u64> {
        self.frame_count
    }
}

impl AudioSampleSource {
    /// Opens the file at the given path and prepares its first audio track for decoding.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            LoadError::IoError(std::io::Error::new(
                e.kind(),
                format!("{}: {}", path.display(), e),
            ))
        })?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(extension);
        }

        let meta_opts: MetadataOptions = Default::default();
        let fmt_opts: FormatOptions = Default::default();
        let probed = get_probe()
            .format(&hint, mss, &fmt_opts, &meta_opts)
            .map_err(|e| LoadError::Unsupported(format!("'{}': {}", path.display(), e)))?;
        let format_reader = probed.format;

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| {
                LoadError::Unsupported(format!("'{}': no audio track found", path.display()))
            })?;
        let track_id = track.id;
        let params = &track.codec_params;

        let sample_rate = params.sample_rate.ok_or_else(|| {
            LoadError::Unsupported(format!("'{}': sample rate not specified", path.display()))
        })?;
        if sample_rate == 0 {
            return Err(LoadError::InvalidSampleRate(sample_rate));
        }
        let frame_count = params.n_frames;
        let reported_channels = params.channels.map(|c| c.count() as u16).unwrap_or(0);

        let decoder = get_codecs()
            .make(params, &DecoderOptions::default())
            .map_err(|e| LoadError::Unsupported(format!("'{}': {}", path.display(), e)))?;

        let mut source = Self {
            format_reader,
            decoder,
            track_id,
            is_finished: false,
            pending: Vec::new(),
            pending_pos: 0,
            channels: reported_channels,
            sample_rate,
            frame_count,
        };

        // Some containers don't report a channel layout. Decode the first packet
        // and take the count from it; those frames stay pending for the first read.
        if source.channels == 0 {
            if !source.decode_next()? {
                return Err(LoadError::EmptySource);
            }
            source.channels = source.pending.len() as u16;
        }

        Ok(source)
    }

    fn pending_frames(&self) -> usize {
        self.pending.first().map(|c| c.len()).unwrap_or(0)
    }

    /// Decodes the next packet of our track into the pending buffer.
    /// Returns false once the stream is exhausted.
    fn decode_next(&mut self) -> Result<bool, LoadError> {
        loop {
            let packet = match Self::read_next_packet(self.format_reader.as_mut()) {
                Ok(Some(packet)) => packet,
                Ok(None) => return Ok(false),
                Err(LoadError::AudioError(SymphoniaError::ResetRequired)) => {
                    self.decoder.reset();
                    continue;
                }
                Err(e) => return Err(e),
            };
            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                    self.decoder.decode(&packet)?
                }
                // A corrupt packet is skipped rather than failing the whole file.
                Err(SymphoniaError::DecodeError(_)) => continue,
                Err(e) => return Err(e.into()),
            };

            let frames = Self::decode_buffer_to_planar(decoded, &mut self.pending);
            self.pending_pos = 0;
            // Header packets (e.g. Vorbis) decode to zero frames.
            if frames > 0 && !self.pending.is_empty() {
                return Ok(true);
            }
        }
    }

    /// Reads the next packet, mapping the end-of-stream conditions to `Ok(None)`.
    /// ResetRequired is propagated so the caller can reset the decoder.
    fn read_next_packet(format_reader: &mut dyn FormatReader) -> Result<Option<Packet>, LoadError> {
        match format_reader.next_packet() {
            Ok(packet) => Ok(Some(packet)),
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                Ok(None)
            }
            // Some readers report a decode error at EOF instead of an IoError.
            Err(SymphoniaError::DecodeError(_)) => Ok(None),
            Err(e) => Err(LoadError::AudioError(e)),
        }
    }

    /// Converts a decoded buffer to planar f32, replacing the contents of `planes`.
    /// Returns the number of frames converted.
    fn decode_buffer_to_planar(decoded: AudioBufferRef, planes: &mut Vec<Vec<f32>>) -> usize {
        match decoded {
            AudioBufferRef::F32(buf) => Self::copy_planes(&buf, planes, |s| s),
            AudioBufferRef::F64(buf) => Self::copy_planes(&buf, planes, |s| s as f32),
            AudioBufferRef::S8(buf) => Self::copy_planes(&buf, planes, Self::scale_s8),
            AudioBufferRef::S16(buf) => Self::copy_planes(&buf, planes, Self::scale_s16),
            AudioBufferRef::S24(buf) => {
                Self::copy_planes(&buf, planes, |s| Self::scale_s24(s.inner()))
            }
            AudioBufferRef::S32(buf) => Self::copy_planes(&buf, planes, Self::scale_s32),
            AudioBufferRef::U8(buf) => Self::copy_planes(&buf, planes, Self::scale_u8),
            AudioBufferRef::U16(buf) => Self::copy_planes(&buf, planes, Self::scale_u16),
            AudioBufferRef::U24(buf) => {
                Self::copy_planes(&buf, planes, |s| Self::scale_u24(s.inner()))
            }
            AudioBufferRef::U32(buf) => Self::copy_planes(&buf, planes, Self::scale_u32),
        }
    }

    fn copy_planes<T, F>(buf: &AudioBuffer<T>, planes: &mut Vec<Vec<f32>>, convert: F) -> usize
    where
        T: Sample,
        F: Fn(T) -> f32,
    {
        let channels = buf.spec().channels.count();
        planes.resize_with(channels, Vec::new);
        for (ch_idx, plane) in planes.iter_mut().enumerate() {
            plane.clear();
            plane.extend(buf.chan(ch_idx).iter().map(|&sample| convert(sample)));
        }
        buf.frames()
    }

    #[inline]
    pub(crate) fn scale_s8(sample: i8) -> f32 {
        sample as f32 / (1i64 << 7) as f32
    }

    #[inline]
    pub(crate) fn scale_s16(sample: i16) -> f32 {
        sample as f32 / (1i64 << 15) as f32
    }

    #[inline]
    pub(crate) fn scale_s24(sample: i32) -> f32 {
        sample as f32 / (1i64 << 23) as f32
    }

    #[inline]
    pub(crate) fn scale_s32(sample: i32) -> f32 {
        sample as f32 / (1i64 << 31) as f32
    }

    #[inline]
    pub(crate) fn scale_u8(sample: u8) -> f32 {
        (sample as f32 / u8::MAX as f32) * 2.0 - 1.0
    }

    #[inline]
    pub(crate) fn scale_u16(sample: u16) -> f32 {
        (sample as f32 / u16::MAX as f32) * 2.0 - 1.0
    }

    #[inline]
    pub(crate) fn scale_u24(sample: u32) -> f32 {
        let max = (1u32 << 24) - 1;
        (sample as f32 / max as f32) * 2.0 - 1.0
    }

    #[inline]
    pub(crate) fn scale_u32(sample: u32) -> f32 {
        (sample as f32 / u32::MAX as f32) * 2.0 - 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::write_wav;

    #[test]
    fn test_scaling() {
        assert_eq!(AudioSampleSource::scale_s16(0), 0.0);
        assert_eq!(AudioSampleSource::scale_s16(i16::MIN), -1.0);
        assert_eq!(AudioSampleSource::scale_s8(i8::MIN), -1.0);
        assert_eq!(AudioSampleSource::scale_s32(i32::MIN), -1.0);
        assert_eq!(AudioSampleSource::scale_u8(u8::MAX), 1.0);
        assert_eq!(AudioSampleSource::scale_u16(0), -1.0);
    }

    #[test]
    fn test_reads_float_wav_planar() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let left: Vec<f32> = (0..1000).map(|i| i as f32 / 1000.0).collect();
        let right: Vec<f32> = (0..1000).map(|i| -(i as f32) / 1000.0).collect();
        write_wav(path.clone(), vec![left.clone(), right.clone()], 44100).unwrap();

        let mut source = AudioSampleSource::from_file(&path).unwrap();
        assert_eq!(source.channel_count(), 2);
        assert_eq!(source.sample_rate(), 44100);
        assert_eq!(source.frame_count(), Some(1000));

        let mut chunk = vec![Vec::new(); 2];
        let mut read_left = Vec::new();
        let mut read_right = Vec::new();
        loop {
            let frames = source.next_chunk(&mut chunk, 300).unwrap();
            if frames == 0 {
                break;
            }
            assert!(frames <= 300);
            read_left.extend_from_slice(&chunk[0]);
            read_right.extend_from_slice(&chunk[1]);
        }

        assert_eq!(read_left, left);
        assert_eq!(read_right, right);
    }

    #[test]
    fn test_missing_file() {
        let result = AudioSampleSource::from_file("/definitely/not/here.wav");
        assert!(matches!(result, Err(LoadError::IoError(_))));
    }

    #[test]
    fn test_garbage_file_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.wav");
        std::fs::write(&path, b"this is not audio at all").unwrap();

        assert!(AudioSampleSource::from_file(&path).is_err());
    }

    #[test]
    fn test_wrong_output_channel_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mono.wav");
        write_wav(path.clone(), vec![vec![0.5f32; 16]], 48000).unwrap();

        let mut source = AudioSampleSource::from_file(&path).unwrap();
        let mut chunk = vec![Vec::new(); 2];
        assert!(source.next_chunk(&mut chunk, 16).is_err());
    }
}
