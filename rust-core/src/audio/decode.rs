//! Decode-and-replay of compressed audio files
//!
//! An external decoder turns the source file into raw little-endian s16 PCM.
//! The PCM file is then fed through the same frame path as live capture.

use crate::audio::capture::{run_frame_loop, FramePath};
use crate::audio::device::{CaptureDevice, OutputDevice};
use crate::audio::worker::{LoopExit, RunFlag, Worker};
use crate::error::{AudioError, Result};
use log::{debug, info, warn};
use std::ffi::OsString;
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

/// Interval between checks on a running decoder process
const DECODER_POLL: Duration = Duration::from_millis(10);

/// Converts a compressed file into raw PCM
pub trait Decoder: Send {
    /// Decode `input` into `output` as interleaved little-endian s16
    ///
    /// Must return promptly once `flag` stops running, abandoning the work.
    fn decode(&mut self, input: &Path, output: &Path, flag: &RunFlag) -> Result<()>;
}

/// Decoder running the `ffmpeg` command line tool
#[derive(Debug, Clone)]
pub struct FfmpegDecoder {
    program: PathBuf,
    sample_rate: u32,
    channels: u16,
}

impl FfmpegDecoder {
    /// # Arguments
    /// * `sample_rate` - Output rate requested from ffmpeg
    /// * `channels` - Output channel count requested from ffmpeg
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
            sample_rate,
            channels,
        }
    }

    /// Use a specific ffmpeg binary instead of the one on `PATH`
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Command line arguments for one conversion
    pub fn args(&self, input: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-y".into(), "-i".into(), input.into()];
        args.extend(
            [
                "-f".to_string(),
                "s16le".to_string(),
                "-acodec".to_string(),
                "pcm_s16le".to_string(),
                "-ar".to_string(),
                self.sample_rate.to_string(),
                "-ac".to_string(),
                self.channels.to_string(),
            ]
            .into_iter()
            .map(OsString::from),
        );
        args.push(output.into());
        args
    }
}

impl Decoder for FfmpegDecoder {
    fn decode(&mut self, input: &Path, output: &Path, flag: &RunFlag) -> Result<()> {
        debug!("Running {} {:?}", self.program.display(), self.args(input, output));

        let mut child = Command::new(&self.program)
            .args(self.args(input, output))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| AudioError::ExternalProcess(format!("failed to start {}: {e}", self.program.display())))?;

        loop {
            match child.try_wait() {
                Ok(Some(status)) if status.success() => return Ok(()),
                Ok(Some(status)) => {
                    return Err(AudioError::ExternalProcess(format!("decoder exited with {status}")));
                }
                Ok(None) if !flag.is_running() => {
                    info!("Cancelling decoder process");
                    if let Err(e) = child.kill() {
                        warn!("Failed to kill decoder: {}", e);
                    }
                    let _ = child.wait();
                    return Err(AudioError::ExternalProcess("decoding cancelled".into()));
                }
                Ok(None) => std::thread::sleep(DECODER_POLL),
                Err(e) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(AudioError::ExternalProcess(format!("failed to wait on decoder: {e}")));
                }
            }
        }
    }
}

/// Raw little-endian s16 PCM file read as a finite capture source
pub struct PcmFileSource {
    reader: BufReader<File>,
    sample_rate: u32,
    channels: u16,
    bytes: Vec<u8>,
    /// Odd byte left over from the previous read
    carry: Option<u8>,
}

impl PcmFileSource {
    /// Open a PCM file; an empty or missing file is an external process failure
    pub fn open(path: &Path, sample_rate: u32, channels: u16) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| AudioError::ExternalProcess(format!("no decoded output at {}: {e}", path.display())))?;
        let len = file
            .metadata()
            .map_err(|e| AudioError::ExternalProcess(format!("cannot stat {}: {e}", path.display())))?
            .len();
        if len < 2 {
            return Err(AudioError::ExternalProcess(format!("decoded output {} is empty", path.display())));
        }

        Ok(Self {
            reader: BufReader::new(file),
            sample_rate,
            channels,
            bytes: Vec::new(),
            carry: None,
        })
    }
}

impl CaptureDevice for PcmFileSource {
    fn read(&mut self, buffer: &mut [i16]) -> Result<usize> {
        if buffer.is_empty() {
            return Ok(0);
        }

        let want = buffer.len() * 2;
        self.bytes.clear();
        self.bytes.extend(self.carry.take());
        let mut filled = self.bytes.len();
        self.bytes.resize(want, 0);

        // Fill whole samples, tolerating short reads
        while filled < want {
            match self.reader.read(&mut self.bytes[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(AudioError::DeviceIo(format!("PCM read failed: {e}"))),
            }
        }

        if filled % 2 == 1 {
            self.carry = Some(self.bytes[filled - 1]);
        }

        let samples = filled / 2;
        for (out, pair) in buffer.iter_mut().zip(self.bytes[..samples * 2].chunks_exact(2)) {
            *out = i16::from_le_bytes([pair[0], pair[1]]);
        }
        Ok(samples)
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn is_finite(&self) -> bool {
        true
    }
}

/// Decode worker handle
pub struct DecodeSession {
    worker: Worker,
}

impl Default for DecodeSession {
    fn default() -> Self {
        Self::new()
    }
}

impl DecodeSession {
    pub fn new() -> Self {
        Self {
            worker: Worker::new("signal-lab-decode"),
        }
    }

    /// Decode `input` into `scratch` on a worker thread, then replay it
    ///
    /// # Arguments
    /// * `input` - Compressed source file
    /// * `scratch` - Where the decoder writes raw PCM; removed afterwards
    /// * `decoder` - External decoder
    /// * `output` - Receives processed frames, if any
    /// * `path` - Frame path shared with live capture
    /// * `sample_rate` / `channels` - Format the decoder was asked to produce
    #[allow(clippy::too_many_arguments)]
    pub fn start(
        &mut self,
        input: PathBuf,
        scratch: PathBuf,
        mut decoder: Box<dyn Decoder>,
        mut output: Option<Box<dyn OutputDevice>>,
        path: FramePath,
        sample_rate: u32,
        channels: u16,
    ) -> Result<()> {
        self.worker.stop();
        info!("Decoding {}", input.display());

        self.worker.spawn(move |flag| {
            let exit = match decoder.decode(&input, &scratch, &flag) {
                _ if !flag.is_running() => LoopExit::Stopped,
                Err(e) => LoopExit::NoData(e.to_string()),
                Ok(()) => match PcmFileSource::open(&scratch, sample_rate, channels) {
                    Ok(mut source) => {
                        let output = output.as_deref_mut().map(|o| o as &mut dyn OutputDevice);
                        run_frame_loop(&flag, &mut source, output, path, None)
                    }
                    Err(e) => LoopExit::NoData(e.to_string()),
                },
            };

            if let Err(e) = std::fs::remove_file(&scratch) {
                if e.kind() != ErrorKind::NotFound {
                    debug!("Failed to remove {}: {}", scratch.display(), e);
                }
            }
            exit
        })
    }

    /// Cancel the decoder (killing its process) and stop replay
    ///
    /// Idempotent; returns after the worker has exited.
    pub fn stop(&mut self) {
        self.worker.stop();
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_running()
    }

    pub fn last_exit(&self) -> Option<LoopExit> {
        self.worker.last_exit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::capture::{ListenerSlot, RecordingBuffer};
    use crate::audio::gain::{GainConfig, SharedScale};
    use crate::audio::processor::SignalChain;
    use crate::filters::equalizer::{EqConfig, EqGains};
    use crate::spectrum::{AnalyzerConfig, SpectrumAnalyzer};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    static NEXT_FILE: AtomicUsize = AtomicUsize::new(0);

    fn scratch_path(tag: &str) -> PathBuf {
        let n = NEXT_FILE.fetch_add(1, Ordering::SeqCst);
        std::env::temp_dir().join(format!("signal-lab-test-{}-{}-{}.pcm", std::process::id(), tag, n))
    }

    fn frame_path(frame_len: usize, recording: RecordingBuffer) -> FramePath {
        let chain = SignalChain::with_parts(
            48000.0,
            1,
            &EqConfig::default(),
            GainConfig::default(),
            Arc::new(EqGains::default()),
            Arc::new(SharedScale::default()),
        )
        .unwrap();
        let analyzer = SpectrumAnalyzer::new(AnalyzerConfig::default()).unwrap();
        FramePath::new(frame_len, chain, analyzer, ListenerSlot::default(), Some(recording)).unwrap()
    }

    fn wait_until_done(session: &DecodeSession) {
        let started = Instant::now();
        while session.is_running() && started.elapsed() < Duration::from_secs(5) {
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    /// Writes fixed bytes as the "decoded" output
    struct Canned(Vec<u8>);

    impl Decoder for Canned {
        fn decode(&mut self, _input: &Path, output: &Path, _flag: &RunFlag) -> Result<()> {
            std::fs::write(output, &self.0).map_err(|e| AudioError::ExternalProcess(e.to_string()))
        }
    }

    struct Failing;

    impl Decoder for Failing {
        fn decode(&mut self, _input: &Path, _output: &Path, _flag: &RunFlag) -> Result<()> {
            Err(AudioError::ExternalProcess("exit status: 1".into()))
        }
    }

    /// Runs until cancelled
    struct Endless;

    impl Decoder for Endless {
        fn decode(&mut self, _input: &Path, _output: &Path, flag: &RunFlag) -> Result<()> {
            while flag.is_running() {
                std::thread::sleep(Duration::from_millis(1));
            }
            Err(AudioError::ExternalProcess("decoding cancelled".into()))
        }
    }

    fn le_bytes(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn test_pcm_source_reads_little_endian() {
        let path = scratch_path("le");
        std::fs::write(&path, le_bytes(&[1, -2, 300, i16::MIN, i16::MAX])).unwrap();

        let mut source = PcmFileSource::open(&path, 48000, 1).unwrap();
        let mut buf = [0i16; 3];
        assert_eq!(source.read(&mut buf).unwrap(), 3);
        assert_eq!(buf, [1, -2, 300]);
        assert_eq!(source.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], &[i16::MIN, i16::MAX]);
        assert_eq!(source.read(&mut buf).unwrap(), 0);
        assert!(source.is_finite());

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_pcm_source_rejects_empty_file() {
        let path = scratch_path("empty");
        std::fs::write(&path, b"").unwrap();
        assert!(matches!(
            PcmFileSource::open(&path, 48000, 2),
            Err(AudioError::ExternalProcess(_))
        ));
        std::fs::remove_file(&path).unwrap();

        assert!(PcmFileSource::open(&scratch_path("missing"), 48000, 2).is_err());
    }

    #[test]
    fn test_decoded_file_is_fed_as_frames() {
        let recording = RecordingBuffer::new(usize::MAX);
        let samples: Vec<i16> = (0..20).collect();
        let scratch = scratch_path("feed");

        let mut session = DecodeSession::new();
        session
            .start(
                PathBuf::from("song.mp3"),
                scratch.clone(),
                Box::new(Canned(le_bytes(&samples))),
                None,
                frame_path(8, recording.clone()),
                48000,
                1,
            )
            .unwrap();
        wait_until_done(&session);

        assert_eq!(session.last_exit(), Some(LoopExit::EndOfStream));
        // Two whole frames; the partial tail is never forwarded
        assert_eq!(recording.snapshot(), samples[..16].to_vec());
        assert!(!scratch.exists());
    }

    #[test]
    fn test_decoder_failure_forwards_nothing() {
        let recording = RecordingBuffer::new(usize::MAX);
        let mut session = DecodeSession::new();
        session
            .start(
                PathBuf::from("song.mp3"),
                scratch_path("fail"),
                Box::new(Failing),
                None,
                frame_path(8, recording.clone()),
                48000,
                1,
            )
            .unwrap();
        wait_until_done(&session);

        assert!(matches!(session.last_exit(), Some(LoopExit::NoData(_))));
        assert!(recording.is_empty());
    }

    #[test]
    fn test_empty_output_is_no_data() {
        let recording = RecordingBuffer::new(usize::MAX);
        let mut session = DecodeSession::new();
        session
            .start(
                PathBuf::from("song.mp3"),
                scratch_path("nodata"),
                Box::new(Canned(Vec::new())),
                None,
                frame_path(8, recording.clone()),
                48000,
                1,
            )
            .unwrap();
        wait_until_done(&session);

        assert!(matches!(session.last_exit(), Some(LoopExit::NoData(_))));
        assert!(recording.is_empty());
    }

    #[test]
    fn test_stop_cancels_decoder() {
        let mut session = DecodeSession::new();
        session
            .start(
                PathBuf::from("song.mp3"),
                scratch_path("cancel"),
                Box::new(Endless),
                None,
                frame_path(8, RecordingBuffer::new(16)),
                48000,
                1,
            )
            .unwrap();

        assert!(session.is_running());
        session.stop();
        assert!(!session.is_running());
        assert_eq!(session.last_exit(), Some(LoopExit::Stopped));
        session.stop();
    }

    #[test]
    fn test_ffmpeg_args() {
        let decoder = FfmpegDecoder::new(48000, 2);
        let args = decoder.args(Path::new("in.mp3"), Path::new("out.pcm"));
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            vec!["-y", "-i", "in.mp3", "-f", "s16le", "-acodec", "pcm_s16le", "-ar", "48000", "-ac", "2", "out.pcm"]
        );
    }

    #[test]
    fn test_missing_ffmpeg_binary() {
        let mut decoder = FfmpegDecoder::new(48000, 2).with_program("/nonexistent/ffmpeg-signal-lab");
        let flag = RunFlag(Arc::new(std::sync::atomic::AtomicBool::new(true)));
        let result = decoder.decode(Path::new("in.mp3"), Path::new("out.pcm"), &flag);
        assert!(matches!(result, Err(AudioError::ExternalProcess(_))));
    }
}
