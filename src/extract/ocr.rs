//! OCR through an external `tesseract` process.
//!
//! The image is streamed to the process on stdin and the recognized text is
//! read from stdout. The process is polled against a deadline and killed when
//! it overruns, so one pathological image can only fail its own file.

use std::{
    io::{self, Read, Write},
    path::PathBuf,
    process::{Command, Stdio},
    thread,
    time::{Duration, Instant},
};

use tracing::debug;

use crate::config::OcrConfig;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error("OCR engine not found: {}", .0.display())]
    Unavailable(PathBuf),

    #[error("OCR timed out after {0:?}")]
    Timeout(Duration),

    #[error("OCR failed: {0}")]
    Failed(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone)]
pub struct Ocr {
    config: OcrConfig,
}

impl Ocr {
    pub fn new(config: OcrConfig) -> Self {
        Self { config }
    }

    /// Recognize the text in an encoded image.
    pub fn recognize(&self, image: &[u8]) -> Result<String, OcrError> {
        let mut child = match Command::new(&self.config.binary)
            .args(["stdin", "stdout", "-l", &self.config.languages])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => child,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(OcrError::Unavailable(self.config.binary.clone()));
            }
            Err(e) => return Err(e.into()),
        };

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| OcrError::Failed("stdin not captured".into()))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| OcrError::Failed("stdout not captured".into()))?;

        let input = image.to_vec();
        // The engine may exit before consuming all input; a broken pipe here
        // is reported through the exit status instead.
        let writer = thread::spawn(move || {
            let _ = stdin.write_all(&input);
        });
        let reader = thread::spawn(move || {
            let mut out = Vec::new();
            stdout.read_to_end(&mut out).map(|_| out)
        });

        let deadline = Instant::now() + self.config.timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                let _ = writer.join();
                let _ = reader.join();
                debug!(timeout = ?self.config.timeout, "killed OCR process");
                return Err(OcrError::Timeout(self.config.timeout));
            }
            thread::sleep(POLL_INTERVAL);
        };

        let _ = writer.join();
        let output = reader
            .join()
            .map_err(|_| OcrError::Failed("output reader panicked".into()))??;

        if !status.success() {
            return Err(OcrError::Failed(format!("engine exited with {status}")));
        }

        Ok(String::from_utf8_lossy(&output).trim().to_string())
    }
}
