use std::io::{self, BufRead, Write};

use crate::error::ConfigError;

/// Interactive channel used while bootstrapping or repairing a configuration.
pub trait Console {
    /// Ask for one line of input. Returns `None` once the input is exhausted.
    fn prompt(&mut self, label: &str) -> Result<Option<String>, ConfigError>;

    /// Tell the operator what happened to the configuration file.
    fn status(&mut self, message: &str);
}

/// Line-oriented console over any reader/writer pair.
pub struct LineConsole<R, W> {
    reader: R,
    writer: W,
}

impl<R: BufRead, W: Write> LineConsole<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    pub fn into_writer(self) -> W {
        self.writer
    }
}

impl LineConsole<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Console for LineConsole<R, W> {
    fn prompt(&mut self, label: &str) -> Result<Option<String>, ConfigError> {
        write!(self.writer, "{}: ", label).map_err(ConfigError::Input)?;
        self.writer.flush().map_err(ConfigError::Input)?;

        let mut line = String::new();
        let read = self.reader.read_line(&mut line).map_err(ConfigError::Input)?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line))
    }

    fn status(&mut self, message: &str) {
        let _ = writeln!(self.writer, "{}", message);
    }
}
